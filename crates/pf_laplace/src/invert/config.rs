// crates/pf_laplace/src/invert/config.rs

//! 反演配置
//!
//! Krylov 方法与预条件器在构造期通过映射表一次性解析为封闭枚举，
//! 未知名称立即失败；求解标志按"已实现掩码"校验，设置未实现的
//! 标志位同样是致命配置错误。

use pf_foundation::{PfError, PfResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Krylov 方法与预条件器枚举
// ============================================================================

/// Krylov 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KrylovMethod {
    /// 阻尼 Richardson 迭代
    Richardson,
    /// Chebyshev 迭代
    Chebyshev,
    /// 共轭梯度法
    Cg,
    /// 重启 GMRES
    Gmres,
    /// BiCGStab
    #[serde(alias = "bicgstab")]
    Bcgs,
}

impl KrylovMethod {
    const KNOWN: &'static str = "richardson, chebyshev, cg, gmres, bcgs";

    /// 按名称解析
    pub fn from_name(name: &str) -> PfResult<Self> {
        match name {
            "richardson" => Ok(Self::Richardson),
            "chebyshev" => Ok(Self::Chebyshev),
            "cg" => Ok(Self::Cg),
            "gmres" => Ok(Self::Gmres),
            "bcgs" | "bicgstab" => Ok(Self::Bcgs),
            _ => Err(PfError::unknown_name("Krylov 方法", name, Self::KNOWN)),
        }
    }

    /// 方法名称
    pub fn name(self) -> &'static str {
        match self {
            Self::Richardson => "richardson",
            Self::Chebyshev => "chebyshev",
            Self::Cg => "cg",
            Self::Gmres => "gmres",
            Self::Bcgs => "bcgs",
        }
    }
}

impl Default for KrylovMethod {
    fn default() -> Self {
        Self::Gmres
    }
}

/// 预条件器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreconKind {
    /// 无预条件
    None,
    /// 对角预条件
    Jacobi,
    /// 对称逐次超松弛
    #[serde(alias = "ssor")]
    Sor,
    /// ILU(0)
    Ilu,
    /// 用户自定义：嵌套一个独立配置的反演实例作为黑盒预条件步
    #[serde(alias = "shell")]
    User,
}

impl PreconKind {
    const KNOWN: &'static str = "none, jacobi, sor, ilu, user";

    /// 按名称解析
    pub fn from_name(name: &str) -> PfResult<Self> {
        match name {
            "none" => Ok(Self::None),
            "jacobi" => Ok(Self::Jacobi),
            "sor" | "ssor" => Ok(Self::Sor),
            "ilu" => Ok(Self::Ilu),
            "user" | "shell" => Ok(Self::User),
            _ => Err(PfError::unknown_name("预条件器", name, Self::KNOWN)),
        }
    }

    /// 预条件器名称
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Jacobi => "jacobi",
            Self::Sor => "sor",
            Self::Ilu => "ilu",
            Self::User => "user",
        }
    }
}

impl Default for PreconKind {
    fn default() -> Self {
        Self::None
    }
}

// ============================================================================
// 求解标志
// ============================================================================

/// 全局求解标志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveFlags(pub u32);

impl SolveFlags {
    /// 放弃上次解，从零初始猜测开始
    pub const FRESH_START: SolveFlags = SolveFlags(1);

    /// 已实现的标志掩码
    pub const IMPLEMENTED: u32 = 1;

    /// 是否包含某标志
    #[inline]
    pub fn contains(self, flag: SolveFlags) -> bool {
        self.0 & flag.0 != 0
    }

    /// 校验没有设置未实现的标志位
    pub fn validate(self) -> PfResult<()> {
        if self.0 & !Self::IMPLEMENTED != 0 {
            return Err(PfError::unimplemented_flag(
                "全局求解",
                self.0,
                Self::IMPLEMENTED,
            ));
        }
        Ok(())
    }
}

impl std::ops::BitOr for SolveFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 边界条件标志（内外边界各一份）
///
/// 未设置 [`BoundaryFlags::GRADIENT`] 时边界行是恒等行（固定值
/// 语义），行的右端值取 0；[`BoundaryFlags::FROM_RHS`] /
/// [`BoundaryFlags::FROM_GUESS`] 分别改为取右端场 / 初始猜测场
/// 在该守护格的值。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryFlags(pub u32);

impl BoundaryFlags {
    /// Neumann 型边界：边界行匹配法向导数
    pub const GRADIENT: BoundaryFlags = BoundaryFlags(1);
    /// 边界行右端取初始猜测场的值
    pub const FROM_GUESS: BoundaryFlags = BoundaryFlags(2);
    /// 边界行右端取右端场的值
    pub const FROM_RHS: BoundaryFlags = BoundaryFlags(4);

    /// 已实现的标志掩码
    pub const IMPLEMENTED: u32 = 7;

    /// 是否包含某标志
    #[inline]
    pub fn contains(self, flag: BoundaryFlags) -> bool {
        self.0 & flag.0 != 0
    }

    /// 校验没有设置未实现的标志位
    pub fn validate(self, which: &'static str) -> PfResult<()> {
        if self.0 & !Self::IMPLEMENTED != 0 {
            return Err(PfError::unimplemented_flag(which, self.0, Self::IMPLEMENTED));
        }
        Ok(())
    }
}

impl std::ops::BitOr for BoundaryFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ============================================================================
// 反演配置
// ============================================================================

/// 拉普拉斯反演配置
///
/// 构造期一次性固定；同一实例的多次求解共享同一配置与
/// 同一稀疏模式。切换差分精度需要新建实例。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaplaceConfig {
    /// 使用四阶差分（默认二阶）
    pub fourth_order: bool,
    /// Krylov 方法
    pub method: KrylovMethod,
    /// 预条件器类型
    pub precon: PreconKind,
    /// Richardson 阻尼因子
    pub richardson_damping: f64,
    /// Chebyshev 谱下界估计
    pub chebyshev_min: f64,
    /// Chebyshev 谱上界估计
    pub chebyshev_max: f64,
    /// GMRES 重启步数
    pub gmres_restart: usize,
    /// 相对收敛容差
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 发散判定因子
    pub dtol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 直接法开关（LU 分解，绕过 Krylov 方法）
    pub direct: bool,
    /// 右预条件（仅对用户自定义预条件器有意义）
    pub right_precon: bool,
    /// 保留一阶导数项
    pub all_terms: bool,
    /// 非均匀网格修正
    pub nonuniform: bool,
    /// 用户自定义预条件器的内层求解配置（precon 子节）
    pub precon_options: Option<Box<LaplaceConfig>>,
}

impl Default for LaplaceConfig {
    fn default() -> Self {
        Self {
            fourth_order: false,
            method: KrylovMethod::Gmres,
            precon: PreconKind::None,
            richardson_damping: 1.0,
            chebyshev_min: 0.01,
            chebyshev_max: 100.0,
            gmres_restart: 30,
            rtol: 1e-5,
            atol: 1e-50,
            dtol: 1e5,
            max_iter: 100_000,
            direct: false,
            right_precon: true,
            all_terms: false,
            nonuniform: false,
            precon_options: None,
        }
    }
}

impl LaplaceConfig {
    /// 按名称设置 Krylov 方法（未知名称立即失败）
    pub fn with_method_name(mut self, name: &str) -> PfResult<Self> {
        self.method = KrylovMethod::from_name(name)?;
        Ok(self)
    }

    /// 按名称设置预条件器（未知名称立即失败）
    pub fn with_precon_name(mut self, name: &str) -> PfResult<Self> {
        self.precon = PreconKind::from_name(name)?;
        Ok(self)
    }

    /// 校验配置自洽
    pub fn validate(&self) -> PfResult<()> {
        if self.rtol <= 0.0 {
            return Err(PfError::invalid_config(
                "rtol",
                self.rtol.to_string(),
                "必须为正",
            ));
        }
        if self.atol < 0.0 {
            return Err(PfError::invalid_config(
                "atol",
                self.atol.to_string(),
                "不能为负",
            ));
        }
        if self.dtol <= 1.0 {
            return Err(PfError::invalid_config(
                "dtol",
                self.dtol.to_string(),
                "必须大于 1",
            ));
        }
        if self.max_iter == 0 {
            return Err(PfError::invalid_config("maxits", "0", "必须大于 0"));
        }
        if self.gmres_restart == 0 {
            return Err(PfError::invalid_config("gmres_max_steps", "0", "必须大于 0"));
        }
        if self.chebyshev_min >= self.chebyshev_max {
            return Err(PfError::invalid_config(
                "chebyshev_min",
                self.chebyshev_min.to_string(),
                "谱下界必须小于上界",
            ));
        }
        if let Some(inner) = &self.precon_options {
            if inner.precon == PreconKind::User {
                return Err(PfError::invalid_config(
                    "precon.pctype",
                    "user",
                    "内层求解不允许再嵌套用户预条件器",
                ));
            }
            inner.validate()?;
        }
        Ok(())
    }
}
