// crates/pf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `PfError` 枚举和 `PfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 设计原则
//!
//! 1. **分类明确**: 配置错误与一致性错误总是致命的；收敛失败分为
//!    可重试（迭代超限）和致命（其它发散）两类
//! 2. **易用性**: 提供便捷的构造方法
//! 3. **不吞错**: 所有错误都向上传播，本层不做任何重试
//!
//! # 示例
//!
//! ```
//! use pf_foundation::error::{PfError, PfResult};
//!
//! fn resolve_method(name: &str) -> PfResult<()> {
//!     Err(PfError::unknown_name("Krylov 方法", name, "cg, gmres"))
//! }
//! ```

use thiserror::Error;

/// 统一结果类型
pub type PfResult<T> = Result<T, PfError>;

/// PlasmaFlow 错误类型
///
/// 核心错误类型，用于整个项目。求解器收敛失败通过
/// [`PfError::is_recoverable`] 区分可重试与致命两类。
#[derive(Error, Debug)]
pub enum PfError {
    // ========================================================================
    // 配置类错误（致命，构造期或求解入口抛出）
    // ========================================================================

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 未知的枚举名称（求解方法、预条件器等）
    #[error("未知的{kind}: '{name}' (可用: {known})")]
    UnknownName {
        /// 枚举类别描述
        kind: &'static str,
        /// 输入的名称
        name: String,
        /// 可用名称列表
        known: &'static str,
    },

    /// 设置了未实现的标志位
    #[error("{kind}标志位未实现: 0x{flags:x} (已实现掩码 0x{implemented:x})")]
    UnimplementedFlag {
        /// 标志类别描述
        kind: &'static str,
        /// 输入的标志位
        flags: u32,
        /// 已实现的掩码
        implemented: u32,
    },

    // ========================================================================
    // 一致性类错误（致命，表示核心不变量被破坏）
    // ========================================================================

    /// 一致性校验失败
    #[error("一致性校验失败: {message}")]
    Consistency {
        /// 具体错误信息
        message: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    // ========================================================================
    // 收敛类错误
    // ========================================================================

    /// 迭代次数超限（可重试：调用方可缩小时间步后重试）
    #[error("迭代次数超限: {iterations} 次后残差 {residual:.3e}, 可缩小步长后重试")]
    IterationLimit {
        /// 已执行的迭代次数
        iterations: usize,
        /// 终止时的残差范数
        residual: f64,
    },

    /// 求解发散（致命）
    #[error("求解发散: {reason}, {iterations} 次迭代后残差 {residual:.3e}")]
    Diverged {
        /// 发散原因描述
        reason: String,
        /// 已执行的迭代次数
        iterations: usize,
        /// 终止时的残差范数
        residual: f64,
    },

    /// 矩阵奇异（直接法主元为零）
    #[error("矩阵奇异: 第{row}行主元为零")]
    Singular {
        /// 主元所在行
        row: usize,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl PfError {
    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 未知的枚举名称
    pub fn unknown_name(kind: &'static str, name: impl Into<String>, known: &'static str) -> Self {
        Self::UnknownName {
            kind,
            name: name.into(),
            known,
        }
    }

    /// 未实现的标志位
    pub fn unimplemented_flag(kind: &'static str, flags: u32, implemented: u32) -> Self {
        Self::UnimplementedFlag {
            kind,
            flags,
            implemented,
        }
    }

    /// 一致性校验失败
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 迭代次数超限
    pub fn iteration_limit(iterations: usize, residual: f64) -> Self {
        Self::IterationLimit {
            iterations,
            residual,
        }
    }

    /// 求解发散
    pub fn diverged(reason: impl Into<String>, iterations: usize, residual: f64) -> Self {
        Self::Diverged {
            reason: reason.into(),
            iterations,
            residual,
        }
    }

    /// 矩阵奇异
    pub fn singular(row: usize) -> Self {
        Self::Singular { row }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl PfError {
    /// 是否为可重试的收敛失败
    ///
    /// 仅迭代超限可重试；调用方应缩小时间步等参数后重新求解。
    /// 其余错误一律致命。
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::IterationLimit { .. })
    }

    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> PfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> PfResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 测试
// ========================================================================
