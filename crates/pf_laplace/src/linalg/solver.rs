// crates/pf_laplace/src/linalg/solver.rs

//! 迭代线性求解器
//!
//! 提供用于求解稀疏线性系统 Ax = b 的 Krylov 迭代方法。
//!
//! # 求解器类型
//!
//! - [`RichardsonSolver`]: 阻尼 Richardson 迭代
//! - [`ChebyshevSolver`]: Chebyshev 迭代（需给定谱界）
//! - [`ConjugateGradient`]: 预条件共轭梯度法（对称正定矩阵）
//! - [`BiCgStabSolver`]: 双共轭梯度稳定法（非对称矩阵）
//! - [`GmresSolver`]: 重启 GMRES(m)，支持左/右预条件
//!
//! # 收敛判据
//!
//! 残差满足 `||r|| < atol` 或 `||r||/||r0|| < rtol` 判定收敛；
//! `||r|| > dtol * ||r0||` 判定发散。状态通过 [`SolverStatus`]
//! 上报，由调用方决定哪些失败可重试。
//!
//! # 使用示例
//!
//! ```ignore
//! use pf_laplace::linalg::{
//!     CsrMatrix, ConjugateGradient, JacobiPreconditioner, IterConfig, IterativeSolver,
//! };
//!
//! let matrix: CsrMatrix = /* ... */;
//! let b = vec![1.0, 2.0, 3.0];
//! let mut x = vec![0.0; 3];
//!
//! let precond = JacobiPreconditioner::from_matrix(&matrix);
//! let mut solver = ConjugateGradient::new(IterConfig::new(1e-8, 100));
//! let result = solver.solve(&matrix, &b, &mut x, &precond)?;
//! ```

use super::csr::CsrMatrix;
use super::preconditioner::Preconditioner;
use super::vector_ops::{axpy, copy, dot, norm2, scale, sub};
use pf_foundation::scalar::tol;
use pf_foundation::{PfResult, Scalar};
use serde::{Deserialize, Serialize};

// ============================================================================
// 配置与结果
// ============================================================================

/// 迭代求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterConfig {
    /// 相对收敛容差
    pub rtol: f64,
    /// 绝对收敛容差
    pub atol: f64,
    /// 发散判定因子（残差超过 dtol * 初始残差即发散）
    pub dtol: f64,
    /// 最大迭代次数
    pub max_iter: usize,
}

impl Default for IterConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-14,
            dtol: 1e6,
            max_iter: 1000,
        }
    }
}

impl IterConfig {
    /// 创建求解器配置
    pub fn new(rtol: f64, max_iter: usize) -> Self {
        Self {
            rtol,
            max_iter,
            ..Default::default()
        }
    }

    /// 设置绝对容差
    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }

    /// 设置发散因子
    pub fn with_dtol(mut self, dtol: f64) -> Self {
        self.dtol = dtol;
        self
    }

    /// 收敛阈值：max(atol, rtol·‖b‖)
    ///
    /// 相对容差参照右端范数而非初始残差——否则一个已经
    /// 很好的初始猜测永远达不到"相对下降"判据。‖b‖ 接近零时
    /// 退化为绝对容差。
    fn threshold(&self, b_norm: Scalar) -> Scalar {
        if b_norm < Scalar::MIN_POSITIVE {
            self.atol
        } else {
            self.atol.max(self.rtol * b_norm)
        }
    }
}

/// 求解器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// 收敛
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
    /// 发散
    Diverged,
    /// 停滞
    Stagnated,
}

/// 求解器结果
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// 求解状态
    pub status: SolverStatus,
    /// 迭代次数
    pub iterations: usize,
    /// 最终残差范数
    pub residual_norm: Scalar,
    /// 初始残差范数
    pub initial_residual_norm: Scalar,
    /// 相对残差
    pub relative_residual: Scalar,
}

impl SolverResult {
    /// 是否成功收敛
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    fn make(
        status: SolverStatus,
        iterations: usize,
        residual: Scalar,
        initial: Scalar,
    ) -> Self {
        Self {
            status,
            iterations,
            residual_norm: residual,
            initial_residual_norm: initial,
            relative_residual: if initial > 0.0 { residual / initial } else { 0.0 },
        }
    }
}

/// 预条件作用侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PcSide {
    /// 左预条件：求解 M⁻¹A x = M⁻¹b
    Left,
    /// 右预条件：求解 A M⁻¹ u = b, x = M⁻¹u
    Right,
}

// ============================================================================
// 求解器 trait
// ============================================================================

/// 迭代求解器 trait
///
/// `x` 输入为初始猜测，输出为解。预条件步可失败
/// （用户自定义预条件器内部是一次完整的嵌套求解），
/// 失败通过 `Err` 传播，与"未收敛"（`Ok` + 状态）区分。
pub trait IterativeSolver {
    /// 求解线性系统 Ax = b
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[Scalar],
        x: &mut [Scalar],
        precond: &dyn Preconditioner,
    ) -> PfResult<SolverResult>;

    /// 获取求解器名称
    fn name(&self) -> &'static str;
}

// ============================================================================
// Richardson 迭代
// ============================================================================

/// 阻尼 Richardson 迭代
///
/// x ← x + ω M⁻¹ (b - Ax)
///
/// 仅当迭代矩阵谱半径小于 1 时收敛，依赖好的预条件器与阻尼因子。
pub struct RichardsonSolver {
    config: IterConfig,
    /// 阻尼因子 ω
    damping: Scalar,
    r: Vec<Scalar>,
    z: Vec<Scalar>,
    av: Vec<Scalar>,
}

impl RichardsonSolver {
    /// 创建 Richardson 求解器
    pub fn new(config: IterConfig, damping: Scalar) -> Self {
        Self {
            config,
            damping,
            r: Vec::new(),
            z: Vec::new(),
            av: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.z = vec![0.0; n];
            self.av = vec![0.0; n];
        }
    }
}

impl IterativeSolver for RichardsonSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[Scalar],
        x: &mut [Scalar],
        precond: &dyn Preconditioner,
    ) -> PfResult<SolverResult> {
        let n = b.len();
        self.ensure_workspace(n);

        matrix.mul_vec(x, &mut self.av);
        sub(b, &self.av, &mut self.r);

        let threshold = self.config.threshold(norm2(b));
        let initial_norm = norm2(&self.r);
        if initial_norm < threshold {
            return Ok(SolverResult::make(
                SolverStatus::Converged,
                0,
                initial_norm,
                initial_norm,
            ));
        }

        for iter in 0..self.config.max_iter {
            precond.apply(&self.r, &mut self.z)?;
            axpy(self.damping, &self.z, x);

            // 重算真残差，阻尼迭代对累积误差最敏感
            matrix.mul_vec(x, &mut self.av);
            sub(b, &self.av, &mut self.r);

            let res_norm = norm2(&self.r);
            log::trace!("richardson iter {}: residual = {:.6e}", iter + 1, res_norm);

            if res_norm < threshold {
                return Ok(SolverResult::make(
                    SolverStatus::Converged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }
            if res_norm > self.config.dtol * initial_norm {
                return Ok(SolverResult::make(
                    SolverStatus::Diverged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }
        }

        let res_norm = norm2(&self.r);
        Ok(SolverResult::make(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            res_norm,
            initial_norm,
        ))
    }

    fn name(&self) -> &'static str {
        "richardson"
    }
}

// ============================================================================
// Chebyshev 迭代
// ============================================================================

/// Chebyshev 迭代
///
/// 三项递推避免内积（Templates 算法），需要给定矩阵谱的
/// 上下界 [λmin, λmax]。谱界不准时收敛显著变慢甚至发散。
pub struct ChebyshevSolver {
    config: IterConfig,
    /// 谱下界估计
    eig_min: Scalar,
    /// 谱上界估计
    eig_max: Scalar,
    r: Vec<Scalar>,
    z: Vec<Scalar>,
    p: Vec<Scalar>,
    ap: Vec<Scalar>,
}

impl ChebyshevSolver {
    /// 创建 Chebyshev 求解器
    pub fn new(config: IterConfig, eig_min: Scalar, eig_max: Scalar) -> Self {
        Self {
            config,
            eig_min,
            eig_max,
            r: Vec::new(),
            z: Vec::new(),
            p: Vec::new(),
            ap: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.z = vec![0.0; n];
            self.p = vec![0.0; n];
            self.ap = vec![0.0; n];
        }
    }
}

impl IterativeSolver for ChebyshevSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[Scalar],
        x: &mut [Scalar],
        precond: &dyn Preconditioner,
    ) -> PfResult<SolverResult> {
        let n = b.len();
        self.ensure_workspace(n);

        let d = 0.5 * (self.eig_max + self.eig_min);
        let c = 0.5 * (self.eig_max - self.eig_min);

        matrix.mul_vec(x, &mut self.ap);
        sub(b, &self.ap, &mut self.r);

        let threshold = self.config.threshold(norm2(b));
        let initial_norm = norm2(&self.r);
        if initial_norm < threshold {
            return Ok(SolverResult::make(
                SolverStatus::Converged,
                0,
                initial_norm,
                initial_norm,
            ));
        }

        let mut alpha = 0.0;

        for iter in 0..self.config.max_iter {
            precond.apply(&self.r, &mut self.z)?;

            if iter == 0 {
                copy(&self.z, &mut self.p);
                alpha = 1.0 / d;
            } else {
                let beta = (c * alpha * 0.5).powi(2);
                alpha = 1.0 / (d - beta / alpha);
                for i in 0..n {
                    self.p[i] = self.z[i] + beta * self.p[i];
                }
            }

            axpy(alpha, &self.p, x);
            matrix.mul_vec(&self.p, &mut self.ap);
            axpy(-alpha, &self.ap, &mut self.r);

            let res_norm = norm2(&self.r);
            log::trace!("chebyshev iter {}: residual = {:.6e}", iter + 1, res_norm);

            if res_norm < threshold {
                return Ok(SolverResult::make(
                    SolverStatus::Converged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }
            if res_norm > self.config.dtol * initial_norm {
                return Ok(SolverResult::make(
                    SolverStatus::Diverged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }
        }

        let res_norm = norm2(&self.r);
        Ok(SolverResult::make(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            res_norm,
            initial_norm,
        ))
    }

    fn name(&self) -> &'static str {
        "chebyshev"
    }
}

// ============================================================================
// 预条件共轭梯度法
// ============================================================================

/// 预条件共轭梯度法求解器
///
/// 适用于对称正定矩阵；预条件器为恒等时退化为普通 CG。
pub struct ConjugateGradient {
    config: IterConfig,
    r: Vec<Scalar>,
    z: Vec<Scalar>,
    p: Vec<Scalar>,
    ap: Vec<Scalar>,
}

impl ConjugateGradient {
    /// 创建共轭梯度求解器
    pub fn new(config: IterConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            z: Vec::new(),
            p: Vec::new(),
            ap: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.z = vec![0.0; n];
            self.p = vec![0.0; n];
            self.ap = vec![0.0; n];
        }
    }
}

impl IterativeSolver for ConjugateGradient {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[Scalar],
        x: &mut [Scalar],
        precond: &dyn Preconditioner,
    ) -> PfResult<SolverResult> {
        let n = b.len();
        self.ensure_workspace(n);

        // r = b - A*x
        matrix.mul_vec(x, &mut self.r);
        for i in 0..n {
            self.r[i] = b[i] - self.r[i];
        }

        let threshold = self.config.threshold(norm2(b));
        let initial_norm = norm2(&self.r);
        if initial_norm < threshold {
            return Ok(SolverResult::make(
                SolverStatus::Converged,
                0,
                initial_norm,
                initial_norm,
            ));
        }

        // z = M⁻¹ r, p = z
        precond.apply(&self.r, &mut self.z)?;
        copy(&self.z, &mut self.p);
        let mut rz = dot(&self.r, &self.z);

        for iter in 0..self.config.max_iter {
            matrix.mul_vec(&self.p, &mut self.ap);

            let pap = dot(&self.p, &self.ap);
            if pap.abs() < tol::STAGNATION {
                return Ok(SolverResult::make(
                    SolverStatus::Stagnated,
                    iter,
                    norm2(&self.r),
                    initial_norm,
                ));
            }

            let alpha = rz / pap;
            axpy(alpha, &self.p, x);
            axpy(-alpha, &self.ap, &mut self.r);

            let res_norm = norm2(&self.r);
            log::trace!("cg iter {}: residual = {:.6e}", iter + 1, res_norm);

            if res_norm < threshold {
                return Ok(SolverResult::make(
                    SolverStatus::Converged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }
            if res_norm > self.config.dtol * initial_norm {
                return Ok(SolverResult::make(
                    SolverStatus::Diverged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }

            precond.apply(&self.r, &mut self.z)?;
            let rz_new = dot(&self.r, &self.z);
            let beta = rz_new / rz;
            rz = rz_new;

            for i in 0..n {
                self.p[i] = self.z[i] + beta * self.p[i];
            }
        }

        Ok(SolverResult::make(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        ))
    }

    fn name(&self) -> &'static str {
        "cg"
    }
}

// ============================================================================
// BiCGStab
// ============================================================================

/// 双共轭梯度稳定法求解器
///
/// 适用于非对称矩阵。
pub struct BiCgStabSolver {
    config: IterConfig,
    r: Vec<Scalar>,
    /// 影子残差，迭代中保持不变
    r0: Vec<Scalar>,
    p: Vec<Scalar>,
    v: Vec<Scalar>,
    s: Vec<Scalar>,
    t: Vec<Scalar>,
    p_hat: Vec<Scalar>,
    s_hat: Vec<Scalar>,
}

impl BiCgStabSolver {
    /// 创建 BiCGStab 求解器
    pub fn new(config: IterConfig) -> Self {
        Self {
            config,
            r: Vec::new(),
            r0: Vec::new(),
            p: Vec::new(),
            v: Vec::new(),
            s: Vec::new(),
            t: Vec::new(),
            p_hat: Vec::new(),
            s_hat: Vec::new(),
        }
    }

    fn ensure_workspace(&mut self, n: usize) {
        if self.r.len() != n {
            self.r = vec![0.0; n];
            self.r0 = vec![0.0; n];
            self.p = vec![0.0; n];
            self.v = vec![0.0; n];
            self.s = vec![0.0; n];
            self.t = vec![0.0; n];
            self.p_hat = vec![0.0; n];
            self.s_hat = vec![0.0; n];
        }
    }
}

impl IterativeSolver for BiCgStabSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[Scalar],
        x: &mut [Scalar],
        precond: &dyn Preconditioner,
    ) -> PfResult<SolverResult> {
        let n = b.len();
        self.ensure_workspace(n);

        matrix.mul_vec(x, &mut self.r);
        for i in 0..n {
            self.r[i] = b[i] - self.r[i];
        }

        let threshold = self.config.threshold(norm2(b));
        let initial_norm = norm2(&self.r);
        if initial_norm < threshold {
            return Ok(SolverResult::make(
                SolverStatus::Converged,
                0,
                initial_norm,
                initial_norm,
            ));
        }

        copy(&self.r, &mut self.r0);

        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;

        self.v.fill(0.0);
        self.p.fill(0.0);

        for iter in 0..self.config.max_iter {
            let rho = dot(&self.r0, &self.r);

            if rho.abs() < tol::STAGNATION {
                if iter == 0 {
                    // 初始残差与影子残差正交，已经收敛
                    return Ok(SolverResult::make(
                        SolverStatus::Converged,
                        0,
                        initial_norm,
                        initial_norm,
                    ));
                }
                return Ok(SolverResult::make(
                    SolverStatus::Stagnated,
                    iter,
                    norm2(&self.r),
                    initial_norm,
                ));
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            // p = r + beta * (p - omega * v)
            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            // p_hat = M⁻¹ p, v = A p_hat
            precond.apply(&self.p, &mut self.p_hat)?;
            matrix.mul_vec(&self.p_hat, &mut self.v);

            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < tol::STAGNATION {
                return Ok(SolverResult::make(
                    SolverStatus::Stagnated,
                    iter,
                    norm2(&self.r),
                    initial_norm,
                ));
            }
            alpha = rho / r0v;

            // s = r - alpha * v
            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }

            let s_norm = norm2(&self.s);
            if s_norm < threshold {
                axpy(alpha, &self.p_hat, x);
                return Ok(SolverResult::make(
                    SolverStatus::Converged,
                    iter + 1,
                    s_norm,
                    initial_norm,
                ));
            }

            // s_hat = M⁻¹ s, t = A s_hat
            precond.apply(&self.s, &mut self.s_hat)?;
            matrix.mul_vec(&self.s_hat, &mut self.t);

            let tt = dot(&self.t, &self.t);
            omega = if tt.abs() < tol::STAGNATION {
                1.0
            } else {
                dot(&self.t, &self.s) / tt
            };

            if omega.abs() < tol::STAGNATION {
                axpy(alpha, &self.p_hat, x);
                return Ok(SolverResult::make(
                    SolverStatus::Stagnated,
                    iter + 1,
                    norm2(&self.s),
                    initial_norm,
                ));
            }

            // x = x + alpha * p_hat + omega * s_hat
            axpy(alpha, &self.p_hat, x);
            axpy(omega, &self.s_hat, x);

            // r = s - omega * t
            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }

            let res_norm = norm2(&self.r);
            log::trace!("bcgs iter {}: residual = {:.6e}", iter + 1, res_norm);

            if res_norm < threshold {
                return Ok(SolverResult::make(
                    SolverStatus::Converged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }
            if res_norm > self.config.dtol * initial_norm {
                return Ok(SolverResult::make(
                    SolverStatus::Diverged,
                    iter + 1,
                    res_norm,
                    initial_norm,
                ));
            }
        }

        Ok(SolverResult::make(
            SolverStatus::MaxIterationsReached,
            self.config.max_iter,
            norm2(&self.r),
            initial_norm,
        ))
    }

    fn name(&self) -> &'static str {
        "bcgs"
    }
}

// ============================================================================
// GMRES(m)
// ============================================================================

/// Givens 旋转系数 (c, s)：使 (a, b) → (r, 0)
fn givens_rotation(a: Scalar, b: Scalar) -> (Scalar, Scalar) {
    if b.abs() < tol::STAGNATION {
        (1.0, 0.0)
    } else if b.abs() > a.abs() {
        let tau = -a / b;
        let s = 1.0 / (1.0 + tau * tau).sqrt();
        (s * tau, s)
    } else {
        let tau = -b / a;
        let c = 1.0 / (1.0 + tau * tau).sqrt();
        (c, c * tau)
    }
}

#[inline]
fn apply_rotation(c: Scalar, s: Scalar, a: &mut Scalar, b: &mut Scalar) {
    let ta = *a;
    let tb = *b;
    *a = c * ta - s * tb;
    *b = s * ta + c * tb;
}

/// 重启 GMRES(m) 求解器
///
/// Arnoldi 迭代配合修正 Gram-Schmidt 构造正交 Krylov 基，
/// Givens 旋转把上 Hessenberg 矩阵化为上三角并顺带给出残差估计。
/// 基向量达到 m 个仍未收敛时从当前近似解重启。
///
/// 预条件作用侧可选：左预条件求解 M⁻¹A x = M⁻¹b，残差估计是
/// 预条件残差；右预条件求解 A M⁻¹ u = b，残差估计即真残差。
/// 每轮重启开始时都用真残差复核收敛与发散。
pub struct GmresSolver {
    config: IterConfig,
    /// 重启前的 Krylov 子空间维数
    restart: usize,
    /// 预条件作用侧
    side: PcSide,
}

impl GmresSolver {
    /// 创建 GMRES 求解器
    pub fn new(config: IterConfig, restart: usize, side: PcSide) -> Self {
        Self {
            config,
            restart,
            side,
        }
    }
}

impl IterativeSolver for GmresSolver {
    fn solve(
        &mut self,
        matrix: &CsrMatrix,
        b: &[Scalar],
        x: &mut [Scalar],
        precond: &dyn Preconditioner,
    ) -> PfResult<SolverResult> {
        let n = b.len();
        let m = self.restart.max(1).min(n);
        let h_rows = m + 1;

        let mut av = vec![0.0; n];
        let mut r = vec![0.0; n];
        let mut zscratch = vec![0.0; n];

        matrix.mul_vec(x, &mut av);
        sub(b, &av, &mut r);
        let threshold = self.config.threshold(norm2(b));
        let initial_norm = norm2(&r);
        if initial_norm < threshold {
            return Ok(SolverResult::make(
                SolverStatus::Converged,
                0,
                initial_norm,
                initial_norm,
            ));
        }

        let mut total = 0usize;

        loop {
            // 每轮重启用真残差复核
            matrix.mul_vec(x, &mut av);
            sub(b, &av, &mut r);
            let res_norm = norm2(&r);

            if res_norm < threshold {
                return Ok(SolverResult::make(
                    SolverStatus::Converged,
                    total,
                    res_norm,
                    initial_norm,
                ));
            }
            if res_norm > self.config.dtol * initial_norm {
                return Ok(SolverResult::make(
                    SolverStatus::Diverged,
                    total,
                    res_norm,
                    initial_norm,
                ));
            }
            if total >= self.config.max_iter {
                return Ok(SolverResult::make(
                    SolverStatus::MaxIterationsReached,
                    total,
                    res_norm,
                    initial_norm,
                ));
            }

            // 初始基向量
            let mut v0 = vec![0.0; n];
            match self.side {
                PcSide::Left => precond.apply(&r, &mut v0)?,
                PcSide::Right => copy(&r, &mut v0),
            }
            let beta = norm2(&v0);
            if beta < tol::STAGNATION {
                return Ok(SolverResult::make(
                    SolverStatus::Stagnated,
                    total,
                    res_norm,
                    initial_norm,
                ));
            }
            scale(1.0 / beta, &mut v0);

            let mut basis: Vec<Vec<Scalar>> = Vec::with_capacity(m + 1);
            basis.push(v0);

            // 上 Hessenberg 矩阵，按列存储: H[i][j] = h[j * h_rows + i]
            let mut h = vec![0.0; h_rows * m];
            let mut givens: Vec<(Scalar, Scalar)> = Vec::with_capacity(m);
            let mut g = vec![0.0; m + 1];
            g[0] = beta;

            let mut k = 0usize;

            // Arnoldi 迭代
            for j in 0..m {
                if total >= self.config.max_iter {
                    break;
                }
                total += 1;

                let mut w = vec![0.0; n];
                match self.side {
                    PcSide::Left => {
                        matrix.mul_vec(&basis[j], &mut av);
                        precond.apply(&av, &mut w)?;
                    }
                    PcSide::Right => {
                        precond.apply(&basis[j], &mut zscratch)?;
                        matrix.mul_vec(&zscratch, &mut w);
                    }
                }

                // 修正 Gram-Schmidt 正交化
                for i in 0..=j {
                    let h_ij = dot(&w, &basis[i]);
                    h[j * h_rows + i] = h_ij;
                    axpy(-h_ij, &basis[i], &mut w);
                }

                let h_next = norm2(&w);
                h[j * h_rows + j + 1] = h_next;

                if h_next > tol::STAGNATION {
                    scale(1.0 / h_next, &mut w);
                    basis.push(w);
                } else {
                    // 幸运中断：残差已落在当前子空间内
                    basis.push(vec![0.0; n]);
                }

                // 应用此前累积的 Givens 旋转到第 j 列
                for (i, &(c, s)) in givens.iter().enumerate() {
                    let (a_idx, b_idx) = (j * h_rows + i, j * h_rows + i + 1);
                    let (mut ha, mut hb) = (h[a_idx], h[b_idx]);
                    apply_rotation(c, s, &mut ha, &mut hb);
                    h[a_idx] = ha;
                    h[b_idx] = hb;
                }

                // 新旋转消去 H[j+1, j]
                let (c, s) = givens_rotation(h[j * h_rows + j], h[j * h_rows + j + 1]);
                {
                    let (a_idx, b_idx) = (j * h_rows + j, j * h_rows + j + 1);
                    let (mut ha, mut hb) = (h[a_idx], h[b_idx]);
                    apply_rotation(c, s, &mut ha, &mut hb);
                    h[a_idx] = ha;
                    h[b_idx] = hb;
                }
                {
                    let (mut ga, mut gb) = (g[j], g[j + 1]);
                    apply_rotation(c, s, &mut ga, &mut gb);
                    g[j] = ga;
                    g[j + 1] = gb;
                }
                givens.push((c, s));

                k = j + 1;
                let estimate = g[j + 1].abs();
                log::trace!("gmres iter {}: residual estimate = {:.6e}", total, estimate);

                if estimate < threshold {
                    break;
                }
                if h_next <= tol::STAGNATION {
                    break;
                }
            }

            if k == 0 {
                continue;
            }

            // 回代求解上三角系统 H y = g
            let mut y = vec![0.0; k];
            for i in (0..k).rev() {
                let mut sum = g[i];
                for l in (i + 1)..k {
                    sum -= h[l * h_rows + i] * y[l];
                }
                let h_ii = h[i * h_rows + i];
                if h_ii.abs() < tol::STAGNATION {
                    return Ok(SolverResult::make(
                        SolverStatus::Stagnated,
                        total,
                        res_norm,
                        initial_norm,
                    ));
                }
                y[i] = sum / h_ii;
            }

            // 更新解
            match self.side {
                PcSide::Left => {
                    for i in 0..k {
                        axpy(y[i], &basis[i], x);
                    }
                }
                PcSide::Right => {
                    let mut corr = vec![0.0; n];
                    for i in 0..k {
                        axpy(y[i], &basis[i], &mut corr);
                    }
                    precond.apply(&corr, &mut zscratch)?;
                    axpy(1.0, &zscratch, x);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "gmres"
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::csr::{CsrBuilder, CsrMatrix};
    use crate::linalg::preconditioner::{IdentityPreconditioner, JacobiPreconditioner};

    /// 三对角对称正定矩阵 (4, -1)
    fn spd_matrix(n: usize) -> CsrMatrix {
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 4.0);
            if i > 0 {
                builder.set(i, i - 1, -1.0);
            }
            if i < n - 1 {
                builder.set(i, i + 1, -1.0);
            }
        }
        builder.build()
    }

    /// 非对称但对角占优的矩阵
    fn nonsymmetric_matrix(n: usize) -> CsrMatrix {
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 5.0);
            if i > 0 {
                builder.set(i, i - 1, -2.0);
            }
            if i < n - 1 {
                builder.set(i, i + 1, -1.0);
            }
        }
        builder.build()
    }

    fn check_residual(matrix: &CsrMatrix, b: &[Scalar], x: &[Scalar], tol: Scalar) {
        let mut r = vec![0.0; b.len()];
        matrix.mul_vec(x, &mut r);
        for i in 0..b.len() {
            r[i] = b[i] - r[i];
        }
        assert!(norm2(&r) < tol, "residual too large: {}", norm2(&r));
    }

    #[test]
    fn test_cg_spd() {
        let matrix = spd_matrix(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];

        let mut solver = ConjugateGradient::new(IterConfig::new(1e-10, 100));
        let precond = JacobiPreconditioner::from_matrix(&matrix);
        let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

        assert!(result.is_converged());
        check_residual(&matrix, &b, &x, 1e-8);
    }

    #[test]
    fn test_cg_already_converged() {
        let matrix = spd_matrix(5);
        let x_exact = vec![0.25; 5];
        let mut b = vec![0.0; 5];
        matrix.mul_vec(&x_exact, &mut b);

        let mut x = x_exact.clone();
        let mut solver = ConjugateGradient::new(IterConfig::new(1e-10, 100).with_atol(1e-12));
        let precond = IdentityPreconditioner::new();
        let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

        assert!(result.is_converged());
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_bicgstab_nonsymmetric() {
        let matrix = nonsymmetric_matrix(30);
        let b: Vec<Scalar> = (0..30).map(|i| (i as Scalar).sin()).collect();
        let mut x = vec![0.0; 30];

        let mut solver = BiCgStabSolver::new(IterConfig::new(1e-10, 200));
        let precond = JacobiPreconditioner::from_matrix(&matrix);
        let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

        assert!(result.is_converged());
        check_residual(&matrix, &b, &x, 1e-7);
    }

    #[test]
    fn test_gmres_left_and_right() {
        let matrix = nonsymmetric_matrix(30);
        let b: Vec<Scalar> = (0..30).map(|i| 1.0 + (i % 3) as Scalar).collect();

        for side in [PcSide::Left, PcSide::Right] {
            let mut x = vec![0.0; 30];
            let mut solver = GmresSolver::new(IterConfig::new(1e-10, 500), 10, side);
            let precond = JacobiPreconditioner::from_matrix(&matrix);
            let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

            assert!(result.is_converged(), "side {:?} not converged", side);
            check_residual(&matrix, &b, &x, 1e-7);
        }
    }

    #[test]
    fn test_gmres_restart_progress() {
        // 重启维数远小于问题规模时仍应收敛
        let matrix = spd_matrix(50);
        let b = vec![1.0; 50];
        let mut x = vec![0.0; 50];

        let mut solver = GmresSolver::new(IterConfig::new(1e-10, 2000), 5, PcSide::Left);
        let precond = IdentityPreconditioner::new();
        let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

        assert!(result.is_converged());
        check_residual(&matrix, &b, &x, 1e-7);
    }

    #[test]
    fn test_richardson_with_jacobi() {
        // D⁻¹A 的谱落在 (0.5, 1.5) 内，阻尼 1.0 时迭代矩阵谱半径 < 1
        let matrix = spd_matrix(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];

        let mut solver = RichardsonSolver::new(IterConfig::new(1e-10, 500), 1.0);
        let precond = JacobiPreconditioner::from_matrix(&matrix);
        let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

        assert!(result.is_converged());
        check_residual(&matrix, &b, &x, 1e-7);
    }

    #[test]
    fn test_richardson_divergence_detected() {
        // 无预条件时 I - A 谱半径 > 1，必须上报发散而不是死循环
        let matrix = spd_matrix(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];

        let mut solver =
            RichardsonSolver::new(IterConfig::new(1e-10, 10_000).with_dtol(1e4), 1.0);
        let precond = IdentityPreconditioner::new();
        let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

        assert_eq!(result.status, SolverStatus::Diverged);
    }

    #[test]
    fn test_chebyshev_with_bounds() {
        // (4, -1) 三对角矩阵谱落在 (2, 6) 内
        let matrix = spd_matrix(20);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];

        let mut solver = ChebyshevSolver::new(IterConfig::new(1e-10, 500), 2.0, 6.0);
        let precond = IdentityPreconditioner::new();
        let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

        assert!(result.is_converged());
        check_residual(&matrix, &b, &x, 1e-7);
    }

    #[test]
    fn test_iteration_cap_reported() {
        let matrix = spd_matrix(50);
        let b = vec![1.0; 50];

        type MakeSolver = fn(IterConfig) -> Box<dyn IterativeSolver>;
        let makers: [MakeSolver; 3] = [
            |cfg| Box::new(ConjugateGradient::new(cfg)),
            |cfg| Box::new(BiCgStabSolver::new(cfg)),
            |cfg| Box::new(GmresSolver::new(cfg, 30, PcSide::Left)),
        ];
        for make in makers {
            let mut x = vec![0.0; 50];
            let mut solver = make(IterConfig::new(1e-14, 2).with_atol(1e-30));
            let precond = IdentityPreconditioner::new();
            let result = solver.solve(&matrix, &b, &mut x, &precond).unwrap();

            assert_eq!(
                result.status,
                SolverStatus::MaxIterationsReached,
                "{} should hit the iteration cap",
                solver.name()
            );
        }
    }
}
