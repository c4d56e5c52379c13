// crates/pf_laplace/src/linalg/preconditioner.rs

//! 预条件器模块
//!
//! 预条件器用于加速迭代求解器的收敛。核心思想是将原问题 Ax = b
//! 转换为条件数更好的问题 M⁻¹Ax = M⁻¹b。
//!
//! # 预条件器类型
//!
//! - [`IdentityPreconditioner`]: 恒等预条件器（无预条件）
//! - [`JacobiPreconditioner`]: Jacobi 预条件器（对角预条件）
//! - [`SsorPreconditioner`]: 对称逐次超松弛
//! - [`Ilu0Preconditioner`]: ILU(0) 不完全 LU 分解
//!
//! `apply` 是可失败操作：用户自定义预条件器（外层求解器把另一个
//! 完整的反演实例当作黑盒预条件步调用）可能在内部求解时失败，
//! 该失败必须向外层 Krylov 循环传播而不是被吞掉。
//!
//! # 使用示例
//!
//! ```ignore
//! use pf_laplace::linalg::{CsrMatrix, JacobiPreconditioner, Preconditioner};
//!
//! let matrix: CsrMatrix = /* ... */;
//! let precond = JacobiPreconditioner::from_matrix(&matrix);
//!
//! let r = vec![1.0, 2.0, 3.0];
//! let mut z = vec![0.0; 3];
//! precond.apply(&r, &mut z)?;  // z = M⁻¹ * r
//! ```

use super::csr::CsrMatrix;
use pf_foundation::scalar::tol;
use pf_foundation::{PfResult, Scalar};

/// 预条件器 trait
///
/// 核心操作是 `apply`: z = M⁻¹ * r
pub trait Preconditioner {
    /// 应用预条件器: z = M⁻¹ * r
    ///
    /// # 参数
    ///
    /// - `r`: 输入向量（通常是残差）
    /// - `z`: 输出向量（预条件后的方向）
    fn apply(&self, r: &[Scalar], z: &mut [Scalar]) -> PfResult<()>;

    /// 获取预条件器名称
    fn name(&self) -> &'static str;

    /// 更新预条件器（矩阵值变化但结构不变时）
    fn update(&mut self, matrix: &CsrMatrix);
}

// =============================================================================
// 恒等预条件器
// =============================================================================

/// 恒等预条件器（无预条件）
///
/// M = I，即 z = r
#[derive(Debug, Clone, Default)]
pub struct IdentityPreconditioner;

impl IdentityPreconditioner {
    /// 创建恒等预条件器
    pub fn new() -> Self {
        Self
    }
}

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[Scalar], z: &mut [Scalar]) -> PfResult<()> {
        z.copy_from_slice(r);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "identity"
    }

    fn update(&mut self, _matrix: &CsrMatrix) {}
}

// =============================================================================
// Jacobi 预条件器
// =============================================================================

/// Jacobi 预条件器（对角预条件）
///
/// M = diag(A)，即 z_i = r_i / A_ii
///
/// 计算开销极低，适用于对角占优矩阵。对角元为零的行退化为恒等。
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    /// 对角元素的倒数
    inv_diag: Vec<Scalar>,
}

impl JacobiPreconditioner {
    /// 从 CSR 矩阵创建 Jacobi 预条件器
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let n = matrix.n_rows();
        let mut inv_diag = vec![1.0; n];

        for i in 0..n {
            if let Some(diag) = matrix.diagonal_value(i) {
                if diag.abs() > tol::ZERO {
                    inv_diag[i] = 1.0 / diag;
                }
            }
        }

        Self { inv_diag }
    }

    /// 获取对角元素倒数引用
    pub fn inv_diagonal(&self) -> &[Scalar] {
        &self.inv_diag
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[Scalar], z: &mut [Scalar]) -> PfResult<()> {
        debug_assert_eq!(r.len(), z.len());
        debug_assert_eq!(r.len(), self.inv_diag.len());

        for ((zi, &ri), &inv_d) in z.iter_mut().zip(r.iter()).zip(self.inv_diag.iter()) {
            *zi = ri * inv_d;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jacobi"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        for i in 0..self.inv_diag.len().min(matrix.n_rows()) {
            if let Some(diag) = matrix.diagonal_value(i) {
                if diag.abs() > tol::ZERO {
                    self.inv_diag[i] = 1.0 / diag;
                } else {
                    self.inv_diag[i] = 1.0;
                }
            }
        }
    }
}

// =============================================================================
// SSOR 预条件器
// =============================================================================

/// SSOR 预条件器（对称逐次超松弛）
///
/// M = (D + ωL) D⁻¹ (D + ωU)
///
/// 其中 L、U 分别是 A 的严格下三角和严格上三角部分，
/// D 是对角部分，ω 是松弛因子。
#[derive(Debug, Clone)]
pub struct SsorPreconditioner {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<Scalar>,
    /// 对角元素
    diag: Vec<Scalar>,
    /// 松弛因子
    omega: Scalar,
}

impl SsorPreconditioner {
    /// 从 CSR 矩阵创建 SSOR 预条件器
    ///
    /// # 参数
    ///
    /// - `matrix`: CSR 矩阵
    /// - `omega`: 松弛因子（通常取 1.0-1.8）
    pub fn from_matrix(matrix: &CsrMatrix, omega: Scalar) -> Self {
        let n = matrix.n_rows();
        let diag: Vec<_> = (0..n)
            .map(|i| {
                let d = matrix.diagonal_value(i).unwrap_or(1.0);
                if d.abs() > tol::ZERO {
                    d
                } else {
                    1.0
                }
            })
            .collect();

        Self {
            row_ptr: matrix.row_ptr().to_vec(),
            col_idx: matrix.col_idx().to_vec(),
            values: matrix.values().to_vec(),
            diag,
            omega,
        }
    }
}

impl Preconditioner for SsorPreconditioner {
    fn apply(&self, r: &[Scalar], z: &mut [Scalar]) -> PfResult<()> {
        let n = self.diag.len();
        debug_assert_eq!(r.len(), n);
        debug_assert_eq!(z.len(), n);

        // 前向扫描: (D + ωL) y = r
        for i in 0..n {
            let start = self.row_ptr[i];
            let end = self.row_ptr[i + 1];

            let mut sum = r[i];
            for idx in start..end {
                let j = self.col_idx[idx];
                if j < i {
                    sum -= self.omega * self.values[idx] * z[j];
                }
            }
            z[i] = sum / self.diag[i];
        }

        // 对角缩放: y *= D * (2 - ω)
        let factor = 2.0 - self.omega;
        for i in 0..n {
            z[i] *= self.diag[i] * factor;
        }

        // 后向扫描: (D + ωU) x = y
        for i in (0..n).rev() {
            let start = self.row_ptr[i];
            let end = self.row_ptr[i + 1];

            let mut sum = z[i];
            for idx in start..end {
                let j = self.col_idx[idx];
                if j > i {
                    sum -= self.omega * self.values[idx] * z[j];
                }
            }
            z[i] = sum / self.diag[i];
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sor"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.values.copy_from_slice(matrix.values());
        for i in 0..self.diag.len().min(matrix.n_rows()) {
            let d = matrix.diagonal_value(i).unwrap_or(1.0);
            self.diag[i] = if d.abs() > tol::ZERO { d } else { 1.0 };
        }
    }
}

// =============================================================================
// ILU(0) 预条件器
// =============================================================================

/// ILU(0) 不完全 LU 分解预条件器
///
/// 保持原矩阵稀疏模式的不完全 LU 分解。
/// 比 Jacobi 更强但计算开销也更大。
#[derive(Debug, Clone)]
pub struct Ilu0Preconditioner {
    /// 矩阵维度
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    /// LU 分解后的值（L 和 U 共用存储）
    lu_values: Vec<Scalar>,
    /// 对角元位置索引
    diag_ptr: Vec<usize>,
}

impl Ilu0Preconditioner {
    /// 从 CSR 矩阵创建 ILU(0) 预条件器
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        let n = matrix.n_rows();
        let mut lu_values = matrix.values().to_vec();
        let row_ptr = matrix.row_ptr().to_vec();
        let col_idx = matrix.col_idx().to_vec();

        // 查找对角元位置
        let mut diag_ptr = vec![0usize; n];
        for i in 0..n {
            for k in row_ptr[i]..row_ptr[i + 1] {
                if col_idx[k] == i {
                    diag_ptr[i] = k;
                    break;
                }
            }
        }

        Self::factorize(&row_ptr, &col_idx, &mut lu_values, &diag_ptr, n);

        Self {
            n,
            row_ptr,
            col_idx,
            lu_values,
            diag_ptr,
        }
    }

    /// 执行 ILU(0) 分解
    ///
    /// 原地修改 lu 数组，L 的严格下三角部分和 U 的上三角部分
    /// （含对角）存储在同一数组中。小主元做正则化避免除零。
    fn factorize(
        row_ptr: &[usize],
        col_idx: &[usize],
        lu: &mut [Scalar],
        diag_ptr: &[usize],
        n: usize,
    ) {
        for i in 1..n {
            // 遍历第 i 行的下三角部分 (k < i)
            for k_idx in row_ptr[i]..row_ptr[i + 1] {
                let k = col_idx[k_idx];
                if k >= i {
                    break;
                }

                let mut diag_k = lu[diag_ptr[k]];
                if diag_k.abs() < tol::PIVOT {
                    diag_k = if diag_k >= 0.0 {
                        tol::PIVOT
                    } else {
                        -tol::PIVOT
                    };
                    lu[diag_ptr[k]] = diag_k;
                }

                let factor = lu[k_idx] / diag_k;
                lu[k_idx] = factor;

                // 更新第 i 行的其余元素
                for j_idx in (k_idx + 1)..row_ptr[i + 1] {
                    let j = col_idx[j_idx];
                    // 查找 A[k,j]
                    for m_idx in row_ptr[k]..row_ptr[k + 1] {
                        if col_idx[m_idx] == j {
                            lu[j_idx] -= factor * lu[m_idx];
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl Preconditioner for Ilu0Preconditioner {
    fn apply(&self, r: &[Scalar], z: &mut [Scalar]) -> PfResult<()> {
        debug_assert_eq!(r.len(), self.n);
        debug_assert_eq!(z.len(), self.n);

        // 前向替换: L * y = r
        let mut y = r.to_vec();
        for i in 0..self.n {
            for k_idx in self.row_ptr[i]..self.diag_ptr[i] {
                let j = self.col_idx[k_idx];
                y[i] -= self.lu_values[k_idx] * y[j];
            }
        }

        // 后向替换: U * z = y
        z.copy_from_slice(&y);
        for i in (0..self.n).rev() {
            for k_idx in (self.diag_ptr[i] + 1)..self.row_ptr[i + 1] {
                let j = self.col_idx[k_idx];
                z[i] -= self.lu_values[k_idx] * z[j];
            }

            let diag = self.lu_values[self.diag_ptr[i]];
            if diag.abs() > tol::ZERO {
                z[i] /= diag;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ilu"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        // 重新复制矩阵值并重新分解
        self.lu_values.copy_from_slice(matrix.values());
        Self::factorize(
            &self.row_ptr,
            &self.col_idx,
            &mut self.lu_values,
            &self.diag_ptr,
            self.n,
        );
    }
}
