// crates/pf_laplace/src/linalg/direct.rs

//! 直接求解（LU 分解）
//!
//! 配置中打开 `direct` 开关时绕过 Krylov 方法，改用带部分主元
//! 选取的稠密 LU 分解。适合条件数差、迭代法难以收敛的场合，
//! 代价是 O(n³) 的分解开销，仅适用于中小规模系统。

use super::csr::CsrMatrix;
use pf_foundation::scalar::tol;
use pf_foundation::{PfError, PfResult, Scalar};

/// 稠密 LU 分解（部分主元选取）
///
/// 从稀疏矩阵构造稠密副本后原地分解；L 的严格下三角与 U 的
/// 上三角（含对角）共用同一存储，`piv` 记录行置换。
#[derive(Debug, Clone)]
pub struct DenseLu {
    n: usize,
    /// 行主序存储的分解结果
    lu: Vec<Scalar>,
    /// 行置换
    piv: Vec<usize>,
}

impl DenseLu {
    /// 分解稀疏矩阵
    ///
    /// # 错误
    ///
    /// - 矩阵非方阵: `Consistency`
    /// - 主元为零（数值奇异）: `Singular`
    pub fn factor(matrix: &CsrMatrix) -> PfResult<Self> {
        let n = matrix.n_rows();
        if matrix.n_cols() != n {
            return Err(PfError::consistency(format!(
                "直接法要求方阵, 实际 {}x{}",
                n,
                matrix.n_cols()
            )));
        }

        // 稠密化
        let mut lu = vec![0.0; n * n];
        let row_ptr = matrix.row_ptr();
        let col_idx = matrix.col_idx();
        let values = matrix.values();
        for row in 0..n {
            for idx in row_ptr[row]..row_ptr[row + 1] {
                lu[row * n + col_idx[idx]] = values[idx];
            }
        }

        let mut piv: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // 部分主元：列 k 中绝对值最大的行
            let mut p = k;
            let mut max_val = lu[k * n + k].abs();
            for row in (k + 1)..n {
                let v = lu[row * n + k].abs();
                if v > max_val {
                    max_val = v;
                    p = row;
                }
            }

            if max_val < tol::PIVOT {
                return Err(PfError::singular(k));
            }

            if p != k {
                for col in 0..n {
                    lu.swap(k * n + col, p * n + col);
                }
                piv.swap(k, p);
            }

            let pivot = lu[k * n + k];
            for row in (k + 1)..n {
                let factor = lu[row * n + k] / pivot;
                lu[row * n + k] = factor;
                for col in (k + 1)..n {
                    lu[row * n + col] -= factor * lu[k * n + col];
                }
            }
        }

        Ok(Self { n, lu, piv })
    }

    /// 求解 Ax = b
    ///
    /// # 错误
    ///
    /// - `b`/`x` 长度与矩阵维度不符: `SizeMismatch`
    pub fn solve(&self, b: &[Scalar], x: &mut [Scalar]) -> PfResult<()> {
        PfError::check_size("direct rhs", self.n, b.len())?;
        PfError::check_size("direct solution", self.n, x.len())?;

        let n = self.n;

        // 行置换后前向替换: L y = P b
        for i in 0..n {
            let mut sum = b[self.piv[i]];
            for j in 0..i {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum;
        }

        // 后向替换: U x = y
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu[i * n + j] * x[j];
            }
            x[i] = sum / self.lu[i * n + i];
        }

        Ok(())
    }
}
