// crates/pf_laplace/src/linalg/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! CSR 是最常用的稀疏矩阵存储格式之一，特别适合：
//! - 高效的矩阵-向量乘法 (SpMV)
//! - 行遍历操作
//! - 稀疏模式固定、数值反复刷新的组装流程
//!
//! # 特性开关
//!
//! - `parallel`: 启用基于 `rayon` 的并行矩阵-向量乘法
//!
//! # 格式说明
//!
//! CSR 使用三个数组存储：
//! - `row_ptr`: 行指针，长度 n_rows + 1，row_ptr[i] 是第 i 行第一个非零元的索引
//! - `col_idx`: 列索引，与非零元一一对应
//! - `values`: 非零元值
//!
//! # 使用示例
//!
//! ```ignore
//! use pf_laplace::linalg::csr::{CsrBuilder, CsrMatrix};
//!
//! let mut builder = CsrBuilder::new_square(3);
//! builder.set(0, 0, 4.0);
//! builder.set(0, 1, -1.0);
//! builder.set(1, 1, 4.0);
//! builder.set(2, 2, 4.0);
//! let matrix = builder.build();
//!
//! let x = vec![1.0, 2.0, 3.0];
//! let mut y = vec![0.0; 3];
//! matrix.mul_vec(&x, &mut y);
//! ```

use pf_foundation::Scalar;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use std::collections::BTreeMap;

// =============================================================================
// 稀疏模式（与值分离，用于复用）
// =============================================================================

/// CSR 矩阵的稀疏模式
///
/// 存储矩阵的结构信息（哪些位置有非零元），与值分离。
/// 反演核心在构造期建立一次模式，之后每次求解只刷新数值，
/// 保证多次求解之间稀疏结构完全一致。
#[derive(Debug, Clone)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 获取行指针切片
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 获取列索引切片
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 获取第 row 行的非零元数量
    #[inline]
    pub fn row_nnz(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// 查找 (row, col) 对应的值索引
    ///
    /// 列索引有序，使用二分查找。
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        let indices = &self.col_idx[start..end];

        match indices.binary_search(&col) {
            Ok(local_idx) => Some(start + local_idx),
            Err(_) => None,
        }
    }
}

// =============================================================================
// CSR 矩阵主体
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    /// 稀疏模式（不可变）
    pattern: CsrPattern,
    /// 非零元值（可变）
    values: Vec<Scalar>,
}

impl CsrMatrix {
    /// 创建单位矩阵
    #[inline]
    pub fn identity(n: usize) -> Self {
        let mut builder = CsrBuilder::new_square(n);
        for i in 0..n {
            builder.set(i, i, 1.0);
        }
        builder.build()
    }

    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows()
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols()
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 获取稀疏模式引用
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 获取值切片
    #[inline]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    /// 获取可变值切片（用于矩阵值更新）
    #[inline]
    pub fn values_mut(&mut self) -> &mut [Scalar] {
        &mut self.values
    }

    /// 获取行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        self.pattern.row_ptr()
    }

    /// 获取列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        self.pattern.col_idx()
    }

    /// 获取 (row, col) 位置的值（如果不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Scalar {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 设置 (row, col) 位置的值（必须已存在该位置）
    ///
    /// # 返回
    /// - `true`: 设置成功
    /// - `false`: 位置不在稀疏模式内（未修改）
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Scalar) -> bool {
        if let Some(idx) = self.pattern.find_index(row, col) {
            self.values[idx] = value;
            true
        } else {
            false
        }
    }

    /// 累加到 (row, col) 位置（必须已存在该位置）
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: Scalar) -> bool {
        if let Some(idx) = self.pattern.find_index(row, col) {
            self.values[idx] += value;
            true
        } else {
            false
        }
    }

    /// 获取对角元素值（第 row 行）
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<Scalar> {
        self.pattern
            .find_index(row, row)
            .map(|idx| self.values[idx])
    }

    /// 提取对角线元素向量
    #[inline]
    pub fn extract_diagonal(&self) -> Vec<Scalar> {
        (0..self.n_rows())
            .map(|i| self.diagonal_value(i).unwrap_or(0.0))
            .collect()
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[Scalar], y: &mut [Scalar]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for row in 0..self.n_rows() {
            let start = self.pattern.row_ptr[row];
            let end = self.pattern.row_ptr[row + 1];

            let mut sum = 0.0;
            for idx in start..end {
                let col = self.pattern.col_idx[idx];
                sum += self.values[idx] * x[col];
            }
            y[row] = sum;
        }
    }

    /// 并行矩阵-向量乘法（需启用 `parallel` 特性）
    ///
    /// 基于 `rayon` 的并行迭代，矩阵行数较大时性能显著提升。
    #[cfg(feature = "parallel")]
    pub fn mul_vec_parallel(&self, x: &[Scalar], y: &mut [Scalar]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        y.par_iter_mut().enumerate().for_each(|(row, out)| {
            let start = self.pattern.row_ptr[row];
            let end = self.pattern.row_ptr[row + 1];

            let mut sum = 0.0;
            for idx in start..end {
                let col = self.pattern.col_idx[idx];
                sum += self.values[idx] * x[col];
            }
            *out = sum;
        });
    }

    /// 检查矩阵是否对称（在容差范围内）
    ///
    /// 验证所有非零元素满足 `|A[i,j] - A[j,i]| <= tol`，
    /// 仅检查上三角部分避免重复。
    pub fn is_symmetric(&self, tol: Scalar) -> bool {
        for i in 0..self.n_rows() {
            let start = self.pattern.row_ptr[i];
            let end = self.pattern.row_ptr[i + 1];

            for idx in start..end {
                let j = self.pattern.col_idx[idx];
                if j > i {
                    let a_ij = self.values[idx];
                    let a_ji = self.get(j, i);
                    if (a_ij - a_ji).abs() > tol {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// 计算第 row 行所有元素之和
    ///
    /// 用于离散算子的行和检验（常数场的离散拉普拉斯为零）。
    pub fn row_sum(&self, row: usize) -> Scalar {
        let start = self.pattern.row_ptr[row];
        let end = self.pattern.row_ptr[row + 1];
        self.values[start..end].iter().sum()
    }

    /// 将所有值清零（保持稀疏模式不变）
    ///
    /// 用于多次组装之间的矩阵重用，避免重复内存分配。
    pub fn clear_values(&mut self) {
        self.values.fill(0.0);
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器
///
/// 使用 BTreeMap 临时存储，构建时转换为紧凑 CSR 格式。
/// 适合逐元素构建；组装热路径应复用 [`CsrPattern`] 而非重复构建。
pub struct CsrBuilder {
    n_rows: usize,
    n_cols: usize,
    /// 每行的 (列索引, 值) 映射
    rows: Vec<BTreeMap<usize, Scalar>>,
}

impl CsrBuilder {
    /// 创建方阵构建器
    #[inline]
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 创建构建器
    ///
    /// # Panics
    /// - `n_rows == 0` 或 `n_cols == 0`
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        assert!(n_rows > 0, "行数必须大于 0");
        assert!(n_cols > 0, "列数必须大于 0");

        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 设置 (row, col) 的值（覆盖）
    ///
    /// # Panics
    /// - `row >= n_rows` 或 `col >= n_cols`
    pub fn set(&mut self, row: usize, col: usize, value: Scalar) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    pub fn add(&mut self, row: usize, col: usize, value: Scalar) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// 获取 (row, col) 的当前值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Scalar {
        self.rows[row].get(&col).copied().unwrap_or(0.0)
    }

    /// 获取当前非零元总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// 构建 CSR 矩阵（消耗构建器）
    pub fn build(self) -> CsrMatrix {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);

        for row_map in self.rows {
            for (col, val) in row_map {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            pattern: CsrPattern {
                n_rows: self.n_rows,
                n_cols: self.n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// 构建稀疏模式（用于模式复用）
    pub fn build_pattern(&self) -> CsrPattern {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);

        row_ptr.push(0);

        for row_map in &self.rows {
            for &col in row_map.keys() {
                col_idx.push(col);
            }
            row_ptr.push(col_idx.len());
        }

        CsrPattern {
            n_rows: self.n_rows,
            n_cols: self.n_cols,
            row_ptr,
            col_idx,
        }
    }
}

// =============================================================================
// 类型转换
// =============================================================================

impl From<CsrPattern> for CsrMatrix {
    /// 从稀疏模式创建矩阵（值初始化为 0）
    fn from(pattern: CsrPattern) -> Self {
        let nnz = pattern.nnz();
        Self {
            pattern,
            values: vec![0.0; nnz],
        }
    }
}

// =============================================================================
// 测试
// =============================================================================
