// crates/pf_laplace/src/field.rs

//! 单平面二维场
//!
//! 反演的输入（右端项、初始猜测）和输出（解）都是固定 y 平面上的
//! (x, z) 二维场，携带其所在平面索引。平面索引在嵌套预条件求解
//! 重入时用于定位系数场的 y 切片。

use ndarray::Array2;
use pf_foundation::{PfError, PfResult, Scalar};

/// 固定 y 平面上的二维 (x, z) 场
///
/// 覆盖本地全网格（含边界守护区）。
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneField {
    values: Array2<Scalar>,
    /// 所在 y 平面索引
    plane: usize,
}

impl PlaneField {
    /// 创建全零场
    pub fn zeros(nx: usize, nz: usize, plane: usize) -> Self {
        Self {
            values: Array2::zeros((nx, nz)),
            plane,
        }
    }

    /// 创建常数场
    pub fn constant(nx: usize, nz: usize, plane: usize, value: Scalar) -> Self {
        Self {
            values: Array2::from_elem((nx, nz), value),
            plane,
        }
    }

    /// 从已有数组创建
    pub fn from_array(values: Array2<Scalar>, plane: usize) -> Self {
        Self { values, plane }
    }

    /// 按 (x, z) 生成场
    pub fn from_fn(
        nx: usize,
        nz: usize,
        plane: usize,
        f: impl Fn(usize, usize) -> Scalar,
    ) -> Self {
        Self {
            values: Array2::from_shape_fn((nx, nz), |(x, z)| f(x, z)),
            plane,
        }
    }

    /// x 方向格点数（含守护区）
    #[inline]
    pub fn nx(&self) -> usize {
        self.values.nrows()
    }

    /// z 方向格点数
    #[inline]
    pub fn nz(&self) -> usize {
        self.values.ncols()
    }

    /// 所在 y 平面索引
    #[inline]
    pub fn plane(&self) -> usize {
        self.plane
    }

    /// 设置平面索引
    #[inline]
    pub fn set_plane(&mut self, plane: usize) {
        self.plane = plane;
    }

    /// 读取 (x, z) 处的值
    #[inline]
    pub fn get(&self, x: usize, z: usize) -> Scalar {
        self.values[[x, z]]
    }

    /// 写入 (x, z) 处的值
    #[inline]
    pub fn set(&mut self, x: usize, z: usize, value: Scalar) {
        self.values[[x, z]] = value;
    }

    /// 底层数组引用
    #[inline]
    pub fn values(&self) -> &Array2<Scalar> {
        &self.values
    }

    /// 底层数组可变引用
    #[inline]
    pub fn values_mut(&mut self) -> &mut Array2<Scalar> {
        &mut self.values
    }

    /// 校验形状
    pub fn check_shape(&self, nx: usize, nz: usize) -> PfResult<()> {
        PfError::check_size("field nx", nx, self.nx())?;
        PfError::check_size("field nz", nz, self.nz())?;
        Ok(())
    }
}

impl std::ops::Index<(usize, usize)> for PlaneField {
    type Output = Scalar;

    #[inline]
    fn index(&self, (x, z): (usize, usize)) -> &Scalar {
        &self.values[[x, z]]
    }
}

impl std::ops::IndexMut<(usize, usize)> for PlaneField {
    #[inline]
    fn index_mut(&mut self, (x, z): (usize, usize)) -> &mut Scalar {
        &mut self.values[[x, z]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_and_index() {
        let mut f = PlaneField::constant(4, 3, 2, 7.5);
        assert_eq!(f.nx(), 4);
        assert_eq!(f.nz(), 3);
        assert_eq!(f.plane(), 2);
        assert!((f[(1, 2)] - 7.5).abs() < 1e-14);

        f[(0, 0)] = -1.0;
        assert!((f.get(0, 0) + 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_from_fn() {
        let f = PlaneField::from_fn(3, 2, 0, |x, z| (x * 10 + z) as Scalar);
        assert!((f.get(2, 1) - 21.0).abs() < 1e-14);
    }

    #[test]
    fn test_check_shape() {
        let f = PlaneField::zeros(4, 3, 0);
        assert!(f.check_shape(4, 3).is_ok());
        assert!(f.check_shape(5, 3).is_err());
    }
}
