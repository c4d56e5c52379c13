// crates/pf_laplace/src/linalg/vector_ops.rs

//! 向量运算（BLAS Level 1 风格）
//!
//! 迭代求解器的基础运算。
//!
//! # 函数列表
//!
//! - [`dot`]: 点积 x·y
//! - [`norm2`]: 二范数 ||x||₂
//! - [`axpy`]: y = α*x + y
//! - [`scale`]: x = α*x
//! - [`copy`]: y = x
//! - [`sub`]: z = x - y

use pf_foundation::Scalar;

/// 点积 x·y
#[inline]
pub fn dot(x: &[Scalar], y: &[Scalar]) -> Scalar {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).map(|(&xi, &yi)| xi * yi).sum()
}

/// 二范数 ||x||₂
#[inline]
pub fn norm2(x: &[Scalar]) -> Scalar {
    dot(x, x).sqrt()
}

/// 无穷范数 ||x||∞
#[inline]
pub fn norm_inf(x: &[Scalar]) -> Scalar {
    x.iter().map(|&v| v.abs()).fold(0.0, Scalar::max)
}

/// AXPY: y = α*x + y
#[inline]
pub fn axpy(alpha: Scalar, x: &[Scalar], y: &mut [Scalar]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// 缩放: x = α*x
#[inline]
pub fn scale(alpha: Scalar, x: &mut [Scalar]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// 复制: y = x
#[inline]
pub fn copy(x: &[Scalar], y: &mut [Scalar]) {
    debug_assert_eq!(x.len(), y.len());
    y.copy_from_slice(x);
}

/// 向量差: z = x - y
#[inline]
pub fn sub(x: &[Scalar], y: &[Scalar], z: &mut [Scalar]) {
    debug_assert_eq!(x.len(), y.len());
    debug_assert_eq!(x.len(), z.len());
    for ((zi, &xi), &yi) in z.iter_mut().zip(x.iter()).zip(y.iter()) {
        *zi = xi - yi;
    }
}
