// crates/pf_foundation/src/scalar.rs

//! 统一标量类型
//!
//! 通过 feature 控制精度，为 GPU 后端预留接口。
//!
//! # Feature 控制
//!
//! - 默认: `Scalar = f64`
//! - `gpu-f32` feature: `Scalar = f32`（预留，求解器层仍要求双精度）

/// 计算用标量类型（默认 f64，启用 gpu-f32 feature 时为 f32）
#[cfg(not(feature = "gpu-f32"))]
pub type Scalar = f64;

/// 计算用标量类型（单精度变体）
#[cfg(feature = "gpu-f32")]
pub type Scalar = f32;

/// 数值容差常量
///
/// 迭代求解器与分解算法共享的阈值，集中定义避免各处硬编码漂移。
pub mod tol {
    use super::Scalar;

    /// 判定标量"实际为零"的阈值（分母保护）
    pub const ZERO: Scalar = 1e-14;

    /// 迭代法停滞判据（内积坍缩）
    pub const STAGNATION: Scalar = 1e-30;

    /// 直接法主元下限
    pub const PIVOT: Scalar = 1e-13;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_width() {
        // 默认配置下求解器为双精度
        #[cfg(not(feature = "gpu-f32"))]
        assert_eq!(std::mem::size_of::<Scalar>(), 8);
    }

    #[test]
    fn test_tolerance_ordering() {
        assert!(tol::STAGNATION < tol::ZERO);
        assert!(tol::ZERO < tol::PIVOT);
    }
}
