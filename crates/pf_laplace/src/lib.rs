// crates/pf_laplace/src/lib.rs

//! PlasmaFlow 垂直拉普拉斯反演
//!
//! 等离子体流体模拟每个时间步都要做一次椭圆型反演：给定右端场
//! 与初始猜测，求出其离散垂直拉普拉斯（加低阶系数项）等于右端
//! 的场。本 crate 提供完整的组装-求解管线：
//!
//! - [`mesh`]: 分区描述与几何度量（外部网格的只读视图）
//! - [`field`]: 单 y 平面上的二维场
//! - [`linalg`]: 进程内稀疏线性代数（CSR、预条件器、Krylov、LU）
//! - [`invert`]: 反演核心（系数、模板、索引映射、组装、驱动）
//!
//! # 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use pf_laplace::{Grid, LaplaceConfig, LaplaceSolver, PlaneField};
//!
//! let grid = Arc::new(Grid::uniform(64, 32, 2, 0.1, 0.1)?);
//! let mut solver = LaplaceSolver::new(grid, LaplaceConfig::default())?;
//!
//! let rhs = PlaneField::zeros(64, 32, 0);
//! let solution = solver.solve(&rhs)?;
//! ```

#![warn(clippy::all)]

pub mod field;
pub mod invert;
pub mod linalg;
pub mod mesh;

// 重导出常用类型
pub use field::PlaneField;
pub use invert::{
    BoundaryFlags, Coefficients, KrylovMethod, LaplaceConfig, LaplaceSolver, PreconKind,
    SolveFlags, SolveStats,
};
pub use mesh::{Grid, Metrics, Partition};
