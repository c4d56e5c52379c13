// crates/pf_laplace/src/invert/mod.rs

//! 垂直拉普拉斯反演核心
//!
//! 把二维 (x, z) 物理网格与逐格点 PDE 系数翻译成稀疏线性系统
//! （x 方向一维域分解），调用可配置的 Krylov 方法求解，再把解
//! 映射回二维场。
//!
//! # 子模块
//!
//! - [`config`]: 配置、方法/预条件器枚举、求解标志
//! - [`coeffs`]: 系数场与逐点求值
//! - [`stencil`]: 二阶/四阶差分模板与边界行模板
//! - [`index_map`]: 本地 (x, z, 偏移) → 全局行列索引
//! - [`system`]: 行计划、稀疏模式与数值组装
//! - [`marshal`]: 场 ↔ 向量搬运
//! - [`solver`]: 反演驱动与用户预条件适配

pub mod coeffs;
pub mod config;
pub mod index_map;
pub mod marshal;
pub mod stencil;
pub mod system;

pub mod solver;

pub use coeffs::{Coefficients, StencilCoeffs};
pub use config::{BoundaryFlags, KrylovMethod, LaplaceConfig, PreconKind, SolveFlags};
pub use index_map::IndexMap;
pub use solver::{LaplaceSolver, ShellPreconditioner, SolveStats};
pub use system::{LinearSystem, RowPlan};
