// crates/pf_laplace/src/invert/stencil.rs

//! 差分模板
//!
//! 把一个格点的五个 PDE 系数转换为固定的 (x 偏移, z 偏移, 权重)
//! 表。二阶与四阶各有一张完整写出的模板表，不做任何阶间插值
//! 或符号复用，宁可冗长也避免差一错误。
//!
//! 边界行另有模板：梯度（Neumann 型）边界用同阶的单侧差分
//! 匹配法向导数，固定值（Dirichlet 型）边界是恒等行。恒等行的
//! 非对角零权重也显式写出，保证边界标志变化时稀疏模式不变。

use super::coeffs::StencilCoeffs;
use pf_foundation::Scalar;

/// 一条模板项：矩阵在 (行, 列 = 索引映射(格点, 偏移)) 处的贡献
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilEntry {
    /// x 方向偏移
    pub dx: i32,
    /// z 方向偏移
    pub dz: i32,
    /// 权重
    pub weight: Scalar,
}

impl StencilEntry {
    #[inline]
    fn new(dx: i32, dz: i32, weight: Scalar) -> Self {
        Self { dx, dz, weight }
    }
}

/// 域边缘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// 内边界（x 小端，首分区持有）
    Inner,
    /// 外边界（x 大端，末分区持有）
    Outer,
}

// ============================================================================
// 内部行模板
// ============================================================================

/// 二阶 9 点模板
///
/// 纯二阶导数用标准中心差分，混合项用角点四点公式，
/// 一阶项用一阶中心差分。
pub fn second_order_interior(
    a0: Scalar,
    c: &StencilCoeffs,
    dx: Scalar,
    dz: Scalar,
) -> [StencilEntry; 9] {
    let dx2 = dx * dx;
    let dz2 = dz * dz;
    let dxdz = dx * dz;

    [
        // f(i,j)
        StencilEntry::new(0, 0, a0 - 2.0 * (c.dx2 / dx2 + c.dz2 / dz2)),
        // f(i-1,j-1)
        StencilEntry::new(-1, -1, c.dxdz / (4.0 * dxdz)),
        // f(i-1,j)
        StencilEntry::new(-1, 0, c.dx2 / dx2 - c.dx / (2.0 * dx)),
        // f(i-1,j+1)
        StencilEntry::new(-1, 1, -c.dxdz / (4.0 * dxdz)),
        // f(i,j-1)
        StencilEntry::new(0, -1, c.dz2 / dz2 - c.dz / (2.0 * dz)),
        // f(i,j+1)
        StencilEntry::new(0, 1, c.dz2 / dz2 + c.dz / (2.0 * dz)),
        // f(i+1,j-1)
        StencilEntry::new(1, -1, -c.dxdz / (4.0 * dxdz)),
        // f(i+1,j)
        StencilEntry::new(1, 0, c.dx2 / dx2 + c.dx / (2.0 * dx)),
        // f(i+1,j+1)
        StencilEntry::new(1, 1, c.dxdz / (4.0 * dxdz)),
    ]
}

/// 四阶 25 点模板（完整 5×5 块）
///
/// 纯二阶导数用五点四阶中心差分，混合项用四阶交叉公式，
/// 一阶项用四点四阶中心差分。
pub fn fourth_order_interior(
    a0: Scalar,
    c: &StencilCoeffs,
    dx: Scalar,
    dz: Scalar,
) -> [StencilEntry; 25] {
    let dx2 = dx * dx;
    let dz2 = dz * dz;
    let dxdz = dx * dz;

    [
        // f(i,j)
        StencilEntry::new(0, 0, a0 - 2.5 * (c.dx2 / dx2 + c.dz2 / dz2)),
        // f(i-2,j-2)
        StencilEntry::new(-2, -2, c.dxdz / (144.0 * dxdz)),
        // f(i-2,j-1)
        StencilEntry::new(-2, -1, -c.dxdz / (18.0 * dxdz)),
        // f(i-2,j)
        StencilEntry::new(-2, 0, (1.0 / 12.0) * (-c.dx2 / dx2 + c.dx / dx)),
        // f(i-2,j+1)
        StencilEntry::new(-2, 1, c.dxdz / (18.0 * dxdz)),
        // f(i-2,j+2)
        StencilEntry::new(-2, 2, -c.dxdz / (144.0 * dxdz)),
        // f(i-1,j-2)
        StencilEntry::new(-1, -2, -c.dxdz / (18.0 * dxdz)),
        // f(i-1,j-1)
        StencilEntry::new(-1, -1, 4.0 * c.dxdz / (9.0 * dxdz)),
        // f(i-1,j)
        StencilEntry::new(-1, 0, 4.0 * c.dx2 / (3.0 * dx2) - 2.0 * c.dx / (3.0 * dx)),
        // f(i-1,j+1)
        StencilEntry::new(-1, 1, -4.0 * c.dxdz / (9.0 * dxdz)),
        // f(i-1,j+2)
        StencilEntry::new(-1, 2, c.dxdz / (18.0 * dxdz)),
        // f(i,j-2)
        StencilEntry::new(0, -2, (1.0 / 12.0) * (-c.dz2 / dz2 + c.dz / dz)),
        // f(i,j-1)
        StencilEntry::new(0, -1, 4.0 * c.dz2 / (3.0 * dz2) - 2.0 * c.dz / (3.0 * dz)),
        // f(i,j+1)
        StencilEntry::new(0, 1, 4.0 * c.dz2 / (3.0 * dz2) + 2.0 * c.dz / (3.0 * dz)),
        // f(i,j+2)
        StencilEntry::new(0, 2, (-1.0 / 12.0) * (c.dz2 / dz2 + c.dz / dz)),
        // f(i+1,j-2)
        StencilEntry::new(1, -2, c.dxdz / (18.0 * dxdz)),
        // f(i+1,j-1)
        StencilEntry::new(1, -1, -4.0 * c.dxdz / (9.0 * dxdz)),
        // f(i+1,j)
        StencilEntry::new(1, 0, 4.0 * c.dx2 / (3.0 * dx2) + 2.0 * c.dx / (3.0 * dx)),
        // f(i+1,j+1)
        StencilEntry::new(1, 1, 4.0 * c.dxdz / (9.0 * dxdz)),
        // f(i+1,j+2)
        StencilEntry::new(1, 2, -c.dxdz / (18.0 * dxdz)),
        // f(i+2,j-2)
        StencilEntry::new(2, -2, -c.dxdz / (144.0 * dxdz)),
        // f(i+2,j-1)
        StencilEntry::new(2, -1, c.dxdz / (18.0 * dxdz)),
        // f(i+2,j)
        StencilEntry::new(2, 0, (-1.0 / 12.0) * (c.dx2 / dx2 + c.dx / dx)),
        // f(i+2,j+1)
        StencilEntry::new(2, 1, -c.dxdz / (18.0 * dxdz)),
        // f(i+2,j+2)
        StencilEntry::new(2, 2, c.dxdz / (144.0 * dxdz)),
    ]
}

// ============================================================================
// 边界行模板
// ============================================================================

/// 梯度（Neumann 型）边界行：单侧差分匹配法向导数
///
/// 内边界向域内取点（正偏移），外边界向域内取点（负偏移）。
/// 二阶用三点单侧公式，四阶用五点单侧公式。
pub fn gradient_boundary(fourth_order: bool, edge: Edge, dx: Scalar) -> Vec<StencilEntry> {
    let sign: Scalar = match edge {
        Edge::Inner => 1.0,
        Edge::Outer => -1.0,
    };
    let step: i32 = match edge {
        Edge::Inner => 1,
        Edge::Outer => -1,
    };

    if fourth_order {
        vec![
            StencilEntry::new(0, 0, -sign * 25.0 / (12.0 * dx)),
            StencilEntry::new(step, 0, sign * 4.0 / dx),
            StencilEntry::new(2 * step, 0, -sign * 3.0 / dx),
            StencilEntry::new(3 * step, 0, sign * 4.0 / (3.0 * dx)),
            StencilEntry::new(4 * step, 0, -sign / (4.0 * dx)),
        ]
    } else {
        vec![
            StencilEntry::new(0, 0, -sign * 3.0 / (2.0 * dx)),
            StencilEntry::new(step, 0, sign * 2.0 / dx),
            StencilEntry::new(2 * step, 0, -sign / (2.0 * dx)),
        ]
    }
}

/// 固定值（Dirichlet 型）边界行：恒等行
///
/// 对角权重 1，x 方向四个邻居显式写零，保证与梯度边界共用
/// 同一稀疏模式。
pub fn value_boundary(edge: Edge) -> [StencilEntry; 5] {
    let step: i32 = match edge {
        Edge::Inner => 1,
        Edge::Outer => -1,
    };
    [
        StencilEntry::new(0, 0, 1.0),
        StencilEntry::new(step, 0, 0.0),
        StencilEntry::new(2 * step, 0, 0.0),
        StencilEntry::new(3 * step, 0, 0.0),
        StencilEntry::new(4 * step, 0, 0.0),
    ]
}

// ============================================================================
// 稀疏模式足迹
// ============================================================================

/// 内部行的列偏移足迹
pub fn interior_footprint(fourth_order: bool) -> Vec<(i32, i32)> {
    let reach: i32 = if fourth_order { 2 } else { 1 };
    let mut offsets = Vec::with_capacity(((2 * reach + 1) * (2 * reach + 1)) as usize);
    for dx in -reach..=reach {
        for dz in -reach..=reach {
            offsets.push((dx, dz));
        }
    }
    offsets
}

/// 边界行的列偏移足迹（两种阶数与两种边界语义的并集）
pub fn boundary_footprint(edge: Edge) -> [(i32, i32); 5] {
    let step: i32 = match edge {
        Edge::Inner => 1,
        Edge::Outer => -1,
    };
    [
        (0, 0),
        (step, 0),
        (2 * step, 0),
        (3 * step, 0),
        (4 * step, 0),
    ]
}
