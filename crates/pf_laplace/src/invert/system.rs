// crates/pf_laplace/src/invert/system.rs

//! 线性系统组装
//!
//! 驱动系数求值 + 差分模板 + 索引映射，按固定顺序遍历本地
//! 拥有的每一行（首分区内边界行、内部行、末分区外边界行），
//! 填充稀疏矩阵与右端/初始猜测向量。
//!
//! 生命周期分两段：
//!
//! - **构造期（定容）**: 由分区 + 差分阶数推出本地行数、逐行
//!   非零元预算和稀疏模式。模式取两种边界语义的并集足迹，
//!   因此之后边界标志怎么变，稀疏结构都不变。切换差分阶数
//!   需要新建系统。
//! - **每次求解（组装）**: 清零后按同一遍历顺序刷新数值。
//!   结束时最终行号必须等于本分区末行加一，违反即致命的
//!   一致性错误——这是索引静默出错前的最后一道防线。

use super::coeffs::{Coefficients, CoefficientEvaluator};
use super::config::BoundaryFlags;
use super::index_map::IndexMap;
use super::stencil::{self, Edge, StencilEntry};
use crate::field::PlaneField;
use crate::linalg::csr::{CsrBuilder, CsrMatrix};
use crate::mesh::{Grid, Partition};
use pf_foundation::{PfError, PfResult, Scalar};

// ============================================================================
// 行计划（定容）
// ============================================================================

/// 构造期的行计划：本地行数与逐行非零元预算
#[derive(Debug, Clone)]
pub struct RowPlan {
    /// 本地拥有的行数
    pub local_rows: usize,
    /// 逐行非零元数（按本地行序）
    pub row_nnz: Vec<usize>,
}

impl RowPlan {
    /// 从分区与差分阶数推出行计划
    ///
    /// 同时校验网格能容纳对应阶数的模板：内部行需要足够的
    /// 守护宽度，z 方向需要足够多的格点避免周期回绕后列重合，
    /// 边界行的单侧模板需要足够的 x 纵深。
    pub fn new(partition: &Partition, fourth_order: bool) -> PfResult<Self> {
        let reach = if fourth_order { 2usize } else { 1 };
        let guard = partition.x_int_start();
        let nx = partition.nx();
        let nz = partition.nz();

        if guard < reach {
            return Err(PfError::config(format!(
                "守护区宽度 {} 不足以支撑 {} 阶内部模板",
                guard,
                if fourth_order { 4 } else { 2 }
            )));
        }
        if nz < 2 * reach + 1 {
            return Err(PfError::config(format!(
                "nz={} 过小, 周期回绕后 {} 阶模板列重合",
                nz,
                if fourth_order { 4 } else { 2 }
            )));
        }
        // 边界行的单侧模板足迹深入域内 4 格
        if partition.first_x() && guard + 3 > nx - 1 {
            return Err(PfError::config(format!(
                "nx={} 过小, 内边界单侧模板越界",
                nx
            )));
        }
        if partition.last_x() && partition.x_int_end() + 1 < 4 {
            return Err(PfError::config(format!(
                "nx={} 过小, 外边界单侧模板越界",
                nx
            )));
        }

        let interior_nnz = (2 * reach + 1) * (2 * reach + 1);
        let boundary_nnz = 5usize;

        let mut row_nnz = Vec::with_capacity(partition.local_rows());
        if partition.first_x() {
            row_nnz.extend(std::iter::repeat(boundary_nnz).take(guard * nz));
        }
        let interior_count = (partition.x_int_end() - partition.x_int_start() + 1) * nz;
        row_nnz.extend(std::iter::repeat(interior_nnz).take(interior_count));
        if partition.last_x() {
            let outer_guard = nx - 1 - partition.x_int_end();
            row_nnz.extend(std::iter::repeat(boundary_nnz).take(outer_guard * nz));
        }

        let plan = Self {
            local_rows: row_nnz.len(),
            row_nnz,
        };
        if plan.local_rows != partition.local_rows() {
            return Err(PfError::consistency(format!(
                "行计划 {} 行, 分区拥有 {} 行",
                plan.local_rows,
                partition.local_rows()
            )));
        }
        Ok(plan)
    }

    /// 本地非零元总数
    pub fn total_nnz(&self) -> usize {
        self.row_nnz.iter().sum()
    }
}

// ============================================================================
// 线性系统
// ============================================================================

/// 本分区的线性系统：稀疏矩阵 + 右端向量 + 初始猜测向量
///
/// 矩阵为全局维度，仅本分区拥有的行有非零模式；
/// 两个向量同为全局长度，仅写本地拥有段。
pub struct LinearSystem {
    partition: Partition,
    fourth_order: bool,
    plan: RowPlan,
    map: IndexMap,
    matrix: CsrMatrix,
    rhs: Vec<Scalar>,
    guess: Vec<Scalar>,
}

impl LinearSystem {
    /// 定容并构建稀疏模式
    pub fn new(partition: Partition, fourth_order: bool) -> PfResult<Self> {
        let plan = RowPlan::new(&partition, fourth_order)?;
        let map = IndexMap::new(&partition)?;
        let n = partition.global_size();

        let mut builder = CsrBuilder::new(n, n);
        let nz = partition.nz();
        let mut row = partition.row_start();

        if partition.first_x() {
            for x in 0..partition.x_int_start() {
                for z in 0..nz {
                    for &(dx, dz) in &stencil::boundary_footprint(Edge::Inner) {
                        builder.set(row, map.column(x, z, dx, dz), 0.0);
                    }
                    row += 1;
                }
            }
        }

        let footprint = stencil::interior_footprint(fourth_order);
        for x in partition.x_int_start()..=partition.x_int_end() {
            for z in 0..nz {
                for &(dx, dz) in &footprint {
                    builder.set(row, map.column(x, z, dx, dz), 0.0);
                }
                row += 1;
            }
        }

        if partition.last_x() {
            for x in (partition.x_int_end() + 1)..partition.nx() {
                for z in 0..nz {
                    for &(dx, dz) in &stencil::boundary_footprint(Edge::Outer) {
                        builder.set(row, map.column(x, z, dx, dz), 0.0);
                    }
                    row += 1;
                }
            }
        }

        if row != partition.rows().end {
            return Err(PfError::consistency(format!(
                "模式构建结束于行 {}, 期望 {}",
                row,
                partition.rows().end
            )));
        }

        let pattern = builder.build_pattern();
        if pattern.nnz() != plan.total_nnz() {
            return Err(PfError::consistency(format!(
                "稀疏模式 {} 个非零元, 行计划预算 {}",
                pattern.nnz(),
                plan.total_nnz()
            )));
        }

        let matrix: CsrMatrix = pattern.into();
        Ok(Self {
            partition,
            fourth_order,
            plan,
            map,
            matrix,
            rhs: vec![0.0; n],
            guess: vec![0.0; n],
        })
    }

    /// 分区描述
    #[inline]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// 行计划
    #[inline]
    pub fn plan(&self) -> &RowPlan {
        &self.plan
    }

    /// 系数矩阵
    #[inline]
    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    /// 右端向量
    #[inline]
    pub fn rhs(&self) -> &[Scalar] {
        &self.rhs
    }

    /// 初始猜测向量
    #[inline]
    pub fn guess(&self) -> &[Scalar] {
        &self.guess
    }

    fn set_entry(&mut self, row: usize, x: usize, z: usize, e: &StencilEntry) -> PfResult<()> {
        let col = self.map.column(x, z, e.dx, e.dz);
        if !self.matrix.set(row, col, e.weight) {
            return Err(PfError::consistency(format!(
                "向稀疏模式之外的位置 ({}, {}) 写入",
                row, col
            )));
        }
        Ok(())
    }

    /// 组装：按固定行序刷新矩阵数值与右端/初始猜测向量
    ///
    /// 每次求解都要重新组装（系数与右端每次可能变化），
    /// 稀疏模式保持不变。
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &mut self,
        grid: &Grid,
        coefs: &Coefficients,
        all_terms: bool,
        nonuniform: bool,
        rhs_field: &PlaneField,
        guess_field: &PlaneField,
        inner_flags: BoundaryFlags,
        outer_flags: BoundaryFlags,
    ) -> PfResult<()> {
        let p = grid.partition();
        if p.rows() != self.partition.rows() || p.nx() != self.partition.nx() {
            return Err(PfError::consistency(
                "组装使用的网格分区与系统构造时不一致",
            ));
        }
        rhs_field.check_shape(p.nx(), p.nz())?;
        guess_field.check_shape(p.nx(), p.nz())?;

        let y = rhs_field.plane();
        PfError::check_index("plane", y, grid.metrics().ny())?;

        let eval =
            CoefficientEvaluator::new(grid, coefs, all_terms, nonuniform, self.fourth_order);
        let nz = p.nz();
        let dz = grid.metrics().dz;

        self.matrix.clear_values();

        let mut row = p.row_start();

        // 内边界行（首分区）
        if p.first_x() {
            for x in 0..p.x_int_start() {
                let dx = grid.metrics().dx[[x, y]];
                let entries: Vec<StencilEntry> =
                    if inner_flags.contains(BoundaryFlags::GRADIENT) {
                        stencil::gradient_boundary(self.fourth_order, Edge::Inner, dx)
                    } else {
                        stencil::value_boundary(Edge::Inner).to_vec()
                    };
                for z in 0..nz {
                    for e in &entries {
                        self.set_entry(row, x, z, e)?;
                    }
                    self.rhs[row] = if inner_flags.contains(BoundaryFlags::FROM_RHS) {
                        rhs_field.get(x, z)
                    } else if inner_flags.contains(BoundaryFlags::FROM_GUESS) {
                        guess_field.get(x, z)
                    } else {
                        0.0
                    };
                    self.guess[row] = guess_field.get(x, z);
                    row += 1;
                }
            }
        }

        // 内部行
        for x in p.x_int_start()..=p.x_int_end() {
            let dx = grid.metrics().dx[[x, y]];
            for z in 0..nz {
                let a0 = coefs.a0(x, y, z);
                let c = eval.evaluate(x, y, z);
                if self.fourth_order {
                    for e in stencil::fourth_order_interior(a0, &c, dx, dz) {
                        self.set_entry(row, x, z, &e)?;
                    }
                } else {
                    for e in stencil::second_order_interior(a0, &c, dx, dz) {
                        self.set_entry(row, x, z, &e)?;
                    }
                }
                self.rhs[row] = rhs_field.get(x, z);
                self.guess[row] = guess_field.get(x, z);
                row += 1;
            }
        }

        // 外边界行（末分区）
        if p.last_x() {
            for x in (p.x_int_end() + 1)..p.nx() {
                let dx = grid.metrics().dx[[x, y]];
                let entries: Vec<StencilEntry> =
                    if outer_flags.contains(BoundaryFlags::GRADIENT) {
                        stencil::gradient_boundary(self.fourth_order, Edge::Outer, dx)
                    } else {
                        stencil::value_boundary(Edge::Outer).to_vec()
                    };
                for z in 0..nz {
                    for e in &entries {
                        self.set_entry(row, x, z, e)?;
                    }
                    self.rhs[row] = if outer_flags.contains(BoundaryFlags::FROM_RHS) {
                        rhs_field.get(x, z)
                    } else if outer_flags.contains(BoundaryFlags::FROM_GUESS) {
                        guess_field.get(x, z)
                    } else {
                        0.0
                    };
                    self.guess[row] = guess_field.get(x, z);
                    row += 1;
                }
            }
        }

        // 后置条件：最终行号必须恰好越过本分区末行
        if row != p.rows().end {
            return Err(PfError::consistency(format!(
                "组装结束于行 {}, 期望 {}",
                row,
                p.rows().end
            )));
        }
        Ok(())
    }
}
