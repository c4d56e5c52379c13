// crates/pf_laplace/src/mesh.rs

//! 网格分区与几何度量
//!
//! 外部网格协作者的只读视图：x 方向一维域分解的分区描述
//! （本地内部范围、守护区宽度、首末分区标志、全局行偏移），
//! 以及逐格点的度量张量分量与网格间距。
//!
//! 线性系统的全局维度 = 物理网格总点数（x 总宽 × z 宽）；
//! 每个分区拥有连续的一段全局行。首分区额外拥有内边界守护区
//! 的行，末分区额外拥有外边界守护区的行，中间分区只拥有
//! 内部行——守护格在中间分区上只是 ghost，不进入本地行计数。

use ndarray::Array2;
use pf_foundation::{PfError, PfResult, Scalar};

// ============================================================================
// 分区描述
// ============================================================================

/// x 方向一维域分解中本分区的描述
///
/// 所有字段在构造后不可变。
#[derive(Debug, Clone)]
pub struct Partition {
    /// 本地 x 格点总数（含两侧守护区）
    nx: usize,
    /// z 格点数（周期方向）
    nz: usize,
    /// 守护区宽度（本地内部起点）
    x_int_start: usize,
    /// 本地内部终点（含）
    x_int_end: usize,
    /// 是否为 x 方向第一个分区
    first_x: bool,
    /// 是否为 x 方向最后一个分区
    last_x: bool,
    /// 本分区拥有的全局首行
    row_start: usize,
    /// 全局自由度总数
    global_size: usize,
}

impl Partition {
    /// 单分区（整个域归本进程所有）
    ///
    /// # 参数
    ///
    /// - `nx`: x 格点总数（含两侧各 `guard` 个守护格）
    /// - `nz`: z 格点数
    /// - `guard`: 守护区宽度
    pub fn single(nx: usize, nz: usize, guard: usize) -> PfResult<Self> {
        if nz == 0 {
            return Err(PfError::config("nz 必须大于 0"));
        }
        if nx <= 2 * guard {
            return Err(PfError::config(format!(
                "nx={} 过小, 无法容纳两侧各 {} 个守护格",
                nx, guard
            )));
        }
        Ok(Self {
            nx,
            nz,
            x_int_start: guard,
            x_int_end: nx - 1 - guard,
            first_x: true,
            last_x: true,
            row_start: 0,
            global_size: nx * nz,
        })
    }

    /// 多分区条带分解中第 `rank` 个分区
    ///
    /// 内部格点按余数优先均分给各分区；全局行偏移由前面所有
    /// 分区的本地行数累加得到（对应原型实现中对本地规模做
    /// 全归约后推得的所有权范围）。
    pub fn strip(
        global_nx: usize,
        nz: usize,
        guard: usize,
        rank: usize,
        n_ranks: usize,
    ) -> PfResult<Self> {
        if n_ranks == 0 || rank >= n_ranks {
            return Err(PfError::config(format!(
                "无效的分区编号 {}/{}",
                rank, n_ranks
            )));
        }
        if nz == 0 {
            return Err(PfError::config("nz 必须大于 0"));
        }
        if global_nx <= 2 * guard {
            return Err(PfError::config(format!(
                "global_nx={} 过小, 无法容纳两侧各 {} 个守护格",
                global_nx, guard
            )));
        }

        let interior_total = global_nx - 2 * guard;
        if interior_total < n_ranks {
            return Err(PfError::config(format!(
                "内部格点数 {} 少于分区数 {}",
                interior_total, n_ranks
            )));
        }

        let base = interior_total / n_ranks;
        let rem = interior_total % n_ranks;
        let interior_of = |r: usize| base + usize::from(r < rem);

        let first_x = rank == 0;
        let last_x = rank == n_ranks - 1;
        let n_int = interior_of(rank);

        let mut row_start = 0;
        for r in 0..rank {
            let mut local = interior_of(r) * nz;
            if r == 0 {
                local += guard * nz;
            }
            if r == n_ranks - 1 {
                local += guard * nz;
            }
            row_start += local;
        }

        Ok(Self {
            nx: n_int + 2 * guard,
            nz,
            x_int_start: guard,
            x_int_end: guard + n_int - 1,
            first_x,
            last_x,
            row_start,
            global_size: global_nx * nz,
        })
    }

    /// 本地 x 格点总数（含守护区）
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// z 格点数
    #[inline]
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// 本地内部起点（= 守护区宽度）
    #[inline]
    pub fn x_int_start(&self) -> usize {
        self.x_int_start
    }

    /// 本地内部终点（含）
    #[inline]
    pub fn x_int_end(&self) -> usize {
        self.x_int_end
    }

    /// 是否为第一个分区
    #[inline]
    pub fn first_x(&self) -> bool {
        self.first_x
    }

    /// 是否为最后一个分区
    #[inline]
    pub fn last_x(&self) -> bool {
        self.last_x
    }

    /// 本分区拥有的全局首行
    #[inline]
    pub fn row_start(&self) -> usize {
        self.row_start
    }

    /// 全局自由度总数
    #[inline]
    pub fn global_size(&self) -> usize {
        self.global_size
    }

    /// 本地拥有的行数
    ///
    /// 内部行 + 首分区的内边界守护行 + 末分区的外边界守护行。
    pub fn local_rows(&self) -> usize {
        let mut rows = (self.x_int_end - self.x_int_start + 1) * self.nz;
        if self.first_x {
            rows += self.x_int_start * self.nz;
        }
        if self.last_x {
            rows += (self.nx - 1 - self.x_int_end) * self.nz;
        }
        rows
    }

    /// 本地拥有的全局行范围 [row_start, row_end)
    #[inline]
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.row_start..self.row_start + self.local_rows()
    }

    /// 本分区是否拥有整个域
    #[inline]
    pub fn owns_entire_domain(&self) -> bool {
        self.first_x && self.last_x && self.local_rows() == self.global_size
    }
}

// ============================================================================
// 几何度量
// ============================================================================

/// 逐格点几何度量
///
/// 度量张量分量按 (x, y) 索引；z 方向均匀。
/// `g1_up`/`g3_up` 是一阶导数项系数（缩并 Christoffel 项），
/// `int_shear` 是积分剪切（仅在移位径向导数开启时参与修正）。
#[derive(Debug, Clone)]
pub struct Metrics {
    /// 度量张量 g^{11}
    pub g11: Array2<Scalar>,
    /// 度量张量 g^{33}
    pub g33: Array2<Scalar>,
    /// 度量张量 g^{13}
    pub g13: Array2<Scalar>,
    /// x 一阶导数项系数 G¹
    pub g1_up: Array2<Scalar>,
    /// z 一阶导数项系数 G³
    pub g3_up: Array2<Scalar>,
    /// x 方向网格间距（可非均匀）
    pub dx: Array2<Scalar>,
    /// z 方向网格间距（均匀）
    pub dz: Scalar,
    /// 积分剪切
    pub int_shear: Array2<Scalar>,
    /// 径向导数是否在移位坐标系下计算
    pub shifted_derivs: bool,
    /// 是否把积分剪切计入度量修正
    pub include_int_shear: bool,
}

impl Metrics {
    /// 均匀正交网格（单位度量）
    pub fn uniform(nx: usize, ny: usize, dx: Scalar, dz: Scalar) -> Self {
        Self {
            g11: Array2::from_elem((nx, ny), 1.0),
            g33: Array2::from_elem((nx, ny), 1.0),
            g13: Array2::zeros((nx, ny)),
            g1_up: Array2::zeros((nx, ny)),
            g3_up: Array2::zeros((nx, ny)),
            dx: Array2::from_elem((nx, ny), dx),
            dz,
            int_shear: Array2::zeros((nx, ny)),
            shifted_derivs: false,
            include_int_shear: false,
        }
    }

    /// y 平面数
    #[inline]
    pub fn ny(&self) -> usize {
        self.g11.ncols()
    }

    /// 校验各数组形状一致
    pub fn validate(&self, nx: usize) -> PfResult<()> {
        let ny = self.ny();
        let check = |name: &'static str, arr: &Array2<Scalar>| -> PfResult<()> {
            PfError::check_size(name, nx, arr.nrows())?;
            PfError::check_size(name, ny, arr.ncols())?;
            Ok(())
        };
        check("g11", &self.g11)?;
        check("g33", &self.g33)?;
        check("g13", &self.g13)?;
        check("G1", &self.g1_up)?;
        check("G3", &self.g3_up)?;
        check("dx", &self.dx)?;
        check("int_shear", &self.int_shear)?;
        if self.dz <= 0.0 {
            return Err(PfError::config("dz 必须为正"));
        }
        Ok(())
    }
}

// ============================================================================
// 网格 = 分区 + 度量
// ============================================================================

/// 本地网格：分区描述 + 几何度量
///
/// 由外部网格协作者提供，核心只读。
#[derive(Debug, Clone)]
pub struct Grid {
    partition: Partition,
    metrics: Metrics,
}

impl Grid {
    /// 组合分区与度量，并校验形状一致
    pub fn new(partition: Partition, metrics: Metrics) -> PfResult<Self> {
        metrics.validate(partition.nx())?;
        Ok(Self { partition, metrics })
    }

    /// 均匀单分区网格（测试与单进程运行的便捷构造）
    pub fn uniform(nx: usize, nz: usize, guard: usize, dx: Scalar, dz: Scalar) -> PfResult<Self> {
        let partition = Partition::single(nx, nz, guard)?;
        let metrics = Metrics::uniform(nx, 1, dx, dz);
        Self::new(partition, metrics)
    }

    /// 分区描述
    #[inline]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// 几何度量
    #[inline]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// 几何度量（可变，供网格侧在求解前更新）
    #[inline]
    pub fn metrics_mut(&mut self) -> &mut Metrics {
        &mut self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_partition() {
        let p = Partition::single(10, 4, 2).unwrap();
        assert_eq!(p.nx(), 10);
        assert_eq!(p.x_int_start(), 2);
        assert_eq!(p.x_int_end(), 7);
        assert!(p.first_x() && p.last_x());
        assert_eq!(p.local_rows(), 40);
        assert_eq!(p.global_size(), 40);
        assert!(p.owns_entire_domain());
    }

    #[test]
    fn test_strip_partitions_cover_all_rows() {
        let global_nx = 13;
        let nz = 4;
        let guard = 2;
        let n_ranks = 3;

        let mut next_row = 0;
        let mut total_interior = 0;
        for rank in 0..n_ranks {
            let p = Partition::strip(global_nx, nz, guard, rank, n_ranks).unwrap();
            // 行范围首尾相接
            assert_eq!(p.row_start(), next_row);
            next_row = p.rows().end;
            total_interior += p.x_int_end() - p.x_int_start() + 1;
            assert_eq!(p.first_x(), rank == 0);
            assert_eq!(p.last_x(), rank == n_ranks - 1);
            assert_eq!(p.global_size(), global_nx * nz);
            assert!(!p.owns_entire_domain());
        }
        // 所有行恰好覆盖一遍
        assert_eq!(next_row, global_nx * nz);
        // 内部格点无重叠无遗漏
        assert_eq!(total_interior, global_nx - 2 * guard);
    }

    #[test]
    fn test_strip_single_rank_matches_single() {
        let a = Partition::single(10, 4, 2).unwrap();
        let b = Partition::strip(10, 4, 2, 0, 1).unwrap();
        assert_eq!(a.local_rows(), b.local_rows());
        assert_eq!(a.x_int_end(), b.x_int_end());
        assert!(b.owns_entire_domain());
    }

    #[test]
    fn test_invalid_partitions() {
        assert!(Partition::single(4, 4, 2).is_err());
        assert!(Partition::strip(10, 4, 2, 3, 3).is_err());
        assert!(Partition::single(10, 0, 2).is_err());
    }

    #[test]
    fn test_metrics_validate() {
        let m = Metrics::uniform(10, 1, 0.1, 0.2);
        assert!(m.validate(10).is_ok());
        assert!(m.validate(11).is_err());
    }

    #[test]
    fn test_grid_uniform() {
        let grid = Grid::uniform(10, 4, 2, 1.0, 1.0).unwrap();
        assert_eq!(grid.partition().nz(), 4);
        assert_eq!(grid.metrics().ny(), 1);
    }
}
