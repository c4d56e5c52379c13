// crates/pf_laplace/src/invert/index_map.rs

//! 分布式索引映射
//!
//! 把本地 (x, z) 格点加上 x/z 邻居偏移换算为全局行/列索引。
//! z 方向周期回绕；x 方向的本地-全局换算由本分区全局首行
//! 除以 z 宽得到（必须整除，否则是致命的一致性错误），再减去
//! 本地内部起点。首分区的本地索引与全局索引重合，不做偏移。
//!
//! 组装器、场-向量搬运和邻居列查找必须使用同一套换算——
//! 三者不一致不会崩溃，只会静默算出错误的物理结果，
//! 所以换算集中在这一处。

use crate::mesh::Partition;
use pf_foundation::{PfError, PfResult};

/// 本地 (x, z, 偏移) → 全局列索引
#[derive(Debug, Clone, Copy)]
pub struct IndexMap {
    nz: usize,
    /// 本地 x 到全局 x 的偏移（首分区为 0）
    x_offset: i64,
}

impl IndexMap {
    /// 从分区描述构造
    ///
    /// # 错误
    ///
    /// 分区全局首行不能被 z 宽整除时返回 `Consistency`。
    pub fn new(partition: &Partition) -> PfResult<Self> {
        Self::from_parts(
            partition.row_start(),
            partition.nz(),
            partition.x_int_start(),
            partition.first_x(),
        )
    }

    fn from_parts(
        row_start: usize,
        nz: usize,
        x_int_start: usize,
        first_x: bool,
    ) -> PfResult<Self> {
        if row_start % nz != 0 {
            return Err(PfError::consistency(format!(
                "分区首行 {} 不能被 z 宽 {} 整除",
                row_start, nz
            )));
        }
        let x_offset = if first_x {
            0
        } else {
            (row_start / nz) as i64 - x_int_start as i64
        };
        Ok(Self { nz, x_offset })
    }

    /// 计算 (x + dx, z + dz) 对应的全局列索引
    ///
    /// z 回绕到 [0, nz)；x 偏移后必须仍在全局网格内
    /// （由模板构造保证，debug 模式下校验）。
    #[inline]
    pub fn column(&self, x: usize, z: usize, dx: i32, dz: i32) -> usize {
        let xg = x as i64 + dx as i64 + self.x_offset;
        debug_assert!(xg >= 0, "x 偏移越过全局网格下界");

        let nz = self.nz as i64;
        let mut zg = z as i64 + dz as i64;
        if zg < 0 {
            zg += nz;
        } else if zg > nz - 1 {
            zg -= nz;
        }

        (xg * nz + zg) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Partition;

    #[test]
    fn test_first_partition_identity() {
        let p = Partition::single(10, 4, 2).unwrap();
        let map = IndexMap::new(&p).unwrap();
        // 首分区本地 x 即全局 x
        assert_eq!(map.column(3, 1, 0, 0), 13);
        assert_eq!(map.column(3, 1, 1, 0), 17);
        assert_eq!(map.column(3, 1, -1, 0), 9);
    }

    #[test]
    fn test_z_wraparound() {
        let p = Partition::single(10, 4, 2).unwrap();
        let map = IndexMap::new(&p).unwrap();
        // z=0 向负方向回绕到 nz-1
        assert_eq!(map.column(3, 0, 0, -1), 3 * 4 + 3);
        // z=nz-1 向正方向回绕到 0
        assert_eq!(map.column(3, 3, 0, 1), 3 * 4);
        // 四阶模板的 ±2 偏移
        assert_eq!(map.column(3, 0, 0, -2), 3 * 4 + 2);
        assert_eq!(map.column(3, 3, 0, 2), 3 * 4 + 1);
    }

    #[test]
    fn test_middle_partition_offset() {
        // global_nx=13, guard=2, 3 分区: 内部 9 点按 3/3/3 均分
        let p = Partition::strip(13, 4, 2, 1, 3).unwrap();
        let map = IndexMap::new(&p).unwrap();

        // rank0 拥有 (2+3)*4 = 20 行, rank1 首行 20, x_offset = 20/4 - 2 = 3
        assert_eq!(p.row_start(), 20);
        // 本地内部起点 x=2 对应全局 x=5
        assert_eq!(map.column(2, 0, 0, 0), 5 * 4);
        // 向左邻居跨分区: 全局 x=4（rank0 拥有的行）
        assert_eq!(map.column(2, 0, -1, 0), 4 * 4);
    }

    #[test]
    fn test_last_partition_boundary_rows() {
        let p = Partition::strip(13, 4, 2, 2, 3).unwrap();
        let map = IndexMap::new(&p).unwrap();

        // rank2 本地网格: nx = 3 + 4 = 7, 内部 2..=4, 守护 5..=6
        // x_offset = row_start/nz - 2
        let x_offset = (p.row_start() / p.nz()) as i64 - 2;
        // 外边界守护格 x=6 对应全局最后一列 x=12
        assert_eq!(map.column(6, 0, 0, 0), ((6 + x_offset) as usize) * 4);
        assert_eq!(map.column(6, 0, 0, 0), 12 * 4);
    }

    #[test]
    fn test_non_divisible_row_start_rejected() {
        let err = IndexMap::from_parts(7, 4, 2, false).unwrap_err();
        assert!(matches!(err, PfError::Consistency { .. }));
    }
}
