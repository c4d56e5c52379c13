// crates/pf_laplace/src/invert/marshal.rs

//! 场 ↔ 向量搬运
//!
//! 把二维场拷入/拷出分布式向量的本地拥有段。行遍历顺序与
//! 组装器完全一致：首分区的内边界守护行、内部行、末分区的
//! 外边界守护行。顺序偏离不会报错，只会静默搬错数据，
//! 所以遍历写成单一内部函数供两个方向共用。
//!
//! 结束时校验最终行号等于本分区末行加一，违反即一致性错误。
//! 往返定律：`vec_to_field(field_to_vec(f)) == f`（纯数据搬运，
//! 按位相等）。

use crate::field::PlaneField;
use crate::mesh::Partition;
use pf_foundation::{PfError, PfResult, Scalar};

/// 按组装顺序遍历本地拥有的 (行, x, z) 三元组
fn for_each_owned_row(
    partition: &Partition,
    mut visit: impl FnMut(usize, usize, usize),
) -> PfResult<()> {
    let nz = partition.nz();
    let mut row = partition.row_start();

    if partition.first_x() {
        for x in 0..partition.x_int_start() {
            for z in 0..nz {
                visit(row, x, z);
                row += 1;
            }
        }
    }

    for x in partition.x_int_start()..=partition.x_int_end() {
        for z in 0..nz {
            visit(row, x, z);
            row += 1;
        }
    }

    if partition.last_x() {
        for x in (partition.x_int_end() + 1)..partition.nx() {
            for z in 0..nz {
                visit(row, x, z);
                row += 1;
            }
        }
    }

    if row != partition.rows().end {
        return Err(PfError::consistency(format!(
            "行遍历结束于 {}, 期望 {}",
            row,
            partition.rows().end
        )));
    }
    Ok(())
}

/// 把二维场拷入向量的本地拥有段
///
/// 向量为全局长度，仅写本分区拥有的行。
pub fn field_to_vec(partition: &Partition, field: &PlaneField, vec: &mut [Scalar]) -> PfResult<()> {
    field.check_shape(partition.nx(), partition.nz())?;
    PfError::check_size("vector", partition.global_size(), vec.len())?;

    for_each_owned_row(partition, |row, x, z| {
        vec[row] = field.get(x, z);
    })
}

/// 从向量的本地拥有段取出二维场
///
/// 分配新场并按与 [`field_to_vec`] 相同的顺序填充；
/// 本分区不拥有的守护格保持为零。
pub fn vec_to_field(partition: &Partition, vec: &[Scalar], plane: usize) -> PfResult<PlaneField> {
    PfError::check_size("vector", partition.global_size(), vec.len())?;

    let mut field = PlaneField::zeros(partition.nx(), partition.nz(), plane);
    for_each_owned_row(partition, |row, x, z| {
        field.set(x, z, vec[row]);
    })?;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Partition;

    #[test]
    fn test_round_trip_exact() {
        let p = Partition::single(8, 4, 2).unwrap();
        let f = PlaneField::from_fn(8, 4, 3, |x, z| {
            // 无规律的值，按位往返
            (x as Scalar * 13.37 + z as Scalar * 0.21).sin() * 1e3
        });

        let mut v = vec![0.0; p.global_size()];
        field_to_vec(&p, &f, &mut v).unwrap();
        let back = vec_to_field(&p, &v, 3).unwrap();

        assert_eq!(back, f);
        assert_eq!(back.plane(), 3);
    }

    #[test]
    fn test_traversal_matches_row_order() {
        // 单分区时行号应为 x*nz + z
        let p = Partition::single(6, 3, 1).unwrap();
        let f = PlaneField::from_fn(6, 3, 0, |x, z| (x * 3 + z) as Scalar);

        let mut v = vec![0.0; p.global_size()];
        field_to_vec(&p, &f, &mut v).unwrap();

        for (row, value) in v.iter().enumerate() {
            assert!((value - row as Scalar).abs() < 1e-14);
        }
    }

    #[test]
    fn test_strip_partition_writes_only_owned_rows() {
        let p = Partition::strip(13, 4, 2, 1, 3).unwrap();
        let f = PlaneField::constant(p.nx(), p.nz(), 0, 1.0);

        let mut v = vec![0.0; p.global_size()];
        field_to_vec(&p, &f, &mut v).unwrap();

        let owned = p.rows();
        for (row, value) in v.iter().enumerate() {
            if owned.contains(&row) {
                assert!((value - 1.0).abs() < 1e-14, "row {} should be written", row);
            } else {
                assert!(value.abs() < 1e-14, "row {} should be untouched", row);
            }
        }
        // 中间分区只拥有内部行
        assert_eq!(owned.len(), (p.x_int_end() - p.x_int_start() + 1) * p.nz());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let p = Partition::single(8, 4, 2).unwrap();
        let f = PlaneField::zeros(8, 4, 0);
        let mut v = vec![0.0; 10];
        assert!(field_to_vec(&p, &f, &mut v).is_err());

        let f_bad = PlaneField::zeros(7, 4, 0);
        let mut v_ok = vec![0.0; p.global_size()];
        assert!(field_to_vec(&p, &f_bad, &mut v_ok).is_err());
    }
}
