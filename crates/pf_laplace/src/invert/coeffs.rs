// crates/pf_laplace/src/invert/coeffs.rs

//! PDE 系数求值
//!
//! 对每个内部格点给出五个系数：二阶 x / 二阶 z / 混合导数、
//! 一阶 x / 一阶 z。基础部分来自度量张量（纯几何），在此之上
//! 依次叠加：
//!
//! 1. `all_terms` 关闭时一阶导数系数清零
//! 2. 非均匀网格修正（仅内部格点，两端除外）
//! 3. 移位径向导数 + 积分剪切时的 z 二阶修正（混合项恰好消去）
//! 4. 扩散系数场 D 的整体缩放
//! 5. C2/C1 对数导数修正（需离 x 边界至少 2 格，z 周期回绕）
//! 6. 矢量分量场 Ex/Ez 的一阶项叠加
//!
//! 求值是纯函数：不满足 C 修正内部性条件的格点静默跳过该项
//! 而不是报错，这是约定的边界策略。

use crate::mesh::Grid;
use ndarray::Array3;
use pf_foundation::{PfError, PfResult, Scalar};

/// 五个 PDE 系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilCoeffs {
    /// 二阶 x 导数系数
    pub dx2: Scalar,
    /// 二阶 z 导数系数
    pub dz2: Scalar,
    /// 混合导数系数
    pub dxdz: Scalar,
    /// 一阶 x 导数系数
    pub dx: Scalar,
    /// 一阶 z 导数系数
    pub dz: Scalar,
}

/// 可选的 PDE 系数场
///
/// 每个场有独立的"已设置"状态（`Option`）；未设置时取中性值
/// （A/Ex/Ez 取 0，C1/C2/D 取 1）。场归调用方所有，按 (x, y, z)
/// 索引，生命周期覆盖一次求解调用。
#[derive(Debug, Clone, Default)]
pub struct Coefficients {
    a: Option<Array3<Scalar>>,
    c1: Option<Array3<Scalar>>,
    c2: Option<Array3<Scalar>>,
    d: Option<Array3<Scalar>>,
    ex: Option<Array3<Scalar>>,
    ez: Option<Array3<Scalar>>,
}

impl Coefficients {
    /// 创建全部未设置的系数组
    pub fn new() -> Self {
        Self::default()
    }

    fn check_shape(
        name: &'static str,
        field: &Array3<Scalar>,
        nx: usize,
        ny: usize,
        nz: usize,
    ) -> PfResult<()> {
        let shape = field.shape();
        PfError::check_size(name, nx, shape[0])?;
        PfError::check_size(name, ny, shape[1])?;
        PfError::check_size(name, nz, shape[2])?;
        Ok(())
    }

    /// 设置零阶项系数 A
    pub fn set_a(&mut self, f: Array3<Scalar>, nx: usize, ny: usize, nz: usize) -> PfResult<()> {
        Self::check_shape("coef A", &f, nx, ny, nz)?;
        self.a = Some(f);
        Ok(())
    }

    /// 设置 C1（C 修正的分母）
    pub fn set_c1(&mut self, f: Array3<Scalar>, nx: usize, ny: usize, nz: usize) -> PfResult<()> {
        Self::check_shape("coef C1", &f, nx, ny, nz)?;
        self.c1 = Some(f);
        Ok(())
    }

    /// 设置 C2（C 修正的被导量）
    pub fn set_c2(&mut self, f: Array3<Scalar>, nx: usize, ny: usize, nz: usize) -> PfResult<()> {
        Self::check_shape("coef C2", &f, nx, ny, nz)?;
        self.c2 = Some(f);
        Ok(())
    }

    /// 设置扩散系数场 D
    pub fn set_d(&mut self, f: Array3<Scalar>, nx: usize, ny: usize, nz: usize) -> PfResult<()> {
        Self::check_shape("coef D", &f, nx, ny, nz)?;
        self.d = Some(f);
        Ok(())
    }

    /// 设置 x 方向附加一阶项 Ex
    pub fn set_ex(&mut self, f: Array3<Scalar>, nx: usize, ny: usize, nz: usize) -> PfResult<()> {
        Self::check_shape("coef Ex", &f, nx, ny, nz)?;
        self.ex = Some(f);
        Ok(())
    }

    /// 设置 z 方向附加一阶项 Ez
    pub fn set_ez(&mut self, f: Array3<Scalar>, nx: usize, ny: usize, nz: usize) -> PfResult<()> {
        Self::check_shape("coef Ez", &f, nx, ny, nz)?;
        self.ez = Some(f);
        Ok(())
    }

    /// 零阶项 A 在 (x, y, z) 处的值（未设置时为 0）
    #[inline]
    pub fn a0(&self, x: usize, y: usize, z: usize) -> Scalar {
        self.a.as_ref().map_or(0.0, |f| f[[x, y, z]])
    }
}

/// 系数求值器
///
/// 借用网格、系数场与求解选项，在组装循环中逐点求值。
pub struct CoefficientEvaluator<'a> {
    grid: &'a Grid,
    coefs: &'a Coefficients,
    all_terms: bool,
    nonuniform: bool,
    fourth_order: bool,
}

impl<'a> CoefficientEvaluator<'a> {
    /// 创建求值器
    pub fn new(
        grid: &'a Grid,
        coefs: &'a Coefficients,
        all_terms: bool,
        nonuniform: bool,
        fourth_order: bool,
    ) -> Self {
        Self {
            grid,
            coefs,
            all_terms,
            nonuniform,
            fourth_order,
        }
    }

    /// 非均匀网格对一阶 x 系数的修正
    ///
    /// 沿用传统公式 `-0.5 (dx[x+1]-dx[x-1]) / dx[x]² * coef_dx2`；
    /// 另一候选是把相邻 1/dx 做中心差分
    /// （`+0.25 g11 (1/dx[x+1]-1/dx[x-1]) / dx[x]`），两者在
    /// 非均匀网格上并不等价，未经领域确认前保持传统行为。
    #[inline]
    fn nonuniform_correction(&self, x: usize, y: usize, dx2_coef: Scalar) -> Scalar {
        let m = self.grid.metrics();
        let num = m.dx[[x + 1, y]] - m.dx[[x - 1, y]];
        -0.5 * (num / (m.dx[[x, y]] * m.dx[[x, y]])) * dx2_coef
    }

    /// 在 (x, y, z) 处求全部五个系数
    pub fn evaluate(&self, x: usize, y: usize, z: usize) -> StencilCoeffs {
        let m = self.grid.metrics();
        let nx = self.grid.partition().nx();
        let nz = self.grid.partition().nz();

        let mut dx2 = m.g11[[x, y]];
        let mut dz2 = m.g33[[x, y]];
        let mut dxdz = 2.0 * m.g13[[x, y]];

        let (mut dx1, mut dz1) = if self.all_terms {
            (m.g1_up[[x, y]], m.g3_up[[x, y]])
        } else {
            (0.0, 0.0)
        };

        if self.nonuniform && x != 0 && x != nx - 1 {
            dx1 += self.nonuniform_correction(x, y, dx2);
        }

        if m.shifted_derivs && m.include_int_shear {
            // z 二阶项补上剪切贡献
            dz2 += m.g11[[x, y]] * m.int_shear[[x, y]] * m.int_shear[[x, y]];
            // 混合项恰好消去
            dxdz = 0.0;
        }

        if let Some(d) = &self.coefs.d {
            let dv = d[[x, y, z]];
            dx2 *= dv;
            dz2 *= dv;
            dxdz *= dv;
            dx1 *= dv;
            dz1 *= dv;
        }

        // C2/C1 对数导数修正：差分模板需要离 x 边界至少 2 格，
        // 不满足时静默跳过
        if let (Some(c1), Some(c2)) = (&self.coefs.c1, &self.coefs.c2) {
            if x > 1 && x < nx - 2 {
                let zp = (z + 1) % nz;
                let zm = (z + nz - 1) % nz;

                let c1v = c1[[x, y, z]];
                let (ddx_c, ddz_c) = if self.fourth_order {
                    let zpp = (z + 2) % nz;
                    let zmm = (z + nz - 2) % nz;
                    (
                        (-c2[[x + 2, y, z]] + 8.0 * c2[[x + 1, y, z]] - 8.0 * c2[[x - 1, y, z]]
                            + c2[[x - 2, y, z]])
                            / (12.0 * m.dx[[x, y]] * c1v),
                        (-c2[[x, y, zpp]] + 8.0 * c2[[x, y, zp]] - 8.0 * c2[[x, y, zm]]
                            + c2[[x, y, zmm]])
                            / (12.0 * m.dz * c1v),
                    )
                } else {
                    (
                        (c2[[x + 1, y, z]] - c2[[x - 1, y, z]]) / (2.0 * m.dx[[x, y]] * c1v),
                        (c2[[x, y, zp]] - c2[[x, y, zm]]) / (2.0 * m.dz * c1v),
                    )
                };

                dx1 += m.g11[[x, y]] * ddx_c + m.g13[[x, y]] * ddz_c;
                dz1 += m.g13[[x, y]] * ddx_c + m.g33[[x, y]] * ddz_c;
            }
        }

        // 矢量分量场的附加一阶项
        if let Some(ex) = &self.coefs.ex {
            dx1 += ex[[x, y, z]];
        }
        if let Some(ez) = &self.coefs.ez {
            dz1 += ez[[x, y, z]];
        }

        StencilCoeffs {
            dx2,
            dz2,
            dxdz,
            dx: dx1,
            dz: dz1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Grid, Metrics, Partition};
    use ndarray::Array3;

    fn grid(nx: usize, nz: usize) -> Grid {
        Grid::new(
            Partition::single(nx, nz, 2).unwrap(),
            Metrics::uniform(nx, 1, 1.0, 1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_base_metric_coefficients() {
        let g = grid(10, 4);
        let coefs = Coefficients::new();
        let eval = CoefficientEvaluator::new(&g, &coefs, false, false, false);

        let c = eval.evaluate(5, 0, 1);
        assert!((c.dx2 - 1.0).abs() < 1e-14);
        assert!((c.dz2 - 1.0).abs() < 1e-14);
        assert!(c.dxdz.abs() < 1e-14);
        // all_terms 关闭时一阶系数为零
        assert!(c.dx.abs() < 1e-14);
        assert!(c.dz.abs() < 1e-14);
    }

    #[test]
    fn test_all_terms_uses_first_derivative_metrics() {
        let mut g = grid(10, 4);
        g.metrics_mut().g1_up.fill(0.5);
        g.metrics_mut().g3_up.fill(-0.25);
        let coefs = Coefficients::new();
        let eval = CoefficientEvaluator::new(&g, &coefs, true, false, false);

        let c = eval.evaluate(5, 0, 0);
        assert!((c.dx - 0.5).abs() < 1e-14);
        assert!((c.dz + 0.25).abs() < 1e-14);
    }

    #[test]
    fn test_nonuniform_legacy_formula() {
        let mut g = grid(10, 4);
        // dx 沿 x 线性增长: dx[x] = 1 + 0.1 x
        for x in 0..10 {
            g.metrics_mut().dx[[x, 0]] = 1.0 + 0.1 * x as Scalar;
        }
        let coefs = Coefficients::new();
        let eval = CoefficientEvaluator::new(&g, &coefs, false, true, false);

        let x = 5;
        let c = eval.evaluate(x, 0, 0);
        let dxc = 1.0 + 0.1 * x as Scalar;
        // -0.5 * (dx[6]-dx[4]) / dx[5]^2 * g11
        let expected = -0.5 * 0.2 / (dxc * dxc);
        assert!((c.dx - expected).abs() < 1e-12);
    }

    #[test]
    fn test_shear_correction_cancels_mixed_term() {
        let mut g = grid(10, 4);
        g.metrics_mut().g13.fill(0.3);
        g.metrics_mut().int_shear.fill(2.0);
        g.metrics_mut().shifted_derivs = true;
        g.metrics_mut().include_int_shear = true;
        let coefs = Coefficients::new();
        let eval = CoefficientEvaluator::new(&g, &coefs, false, false, false);

        let c = eval.evaluate(5, 0, 0);
        // dz2 = g33 + g11 * I^2 = 1 + 4
        assert!((c.dz2 - 5.0).abs() < 1e-14);
        assert!(c.dxdz.abs() < 1e-14);
    }

    #[test]
    fn test_d_scales_everything() {
        let g = grid(10, 4);
        let mut coefs = Coefficients::new();
        coefs
            .set_d(Array3::from_elem((10, 1, 4), 3.0), 10, 1, 4)
            .unwrap();
        let eval = CoefficientEvaluator::new(&g, &coefs, false, false, false);

        let c = eval.evaluate(5, 0, 0);
        assert!((c.dx2 - 3.0).abs() < 1e-14);
        assert!((c.dz2 - 3.0).abs() < 1e-14);
    }

    #[test]
    fn test_c_correction_and_edge_skip() {
        let g = grid(10, 4);
        let mut coefs = Coefficients::new();
        coefs
            .set_c1(Array3::from_elem((10, 1, 4), 2.0), 10, 1, 4)
            .unwrap();
        // C2 沿 x 线性: 斜率 1
        let c2 = Array3::from_shape_fn((10, 1, 4), |(x, _, _)| x as Scalar);
        coefs.set_c2(c2, 10, 1, 4).unwrap();

        let eval = CoefficientEvaluator::new(&g, &coefs, false, false, false);

        // 充分内部的格点: ddx_C = (C2[x+1]-C2[x-1]) / (2 dx C1) = 2/(2*1*2) = 0.5
        let c = eval.evaluate(5, 0, 0);
        assert!((c.dx - 0.5).abs() < 1e-12);
        // g13 = 0 时 z 一阶项只含 g33 * ddz_C = 0（C2 与 z 无关）
        assert!(c.dz.abs() < 1e-12);

        // 离边界不足 2 格: 修正静默跳过
        let c_edge = eval.evaluate(1, 0, 0);
        assert!(c_edge.dx.abs() < 1e-14);
    }

    #[test]
    fn test_e_fields_add_first_order_terms() {
        let g = grid(10, 4);
        let mut coefs = Coefficients::new();
        coefs
            .set_ex(Array3::from_elem((10, 1, 4), 0.7), 10, 1, 4)
            .unwrap();
        coefs
            .set_ez(Array3::from_elem((10, 1, 4), -0.2), 10, 1, 4)
            .unwrap();
        let eval = CoefficientEvaluator::new(&g, &coefs, false, false, false);

        let c = eval.evaluate(5, 0, 0);
        assert!((c.dx - 0.7).abs() < 1e-14);
        assert!((c.dz + 0.2).abs() < 1e-14);
    }

    #[test]
    fn test_fourth_order_c_difference() {
        let g = grid(12, 8);
        let mut coefs = Coefficients::new();
        coefs
            .set_c1(Array3::from_elem((12, 1, 8), 1.0), 12, 1, 8)
            .unwrap();
        // C2 沿 x 线性时四点公式也应给出精确斜率
        let c2 = Array3::from_shape_fn((12, 1, 8), |(x, _, _)| 3.0 * x as Scalar);
        coefs.set_c2(c2, 12, 1, 8).unwrap();

        let eval = CoefficientEvaluator::new(&g, &coefs, false, false, true);
        let c = eval.evaluate(5, 0, 0);
        // (-C2[7] + 8 C2[6] - 8 C2[4] + C2[3]) / 12 = 3
        assert!((c.dx - 3.0).abs() < 1e-12);
    }
}
