//! # 晶格几何与一致性检查
//!
//! 3×3 矩阵运算（行向量为晶格矢量）、分数/笛卡尔坐标转换、
//! 倒格子一致性检查、体积与密度、应力张量重建。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs`, `parsers/vasprun.rs`, `parsers/poscar.rs` 使用
//! - 无外部模块依赖

use crate::error::{Result, ScanError};

/// 3×3 矩阵，行 = 晶格矢量
pub type Mat3 = [[f64; 3]; 3];

/// N×3 矩阵（原子坐标、力、k 点坐标）
pub type RowsMat = Vec<[f64; 3]>;

/// 1 amu 对应的克数
pub const GRAMS_PER_AMU: f64 = 1.660538921e-24;

/// 1 Å 对应的厘米数
pub const CM_PER_ANGSTROM: f64 = 1.0e-8;

/// eV/Å³ 到 kbar 的换算系数
pub const EV_PER_ANG3_TO_KBAR: f64 = 1602.1766208;

/// 行列式
pub fn det3(m: &Mat3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// 转置
pub fn transpose3(m: &Mat3) -> Mat3 {
    let mut t = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            t[i][j] = m[j][i];
        }
    }
    t
}

/// 求逆，奇异矩阵返回 `InconsistentGeometry`
pub fn invert3(m: &Mat3) -> Result<Mat3> {
    let det = det3(m);
    if det.abs() < 1e-12 {
        return Err(ScanError::InconsistentGeometry {
            what: "singular basis matrix".to_string(),
            delta: det.abs(),
            tolerance: 1e-12,
        });
    }

    Ok([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
        ],
    ])
}

/// 行向量乘矩阵: `rows · m`
pub fn mul_rows(rows: &[[f64; 3]], m: &Mat3) -> RowsMat {
    rows.iter()
        .map(|r| {
            [
                r[0] * m[0][0] + r[1] * m[1][0] + r[2] * m[2][0],
                r[0] * m[0][1] + r[1] * m[1][1] + r[2] * m[2][1],
                r[0] * m[0][2] + r[1] * m[1][2] + r[2] * m[2][2],
            ]
        })
        .collect()
}

/// 标量乘矩阵
pub fn scale3(m: &Mat3, s: f64) -> Mat3 {
    let mut out = *m;
    for row in out.iter_mut() {
        for v in row.iter_mut() {
            *v *= s;
        }
    }
    out
}

/// 分数坐标转笛卡尔坐标: `frac · basis`
pub fn frac_to_cart(frac: &[[f64; 3]], basis: &Mat3) -> RowsMat {
    mul_rows(frac, basis)
}

/// 笛卡尔坐标转分数坐标: `cart · inverse(basis)`
pub fn cart_to_frac(cart: &[[f64; 3]], basis: &Mat3) -> Result<RowsMat> {
    Ok(mul_rows(cart, &invert3(basis)?))
}

/// 倒格子基矢（无 2π 因子）: `inverse(basis)ᵗ`
pub fn reciprocal(basis: &Mat3) -> Result<Mat3> {
    Ok(transpose3(&invert3(basis)?))
}

/// 两个等形矩阵的最大绝对差
pub fn max_abs_delta<R: AsRef<[f64]>>(a: &[R], b: &[R]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let mut delta: f64 = 0.0;
    for (ra, rb) in a.iter().zip(b.iter()) {
        let (ra, rb) = (ra.as_ref(), rb.as_ref());
        if ra.len() != rb.len() {
            return None;
        }
        for (x, y) in ra.iter().zip(rb.iter()) {
            delta = delta.max((x - y).abs());
        }
    }
    Some(delta)
}

/// 检查两个矩阵在容差内相等，否则返回 `InconsistentGeometry`
pub fn check_close<R: AsRef<[f64]>>(what: &str, a: &[R], b: &[R], tolerance: f64) -> Result<()> {
    match max_abs_delta(a, b) {
        Some(delta) if delta <= tolerance => Ok(()),
        Some(delta) => Err(ScanError::InconsistentGeometry {
            what: what.to_string(),
            delta,
            tolerance,
        }),
        None => Err(ScanError::InconsistentGeometry {
            what: format!("{} (shape mismatch)", what),
            delta: f64::INFINITY,
            tolerance,
        }),
    }
}

/// 检查报告的倒格子与 `inverse(basis)ᵗ` 一致
pub fn check_reciprocal(what: &str, basis: &Mat3, recip: &Mat3, tolerance: f64) -> Result<()> {
    let expected = reciprocal(basis)?;
    check_close(what, recip, &expected, tolerance)
}

/// 晶胞体积 (Å³) = |det(basis)|
pub fn cell_volume(basis: &Mat3) -> f64 {
    det3(basis).abs()
}

/// 倒空间体积，含 (2π)³ 因子
pub fn recip_volume(basis: &Mat3) -> Result<f64> {
    let inv = invert3(basis)?;
    Ok(det3(&inv).abs() * (2.0 * std::f64::consts::PI).powi(3))
}

/// 密度 (g/cm³)
pub fn density(type_nums: &[usize], type_masses_amu: &[f64], volume_ang3: f64) -> f64 {
    let total_amu: f64 = type_nums
        .iter()
        .zip(type_masses_amu.iter())
        .map(|(&n, &m)| n as f64 * m)
        .sum();
    let volume_cm3 = volume_ang3 * CM_PER_ANGSTROM.powi(3);
    total_amu * GRAMS_PER_AMU / volume_cm3
}

/// 由 Voigt 六分量 (XX, YY, ZZ, XY, YZ, ZX) 重建对称应力张量
pub fn stress_from_voigt(v: &[f64; 6]) -> Mat3 {
    let [xx, yy, zz, xy, yz, zx] = *v;
    [[xx, xy, zx], [xy, yy, yz], [zx, yz, zz]]
}

/// 压力 = 迹 / 3
pub fn pressure(stress: &Mat3) -> f64 {
    (stress[0][0] + stress[1][1] + stress[2][2]) / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBIC: Mat3 = [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]];

    fn mul3(a: &Mat3, b: &Mat3) -> Mat3 {
        let rows = mul_rows(a, b);
        [rows[0], rows[1], rows[2]]
    }

    /// 简单的线性同余生成器，避免引入随机数依赖
    fn pseudo_random_basis(seed: u64) -> Mat3 {
        let mut state = seed;
        let mut next = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) * 2.0 - 1.0
        };
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for v in row.iter_mut() {
                *v = next();
            }
            // 对角占优保证可逆
            row[i] += 5.0;
        }
        m
    }

    #[test]
    fn test_invert_cubic() {
        let inv = invert3(&CUBIC).unwrap();
        assert!((inv[0][0] - 0.25).abs() < 1e-12);
        assert!(inv[0][1].abs() < 1e-12);
    }

    #[test]
    fn test_invert_singular() {
        let m = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        assert!(matches!(
            invert3(&m),
            Err(ScanError::InconsistentGeometry { .. })
        ));
    }

    #[test]
    fn test_reciprocal_invariant_random_bases() {
        for seed in 1..50 {
            let basis = pseudo_random_basis(seed);
            let recip = reciprocal(&basis).unwrap();
            check_reciprocal("random", &basis, &recip, 1e-9).unwrap();

            // basis · recipᵗ = I
            let prod = mul3(&basis, &transpose3(&recip));
            for i in 0..3 {
                for j in 0..3 {
                    let expect = if i == j { 1.0 } else { 0.0 };
                    assert!((prod[i][j] - expect).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_reciprocal_mismatch_fails() {
        let mut recip = reciprocal(&CUBIC).unwrap();
        recip[1][1] += 0.01;
        let err = check_reciprocal("initial", &CUBIC, &recip, 1e-3).unwrap_err();
        assert!(matches!(err, ScanError::InconsistentGeometry { .. }));
    }

    #[test]
    fn test_frac_cart_round_trip() {
        let basis = pseudo_random_basis(7);
        let frac = vec![[0.1, 0.2, 0.3], [0.5, 0.5, 0.5]];
        let cart = frac_to_cart(&frac, &basis);
        let back = cart_to_frac(&cart, &basis).unwrap();
        check_close("round trip", &frac, &back, 1e-10).unwrap();
    }

    #[test]
    fn test_volume_and_density() {
        assert!((cell_volume(&CUBIC) - 64.0).abs() < 1e-12);
        // NaCl 单胞: Cl 35.453 + Na 22.990 in 64 Å³
        let rho = density(&[1, 1], &[35.453, 22.990], 64.0);
        assert!((rho - 1.516_41).abs() < 1e-4);
    }

    #[test]
    fn test_recip_volume() {
        let v = recip_volume(&CUBIC).unwrap();
        let expect = (2.0 * std::f64::consts::PI).powi(3) / 64.0;
        assert!((v - expect).abs() < 1e-9);
    }

    #[test]
    fn test_stress_from_voigt() {
        let m = stress_from_voigt(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m, [[1.0, 4.0, 6.0], [4.0, 2.0, 5.0], [6.0, 5.0, 3.0]]);
        assert!((pressure(&m) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_stress_always_symmetric() {
        for seed in 1..20 {
            let b = pseudo_random_basis(seed);
            let v = [b[0][0], b[1][1], b[2][2], b[0][1], b[1][2], b[2][0]];
            let m = stress_from_voigt(&v);
            assert_eq!(m, transpose3(&m));
            let trace = m[0][0] + m[1][1] + m[2][2];
            assert!((trace - 3.0 * pressure(&m)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_check_close_shape_mismatch() {
        let a = vec![[0.0; 3]];
        let b = vec![[0.0; 3], [0.0; 3]];
        assert!(check_close("shape", &a, &b, 1.0).is_err());
    }
}
