//! # 费米能与带隙
//!
//! 零温填充法求费米能、逐自旋的导带底 / 价带顶与直接 / 间接带隙。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs`, `parsers/vasprun.rs` 使用
//! - 使用 `models/record.rs` 的 `BandSummary`

use crate::error::{Result, ScanError};
use crate::models::{BandSummary, BandTensor};
use crate::utils::output;

/// 零温费米能
///
/// 每个本征值按 k 点多重度复制；非自旋极化时再复制一次代表两个自旋通道。
/// 排序后取第 `round(total_valence · Σmult) - 1` 个。
pub fn efermi_calc(
    eigen: &BandTensor,
    mults: &[f64],
    num_spin: usize,
    total_valence: f64,
) -> Result<f64> {
    let spin_repl = if num_spin == 1 { 2 } else { 1 };

    let mut all_eigs: Vec<f64> = Vec::new();
    for spin in eigen {
        for (kp, bands) in spin.iter().enumerate() {
            let repl = mults.get(kp).map(|m| m.round().max(0.0) as usize).unwrap_or(0);
            for &val in bands {
                all_eigs.extend(std::iter::repeat(val).take(repl * spin_repl));
            }
        }
    }
    all_eigs.sort_by(|a, b| a.total_cmp(b));

    let dindx = total_valence * mults.iter().sum::<f64>();
    let index = dindx.round() as i64 - 1;
    if index < 0 || index as usize >= all_eigs.len() {
        return Err(ScanError::FermiIndexOutOfRange {
            dindx,
            index,
            len: all_eigs.len(),
        });
    }

    let efermi = all_eigs[index as usize];
    output::print_debug(5, || {
        format!(
            "efermi_calc: dindx {} index {} of {} -> {}",
            dindx,
            index,
            all_eigs.len(),
            efermi
        )
    });
    Ok(efermi)
}

/// 以 `efermi` 为界分析能带
///
/// 本征值 `<= efermi` 计入价带，`> efermi` 计入导带。
pub fn band_gaps(eigen: &BandTensor, efermi: f64) -> BandSummary {
    let num_spin = eigen.len();

    let mut cb_min_vals = vec![f64::INFINITY; num_spin];
    let mut vb_max_vals = vec![f64::NEG_INFINITY; num_spin];
    let mut cb_min_ixs = vec![None; num_spin];
    let mut vb_max_ixs = vec![None; num_spin];
    let mut bandgap_directs = vec![f64::INFINITY; num_spin];
    let mut bandgap_indirects = vec![f64::INFINITY; num_spin];

    for (isp, spin) in eigen.iter().enumerate() {
        for (ikp, bands) in spin.iter().enumerate() {
            let mut cb_kp = f64::INFINITY;
            let mut vb_kp = f64::NEG_INFINITY;

            for &val in bands {
                if val <= efermi {
                    vb_kp = vb_kp.max(val);
                    if val > vb_max_vals[isp] {
                        vb_max_vals[isp] = val;
                        vb_max_ixs[isp] = Some(ikp);
                    }
                } else {
                    cb_kp = cb_kp.min(val);
                    if val < cb_min_vals[isp] {
                        cb_min_vals[isp] = val;
                        cb_min_ixs[isp] = Some(ikp);
                    }
                }
            }

            let direct = (cb_kp - vb_kp).max(0.0);
            if direct < bandgap_directs[isp] {
                bandgap_directs[isp] = direct;
            }
        }
        bandgap_indirects[isp] = (cb_min_vals[isp] - vb_max_vals[isp]).max(0.0);
    }

    let cb_min = cb_min_vals.iter().copied().fold(f64::INFINITY, f64::min);
    let vb_max = vb_max_vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let bandgap = (cb_min - vb_max).max(0.0);

    output::print_debug(5, || {
        format!(
            "band_gaps: efermi {} cbMin {} vbMax {} directs {:?} indirects {:?}",
            efermi, cb_min, vb_max, bandgap_directs, bandgap_indirects
        )
    });

    BandSummary {
        cb_min,
        vb_max,
        bandgap,
        cb_min_vals,
        vb_max_vals,
        cb_min_ixs,
        vb_max_ixs,
        bandgap_directs,
        bandgap_indirects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_kpoint_two_bands() {
        let eigen = vec![vec![vec![-5.0, 3.0]]];
        let ef = efermi_calc(&eigen, &[1.0], 1, 2.0).unwrap();
        assert_eq!(ef, -5.0);

        let bands = band_gaps(&eigen, ef);
        assert_eq!(bands.cb_min, 3.0);
        assert_eq!(bands.vb_max, -5.0);
        assert_eq!(bands.bandgap, 8.0);
        assert_eq!(bands.bandgap_directs, vec![8.0]);
        assert_eq!(bands.cb_min_ixs, vec![Some(0)]);
    }

    #[test]
    fn test_weighted_kpoints() {
        // 两个 k 点，多重度 1 和 3，8 个价电子
        let eigen = vec![vec![
            vec![-10.0, -5.0, -2.0, 1.0, 5.0, 7.0],
            vec![-9.0, -4.0, -1.0, 0.5, 6.0, 8.0],
        ]];
        let ef = efermi_calc(&eigen, &[1.0, 3.0], 1, 8.0).unwrap();
        assert_eq!(ef, 1.0);

        let bands = band_gaps(&eigen, ef);
        assert_eq!(bands.vb_max, 1.0);
        assert_eq!(bands.cb_min, 5.0);
        assert_eq!(bands.bandgap_directs, vec![4.0]);
        assert_eq!(bands.bandgap_indirects, vec![4.0]);
        assert_eq!(bands.vb_max_ixs, vec![Some(0)]);
        assert_eq!(bands.cb_min_ixs, vec![Some(0)]);
    }

    #[test]
    fn test_indirect_gap_smaller_than_direct() {
        let eigen = vec![vec![vec![0.0, 4.0], vec![-1.0, 2.0]]];
        let bands = band_gaps(&eigen, 0.0);
        // 直接: min(4, 3) = 3，间接: 2 - 0 = 2
        assert_eq!(bands.bandgap_directs, vec![3.0]);
        assert_eq!(bands.bandgap_indirects, vec![2.0]);
        assert_eq!(bands.bandgap, 2.0);
        assert_eq!(bands.vb_max_ixs, vec![Some(0)]);
        assert_eq!(bands.cb_min_ixs, vec![Some(1)]);
    }

    #[test]
    fn test_spin_polarized_extrema_across_spins() {
        let eigen = vec![vec![vec![-1.0, 1.5]], vec![vec![-0.5, 2.0]]];
        let bands = band_gaps(&eigen, 0.0);
        assert_eq!(bands.cb_min, 1.5);
        assert_eq!(bands.vb_max, -0.5);
        assert_eq!(bands.bandgap, 2.0);
        assert_eq!(bands.cb_min_vals, vec![1.5, 2.0]);
    }

    #[test]
    fn test_band_split_across_kpoints() {
        // 每个 k 点只落在费米能一侧，直接带隙退化为 +∞
        let eigen = vec![vec![vec![-1.0, 0.3], vec![0.31, 3.0]]];
        let bands = band_gaps(&eigen, 0.3);
        assert!((bands.bandgap - 0.01).abs() < 1e-12);
        assert_eq!(bands.bandgap_directs, vec![f64::INFINITY]);
        assert_eq!(bands.vb_max_ixs, vec![Some(0)]);
        assert_eq!(bands.cb_min_ixs, vec![Some(1)]);
    }

    #[test]
    fn test_all_occupied_uses_sentinels() {
        let eigen = vec![vec![vec![-3.0, -2.0]]];
        let bands = band_gaps(&eigen, 10.0);
        assert_eq!(bands.cb_min, f64::INFINITY);
        assert_eq!(bands.cb_min_ixs, vec![None]);
        assert_eq!(bands.vb_max, -2.0);
    }

    #[test]
    fn test_fermi_index_out_of_range() {
        let eigen = vec![vec![vec![-5.0, 3.0]]];
        let err = efermi_calc(&eigen, &[1.0], 1, 10.0).unwrap_err();
        assert!(matches!(err, ScanError::FermiIndexOutOfRange { index: 9, len: 4, .. }));

        let err = efermi_calc(&eigen, &[1.0], 1, 0.0).unwrap_err();
        assert!(matches!(err, ScanError::FermiIndexOutOfRange { index: -1, .. }));
    }
}
