//! # 元素种类与 k 点权重
//!
//! 逐原子展开、字母序检查、k 点权重归一化。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs`, `parsers/vasprun.rs` 使用
//! - 使用 `models/record.rs` 的 `Species`

use crate::error::{Result, ScanError};
use crate::models::Species;

/// 按种类计数复制每个种类的属性，保持种类顺序
pub fn expand_per_atom<T: Clone>(counts: &[usize], values: &[T]) -> Vec<T> {
    counts
        .iter()
        .zip(values.iter())
        .flat_map(|(&n, v)| std::iter::repeat(v.clone()).take(n))
        .collect()
}

/// 名称必须按字母序（允许相等）
pub fn check_alphabetic(names: &[String]) -> Result<()> {
    if names.windows(2).any(|w| w[0] > w[1]) {
        return Err(ScanError::UnsortedSpecies(names.to_vec()));
    }
    Ok(())
}

/// `weight[i] = mult[i] / Σ mult`
pub fn normalize_weights(mults: &[f64]) -> Result<Vec<f64>> {
    let total: f64 = mults.iter().sum();
    if total <= 0.0 {
        return Err(ScanError::parse(
            "k-point multiplicities",
            format!("non-positive sum {}", total),
        ));
    }
    Ok(mults.iter().map(|m| m / total).collect())
}

/// `Σ count[i] · valence[i]`
pub fn total_valence(counts: &[usize], valences: &[f64]) -> f64 {
    counts
        .iter()
        .zip(valences.iter())
        .map(|(&n, &v)| n as f64 * v)
        .sum()
}

/// 由逐种类的平行数组构造 `Species`，检查长度一致与字母序
pub fn build_species(
    type_names: Vec<String>,
    type_nums: Vec<usize>,
    type_masses_amu: Vec<f64>,
    type_pseudos: Vec<String>,
    type_valences: Vec<f64>,
) -> Result<Species> {
    let ntype = type_names.len();
    let lens = [
        ("typeNums", type_nums.len()),
        ("typeMasses_amu", type_masses_amu.len()),
        ("typePseudos", type_pseudos.len()),
        ("typeValences", type_valences.len()),
    ];
    for (what, len) in lens {
        if len != ntype {
            return Err(ScanError::conflict(
                format!("{} length", what),
                "typeNames",
                ntype,
                what,
                len,
            ));
        }
    }

    check_alphabetic(&type_names)?;

    let atom_names = expand_per_atom(&type_nums, &type_names);
    check_alphabetic(&atom_names)?;

    let atom_masses_amu = expand_per_atom(&type_nums, &type_masses_amu);
    let atom_pseudos = expand_per_atom(&type_nums, &type_pseudos);
    let atom_valences = expand_per_atom(&type_nums, &type_valences);

    let num_atom = type_nums.iter().sum();
    let total_valence = total_valence(&type_nums, &type_valences);

    Ok(Species {
        type_names,
        type_nums,
        type_masses_amu,
        type_pseudos,
        type_valences,
        atom_names,
        atom_masses_amu,
        atom_pseudos,
        atom_valences,
        num_atom,
        total_valence,
    })
}
