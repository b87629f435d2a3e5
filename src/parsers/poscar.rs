//! # VASP POSCAR 格式解析器
//!
//! 解析运行目录中的 POSCAR，作为 OUTCAR 的辅助输入（种类名与计数交叉校验、
//! 坐标缩放因子）。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (system name)
//! 1.0                    # scaling factor (负数表示目标体积)
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (optional)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs` 使用
//! - 使用 `physics/geometry.rs`

use crate::error::{Result, ScanError};
use crate::physics::geometry::{self, RowsMat};
use crate::utils::output;

use std::fs;
use std::path::Path;

/// POSCAR 中参与交叉校验的部分
///
/// 其余内容（体系名、晶格、坐标）只做格式检查并在诊断级别 5 输出。
#[derive(Debug, Clone)]
pub struct Poscar {
    /// 实际使用的缩放因子（负数体积已换算）
    pub scale: f64,
    /// 没有元素行时为 `None`
    pub type_names: Option<Vec<String>>,
    pub type_nums: Vec<usize>,
}

/// 解析 POSCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Poscar> {
    let content = fs::read_to_string(path).map_err(|e| ScanError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_poscar_content(&content)
}

fn err(reason: impl Into<String>) -> ScanError {
    ScanError::parse("POSCAR", reason)
}

fn parse_row3(line: &str, iline: usize, what: &str) -> Result<[f64; 3]> {
    let toks: Vec<&str> = line.split_whitespace().collect();
    if toks.len() < 3 {
        return Err(err(format!("invalid {} at line {}: {:?}", what, iline + 1, line)));
    }
    let mut row = [0.0; 3];
    for (v, t) in row.iter_mut().zip(toks.iter()) {
        *v = t
            .parse()
            .map_err(|_| err(format!("invalid {} at line {}: {:?}", what, iline + 1, line)))?;
    }
    Ok(row)
}

/// 从字符串内容解析 POSCAR
pub fn parse_poscar_content(content: &str) -> Result<Poscar> {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    let line_at = |ix: usize| -> Result<&str> {
        lines
            .get(ix)
            .copied()
            .ok_or_else(|| err(format!("file too short, missing line {}", ix + 1)))
    };

    // Line 0: system name
    let system_name = line_at(0)?.trim_matches(|c| c == '"' || c == '\'').to_string();

    // Line 1: scaling factor
    let raw_scale: f64 = line_at(1)?
        .split_whitespace()
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| err(format!("invalid scale factor {:?}", lines.get(1))))?;

    // Lines 2-4: lattice vectors
    let mut raw_basis = [[0.0; 3]; 3];
    for (i, row) in raw_basis.iter_mut().enumerate() {
        *row = parse_row3(line_at(2 + i)?, 2 + i, "lattice vector")?;
    }

    let scale = if raw_scale < 0.0 {
        (raw_scale.abs() / geometry::cell_volume(&raw_basis)).cbrt()
    } else {
        raw_scale
    };
    let basis = geometry::scale3(&raw_basis, scale);

    // Line 5: element symbols, or atom counts when absent
    let mut iline = 5;
    let first_tok = line_at(iline)?.split_whitespace().next().unwrap_or("");
    let type_names = if first_tok.parse::<usize>().is_ok() {
        None
    } else {
        let names: Vec<String> = line_at(iline)?.split_whitespace().map(str::to_string).collect();
        iline += 1;
        Some(names)
    };

    let type_nums: Vec<usize> = line_at(iline)?
        .split_whitespace()
        .map(|t| t.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| err(format!("invalid species counts at line {}", iline + 1)))?;
    iline += 1;

    if let Some(names) = &type_names {
        if names.len() != type_nums.len() {
            return Err(ScanError::conflict(
                "POSCAR species",
                "names",
                names,
                "counts",
                &type_nums,
            ));
        }
    }

    let mut selective_dynamics = false;
    if line_at(iline)?.to_lowercase().starts_with('s') {
        selective_dynamics = true;
        iline += 1;
    }

    let coord_type = line_at(iline)?.to_lowercase();
    iline += 1;
    let is_cartesian = match coord_type.chars().next() {
        Some('c') | Some('k') => true,
        Some('d') => false,
        _ => return Err(err(format!("unknown coordinate type {:?}", coord_type))),
    };

    let num_atom: usize = type_nums.iter().sum();
    let mut pos = Vec::with_capacity(num_atom);
    for ix in iline..iline + num_atom {
        pos.push(parse_row3(line_at(ix)?, ix, "position")?);
    }

    let (frac_pos, cart_pos) = if is_cartesian {
        let cart: RowsMat = pos
            .iter()
            .map(|p| [p[0] * scale, p[1] * scale, p[2] * scale])
            .collect();
        (geometry::cart_to_frac(&cart, &basis)?, cart)
    } else {
        let cart = geometry::frac_to_cart(&pos, &basis);
        (pos, cart)
    };

    output::print_debug(5, || {
        format!(
            "parse_poscar: system {:?} scale {} selective {}\n\
             typeNames {:?} typeNums {:?}\n\
             basis:\n{}\nfrac:\n{}\ncart:\n{}",
            system_name,
            scale,
            selective_dynamics,
            type_names,
            type_nums,
            output::format_matrix(&basis),
            output::format_matrix(&frac_pos),
            output::format_matrix(&cart_pos)
        )
    });

    Ok(Poscar {
        scale,
        type_names,
        type_nums,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poscar_with_names() {
        let content = r#"NaCl rocksalt
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Cl Na
4 4
Direct
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
"#;
        let p = parse_poscar_content(content).unwrap();
        assert_eq!(p.type_names, Some(vec!["Cl".to_string(), "Na".to_string()]));
        assert_eq!(p.type_nums, vec![4, 4]);
        assert_eq!(p.scale, 1.0);
    }

    #[test]
    fn test_parse_poscar_without_names_and_scale() {
        let content = r#"Si
2.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
2
Direct
0.0 0.0 0.0
0.25 0.25 0.25
"#;
        let p = parse_poscar_content(content).unwrap();
        assert!(p.type_names.is_none());
        assert_eq!(p.type_nums, vec![2]);
        assert_eq!(p.scale, 2.0);
    }

    #[test]
    fn test_parse_poscar_negative_scale_is_volume() {
        let content = "X\n-27.0\n1 0 0\n0 1 0\n0 0 1\nH\n1\nDirect\n0 0 0\n";
        let p = parse_poscar_content(content).unwrap();
        assert!((p.scale - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_poscar_cartesian_selective() {
        let content = r#"Fe with selective
1.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Fe
2
Selective dynamics
Cartesian
0.0 0.0 0.0 T T T
1.0 1.0 1.0 F F F
"#;
        let p = parse_poscar_content(content).unwrap();
        assert_eq!(p.type_names, Some(vec!["Fe".to_string()]));
        assert_eq!(p.type_nums, vec![2]);
    }

    #[test]
    fn test_parse_poscar_unknown_coordinate_type() {
        let content = "X\n1.0\n1 0 0\n0 1 0\n0 0 1\nH\n1\nReciprocal\n0 0 0\n";
        assert!(parse_poscar_content(content).is_err());
    }

    #[test]
    fn test_parse_poscar_truncated() {
        let content = "X\n1.0\n1 0 0\n0 1 0\n0 0 1\nH\n2\nDirect\n0 0 0\n";
        assert!(parse_poscar_content(content).is_err());
    }
}
