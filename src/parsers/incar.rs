//! # VASP INCAR 解析器
//!
//! `KEY = value` 控制参数行。空行与 `#` / `!` 开头的行忽略，
//! 行尾注释去除，值两侧的引号去除，同一行可用 `;` 写多个赋值。
//!
//! 同时提供 ALGO 归一化与 GW 类判定（文本与 XML 两种读取器共用）。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs`, `parsers/vasprun.rs` 使用
//! - 使用 `utils/output.rs` 输出诊断

use crate::error::{Result, ScanError};
use crate::utils::output;

use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// 不输出标准弛豫结果的 GW 类算法
const GW_ALGOS: [&str; 6] = ["chi", "gw", "gw0", "scgw", "scgw0", "diag"];

/// 已知的非 GW 算法
const STANDARD_ALGOS: [&str; 11] = [
    "all",
    "conjugate",
    "damped",
    "eigenval",
    "exact",
    "fast",
    "none",
    "normal",
    "nothing",
    "subrot",
    "veryfast",
];

/// 未设置 ALGO 时的默认值
pub const DEFAULT_ALGO: &str = "Normal";

/// 归一化 ALGO 并判定是否为 GW 类运行
///
/// 返回 `(小写名称, is_gw)`；`"a"` 视为 `"all"`，未知名称返回 `UnknownAlgo`。
pub fn classify_algo(raw: &str) -> Result<(String, bool)> {
    let mut algo = raw.trim().to_lowercase();
    if algo == "a" {
        algo = "all".to_string();
    }

    if GW_ALGOS.contains(&algo.as_str()) {
        Ok((algo, true))
    } else if STANDARD_ALGOS.contains(&algo.as_str()) {
        Ok((algo, false))
    } else {
        Err(ScanError::UnknownAlgo(raw.trim().to_string()))
    }
}

/// INCAR 内容
#[derive(Debug, Clone)]
pub struct Incar {
    /// 键统一为大写
    values: BTreeMap<String, String>,
    /// 归一化后的 ALGO
    pub algo: String,
    pub is_gw: bool,
}

impl Incar {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_uppercase()).map(String::as_str)
    }

    /// 取值并解析，键不存在时为 `None`
    pub fn get_parse<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| ScanError::parse(format!("INCAR {}", key), format!("invalid value {:?}", raw))),
        }
    }
}

/// 解析 INCAR 文件
pub fn parse_incar_file(path: &Path) -> Result<Incar> {
    let content = std::fs::read_to_string(path).map_err(|e| ScanError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_incar_content(&content)
}

/// 从字符串内容解析 INCAR
pub fn parse_incar_content(content: &str) -> Result<Incar> {
    let assign = Regex::new(r"^([A-Za-z0-9_]+) *= *(.*)$")
        .map_err(|e| ScanError::parse("INCAR pattern", e.to_string()))?;

    let mut values = BTreeMap::new();
    for (iline, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        // 去掉行尾注释
        let line = match line.find(|c| c == '#' || c == '!') {
            Some(ix) => line[..ix].trim(),
            None => line,
        };

        for stmt in line.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let caps = assign.captures(stmt).ok_or_else(|| {
                ScanError::parse("INCAR", format!("invalid line {}: {:?}", iline + 1, raw_line))
            })?;
            let key = caps[1].to_uppercase();
            let val = caps[2].trim().trim_matches(|c| c == '"' || c == '\'').to_string();
            output::print_debug(5, || format!("parse_incar: {}: {}", key, val));
            values.insert(key, val);
        }
    }

    let raw_algo = values
        .get("ALGO")
        .cloned()
        .unwrap_or_else(|| DEFAULT_ALGO.to_string());
    let (algo, is_gw) = classify_algo(&raw_algo)?;

    Ok(Incar {
        values,
        algo,
        is_gw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_incar_basic() {
        let content = r#"
# NaCl relaxation
SYSTEM = "NaCl test"
ENCUT  = 400      # plane-wave cutoff
EDIFF = 1E-4
ISPIN = 1 ; IBRION = 2
! comment line
isif = 3
ALGO = Fast
"#;
        let incar = parse_incar_content(content).unwrap();
        assert_eq!(incar.get("SYSTEM"), Some("NaCl test"));
        assert_eq!(incar.get_parse::<f64>("ENCUT").unwrap(), Some(400.0));
        assert_eq!(incar.get_parse::<f64>("EDIFF").unwrap(), Some(1e-4));
        assert_eq!(incar.get_parse::<i64>("IBRION").unwrap(), Some(2));
        assert_eq!(incar.get_parse::<i64>("ISIF").unwrap(), Some(3));
        assert_eq!(incar.get_parse::<i64>("NSW").unwrap(), None);
        assert_eq!(incar.algo, "fast");
        assert!(!incar.is_gw);
    }

    #[test]
    fn test_default_algo() {
        let incar = parse_incar_content("ENCUT = 300\n").unwrap();
        assert_eq!(incar.algo, "normal");
        assert!(!incar.is_gw);
    }

    #[test]
    fn test_classify_algo() {
        assert_eq!(classify_algo("A").unwrap(), ("all".to_string(), false));
        assert_eq!(classify_algo("GW0").unwrap(), ("gw0".to_string(), true));
        assert_eq!(classify_algo("VeryFast").unwrap(), ("veryfast".to_string(), false));
        assert!(matches!(classify_algo("Turbo"), Err(ScanError::UnknownAlgo(_))));
    }

    #[test]
    fn test_invalid_line() {
        assert!(parse_incar_content("this is not an assignment\n").is_err());
        assert!(parse_incar_content("ALGO = Turbo\n").is_err());
    }
}
