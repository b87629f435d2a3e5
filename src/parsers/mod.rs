//! # 解析器模块
//!
//! 两种运行目录读取器及其底层工具，以及唯一的错误恢复点 `parse_dir`。
//!
//! ```text
//! parse_dir(dir, mode)
//!   ├── Text: outcar::parse_text_run   (INCAR + POSCAR + OUTCAR, scanner)
//!   └── Xml:  vasprun::parse_xml_run   (vasprun.xml, xml_path + xml_array)
//! ```
//!
//! ## 依赖关系
//! - 被 `batch/`, `commands/` 使用
//! - 使用 `models/record.rs`, `physics/`
//! - 子模块: scanner, incar, poscar, outcar, xml_path, xml_array, vasprun

pub mod incar;
pub mod outcar;
pub mod poscar;
pub mod scanner;
pub mod vasprun;
pub mod xml_array;
pub mod xml_path;

use crate::error::{Result, ScanError};
use crate::models::{ReadMode, RunData, RunRecord};
use crate::utils::output;

use anyhow::Context;
use std::path::Path;

/// 读取单个运行目录
///
/// 任何错误都不会向上传播：失败写入记录的 `errorMessage` / `errorTrace`。
pub fn parse_dir(dir: &Path, mode: ReadMode) -> RunRecord {
    let parsed = try_parse_dir(dir, mode)
        .with_context(|| format!("parsing {} run in {}", mode, dir.display()));

    match parsed {
        Ok(run) => {
            output::print_debug(1, || format!("parse_dir: {}: complete", dir.display()));
            RunRecord::complete(run)
        }
        Err(e) => {
            output::print_debug(1, || format!("parse_dir: {}: {:#}", dir.display(), e));
            RunRecord::failed(format!("{:#}", e), format!("{:?}", e))
        }
    }
}

/// 检查目录与主文件后分派到对应读取器
pub fn try_parse_dir(dir: &Path, mode: ReadMode) -> Result<RunData> {
    if !dir.is_dir() {
        return Err(ScanError::DirectoryNotFound {
            path: dir.display().to_string(),
        });
    }
    let primary = dir.join(mode.primary_file());
    if !primary.is_file() {
        return Err(ScanError::FileNotFound {
            path: primary.display().to_string(),
        });
    }

    match mode {
        ReadMode::Text => outcar::parse_text_run(dir),
        ReadMode::Xml => vasprun::parse_xml_run(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/nacl")
    }

    /// 复制夹具目录，对指定文件做一次文本替换
    fn edited_copy(file: &str, from: &str, to: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for name in ["INCAR", "POSCAR", "OUTCAR", "vasprun.xml"] {
            let text = fs::read_to_string(fixture_dir().join(name)).unwrap();
            let text = if name == file {
                assert!(text.contains(from), "{} lacks {:?}", name, from);
                text.replacen(from, to, 1)
            } else {
                text
            };
            fs::write(tmp.path().join(name), text).unwrap();
        }
        tmp
    }

    #[test]
    fn test_both_modes_complete() {
        for mode in [ReadMode::Text, ReadMode::Xml] {
            let rec = parse_dir(&fixture_dir(), mode);
            assert_eq!(rec.status(), RunStatus::Complete, "{:?}", rec.error_message);
            let run = rec.data().unwrap();
            assert_eq!(run.species.type_names, vec!["Cl", "Na"]);
            assert_eq!(run.standard.as_ref().unwrap().bands.bandgap, 4.0);
        }
    }

    #[test]
    fn test_spin_polarized_both_modes() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/nacl_spin2");
        for mode in [ReadMode::Text, ReadMode::Xml] {
            let rec = parse_dir(&dir, mode);
            assert_eq!(rec.status(), RunStatus::Complete, "{:?}", rec.error_message);
            let run = rec.data().unwrap();
            assert_eq!(run.num_spin, 2);

            let results = run.standard.as_ref().unwrap();
            assert_eq!(results.eigen_mat.len(), 2);
            assert_eq!(results.eigen_mat[0][0][3], 1.0);
            assert_eq!(results.eigen_mat[1][0][3], 1.25);
            assert_eq!(results.eigen_mat[1][1], vec![-8.75, -3.75, -0.75, 0.75, 6.25, 8.25]);
            assert_eq!(results.occup_mat[1][1][3], 1.0);
            assert_eq!(results.occup_mat[1][1][4], 0.0);

            // 32 个电子态（8 电子 × 4 倍多重度）填到 1.25
            assert_eq!(results.efermi_calc, Some(1.25));

            // 价带顶来自自旋 2，导带底来自自旋 1
            let bands = &results.bands;
            assert_eq!(bands.vb_max_vals, vec![1.0, 1.25]);
            assert_eq!(bands.cb_min_vals, vec![5.0, 5.25]);
            assert_eq!(bands.vb_max, 1.25);
            assert_eq!(bands.cb_min, 5.0);
            assert_eq!(bands.bandgap, 3.75);
            assert_eq!(bands.bandgap_directs, vec![4.0, 4.0]);
            assert_eq!(bands.bandgap_indirects, vec![4.0, 4.0]);
        }
    }

    #[test]
    fn test_missing_ions_per_type_fails() {
        let tmp = edited_copy("OUTCAR", " ions per type =               1   1\n", "");
        let rec = parse_dir(tmp.path(), ReadMode::Text);
        assert_eq!(rec.status(), RunStatus::Failed);
        assert!(rec.run.is_none());
        let msg = rec.error_message.as_deref().unwrap();
        assert!(msg.starts_with("parsing text run in"));
        assert!(msg.contains("ions per type"));
        assert!(rec.error_trace.is_some());
    }

    #[test]
    fn test_gw_incar_skips_standard_results() {
        let tmp = edited_copy("INCAR", "ALGO   = Fast", "ALGO   = GW0");
        let rec = parse_dir(tmp.path(), ReadMode::Text);
        let run = rec.data().unwrap();
        assert!(run.is_gw);
        assert!(run.standard.is_none());

        let value = serde_json::to_value(&rec).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj["errorMessage"].is_null());
        assert!(!obj.contains_key("eigenMat"));
        assert!(obj.contains_key("kpointWeights"));
    }

    #[test]
    fn test_missing_primary_file() {
        let tmp = TempDir::new().unwrap();
        let rec = parse_dir(tmp.path(), ReadMode::Xml);
        assert_eq!(rec.status(), RunStatus::Failed);
        assert!(rec.error_message.unwrap().contains("vasprun.xml"));

        let rec = parse_dir(&tmp.path().join("nope"), ReadMode::Text);
        assert!(rec.error_message.unwrap().contains("Directory not found"));
    }
}
