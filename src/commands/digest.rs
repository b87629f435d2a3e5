//! # digest 命令实现
//!
//! 读取运行目录并把全部记录写成 JSON。
//!
//! ## 功能
//! - 单目录或目录树模式收集运行目录
//! - 并行读取，单个目录失败只写入其失败记录
//! - 可选的逐运行 CSV 摘要
//! - 成功 / 失败汇总报告
//!
//! ## 依赖关系
//! - 使用 `cli/digest.rs` 定义的参数
//! - 使用 `batch/`, `models/`
//! - 使用 `utils/output.rs`

use crate::batch::{BatchResult, BatchRunner, DigestEntry, RunDirCollector};
use crate::cli::digest::DigestArgs;
use crate::error::{Result, ScanError};
use crate::models::RunRecord;
use crate::utils::output;

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// JSON 输出中的单条记录
#[derive(Serialize)]
struct DigestOutput<'a> {
    #[serde(rename = "runDir")]
    run_dir: String,
    #[serde(flatten)]
    record: &'a RunRecord,
}

/// CSV 摘要行
#[derive(Debug, Serialize)]
struct SummaryRow {
    run_dir: String,
    status: &'static str,
    system: String,
    algo: String,
    num_atom: Option<usize>,
    energy_per_atom_ev: Option<f64>,
    efermi_ev: Option<f64>,
    bandgap_ev: Option<f64>,
    pressure_kbar: Option<f64>,
    error: String,
}

/// 执行 digest 命令
pub fn execute(args: DigestArgs) -> Result<()> {
    output::print_header("Digesting VASP Runs");

    let dirs = RunDirCollector::new(args.dir.clone(), args.mode)
        .tree(args.tree)
        .collect()?;

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Reading {} {} run(s) with {} job(s)",
        dirs.len(),
        args.mode,
        runner.jobs()
    ));

    let result = runner.run(dirs, args.mode)?;

    write_json(&result.entries, &args.output)?;
    output::print_success(&format!("Records written to '{}'", args.output.display()));

    if let Some(ref csv_path) = args.summary_csv {
        write_summary_csv(&result.entries, csv_path)?;
        output::print_success(&format!("Summary written to '{}'", csv_path.display()));
    }

    report(&result);
    Ok(())
}

/// 全部记录写为 JSON 数组
fn write_json(entries: &[DigestEntry], path: &Path) -> Result<()> {
    let write_err = |e: std::io::Error| ScanError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);

    let records: Vec<DigestOutput> = entries
        .iter()
        .map(|e| DigestOutput {
            run_dir: e.dir.display().to_string(),
            record: &e.record,
        })
        .collect();

    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n").map_err(write_err)?;
    writer.flush().map_err(write_err)?;
    Ok(())
}

fn summary_row(entry: &DigestEntry) -> SummaryRow {
    let run_dir = entry.dir.display().to_string();
    match entry.record.data() {
        Some(run) => {
            let standard = run.standard.as_ref();
            SummaryRow {
                run_dir,
                status: "complete",
                system: run.system_name.clone(),
                algo: run.algo_param.clone(),
                num_atom: Some(run.num_atom()),
                energy_per_atom_ev: standard.map(|s| s.energy_per_atom),
                efermi_ev: standard.map(|s| s.efermi),
                bandgap_ev: standard.map(|s| s.bands.bandgap),
                pressure_kbar: standard.map(|s| s.final_pressure_kbar),
                error: String::new(),
            }
        }
        None => SummaryRow {
            run_dir,
            status: "failed",
            system: String::new(),
            algo: String::new(),
            num_atom: None,
            energy_per_atom_ev: None,
            efermi_ev: None,
            bandgap_ev: None,
            pressure_kbar: None,
            error: entry.record.error_message.clone().unwrap_or_default(),
        },
    }
}

/// 保存逐运行摘要到 CSV
fn write_summary_csv(entries: &[DigestEntry], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for entry in entries {
        wtr.serialize(summary_row(entry))?;
    }
    wtr.flush().map_err(|e| ScanError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

fn report(result: &BatchResult) {
    output::print_separator();
    for (dir, msg) in &result.failures {
        output::print_warning(&format!("{}: {}", dir, msg));
    }

    let text = format!(
        "{} run(s): {} complete, {} failed",
        result.total(),
        result.complete,
        result.failed
    );
    if result.failed == 0 {
        output::print_done(&text);
    } else {
        output::print_error(&text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadMode;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixture_entries() -> Vec<DigestEntry> {
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/nacl");
        BatchRunner::new(2)
            .run(vec![fixture.clone(), fixture.join("missing")], ReadMode::Text)
            .unwrap()
            .entries
    }

    #[test]
    fn test_write_json_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("digest.json");
        write_json(&fixture_entries(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["systemName"], "NaCl test");
        assert_eq!(arr[0]["bandgap"], 4.0);
        assert_eq!(arr[0]["typeMasses_amu"][0], 35.453);
        assert_eq!(arr[0]["finalStressMat_kbar"][0][0], 2.5);
        assert!(arr[0]["errorMessage"].is_null());
        assert!(arr[1]["errorMessage"].as_str().unwrap().contains("Directory not found"));
        assert!(arr[1]["runDir"].as_str().unwrap().ends_with("missing"));
    }

    #[test]
    fn test_summary_csv() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("summary.csv");
        let entries = fixture_entries();
        assert!(entries[0].record.data().is_some());
        write_summary_csv(&entries, &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[1], "status");
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "complete");
        assert_eq!(&rows[0][4], "2");
        assert_eq!(&rows[1][1], "failed");
        assert_eq!(&rows[1][4], "");
    }
}
