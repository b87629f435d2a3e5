//! # inspect 命令实现
//!
//! 读取单个运行目录并以表格打印关键标量；失败时打印错误信息。
//!
//! ## 依赖关系
//! - 使用 `cli/inspect.rs` 定义的参数
//! - 使用 `parsers/mod.rs`, `models/`
//! - 使用 `tabled` 打印表格

use crate::cli::inspect::InspectArgs;
use crate::error::Result;
use crate::models::RunData;
use crate::parsers;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 表格行
#[derive(Debug, Clone, Tabled)]
struct QuantityRow {
    #[tabled(rename = "Quantity")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn row(name: &'static str, value: impl ToString) -> QuantityRow {
    QuantityRow {
        name,
        value: value.to_string(),
    }
}

/// 执行 inspect 命令
pub fn execute(args: InspectArgs) -> Result<()> {
    output::print_header(&format!("Inspecting {}", args.dir.display()));

    let record = parsers::parse_dir(&args.dir, args.mode);
    match record.data() {
        Some(run) => {
            println!("{}", Table::new(quantity_rows(run)));
            output::print_done(&format!("{} run read successfully", args.mode));
        }
        None => {
            output::print_error(record.error_message.as_deref().unwrap_or("unknown failure"));
            if args.trace {
                if let Some(trace) = &record.error_trace {
                    println!("{}", trace);
                }
            }
        }
    }
    Ok(())
}

fn quantity_rows(run: &RunData) -> Vec<QuantityRow> {
    let mut rows = vec![
        row("System", &run.system_name),
        row("Run date", run.run_date),
        row("ALGO", format!("{} (IALGO {} = {})", run.algo_param, run.ialgo, run.algo)),
        row("GW-class", run.is_gw),
        row("ENCUT (eV)", run.encut_ev),
        row("EDIFF", run.ediff),
        row("IBRION / ISIF / ICHARG", format!("{} / {} / {}", run.ibrion, run.isif, run.icharg)),
        row(
            "Species",
            run.species
                .type_names
                .iter()
                .zip(&run.species.type_nums)
                .map(|(n, c)| format!("{}{}", n, c))
                .collect::<Vec<_>>()
                .join(" "),
        ),
        row("Electrons", run.num_electron),
        row("Spins / k-points / bands", format!("{} / {} / {}", run.num_spin, run.num_kpoint, run.num_band)),
        row("Volume (Å³)", format!("{:.4}", run.final_volume_calc_ang3)),
        row("Density (g/cm³)", format!("{:.4}", run.final_density_g_cm3)),
    ];

    if let Some(times) = &run.process_times {
        rows.push(row("Elapsed time (s)", times.elapsed_time_sec));
    }

    if let Some(s) = &run.standard {
        rows.push(row("Ionic steps", s.iter_real_times.len()));
        rows.push(row("Energy w/o entropy (eV)", format!("{:.6}", s.energy_no_entrp)));
        rows.push(row("Energy per atom (eV)", format!("{:.6}", s.energy_per_atom)));
        rows.push(row("Pressure (kbar)", format!("{:.3}", s.final_pressure_kbar)));
        rows.push(row("E-fermi reported (eV)", format!("{:.4}", s.efermi)));
        rows.push(row(
            "E-fermi calculated (eV)",
            s.efermi_calc.map(|e| format!("{:.4}", e)).unwrap_or_else(|| "-".to_string()),
        ));
        rows.push(row("VBM / CBM (eV)", format!("{:.4} / {:.4}", s.bands.vb_max, s.bands.cb_min)));
        rows.push(row("Band gap (eV)", format!("{:.4}", s.bands.bandgap)));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadMode;
    use std::path::PathBuf;

    #[test]
    fn test_quantity_rows() {
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/nacl");
        let record = parsers::parse_dir(&fixture, ReadMode::Xml);
        let rows = quantity_rows(record.data().unwrap());

        let get = |name: &str| {
            rows.iter()
                .find(|r| r.name == name)
                .map(|r| r.value.clone())
                .unwrap()
        };
        assert_eq!(get("Species"), "Cl1 Na1");
        assert_eq!(get("Band gap (eV)"), "4.0000");
        assert_eq!(get("E-fermi calculated (eV)"), "1.0000");
        assert!(rows.iter().all(|r| r.name != "Elapsed time (s)"));

        let table = Table::new(&rows).to_string();
        assert!(table.contains("NaCl test"));
    }
}
