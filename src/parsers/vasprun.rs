//! # vasprun.xml 读取器
//!
//! 从单个 `vasprun.xml` 构造 `RunData`。标量与 `varray` 矩阵经 `xml_path` 读取，
//! `<array>` 表格经 `xml_array` 解码。
//!
//! 与文本读取器的差异：
//! - 没有进程计时，`process_times` 为 `None`
//! - NELECT 与总价电子数不一致是错误而非警告
//! - k 点多重度由权重乘以生成网格的分割数恢复，不能恢复时为 `None`，
//!   此时带隙以求解器报告的费米能为参考
//! - eV 应力由 kbar 张量与末态体积换算
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `parsers/{xml_path,xml_array,incar}.rs`, `physics/`, `models/record.rs`

use super::xml_array;
use super::xml_path;
use crate::error::{Result, ScanError};
use crate::models::{BandTensor, OptimizationAlgo, RunData, Species, StandardResults};
use crate::parsers::incar;
use crate::physics::geometry::{self, Mat3, RowsMat};
use crate::physics::{electronic, species};
use crate::utils::output;

use chrono::NaiveDateTime;
use roxmltree::{Document, Node};
use std::path::Path;
use std::str::FromStr;

/// 多重度判为整数的容差
const MULT_TOLERANCE: f64 = 1e-3;

// ─────────────────────────────────────────────────────────────
// 入口
// ─────────────────────────────────────────────────────────────

/// 读取 XML 格式运行目录
pub fn parse_xml_run(dir: &Path) -> Result<RunData> {
    let path = dir.join("vasprun.xml");
    let text = std::fs::read_to_string(&path).map_err(|e| ScanError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let doc = Document::parse(&text)?;
    output::print_debug(2, || format!("parse_xml_run: {}", path.display()));
    read_vasprun(doc.root_element())
}

/// 从 `<modeling>` 根节点读取
pub fn read_vasprun(root: Node) -> Result<RunData> {
    let run_date = read_date(root)?;
    let control = read_control(root)?;
    let elec = read_electronic(root)?;

    let species = read_species(root)?;
    if (elec.num_electron - species.total_valence).abs() > 1e-6 {
        return Err(ScanError::conflict(
            "electron count",
            "NELECT",
            elec.num_electron,
            "total valence",
            species.total_valence,
        ));
    }

    let initial = read_structure(root, "initialpos", species.num_atom)?;
    let fin = read_structure(root, "finalpos", species.num_atom)?;

    let kpoints = read_kpoints(root, &initial.recip)?;

    let final_volume_ang3: f64 =
        xml_path::get_scalar(root, "structure[@name='finalpos']/crystal/i[@name='volume']")?;
    let final_volume_calc_ang3 = geometry::cell_volume(&fin.basis);
    let recip_volume = geometry::recip_volume(&fin.basis)?;
    let final_density_g_cm3 = geometry::density(
        &species.type_nums,
        &species.type_masses_amu,
        final_volume_calc_ang3,
    );

    let (num_band, standard) = if control.is_gw {
        (elec.num_band, None)
    } else {
        let ctx = StandardContext {
            num_spin: elec.num_spin,
            num_kpoint: kpoints.frac.len(),
            nbands_param: elec.num_band,
            species: &species,
            final_volume_ang3: final_volume_calc_ang3,
            kpoint_mults: kpoints.mults.as_deref(),
        };
        let (nb, results) = read_standard(root, &ctx, &fin)?;
        (nb, Some(results))
    };

    let algo = OptimizationAlgo::from_code(elec.ialgo)
        .ok_or(ScanError::UnknownAlgorithmCode(elec.ialgo))?;

    output::print_debug(5, || {
        format!(
            "read_vasprun: finalVolume_ang3 {} finalVolumeCalc_ang3 {} finalDensity_g_cm3 {} recipVolume {}",
            final_volume_ang3, final_volume_calc_ang3, final_density_g_cm3, recip_volume
        )
    });

    Ok(RunData {
        run_date,
        system_name: control.system_name,
        algo_param: control.algo,
        ialgo: elec.ialgo,
        algo,
        is_gw: control.is_gw,
        ediff: control.ediff,
        encut_ev: control.encut_ev,
        ibrion: control.ibrion,
        isif: control.isif,
        icharg: elec.icharg,
        num_electron: elec.num_electron,
        num_spin: elec.num_spin,
        num_band,
        num_kpoint: kpoints.frac.len(),
        species,
        initial_basis_mat: initial.basis,
        initial_recip_basis_mat: initial.recip,
        initial_frac_pos_mat: initial.frac,
        initial_cart_pos_mat: initial.cart,
        final_basis_mat: fin.basis,
        final_recip_basis_mat: fin.recip,
        kpoint_frac_mat: kpoints.frac,
        kpoint_cart_mat: kpoints.cart,
        kpoint_mults: kpoints.mults,
        kpoint_weights: kpoints.weights,
        final_volume_ang3,
        final_volume_calc_ang3,
        recip_volume,
        final_density_g_cm3,
        process_times: None,
        standard,
    })
}

// ─────────────────────────────────────────────────────────────
// 元数据与控制参数
// ─────────────────────────────────────────────────────────────

fn read_date(root: Node) -> Result<NaiveDateTime> {
    let date = xml_path::get_string(root, "generator/i[@name='date']")?;
    let time = xml_path::get_string(root, "generator/i[@name='time']")?;
    let stamp = format!("{} {}", date, time);
    let run_date = NaiveDateTime::parse_from_str(&stamp, "%Y %m %d %H:%M:%S")
        .map_err(|e| ScanError::parse("run date", format!("{:?}: {}", stamp, e)))?;
    output::print_debug(5, || format!("read_date: runDate: {}", run_date));
    Ok(run_date)
}

#[derive(Debug)]
struct Control {
    system_name: String,
    algo: String,
    is_gw: bool,
    ediff: f64,
    encut_ev: f64,
    ibrion: i64,
    isif: i64,
}

/// `incar` 段中的值，缺失时取 `parameters` 中的对应项
fn incar_or_param<T: FromStr>(root: Node, key: &str, fallback: &str) -> Result<T> {
    let path = format!("incar/i[@name='{}']", key);
    if xml_path::find_optional(root, &path)?.is_some() {
        xml_path::get_scalar(root, &path)
    } else {
        xml_path::get_scalar(root, fallback)
    }
}

fn read_control(root: Node) -> Result<Control> {
    let raw_algo = match xml_path::find_optional(root, "incar/i[@name='ALGO']")? {
        Some(node) => node.text().unwrap_or("").trim().to_string(),
        None => incar::DEFAULT_ALGO.to_string(),
    };
    let (algo, is_gw) = incar::classify_algo(&raw_algo)?;

    let system_name = match xml_path::find_optional(root, "incar/i[@name='SYSTEM']")? {
        Some(node) => node.text().unwrap_or("").trim().to_string(),
        None => xml_path::get_string(
            root,
            "parameters/separator[@name='general']/i[@name='SYSTEM']",
        )?,
    };

    let control = Control {
        system_name,
        algo,
        is_gw,
        ediff: incar_or_param(
            root,
            "EDIFF",
            "parameters/separator[@name='electronic']/i[@name='EDIFF']",
        )?,
        encut_ev: incar_or_param(
            root,
            "ENCUT",
            "parameters/separator[@name='electronic']/i[@name='ENMAX']",
        )?,
        ibrion: incar_or_param(
            root,
            "IBRION",
            "parameters/separator[@name='ionic']/i[@name='IBRION']",
        )?,
        isif: incar_or_param(
            root,
            "ISIF",
            "parameters/separator[@name='ionic']/i[@name='ISIF']",
        )?,
    };
    output::print_debug(5, || format!("read_control: {:?}", control));
    Ok(control)
}

#[derive(Debug)]
struct Electronic {
    ialgo: i64,
    num_band: usize,
    num_electron: f64,
    icharg: i64,
    num_spin: usize,
}

fn read_electronic(root: Node) -> Result<Electronic> {
    let sep = xml_path::find_one(root, "parameters/separator[@name='electronic']")?;
    let elec = Electronic {
        ialgo: xml_path::get_scalar(sep, "i[@name='IALGO']")?,
        num_band: xml_path::get_scalar(sep, "i[@name='NBANDS']")?,
        num_electron: xml_path::get_scalar(sep, "i[@name='NELECT']")?,
        icharg: xml_path::get_scalar(
            sep,
            "separator[@name='electronic startup']/i[@name='ICHARG']",
        )?,
        num_spin: xml_path::get_scalar(
            sep,
            "separator[@name='electronic spin']/i[@name='ISPIN']",
        )?,
    };
    if elec.num_spin != 1 && elec.num_spin != 2 {
        return Err(ScanError::parse(
            "ISPIN",
            format!("expected 1 or 2, found {}", elec.num_spin),
        ));
    }
    output::print_debug(5, || format!("read_electronic: {:?}", elec));
    Ok(elec)
}

// ─────────────────────────────────────────────────────────────
// 元素种类
// ─────────────────────────────────────────────────────────────

fn read_species(root: Node) -> Result<Species> {
    let types = xml_array::get_array_by_path(root, "atominfo/array[@name='atomtypes']")?;
    let type_nums = types
        .ints("atomspertype")?
        .into_iter()
        .map(|n| {
            usize::try_from(n)
                .map_err(|_| ScanError::parse("atomspertype", format!("negative count {}", n)))
        })
        .collect::<Result<Vec<usize>>>()?;
    let type_names = types.strings("element")?;
    let masses = types.floats("mass")?;
    let valences = types.floats("valence")?;
    let pseudos = types.strings("pseudopotential")?;

    let atoms = xml_array::get_array_by_path(root, "atominfo/array[@name='atoms']")?;
    let atom_elements = atoms.strings("element")?;
    let atom_types = atoms.ints("atomtype")?;

    let built = species::build_species(type_names, type_nums, masses, pseudos, valences)?;
    check_atom_table(&built, &atom_elements, &atom_types)?;

    output::print_debug(5, || {
        format!(
            "read_species: typeNames {:?} typeNums {:?} typeMasses_amu {:?} typeValences {:?} typePseudos {:?}",
            built.type_names,
            built.type_nums,
            built.type_masses_amu,
            built.type_valences,
            built.type_pseudos
        )
    });
    Ok(built)
}

/// `atoms` 表中每个原子的名称必须与其 1 起始的 `atomtype` 对应的种类一致
fn check_atom_table(built: &Species, elements: &[String], types: &[i64]) -> Result<()> {
    if elements.len() != built.num_atom {
        return Err(ScanError::conflict(
            "atom count",
            "atomtypes",
            built.num_atom,
            "atoms table",
            elements.len(),
        ));
    }
    for (iatom, (name, &itype)) in elements.iter().zip(types.iter()).enumerate() {
        let type_name = usize::try_from(itype)
            .ok()
            .and_then(|t| t.checked_sub(1))
            .and_then(|t| built.type_names.get(t))
            .ok_or_else(|| {
                ScanError::parse("atomtype", format!("atom {} has invalid type {}", iatom + 1, itype))
            })?;
        if type_name != name || built.atom_names[iatom] != *name {
            return Err(ScanError::conflict(
                format!("name of atom {}", iatom + 1),
                "atomtypes",
                type_name,
                "atoms table",
                name,
            ));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// 结构
// ─────────────────────────────────────────────────────────────

struct Structure {
    basis: Mat3,
    recip: Mat3,
    frac: RowsMat,
    cart: RowsMat,
}

/// `structure[@name=...]` 的晶格、倒格子与分数坐标
fn read_structure(root: Node, name: &str, num_atom: usize) -> Result<Structure> {
    let base = format!("structure[@name='{}']", name);
    let basis = xml_path::get_mat3(root, &format!("{}/crystal/varray[@name='basis']/v", base))?;
    let recip = xml_path::get_mat3(root, &format!("{}/crystal/varray[@name='rec_basis']/v", base))?;
    geometry::check_reciprocal(&format!("{} reciprocal basis", name), &basis, &recip, 1e-3)?;

    let frac = xml_path::get_rows3(
        root,
        &format!("{}/varray[@name='positions']/v", base),
        num_atom,
    )?;
    let cart = geometry::frac_to_cart(&frac, &basis);

    output::print_debug(5, || {
        format!(
            "read_structure: {}: basisMat:\n{}\nfracPosMat:\n{}",
            name,
            output::format_matrix(&basis),
            output::format_matrix(&frac)
        )
    });
    Ok(Structure {
        basis,
        recip,
        frac,
        cart,
    })
}

// ─────────────────────────────────────────────────────────────
// k 点
// ─────────────────────────────────────────────────────────────

struct KpointSet {
    frac: RowsMat,
    cart: RowsMat,
    mults: Option<Vec<f64>>,
    weights: Vec<f64>,
}

fn read_kpoints(root: Node, initial_recip: &Mat3) -> Result<KpointSet> {
    let frac = xml_path::get_rows3(root, "kpoints/varray[@name='kpointlist']/v", 0)?;
    let cart = geometry::mul_rows(&frac, initial_recip);

    let raw_weights: Vec<f64> =
        xml_path::get_raw_array(root, "kpoints/varray[@name='weights']/v", frac.len(), 1)?
            .into_iter()
            .map(|r| r[0])
            .collect();
    let weights = species::normalize_weights(&raw_weights)?;
    let mults = recover_mults(root, &weights)?;

    output::print_debug(5, || {
        format!(
            "read_kpoints: kpointMults {:?} kpointWeights {:?}\nkpointFracMat:\n{}",
            mults,
            weights,
            output::format_matrix(&frac)
        )
    });
    Ok(KpointSet {
        frac,
        cart,
        mults,
        weights,
    })
}

/// `weight × Π(divisions)`，全部为正整数时才返回
fn recover_mults(root: Node, weights: &[f64]) -> Result<Option<Vec<f64>>> {
    let Some(node) = xml_path::find_optional(root, "kpoints/generation/v[@name='divisions']")?
    else {
        return Ok(None);
    };
    let divisions = node
        .text()
        .unwrap_or("")
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| ScanError::parse("k-point divisions", format!("invalid value {:?}", t)))
        })
        .collect::<Result<Vec<f64>>>()?;
    let grid: f64 = divisions.iter().product();

    let mut mults = Vec::with_capacity(weights.len());
    for w in weights {
        let m = w * grid;
        if (m - m.round()).abs() > MULT_TOLERANCE || m.round() < 1.0 {
            output::print_debug(3, || {
                format!("recover_mults: weight {} on grid {} is not integral", w, grid)
            });
            return Ok(None);
        }
        mults.push(m.round());
    }
    Ok(Some(mults))
}

// ─────────────────────────────────────────────────────────────
// 非 GW 结果
// ─────────────────────────────────────────────────────────────

struct StandardContext<'a> {
    num_spin: usize,
    num_kpoint: usize,
    nbands_param: usize,
    species: &'a Species,
    final_volume_ang3: f64,
    kpoint_mults: Option<&'a [f64]>,
}

/// 返回 `(num_band, 结果)`；`num_band` 取自本征值数组的形状
fn read_standard(
    root: Node,
    ctx: &StandardContext,
    fin: &Structure,
) -> Result<(usize, StandardResults)> {
    let (iter_cpu_times, iter_real_times) = read_iteration_times(root)?;
    let iter_total_time = iter_real_times.iter().sum();

    let energy_no_entrp: f64 =
        xml_path::get_scalar(root, "calculation[last()]/energy/i[@name='e_wo_entrp']")?;
    let efermi: f64 = xml_path::get_scalar(root, "calculation[last()]/dos/i[@name='efermi']")?;

    let num_atom = ctx.species.num_atom;
    let final_force_mat_ev_ang =
        xml_path::get_rows3(root, "calculation[last()]/varray[@name='forces']/v", num_atom)?;

    let final_stress_mat_kbar = xml_path::get_mat3(root, "calculation[last()]/varray[@name='stress']/v")?;
    let final_stress_mat_ev = geometry::scale3(
        &final_stress_mat_kbar,
        ctx.final_volume_ang3 / geometry::EV_PER_ANG3_TO_KBAR,
    );
    let final_pressure_kbar = geometry::pressure(&final_stress_mat_kbar);
    output::print_debug(5, || {
        format!(
            "read_standard: finalForceMat_ev_ang:\n{}\nfinalStressMat_kbar:\n{}",
            output::format_matrix(&final_force_mat_ev_ang),
            output::format_matrix(&final_stress_mat_kbar)
        )
    });

    let (eigen_mat, occup_mat, num_band) = read_eigen(root, ctx)?;

    let efermi_calc = match ctx.kpoint_mults {
        Some(mults) => Some(electronic::efermi_calc(
            &eigen_mat,
            mults,
            ctx.num_spin,
            ctx.species.total_valence,
        )?),
        None => None,
    };
    let bands = electronic::band_gaps(&eigen_mat, efermi_calc.unwrap_or(efermi));

    let results = StandardResults {
        iter_cpu_times,
        iter_real_times,
        iter_total_time,
        final_frac_pos_mat: fin.frac.clone(),
        final_cart_pos_mat: fin.cart.clone(),
        final_force_mat_ev_ang,
        final_stress_mat_ev,
        final_stress_mat_kbar,
        final_pressure_kbar,
        energy_no_entrp,
        energy_per_atom: energy_no_entrp / num_atom as f64,
        efermi,
        eigen_mat,
        occup_mat,
        efermi_calc,
        bands,
    };
    Ok((num_band, results))
}

/// 每个离子步一个 `<time name="totalsc">cpu real</time>`
fn read_iteration_times(root: Node) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut cpu = Vec::new();
    let mut real = Vec::new();
    for node in xml_path::find_all(root, "calculation/time[@name='totalsc']")? {
        let text = node.text().unwrap_or("");
        let toks = text
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| ScanError::parse("totalsc time", format!("invalid value {:?}", t)))
            })
            .collect::<Result<Vec<f64>>>()?;
        if toks.len() != 2 {
            return Err(ScanError::parse(
                "totalsc time",
                format!("expected 2 values, found {:?}", text.trim()),
            ));
        }
        cpu.push(toks[0]);
        real.push(toks[1]);
    }
    output::print_debug(5, || {
        format!("read_iteration_times: cpu {:?} real {:?}", cpu, real)
    });
    Ok((cpu, real))
}

fn read_eigen(root: Node, ctx: &StandardContext) -> Result<(BandTensor, BandTensor, usize)> {
    let arr = xml_array::get_array_by_path(root, "calculation[last()]/eigenvalues/array")?;
    if arr.dim_lens.len() != 3 {
        return Err(ScanError::IrregularArray(format!(
            "eigenvalues have dimensions {:?}, expected spin/kpoint/band",
            arr.dim_names
        )));
    }
    let (nsp, nkp, nb) = (arr.dim_lens[0], arr.dim_lens[1], arr.dim_lens[2]);
    if nsp != ctx.num_spin {
        return Err(ScanError::conflict(
            "spin channels",
            "ISPIN",
            ctx.num_spin,
            "eigenvalues array",
            nsp,
        ));
    }
    if nkp != ctx.num_kpoint {
        return Err(ScanError::conflict(
            "k-point count",
            "kpointlist",
            ctx.num_kpoint,
            "eigenvalues array",
            nkp,
        ));
    }
    if nb != ctx.nbands_param {
        output::print_warning(&format!(
            "NBANDS {} differs from eigenvalue band count {}",
            ctx.nbands_param, nb
        ));
    }

    let eigen = arr.floats3("eigene")?;
    let occup = arr.floats3("occ")?;
    output::print_debug(5, || format!("read_eigen: eigenMat {:?}", eigen));
    Ok((eigen, occup, nb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/nacl")
    }

    fn fixture_text() -> String {
        std::fs::read_to_string(fixture_dir().join("vasprun.xml")).unwrap()
    }

    fn read_edited(from: &str, to: &str) -> Result<RunData> {
        let text = fixture_text();
        assert!(text.contains(from), "fixture lacks {:?}", from);
        let edited = text.replacen(from, to, 1);
        let doc = Document::parse(&edited).unwrap();
        read_vasprun(doc.root_element())
    }

    #[test]
    fn test_parse_fixture_run() {
        let run = parse_xml_run(&fixture_dir()).unwrap();

        assert_eq!(run.system_name, "NaCl test");
        assert_eq!(run.run_date.to_string(), "2013-10-18 08:44:21");
        assert_eq!(run.algo, OptimizationAlgo::Fast);
        assert_eq!(run.algo_param, "fast");
        assert_eq!(run.ediff, 1e-4);
        assert_eq!(run.encut_ev, 400.0);
        assert_eq!((run.ibrion, run.isif, run.icharg), (2, 3, 2));
        assert_eq!((run.num_spin, run.num_band, run.num_kpoint), (1, 6, 2));
        assert_eq!(run.num_electron, 8.0);
        assert!(run.process_times.is_none());

        assert_eq!(run.species.type_names, vec!["Cl", "Na"]);
        assert_eq!(run.species.type_pseudos[0], "PAW_PBE Cl 06Sep2000");
        assert_eq!(run.species.atom_valences, vec![7.0, 1.0]);
        assert_eq!(run.initial_cart_pos_mat[0], [2.0, 2.0, 2.0]);

        assert_eq!(run.kpoint_mults, Some(vec![1.0, 3.0]));
        assert_eq!(run.kpoint_weights, vec![0.25, 0.75]);
        assert_eq!(run.kpoint_cart_mat[1], [0.0625, 0.0, 0.0]);

        assert_eq!(run.final_volume_ang3, 64.0);
        assert!((run.final_density_g_cm3 - 1.51636).abs() < 1e-4);

        let results = run.standard.as_ref().unwrap();
        assert_eq!(results.iter_cpu_times, vec![1.25, 1.75]);
        assert_eq!(results.iter_total_time, 3.5);
        assert_eq!(results.energy_no_entrp, -27.1);
        assert_eq!(results.energy_per_atom, -13.55);
        assert_eq!(results.efermi, 1.2345);
        assert_eq!(results.efermi_calc, Some(1.0));
        assert_eq!(results.bands.bandgap, 4.0);
        assert_eq!(results.final_force_mat_ev_ang[0], [0.0, 0.0, 0.0]);
        assert_eq!(results.final_cart_pos_mat[0], [2.0, 2.0, 2.0]);

        assert!((results.final_pressure_kbar - 5.0).abs() < 1e-12);
        let ev = &results.final_stress_mat_ev;
        assert!((ev[0][0] - 2.5 * 64.0 / geometry::EV_PER_ANG3_TO_KBAR).abs() < 1e-12);
        assert_eq!(ev[0][1], ev[1][0]);
    }

    #[test]
    fn test_gw_run_omits_standard_results() {
        let run = read_edited(
            r#"<i type="string" name="ALGO">Fast</i>"#,
            r#"<i type="string" name="ALGO">GW0</i>"#,
        )
        .unwrap();
        assert!(run.is_gw);
        assert_eq!(run.algo_param, "gw0");
        assert!(run.standard.is_none());
        assert_eq!(run.num_band, 6);
    }

    #[test]
    fn test_missing_algo_defaults_to_normal() {
        let run = read_edited(r#"<i type="string" name="ALGO">Fast</i>"#, "").unwrap();
        assert_eq!(run.algo_param, "normal");
        assert!(!run.is_gw);
    }

    #[test]
    fn test_encut_falls_back_to_parameters() {
        let run = read_edited(r#"<i name="ENCUT">    400.00000000</i>"#, "").unwrap();
        assert_eq!(run.encut_ev, 400.0);
    }

    #[test]
    fn test_atom_table_name_conflict() {
        let err = read_edited("<rc><c>Na</c><c>   2</c></rc>", "<rc><c>K</c><c>   2</c></rc>")
            .unwrap_err();
        assert!(matches!(err, ScanError::CrossSourceConflict { .. }));
    }

    #[test]
    fn test_nelect_mismatch_is_error() {
        let err = read_edited(
            r#"<i name="NELECT">      8.00000000</i>"#,
            r#"<i name="NELECT">      9.00000000</i>"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::CrossSourceConflict { ref what, .. } if what == "electron count"));
    }

    #[test]
    fn test_without_divisions_uses_reported_efermi() {
        let run = read_edited(
            r#"<v type="int" name="divisions">       4        1        1 </v>"#,
            "",
        )
        .unwrap();
        assert!(run.kpoint_mults.is_none());
        let results = run.standard.as_ref().unwrap();
        assert!(results.efermi_calc.is_none());
        assert_eq!(results.bands.vb_max, 1.0);
        assert_eq!(results.bands.cb_min, 5.0);
    }

    #[test]
    fn test_non_integral_mults_are_dropped() {
        let run = read_edited(
            r#"<v type="int" name="divisions">       4        1        1 </v>"#,
            r#"<v type="int" name="divisions">       3        1        1 </v>"#,
        )
        .unwrap();
        assert!(run.kpoint_mults.is_none());
    }

    #[test]
    fn test_spin_dimension_conflict() {
        let err = read_edited(
            r#"<i type="int" name="ISPIN">     1</i>
    <i type="logical" name="LNONCOLLINEAR">"#,
            r#"<i type="int" name="ISPIN">     2</i>
    <i type="logical" name="LNONCOLLINEAR">"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::CrossSourceConflict { ref what, .. } if what == "spin channels"));
    }
}
