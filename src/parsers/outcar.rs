//! # VASP 文本输出读取器
//!
//! 读取运行目录中的 `INCAR`、`POSCAR` 和 `OUTCAR`，构造 `RunData`。
//!
//! OUTCAR 的每个字段都由一个首尾锚定的正则定位，再用 `LineScanner::parse_matrix`
//! 提取紧随其后的数值表。辅助文件提供的值与 OUTCAR 报告的值逐项交叉校验。
//!
//! GW 类运行不输出迭代计时、能量、受力、应力与能带，这些段落不做查找。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `parsers/{scanner,incar,poscar}.rs`, `physics/`, `models/record.rs`

use crate::error::{Result, ScanError};
use crate::models::{
    BandTensor, OptimizationAlgo, ProcessTimes, RunData, Species, StandardResults,
};
use crate::parsers::incar::{self, Incar};
use crate::parsers::poscar::{self, Poscar};
use crate::parsers::scanner::{LineScanner, Which};
use crate::physics::geometry::{self, Mat3, RowsMat};
use crate::physics::{electronic, species};
use crate::utils::output;

use chrono::NaiveDateTime;
use std::fmt::Debug;
use std::path::Path;
use std::str::FromStr;

// ─────────────────────────────────────────────────────────────
// 行模式
// ─────────────────────────────────────────────────────────────

const EDIFF_PAT: &str = r"^EDIFF *= *([-.E0-9]+) *stopping-criterion.*$";
const ENCUT_PAT: &str = r"^ENCUT *= *([-.E0-9]+) eV .*$";
const IALGO_PAT: &str = r"^IALGO *= *(\d+) +algorithm$";
const ALGO_PAT: &str = r"^ALGO *= *([a-zA-Z0-9]+).*$";
const IBRION_PAT: &str = r"^IBRION *= *([-0-9]+) +ionic relax *: .*$";
const ICHARG_PAT: &str = r"^ICHARG *= *(\d+) +charge *: .*$";
const ISPIN_PAT: &str = r"^ISPIN *= *(\d+) +spin polarized .*$";
const ISIF_PAT: &str = r"^ISIF *= *(\d+) +stress and relaxation$";
const NELECT_PAT: &str = r"^NELECT *= *([-.E0-9]+) +total number of electrons$";
const NKPTS_NBANDS_PAT: &str = r"^k-points +NKPTS *= *(\d+) +k-points in BZ +NKDIM *= *\d+ +number of bands +NBANDS *= *(\d+)$";
const VOLUME_PAT: &str = r"^volume of cell *: +([-.E0-9]+)$";

const DATE_PAT: &str = r"^executed on .* date +\d{4}\.\d{2}\.\d{2} +\d{2}:\d{2}:\d{2}$";
const LOOP_PAT: &str = r"^LOOP\+ *: +[a-zA-Z]+ +time *([.0-9]+): +[a-zA-Z]+ +time *([.0-9]+)$";
const TOTAL_CPU_PAT: &str = r"^Total CPU time used \(sec\): +([.0-9]+)$";
const USER_TIME_PAT: &str = r"^User time \(sec\): +([.0-9]+)$";
const SYSTEM_TIME_PAT: &str = r"^System time \(sec\): +([.0-9]+)$";
const ELAPSED_PAT: &str = r"^Elapsed time \(sec\): +([.0-9]+)$";
const SYSTEM_PAT: &str = r"^SYSTEM *= .*$";

const ENERGY_PAT: &str = r"^energy +without +entropy *= *([-.E0-9]+) +energy\(sigma->0\) *= *[-.E0-9]+$";
const EFERMI_PAT: &str = r"^E-fermi *: *([-.E0-9]+) +XC.*alpha\+bet.*$";

const VRHFIN_PAT: &str = r"^VRHFIN *= *([a-zA-Z]+):.*$";
const IONS_PER_TYPE_PAT: &str = r"^ions per type *= .*$";
const POMASS_PAT: &str = r"^POMASS *= *([.0-9]+); +ZVAL *= *([.0-9]+) +mass and valenz.*$";
const TITEL_PAT: &str = r"^TITEL *= *(PAW.*)$";

const LATTICE_PAT: &str = r"^direct lattice vectors +reciprocal lattice vectors$";
const FRAC_POS_PAT: &str = r"^position of ions in fractional coordinates \(direct lattice\)$";
const CART_POS_PAT: &str = r"^position of ions in cartesian coordinates +\(Angst\):$";
const FORCE_PAT: &str = r"^POSITION +TOTAL-FORCE \(eV/Angst\)$";

const STRESS_PAT: &str = r"^FORCE on cell *= *-STRESS in cart. coord. +units \(eV\) *:$";
const STRESS_TOTAL_PAT: &str = r"^Total( +[-.E0-9]+){6}$";
const STRESS_KB_PAT: &str = r"^in kB( +[-.E0-9]+){6}$";

const KP_FOUND_PAT: &str = r"^Found +\d+ +irreducible k-points *:$";
const BLANK_PAT: &str = r"^$";
const KP_RECIP_PAT: &str = r"^Following reciprocal coordinates *:$";
const KP_CART_PAT: &str = r"^Following cartesian coordinates *:$";
const KP_WEIGHT_HEAD_PAT: &str = r"^Coordinates +Weight$";
const KP_ACTUAL_CART_PAT: &str = r"^k-points in units of 2pi/SCALE and weight:( Automatic generation)?$";
const KP_ACTUAL_FRAC_PAT: &str = r"^k-points in reciprocal lattice and weights:( Automatic generation)?$";

const SPIN_COMPONENT_PAT: &str = r"^spin component [12]$";
const KP_FIRST_PAT: &str = r"^k-point +1 *: +[-.E0-9]+ +[-.E0-9]+ +[-.E0-9]+$";
const BAND_HEAD_PAT: &str = r"^band No. +band energies +occupation$";

/// 应力块内查找 `Total` / `in kB` 行的范围
const STRESS_SEARCH_LINES: usize = 15;

// ─────────────────────────────────────────────────────────────
// 入口
// ─────────────────────────────────────────────────────────────

/// 读取文本格式运行目录
pub fn parse_text_run(dir: &Path) -> Result<RunData> {
    let incar = incar::parse_incar_file(&dir.join("INCAR"))?;
    let poscar = poscar::parse_poscar_file(&dir.join("POSCAR"))?;
    let sc = LineScanner::from_file(&dir.join("OUTCAR"))?;
    output::print_debug(2, || {
        format!("parse_text_run: {}: {} OUTCAR lines", dir.display(), sc.len())
    });
    read_outcar(&sc, &incar, &poscar)
}

/// 在已读入的 INCAR / POSCAR 基础上扫描 OUTCAR
pub fn read_outcar(sc: &LineScanner, incar: &Incar, poscar: &Poscar) -> Result<RunData> {
    let scalars = read_scalars(sc)?;
    check_incar_scalars(incar, &scalars)?;

    let run_date = read_date(sc)?;
    let process_times = read_process_times(sc)?;
    let system_name = read_system(sc)?;

    let species = read_species(sc, poscar)?;
    if (scalars.num_electron - species.total_valence).abs() > 1e-6 {
        output::print_warning(&format!(
            "NELECT {} differs from total valence {}",
            scalars.num_electron, species.total_valence
        ));
    }

    let lattices = read_lattices(sc)?;
    let (initial_frac_pos_mat, initial_cart_pos_mat) =
        read_initial_positions(sc, species.num_atom, &lattices.initial_basis)?;

    let kpoints = read_kpoints(
        sc,
        scalars.num_kpoint,
        poscar.scale,
        &lattices.initial_recip,
    )?;

    check_spin_components(sc, scalars.num_spin)?;

    let standard = if incar.is_gw {
        None
    } else {
        Some(read_standard(
            sc,
            &scalars,
            &species,
            &lattices.final_basis,
            &kpoints.mults,
        )?)
    };

    let algo = OptimizationAlgo::from_code(scalars.ialgo)
        .ok_or(ScanError::UnknownAlgorithmCode(scalars.ialgo))?;

    let final_volume_calc_ang3 = geometry::cell_volume(&lattices.final_basis);
    let final_density_g_cm3 = geometry::density(
        &species.type_nums,
        &species.type_masses_amu,
        final_volume_calc_ang3,
    );
    let recip_volume = geometry::recip_volume(&lattices.final_basis)?;

    output::print_debug(5, || {
        format!(
            "read_outcar: finalVolumeCalc_ang3 {} finalDensity_g_cm3 {} recipVolume {}",
            final_volume_calc_ang3, final_density_g_cm3, recip_volume
        )
    });

    Ok(RunData {
        run_date,
        system_name,
        algo_param: incar.algo.clone(),
        ialgo: scalars.ialgo,
        algo,
        is_gw: incar.is_gw,
        ediff: scalars.ediff,
        encut_ev: scalars.encut_ev,
        ibrion: scalars.ibrion,
        isif: scalars.isif,
        icharg: scalars.icharg,
        num_electron: scalars.num_electron,
        num_spin: scalars.num_spin,
        num_band: scalars.num_band,
        num_kpoint: scalars.num_kpoint,
        species,
        initial_basis_mat: lattices.initial_basis,
        initial_recip_basis_mat: lattices.initial_recip,
        initial_frac_pos_mat,
        initial_cart_pos_mat,
        final_basis_mat: lattices.final_basis,
        final_recip_basis_mat: lattices.final_recip,
        kpoint_frac_mat: kpoints.frac,
        kpoint_cart_mat: kpoints.cart,
        kpoint_mults: Some(kpoints.mults),
        kpoint_weights: kpoints.weights,
        final_volume_ang3: scalars.final_volume_ang3,
        final_volume_calc_ang3,
        recip_volume,
        final_density_g_cm3,
        process_times: Some(process_times),
        standard,
    })
}

/// 定位单行并解析捕获组 1，至少一个匹配
fn required<T: FromStr>(sc: &LineScanner, pattern: &str, which: Which, max_count: usize) -> Result<T> {
    let ix = sc.locate(pattern, which, max_count)?;
    sc.capture_parse(ix, pattern, 1)
}

// ─────────────────────────────────────────────────────────────
// 标量与元数据
// ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Scalars {
    ediff: f64,
    encut_ev: f64,
    ialgo: i64,
    algo: Option<String>,
    ibrion: i64,
    icharg: i64,
    num_spin: usize,
    isif: i64,
    num_electron: f64,
    num_kpoint: usize,
    num_band: usize,
    final_volume_ang3: f64,
}

fn read_scalars(sc: &LineScanner) -> Result<Scalars> {
    let ix = sc.locate(NKPTS_NBANDS_PAT, Which::First, 1)?;

    let scalars = Scalars {
        ediff: required(sc, EDIFF_PAT, Which::First, 1)?,
        encut_ev: required(sc, ENCUT_PAT, Which::First, 1)?,
        ialgo: required(sc, IALGO_PAT, Which::First, 1)?,
        algo: sc.scalar(ALGO_PAT, Which::First, 0, 1)?,
        ibrion: required(sc, IBRION_PAT, Which::First, 1)?,
        icharg: required(sc, ICHARG_PAT, Which::First, 1)?,
        num_spin: required(sc, ISPIN_PAT, Which::First, 1)?,
        isif: required(sc, ISIF_PAT, Which::First, 1)?,
        num_electron: required(sc, NELECT_PAT, Which::First, 1)?,
        num_kpoint: sc.capture_parse(ix, NKPTS_NBANDS_PAT, 1)?,
        num_band: sc.capture_parse(ix, NKPTS_NBANDS_PAT, 2)?,
        final_volume_ang3: required(sc, VOLUME_PAT, Which::Last, 0)?,
    };

    if scalars.num_spin != 1 && scalars.num_spin != 2 {
        return Err(ScanError::parse(
            "ISPIN",
            format!("expected 1 or 2, found {}", scalars.num_spin),
        ));
    }

    output::print_debug(5, || format!("read_scalars: {:?}", scalars));
    Ok(scalars)
}

/// INCAR 中出现的值必须与 OUTCAR 报告的一致
fn check_incar_value<T>(incar: &Incar, key: &str, reported: T, same: fn(&T, &T) -> bool) -> Result<()>
where
    T: FromStr + Debug,
{
    if let Some(given) = incar.get_parse::<T>(key)? {
        if !same(&given, &reported) {
            return Err(ScanError::conflict(key, "INCAR", given, "OUTCAR", reported));
        }
    }
    Ok(())
}

fn same_float(a: &f64, b: &f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

fn check_incar_scalars(incar: &Incar, scalars: &Scalars) -> Result<()> {
    check_incar_value(incar, "EDIFF", scalars.ediff, same_float)?;
    check_incar_value(incar, "ENCUT", scalars.encut_ev, same_float)?;
    check_incar_value(incar, "ISPIN", scalars.num_spin, |a, b| a == b)?;
    check_incar_value(incar, "IBRION", scalars.ibrion, |a, b| a == b)?;
    check_incar_value(incar, "ISIF", scalars.isif, |a, b| a == b)?;

    if let Some(raw) = &scalars.algo {
        let (_, outcar_gw) = incar::classify_algo(raw)?;
        if outcar_gw != incar.is_gw {
            return Err(ScanError::conflict(
                "GW-class ALGO",
                "INCAR",
                &incar.algo,
                "OUTCAR",
                raw,
            ));
        }
    }
    Ok(())
}

fn read_date(sc: &LineScanner) -> Result<NaiveDateTime> {
    let ix = sc.locate(DATE_PAT, Which::First, 1)?;
    let toks: Vec<&str> = sc.line(ix).split_whitespace().collect();
    let stamp = toks[toks.len().saturating_sub(2)..].join(" ");
    let run_date = NaiveDateTime::parse_from_str(&stamp, "%Y.%m.%d %H:%M:%S")
        .map_err(|e| ScanError::parse("run date", format!("{:?}: {}", stamp, e)))?;
    output::print_debug(5, || format!("read_date: runDate: {}", run_date));
    Ok(run_date)
}

fn read_process_times(sc: &LineScanner) -> Result<ProcessTimes> {
    let times = ProcessTimes {
        total_cpu_time_sec: required(sc, TOTAL_CPU_PAT, Which::First, 1)?,
        user_time_sec: required(sc, USER_TIME_PAT, Which::First, 1)?,
        system_time_sec: required(sc, SYSTEM_TIME_PAT, Which::First, 1)?,
        elapsed_time_sec: required(sc, ELAPSED_PAT, Which::First, 1)?,
    };
    output::print_debug(5, || format!("read_process_times: {:?}", times));
    Ok(times)
}

fn read_system(sc: &LineScanner) -> Result<String> {
    let ix = sc.locate(SYSTEM_PAT, Which::First, 0)?;
    let name = sc
        .line(ix)
        .split_whitespace()
        .skip(2)
        .collect::<Vec<_>>()
        .join(" ");
    let name = name.trim_matches(|c| c == '"' || c == '\'').to_string();
    output::print_debug(5, || format!("read_system: systemName: {}", name));
    Ok(name)
}

// ─────────────────────────────────────────────────────────────
// 元素种类
// ─────────────────────────────────────────────────────────────

fn read_species(sc: &LineScanner, poscar: &Poscar) -> Result<Species> {
    let vrhfin_names = sc
        .find_lines(&[VRHFIN_PAT], 0, 0)?
        .into_iter()
        .map(|ix| sc.capture_parse::<String>(ix, VRHFIN_PAT, 1))
        .collect::<Result<Vec<_>>>()?;

    let type_names = match &poscar.type_names {
        None => vrhfin_names,
        Some(given) if *given == vrhfin_names => vrhfin_names,
        Some(given) => {
            return Err(ScanError::conflict(
                "type names",
                "POSCAR",
                given,
                "OUTCAR VRHFIN",
                &vrhfin_names,
            ))
        }
    };

    let ix = sc.locate(IONS_PER_TYPE_PAT, Which::First, 1)?;
    let type_nums = sc
        .line(ix)
        .split_whitespace()
        .skip(4)
        .map(|t| {
            t.parse::<usize>().map_err(|_| ScanError::MalformedTable {
                line: ix,
                text: sc.line(ix).to_string(),
                reason: format!("invalid ion count {:?}", t),
            })
        })
        .collect::<Result<Vec<usize>>>()?;
    if type_nums != poscar.type_nums {
        return Err(ScanError::conflict(
            "type counts",
            "POSCAR",
            &poscar.type_nums,
            "OUTCAR ions per type",
            &type_nums,
        ));
    }

    let mut masses = Vec::new();
    let mut valences = Vec::new();
    for ix in sc.find_lines(&[POMASS_PAT], 1, 0)? {
        masses.push(sc.capture_parse::<f64>(ix, POMASS_PAT, 1)?);
        valences.push(sc.capture_parse::<f64>(ix, POMASS_PAT, 2)?);
    }

    let pseudos = sc
        .find_lines(&[TITEL_PAT], 1, 0)?
        .into_iter()
        .map(|ix| sc.capture_parse::<String>(ix, TITEL_PAT, 1))
        .collect::<Result<Vec<_>>>()?;

    let built = species::build_species(type_names, type_nums, masses, pseudos, valences)?;
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

// ─────────────────────────────────────────────────────────────
// 晶格与位置
// ─────────────────────────────────────────────────────────────

struct Lattices {
    initial_basis: Mat3,
    initial_recip: Mat3,
    final_basis: Mat3,
    final_recip: Mat3,
}

fn read_lattices(sc: &LineScanner) -> Result<Lattices> {
    let ixs = sc.find_lines(&[LATTICE_PAT], 2, 0)?;
    let first = ixs[0];
    let last = ixs[ixs.len() - 1];

    let lattices = Lattices {
        initial_basis: sc.parse_mat3(6, first + 1, 0)?,
        initial_recip: sc.parse_mat3(6, first + 1, 3)?,
        final_basis: sc.parse_mat3(6, last + 1, 0)?,
        final_recip: sc.parse_mat3(6, last + 1, 3)?,
    };

    output::print_debug(5, || {
        format!(
            "read_lattices: initialBasisMat:\n{}\nfinalBasisMat:\n{}",
            output::format_matrix(&lattices.initial_basis),
            output::format_matrix(&lattices.final_basis)
        )
    });

    geometry::check_reciprocal(
        "initial reciprocal basis",
        &lattices.initial_basis,
        &lattices.initial_recip,
        1e-3,
    )?;
    geometry::check_reciprocal(
        "final reciprocal basis",
        &lattices.final_basis,
        &lattices.final_recip,
        1e-3,
    )?;
    Ok(lattices)
}

fn read_initial_positions(
    sc: &LineScanner,
    num_atom: usize,
    initial_basis: &Mat3,
) -> Result<(RowsMat, RowsMat)> {
    let ix = sc.locate(FRAC_POS_PAT, Which::First, 1)?;
    let frac = sc.parse_rows3(3, ix + 1, ix + 1 + num_atom, 0)?;

    let ix = sc.locate(CART_POS_PAT, Which::First, 1)?;
    let cart = sc.parse_rows3(3, ix + 1, ix + 1 + num_atom, 0)?;

    output::print_debug(5, || {
        format!(
            "read_initial_positions: initialFracPosMat:\n{}\ninitialCartPosMat:\n{}",
            output::format_matrix(&frac),
            output::format_matrix(&cart)
        )
    });

    let frac_calc = geometry::cart_to_frac(&cart, initial_basis)?;
    let cart_calc = geometry::frac_to_cart(&frac, initial_basis);
    geometry::check_close("initial fractional positions", &frac, &frac_calc, 1e-3)?;
    geometry::check_close("initial cartesian positions", &cart, &cart_calc, 1e-3)?;
    Ok((frac, cart))
}

// ─────────────────────────────────────────────────────────────
// k 点
// ─────────────────────────────────────────────────────────────

struct KpointSet {
    frac: RowsMat,
    cart: RowsMat,
    mults: Vec<f64>,
    weights: Vec<f64>,
}

/// 四列表拆成坐标与第四列
fn split_weighted(rows: Vec<Vec<f64>>) -> (RowsMat, Vec<f64>) {
    rows.into_iter()
        .map(|r| ([r[0], r[1], r[2]], r[3]))
        .unzip()
}

fn read_kpoints(
    sc: &LineScanner,
    num_kpoint: usize,
    scale: f64,
    initial_recip: &Mat3,
) -> Result<KpointSet> {
    // 生成的 k 点，多次出现时取第一个
    let head = sc.find_lines(&[KP_FOUND_PAT, BLANK_PAT, KP_RECIP_PAT, KP_WEIGHT_HEAD_PAT], 1, 0)?;
    let ix = head[0] + 4;
    let (frac, mults) = split_weighted(sc.parse_matrix(4, ix, ix + num_kpoint, 0, 4)?);
    let weights = species::normalize_weights(&mults)?;

    let ix_cart = ix + num_kpoint + 1;
    let cart_head = sc.find_lines(&[KP_CART_PAT, KP_WEIGHT_HEAD_PAT], 1, 0)?;
    if cart_head[0] != ix_cart {
        return Err(ScanError::MalformedTable {
            line: ix_cart,
            text: sc.line(ix_cart).to_string(),
            reason: format!(
                "generated cartesian k-points start at line {}, expected {}",
                cart_head[0], ix_cart
            ),
        });
    }
    let (cart, cart_mults) =
        split_weighted(sc.parse_matrix(4, ix_cart + 2, ix_cart + 2 + num_kpoint, 0, 4)?);
    geometry::check_close(
        "generated k-point multiplicities",
        &[mults.as_slice()],
        &[cart_mults.as_slice()],
        1e-3,
    )?;

    let cart_calc = geometry::mul_rows(&frac, &geometry::scale3(initial_recip, scale));
    geometry::check_close("generated cartesian k-points", &cart, &cart_calc, 1e-1)?;

    output::print_debug(5, || {
        format!(
            "read_kpoints: kpointMults {:?} kpointWeights {:?}\nkpointFracMat:\n{}\nkpointCartMat:\n{}",
            mults,
            weights,
            output::format_matrix(&frac),
            output::format_matrix(&cart)
        )
    });

    // 实际使用的 k 点：笛卡尔版本
    let ix = sc.locate(KP_ACTUAL_CART_PAT, Which::First, 1)? + 1;
    let (cart_a, wts_a) = split_weighted(sc.parse_matrix(4, ix, ix + num_kpoint, 0, 4)?);
    let weights_a = species::normalize_weights(&wts_a)?;
    let inv_recip = geometry::invert3(initial_recip)?;
    let frac_a = geometry::mul_rows(&cart_a, &geometry::scale3(&inv_recip, 1.0 / scale));

    // 实际使用的 k 点：倒格子分数版本
    let ix = sc.locate(KP_ACTUAL_FRAC_PAT, Which::First, 1)? + 1;
    let (frac_b, wts_b) = split_weighted(sc.parse_matrix(4, ix, ix + num_kpoint, 0, 4)?);
    let weights_b = species::normalize_weights(&wts_b)?;
    let cart_b = geometry::mul_rows(&frac_b, &geometry::scale3(initial_recip, scale));

    geometry::check_close(
        "actual k-point weights (cartesian list)",
        &[weights.as_slice()],
        &[weights_a.as_slice()],
        1e-3,
    )?;
    geometry::check_close("actual fractional k-points (cartesian list)", &frac, &frac_a, 1e-2)?;
    geometry::check_close("actual cartesian k-points (cartesian list)", &cart, &cart_a, 1e-3)?;

    geometry::check_close(
        "actual k-point weights (reciprocal list)",
        &[weights.as_slice()],
        &[weights_b.as_slice()],
        1e-3,
    )?;
    geometry::check_close("actual fractional k-points (reciprocal list)", &frac, &frac_b, 1e-3)?;
    geometry::check_close("actual cartesian k-points (reciprocal list)", &cart, &cart_b, 1e-2)?;

    Ok(KpointSet {
        frac,
        cart,
        mults,
        weights,
    })
}

// ─────────────────────────────────────────────────────────────
// 非 GW 结果
// ─────────────────────────────────────────────────────────────

fn read_standard(
    sc: &LineScanner,
    scalars: &Scalars,
    species: &Species,
    final_basis: &Mat3,
    kpoint_mults: &[f64],
) -> Result<StandardResults> {
    let (iter_cpu_times, iter_real_times) = read_iteration_times(sc)?;
    let iter_total_time = iter_real_times.iter().sum();

    let energy_no_entrp: f64 = required(sc, ENERGY_PAT, Which::Last, 0)?;
    let efermi: f64 = required(sc, EFERMI_PAT, Which::Last, 0)?;

    let (final_cart_pos_mat, final_force_mat_ev_ang) = read_forces(sc, species.num_atom)?;
    let final_frac_pos_mat = geometry::cart_to_frac(&final_cart_pos_mat, final_basis)?;

    let (final_stress_mat_ev, final_stress_mat_kbar) = read_stress(sc)?;
    let final_pressure_kbar = geometry::pressure(&final_stress_mat_kbar);

    let (eigen_mat, occup_mat) =
        read_eigen(sc, scalars.num_spin, scalars.num_kpoint, scalars.num_band)?;
    let efermi_calc = electronic::efermi_calc(
        &eigen_mat,
        kpoint_mults,
        scalars.num_spin,
        species.total_valence,
    )?;
    let bands = electronic::band_gaps(&eigen_mat, efermi_calc);

    Ok(StandardResults {
        iter_cpu_times,
        iter_real_times,
        iter_total_time,
        final_frac_pos_mat,
        final_cart_pos_mat,
        final_force_mat_ev_ang,
        final_stress_mat_ev,
        final_stress_mat_kbar,
        final_pressure_kbar,
        energy_no_entrp,
        energy_per_atom: energy_no_entrp / species.num_atom as f64,
        efermi,
        eigen_mat,
        occup_mat,
        efermi_calc: Some(efermi_calc),
        bands,
    })
}

/// `LOOP+` 行；溢出为 `****` 的行不匹配，因此允许零个
fn read_iteration_times(sc: &LineScanner) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut cpu = Vec::new();
    let mut real = Vec::new();
    for ix in sc.find_lines(&[LOOP_PAT], 0, 0)? {
        cpu.push(sc.capture_parse::<f64>(ix, LOOP_PAT, 1)?);
        real.push(sc.capture_parse::<f64>(ix, LOOP_PAT, 2)?);
    }
    output::print_debug(5, || {
        format!("read_iteration_times: cpu {:?} real {:?}", cpu, real)
    });
    Ok((cpu, real))
}

fn read_forces(sc: &LineScanner, num_atom: usize) -> Result<(RowsMat, RowsMat)> {
    let ix = sc.locate(FORCE_PAT, Which::Last, 0)?;
    let positions = sc.parse_rows3(6, ix + 2, ix + 2 + num_atom, 0)?;
    let forces = sc.parse_rows3(6, ix + 2, ix + 2 + num_atom, 3)?;
    output::print_debug(5, || {
        format!(
            "read_forces: finalCartPosMat:\n{}\nfinalForceMat_ev_ang:\n{}",
            output::format_matrix(&positions),
            output::format_matrix(&forces)
        )
    });
    Ok((positions, forces))
}

fn voigt_tokens(sc: &LineScanner, ix: usize, skip: usize) -> Result<[f64; 6]> {
    let malformed = |reason: String| ScanError::MalformedTable {
        line: ix,
        text: sc.line(ix).to_string(),
        reason,
    };
    let vals = sc
        .line(ix)
        .split_whitespace()
        .skip(skip)
        .map(|t| t.parse::<f64>().map_err(|_| malformed(format!("invalid stress {:?}", t))))
        .collect::<Result<Vec<f64>>>()?;
    if vals.len() != 6 {
        return Err(malformed(format!("expected 6 stress components, found {}", vals.len())));
    }
    let mut out = [0.0; 6];
    out.copy_from_slice(&vals);
    Ok(out)
}

/// 返回 `(eV 应力, kbar 应力)`
fn read_stress(sc: &LineScanner) -> Result<(Mat3, Mat3)> {
    let ix = sc.locate(STRESS_PAT, Which::Last, 0)?;

    let mut ev_line = None;
    let mut kb_line = None;
    for ii in ix + 1..ix + 1 + STRESS_SEARCH_LINES {
        if sc.is_match(ii, STRESS_TOTAL_PAT)? {
            ev_line = Some(ii);
        }
        if sc.is_match(ii, STRESS_KB_PAT)? {
            kb_line = Some(ii);
        }
    }
    let missing = |what: &str| ScanError::MalformedTable {
        line: ix,
        text: sc.line(ix).to_string(),
        reason: format!("no {} line in stress block", what),
    };
    let ev = voigt_tokens(sc, ev_line.ok_or_else(|| missing("Total"))?, 1)?;
    let kb = voigt_tokens(sc, kb_line.ok_or_else(|| missing("in kB"))?, 2)?;

    let stress_ev = geometry::stress_from_voigt(&ev);
    let stress_kbar = geometry::stress_from_voigt(&kb);
    output::print_debug(5, || {
        format!(
            "read_stress: finalStressMat_ev:\n{}\nfinalStressMat_kbar:\n{}",
            output::format_matrix(&stress_ev),
            output::format_matrix(&stress_kbar)
        )
    });
    Ok((stress_ev, stress_kbar))
}

// ─────────────────────────────────────────────────────────────
// 能带
// ─────────────────────────────────────────────────────────────

/// `spin component` 行存在当且仅当 ISPIN = 2
fn check_spin_components(sc: &LineScanner, num_spin: usize) -> Result<()> {
    let comp = sc.find_lines(&[SPIN_COMPONENT_PAT], 0, 0)?;
    let implied = if comp.is_empty() { 1 } else { 2 };
    if implied != num_spin {
        return Err(ScanError::conflict(
            "spin channels",
            "ISPIN",
            num_spin,
            "OUTCAR spin component lines",
            comp.len(),
        ));
    }
    Ok(())
}

/// 每个自旋取最后一组本征值块
///
/// 每个 k 点段为：k 点行、表头、`num_band` 行、空行。
fn read_eigen(
    sc: &LineScanner,
    num_spin: usize,
    num_kpoint: usize,
    num_band: usize,
) -> Result<(BandTensor, BandTensor)> {
    let first_ixs = sc.find_lines(&[KP_FIRST_PAT, BAND_HEAD_PAT], num_spin, 0)?;

    let mut eigen = Vec::with_capacity(num_spin);
    let mut occup = Vec::with_capacity(num_spin);
    for isp in 0..num_spin {
        let istart = first_ixs[first_ixs.len() - num_spin + isp];
        let mut eig_sp = Vec::with_capacity(num_kpoint);
        let mut occ_sp = Vec::with_capacity(num_kpoint);
        for ikp in 0..num_kpoint {
            let section = istart + 2 + ikp * (3 + num_band);
            let table = sc.parse_matrix(3, section, section + num_band, 1, 3)?;
            eig_sp.push(table.iter().map(|r| r[0]).collect::<Vec<f64>>());
            occ_sp.push(table.iter().map(|r| r[1]).collect::<Vec<f64>>());
        }
        output::print_debug(5, || format!("read_eigen: isp {} eigenMat {:?}", isp, eig_sp));
        eigen.push(eig_sp);
        occup.push(occ_sp);
    }
    Ok((eigen, occup))
}
