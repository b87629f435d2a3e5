//! # 运行记录数据模型
//!
//! 单个 VASP 运行目录的规范化记录。记录由 `parsers::parse_dir` 创建并一次性填充，
//! 之后不再修改。
//!
//! 序列化字段名是下游持久化层按名读取的公共契约（驼峰 + 单位后缀），
//! 例如 `typeMasses_amu`、`finalStressMat_kbar`、`errorMessage`。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`physics/`、`batch/`、`commands/` 使用
//! - 使用 `physics/geometry.rs` 的矩阵类型

use crate::physics::geometry::{Mat3, RowsMat};

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Serialize, Serializer};

/// 本征值 / 占据数张量，索引 `[spin][kpoint][band]`
pub type BandTensor = Vec<Vec<Vec<f64>>>;

// ─────────────────────────────────────────────────────────────
// 读取模式与状态
// ─────────────────────────────────────────────────────────────

/// 运行目录的读取格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// OUTCAR + INCAR + POSCAR
    Text,
    /// vasprun.xml
    Xml,
}

impl ReadMode {
    /// 判定运行目录时要求存在的主文件
    pub fn primary_file(&self) -> &'static str {
        match self {
            ReadMode::Text => "OUTCAR",
            ReadMode::Xml => "vasprun.xml",
        }
    }
}

impl std::fmt::Display for ReadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadMode::Text => write!(f, "text"),
            ReadMode::Xml => write!(f, "xml"),
        }
    }
}

/// 记录的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    Failed,
}

// ─────────────────────────────────────────────────────────────
// 电子优化算法
// ─────────────────────────────────────────────────────────────

/// IALGO 数值代码对应的算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationAlgo {
    Nothing,
    Subrot,
    Normal,
    VeryFast,
    Damped,
    Conjugate,
    Fast,
    Exact,
}

impl OptimizationAlgo {
    const TABLE: [(i64, OptimizationAlgo); 8] = [
        (2, OptimizationAlgo::Nothing),
        (4, OptimizationAlgo::Subrot),
        (38, OptimizationAlgo::Normal),
        (48, OptimizationAlgo::VeryFast),
        (53, OptimizationAlgo::Damped),
        (58, OptimizationAlgo::Conjugate),
        (68, OptimizationAlgo::Fast),
        (90, OptimizationAlgo::Exact),
    ];

    /// 由 IALGO 代码查表，未知代码返回 `None`
    pub fn from_code(code: i64) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, algo)| *algo)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizationAlgo::Nothing => "Nothing",
            OptimizationAlgo::Subrot => "Subrot",
            OptimizationAlgo::Normal => "Normal",
            OptimizationAlgo::VeryFast => "Very Fast",
            OptimizationAlgo::Damped => "Damped",
            OptimizationAlgo::Conjugate => "Conjugate",
            OptimizationAlgo::Fast => "Fast",
            OptimizationAlgo::Exact => "Exact",
        }
    }
}

impl std::fmt::Display for OptimizationAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for OptimizationAlgo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────
// 记录
// ─────────────────────────────────────────────────────────────

/// 单个运行目录的规范化记录
///
/// 失败槽位优先：`error_message` 有值时 `run` 必为 `None`。
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,

    #[serde(rename = "errorTrace")]
    pub error_trace: Option<String>,

    #[serde(flatten)]
    pub run: Option<RunData>,
}

impl RunRecord {
    pub fn complete(run: RunData) -> Self {
        RunRecord {
            error_message: None,
            error_trace: None,
            run: Some(run),
        }
    }

    pub fn failed(message: String, trace: String) -> Self {
        RunRecord {
            error_message: Some(message),
            error_trace: Some(trace),
            run: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.error_message.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Complete
        }
    }

    /// 仅在成功时返回运行数据
    pub fn data(&self) -> Option<&RunData> {
        match self.status() {
            RunStatus::Complete => self.run.as_ref(),
            RunStatus::Failed => None,
        }
    }
}

/// 两种格式共有的运行数据
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    // 运行元数据
    pub run_date: NaiveDateTime,
    pub system_name: String,
    /// 归一化（小写）后的 ALGO 控制参数
    pub algo_param: String,
    pub ialgo: i64,
    pub algo: OptimizationAlgo,
    pub is_gw: bool,

    // 控制参数
    pub ediff: f64,
    #[serde(rename = "encut_ev")]
    pub encut_ev: f64,
    pub ibrion: i64,
    pub isif: i64,
    pub icharg: i64,
    pub num_electron: f64,
    pub num_spin: usize,
    pub num_band: usize,
    pub num_kpoint: usize,

    #[serde(flatten)]
    pub species: Species,

    // 结构
    pub initial_basis_mat: Mat3,
    pub initial_recip_basis_mat: Mat3,
    pub initial_frac_pos_mat: RowsMat,
    pub initial_cart_pos_mat: RowsMat,
    pub final_basis_mat: Mat3,
    pub final_recip_basis_mat: Mat3,

    // k 点
    pub kpoint_frac_mat: RowsMat,
    pub kpoint_cart_mat: RowsMat,
    pub kpoint_mults: Option<Vec<f64>>,
    pub kpoint_weights: Vec<f64>,

    // 体积与密度
    #[serde(rename = "finalVolume_ang3")]
    pub final_volume_ang3: f64,
    #[serde(rename = "finalVolumeCalc_ang3")]
    pub final_volume_calc_ang3: f64,
    pub recip_volume: f64,
    #[serde(rename = "finalDensity_g_cm3")]
    pub final_density_g_cm3: f64,

    /// 进程计时，仅文本格式提供
    #[serde(flatten)]
    pub process_times: Option<ProcessTimes>,

    /// 非 GW 运行才有的结果
    #[serde(flatten)]
    pub standard: Option<StandardResults>,
}

impl RunData {
    pub fn num_atom(&self) -> usize {
        self.species.num_atom
    }
}

/// 元素种类与逐原子展开
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub type_names: Vec<String>,
    pub type_nums: Vec<usize>,
    #[serde(rename = "typeMasses_amu")]
    pub type_masses_amu: Vec<f64>,
    pub type_pseudos: Vec<String>,
    pub type_valences: Vec<f64>,

    pub atom_names: Vec<String>,
    #[serde(rename = "atomMasses_amu")]
    pub atom_masses_amu: Vec<f64>,
    pub atom_pseudos: Vec<String>,
    pub atom_valences: Vec<f64>,

    pub num_atom: usize,
    pub total_valence: f64,
}

/// OUTCAR 末尾的进程计时 (秒)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTimes {
    pub total_cpu_time_sec: f64,
    pub user_time_sec: f64,
    pub system_time_sec: f64,
    pub elapsed_time_sec: f64,
}

/// GW 类运行不输出的字段集合
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardResults {
    // 迭代计时
    pub iter_cpu_times: Vec<f64>,
    pub iter_real_times: Vec<f64>,
    pub iter_total_time: f64,

    // 末态位置与受力
    pub final_frac_pos_mat: RowsMat,
    pub final_cart_pos_mat: RowsMat,
    #[serde(rename = "finalForceMat_ev_ang")]
    pub final_force_mat_ev_ang: RowsMat,

    // 应力
    #[serde(rename = "finalStressMat_ev")]
    pub final_stress_mat_ev: Mat3,
    #[serde(rename = "finalStressMat_kbar")]
    pub final_stress_mat_kbar: Mat3,
    #[serde(rename = "finalPressure_kbar")]
    pub final_pressure_kbar: f64,

    // 能量
    pub energy_no_entrp: f64,
    pub energy_per_atom: f64,
    /// 求解器报告的费米能
    pub efermi: f64,

    // 能带
    pub eigen_mat: BandTensor,
    pub occup_mat: BandTensor,
    /// 零温填充得到的费米能；缺少 k 点多重度时为 `None`
    pub efermi_calc: Option<f64>,

    #[serde(flatten)]
    pub bands: BandSummary,
}

/// 带隙分析结果
///
/// 逐自旋的极值在没有合格本征值时为 ±∞（JSON 中为 `null`）。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSummary {
    pub cb_min: f64,
    pub vb_max: f64,
    pub bandgap: f64,
    pub cb_min_vals: Vec<f64>,
    pub vb_max_vals: Vec<f64>,
    pub cb_min_ixs: Vec<Option<usize>>,
    pub vb_max_ixs: Vec<Option<usize>>,
    pub bandgap_directs: Vec<f64>,
    pub bandgap_indirects: Vec<f64>,
}
