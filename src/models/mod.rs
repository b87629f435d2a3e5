//! # 数据模型模块
//!
//! 定义单个运行目录的规范化记录。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`physics/`、`batch/` 和 `commands/` 使用
//! - 子模块: record

pub mod record;

pub use record::{
    BandSummary, BandTensor, OptimizationAlgo, ProcessTimes, ReadMode, RunData, RunRecord,
    RunStatus, Species, StandardResults,
};
