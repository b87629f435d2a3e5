//! # 批量处理模块
//!
//! 提供运行目录的批量读取能力。
//!
//! ## 功能
//! - 收集单个运行目录或整棵目录树中的运行目录
//! - 并行读取，记录顺序与目录顺序一致
//! - 进度反馈与失败统计
//!
//! ## 依赖关系
//! - 被 `commands/digest.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::RunDirCollector;
pub use runner::{BatchResult, BatchRunner, DigestEntry};
