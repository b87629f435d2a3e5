//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `digest`: 读取单个运行目录或整棵目录树，输出 JSON 记录
//! - `inspect`: 读取单个运行目录并打印关键标量
//!
//! 全局参数 `--verbosity` 控制读取器诊断输出的详细程度。
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: digest, inspect

pub mod digest;
pub mod inspect;

use clap::{Parser, Subcommand};

/// vaspdigest - VASP 运行目录规范化工具
#[derive(Parser)]
#[command(name = "vaspdigest")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Digest VASP run directories into canonical run records", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Diagnostic verbosity (0 = quiet, 5+ dumps parsed matrices)
    #[arg(
        short,
        long,
        global = true,
        default_value_t = 0,
        env = "VASPDIGEST_VERBOSITY",
        value_parser = clap::value_parser!(u8).range(0..=9)
    )]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Parse run directories and write their records as JSON
    Digest(digest::DigestArgs),

    /// Parse one run directory and print a summary table
    Inspect(inspect::InspectArgs),
}
