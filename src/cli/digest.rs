//! # digest 子命令 CLI 定义
//!
//! 读取运行目录并输出 JSON 记录
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/digest.rs`

use crate::models::ReadMode;

use clap::Args;
use std::path::PathBuf;

/// digest 子命令参数
#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Run directory, or the root of a tree of run directories with --tree
    pub dir: PathBuf,

    /// Output format to read
    #[arg(short, long, value_enum, default_value_t = ReadMode::Text)]
    pub mode: ReadMode,

    /// Walk the directory tree and digest every run directory found
    #[arg(long, default_value_t = false)]
    pub tree: bool,

    /// Number of parallel jobs (0 = all CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// JSON file receiving all run records
    #[arg(short, long, default_value = "digest.json")]
    pub output: PathBuf,

    /// Also write a per-run CSV summary
    #[arg(long)]
    pub summary_csv: Option<PathBuf>,
}
