//! # inspect 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/inspect.rs`

use crate::models::ReadMode;

use clap::Args;
use std::path::PathBuf;

/// inspect 子命令参数
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Run directory
    pub dir: PathBuf,

    /// Output format to read
    #[arg(short, long, value_enum, default_value_t = ReadMode::Text)]
    pub mode: ReadMode,

    /// Print the error trace for a failed run
    #[arg(long, default_value_t = false)]
    pub trace: bool,
}
