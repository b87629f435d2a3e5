//! # vaspdigest - VASP 运行目录规范化工具
//!
//! 读取 VASP 运行目录（文本日志 OUTCAR 或结构化 vasprun.xml），
//! 校验各来源的一致性并输出规范化的运行记录。
//!
//! ## 子命令
//! - `digest`  - 读取单个运行目录或目录树，输出 JSON / CSV
//! - `inspect` - 读取单个运行目录并打印关键标量
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (目录收集与并行执行)
//!   │     ├── parsers/   (文本与 XML 读取器)
//!   │     ├── physics/   (几何、种类、能带后处理)
//!   │     └── models/    (运行记录)
//!   ├── utils/      (输出、进度条)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod physics;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::output::init_verbosity(cli.verbosity);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
