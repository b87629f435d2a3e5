//! # 美化输出工具
//!
//! 提供统一的终端输出样式，以及全局只读的诊断输出级别。
//!
//! 级别约定（与解析器保持一致）：
//! - `0`: 仅结果与错误
//! - `1`: 每个运行目录一行
//! - `5`: 转储解析得到的标量与矩阵
//!
//! ## 依赖关系
//! - 被所有 `commands/`、`parsers/`、`batch/` 模块使用
//! - 使用 `colored` crate

use colored::Colorize;
use std::sync::OnceLock;

static VERBOSITY: OnceLock<u8> = OnceLock::new();

/// 设置诊断级别（进程内只允许设置一次，重复设置被忽略）
pub fn init_verbosity(level: u8) {
    let _ = VERBOSITY.set(level);
}

/// 当前诊断级别，未设置时为 0
pub fn verbosity() -> u8 {
    VERBOSITY.get().copied().unwrap_or(0)
}

/// 当前级别是否输出 `level` 级诊断
pub fn debug_enabled(level: u8) -> bool {
    verbosity() >= level
}

/// 打印诊断消息（消息延迟构造，关闭时无开销）
pub fn print_debug<F>(level: u8, msg: F)
where
    F: FnOnce() -> String,
{
    if debug_enabled(level) {
        eprintln!("{} {}", "[DBG]".magenta(), msg());
    }
}

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// 将 N×M 矩阵格式化为诊断文本
pub fn format_matrix<R: AsRef<[f64]>>(rows: &[R]) -> String {
    let mut msg = String::new();
    for (i, row) in rows.iter().enumerate() {
        msg.push_str(&format!("  row {:3}: ", i));
        for v in row.as_ref() {
            msg.push_str(&format!("  {:9.4}", v));
        }
        msg.push('\n');
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_matrix() {
        let rows = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let text = format_matrix(&rows);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("row   1"));
        assert!(text.contains("6.0000"));
    }

    #[test]
    fn test_verbosity_default_is_quiet() {
        // 测试进程中从不调用 init_verbosity
        assert!(!debug_enabled(5));
    }
}
