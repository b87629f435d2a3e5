//! # 运行目录收集器
//!
//! 根据输入路径与读取格式收集待处理的运行目录。
//!
//! ## 功能
//! - 单目录模式：输入本身即运行目录
//! - 目录树模式：递归查找含主文件（`OUTCAR` 或 `vasprun.xml`）的目录
//! - 结果按路径排序，保证记录顺序稳定
//!
//! ## 依赖关系
//! - 被 `commands/digest.rs` 调用
//! - 使用 `walkdir` 遍历目录

use crate::error::{Result, ScanError};
use crate::models::ReadMode;
use crate::utils::output;

use std::path::PathBuf;
use walkdir::WalkDir;

/// 运行目录收集器
pub struct RunDirCollector {
    /// 输入路径
    input: PathBuf,
    /// 读取格式，决定主文件名
    mode: ReadMode,
    /// 是否按目录树递归
    tree: bool,
}

impl RunDirCollector {
    pub fn new(input: PathBuf, mode: ReadMode) -> Self {
        Self {
            input,
            mode,
            tree: false,
        }
    }

    /// 设置是否递归搜索
    pub fn tree(mut self, tree: bool) -> Self {
        self.tree = tree;
        self
    }

    /// 收集所有运行目录
    ///
    /// 单目录模式下不检查主文件，缺失时由读取器写入失败记录。
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.input.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: self.input.display().to_string(),
            });
        }

        if !self.tree {
            return Ok(vec![self.input.clone()]);
        }

        let primary = self.mode.primary_file();
        let dirs: Vec<PathBuf> = WalkDir::new(&self.input)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    output::print_warning(&format!("Skipping unreadable entry: {}", err));
                    None
                }
            })
            .filter(|e| e.file_type().is_dir())
            .filter(|e| e.path().join(primary).is_file())
            .map(|e| e.path().to_path_buf())
            .collect();

        if dirs.is_empty() {
            return Err(ScanError::NoRunsFound {
                path: self.input.display().to_string(),
            });
        }

        output::print_debug(2, || {
            format!("RunDirCollector: {} {} run directories", dirs.len(), self.mode)
        });
        Ok(dirs)
    }
}
