//! # 批量执行器
//!
//! 在 rayon 线程池上逐目录调用 `parsers::parse_dir`。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代，记录顺序与输入目录顺序一致
//! - 进度条显示（诊断输出开启时隐藏）
//! - 失败汇总：单个目录失败不影响其他目录
//!
//! ## 依赖关系
//! - 被 `commands/digest.rs` 调用
//! - 使用 `parsers/mod.rs`, `utils/progress.rs`
//! - 使用 `rayon` 进行并行处理

use crate::error::{Result, ScanError};
use crate::models::{ReadMode, RunRecord, RunStatus};
use crate::parsers;
use crate::utils::{output, progress};

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 单个目录的处理结果
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub dir: PathBuf,
    pub record: RunRecord,
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    /// 与输入目录同序
    pub entries: Vec<DigestEntry>,
    /// 成功数量
    pub complete: usize,
    /// 失败数量
    pub failed: usize,
    /// 失败详情 (目录, errorMessage)
    pub failures: Vec<(String, String)>,
}

impl BatchResult {
    /// 合并单个目录的结果
    pub fn merge(&mut self, entry: DigestEntry) {
        match entry.record.status() {
            RunStatus::Complete => self.complete += 1,
            RunStatus::Failed => {
                self.failed += 1;
                self.failures.push((
                    entry.dir.display().to_string(),
                    entry.record.error_message.clone().unwrap_or_default(),
                ));
            }
        }
        self.entries.push(entry);
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.complete + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// `jobs` 为 0 时使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// 并行读取目录列表
    pub fn run(&self, dirs: Vec<PathBuf>, mode: ReadMode) -> Result<BatchResult> {
        self.run_with(dirs, |dir| parsers::parse_dir(dir, mode))
    }

    /// 用任意处理函数并行处理目录列表
    pub fn run_with<F>(&self, dirs: Vec<PathBuf>, processor: F) -> Result<BatchResult>
    where
        F: Fn(&Path) -> RunRecord + Sync + Send,
    {
        let total = dirs.len();
        let pb = if output::debug_enabled(1) {
            progress::create_hidden_bar()
        } else {
            progress::create_progress_bar(total as u64, "Digesting")
        };

        let failed_count = AtomicUsize::new(0);

        // 配置 rayon 线程池
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| ScanError::Other(format!("failed to build thread pool: {}", e)))?;

        let entries: Vec<DigestEntry> = pool.install(|| {
            dirs.into_par_iter()
                .map(|dir| {
                    let record = processor(&dir);
                    if record.status() == RunStatus::Failed {
                        let n = failed_count.fetch_add(1, Ordering::Relaxed) + 1;
                        pb.set_message(format!("Digesting ({} failed)", n));
                    }
                    pb.inc(1);
                    DigestEntry { dir, record }
                })
                .collect()
        });

        pb.finish_and_clear();

        // 汇总结果
        let mut batch_result = BatchResult::default();
        for entry in entries {
            batch_result.merge(entry);
        }

        Ok(batch_result)
    }
}
