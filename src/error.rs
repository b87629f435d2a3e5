//! # 统一错误处理模块
//!
//! 定义 vaspdigest 的所有错误类型，使用 `thiserror` 派生。
//! 单个运行目录的任何错误都是致命的，只在 `parsers::parse_dir` 处被捕获，
//! 写入记录的失败槽位。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// vaspdigest 统一错误类型
#[derive(Error, Debug)]
pub enum ScanError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 扫描错误（行扫描器 / 表格提取）
    // ─────────────────────────────────────────────────────────────
    #[error("Found {found} matches, expected min {min} max {max} (0 = unbounded) for patterns {patterns:?}")]
    CountOutOfRange {
        patterns: Vec<String>,
        min: usize,
        max: usize,
        found: usize,
    },

    #[error("Malformed table at line {line}: {reason}\n  line: {text:?}")]
    MalformedTable {
        line: usize,
        text: String,
        reason: String,
    },

    #[error("Irregular array: {0}")]
    IrregularArray(String),

    #[error("Failed to parse {what}: {reason}")]
    ParseError { what: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // XML 错误
    // ─────────────────────────────────────────────────────────────
    #[error("XML syntax error: {0}")]
    XmlSyntax(#[from] roxmltree::Error),

    #[error("XML path not found: {path}")]
    XmlPathNotFound { path: String },

    #[error("XML path has {found} matches, expected exactly one: {path}")]
    XmlPathAmbiguous { path: String, found: usize },

    // ─────────────────────────────────────────────────────────────
    // 一致性错误
    // ─────────────────────────────────────────────────────────────
    #[error("Value conflict for {what}: {first_source} = {first}, {second_source} = {second}")]
    CrossSourceConflict {
        what: String,
        first_source: String,
        first: String,
        second_source: String,
        second: String,
    },

    #[error("Inconsistent geometry ({what}): max abs delta {delta:.3e} exceeds {tolerance:.1e}")]
    InconsistentGeometry {
        what: String,
        delta: f64,
        tolerance: f64,
    },

    #[error("Fermi index out of range: dindx {dindx}, index {index}, {len} eigenvalues")]
    FermiIndexOutOfRange { dindx: f64, index: i64, len: usize },

    #[error("Type names not in alphabetic order: {0:?}")]
    UnsortedSpecies(Vec<String>),

    #[error("Unknown ALGO: {0}")]
    UnknownAlgo(String),

    #[error("Unknown IALGO code: {0}")]
    UnknownAlgorithmCode(i64),

    // ─────────────────────────────────────────────────────────────
    // 输出错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No run directories found under: {path}")]
    NoRunsFound { path: String },

    #[error("{0}")]
    Other(String),
}

impl ScanError {
    /// 构造 `ParseError` 的便捷函数
    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        ScanError::ParseError {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// 构造 `CrossSourceConflict` 的便捷函数
    pub fn conflict(
        what: impl Into<String>,
        first_source: &str,
        first: impl std::fmt::Debug,
        second_source: &str,
        second: impl std::fmt::Debug,
    ) -> Self {
        ScanError::CrossSourceConflict {
            what: what.into(),
            first_source: first_source.to_string(),
            first: format!("{:?}", first),
            second_source: second_source.to_string(),
            second: format!("{:?}", second),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ScanError>;
