//! # 统一错误处理模块
//!
//! 定义 dftbopt 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// dftbopt 统一错误类型
#[derive(Error, Debug)]
pub enum DftbError {
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

    // ─────────────────────────────────────────────────────────────
    // 传输编码错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to decode structure payload: {reason}")]
    DecodeError { reason: String },

    // ─────────────────────────────────────────────────────────────
    // 结构解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid CIF content: {reason}")]
    FormatError { reason: String },

    #[error("Failed to parse engine output: {path}\nReason: {reason}")]
    OutputParseError { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 请求校验错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid request: {0}")]
    ValidationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 外部引擎错误
    // ─────────────────────────────────────────────────────────────
    #[error("DFTB+ executable not found at: {path}")]
    EngineUnavailable { path: String },

    #[error("DFTB+ calculation failed: {reason}")]
    EngineExecution { reason: String },

    #[error("DFTB+ calculation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Concurrent job limit reached ({limit} running), submission rejected")]
    AdmissionLimit { limit: usize },

    // ─────────────────────────────────────────────────────────────
    // CSV 错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, DftbError>;
