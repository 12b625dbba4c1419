//! # 统一错误处理模块
//!
//! 定义 ossup 的所有错误类型，使用 `thiserror` 派生。
//!
//! 单个文件上传失败不走这里的 `?` 传播路径，而是收集进
//! `batch::BatchReport`；这里只包含会终止整次运行的错误。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 引用 `storage::StorageError`

use crate::storage::StorageError;
use thiserror::Error;

/// ossup 统一错误类型
#[derive(Error, Debug)]
pub enum OssupError {
    // ─────────────────────────────────────────────────────────────
    // 目录枚举错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to list directory: {path}")]
    ListError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // 配置与参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Incomplete storage configuration: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // 存储错误（仅限客户端构建阶段）
    // ─────────────────────────────────────────────────────────────
    #[error(transparent)]
    Storage(#[from] StorageError),

    // ─────────────────────────────────────────────────────────────
    // 报告导出
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 批处理结果
    // ─────────────────────────────────────────────────────────────
    #[error("{failed} of {total} uploads failed ({cancelled} cancelled)")]
    BatchFailed {
        failed: usize,
        cancelled: usize,
        total: usize,
    },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, OssupError>;
