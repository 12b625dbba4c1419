//! # 批量处理模块
//!
//! 提供有界并发的文件批量处理能力。
//!
//! ## 功能
//! - 枚举源目录，生成不可变的待处理列表
//! - 在并发上限内执行每个条目的操作
//! - 汇总全部失败，不因单个失败中止
//! - 进度反馈与失败报告
//!
//! ## 依赖关系
//! - 被 `commands/upload.rs` 使用
//! - 使用 `tokio` 调度任务
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod executor;
pub mod report;

pub use collector::{FileCollector, WorkItem};
pub use executor::{BatchExecutor, DEFAULT_CONCURRENCY};
pub use report::BatchReport;
