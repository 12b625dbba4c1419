//! # 批处理结果
//!
//! 每个条目产生一条 `OperationResult`，由执行器汇总为 `BatchReport`。
//!
//! ## 功能
//! - 失败按完成顺序记录（跨运行不确定，属预期行为）
//! - 取消的条目单独记录，不混入失败
//! - 失败表格输出 (`tabled`) 与 CSV 导出 (`csv`)
//!
//! ## 依赖关系
//! - 被 `batch/executor.rs` 构建
//! - 被 `commands/upload.rs` 输出

use crate::error::{OssupError, Result};
use crate::utils::output;

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tabled::{Table, Tabled};

/// 单个条目的失败原因
#[derive(Debug)]
pub enum TaskError<E> {
    /// 操作返回错误
    Operation(E),
    /// 操作发生 panic，保留 panic 信息
    Panicked(String),
}

impl<E: fmt::Display> fmt::Display for TaskError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Operation(e) => write!(f, "{}", e),
            TaskError::Panicked(msg) => write!(f, "operation panicked: {}", msg),
        }
    }
}

/// 单个条目的结局
#[derive(Debug)]
pub enum Outcome<E> {
    Succeeded,
    Failed(TaskError<E>),
    /// 在获得许可前被取消，操作从未执行
    Cancelled,
}

/// 单个条目的执行结果，每个条目恰好一条
#[derive(Debug)]
pub struct OperationResult<E> {
    /// 提交顺序
    pub index: usize,
    pub item_id: String,
    pub outcome: Outcome<E>,
}

/// 失败记录
#[derive(Debug)]
pub struct ItemFailure<E> {
    pub index: usize,
    pub item_id: String,
    pub cause: TaskError<E>,
}

/// 批处理汇总
#[derive(Debug)]
pub struct BatchReport<E> {
    /// 条目总数
    pub total: usize,
    /// 成功数量
    pub succeeded: usize,
    /// 失败详情（完成顺序）
    pub errors: Vec<ItemFailure<E>>,
    /// 被取消的条目
    pub cancelled: Vec<String>,
}

impl<E> Default for BatchReport<E> {
    fn default() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            errors: Vec::new(),
            cancelled: Vec::new(),
        }
    }
}

impl<E> BatchReport<E> {
    pub(crate) fn with_total(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// 合并一条结果
    pub fn merge(&mut self, result: OperationResult<E>) {
        match result.outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Failed(cause) => self.errors.push(ItemFailure {
                index: result.index,
                item_id: result.item_id,
                cause,
            }),
            Outcome::Cancelled => self.cancelled.push(result.item_id),
        }
    }

    /// 失败数量
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// 已汇报的条目数量
    pub fn reported(&self) -> usize {
        self.succeeded + self.errors.len() + self.cancelled.len()
    }

    /// 每个条目都已汇报
    pub fn is_complete(&self) -> bool {
        self.reported() == self.total
    }

    /// 全部成功
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.cancelled.is_empty()
    }
}

#[derive(Tabled, Serialize)]
struct FailureRow {
    #[tabled(rename = "#")]
    #[serde(rename = "index")]
    number: usize,
    #[tabled(rename = "Item")]
    #[serde(rename = "item")]
    item: String,
    #[tabled(rename = "Submitted")]
    #[serde(rename = "submitted")]
    submitted: usize,
    #[tabled(rename = "Cause")]
    #[serde(rename = "cause")]
    cause: String,
}

impl<E: fmt::Display> BatchReport<E> {
    fn rows(&self) -> Vec<FailureRow> {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, f)| FailureRow {
                number: i,
                item: f.item_id.clone(),
                submitted: f.index,
                cause: f.cause.to_string(),
            })
            .collect()
    }

    /// 打印失败表格
    pub fn print_failures(&self) {
        if self.errors.is_empty() {
            return;
        }
        output::print_header(&format!("{} Failed Uploads", self.errors.len()));
        println!("{}", Table::new(self.rows()));
    }

    /// 导出失败列表为 CSV
    pub fn write_csv(&self, output_path: &Path) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(output_path)?;

        // 没有失败时也保留表头
        wtr.write_record(["index", "item", "submitted", "cause"])?;
        for row in self.rows() {
            wtr.serialize(row)?;
        }

        wtr.flush().map_err(|e| OssupError::FileWriteError {
            path: output_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }
}
