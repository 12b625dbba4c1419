//! # upload 命令实现
//!
//! 将目录中的文件并发上传到对象存储。
//!
//! ## 功能
//! - 枚举源目录（失败即终止）
//! - 在并发上限内上传，收集全部失败
//! - Ctrl-C 取消尚未开始的上传
//! - 打印失败表格，可选导出 CSV
//! - 按 `--on-failure` 决定退出状态
//!
//! ## 依赖关系
//! - 使用 `cli/upload.rs` 定义的参数
//! - 使用 `batch/`, `storage/`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::batch::{BatchExecutor, BatchReport, FileCollector, WorkItem};
use crate::cli::upload::{FailurePolicy, UploadArgs};
use crate::error::{OssupError, Result};
use crate::storage::{self, ObjectStore, StorageError};
use crate::utils::{output, progress};

use indicatif::ProgressBar;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 执行 upload 命令
pub async fn execute(args: UploadArgs) -> Result<()> {
    output::print_header("Directory Upload");

    if args.chunk_size == 0 {
        return Err(OssupError::InvalidArgument(
            "chunk size must be greater than zero".to_string(),
        ));
    }

    let items = FileCollector::new(&args.dir)
        .with_pattern(&args.pattern)
        .recursive(args.recursive)
        .enumerate()?;

    output::print_info(&format!(
        "Found {} files in '{}'",
        items.len(),
        args.dir.display()
    ));

    if args.dry_run {
        for item in &items {
            output::print_upload(&item.path.display().to_string(), &args.object_key(&item.id));
        }
        output::print_done(&format!("Dry run: {} files would be uploaded", items.len()));
        return Ok(());
    }

    if items.is_empty() {
        output::print_warning("Nothing to upload.");
        return Ok(());
    }

    let store: Arc<dyn ObjectStore> = Arc::from(storage::connect(&args.store_config()).await?);
    output::print_info(&format!(
        "Uploading to {} bucket '{}' with {} concurrent jobs",
        store.name(),
        args.bucket,
        args.concurrency()
    ));

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let pb = progress::create_progress_bar(items.len() as u64, "Uploading");
    let report = upload_items(&args, store, items, cancel, pb.clone()).await?;
    pb.finish_and_clear();
    interrupt.abort();

    summarize(&report, &args)
}

/// 上传全部条目并返回汇总
pub async fn upload_items(
    args: &UploadArgs,
    store: Arc<dyn ObjectStore>,
    items: Vec<WorkItem>,
    cancel: CancellationToken,
    pb: ProgressBar,
) -> Result<BatchReport<StorageError>> {
    let executor = BatchExecutor::new(args.concurrency())?
        .with_cancellation(cancel)
        .with_progress(pb);

    let naming = args.clone();
    let chunk_size = args.chunk_size;

    let report = executor
        .run_all(items, move |item| {
            let store = Arc::clone(&store);
            let key = naming.object_key(&item.id);
            async move {
                tracing::debug!(key = %key, path = %item.path.display(), "upload");
                store.upload(&key, &item.path, chunk_size).await
            }
        })
        .await;

    Ok(report)
}

/// 输出汇总，并按退出策略转换为结果
fn summarize(report: &BatchReport<StorageError>, args: &UploadArgs) -> Result<()> {
    report.print_failures();

    if !report.cancelled.is_empty() {
        output::print_warning(&format!(
            "{} uploads cancelled before they started",
            report.cancelled.len()
        ));
    }

    if let Some(ref path) = args.report {
        report.write_csv(path)?;
        output::print_info(&format!("Failure report written to '{}'", path.display()));
    }

    output::print_summary(report.succeeded, report.failed(), report.cancelled.len(), report.total);
    apply_policy(report, args.on_failure)
}

/// 退出策略
fn apply_policy<E>(report: &BatchReport<E>, policy: FailurePolicy) -> Result<()> {
    if report.is_clean() || policy == FailurePolicy::Ignore {
        return Ok(());
    }
    Err(OssupError::BatchFailed {
        failed: report.failed(),
        cancelled: report.cancelled.len(),
        total: report.total,
    })
}

/// 收到 Ctrl-C 时取消尚未开始的上传，第二次 Ctrl-C 立即退出
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
        output::print_error("Aborted by second interrupt");
        std::process::exit(130);
    }
}

/// 第一次信号取消批处理；返回是否收到第二次信号
async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    output::print_warning("Interrupted: waiting for running uploads to finish (Ctrl-C again to abort)...");
    cancel.cancel();
    next_signal().await.is_ok()
}
