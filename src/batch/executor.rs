//! # 批量执行器
//!
//! 在固定并发上限下对每个条目执行一次操作，等待全部完成后返回汇总。
//!
//! ## 功能
//! - 每个条目一个 tokio 任务，信号量限制同时运行的操作数
//! - 获取许可的等待可被 `CancellationToken` 中止
//! - 单个失败（含 panic）不影响其他条目
//! - 结果经无界通道汇集，汇总循环与任务并行运行
//! - 可选进度条
//!
//! ## 依赖关系
//! - 被 `commands/upload.rs` 调用
//! - 使用 `batch/report.rs` 的结果类型
//! - 使用 `tokio` / `tokio-util` / `futures`

use super::collector::WorkItem;
use super::report::{BatchReport, OperationResult, Outcome, TaskError};
use crate::error::{OssupError, Result};

use futures::FutureExt;
use indicatif::ProgressBar;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// 原工具的默认并发数
pub const DEFAULT_CONCURRENCY: usize = 30;

/// 有界并发批量执行器
pub struct BatchExecutor {
    /// 同时运行的操作上限
    concurrency: usize,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl BatchExecutor {
    /// 创建执行器，`concurrency` 必须至少为 1
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(OssupError::InvalidArgument(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            concurrency,
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// 使用外部取消信号
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 每汇报一个条目推进一次进度条
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// 对所有条目执行 `operation`，全部汇报后返回汇总
    ///
    /// 失败按完成顺序排列。取消只作用于尚未获得许可的条目，
    /// 已在运行的操作会正常结束。
    pub async fn run_all<F, Fut, E>(&self, items: Vec<WorkItem>, operation: F) -> BatchReport<E>
    where
        F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let total = items.len();
        let mut report = BatchReport::with_total(total);
        if total == 0 {
            return report;
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let operation = Arc::new(operation);
        let (tx, mut rx) = mpsc::unbounded_channel::<OperationResult<E>>();

        for (index, item) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let operation = Arc::clone(&operation);
            let cancel = self.cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let item_id = item.id.clone();
                let outcome = run_one(index, item, semaphore, cancel, operation).await;
                tx.send(OperationResult {
                    index,
                    item_id,
                    outcome,
                })
                .ok();
            });
        }

        // 所有任务结束（发送端全部释放）后通道关闭，recv 返回 None
        drop(tx);

        while let Some(result) = rx.recv().await {
            if let Some(ref pb) = self.progress {
                if let Outcome::Failed(_) = result.outcome {
                    pb.set_message(format!("failed: {}", result.item_id));
                }
                pb.inc(1);
            }
            report.merge(result);
        }

        debug_assert!(report.is_complete());
        tracing::debug!(
            total,
            succeeded = report.succeeded,
            failed = report.failed(),
            cancelled = report.cancelled.len(),
            "batch finished"
        );
        report
    }
}

/// 单个条目：等待许可 -> 执行 -> 释放许可
async fn run_one<F, Fut, E>(
    index: usize,
    item: WorkItem,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    operation: Arc<F>,
) -> Outcome<E>
where
    F: Fn(WorkItem) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
{
    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = semaphore.acquire_owned() => permit.ok(),
    };

    let Some(permit) = permit else {
        tracing::debug!(index, item = %item.id, "cancelled before start");
        return Outcome::Cancelled;
    };

    let result = AssertUnwindSafe(async { operation(item).await })
        .catch_unwind()
        .await;
    drop(permit);

    match result {
        Ok(Ok(())) => Outcome::Succeeded,
        Ok(Err(e)) => Outcome::Failed(TaskError::Operation(e)),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(index, message = %message, "operation panicked");
            Outcome::Failed(TaskError::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn items(n: usize) -> Vec<WorkItem> {
        (1..=n)
            .map(|i| WorkItem::new(format!("item{}", i), format!("/data/item{}", i)))
            .collect()
    }

    /// 记录调用次数与同时运行的峰值
    #[derive(Default)]
    struct Probe {
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl Probe {
        async fn enter(&self, id: &str, hold: Duration) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(id.to_string());
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_are_collected_without_short_circuit() {
        let probe = Arc::new(Probe::default());
        let executor = BatchExecutor::new(2).unwrap();

        let p = Arc::clone(&probe);
        let report = executor
            .run_all(items(5), move |item| {
                let p = Arc::clone(&p);
                async move {
                    p.enter(&item.id, Duration::from_millis(10)).await;
                    if item.id == "item2" || item.id == "item4" {
                        Err(format!("upload of {} failed", item.id))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 5);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
        assert!(report.is_complete());
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed(), 2);

        let failed: HashSet<_> = report.errors.iter().map(|f| f.item_id.as_str()).collect();
        assert_eq!(failed, HashSet::from(["item2", "item4"]));
        for failure in &report.errors {
            assert!(matches!(failure.cause, TaskError::Operation(_)));
            assert!(failure.index == 1 || failure.index == 3);
        }
    }

    #[tokio::test]
    async fn test_empty_input_never_invokes_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = BatchExecutor::new(4).unwrap();

        let c = Arc::clone(&calls);
        let report = executor
            .run_all(Vec::new(), move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), String>(()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.total, 0);
        assert!(report.errors.is_empty());
        assert!(report.is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_permit_serializes() {
        let probe = Arc::new(Probe::default());
        let executor = BatchExecutor::new(1).unwrap();

        let p = Arc::clone(&probe);
        let report = executor
            .run_all(items(3), move |item| {
                let p = Arc::clone(&p);
                async move {
                    p.enter(&item.id, Duration::from_millis(15)).await;
                    Ok::<(), String>(())
                }
            })
            .await;

        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.succeeded, 3);
        assert!(report.is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound_holds_under_load() {
        let probe = Arc::new(Probe::default());
        let executor = BatchExecutor::new(3).unwrap();

        let p = Arc::clone(&probe);
        let report = executor
            .run_all(items(40), move |item| {
                let p = Arc::clone(&p);
                async move {
                    p.enter(&item.id, Duration::from_millis(2)).await;
                    Ok::<(), String>(())
                }
            })
            .await;

        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(report.succeeded, 40);

        // 每个条目恰好执行一次
        let seen = probe.seen.lock().unwrap();
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(seen.len(), 40);
        assert_eq!(unique.len(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_failures_are_reported() {
        let executor = BatchExecutor::new(4).unwrap();
        let report = executor
            .run_all(items(25), |item| async move { Err::<(), _>(item.id) })
            .await;

        assert_eq!(report.failed(), 25);
        assert_eq!(report.succeeded, 0);
        let ids: HashSet<_> = report.errors.iter().map(|f| f.item_id.clone()).collect();
        assert_eq!(ids.len(), 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_ids_are_kept() {
        let executor = BatchExecutor::new(2).unwrap();
        let batch = vec![
            WorkItem::new("same", "/a"),
            WorkItem::new("same", "/b"),
        ];

        let report = executor
            .run_all(batch, |_| async { Err::<(), _>("nope") })
            .await;

        assert_eq!(report.failed(), 2);
        assert!(report.errors.iter().all(|f| f.item_id == "same"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancellation_skips_waiting_items() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let executor = BatchExecutor::new(1)
            .unwrap()
            .with_cancellation(cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let c = Arc::clone(&calls);
        let report = executor
            .run_all(items(3), move |_| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    Ok::<(), String>(())
                }
            })
            .await;

        // 正在运行的那一个正常结束，其余两个从未执行
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.cancelled.len(), 2);
        assert!(report.errors.is_empty());
        assert!(report.is_complete());
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = BatchExecutor::new(8).unwrap().with_cancellation(cancel);

        let report = executor
            .run_all(items(4), |_| async { Ok::<(), String>(()) })
            .await;

        assert_eq!(report.cancelled.len(), 4);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panic_is_reported_and_permit_released() {
        let executor = BatchExecutor::new(1).unwrap();

        let report = executor
            .run_all(items(3), |item| async move {
                if item.id == "item1" {
                    panic!("corrupt input");
                }
                Ok::<(), String>(())
            })
            .await;

        // 单许可下后续条目仍能运行，说明许可已释放
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed(), 1);
        match &report.errors[0].cause {
            TaskError::Panicked(msg) => assert_eq!(msg, "corrupt input"),
            other => panic!("unexpected cause: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_progress_counts_every_item() {
        let pb = ProgressBar::hidden();
        pb.set_length(6);
        let executor = BatchExecutor::new(2).unwrap().with_progress(pb.clone());

        executor
            .run_all(items(6), |item| async move {
                if item.id == "item6" {
                    Err("x")
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(pb.position(), 6);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(
            BatchExecutor::new(0),
            Err(OssupError::InvalidArgument(_))
        ));
    }
}
