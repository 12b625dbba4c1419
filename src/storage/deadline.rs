//! # 上传超时包装
//!
//! 在任意后端外层套一个单次上传的截止时间，到期后返回
//! `StorageError::Timeout`，对批处理来说与其他失败没有区别。
//!
//! ## 依赖关系
//! - 被 `storage::connect` 使用
//! - 使用 `tokio::time::timeout`

use super::{ObjectStore, StorageError};

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 带截止时间的对象存储
pub struct Deadline {
    inner: Box<dyn ObjectStore>,
    limit: Duration,
}

impl Deadline {
    pub fn new(inner: Box<dyn ObjectStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl ObjectStore for Deadline {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn upload(&self, key: &str, path: &Path, chunk_size: u64) -> Result<(), StorageError> {
        match tokio::time::timeout(self.limit, self.inner.upload(key, path, chunk_size)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(key, limit = ?self.limit, "upload deadline expired");
                Err(StorageError::Timeout(self.limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;

    struct SlowStore(Duration);

    #[async_trait]
    impl ObjectStore for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }

        async fn upload(&self, _: &str, _: &Path, _: u64) -> Result<(), StorageError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_expired_deadline_is_timeout() {
        let store = Deadline::new(
            Box::new(SlowStore(Duration::from_secs(5))),
            Duration::from_millis(20),
        );

        let err = store.upload("k", Path::new("p"), 1).await.unwrap_err();
        assert!(matches!(err, StorageError::Timeout(d) if d == Duration::from_millis(20)));
        assert_eq!(store.name(), "slow");
    }

    #[tokio::test]
    async fn test_fast_upload_passes_through() {
        let store = Deadline::new(
            Box::new(SlowStore(Duration::from_millis(1))),
            Duration::from_secs(5),
        );

        assert!(store.upload("k", Path::new("p"), 1).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_expired_local_upload_leaves_nothing_behind() {
        let src_dir = tempfile::TempDir::new().unwrap();
        let bucket = tempfile::TempDir::new().unwrap();
        let src = src_dir.path().join("big.bin");
        std::fs::write(&src, vec![7u8; 4 * 1024 * 1024]).unwrap();

        let store = Deadline::new(
            Box::new(LocalStore::new(bucket.path())),
            Duration::from_millis(5),
        );
        let err = store.upload("big.bin", &src, 1).await.unwrap_err();
        assert!(matches!(err, StorageError::Timeout(_)));

        let leftovers: Vec<_> = std::fs::read_dir(bucket.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {:?}", leftovers);
    }
}
