//! # 本地目录后端
//!
//! 将"桶"映射为本地目录，对象名映射为目录下的相对路径。
//! 适合离线测试和将文件同步到挂载的网络存储。
//! 内容先写入同目录下的随机临时文件，完成后原子重命名。
//!
//! ## 依赖关系
//! - 实现 `storage::ObjectStore`
//! - 使用 `tokio::fs` 异步读写，`tempfile` 创建临时文件

use super::{chunk_len, read_chunk, ObjectStore, StorageError};

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// 临时文件名前缀
const TEMP_PREFIX: &str = ".ossup-";

/// 本地目录对象存储
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// 创建本地存储，`root` 不存在时在首次上传时创建
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 对象名 -> 目标路径
    ///
    /// 只接受由普通路径段组成的相对名称，拒绝 `..`、绝对路径和空段。
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let mut dest = self.root.clone();
        for segment in key.split('/') {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => dest.push(part),
                _ => return Err(StorageError::InvalidKey(key.to_string())),
            }
        }
        Ok(dest)
    }

    async fn copy_chunked(
        src_path: &Path,
        dst: &mut File,
        dst_path: &Path,
        chunk_size: usize,
    ) -> Result<usize, StorageError> {
        let mut src = File::open(src_path)
            .await
            .map_err(|e| StorageError::io(src_path, e))?;

        let mut buf = vec![0u8; chunk_size];
        let mut chunks = 0;
        loop {
            let n = read_chunk(&mut src, &mut buf)
                .await
                .map_err(|e| StorageError::io(src_path, e))?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n])
                .await
                .map_err(|e| StorageError::io(dst_path, e))?;
            chunks += 1;
        }

        dst.flush()
            .await
            .map_err(|e| StorageError::io(dst_path, e))?;
        Ok(chunks)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, key: &str, path: &Path, chunk_size: u64) -> Result<(), StorageError> {
        let chunk_size = chunk_len(chunk_size)?;
        let dest = self.resolve(key)?;
        let parent = dest.parent().unwrap_or(self.root.as_path());

        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;

        // 随机名 + O_EXCL 创建的临时文件；TempPath 在 drop 时删除，
        // 包括上传 future 被超时丢弃的情况
        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| StorageError::io(parent, e))?;
        let (file, temp_path) = temp.into_parts();
        let mut dst = File::from_std(file);

        let chunks = Self::copy_chunked(path, &mut dst, &temp_path, chunk_size).await?;
        drop(dst);

        temp_path
            .persist(&dest)
            .map_err(|e| StorageError::io(&dest, e.error))?;
        tracing::debug!(key, chunks, "stored object");
        Ok(())
    }
}
