//! # 对象存储模块
//!
//! 定义上传目标的统一接口 `ObjectStore` 以及各后端实现。
//!
//! ## 功能
//! - `ObjectStore` trait：`upload(key, path, chunk_size)`
//! - `StoreConfig`：显式的连接配置（端点、凭据、桶），启动时构造后传入
//! - 后端：本地目录 (`local`)、S3 兼容存储 (`s3`，需启用 `s3` feature)
//! - `Deadline`：为任意后端叠加单次上传超时
//!
//! ## 依赖关系
//! - 被 `commands/upload.rs` 使用
//! - 子模块: local, deadline, s3

pub mod deadline;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

pub use deadline::Deadline;
pub use local::LocalStore;

use crate::error::{OssupError, Result};

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// 原工具使用的分片大小：100 KiB
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024;

/// 单个对象上传失败的原因
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on '{path}': {cause}")]
    Io { path: String, cause: std::io::Error },

    #[error("Invalid object key: '{0}'")]
    InvalidKey(String),

    #[error("Invalid chunk size: {0} (must be > 0)")]
    InvalidChunkSize(u64),

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote storage error: {0}")]
    Remote(String),
}

impl StorageError {
    pub(crate) fn io(path: &Path, cause: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            cause,
        }
    }
}

/// 对象存储上传接口
///
/// 实现负责分片与传输细节；调用方只关心成功或失败。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 将 `path` 处的文件以 `key` 为对象名上传，按 `chunk_size` 字节分片
    async fn upload(&self, key: &str, path: &Path, chunk_size: u64)
        -> std::result::Result<(), StorageError>;
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// 本地目录，桶名即目标目录
    Local,
    /// S3 兼容存储（Aliyun OSS / MinIO / AWS）
    S3,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::S3 => write!(f, "s3"),
        }
    }
}

/// 存储连接配置
#[derive(Clone)]
pub struct StoreConfig {
    pub backend: Backend,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    /// 使用 path-style 寻址（MinIO 需要，OSS 不需要）
    pub path_style: bool,
    /// 单次上传的超时时间
    pub timeout: Option<Duration>,
}

impl StoreConfig {
    /// 最小配置，其余字段取默认值
    pub fn new(backend: Backend, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key_id: None,
            access_key_secret: None,
            path_style: false,
            timeout: None,
        }
    }

    /// 检查配置是否完整
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(OssupError::Config("bucket name is empty".to_string()));
        }

        if self.backend == Backend::S3 {
            match (&self.access_key_id, &self.access_key_secret) {
                (Some(_), None) | (None, Some(_)) => {
                    return Err(OssupError::Config(
                        "access key id and secret must be given together".to_string(),
                    ));
                }
                _ => {}
            }
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(OssupError::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

// 不输出密钥
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "access_key_secret",
                &self.access_key_secret.as_ref().map(|_| "***"),
            )
            .field("path_style", &self.path_style)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// 根据配置构造存储客户端
pub async fn connect(config: &StoreConfig) -> Result<Box<dyn ObjectStore>> {
    config.validate()?;

    let store: Box<dyn ObjectStore> = match config.backend {
        Backend::Local => Box::new(LocalStore::new(&config.bucket)),
        #[cfg(feature = "s3")]
        Backend::S3 => Box::new(s3::S3Store::connect(config).await?),
        #[cfg(not(feature = "s3"))]
        Backend::S3 => {
            return Err(OssupError::Config(
                "the s3 backend requires building with `--features s3`".to_string(),
            ));
        }
    };

    tracing::debug!(backend = %config.backend, bucket = %config.bucket, "storage client ready");

    let store: Box<dyn ObjectStore> = match config.timeout {
        Some(limit) => Box::new(Deadline::new(store, limit)),
        None => store,
    };
    Ok(store)
}

/// 读取一个完整分片：直到填满 `buf` 或到达文件末尾，返回读取的字节数
pub(crate) async fn read_chunk<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// 将分片大小转换为缓冲区长度
pub(crate) fn chunk_len(chunk_size: u64) -> std::result::Result<usize, StorageError> {
    if chunk_size == 0 {
        return Err(StorageError::InvalidChunkSize(chunk_size));
    }
    usize::try_from(chunk_size).map_err(|_| StorageError::InvalidChunkSize(chunk_size))
}
