//! # upload 子命令 CLI 定义
//!
//! 并发上传目录中的文件到对象存储
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/upload.rs`

use crate::batch::DEFAULT_CONCURRENCY;
use crate::storage::{Backend, StoreConfig, DEFAULT_CHUNK_SIZE};

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// 存储后端选择
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum BackendArg {
    /// Local directory acting as the bucket
    Local,
    /// S3-compatible service (Aliyun OSS, MinIO, AWS)
    S3,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Local => Backend::Local,
            BackendArg::S3 => Backend::S3,
        }
    }
}

/// 存在失败条目时的退出策略
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Exit with a non-zero status when any upload failed or was cancelled
    Fail,
    /// Print failures but still exit successfully
    Ignore,
}

/// upload 子命令参数
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Directory containing the files to upload
    #[arg(short = 'd', long = "dir")]
    pub dir: PathBuf,

    /// Only upload files whose name matches (comma-separated globs)
    #[arg(long, default_value = "*")]
    pub pattern: String,

    /// Walk subdirectories too; object keys keep the relative path
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Prefix prepended to every object key
    #[arg(long, default_value = "")]
    pub prefix: String,

    // ─────────────────────────────────────────────────────────────
    // Storage options
    // ─────────────────────────────────────────────────────────────
    /// Storage backend
    #[arg(long, value_enum, default_value = "s3", env = "OSSUP_BACKEND")]
    pub backend: BackendArg,

    /// Bucket name (a directory path for the local backend)
    #[arg(short = 'b', long, env = "OSSUP_BUCKET")]
    pub bucket: String,

    /// Service endpoint URL
    #[arg(long, env = "OSSUP_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Region name
    #[arg(long, default_value = "us-east-1", env = "OSSUP_REGION")]
    pub region: String,

    /// Access key id
    #[arg(long, env = "OSSUP_ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,

    /// Access key secret
    #[arg(long, env = "OSSUP_ACCESS_KEY_SECRET", hide_env_values = true)]
    pub access_key_secret: Option<String>,

    /// Use path-style addressing (needed by MinIO)
    #[arg(long, default_value_t = false)]
    pub path_style: bool,

    // ─────────────────────────────────────────────────────────────
    // Execution control
    // ─────────────────────────────────────────────────────────────
    /// Upload chunk size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Maximum number of concurrent uploads (0 = number of CPUs)
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub jobs: usize,

    /// Per-file upload timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// List the files and their object keys without uploading
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Write the list of failed uploads to a CSV file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Exit status when some uploads failed
    #[arg(long, value_enum, default_value = "fail")]
    pub on_failure: FailurePolicy,
}

impl UploadArgs {
    /// 构造存储配置
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(self.backend.into(), self.bucket.clone());
        config.endpoint = self.endpoint.clone();
        config.region = self.region.clone();
        config.access_key_id = self.access_key_id.clone();
        config.access_key_secret = self.access_key_secret.clone();
        config.path_style = self.path_style;
        config.timeout = self.timeout.map(Duration::from_secs);
        config
    }

    /// 实际并发数
    pub fn concurrency(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    /// 条目 id -> 对象名
    pub fn object_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}
