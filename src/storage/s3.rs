//! # S3 兼容后端
//!
//! 通过 `aws-sdk-s3` 上传到 Aliyun OSS、MinIO 或 AWS S3。
//!
//! ## 功能
//! - 文件不超过一个分片时使用 PutObject
//! - 更大的文件使用分片上传 (multipart)，失败时中止上传
//! - 分片大小不低于 S3 的 5 MiB 下限（最后一片除外）
//!
//! ## 依赖关系
//! - 实现 `storage::ObjectStore`
//! - 仅在启用 `s3` feature 时编译

use super::{chunk_len, read_chunk, ObjectStore, StoreConfig, StorageError};

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::path::Path;
use tokio::fs::File;

/// S3 分片上传的最小分片大小
const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

fn remote<E: std::error::Error>(context: &str, err: E) -> StorageError {
    StorageError::Remote(format!("{}: {}", context, DisplayErrorContext(err)))
}

/// S3 兼容对象存储
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// 根据配置建立客户端
    pub async fn connect(config: &StoreConfig) -> Result<Self, StorageError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(ref endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.access_key_secret) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "ossup",
            ));
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    async fn put_whole(&self, key: &str, path: &Path) -> Result<(), StorageError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| remote("PutObject failed", e))?;
        Ok(())
    }

    async fn put_multipart(&self, key: &str, path: &Path, part_size: usize) -> Result<(), StorageError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| remote("CreateMultipartUpload failed", e))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::Remote("no upload id returned".to_string()))?
            .to_string();

        let parts = match self.upload_parts(key, path, &upload_id, part_size).await {
            Ok(parts) => parts,
            Err(e) => {
                self.abort(key, &upload_id).await;
                return Err(e);
            }
        };

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;

        if let Err(e) = completed {
            self.abort(key, &upload_id).await;
            return Err(remote("CompleteMultipartUpload failed", e));
        }
        Ok(())
    }

    async fn upload_parts(
        &self,
        key: &str,
        path: &Path,
        upload_id: &str,
        part_size: usize,
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let mut file = File::open(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        let mut buf = vec![0u8; part_size];
        let mut parts = Vec::new();
        let mut part_number: i32 = 1;

        loop {
            let n = read_chunk(&mut file, &mut buf)
                .await
                .map_err(|e| StorageError::io(path, e))?;
            if n == 0 {
                break;
            }

            let response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buf[..n].to_vec()))
                .send()
                .await
                .map_err(|e| remote(&format!("UploadPart {} failed", part_number), e))?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(response.e_tag().map(str::to_string))
                    .build(),
            );
            part_number += 1;
        }

        Ok(parts)
    }

    async fn abort(&self, key: &str, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!(key, error = %DisplayErrorContext(e), "failed to abort multipart upload");
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn upload(&self, key: &str, path: &Path, chunk_size: u64) -> Result<(), StorageError> {
        chunk_len(chunk_size)?;
        let part_size = chunk_len(chunk_size.max(MIN_PART_SIZE))?;

        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::io(path, e))?
            .len();

        if len <= part_size as u64 {
            self.put_whole(key, path).await
        } else {
            self.put_multipart(key, path, part_size).await
        }
    }
}
