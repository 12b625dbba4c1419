//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `upload`: 并发上传目录中的文件到对象存储
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: upload

pub mod upload;

use clap::{Parser, Subcommand};

/// ossup - 目录并发上传工具
#[derive(Parser)]
#[command(name = "ossup")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Concurrent directory uploader for S3-compatible object storage", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Upload every file of a directory to a bucket
    Upload(upload::UploadArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
