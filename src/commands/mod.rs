//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `storage/`, `utils/`
//! - 子模块: upload

pub mod upload;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub async fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Upload(args) => upload::execute(args).await,
    }
}
