//! # 美化输出工具
//!
//! 提供统一的终端输出样式。
//!
//! ## 依赖关系
//! - 被 `commands/`、`batch/report.rs` 使用
//! - 使用 `colored` crate

use colored::Colorize;

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印 文件 -> 对象名
pub fn print_upload(path: &str, key: &str) {
    println!("{} {} {} {}", "[UP]".cyan().bold(), path.dimmed(), "->".cyan(), key);
}

/// 打印批处理汇总
pub fn print_summary(succeeded: usize, failed: usize, cancelled: usize, total: usize) {
    let line = format!(
        "{} uploaded, {} failed, {} cancelled ({} total)",
        succeeded, failed, cancelled, total
    );
    if failed == 0 && cancelled == 0 {
        print_done(&line);
    } else {
        println!("{} {}", "[FAIL]".red().bold(), line);
    }
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}
