//! # 文件收集器
//!
//! 在上传开始前一次性枚举源目录，生成不可变的待处理列表。
//!
//! ## 功能
//! - 只收集普通文件（以及指向普通文件的符号链接），跳过子目录
//! - glob 模式匹配（逗号分隔多模式）
//! - 可选递归搜索，对象名为相对路径
//! - 任何读取错误都会终止枚举，不返回部分结果
//!
//! ## 依赖关系
//! - 被 `commands/upload.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use crate::error::{OssupError, Result};

use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 单个待上传文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 条目标识（文件名或相对路径）
    pub id: String,
    /// 文件的绝对路径
    pub path: PathBuf,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// 文件收集器
pub struct FileCollector {
    /// 源目录
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<String>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            patterns: vec!["*".to_string()],
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.patterns = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if self.patterns.is_empty() {
            self.patterns = vec!["*".to_string()];
        }
        self
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 枚举目录，生成待处理列表（按 id 排序）
    pub fn enumerate(&self) -> Result<Vec<WorkItem>> {
        let metadata = std::fs::metadata(&self.input).map_err(|e| self.list_error(e))?;
        if !metadata.is_dir() {
            return Err(self.list_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a directory",
            )));
        }

        let patterns = self
            .patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| {
                    OssupError::InvalidArgument(format!("Invalid pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let root = self.input.canonicalize().map_err(|e| self.list_error(e))?;
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut items = Vec::new();
        for entry in WalkDir::new(&root).min_depth(1).max_depth(max_depth) {
            let entry = entry.map_err(|e| self.list_error(e.into()))?;

            if entry.file_type().is_dir() || !is_regular_file(&entry) {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if !patterns.iter().any(|p| p.matches(&name)) {
                continue;
            }

            let id = object_id(&root, entry.path());
            items.push(WorkItem::new(id, entry.path()));
        }

        items.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!(dir = %root.display(), count = items.len(), "enumerated work items");
        Ok(items)
    }

    fn list_error(&self, source: io::Error) -> OssupError {
        OssupError::ListError {
            path: self.input.display().to_string(),
            source,
        }
    }
}

/// 普通文件，或指向普通文件的符号链接
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    entry.path_is_symlink()
        && std::fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false)
}

/// 相对根目录的路径，统一用 `/` 分隔
fn object_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("b.log"), b"b").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.txt"), b"c").unwrap();
        dir
    }

    fn ids(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_skips_subdirectories() {
        let dir = setup();
        let items = FileCollector::new(dir.path()).enumerate().unwrap();

        assert_eq!(ids(&items), vec!["a.txt", "b.log"]);
        for item in &items {
            assert!(item.path.is_absolute());
            assert!(item.path.is_file());
        }
    }

    #[test]
    fn test_pattern_filter() {
        let dir = setup();
        let items = FileCollector::new(dir.path())
            .with_pattern("*.txt, *.csv")
            .enumerate()
            .unwrap();
        assert_eq!(ids(&items), vec!["a.txt"]);
    }

    #[test]
    fn test_recursive_ids_are_relative() {
        let dir = setup();
        let items = FileCollector::new(dir.path())
            .with_pattern("*.txt")
            .recursive(true)
            .enumerate()
            .unwrap();
        assert_eq!(ids(&items), vec!["a.txt", "sub/c.txt"]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let items = FileCollector::new(dir.path()).enumerate().unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let err = FileCollector::new("/no/such/dir/for/ossup")
            .enumerate()
            .unwrap_err();
        match err {
            OssupError::ListError { path, source } => {
                assert_eq!(path, "/no/such/dir/for/ossup");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_file_as_directory() {
        let dir = setup();
        let err = FileCollector::new(dir.path().join("a.txt"))
            .enumerate()
            .unwrap_err();
        assert!(matches!(
            err,
            OssupError::ListError { ref source, .. } if source.kind() == io::ErrorKind::InvalidInput
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_name_is_collected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.txt"), b"ok").unwrap();
        let odd = dir.path().join(OsStr::from_bytes(b"bad\xff.bin"));
        fs::write(&odd, b"bad").unwrap();

        let items = FileCollector::new(dir.path()).enumerate().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| i.path.file_name() == odd.file_name()));

        let filtered = FileCollector::new(dir.path())
            .with_pattern("*.bin")
            .enumerate()
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = setup();
        let err = FileCollector::new(dir.path())
            .with_pattern("[")
            .enumerate()
            .unwrap_err();
        assert!(matches!(err, OssupError::InvalidArgument(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_file_is_collected() {
        let dir = setup();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("link.txt")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("link_dir")).unwrap();

        let items = FileCollector::new(dir.path()).enumerate().unwrap();
        assert_eq!(ids(&items), vec!["a.txt", "b.log", "link.txt"]);
    }
}
