//! 同步错误类型

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 同步过程中的错误
///
/// IO 相关的变体都携带出错的路径和底层错误，便于写入日志
#[derive(Debug, Error)]
pub enum SyncError {
    /// 源目录不存在
    #[error("source folder does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    /// 源路径不是目录
    #[error("source path is not a folder: {}", .0.display())]
    SourceNotDir(PathBuf),

    /// 副本路径存在但不是目录
    #[error("replica path is not a folder: {}", .0.display())]
    ReplicaNotDir(PathBuf),

    /// 源与副本互相嵌套
    #[error(
        "source {} and replica {} must not contain each other",
        .source_root.display(),
        .replica_root.display()
    )]
    NestedRoots {
        source_root: PathBuf,
        replica_root: PathBuf,
    },

    #[error("failed to list {}: {source}", .path.display())]
    List { path: PathBuf, source: io::Error },

    #[error("failed to compare {}: {source}", .path.display())]
    Compare { path: PathBuf, source: io::Error },

    #[error("failed to copy {}: {source}", .path.display())]
    Copy { path: PathBuf, source: io::Error },

    #[error("failed to remove {}: {source}", .path.display())]
    Remove { path: PathBuf, source: io::Error },

    /// 同步被取消
    #[error("synchronization cancelled")]
    Cancelled,

    /// 同步线程异常退出
    #[error("synchronization worker failed: {0}")]
    Worker(String),
}

impl SyncError {
    pub(crate) fn list(path: &Path, source: io::Error) -> Self {
        Self::List {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn compare(path: &Path, source: io::Error) -> Self {
        Self::Compare {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn copy(path: &Path, source: io::Error) -> Self {
        Self::Copy {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn remove(path: &Path, source: io::Error) -> Self {
        Self::Remove {
            path: path.to_path_buf(),
            source,
        }
    }

    /// 出错条目的路径（结构性错误返回源根目录）
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceMissing(p) | Self::SourceNotDir(p) | Self::ReplicaNotDir(p) => Some(p),
            Self::NestedRoots { source_root, .. } => Some(source_root),
            Self::List { path, .. }
            | Self::Compare { path, .. }
            | Self::Copy { path, .. }
            | Self::Remove { path, .. } => Some(path),
            Self::Cancelled | Self::Worker(_) => None,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
