//! 目录扫描 - 每次只列出一层条目

use crate::error::{Result, SyncError};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::Path;
use tracing::debug;

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// 普通文件
    File,
    /// 目录
    Dir,
    /// 其他（失效的符号链接、管道、设备文件等）
    Other,
}

impl EntryKind {
    /// 日志中使用的名称
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::File => "File",
            EntryKind::Dir => "Subfolder",
            EntryKind::Other => "Entry",
        }
    }
}

/// 符号链接的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkMode {
    /// 按链接指向的目标分类（源目录）
    Follow,
    /// 链接本身归为 `Other`，不会进入链接指向的位置（副本目录）
    NoFollow,
}

/// 单个目录的直接子条目（名称 -> 类型）
///
/// 使用 BTreeMap 保证遍历顺序稳定，并支持按名称直接查找
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    entries: BTreeMap<OsString, EntryKind>,
}

impl DirectoryListing {
    /// 列出源目录的直接子条目，不递归
    pub fn read(path: &Path) -> Result<Self> {
        Self::read_with(path, LinkMode::Follow)
    }

    /// 列出副本目录的直接子条目
    ///
    /// 副本中的符号链接一律视为 `Other`，删除时只删除链接本身
    pub fn read_replica(path: &Path) -> Result<Self> {
        Self::read_with(path, LinkMode::NoFollow)
    }

    fn read_with(path: &Path, links: LinkMode) -> Result<Self> {
        let read_dir = fs::read_dir(path).map_err(|e| SyncError::list(path, e))?;

        let mut entries = BTreeMap::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| SyncError::list(path, e))?;
            let file_type = entry.file_type().map_err(|e| SyncError::list(&entry.path(), e))?;
            let kind = entry_kind(&entry.path(), file_type, links);
            entries.insert(entry.file_name(), kind);
        }

        debug!("列出 {:?}: {} 个条目", path, entries.len());

        Ok(Self { entries })
    }

    /// 按名称查找条目类型
    pub fn get(&self, name: &OsStr) -> Option<EntryKind> {
        self.entries.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, EntryKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_os_str(), *kind))
    }
}

/// 判断条目类型
fn entry_kind(path: &Path, file_type: fs::FileType, links: LinkMode) -> EntryKind {
    if file_type.is_symlink() {
        if links == LinkMode::NoFollow {
            return EntryKind::Other;
        }
        return match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => EntryKind::Dir,
            Ok(meta) if meta.is_file() => EntryKind::File,
            _ => EntryKind::Other,
        };
    }

    if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}
