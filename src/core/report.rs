//! 同步事件与同步报告

use crate::core::scanner::EntryKind;
use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

/// 会改变副本状态的事件，以及失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// 从源复制到副本（副本中原本不存在）
    Copied {
        kind: EntryKind,
        name: String,
        path: PathBuf,
    },
    /// 从副本中删除
    Removed {
        kind: EntryKind,
        name: String,
        path: PathBuf,
    },
    /// 内容不同，用源文件替换副本文件
    Replaced { name: String, path: PathBuf },
    /// 某个条目处理失败，已跳过
    Failed { path: PathBuf, message: String },
}

impl SyncEvent {
    pub(crate) fn copied(kind: EntryKind, path: &Path) -> Self {
        Self::Copied {
            kind,
            name: display_name(path),
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn removed(kind: EntryKind, path: &Path) -> Self {
        Self::Removed {
            kind,
            name: display_name(path),
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn replaced(path: &Path) -> Self {
        Self::Replaced {
            name: display_name(path),
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn failed(fallback: &Path, err: &SyncError) -> Self {
        Self::Failed {
            path: err.path().unwrap_or(fallback).to_path_buf(),
            message: err.to_string(),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 同步事件的接收方
///
/// 同步引擎只通过这个接口输出操作记录，不直接依赖全局日志
pub trait ActionSink: Send + Sync {
    fn record(&self, event: &SyncEvent);
}

/// 将事件写入 tracing 日志
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ActionSink for TracingSink {
    fn record(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Copied { kind, name, path } => {
                info!(path = %path.display(), "{} {} copied from source to replica.", kind.label(), name);
            }
            SyncEvent::Removed { kind, name, path } => {
                info!(path = %path.display(), "{} {} removed from replica.", kind.label(), name);
            }
            SyncEvent::Replaced { name, path } => {
                info!(
                    path = %path.display(),
                    "File {} copied from source to replica, replacing the outdated version.",
                    name
                );
            }
            SyncEvent::Failed { path, message } => {
                error!(path = %path.display(), "Failed to synchronize {}: {}", path.display(), message);
            }
        }
    }
}

/// 在内存中保存所有事件，便于测试和检查
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录事件的快照
    pub fn events(&self) -> Vec<SyncEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ActionSink for RecordingSink {
    fn record(&self, event: &SyncEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}

/// 单次同步的报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// 第几次同步
    pub run: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub copied: u32,
    pub removed: u32,
    pub replaced: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn new(run: u64) -> Self {
        Self {
            run,
            started_at: Utc::now(),
            finished_at: None,
            copied: 0,
            removed: 0,
            replaced: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    /// 根据事件更新统计
    pub fn apply(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Copied { .. } => self.copied += 1,
            SyncEvent::Removed { .. } => self.removed += 1,
            SyncEvent::Replaced { .. } => self.replaced += 1,
            SyncEvent::Failed { path, message } => {
                self.failed += 1;
                self.errors.push(format!("{}: {}", path.display(), message));
            }
        }
    }

    /// 标记同步结束
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// 改变副本状态的操作总数
    pub fn actions(&self) -> u32 {
        self.copied + self.removed + self.replaced
    }

    /// 没有任何条目失败
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// 耗时（毫秒），未结束时返回 0
    pub fn duration_ms(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }
}
