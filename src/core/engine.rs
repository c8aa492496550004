use crate::core::comparator::{CompareConfig, FileComparator};
use crate::core::executor;
use crate::core::report::{ActionSink, SyncEvent, SyncReport};
use crate::core::scanner::{DirectoryListing, EntryKind};
use crate::error::{Result, SyncError};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 同步动作（针对某一层目录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// 删除副本中多余或类型不符的条目
    Delete { name: OsString, kind: EntryKind },
    /// 副本中不存在，从源复制（目录整体复制）
    Copy { name: OsString, kind: EntryKind },
    /// 两边都有同名文件，比较内容后决定是否替换
    Update { name: OsString },
    /// 两边都有同名目录，进入下一层
    Recurse { name: OsString },
    /// 源中的特殊文件，不同步
    Skip { name: OsString },
}

/// 根据两边的目录列表生成本层的动作
///
/// 条目按（名称，类型）匹配：名称相同但类型不同的副本条目视为多余，
/// 先删除再由源重新创建。所有删除动作排在最前面
pub fn plan_actions(source: &DirectoryListing, replica: &DirectoryListing) -> Vec<SyncAction> {
    let mut actions = Vec::new();

    for (name, kind) in replica.iter() {
        if source.get(name) != Some(kind) {
            actions.push(SyncAction::Delete {
                name: name.to_owned(),
                kind,
            });
        }
    }

    for (name, kind) in source.iter() {
        let name = name.to_owned();
        let in_replica = replica.get(&name) == Some(kind);

        let action = match (kind, in_replica) {
            (EntryKind::Other, _) => SyncAction::Skip { name },
            (EntryKind::Dir, true) => SyncAction::Recurse { name },
            (EntryKind::File, true) => SyncAction::Update { name },
            (kind, false) => SyncAction::Copy { name, kind },
        };
        actions.push(action);
    }

    actions
}

/// 同步引擎
///
/// 单线程、深度优先地把副本目录调整为与源目录一致
pub struct SyncEngine {
    comparator: FileComparator,
    sink: Arc<dyn ActionSink>,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(sink: Arc<dyn ActionSink>) -> Self {
        Self::with_config(CompareConfig::default(), sink)
    }

    pub fn with_config(config: CompareConfig, sink: Arc<dyn ActionSink>) -> Self {
        Self {
            comparator: FileComparator::with_config(config),
            sink,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 取消同步，正在进行的同步会在下一个条目前停止
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 共享的取消标志
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 执行第 `run` 次完整同步
    ///
    /// 单个条目的失败会记录在报告中并跳过；只有根目录无法列出或同步被取消时返回错误
    pub fn run_pass(&self, run: u64, source: &Path, replica: &Path) -> Result<SyncReport> {
        let mut report = SyncReport::new(run);
        self.reconcile_dir(source, replica, &mut report)?;
        report.finish();

        debug!(
            "同步 {} 完成: 复制 {}, 删除 {}, 替换 {}, 失败 {} ({}ms)",
            run,
            report.copied,
            report.removed,
            report.replaced,
            report.failed,
            report.duration_ms()
        );

        Ok(report)
    }

    /// 同步一对目录（单次，不计数）
    pub fn reconcile(&self, source: &Path, replica: &Path) -> Result<SyncReport> {
        self.run_pass(0, source, replica)
    }

    fn reconcile_dir(&self, source: &Path, replica: &Path, report: &mut SyncReport) -> Result<()> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let source_listing = DirectoryListing::read(source)?;
        let replica_listing = DirectoryListing::read_replica(replica)?;

        for action in plan_actions(&source_listing, &replica_listing) {
            if self.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let replica_path = replica.join(action_name(&action));
            match self.execute_action(&action, source, replica, report) {
                Ok(()) => {}
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => self.emit(report, SyncEvent::failed(&replica_path, &e)),
            }
        }

        Ok(())
    }

    fn execute_action(
        &self,
        action: &SyncAction,
        source: &Path,
        replica: &Path,
        report: &mut SyncReport,
    ) -> Result<()> {
        match action {
            SyncAction::Delete { name, kind } => {
                let path = replica.join(name);
                executor::remove_entry(&path, *kind)?;
                self.emit(report, SyncEvent::removed(*kind, &path));
            }
            SyncAction::Copy { name, kind } => {
                let from = source.join(name);
                let to = replica.join(name);
                match kind {
                    EntryKind::Dir => {
                        executor::copy_dir(&from, &to)?;
                    }
                    EntryKind::File => {
                        executor::copy_file(&from, &to)?;
                    }
                    EntryKind::Other => return Ok(()),
                }
                self.emit(report, SyncEvent::copied(*kind, &to));
            }
            SyncAction::Update { name } => {
                let from = source.join(name);
                let to = replica.join(name);
                if self.comparator.compare_files(&from, &to)? {
                    return Ok(());
                }
                executor::copy_file(&from, &to)?;
                self.emit(report, SyncEvent::replaced(&to));
            }
            SyncAction::Recurse { name } => {
                self.reconcile_dir(&source.join(name), &replica.join(name), report)?;
            }
            SyncAction::Skip { name } => {
                warn!("跳过特殊文件: {:?}", source.join(name));
            }
        }
        Ok(())
    }

    fn emit(&self, report: &mut SyncReport, event: SyncEvent) {
        report.apply(&event);
        self.sink.record(&event);
    }
}

fn action_name(action: &SyncAction) -> &OsStr {
    match action {
        SyncAction::Delete { name, .. }
        | SyncAction::Copy { name, .. }
        | SyncAction::Update { name }
        | SyncAction::Recurse { name }
        | SyncAction::Skip { name } => name,
    }
}

/// 同步开始前检查源和副本根目录
///
/// 源目录必须存在且是目录；副本不存在时自动创建；两者不能互相嵌套
pub fn prepare_roots(source: &Path, replica: &Path) -> Result<()> {
    let source_meta = match std::fs::metadata(source) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(SyncError::SourceMissing(source.to_path_buf()))
        }
        Err(e) => return Err(SyncError::list(source, e)),
    };
    if !source_meta.is_dir() {
        return Err(SyncError::SourceNotDir(source.to_path_buf()));
    }

    let source_abs = resolve_path(source).map_err(|e| SyncError::list(source, e))?;
    let replica_abs = resolve_path(replica).map_err(|e| SyncError::list(replica, e))?;
    if source_abs.starts_with(&replica_abs) || replica_abs.starts_with(&source_abs) {
        return Err(SyncError::NestedRoots {
            source_root: source.to_path_buf(),
            replica_root: replica.to_path_buf(),
        });
    }

    match std::fs::metadata(replica) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(SyncError::ReplicaNotDir(replica.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            executor::create_dir(replica)?;
            info!("Replica folder {} created.", replica.display());
            Ok(())
        }
        Err(e) => Err(SyncError::list(replica, e)),
    }
}

/// 转为绝对路径；路径不存在时以最近的已存在祖先为基准
fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(resolved) => return Ok(resolved),
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        Err(_) => {}
    }

    // 不存在的部分无法解析链接，只能按字面处理 `.` 和 `..`
    let absolute = normalize(&std::env::current_dir()?.join(path));
    let mut existing = absolute.as_path();
    let mut missing: Vec<&OsStr> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for part in missing.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                missing.push(name);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
