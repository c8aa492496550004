//! 副本目录上的文件操作 - 复制、删除

use crate::core::scanner::EntryKind;
use crate::error::{Result, SyncError};
use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// 临时文件前缀，实际名称带随机部分，创建时不会覆盖已有文件
const TEMP_PREFIX: &str = ".fsync-";

/// 复制单个文件，保留修改时间和权限位
///
/// 先写入同目录下新建的临时文件，再原子重命名到目标位置，
/// 复制中途失败不会留下写了一半的目标文件
pub fn copy_file(source: &Path, dest: &Path) -> Result<u64> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| SyncError::copy(dest, e))?;

    // 出错时 temp 被 drop，临时文件随之删除
    let bytes = write_temp(source, &mut temp).map_err(|e| SyncError::copy(source, e))?;
    temp.persist(dest).map_err(|e| SyncError::copy(dest, e.error))?;

    debug!("复制完成: {:?} -> {:?} ({}字节)", source, dest, bytes);
    Ok(bytes)
}

/// 递归复制整个目录（结构、内容和基本元数据），返回复制的文件数
pub fn copy_dir(source: &Path, dest: &Path) -> Result<u64> {
    let mut files = 0;
    // 目录的权限和时间在内容写完后再设置，避免只读目录无法写入
    let mut dirs: Vec<(PathBuf, Metadata)> = Vec::new();

    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            SyncError::copy(&path, e.into())
        })?;

        let relative = entry.path().strip_prefix(source).map_err(|e| {
            SyncError::copy(entry.path(), io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| SyncError::copy(&target, e))?;
            let meta = entry.metadata().map_err(|e| SyncError::copy(entry.path(), e.into()))?;
            dirs.push((target, meta));
        } else if file_type.is_file() {
            copy_file(entry.path(), &target)?;
            files += 1;
        } else {
            debug!("跳过特殊文件: {:?}", entry.path());
        }
    }

    // 由深到浅设置，子目录的修改不会再改变父目录的时间
    for (path, meta) in dirs.iter().rev() {
        fs::set_permissions(path, meta.permissions()).map_err(|e| SyncError::copy(path, e))?;
        if let Err(e) = set_dir_times(path, meta) {
            debug!("无法设置目录时间 {:?}: {}", path, e);
        }
    }

    debug!("目录复制完成: {:?} -> {:?} ({} 个文件)", source, dest, files);
    Ok(files)
}

/// 删除副本中的条目，目录递归删除
pub fn remove_entry(path: &Path, kind: EntryKind) -> Result<()> {
    let result = match kind {
        EntryKind::Dir => fs::remove_dir_all(path),
        EntryKind::File | EntryKind::Other => fs::remove_file(path),
    };
    result.map_err(|e| SyncError::remove(path, e))
}

/// 创建目录（包括缺失的父目录）
pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| SyncError::copy(path, e))
}

fn write_temp(source: &Path, temp: &mut NamedTempFile) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let meta = reader.metadata()?;

    let bytes = io::copy(&mut reader, temp.as_file_mut())?;
    temp.as_file().set_times(file_times(&meta)?)?;
    temp.as_file().set_permissions(meta.permissions())?;
    Ok(bytes)
}

fn set_dir_times(path: &Path, meta: &Metadata) -> io::Result<()> {
    File::open(path)?.set_times(file_times(meta)?)
}

fn file_times(meta: &Metadata) -> io::Result<FileTimes> {
    let mut times = FileTimes::new().set_modified(meta.modified()?);
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    Ok(times)
}
