use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// 比较配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareConfig {
    /// 大小不同时直接判定为不同，不再计算 hash
    #[serde(default = "default_size_check")]
    pub size_check: bool,
}

fn default_size_check() -> bool {
    true
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            size_check: default_size_check(),
        }
    }
}

/// 文件比较器
///
/// 以完整文件内容的 BLAKE3 hash 作为判定依据。文件会被整体读入内存，
/// 因此只适用于能放进内存的文件
#[derive(Debug, Clone, Default)]
pub struct FileComparator {
    config: CompareConfig,
}

impl FileComparator {
    pub fn new(size_check: bool) -> Self {
        Self {
            config: CompareConfig { size_check },
        }
    }

    pub fn with_config(config: CompareConfig) -> Self {
        Self { config }
    }

    /// 判断两个文件内容是否完全相同
    ///
    /// 任一文件无法读取时返回错误，不会当作"相同"或"不同"处理
    pub fn compare_files(&self, source: &Path, replica: &Path) -> Result<bool> {
        if self.config.size_check {
            let source_len = file_len(source)?;
            let replica_len = file_len(replica)?;
            if source_len != replica_len {
                debug!(
                    "文件大小不同: {:?} (src={}, dst={})",
                    source, source_len, replica_len
                );
                return Ok(false);
            }
        }

        files_are_identical(source, replica)
    }
}

/// 比较两个文件的完整内容 hash
pub fn files_are_identical(source: &Path, replica: &Path) -> Result<bool> {
    let source_hash = calculate_hash(source)?;
    let replica_hash = calculate_hash(replica)?;
    Ok(source_hash == replica_hash)
}

/// 读取整个文件并计算 BLAKE3 hash
pub fn calculate_hash(path: &Path) -> Result<blake3::Hash> {
    let data = fs::read(path).map_err(|e| SyncError::compare(path, e))?;
    Ok(blake3::hash(&data))
}

fn file_len(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|e| SyncError::compare(path, e))
}
