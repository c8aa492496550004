//! 应用配置模块
//!
//! 命令行参数优先，其次是 `--config` 指定的 JSON 配置文件，最后是默认值

use crate::core::CompareConfig;
use crate::logging::LogConfig;
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 单向定时同步文件夹
#[derive(Debug, Parser)]
#[command(name = "foldersync", version, about = "Folder Synchronization")]
pub struct Cli {
    /// Path to the source folder
    pub source: PathBuf,

    /// Path to the replica folder
    pub replica: PathBuf,

    /// Synchronization interval in seconds (default: 1800)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Path to the log file (default: sync_log.txt)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    pub log_level: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run a single synchronization and exit
    #[arg(long)]
    pub once: bool,

    /// Always hash files, even when their sizes differ
    #[arg(long)]
    pub no_size_check: bool,
}

/// 配置文件内容
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// 同步间隔（秒）
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub compare: CompareConfig,
}

fn default_interval() -> u64 {
    1800 // 默认 30 分钟
}

fn default_log_file() -> PathBuf {
    PathBuf::from("sync_log.txt")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            log_file: default_log_file(),
            log: LogConfig::default(),
            compare: CompareConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置，缺失的字段使用默认值
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// 用命令行参数覆盖配置
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(interval) = cli.interval {
            self.interval = interval;
        }
        if let Some(log_file) = &cli.log_file {
            self.log_file = log_file.clone();
        }
        if let Some(level) = &cli.log_level {
            self.log.level = level.to_lowercase();
        }
        if cli.no_size_check {
            self.compare.size_check = false;
        }
    }
}

/// 最终生效的运行参数
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval: Duration,
    pub log_file: PathBuf,
    pub log: LogConfig,
    pub compare: CompareConfig,
    pub once: bool,
}

impl Settings {
    /// 合并命令行参数与配置文件
    pub fn resolve(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        config.apply_cli(&cli);

        if config.interval == 0 {
            anyhow::bail!("interval must be at least 1 second");
        }
        config.log.validate()?;

        Ok(Self {
            source: cli.source,
            replica: cli.replica,
            interval: Duration::from_secs(config.interval),
            log_file: config.log_file,
            log: config.log,
            compare: config.compare,
            once: cli.once,
        })
    }
}
