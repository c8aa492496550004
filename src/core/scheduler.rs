//! 定时同步调度
//!
//! 按固定间隔重复执行同步，上一次同步结束后才开始计时等待下一次。
//! 收到取消信号时在两次同步之间退出；正在进行的同步会在下一个条目前停止，
//! 副本可能只同步了一部分，下一次运行时会重新收敛

use crate::core::engine::{prepare_roots, SyncEngine};
use crate::core::report::SyncReport;
use crate::error::SyncError;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 同步调度器
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    source: PathBuf,
    replica: PathBuf,
    interval: Duration,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<SyncEngine>,
        source: PathBuf,
        replica: PathBuf,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            source,
            replica,
            interval,
            shutdown,
        }
    }

    /// 检查源目录，必要时创建副本目录
    pub fn prepare(&self) -> Result<(), SyncError> {
        prepare_roots(&self.source, &self.replica)
    }

    /// 在阻塞线程上执行第 `run` 次同步
    pub async fn run_once(&self, run: u64) -> Result<SyncReport, SyncError> {
        info!("Synchronization {} started.", run);

        let engine = self.engine.clone();
        let source = self.source.clone();
        let replica = self.replica.clone();

        let result = tokio::task::spawn_blocking(move || engine.run_pass(run, &source, &replica))
            .await
            .map_err(|e| SyncError::Worker(e.to_string()))
            .and_then(|result| result);

        match &result {
            Ok(report) if report.is_clean() => {
                info!(
                    "Synchronization {} successful: {} actions ({} copied, {} removed, {} replaced).",
                    run,
                    report.actions(),
                    report.copied,
                    report.removed,
                    report.replaced
                );
            }
            Ok(report) => {
                error!(
                    "Synchronization {} finished with {} errors: {} actions ({} copied, {} removed, {} replaced).",
                    run,
                    report.failed,
                    report.actions(),
                    report.copied,
                    report.removed,
                    report.replaced
                );
            }
            Err(SyncError::Cancelled) => {
                info!("Synchronization {} interrupted.", run);
            }
            Err(e) => {
                error!("Synchronization {} failed: {}", run, e);
            }
        }

        if let Ok(report) = &result {
            if let Ok(json) = serde_json::to_string(report) {
                debug!("同步报告: {}", json);
            }
        }

        result
    }

    /// 循环执行同步直到收到取消信号，返回完成的同步次数
    pub async fn run(&self) -> Result<u64> {
        self.prepare().context("invalid source or replica folder")?;

        info!(
            "STARTING SYNCHRONIZATION with an interval of {} seconds.",
            self.interval.as_secs()
        );

        // 取消信号同时通知正在运行的同步
        let cancel_flag = self.engine.cancel_flag();
        let token = self.shutdown.clone();
        let watcher = tokio::spawn(async move {
            token.cancelled().await;
            cancel_flag.store(true, Ordering::SeqCst);
        });

        let mut completed = 0;
        let mut run = 0;

        while !self.shutdown.is_cancelled() {
            run += 1;
            match self.run_once(run).await {
                Ok(_) => completed += 1,
                Err(SyncError::Cancelled) => break,
                Err(_) => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        watcher.abort();
        info!("Synchronization stopped after {} passes.", completed);
        Ok(completed)
    }
}
