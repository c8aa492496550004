use anyhow::{Context, Result};
use clap::Parser;
use foldersync_lib::config::{Cli, Settings};
use foldersync_lib::logging::{LogConfig, SizeRotatingWriter};
use foldersync_lib::{SyncEngine, SyncScheduler, TracingSink};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

/// 初始化日志系统
fn init_logging(config: &LogConfig, log_file: &Path) -> Result<()> {
    let env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(config.tracing_level().into());

    let file_writer = SizeRotatingWriter::new(log_file, config.max_size_mb)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    // 文件日志层 - 始终输出到文件
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    // 在 debug 模式下也输出到控制台
    #[cfg(debug_assertions)]
    let subscriber = subscriber.with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false),
    );

    subscriber
        .try_init()
        .context("failed to install log subscriber")
}

/// 等待 SIGINT / SIGTERM 并触发取消
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听 Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("无法监听 SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, stopping synchronization."),
        _ = terminate => info!("Received SIGTERM, stopping synchronization."),
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::resolve(Cli::parse())?;

    init_logging(&settings.log, &settings.log_file)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let engine = Arc::new(SyncEngine::with_config(
        settings.compare.clone(),
        Arc::new(TracingSink),
    ));
    let scheduler = SyncScheduler::new(
        engine,
        settings.source.clone(),
        settings.replica.clone(),
        settings.interval,
        shutdown,
    );

    if settings.once {
        if let Err(e) = scheduler.prepare() {
            error!("{}", e);
            return Err(e.into());
        }
        let report = scheduler.run_once(1).await?;
        if !report.is_clean() {
            anyhow::bail!("{} entries failed to synchronize", report.failed);
        }
        return Ok(());
    }

    if let Err(e) = scheduler.run().await {
        error!("{:#}", e);
        return Err(e);
    }

    Ok(())
}
