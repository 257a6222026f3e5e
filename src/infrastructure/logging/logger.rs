//! `tracing` subscriber setup. Grounded on the teacher's
//! `infrastructure/logging/logger.rs`: an `EnvFilter` seeded from the
//! configured level, a `fmt` layer whose encoding (JSON vs pretty) follows
//! the config, and non-blocking rotated file output when a log directory
//! is configured.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::config::LoggingConfig;

/// Holds the non-blocking writer guard; dropping it flushes pending log
/// lines, so it must be kept alive for the process lifetime.
pub struct LoggerGuard {
    _file_guard: Option<WorkerGuard>,
}

fn parse_level(level: &str) -> Result<Level> {
    level
        .parse::<Level>()
        .map_err(|_| anyhow!("invalid log level: {level}"))
}

/// Initialize the global `tracing` subscriber. Must be called exactly once,
/// as early as possible in `main`.
pub fn init(config: &LoggingConfig) -> Result<LoggerGuard> {
    let level = parse_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let json = config.format == "json";

    let stdout_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let (file_layer, file_guard) = if let Some(dir) = &config.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "agent-forge.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(LoggerGuard { _file_guard: file_guard })
}
