use crate::config::{Config, LoggingConfig};
use crate::error::DoctorError;
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging system
///
/// Console output goes to stderr; stdout carries the diagnostic report.
/// The returned guard must be held until exit or buffered file lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, DoctorError> {
    let env_filter = build_filter(&config.level)?;

    let mut layers = Vec::new();

    let console_layer = if config.json_format {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter.clone())
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter.clone())
            .boxed()
    };
    layers.push(console_layer);

    let mut guard = None;
    if config.file_logging {
        let log_dir = config.log_dir.clone().unwrap_or_else(Config::default_log_dir);
        let (writer, file_guard) = file_writer(&log_dir)?;
        let file_layer = fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(env_filter)
            .boxed();
        layers.push(file_layer);
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| DoctorError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}

/// `RUST_LOG` wins over the configured level, which must name a real level.
fn build_filter(level: &str) -> Result<EnvFilter, DoctorError> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| DoctorError::Config(format!("Invalid log level '{}'", level)))?;

    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::default().add_directive(level.into())))
}

/// Daily rolling `node-doctor.*` files under `log_dir`
fn file_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard), DoctorError> {
    std::fs::create_dir_all(log_dir)?;
    Ok(non_blocking(rolling::daily(log_dir, "node-doctor")))
}
