//! Tracing subscriber setup.
//!
//! With `log.file = true` events go to a daily-rolling file under
//! `<home>/logs/`; otherwise to stderr. `FDRZ_LOG` overrides the configured
//! level with any `EnvFilter` directive.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogConfig;

/// Env var holding filter directives, e.g. `fdrz_core=debug`.
pub const ENV_LOG: &str = "FDRZ_LOG";

/// Log file name prefix; the appender adds the date.
pub const LOG_FILE: &str = "fdrz.log";

/// Builds the filter from `FDRZ_LOG`, falling back to the configured level.
///
/// # Errors
/// Returns an error if the configured level is not a valid directive.
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    if let Ok(directives) = std::env::var(ENV_LOG)
        && !directives.trim().is_empty()
    {
        return EnvFilter::try_new(directives.trim())
            .with_context(|| format!("Invalid {ENV_LOG} directives"));
    }
    EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level '{}'", config.level))
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer. A subscriber that is already installed
/// is left in place.
///
/// # Errors
/// Returns an error if the filter is invalid or the log directory cannot be
/// created.
pub fn init(config: &LogConfig, home: &Path) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.file {
        let dir = home.join("logs");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_ansi(false).with_writer(writer);
        if registry.with(layer).try_init().is_err() {
            return Ok(None);
        }
        return Ok(Some(guard));
    }

    let layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);
    let _ = registry.with(layer).try_init();
    Ok(None)
}
