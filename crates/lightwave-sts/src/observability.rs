//! Process-wide tracing.
//!
//! Tracing starts at `info` before the configuration is read, then switches
//! to `[logging].level` through a reload handle. `RUST_LOG`, when set, wins
//! over both.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

const RUST_LOG: &str = "RUST_LOG";
const BOOTSTRAP_LEVEL: &str = "info";

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to apply log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Installs the global subscriber at the bootstrap level.
pub fn init_tracing() {
    let filter = env_filter().unwrap_or_else(|| EnvFilter::new(BOOTSTRAP_LEVEL));
    let (filter, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches the running subscriber to the configured level.
///
/// Does nothing when `RUST_LOG` is set or tracing was not initialised here.
///
/// # Errors
///
/// The level is not a valid filter directive, or the subscriber is gone.
pub fn apply_logging(cfg: &LoggingConfig) -> Result<(), ObservabilityError> {
    let filter = parse_filter(&cfg.level)?;
    if std::env::var_os(RUST_LOG).is_some() {
        tracing::debug!(level = %cfg.level, "RUST_LOG is set, keeping its filter");
        return Ok(());
    }
    if let Some(handle) = FILTER_HANDLE.get() {
        handle.reload(filter)?;
        tracing::debug!(level = %cfg.level, "Log level applied");
    }
    Ok(())
}

fn env_filter() -> Option<EnvFilter> {
    std::env::var_os(RUST_LOG)?;
    EnvFilter::try_from_default_env().ok()
}

fn parse_filter(level: &str) -> Result<EnvFilter, ObservabilityError> {
    EnvFilter::try_new(level).map_err(|e| ObservabilityError::InvalidFilter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}
