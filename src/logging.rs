// src/logging.rs

//! Logging setup for `scantest` using `tracing` + `tracing-subscriber`.
//!
//! The filter is chosen as follows:
//! 1. `--log-level` applies one level to this crate, HTTP internals stay at `warn`
//! 2. otherwise `SCANTEST_LOG` is read as an `EnvFilter` directive string,
//!    e.g. `"debug"` or `"scantest::engine=trace,info"`
//! 3. otherwise `info`
//!
//! Script output that the client never sees (cleanup runs, malformed lines)
//! only ends up here, so logs go to stderr.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "SCANTEST_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => filter_for_level(lvl),
        None => filter_from_env(std::env::var(LOG_ENV_VAR).ok().as_deref()),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

fn filter_for_level(lvl: LogLevel) -> EnvFilter {
    let level = match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    EnvFilter::new(format!("warn,scantest={level}"))
}

/// Falls back to the default when the variable is unset or unparsable.
fn filter_from_env(value: Option<&str>) -> EnvFilter {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}
