// src/config/validate.rs

use std::net::SocketAddr;

use crate::config::model::{ConfigFile, RawConfigFile, SupervisorSettings};
use crate::errors::{Result, ScantestError};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ScantestError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_runner(&raw)?;
        let supervisor = validate_supervisor(&raw)?;
        let bind = parse_bind(&raw.server.bind)?;
        Ok(ConfigFile::new_unchecked(
            raw.runner,
            supervisor,
            bind,
            raw.files.scan_dir,
        ))
    }
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.python.trim().is_empty() {
        return Err(ScantestError::ConfigError(
            "[runner].python must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<SupervisorSettings> {
    let grace_period = parse_duration(&cfg.supervisor.grace_period).map_err(|e| {
        ScantestError::ConfigError(format!("[supervisor].grace_period: {e}"))
    })?;

    if grace_period.is_zero() {
        return Err(ScantestError::ConfigError(
            "[supervisor].grace_period must be greater than zero".to_string(),
        ));
    }

    if cfg.supervisor.max_cleanup_kill_attempts == 0 {
        return Err(ScantestError::ConfigError(
            "[supervisor].max_cleanup_kill_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    let cleanup_timeout = parse_duration(&cfg.supervisor.cleanup_timeout).map_err(|e| {
        ScantestError::ConfigError(format!("[supervisor].cleanup_timeout: {e}"))
    })?;

    if cleanup_timeout.is_zero() {
        return Err(ScantestError::ConfigError(
            "[supervisor].cleanup_timeout must be greater than zero".to_string(),
        ));
    }

    Ok(SupervisorSettings {
        grace_period,
        max_cleanup_kill_attempts: cfg.supervisor.max_cleanup_kill_attempts,
        cleanup_timeout,
    })
}

/// Parse a listen address, as used by `[server].bind` and `--bind`.
pub fn parse_bind(s: &str) -> Result<SocketAddr> {
    s.trim().parse::<SocketAddr>().map_err(|e| {
        ScantestError::ConfigError(format!("invalid bind address '{s}': {e}"))
    })
}
