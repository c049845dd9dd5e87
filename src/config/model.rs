// src/config/model.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [runner]
/// python = "python3"
/// script_dir = "scanner"
///
/// [supervisor]
/// grace_period = "500ms"
/// cleanup_timeout = "30s"
///
/// [server]
/// bind = "0.0.0.0:3000"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub supervisor: SupervisorSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub files: FilesSection,
}

/// `[runner]` section: how test scripts are located and started.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    /// Interpreter used for every script.
    #[serde(default = "default_python")]
    pub python: String,

    /// Directory holding the scanner scripts.
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,

    /// Use `<script_dir>/dummy` instead of the hardware scripts.
    #[serde(default)]
    pub use_dummy: bool,
}

impl RunnerSection {
    /// Directory the scripts are actually resolved against.
    pub fn effective_script_dir(&self) -> PathBuf {
        if self.use_dummy {
            self.script_dir.join("dummy")
        } else {
            self.script_dir.clone()
        }
    }
}

fn default_python() -> String {
    "python".to_string()
}

fn default_script_dir() -> PathBuf {
    PathBuf::from("scanner")
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            python: default_python(),
            script_dir: default_script_dir(),
            use_dummy: false,
        }
    }
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    /// Delay between a failure and the forced termination, e.g. `"500ms"`.
    #[serde(default = "default_grace_period")]
    pub grace_period: String,

    /// How many times a misbehaving cleanup process is terminated before the
    /// supervisor gives up and raises an alarm.
    #[serde(default = "default_max_cleanup_kill_attempts")]
    pub max_cleanup_kill_attempts: u32,

    /// Longest a cleanup process may run before it is terminated, e.g. `"30s"`.
    #[serde(default = "default_cleanup_timeout")]
    pub cleanup_timeout: String,
}

fn default_grace_period() -> String {
    "500ms".to_string()
}

fn default_max_cleanup_kill_attempts() -> u32 {
    5
}

fn default_cleanup_timeout() -> String {
    "30s".to_string()
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            max_cleanup_kill_attempts: default_max_cleanup_kill_attempts(),
            cleanup_timeout: default_cleanup_timeout(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// `[files]` section: where finished scans are written by the scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesSection {
    #[serde(default = "default_scan_dir")]
    pub scan_dir: PathBuf,
}

fn default_scan_dir() -> PathBuf {
    PathBuf::from("output_scans")
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            scan_dir: default_scan_dir(),
        }
    }
}

/// Parsed supervisor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub grace_period: Duration,
    pub max_cleanup_kill_attempts: u32,
    pub cleanup_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(500),
            max_cleanup_kill_attempts: default_max_cleanup_kill_attempts(),
            cleanup_timeout: Duration::from_secs(30),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// `validate.rs`) or `Default`, so every field is known to be usable.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runner: RunnerSection,
    pub supervisor: SupervisorSettings,
    pub bind: SocketAddr,
    pub scan_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        runner: RunnerSection,
        supervisor: SupervisorSettings,
        bind: SocketAddr,
        scan_dir: PathBuf,
    ) -> Self {
        Self {
            runner,
            supervisor,
            bind,
            scan_dir,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            runner: RunnerSection::default(),
            supervisor: SupervisorSettings::default(),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            scan_dir: default_scan_dir(),
        }
    }
}
