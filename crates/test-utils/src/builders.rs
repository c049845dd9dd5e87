#![allow(dead_code)]

use scantest::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn python(mut self, python: &str) -> Self {
        self.config.runner.python = python.to_string();
        self
    }

    pub fn script_dir(mut self, dir: &str) -> Self {
        self.config.runner.script_dir = dir.into();
        self
    }

    pub fn use_dummy(mut self, val: bool) -> Self {
        self.config.runner.use_dummy = val;
        self
    }

    pub fn grace_period(mut self, period: &str) -> Self {
        self.config.supervisor.grace_period = period.to_string();
        self
    }

    pub fn max_cleanup_kill_attempts(mut self, attempts: u32) -> Self {
        self.config.supervisor.max_cleanup_kill_attempts = attempts;
        self
    }

    pub fn cleanup_timeout(mut self, timeout: &str) -> Self {
        self.config.supervisor.cleanup_timeout = timeout.to_string();
        self
    }

    pub fn scan_dir(mut self, dir: &str) -> Self {
        self.config.files.scan_dir = dir.into();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
