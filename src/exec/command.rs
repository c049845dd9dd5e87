// src/exec/command.rs

use std::fmt;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::RunnerSection;
use crate::types::TestSelector;

/// Releases the actuated component (motor) held by a script.
pub const RELEASE_COMPONENT_FLAG: &str = "--release_component";
/// Sweeps the scanner back to its idle position.
pub const IDLE_SWEEP_FLAG: &str = "--idle_sweep";

const LIMIT_SWITCH_SCRIPT: &str = "scanner_limit_switch.py";
const SCANNER_BASE_SCRIPT: &str = "scanner_base.py";
const SWEEP_TEST_SCRIPT: &str = "sweep_test.py";
const CLEANUP_SCRIPT: &str = "cleanup.py";

/// Executable plus ordered argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Maps test selectors onto the scanner scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCatalog {
    python: String,
    script_dir: PathBuf,
}

impl TestCatalog {
    pub fn new(python: impl Into<String>, script_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script_dir: script_dir.into(),
        }
    }

    pub fn from_runner(runner: &RunnerSection) -> Self {
        Self::new(runner.python.clone(), runner.effective_script_dir())
    }

    pub fn command_for(&self, selector: TestSelector) -> CommandSpec {
        match selector {
            TestSelector::LimitSwitch => self.script(LIMIT_SWITCH_SCRIPT, &[]),
            TestSelector::ScannerBase => self.script(SCANNER_BASE_SCRIPT, &[]),
            TestSelector::SweepTest => self.script(SWEEP_TEST_SCRIPT, &[]),
            TestSelector::ReleaseMotor => {
                self.script(CLEANUP_SCRIPT, &[RELEASE_COMPONENT_FLAG])
            }
        }
    }

    /// Resolve a selector as received from a client.
    ///
    /// Unknown selectors resolve to `None`; that is not an error at this
    /// level, the caller decides how to report it.
    pub fn resolve(&self, raw: &str) -> Option<(TestSelector, CommandSpec)> {
        match raw.parse::<TestSelector>() {
            Ok(selector) => {
                let spec = self.command_for(selector);
                info!(%selector, command = %spec, "resolved test selector");
                Some((selector, spec))
            }
            Err(reason) => {
                warn!(selector = raw, %reason, "could not resolve test selector");
                None
            }
        }
    }

    /// Command run after any failed test to put the rig back in a safe state.
    pub fn cleanup_after_failure(&self) -> CommandSpec {
        self.script(CLEANUP_SCRIPT, &[RELEASE_COMPONENT_FLAG, IDLE_SWEEP_FLAG])
    }

    fn script(&self, name: &str, flags: &[&str]) -> CommandSpec {
        let mut args = vec![self.script_dir.join(name).to_string_lossy().into_owned()];
        args.extend(flags.iter().map(|f| f.to_string()));
        CommandSpec {
            program: self.python.clone(),
            args,
        }
    }
}
