// src/types.rs

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which hardware test to run.
///
/// The numeric codes are what the web front-end submits as `?test=<code>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestSelector {
    LimitSwitch,
    ScannerBase,
    SweepTest,
    ReleaseMotor,
}

impl TestSelector {
    pub const ALL: [TestSelector; 4] = [
        TestSelector::LimitSwitch,
        TestSelector::ScannerBase,
        TestSelector::SweepTest,
        TestSelector::ReleaseMotor,
    ];

    pub fn code(self) -> u8 {
        match self {
            TestSelector::LimitSwitch => 0,
            TestSelector::ScannerBase => 1,
            TestSelector::SweepTest => 2,
            TestSelector::ReleaseMotor => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            TestSelector::LimitSwitch => "limit_switch",
            TestSelector::ScannerBase => "scanner_base",
            TestSelector::SweepTest => "sweep_test",
            TestSelector::ReleaseMotor => "release_motor",
        }
    }
}

impl fmt::Display for TestSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestSelector {
    type Err = String;

    /// Accepts either the numeric code (`"2"`) or the snake_case name
    /// (`"sweep_test"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown test code {code}"));
        }

        let lowered = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|sel| sel.name() == lowered)
            .ok_or_else(|| format!("unknown test selector '{s}'"))
    }
}

/// Status carried by a [`crate::event::RunEvent`].
///
/// Test scripts may emit statuses beyond the three the controller cares
/// about; those are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Running,
    Ok,
    Failed,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Ok => "ok",
            RunStatus::Failed => "failed",
            RunStatus::Other(s) => s,
        }
    }

    /// `ok` and `failed` end a run from the client's point of view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Ok | RunStatus::Failed)
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "running" => RunStatus::Running,
            "ok" => RunStatus::Ok,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier the session assigns to every process it launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a launched process is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// A hardware test requested by the client.
    Test,
    /// Returns the hardware to a safe idle state after a failure.
    Cleanup,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Test => f.write_str("test"),
            ProcessRole::Cleanup => f.write_str("cleanup"),
        }
    }
}

/// Parse a simple duration string like `"500ms"`, `"3s"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
