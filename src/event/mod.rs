// src/event/mod.rs

//! Structured progress records and the plumbing that carries them to the
//! polling client.
//!
//! - [`decoder`] turns raw process output into [`RunEvent`]s.
//! - [`queue`] is the single-consumer mailbox the client drains.

pub mod decoder;
pub mod queue;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::RunStatus;

pub use decoder::{DecodeError, decode_stderr, decode_stdout, decode_stdout_chunk};
pub use queue::EventQueue;

/// The only `type` the front-end understands.
pub const UPDATE_KIND: &str = "update";

/// One progress/status record, as exchanged with both the test scripts and
/// the web client:
///
/// ```json
/// { "type": "update", "status": "running", "msg": "homing base" }
/// ```
///
/// Extra keys emitted by a script are kept and handed to the client as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub status: RunStatus,
    #[serde(default)]
    pub msg: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_kind() -> String {
    UPDATE_KIND.to_string()
}

impl RunEvent {
    pub fn update(status: RunStatus, msg: impl Into<String>) -> Self {
        Self {
            kind: default_kind(),
            status,
            msg: msg.into(),
            extra: Map::new(),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::update(RunStatus::Failed, msg)
    }

    pub fn is_failure(&self) -> bool {
        self.status == RunStatus::Failed
    }
}
