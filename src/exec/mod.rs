// src/exec/mod.rs

//! Process launching layer.
//!
//! - [`command`] resolves test selectors into concrete [`CommandSpec`]s.
//! - [`backend`] provides the `Launcher` / `RunHandle` traits the session
//!   runtime talks to, so tests can swap in a fake launcher.
//! - [`process`] is the production launcher built on `tokio::process`.

pub mod backend;
pub mod command;
pub mod process;

use crate::types::ProcessId;

pub use backend::{Launcher, RunHandle};
pub use command::{CommandSpec, IDLE_SWEEP_FLAG, RELEASE_COMPONENT_FLAG, TestCatalog};
pub use process::TokioLauncher;

/// Something a launched process did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    /// One stdout emission (a single line, without its newline).
    Stdout(Vec<u8>),
    /// One raw stderr chunk.
    Stderr(Vec<u8>),
    /// The process is gone. `None` when it was killed by a signal or could
    /// not be spawned at all.
    Exited(Option<i32>),
}

/// [`ProcessOutput`] tagged with the process it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    pub id: ProcessId,
    pub output: ProcessOutput,
}
