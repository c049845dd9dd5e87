// src/exec/backend.rs

//! Pluggable launcher abstraction.
//!
//! The session runtime talks to a `Launcher` instead of `tokio::process`
//! directly. Production code uses [`TokioLauncher`](super::TokioLauncher);
//! tests provide a fake that records launches and terminate calls and lets
//! them inject output by hand.

use tokio::sync::mpsc;

use crate::engine::SessionEvent;
use crate::types::{ProcessId, ProcessRole};

use super::CommandSpec;

/// Starts external processes for the session.
pub trait Launcher: Send {
    /// Start `spec` as process `id`.
    ///
    /// Everything the process does is reported on `events` as
    /// `SessionEvent::Process`, ending with exactly one `Exited`. A spawn
    /// failure is reported the same way rather than returned.
    fn launch(
        &mut self,
        id: ProcessId,
        role: ProcessRole,
        spec: &CommandSpec,
        events: mpsc::Sender<SessionEvent>,
    ) -> Box<dyn RunHandle>;
}

/// Control side of a launched process.
pub trait RunHandle: Send {
    fn is_alive(&self) -> bool;

    /// Ask the process to stop. Must be a no-op on a process that has already
    /// exited or was already told to stop.
    fn terminate(&mut self);
}
