// src/engine/mod.rs

//! Test session engine.
//!
//! This module ties together:
//! - selector resolution and process launching for a requested test
//! - the event queue the client polls
//! - the shutdown supervisor that reacts to failures
//!
//! The pure core state machine lives in [`core`] (with the supervisor in
//! [`supervisor`]); the async/IO shell is implemented in [`runtime`].

use std::time::Duration;

use crate::exec::{CommandSpec, ProcessEvent};
use crate::types::{ProcessId, ProcessRole, TestSelector};

pub mod core;
pub mod runtime;
pub mod supervisor;

pub use core::SessionCore;
pub use runtime::{SessionHandle, SessionRuntime, spawn_session};
pub use supervisor::{GraceCheck, ShutdownTrigger, Supervisor, SupervisorAction, SupervisorState};

/// Events flowing into the session from launched processes and timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output or exit of a launched process.
    Process(ProcessEvent),
    /// A delay scheduled by the supervisor has elapsed.
    GraceElapsed(GraceCheck),
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start a process under the given id.
    Launch {
        id: ProcessId,
        role: ProcessRole,
        spec: CommandSpec,
    },
    /// Terminate a process if it is still running.
    Terminate(ProcessId),
    /// Feed `SessionEvent::GraceElapsed(check)` back in after `delay`.
    ScheduleGraceCheck { check: GraceCheck, delay: Duration },
}

/// Commands returned by the core after handling a single `SessionEvent`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
}

/// Snapshot of the session for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub busy: bool,
    pub active_test: Option<ProcessId>,
    pub live_processes: usize,
    /// Cleanup processes the supervisor gave up terminating.
    pub cleanup_alarms: Vec<ProcessId>,
}

/// Answer to a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAck {
    /// The test process was launched.
    Started {
        selector: TestSelector,
        process: ProcessId,
    },
    /// The selector did not name a known test; a `failed` event was queued.
    Rejected,
    /// A test, cleanup or pending shutdown holds the rig; nothing was changed.
    Busy,
}

impl StartAck {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartAck::Started { .. } => "started",
            StartAck::Rejected => "rejected",
            StartAck::Busy => "busy",
        }
    }

    /// Whether the request was taken on. An unknown selector still counts:
    /// its failure is reported through the event queue.
    pub fn accepted(&self) -> bool {
        !matches!(self, StartAck::Busy)
    }
}
