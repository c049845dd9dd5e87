// src/engine/supervisor.rs

//! Shutdown supervisor.
//!
//! Once a test is judged failed the supervisor drives it through
//! `Idle -> GraceWait -> (force kill check) -> (cleanup spawn) -> Idle`:
//!
//! 1. wait one grace period so the script can stop the motors itself,
//! 2. terminate the test process if it is still around,
//! 3. always launch the cleanup script, because nothing tells us what state
//!    the hardware was left in.
//!
//! A cleanup process that writes to stderr or exits non-zero is terminated
//! after another grace period, at most `max_cleanup_kill_attempts` times.
//! One that is still running after `cleanup_timeout` is terminated as well.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::SupervisorSettings;
use crate::types::ProcessId;

/// Why a test process is being shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// The script reported `"status": "failed"`.
    FailedStatus,
    /// The script wrote to stderr.
    ErrorOutput,
    /// The script quit abnormally without reporting a result.
    UnreportedExit,
}

/// What to do when a scheduled delay elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceCheck {
    /// Terminate a failed test process and launch the cleanup.
    Shutdown { target: ProcessId },
    /// Terminate a misbehaving cleanup process.
    CleanupKill { target: ProcessId },
    /// Terminate a cleanup process that has run for too long.
    CleanupDeadline { target: ProcessId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    ScheduleCheck { check: GraceCheck, delay: Duration },
    Terminate(ProcessId),
    SpawnCleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    /// A failed test process is being given time to stop on its own.
    GraceWait { target: ProcessId },
}

#[derive(Debug)]
pub struct Supervisor {
    settings: SupervisorSettings,
    state: SupervisorState,
    /// Termination attempts scheduled per cleanup process.
    cleanup_attempts: HashMap<ProcessId, u32>,
    /// Cleanup processes the supervisor gave up on.
    alarms: HashSet<ProcessId>,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings) -> Self {
        Self {
            settings,
            state: SupervisorState::Idle,
            cleanup_attempts: HashMap::new(),
            alarms: HashSet::new(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// True while a shutdown is pending.
    pub fn is_engaged(&self) -> bool {
        !matches!(self.state, SupervisorState::Idle)
    }

    /// Cleanup processes that exhausted their termination attempts.
    pub fn alarms(&self) -> &HashSet<ProcessId> {
        &self.alarms
    }

    /// A test process failed.
    ///
    /// Repeated failures of the process already waiting out its grace period
    /// are absorbed into the pending shutdown.
    pub fn on_test_failure(
        &mut self,
        target: ProcessId,
        trigger: ShutdownTrigger,
    ) -> Vec<SupervisorAction> {
        if self.state == (SupervisorState::GraceWait { target }) {
            debug!(process_id = %target, ?trigger, "shutdown already pending; absorbing trigger");
            return Vec::new();
        }

        info!(
            process_id = %target,
            ?trigger,
            grace_ms = self.settings.grace_period.as_millis() as u64,
            "test failed; waiting before forcing shutdown"
        );
        self.state = SupervisorState::GraceWait { target };

        vec![SupervisorAction::ScheduleCheck {
            check: GraceCheck::Shutdown { target },
            delay: self.settings.grace_period,
        }]
    }

    /// A scheduled delay elapsed.
    pub fn on_grace_elapsed(&mut self, check: GraceCheck) -> Vec<SupervisorAction> {
        match check {
            GraceCheck::Shutdown { target } => {
                info!(process_id = %target, "grace period over; ensuring process is gone and spawning cleanup");
                if self.state == (SupervisorState::GraceWait { target }) {
                    self.state = SupervisorState::Idle;
                }
                vec![
                    SupervisorAction::Terminate(target),
                    SupervisorAction::SpawnCleanup,
                ]
            }
            GraceCheck::CleanupKill { target } => {
                info!(process_id = %target, "grace period over; terminating cleanup process");
                vec![SupervisorAction::Terminate(target)]
            }
            GraceCheck::CleanupDeadline { target } => {
                debug!(process_id = %target, "cleanup deadline reached");
                vec![SupervisorAction::Terminate(target)]
            }
        }
    }

    /// A cleanup process was launched; bound how long it may run.
    pub fn on_cleanup_started(&mut self, cleanup: ProcessId) -> Vec<SupervisorAction> {
        vec![SupervisorAction::ScheduleCheck {
            check: GraceCheck::CleanupDeadline { target: cleanup },
            delay: self.settings.cleanup_timeout,
        }]
    }

    /// The cleanup process misbehaved (stderr output or non-zero exit).
    pub fn on_cleanup_failure(&mut self, cleanup: ProcessId) -> Vec<SupervisorAction> {
        let attempts = self.cleanup_attempts.entry(cleanup).or_insert(0);
        *attempts += 1;

        if *attempts > self.settings.max_cleanup_kill_attempts {
            if self.alarms.insert(cleanup) {
                error!(
                    process_id = %cleanup,
                    max_attempts = self.settings.max_cleanup_kill_attempts,
                    "cleanup process keeps failing; giving up, operator attention required"
                );
            }
            return Vec::new();
        }

        debug!(process_id = %cleanup, attempt = *attempts, "scheduling cleanup termination");
        vec![SupervisorAction::ScheduleCheck {
            check: GraceCheck::CleanupKill { target: cleanup },
            delay: self.settings.grace_period,
        }]
    }

    /// Drop bookkeeping for a cleanup process that has exited.
    pub fn forget(&mut self, cleanup: ProcessId) {
        self.cleanup_attempts.remove(&cleanup);
    }
}
