// src/engine/core.rs

//! Pure core session state machine.
//!
//! The core consumes start/poll requests and [`SessionEvent`]s and produces:
//! - an updated session state (event queue, live processes, supervisor)
//! - a list of [`CoreCommand`]s describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::SessionRuntime`) is responsible for
//! launching processes, delivering their output, and running timers. The
//! core itself has no channels, no Tokio types, and does not perform any IO,
//! so it can be unit tested step by step.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::config::{ConfigFile, SupervisorSettings};
use crate::event::{DecodeError, EventQueue, RunEvent, decode_stderr, decode_stdout_chunk};
use crate::exec::{ProcessEvent, ProcessOutput, TestCatalog};
use crate::types::{ProcessId, ProcessRole, RunStatus, TestSelector};

use super::supervisor::{ShutdownTrigger, Supervisor, SupervisorAction};
use super::{CoreCommand, CoreStep, SessionEvent, SessionStatus, StartAck};

/// Message queued when a start request names no known test.
pub const UNKNOWN_TEST_MESSAGE: &str =
    "Failed to determine test type, or test type does not exist.";

/// Queued when a test exits cleanly without having reported a result.
pub const FINISHED_MESSAGE: &str = "Test process finished.";

/// Queued when a test quits abnormally without having reported a result.
pub const UNREPORTED_EXIT_MESSAGE: &str = "Test process quit without reporting a result";

#[derive(Debug, Clone, Copy)]
struct ProcessRecord {
    role: ProcessRole,
    selector: Option<TestSelector>,
    /// The test has reported `ok` or `failed`.
    reported: bool,
    /// Superseded by a newer run; output is ignored until it exits.
    retired: bool,
}

impl ProcessRecord {
    fn new(role: ProcessRole, selector: Option<TestSelector>) -> Self {
        Self {
            role,
            selector,
            reported: false,
            retired: false,
        }
    }

    /// A test that already reported its result (or was superseded) no
    /// longer holds the rig.
    fn holds_session(&self) -> bool {
        match self.role {
            ProcessRole::Test => !(self.reported || self.retired),
            ProcessRole::Cleanup => true,
        }
    }
}

#[derive(Debug)]
pub struct SessionCore {
    catalog: TestCatalog,
    queue: EventQueue,
    supervisor: Supervisor,
    /// Processes launched and not yet reported as exited.
    live: HashMap<ProcessId, ProcessRecord>,
    active_test: Option<ProcessId>,
    next_id: u64,
}

impl SessionCore {
    pub fn new(catalog: TestCatalog, settings: SupervisorSettings) -> Self {
        Self {
            catalog,
            queue: EventQueue::new(),
            supervisor: Supervisor::new(settings),
            live: HashMap::new(),
            active_test: None,
            next_id: 1,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(TestCatalog::from_runner(&cfg.runner), cfg.supervisor)
    }

    /// A running test or cleanup holds the rig, or a shutdown is pending.
    pub fn is_busy(&self) -> bool {
        self.supervisor.is_engaged() || self.live.values().any(ProcessRecord::holds_session)
    }

    pub fn active_test(&self) -> Option<ProcessId> {
        self.active_test
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn status(&self) -> SessionStatus {
        let mut cleanup_alarms: Vec<ProcessId> =
            self.supervisor.alarms().iter().copied().collect();
        cleanup_alarms.sort();

        SessionStatus {
            busy: self.is_busy(),
            active_test: self.active_test,
            live_processes: self.live.len(),
            cleanup_alarms,
        }
    }

    /// Handle a start request for the selector as received from the client.
    ///
    /// While busy the request is refused outright. Otherwise the event queue
    /// is reset so the new run starts from a clean baseline, and test
    /// processes lingering after their result are terminated.
    pub fn start_test(&mut self, raw_selector: &str) -> (StartAck, CoreStep) {
        if self.is_busy() {
            warn!(
                selector = raw_selector,
                live = self.live.len(),
                supervisor = ?self.supervisor.state(),
                "test requested while another run is in progress; refusing"
            );
            return (StartAck::Busy, CoreStep::default());
        }

        self.queue.reset();
        let mut commands = self.retire_lingering_tests();

        let Some((selector, spec)) = self.catalog.resolve(raw_selector) else {
            error!(selector = raw_selector, "unknown test");
            self.queue.push(RunEvent::failed(UNKNOWN_TEST_MESSAGE));
            return (StartAck::Rejected, CoreStep { commands });
        };

        let id = self.register(ProcessRole::Test, Some(selector));
        self.active_test = Some(id);
        info!(process_id = %id, %selector, "starting test run");

        commands.push(CoreCommand::Launch {
            id,
            role: ProcessRole::Test,
            spec,
        });
        (StartAck::Started { selector, process: id }, CoreStep { commands })
    }

    /// Everything queued since the last poll.
    pub fn poll_updates(&mut self) -> Vec<RunEvent> {
        self.queue.drain()
    }

    /// Handle a single session event, updating state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: SessionEvent) -> CoreStep {
        let actions = match event {
            SessionEvent::Process(ProcessEvent { id, output }) => {
                self.handle_process_output(id, output)
            }
            SessionEvent::GraceElapsed(check) => self.supervisor.on_grace_elapsed(check),
        };

        let mut commands = Vec::new();
        for action in actions {
            self.apply(action, &mut commands);
        }
        CoreStep { commands }
    }

    fn handle_process_output(
        &mut self,
        id: ProcessId,
        output: ProcessOutput,
    ) -> Vec<SupervisorAction> {
        let Some(record) = self.live.get(&id).copied() else {
            debug!(process_id = %id, ?output, "output from untracked process; ignoring");
            return Vec::new();
        };

        if record.retired && !matches!(output, ProcessOutput::Exited(_)) {
            debug!(process_id = %id, ?output, "output from superseded test; ignoring");
            return Vec::new();
        }

        match (record.role, output) {
            (ProcessRole::Test, ProcessOutput::Stdout(chunk)) => {
                let mut actions = Vec::new();
                for event in decode_logged(id, record.role, &chunk) {
                    info!(
                        process_id = %id,
                        selector = ?record.selector,
                        status = %event.status,
                        msg = %event.msg,
                        "test update"
                    );
                    let failed = event.is_failure();
                    if event.status.is_terminal() {
                        self.mark_reported(id);
                    }
                    self.queue.push(event);
                    if failed {
                        actions.extend(
                            self.supervisor
                                .on_test_failure(id, ShutdownTrigger::FailedStatus),
                        );
                    }
                }
                actions
            }
            (ProcessRole::Test, ProcessOutput::Stderr(chunk)) => {
                let event = decode_stderr(&chunk);
                error!(process_id = %id, selector = ?record.selector, stderr = %event.msg, "test wrote to stderr");
                self.mark_reported(id);
                self.queue.push(event);
                self.supervisor
                    .on_test_failure(id, ShutdownTrigger::ErrorOutput)
            }
            (ProcessRole::Test, ProcessOutput::Exited(code)) => {
                info!(process_id = %id, selector = ?record.selector, exit_code = ?code, "test process quit");
                self.live.remove(&id);
                if self.active_test == Some(id) {
                    self.active_test = None;
                }
                if record.reported || record.retired {
                    return Vec::new();
                }
                self.report_silent_exit(id, code)
            }
            (ProcessRole::Cleanup, ProcessOutput::Stdout(chunk)) => {
                for event in decode_logged(id, record.role, &chunk) {
                    info!(process_id = %id, status = %event.status, msg = %event.msg, "cleanup update");
                }
                Vec::new()
            }
            (ProcessRole::Cleanup, ProcessOutput::Stderr(chunk)) => {
                error!(
                    process_id = %id,
                    stderr = %String::from_utf8_lossy(&chunk),
                    "cleanup wrote to stderr"
                );
                self.supervisor.on_cleanup_failure(id)
            }
            (ProcessRole::Cleanup, ProcessOutput::Exited(code)) => {
                info!(process_id = %id, exit_code = ?code, "cleanup process quit");
                self.live.remove(&id);
                let actions = match code {
                    Some(c) if c != 0 => self.supervisor.on_cleanup_failure(id),
                    _ => Vec::new(),
                };
                self.supervisor.forget(id);
                actions
            }
        }
    }

    /// A test quit without reporting `ok` or `failed`. The client still gets
    /// a terminal event; an abnormal exit is treated as a failure.
    fn report_silent_exit(&mut self, id: ProcessId, code: Option<i32>) -> Vec<SupervisorAction> {
        match code {
            Some(0) => {
                self.queue
                    .push(RunEvent::update(RunStatus::Ok, FINISHED_MESSAGE));
                Vec::new()
            }
            _ => {
                let detail = match code {
                    Some(c) => format!("exit code {c}"),
                    None => "no exit code".to_string(),
                };
                warn!(process_id = %id, %detail, "test quit without reporting a result");
                self.queue
                    .push(RunEvent::failed(format!("{UNREPORTED_EXIT_MESSAGE} ({detail})")));
                self.supervisor
                    .on_test_failure(id, ShutdownTrigger::UnreportedExit)
            }
        }
    }

    fn apply(&mut self, action: SupervisorAction, commands: &mut Vec<CoreCommand>) {
        match action {
            SupervisorAction::ScheduleCheck { check, delay } => {
                commands.push(CoreCommand::ScheduleGraceCheck { check, delay });
            }
            SupervisorAction::Terminate(id) => {
                if self.live.contains_key(&id) {
                    commands.push(CoreCommand::Terminate(id));
                } else {
                    debug!(process_id = %id, "process already gone; nothing to terminate");
                }
            }
            SupervisorAction::SpawnCleanup => {
                let id = self.register(ProcessRole::Cleanup, None);
                info!(process_id = %id, "spawning cleanup process");
                commands.push(CoreCommand::Launch {
                    id,
                    role: ProcessRole::Cleanup,
                    spec: self.catalog.cleanup_after_failure(),
                });
                for follow_up in self.supervisor.on_cleanup_started(id) {
                    self.apply(follow_up, commands);
                }
            }
        }
    }

    /// Retire test processes that are still around after reporting their
    /// result, and terminate them.
    fn retire_lingering_tests(&mut self) -> Vec<CoreCommand> {
        let mut commands = Vec::new();
        for (id, record) in self.live.iter_mut() {
            if record.role == ProcessRole::Test && !record.retired {
                info!(process_id = %id, "terminating test that outlived its result");
                record.retired = true;
                commands.push(CoreCommand::Terminate(*id));
            }
        }
        self.active_test = None;
        commands
    }

    fn mark_reported(&mut self, id: ProcessId) {
        if let Some(record) = self.live.get_mut(&id) {
            record.reported = true;
        }
    }

    fn register(&mut self, role: ProcessRole, selector: Option<TestSelector>) -> ProcessId {
        let id = ProcessId(self.next_id);
        self.next_id += 1;
        self.live.insert(id, ProcessRecord::new(role, selector));
        id
    }
}

/// Decode a stdout chunk, logging and dropping anything that is not a
/// run event.
fn decode_logged(id: ProcessId, role: ProcessRole, chunk: &[u8]) -> Vec<RunEvent> {
    decode_stdout_chunk(chunk)
        .into_iter()
        .filter_map(|decoded| match decoded {
            Ok(event) => Some(event),
            Err(DecodeError::Empty) => None,
            Err(e) => {
                warn!(
                    process_id = %id,
                    %role,
                    error = %e,
                    output = %String::from_utf8_lossy(chunk),
                    "discarding undecodable output"
                );
                None
            }
        })
        .collect()
}
