use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use scantest::engine::SessionEvent;
use scantest::exec::{CommandSpec, Launcher, ProcessEvent, ProcessOutput, RunHandle};
use scantest::types::{ProcessId, ProcessRole};

/// One call to `Launcher::launch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub id: ProcessId,
    pub role: ProcessRole,
    pub spec: CommandSpec,
}

#[derive(Default)]
struct FakeState {
    launches: Vec<LaunchRecord>,
    terminations: Vec<ProcessId>,
    senders: HashMap<ProcessId, mpsc::Sender<SessionEvent>>,
    alive: HashMap<ProcessId, bool>,
    exit_on_terminate: bool,
}

/// A fake launcher that:
/// - records every launch and every terminate call
/// - starts no real process; tests push output with `stdout`/`stderr`/`exit`.
///
/// Clones share state, so keep one clone in the test and hand the other to
/// the session.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<FakeState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make fake processes report `Exited(None)` as soon as they are
    /// terminated, like a real process killed by a signal.
    pub fn exiting_on_terminate() -> Self {
        let launcher = Self::new();
        launcher.lock().exit_on_terminate = true;
        launcher
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.lock().launches.clone()
    }

    pub fn launches_of(&self, role: ProcessRole) -> Vec<LaunchRecord> {
        self.launches().into_iter().filter(|l| l.role == role).collect()
    }

    pub fn terminations(&self) -> Vec<ProcessId> {
        self.lock().terminations.clone()
    }

    pub fn terminations_of(&self, id: ProcessId) -> usize {
        self.terminations().into_iter().filter(|t| *t == id).count()
    }

    pub fn is_alive(&self, id: ProcessId) -> bool {
        self.lock().alive.get(&id).copied().unwrap_or(false)
    }

    pub async fn stdout(&self, id: ProcessId, chunk: impl Into<Vec<u8>>) {
        self.emit(id, ProcessOutput::Stdout(chunk.into())).await;
    }

    pub async fn stderr(&self, id: ProcessId, chunk: impl Into<Vec<u8>>) {
        self.emit(id, ProcessOutput::Stderr(chunk.into())).await;
    }

    pub async fn exit(&self, id: ProcessId, code: Option<i32>) {
        self.lock().alive.insert(id, false);
        self.emit(id, ProcessOutput::Exited(code)).await;
    }

    async fn emit(&self, id: ProcessId, output: ProcessOutput) {
        let tx = self
            .lock()
            .senders
            .get(&id)
            .cloned()
            .unwrap_or_else(|| panic!("process {id} was never launched"));
        tx.send(SessionEvent::Process(ProcessEvent { id, output }))
            .await
            .expect("session stopped receiving events");
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl Launcher for FakeLauncher {
    fn launch(
        &mut self,
        id: ProcessId,
        role: ProcessRole,
        spec: &CommandSpec,
        events: mpsc::Sender<SessionEvent>,
    ) -> Box<dyn RunHandle> {
        let mut state = self.lock();
        state.launches.push(LaunchRecord {
            id,
            role,
            spec: spec.clone(),
        });
        state.senders.insert(id, events);
        state.alive.insert(id, true);

        Box::new(FakeHandle {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

struct FakeHandle {
    id: ProcessId,
    state: Arc<Mutex<FakeState>>,
}

impl RunHandle for FakeHandle {
    fn is_alive(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.alive.get(&self.id).copied().unwrap_or(false)
    }

    fn terminate(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.terminations.push(self.id);

        if state.exit_on_terminate && state.alive.get(&self.id).copied().unwrap_or(false) {
            state.alive.insert(self.id, false);
            if let Some(tx) = state.senders.get(&self.id) {
                let _ = tx.try_send(SessionEvent::Process(ProcessEvent {
                    id: self.id,
                    output: ProcessOutput::Exited(None),
                }));
            }
        }
    }
}
