// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::{Result, ScantestError};
use crate::event::RunEvent;
use crate::exec::{Launcher, ProcessEvent, ProcessOutput, RunHandle};
use crate::types::ProcessId;

use super::core::SessionCore;
use super::{CoreCommand, CoreStep, SessionEvent, SessionStatus, StartAck};

const REQUEST_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 256;

/// Requests from clients of the session.
#[derive(Debug)]
pub enum SessionRequest {
    Start {
        selector: String,
        reply: oneshot::Sender<StartAck>,
    },
    Poll {
        reply: oneshot::Sender<Vec<RunEvent>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    /// Terminate everything still running and stop the session.
    Shutdown,
}

/// Cloneable client side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
}

impl SessionHandle {
    /// Request a test run. Results arrive through [`Self::poll_updates`].
    pub async fn start_test(&self, selector: &str) -> Result<StartAck> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Start {
            selector: selector.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ScantestError::SessionClosed)
    }

    /// Take every event queued since the previous poll.
    pub async fn poll_updates(&self) -> Result<Vec<RunEvent>> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Poll { reply }).await?;
        rx.await.map_err(|_| ScantestError::SessionClosed)
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Status { reply }).await?;
        rx.await.map_err(|_| ScantestError::SessionClosed)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionRequest::Shutdown).await
    }

    async fn send(&self, request: SessionRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ScantestError::SessionClosed)
    }
}

/// Drives [`SessionCore`] in response to requests and process/timer events,
/// and delegates actual process handling to a [`Launcher`].
///
/// All state changes happen on this single task, so the event queue and the
/// live handles only ever have one writer.
pub struct SessionRuntime<L: Launcher> {
    core: SessionCore,
    launcher: L,
    handles: HashMap<ProcessId, Box<dyn RunHandle>>,
    requests: mpsc::Receiver<SessionRequest>,
    events_rx: mpsc::Receiver<SessionEvent>,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl<L: Launcher> fmt::Debug for SessionRuntime<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRuntime")
            .field("core", &self.core)
            .field("handles", &self.handles.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Spawn a session on the current Tokio runtime.
pub fn spawn_session<L>(core: SessionCore, launcher: L) -> (SessionHandle, JoinHandle<()>)
where
    L: Launcher + 'static,
{
    let (tx, rx) = mpsc::channel(REQUEST_CAPACITY);
    let runtime = SessionRuntime::new(core, rx, launcher);
    let task = tokio::spawn(runtime.run());
    (SessionHandle { tx }, task)
}

impl<L: Launcher> SessionRuntime<L> {
    pub fn new(core: SessionCore, requests: mpsc::Receiver<SessionRequest>, launcher: L) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            core,
            launcher,
            handles: HashMap::new(),
            requests,
            events_rx,
            events_tx,
        }
    }

    /// Main event loop.
    ///
    /// Process and timer events are handled before requests that arrived at
    /// the same time, so a poll sees all output delivered before it.
    pub async fn run(mut self) {
        info!("test session started");

        loop {
            tokio::select! {
                biased;

                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
                request = self.requests.recv() => {
                    match request {
                        Some(SessionRequest::Start { selector, reply }) => {
                            let (ack, step) = self.core.start_test(&selector);
                            self.execute(step);
                            let _ = reply.send(ack);
                        }
                        Some(SessionRequest::Poll { reply }) => {
                            let _ = reply.send(self.core.poll_updates());
                        }
                        Some(SessionRequest::Status { reply }) => {
                            let _ = reply.send(self.core.status());
                        }
                        Some(SessionRequest::Shutdown) => {
                            info!("shutdown requested");
                            break;
                        }
                        None => {
                            info!("all session handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        self.terminate_all();
        info!("test session stopped");
    }

    fn handle_event(&mut self, event: SessionEvent) {
        debug!(?event, "session received event");

        if let SessionEvent::Process(ProcessEvent {
            id,
            output: ProcessOutput::Exited(_),
        }) = &event
        {
            self.handles.remove(id);
        }

        let step = self.core.step(event);
        self.execute(step);
    }

    fn execute(&mut self, step: CoreStep) {
        for command in step.commands {
            match command {
                CoreCommand::Launch { id, role, spec } => {
                    let handle = self
                        .launcher
                        .launch(id, role, &spec, self.events_tx.clone());
                    self.handles.insert(id, handle);
                }
                CoreCommand::Terminate(id) => self.terminate(id),
                CoreCommand::ScheduleGraceCheck { check, delay } => {
                    let tx = self.events_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(SessionEvent::GraceElapsed(check)).await;
                    });
                }
            }
        }
    }

    fn terminate(&mut self, id: ProcessId) {
        match self.handles.get_mut(&id) {
            Some(handle) if handle.is_alive() => {
                info!(process_id = %id, "forcefully terminating process");
                handle.terminate();
            }
            _ => {
                debug!(process_id = %id, "process does not exist or already finished; not terminating");
            }
        }
    }

    fn terminate_all(&mut self) {
        for (id, handle) in self.handles.iter_mut() {
            if handle.is_alive() {
                info!(process_id = %id, "terminating process on session shutdown");
                handle.terminate();
            }
        }
        self.handles.clear();
    }
}
