// src/exec/process.rs

//! Production launcher backed by `tokio::process`.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::SessionEvent;
use crate::types::{ProcessId, ProcessRole};

use super::backend::{Launcher, RunHandle};
use super::{CommandSpec, ProcessEvent, ProcessOutput};

const CHUNK_SIZE: usize = 4096;

/// Spawns every process as its own Tokio task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl Launcher for TokioLauncher {
    fn launch(
        &mut self,
        id: ProcessId,
        role: ProcessRole,
        spec: &CommandSpec,
        events: mpsc::Sender<SessionEvent>,
    ) -> Box<dyn RunHandle> {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let spec = spec.clone();

        let task = tokio::spawn(async move {
            run_process(id, role, spec, events, cancel_rx).await;
            debug!(process_id = %id, %role, "process runner finished");
        });

        Box::new(ProcessHandle {
            id,
            cancel: Some(cancel_tx),
            task,
        })
    }
}

/// Handle for a process started by [`TokioLauncher`].
///
/// `cancel` asks the runner task to kill the child; the runner still
/// reports the resulting exit.
struct ProcessHandle {
    id: ProcessId,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RunHandle for ProcessHandle {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    fn terminate(&mut self) {
        if !self.is_alive() {
            debug!(process_id = %self.id, "terminate on finished process; nothing to do");
            return;
        }

        match self.cancel.take() {
            Some(cancel) => {
                if cancel.send(()).is_err() {
                    debug!(process_id = %self.id, "process finished while terminating");
                }
            }
            None => {
                debug!(process_id = %self.id, "terminate already requested");
            }
        }
    }
}

/// Run a single process to completion, forwarding its output and finally
/// its exit as `SessionEvent`s.
async fn run_process(
    id: ProcessId,
    role: ProcessRole,
    spec: CommandSpec,
    events: mpsc::Sender<SessionEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let code = match run_process_inner(id, role, &spec, &events, cancel_rx).await {
        Ok(code) => code,
        Err(err) => {
            error!(
                process_id = %id,
                %role,
                command = %spec,
                error = %format!("{err:#}"),
                "process execution error"
            );
            None
        }
    };

    let _ = events
        .send(SessionEvent::Process(ProcessEvent {
            id,
            output: ProcessOutput::Exited(code),
        }))
        .await;
}

async fn run_process_inner(
    id: ProcessId,
    role: ProcessRole,
    spec: &CommandSpec,
    events: &mpsc::Sender<SessionEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<Option<i32>> {
    info!(process_id = %id, %role, command = %spec, "starting process");

    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning '{spec}'"))?;

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_chunks(id, Stream::Stdout, stdout, events.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_chunks(id, Stream::Stderr, stderr, events.clone())));
    }

    // Either the process exits on its own, or the session asks for it to be
    // terminated (or drops the handle while shutting down).
    let status = tokio::select! {
        status = child.wait() => {
            status.with_context(|| format!("waiting for '{spec}'"))?
        }
        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => info!(process_id = %id, %role, "terminate requested; killing process"),
                Err(_) => debug!(process_id = %id, %role, "handle dropped; killing process"),
            }
            if let Err(e) = child.kill().await {
                warn!(process_id = %id, error = %e, "failed to kill process");
            }
            child
                .wait()
                .await
                .with_context(|| format!("waiting for killed '{spec}'"))?
        }
    };

    // Output must reach the session before the exit does.
    for reader in readers {
        let _ = reader.await;
    }

    let code = status.code();
    info!(
        process_id = %id,
        %role,
        exit_code = ?code,
        success = status.success(),
        "process exited"
    );

    Ok(code)
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }

    fn output(self, chunk: Vec<u8>) -> ProcessOutput {
        match self {
            Stream::Stdout => ProcessOutput::Stdout(chunk),
            Stream::Stderr => ProcessOutput::Stderr(chunk),
        }
    }
}

/// Forward a pipe in whatever chunks it delivers. Bytes are passed on as
/// soon as they are read, never held back for a delimiter.
async fn forward_chunks(
    id: ProcessId,
    stream: Stream,
    mut pipe: impl AsyncRead + Unpin,
    events: mpsc::Sender<SessionEvent>,
) {
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let event = SessionEvent::Process(ProcessEvent {
                    id,
                    output: stream.output(buf[..n].to_vec()),
                });
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(process_id = %id, stream = stream.name(), error = %e, "reading pipe failed");
                break;
            }
        }
    }

    debug!(process_id = %id, stream = stream.name(), "reader ended");
}
