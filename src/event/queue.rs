// src/event/queue.rs

use std::mem;

use tracing::debug;

use super::RunEvent;

/// Mailbox of run events awaiting pickup by the polling client.
///
/// Semantics:
/// - `push` appends at the tail; nothing else reorders or trims entries.
/// - `drain` hands back everything pushed since the previous drain (or
///   reset) and leaves the queue empty, so no event is delivered twice.
/// - There is no size bound; how often the client polls is its own concern.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<RunEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: RunEvent) {
        debug!(status = %event.status, queued = self.events.len() + 1, "queued run event");
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<RunEvent> {
        mem::take(&mut self.events)
    }

    /// Drop stale events, e.g. before a new run starts.
    pub fn reset(&mut self) {
        if !self.events.is_empty() {
            debug!(discarded = self.events.len(), "resetting event queue");
        }
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
