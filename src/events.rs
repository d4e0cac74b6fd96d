//! Synchronous observer bus for lifecycle notifications.
//!
//! Components emit [`Event`]s; consumers register per-kind handlers with
//! [`EventBus::subscribe`]. Dispatch is synchronous and runs handlers in
//! subscription order — there is no implicit concurrency, so handlers must
//! be cheap. `unsubscribe_all` drops every handler at once.

use crate::context::FileCharacteristics;
use crate::monitor::{PhaseReport, SkipReason};
use crate::phase::{Phase, PhaseDescriptor};
use uuid::Uuid;

/// The kinds of lifecycle events a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PhaseStarted,
    ProgressUpdate,
    PhaseSkipped,
    PhaseCompleted,
    SessionStarted,
    SessionStopped,
}

/// A lifecycle notification with its payload.
#[derive(Debug, Clone)]
pub enum Event {
    PhaseStarted {
        phase: Phase,
        timeout_ms: u64,
        characteristics: FileCharacteristics,
    },
    ProgressUpdate {
        phase: Phase,
        elapsed_ms: u64,
        tested_count: u64,
        efficiency: f64,
        skip: Option<SkipReason>,
    },
    PhaseSkipped {
        phase: Phase,
        reason: SkipReason,
        report: PhaseReport,
    },
    PhaseCompleted {
        phase: Phase,
        success: bool,
        password: Option<String>,
        report: PhaseReport,
    },
    SessionStarted {
        session_id: Uuid,
        phases: Vec<PhaseDescriptor>,
    },
    SessionStopped {
        session_id: Uuid,
        duration_ms: u64,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PhaseStarted { .. } => EventKind::PhaseStarted,
            Event::ProgressUpdate { .. } => EventKind::ProgressUpdate,
            Event::PhaseSkipped { .. } => EventKind::PhaseSkipped,
            Event::PhaseCompleted { .. } => EventKind::PhaseCompleted,
            Event::SessionStarted { .. } => EventKind::SessionStarted,
            Event::SessionStopped { .. } => EventKind::SessionStopped,
        }
    }
}

/// Boxed handler invoked for every event of its subscribed kind.
pub type EventHandler = Box<dyn Fn(&Event) + Send>;

/// Per-kind subscription registry with synchronous, in-order dispatch.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(EventKind, EventHandler)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind. Handlers fire in the order
    /// they were subscribed.
    pub fn subscribe(&mut self, kind: EventKind, handler: impl Fn(&Event) + Send + 'static) {
        self.handlers.push((kind, Box::new(handler)));
    }

    /// Drop every registered handler.
    pub fn unsubscribe_all(&mut self) {
        self.handlers.clear();
    }

    /// Dispatch an event to all handlers subscribed to its kind.
    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        for (subscribed, handler) in &self.handlers {
            if *subscribed == kind {
                handler(event);
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
