//! Engine events and sinks.
//!
//! Events describe state changes the orchestrator persisted. Collaborators
//! (notification delivery, dashboards) subscribe through a sink and decide
//! what to tell people; the engine never composes messages itself.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Work item opened with its initial deadline.
    ItemOpened,
    /// Work item clock paused.
    ItemPaused,
    /// Work item clock resumed and deadline shifted.
    ItemResumed,
    /// Work item resolved.
    ItemResolved,
    /// Work item passed its half-elapsed checkpoint.
    ItemHalfElapsed,
    /// Work item passed its deadline.
    ItemBreached,
    /// Requester entered a queue.
    EntryAdmitted,
    /// Entry moved to active.
    EntryPromoted,
    /// Entry served to completion.
    EntryCompleted,
    /// Entry abandoned.
    EntryAbandoned,
}

/// Engine event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Event identifier.
    pub event_id: String,
    /// Work item id or queue entry id.
    pub subject: String,
    /// Queue key for queue events.
    pub queue: Option<String>,
    /// What happened.
    pub kind: EventKind,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Additional context, JSON encoded.
    pub payload: Option<String>,
}

/// Event sink abstraction.
pub trait EventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: EngineEvent);
}

/// Bounded in-memory sink for testing and dev.
#[derive(Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<VecDeque<EngineEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink retaining at most `max_events` events.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Snapshot of retained events, oldest first.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Retained events of one kind.
    pub fn of_kind(&self, kind: EventKind) -> Vec<EngineEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: EngineEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: EngineEvent) {
        tracing::info!(
            event_id = %event.event_id,
            subject = %event.subject,
            queue = event.queue.as_deref().unwrap_or("-"),
            kind = ?event.kind,
            at = %event.at,
            "engine event"
        );
    }
}

/// Helper to build an event with a fresh id.
pub fn build_event(
    subject: impl Into<String>,
    queue: Option<String>,
    kind: EventKind,
    at: DateTime<Utc>,
    payload: Option<String>,
) -> EngineEvent {
    EngineEvent {
        event_id: Uuid::new_v4().to_string(),
        subject: subject.into(),
        queue,
        kind,
        at,
        payload,
    }
}
