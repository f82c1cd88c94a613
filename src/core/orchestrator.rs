//! Event-driven coordinator.
//!
//! The orchestrator is the only component that performs I/O. Each operation
//! loads snapshots from the store, runs the pure clock or admission logic,
//! writes the result back with a conditional update, and emits events. Every
//! storage call is bounded by the configured timeout; expiry surfaces as
//! [`EngineError::StorageUnavailable`] and is never retried here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::admission::{
    serving_count, AdmissionOutcome, EntryStatus, Position, QueueAdmission, QueueEntry,
};
use crate::core::calendar::{self, BusinessCalendarPolicy};
use crate::core::error::{EngineError, EngineResult};
use crate::core::events::{build_event, EventKind, EventSink, TracingEventSink};
use crate::core::sla_clock::{ClockState, SlaClock, SlaStatus, WorkItem};
use crate::core::store::EngineStore;
use crate::util::clock::{Clock, SystemClock};
use crate::util::types::{EntryId, QueueKey, RequesterId, WorkItemId};

/// Which daily boundary a calendar tick represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickDirection {
    /// Business hours begin: resume paused items.
    Start,
    /// Business hours end: pause running items.
    End,
}

/// How an assignment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentOutcome {
    /// Served to completion.
    Completed,
    /// Requester left or service was dropped.
    Abandoned,
}

/// Deadline information returned when a work item is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedWorkItem {
    /// Work item id.
    pub id: WorkItemId,
    /// Current deadline.
    pub deadline: DateTime<Utc>,
    /// Half-elapsed checkpoint.
    pub half_elapsed_at: DateTime<Utc>,
    /// Whether the clock starts paused (created outside business hours).
    pub paused: bool,
    /// False when the id already existed and the stored snapshot was returned.
    pub created: bool,
}

impl CreatedWorkItem {
    fn from_item(item: &WorkItem, created: bool) -> Self {
        Self {
            id: item.id.clone(),
            deadline: item.deadline,
            half_elapsed_at: item.half_elapsed_at,
            paused: item.is_paused(),
            created,
        }
    }
}

/// Summary of a calendar sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Boundary that triggered the sweep.
    pub direction: TickDirection,
    /// Items paused or resumed.
    pub transitioned: usize,
    /// Items skipped because a concurrent writer updated them first.
    pub conflicts: usize,
}

/// Runtime knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Bound on every storage call.
    pub storage_timeout: Duration,
    /// Concurrent active entries allowed per queue key.
    pub max_active_per_queue: usize,
    /// Promote the head of a queue whenever it has spare capacity.
    pub auto_promote: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(5),
            max_active_per_queue: 1,
            auto_promote: true,
        }
    }
}

/// Coordinates the SLA clock and queue admission against storage.
pub struct Orchestrator {
    store: Arc<dyn EngineStore>,
    sla: SlaClock,
    admission: QueueAdmission<dyn EngineStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// Create an orchestrator over `store` for `policy`.
    pub fn new(
        store: Arc<dyn EngineStore>,
        policy: BusinessCalendarPolicy,
        settings: OrchestratorSettings,
    ) -> Self {
        let admission = QueueAdmission::new(Arc::clone(&store), settings.max_active_per_queue);
        Self {
            store,
            sla: SlaClock::new(Arc::new(policy)),
            admission,
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingEventSink),
            settings,
        }
    }

    /// Replace the event sink.
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Replace the clock used to stamp events.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The SLA clock in use.
    pub const fn sla_clock(&self) -> &SlaClock {
        &self.sla
    }

    /// Queue admission over the same store, for position queries.
    pub const fn admission(&self) -> &QueueAdmission<dyn EngineStore> {
        &self.admission
    }

    /// Active settings.
    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        #[cfg(feature = "tokio-runtime")]
        {
            let limit = self.settings.storage_timeout;
            if let Ok(result) = tokio::time::timeout(limit, fut).await {
                result
            } else {
                let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(op, timeout_ms, "storage call timed out");
                Err(EngineError::StorageUnavailable(format!(
                    "{op} timed out after {timeout_ms}ms"
                )))
            }
        }
        #[cfg(not(feature = "tokio-runtime"))]
        {
            let _ = op;
            fut.await
        }
    }

    fn emit(&self, subject: String, queue: Option<&QueueKey>, kind: EventKind, payload: serde_json::Value) {
        let event = build_event(
            subject,
            queue.map(ToString::to_string),
            kind,
            self.clock.now(),
            Some(payload.to_string()),
        );
        self.events.record(event);
    }

    fn emit_item(&self, item: &WorkItem, kind: EventKind) {
        self.emit(
            item.id.to_string(),
            None,
            kind,
            json!({
                "deadline": item.deadline,
                "half_elapsed_at": item.half_elapsed_at,
                "paused_minutes": item.paused_minutes,
                "status": item.status,
            }),
        );
    }

    fn emit_entry(&self, entry: &QueueEntry, kind: EventKind) {
        self.emit(
            entry.id.to_string(),
            Some(&entry.queue_key),
            kind,
            json!({
                "requester": entry.requester,
                "status": entry.status,
            }),
        );
    }

    fn emit_sla_status(&self, item: &WorkItem, now: DateTime<Utc>) {
        match self.sla.status(item, now) {
            SlaStatus::OnTrack => {}
            SlaStatus::HalfElapsed => self.emit_item(item, EventKind::ItemHalfElapsed),
            SlaStatus::Breached => self.emit_item(item, EventKind::ItemBreached),
        }
    }

    /// A work item opened: compute and persist its deadline.
    ///
    /// Items created outside business hours start paused so the next
    /// business-start tick resumes them. Re-delivery of a known id returns
    /// the stored deadline.
    pub async fn on_work_item_created(
        &self,
        id: WorkItemId,
        created_at: DateTime<Utc>,
        target_minutes: i64,
    ) -> EngineResult<CreatedWorkItem> {
        if let Some(existing) = self.bounded("get_work_item", self.store.get_work_item(&id)).await? {
            tracing::debug!(item = %id, "work item already registered");
            return Ok(CreatedWorkItem::from_item(&existing, false));
        }

        let mut item = self.sla.open(id.clone(), created_at, target_minutes);
        if !calendar::is_business_instant(self.sla.policy(), created_at) {
            item = self.sla.pause(item, created_at).into_item();
        }

        let stored = match self.bounded("insert_work_item", self.store.insert_work_item(item)).await {
            Ok(stored) => stored,
            Err(EngineError::Conflict { .. }) => {
                let existing = self
                    .bounded("get_work_item", self.store.get_work_item(&id))
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("work item {id}")))?;
                return Ok(CreatedWorkItem::from_item(&existing, false));
            }
            Err(err) => return Err(err),
        };

        tracing::info!(
            item = %stored.id,
            deadline = %stored.deadline,
            half_elapsed_at = %stored.half_elapsed_at,
            paused = stored.is_paused(),
            "work item opened"
        );
        self.emit_item(&stored, EventKind::ItemOpened);
        if stored.is_paused() {
            self.emit_item(&stored, EventKind::ItemPaused);
        }
        Ok(CreatedWorkItem::from_item(&stored, true))
    }

    /// Business hours started or ended: resume or pause every eligible item.
    pub async fn on_calendar_tick(
        &self,
        direction: TickDirection,
        now: DateTime<Utc>,
    ) -> EngineResult<TickReport> {
        let state = match direction {
            TickDirection::End => ClockState::Running,
            TickDirection::Start => ClockState::Paused,
        };
        let items = self
            .bounded("list_work_items", self.store.list_work_items(state))
            .await?;

        let mut report = TickReport {
            direction,
            transitioned: 0,
            conflicts: 0,
        };
        for item in items {
            let transition = match direction {
                TickDirection::End => self.sla.pause(item, now),
                TickDirection::Start => self.sla.resume(item, now),
            };
            if !transition.is_applied() {
                continue;
            }
            match self
                .bounded("update_work_item", self.store.update_work_item(transition.into_item()))
                .await
            {
                Ok(stored) => {
                    report.transitioned += 1;
                    let kind = match direction {
                        TickDirection::End => EventKind::ItemPaused,
                        TickDirection::Start => EventKind::ItemResumed,
                    };
                    self.emit_item(&stored, kind);
                    self.emit_sla_status(&stored, now);
                }
                Err(EngineError::Conflict { entity, .. }) => {
                    tracing::debug!(%entity, "work item changed during sweep; skipped");
                    report.conflicts += 1;
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            ?direction,
            transitioned = report.transitioned,
            conflicts = report.conflicts,
            "calendar sweep finished"
        );
        Ok(report)
    }

    /// A requester asked to join `key`'s queue.
    pub async fn on_admission_requested(
        &self,
        key: QueueKey,
        requester: RequesterId,
    ) -> EngineResult<AdmissionOutcome> {
        let outcome = self
            .bounded("admit", self.admission.admit(&key, &requester))
            .await?;
        if outcome.created {
            tracing::info!(
                queue = %key,
                entry = %outcome.entry.id,
                position = outcome.position.as_number(),
                "requester admitted"
            );
            self.emit_entry(&outcome.entry, EventKind::EntryAdmitted);
        }

        if !self.settings.auto_promote || self.promote_head(&key).await?.is_none() {
            return Ok(outcome);
        }

        let entry = self
            .bounded("get_entry", self.admission.entry(outcome.entry.id))
            .await?;
        let position = self
            .bounded("position", self.admission.position(&key, entry.id))
            .await?;
        let open = self
            .bounded("list_entries", self.store.list_entries(&key))
            .await?;
        let serving = serving_count(&open);
        Ok(AdmissionOutcome {
            entry,
            position,
            serving,
            ..outcome
        })
    }

    /// An operator asked to start serving someone in `key`'s queue.
    ///
    /// With an entry id that entry is promoted, failing with
    /// [`EngineError::Conflict`] when it is no longer queued or the queue is
    /// at capacity. Without one the head of the line is promoted if there is
    /// room; `None` means nobody was.
    pub async fn on_promotion_requested(
        &self,
        key: QueueKey,
        entry_id: Option<EntryId>,
    ) -> EngineResult<Option<QueueEntry>> {
        let promoted = match entry_id {
            Some(id) => Some(
                self.bounded("promote", self.admission.promote(&key, id))
                    .await?,
            ),
            None => {
                self.bounded("promote_next", self.admission.promote_next(&key))
                    .await?
            }
        };
        if let Some(entry) = &promoted {
            self.emit_entry(entry, EventKind::EntryPromoted);
        }
        Ok(promoted)
    }

    /// An assignment finished; close the entry and hand the slot onward.
    ///
    /// Events and the onward promotion happen once, for the call that
    /// actually closed the entry.
    pub async fn on_assignment_resolved(
        &self,
        entry_id: EntryId,
        outcome: AssignmentOutcome,
    ) -> EngineResult<QueueEntry> {
        let (entry, applied) = match outcome {
            AssignmentOutcome::Completed => {
                self.bounded("complete", self.admission.complete(entry_id))
                    .await?
            }
            AssignmentOutcome::Abandoned => {
                self.bounded("abandon", self.admission.abandon(entry_id))
                    .await?
            }
        };

        if applied {
            tracing::info!(queue = %entry.queue_key, entry = %entry.id, status = %entry.status, "assignment resolved");
            let kind = match entry.status {
                EntryStatus::Completed => EventKind::EntryCompleted,
                _ => EventKind::EntryAbandoned,
            };
            self.emit_entry(&entry, kind);
            if self.settings.auto_promote {
                self.promote_head(&entry.queue_key).await?;
            }
        }
        Ok(entry)
    }

    /// A work item was picked up by an attendant.
    pub async fn on_work_item_assigned(&self, id: &WorkItemId) -> EngineResult<WorkItem> {
        let item = self.load_item(id).await?;
        let transition = self.sla.activate(item);
        if !transition.is_applied() {
            return Ok(transition.into_item());
        }
        let stored = self
            .bounded("update_work_item", self.store.update_work_item(transition.into_item()))
            .await?;
        tracing::info!(item = %stored.id, "work item assigned");
        Ok(stored)
    }

    /// A work item was resolved; its SLA bookkeeping freezes.
    pub async fn on_work_item_resolved(
        &self,
        id: &WorkItemId,
        now: DateTime<Utc>,
    ) -> EngineResult<WorkItem> {
        let item = self.load_item(id).await?;
        let transition = self.sla.resolve(item, now);
        if !transition.is_applied() {
            return Ok(transition.into_item());
        }
        let stored = self
            .bounded("update_work_item", self.store.update_work_item(transition.into_item()))
            .await?;
        tracing::info!(item = %stored.id, deadline = %stored.deadline, "work item resolved");
        self.emit_item(&stored, EventKind::ItemResolved);
        Ok(stored)
    }

    /// Current snapshot of a work item.
    pub async fn work_item(&self, id: &WorkItemId) -> EngineResult<WorkItem> {
        self.load_item(id).await
    }

    /// Current position of a queue entry.
    pub async fn position(&self, key: &QueueKey, entry_id: EntryId) -> EngineResult<Position> {
        self.bounded("position", self.admission.position(key, entry_id))
            .await
    }

    async fn load_item(&self, id: &WorkItemId) -> EngineResult<WorkItem> {
        self.bounded("get_work_item", self.store.get_work_item(id))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("work item {id}")))
    }

    async fn promote_head(&self, key: &QueueKey) -> EngineResult<Option<QueueEntry>> {
        match self
            .bounded("promote_next", self.admission.promote_next(key))
            .await
        {
            Ok(Some(entry)) => {
                self.emit_entry(&entry, EventKind::EntryPromoted);
                Ok(Some(entry))
            }
            Ok(None) => Ok(None),
            Err(EngineError::Conflict { entity, .. }) => {
                tracing::debug!(queue = %key, %entity, "head promotion lost a race");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
