//! Per-resource FIFO admission.
//!
//! One logical queue exists per [`QueueKey`]. Entries are ordered strictly by
//! store-assigned creation instant, ties broken by the store's insertion
//! sequence. Concurrency safety comes from the store primitives: admission
//! is an insert-if-absent under a uniqueness constraint on open entries, and
//! every status change is a compare-and-swap. No operation here retries on
//! its own; conflicts go back to the caller.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, EngineResult};
use crate::core::store::QueueStore;
use crate::util::types::{EntryId, QueueKey, RequesterId};

/// Status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Waiting in line.
    Queued,
    /// Being served.
    Active,
    /// Served to completion.
    Completed,
    /// Left the queue or dropped mid-service.
    Abandoned,
}

impl EntryStatus {
    /// Queued or active.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Queued | Self::Active)
    }

    /// Completed or abandoned.
    pub const fn is_terminal(self) -> bool {
        !self.is_open()
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// A requester's place in a resource queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Entry identifier.
    pub id: EntryId,
    /// Resource this entry waits for.
    pub queue_key: QueueKey,
    /// Who is waiting.
    pub requester: RequesterId,
    /// Store-assigned creation instant.
    pub created_at: DateTime<Utc>,
    /// Store-assigned insertion sequence, the tie-breaker for equal instants.
    pub seq: u64,
    /// Current status.
    pub status: EntryStatus,
}

impl QueueEntry {
    /// FIFO ordering key.
    pub const fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.seq)
    }
}

/// Where an entry stands in its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "place")]
pub enum Position {
    /// Waiting; 1 means next in line.
    Waiting(usize),
    /// Currently being served.
    BeingServed,
    /// Completed or abandoned.
    NotQueued,
}

impl Position {
    /// Numeric place in line, 0 when the entry is not waiting.
    pub const fn as_number(self) -> usize {
        match self {
            Self::Waiting(n) => n,
            Self::BeingServed | Self::NotQueued => 0,
        }
    }
}

/// Place of `entry` among `entries` of the same queue.
///
/// Counts queued entries strictly ahead of it. Active and terminal entries
/// never count as ahead in line.
pub fn position_in(entries: &[QueueEntry], entry: &QueueEntry) -> Position {
    match entry.status {
        EntryStatus::Active => Position::BeingServed,
        EntryStatus::Completed | EntryStatus::Abandoned => Position::NotQueued,
        EntryStatus::Queued => {
            let ahead = entries
                .iter()
                .filter(|e| {
                    e.queue_key == entry.queue_key
                        && e.status == EntryStatus::Queued
                        && e.order_key() < entry.order_key()
                })
                .count();
            Position::Waiting(ahead + 1)
        }
    }
}

/// Number of entries being served among `entries`.
pub fn serving_count(entries: &[QueueEntry]) -> usize {
    entries
        .iter()
        .filter(|e| e.status == EntryStatus::Active)
        .count()
}

/// Result of an admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionOutcome {
    /// The new or already outstanding entry.
    pub entry: QueueEntry,
    /// Its position at the time of the call.
    pub position: Position,
    /// False when an outstanding entry was returned instead of a new one.
    pub created: bool,
    /// Entries of the same queue currently being served.
    pub serving: usize,
}

/// FIFO admission over a [`QueueStore`].
pub struct QueueAdmission<S: ?Sized> {
    store: Arc<S>,
    max_active: usize,
}

impl<S: ?Sized> Clone for QueueAdmission<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_active: self.max_active,
        }
    }
}

impl<S: QueueStore + ?Sized> QueueAdmission<S> {
    /// Create an admission component allowing `max_active` concurrent
    /// assignments per queue key (at least one).
    pub fn new(store: Arc<S>, max_active: usize) -> Self {
        Self {
            store,
            max_active: max_active.max(1),
        }
    }

    /// Active assignments allowed per queue key.
    pub const fn max_active(&self) -> usize {
        self.max_active
    }

    /// Enqueue `requester` unless it already has an open entry for `key`.
    pub async fn admit(
        &self,
        key: &QueueKey,
        requester: &RequesterId,
    ) -> EngineResult<AdmissionOutcome> {
        let (entry, created) = self.store.admit_if_absent(key, requester).await?;
        let open = self.store.list_entries(key).await?;
        let position = position_in(&open, &entry);
        tracing::debug!(
            queue = %key,
            entry = %entry.id,
            created,
            position = position.as_number(),
            "admission evaluated"
        );
        Ok(AdmissionOutcome {
            position,
            created,
            serving: serving_count(&open),
            entry,
        })
    }

    /// Fetch an entry.
    pub async fn entry(&self, id: EntryId) -> EngineResult<QueueEntry> {
        self.store
            .get_entry(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))
    }

    async fn entry_in(&self, key: &QueueKey, id: EntryId) -> EngineResult<QueueEntry> {
        let entry = self.entry(id).await?;
        if &entry.queue_key != key {
            return Err(EngineError::NotFound(format!("queue entry {id} in queue {key}")));
        }
        Ok(entry)
    }

    /// Current position of an entry in `key`'s queue.
    pub async fn position(&self, key: &QueueKey, id: EntryId) -> EngineResult<Position> {
        let entry = self.entry_in(key, id).await?;
        if entry.status != EntryStatus::Queued {
            return Ok(position_in(&[], &entry));
        }
        let open = self.store.list_entries(key).await?;
        Ok(position_in(&open, &entry))
    }

    /// Move a specific queued entry to active.
    ///
    /// Fails with [`EngineError::Conflict`] if the entry is no longer queued
    /// or the queue already serves `max_active` entries.
    pub async fn promote(&self, key: &QueueKey, id: EntryId) -> EngineResult<QueueEntry> {
        self.entry_in(key, id).await?;
        let entry = self.store.promote_entry(id, self.max_active).await?;
        tracing::info!(queue = %key, entry = %entry.id, requester = %entry.requester, "entry promoted");
        Ok(entry)
    }

    /// Promote the earliest queued entry if the queue has spare capacity.
    ///
    /// Returns `None` when nothing is waiting or capacity is exhausted.
    pub async fn promote_next(&self, key: &QueueKey) -> EngineResult<Option<QueueEntry>> {
        let open = self.store.list_entries(key).await?;
        if serving_count(&open) >= self.max_active {
            return Ok(None);
        }
        let Some(head) = open
            .iter()
            .filter(|e| e.status == EntryStatus::Queued)
            .min_by_key(|e| e.order_key())
        else {
            return Ok(None);
        };
        let entry = self.store.promote_entry(head.id, self.max_active).await?;
        tracing::info!(queue = %key, entry = %entry.id, requester = %entry.requester, "entry promoted");
        Ok(Some(entry))
    }

    /// Finish service of an active entry. Idempotent once terminal.
    ///
    /// The flag is `true` only for the call that performed the transition.
    pub async fn complete(&self, id: EntryId) -> EngineResult<(QueueEntry, bool)> {
        let entry = self.entry(id).await?;
        match entry.status {
            EntryStatus::Completed | EntryStatus::Abandoned => Ok((entry, false)),
            EntryStatus::Active => {
                self.finish(id, EntryStatus::Active, EntryStatus::Completed)
                    .await
            }
            EntryStatus::Queued => Err(EngineError::InvalidState(format!(
                "queue entry {id} is queued and cannot complete"
            ))),
        }
    }

    /// Remove an entry from its queue, whether waiting or mid-service.
    /// Idempotent once terminal, flagged like [`Self::complete`].
    pub async fn abandon(&self, id: EntryId) -> EngineResult<(QueueEntry, bool)> {
        let entry = self.entry(id).await?;
        if entry.status.is_terminal() {
            return Ok((entry, false));
        }
        self.finish(id, entry.status, EntryStatus::Abandoned).await
    }

    /// Move to a terminal status. Losing the race to another terminal
    /// transition is not an error; losing it to anything else is.
    async fn finish(
        &self,
        id: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    ) -> EngineResult<(QueueEntry, bool)> {
        match self.store.transition_entry(id, from, to).await {
            Ok(entry) => Ok((entry, true)),
            Err(err @ EngineError::Conflict { .. }) => {
                let current = self.entry(id).await?;
                if current.status.is_terminal() {
                    Ok((current, false))
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }
}
