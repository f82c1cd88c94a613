//! Storage interface consumed by the engine.
//!
//! All durable state lives behind these traits. Implementations must make
//! each method atomic: `admit_if_absent` enforces uniqueness of open entries
//! per `(queue key, requester)`, and every status or work item write is
//! conditional on the state the caller last read.

use async_trait::async_trait;

use crate::core::admission::{EntryStatus, QueueEntry};
use crate::core::error::EngineResult;
use crate::core::sla_clock::{ClockState, WorkItem};
use crate::util::types::{EntryId, QueueKey, RequesterId, WorkItemId};

/// Persistence of work item snapshots.
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// Insert a new work item. Fails with `Conflict` if the id exists.
    async fn insert_work_item(&self, item: WorkItem) -> EngineResult<WorkItem>;

    /// Fetch a work item by id.
    async fn get_work_item(&self, id: &WorkItemId) -> EngineResult<Option<WorkItem>>;

    /// All work items whose clock is in `state`.
    async fn list_work_items(&self, state: ClockState) -> EngineResult<Vec<WorkItem>>;

    /// Replace a work item if its stored version equals `item.version`.
    ///
    /// Returns the stored snapshot with the version bumped, or `Conflict`
    /// when another writer got there first.
    async fn update_work_item(&self, item: WorkItem) -> EngineResult<WorkItem>;
}

/// Persistence and atomic transitions of queue entries.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Return the open entry for `(key, requester)` with `false`, or create a
    /// queued entry stamped by the store's clock and sequence with `true`.
    async fn admit_if_absent(
        &self,
        key: &QueueKey,
        requester: &RequesterId,
    ) -> EngineResult<(QueueEntry, bool)>;

    /// Fetch an entry by id, terminal entries included.
    async fn get_entry(&self, id: EntryId) -> EngineResult<Option<QueueEntry>>;

    /// Open entries of `key` in FIFO order.
    async fn list_entries(&self, key: &QueueKey) -> EngineResult<Vec<QueueEntry>>;

    /// Atomically move a queued entry to active if its queue serves fewer
    /// than `max_active` entries; `Conflict` otherwise.
    async fn promote_entry(&self, id: EntryId, max_active: usize) -> EngineResult<QueueEntry>;

    /// Compare-and-swap an entry's status; `Conflict` if it is not `expected`.
    async fn transition_entry(
        &self,
        id: EntryId,
        expected: EntryStatus,
        next: EntryStatus,
    ) -> EngineResult<QueueEntry>;
}

/// Combined storage used by the orchestrator.
pub trait EngineStore: WorkItemStore + QueueStore {}

impl<T: WorkItemStore + QueueStore + ?Sized> EngineStore for T {}
