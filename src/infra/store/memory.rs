//! In-memory store with the uniqueness and compare-and-swap guarantees of
//! the storage interface.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::admission::{EntryStatus, QueueEntry};
use crate::core::error::{EngineError, EngineResult};
use crate::core::sla_clock::{ClockState, WorkItem};
use crate::core::store::{QueueStore, WorkItemStore};
use crate::util::clock::Clock;
use crate::util::types::{EntryId, QueueKey, RequesterId, WorkItemId};

/// Table state shared by the memory and file backends.
///
/// Writes are split in two: a `stage_*` call validates against the current
/// tables and returns the snapshot to store without touching them, then
/// `apply_*` installs it. Both run under the owner's lock, which makes each
/// write atomic; a backend that persists snapshots does so between the two.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    work_items: HashMap<WorkItemId, WorkItem>,
    entries: HashMap<EntryId, QueueEntry>,
    /// Uniqueness constraint: at most one open entry per (queue, requester).
    open_index: HashMap<(QueueKey, RequesterId), EntryId>,
    next_seq: u64,
}

impl StoreState {
    pub(crate) fn stage_insert_work_item(&self, item: WorkItem) -> EngineResult<WorkItem> {
        if self.work_items.contains_key(&item.id) {
            return Err(EngineError::conflict(
                format!("work item {}", item.id),
                "absent",
                "present",
            ));
        }
        Ok(WorkItem { version: 1, ..item })
    }

    pub(crate) fn get_work_item(&self, id: &WorkItemId) -> Option<WorkItem> {
        self.work_items.get(id).cloned()
    }

    pub(crate) fn list_work_items(&self, state: ClockState) -> Vec<WorkItem> {
        let mut items: Vec<WorkItem> = self
            .work_items
            .values()
            .filter(|item| item.clock_state() == state)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub(crate) fn stage_update_work_item(&self, item: WorkItem) -> EngineResult<WorkItem> {
        let Some(current) = self.work_items.get(&item.id) else {
            return Err(EngineError::NotFound(format!("work item {}", item.id)));
        };
        if current.version != item.version {
            return Err(EngineError::conflict(
                format!("work item {}", item.id),
                format!("version {}", item.version),
                format!("version {}", current.version),
            ));
        }
        Ok(WorkItem {
            version: item.version + 1,
            ..item
        })
    }

    /// Existing open entry for the pair, or a fresh queued entry to store.
    pub(crate) fn stage_admission(
        &self,
        key: &QueueKey,
        requester: &RequesterId,
        now: DateTime<Utc>,
    ) -> (QueueEntry, bool) {
        let index_key = (key.clone(), requester.clone());
        if let Some(existing) = self
            .open_index
            .get(&index_key)
            .and_then(|id| self.entries.get(id))
        {
            return (existing.clone(), false);
        }
        let entry = QueueEntry {
            id: EntryId::generate(),
            queue_key: key.clone(),
            requester: requester.clone(),
            created_at: now,
            seq: self.next_seq + 1,
            status: EntryStatus::Queued,
        };
        (entry, true)
    }

    pub(crate) fn get_entry(&self, id: EntryId) -> Option<QueueEntry> {
        self.entries.get(&id).cloned()
    }

    pub(crate) fn list_entries(&self, key: &QueueKey) -> Vec<QueueEntry> {
        let mut open: Vec<QueueEntry> = self
            .entries
            .values()
            .filter(|e| &e.queue_key == key && e.status.is_open())
            .cloned()
            .collect();
        open.sort_by_key(QueueEntry::order_key);
        open
    }

    pub(crate) fn stage_promotion(&self, id: EntryId, max_active: usize) -> EngineResult<QueueEntry> {
        let entry = self.entry(id)?;
        if entry.status != EntryStatus::Queued {
            return Err(EngineError::conflict(
                format!("queue entry {id}"),
                EntryStatus::Queued,
                entry.status,
            ));
        }
        let active = self
            .entries
            .values()
            .filter(|e| e.queue_key == entry.queue_key && e.status == EntryStatus::Active)
            .count();
        if active >= max_active {
            return Err(EngineError::conflict(
                format!("queue {}", entry.queue_key),
                format!("fewer than {max_active} active"),
                format!("{active} active"),
            ));
        }
        Ok(QueueEntry {
            status: EntryStatus::Active,
            ..entry.clone()
        })
    }

    pub(crate) fn stage_transition(
        &self,
        id: EntryId,
        expected: EntryStatus,
        next: EntryStatus,
    ) -> EngineResult<QueueEntry> {
        let entry = self.entry(id)?;
        if entry.status != expected {
            return Err(EngineError::conflict(
                format!("queue entry {id}"),
                expected,
                entry.status,
            ));
        }
        Ok(QueueEntry {
            status: next,
            ..entry.clone()
        })
    }

    fn entry(&self, id: EntryId) -> EngineResult<&QueueEntry> {
        self.entries
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(format!("queue entry {id}")))
    }

    /// Install a work item snapshot, last write wins.
    pub(crate) fn apply_work_item(&mut self, item: WorkItem) {
        self.work_items.insert(item.id.clone(), item);
    }

    /// Install an entry snapshot, last write wins. Keeps the uniqueness index
    /// and the sequence counter in step.
    pub(crate) fn apply_entry(&mut self, entry: QueueEntry) {
        let index_key = (entry.queue_key.clone(), entry.requester.clone());
        if entry.status.is_open() {
            self.open_index.insert(index_key, entry.id);
        } else if self.open_index.get(&index_key) == Some(&entry.id) {
            self.open_index.remove(&index_key);
        }
        self.next_seq = self.next_seq.max(entry.seq);
        self.entries.insert(entry.id, entry);
    }

    pub(crate) fn work_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.work_items.values()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.values()
    }
}

/// Process-local store for development and tests.
pub struct MemoryStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store stamping entries with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
        }
    }

    /// Number of queue entries ever admitted, terminal ones included.
    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }
}

#[async_trait]
impl WorkItemStore for MemoryStore {
    async fn insert_work_item(&self, item: WorkItem) -> EngineResult<WorkItem> {
        let mut state = self.state.lock();
        let stored = state.stage_insert_work_item(item)?;
        state.apply_work_item(stored.clone());
        Ok(stored)
    }

    async fn get_work_item(&self, id: &WorkItemId) -> EngineResult<Option<WorkItem>> {
        Ok(self.state.lock().get_work_item(id))
    }

    async fn list_work_items(&self, state: ClockState) -> EngineResult<Vec<WorkItem>> {
        Ok(self.state.lock().list_work_items(state))
    }

    async fn update_work_item(&self, item: WorkItem) -> EngineResult<WorkItem> {
        let mut state = self.state.lock();
        let stored = state.stage_update_work_item(item)?;
        state.apply_work_item(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn admit_if_absent(
        &self,
        key: &QueueKey,
        requester: &RequesterId,
    ) -> EngineResult<(QueueEntry, bool)> {
        let mut state = self.state.lock();
        let (entry, created) = state.stage_admission(key, requester, self.clock.now());
        if created {
            state.apply_entry(entry.clone());
        }
        Ok((entry, created))
    }

    async fn get_entry(&self, id: EntryId) -> EngineResult<Option<QueueEntry>> {
        Ok(self.state.lock().get_entry(id))
    }

    async fn list_entries(&self, key: &QueueKey) -> EngineResult<Vec<QueueEntry>> {
        Ok(self.state.lock().list_entries(key))
    }

    async fn promote_entry(&self, id: EntryId, max_active: usize) -> EngineResult<QueueEntry> {
        let mut state = self.state.lock();
        let entry = state.stage_promotion(id, max_active)?;
        state.apply_entry(entry.clone());
        Ok(entry)
    }

    async fn transition_entry(
        &self,
        id: EntryId,
        expected: EntryStatus,
        next: EntryStatus,
    ) -> EngineResult<QueueEntry> {
        let mut state = self.state.lock();
        let entry = state.stage_transition(id, expected, next)?;
        state.apply_entry(entry.clone());
        Ok(entry)
    }
}
