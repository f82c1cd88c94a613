//! File-backed store using a JSON lines journal.
//!
//! Every write appends the new snapshot of the touched record and only then
//! installs it in memory, so a failed append leaves the store as it was.
//! Opening the store replays the journal, last write wins, so a restarted
//! engine sees exactly the state it had persisted. `compact` rewrites the
//! journal with one line per record into a sibling file and renames it over
//! the live one.
//!
//! With the `tokio-runtime` feature, writes run on the blocking pool and the
//! caller awaits them, so a storage timeout around a write can fire while the
//! disk is slow. The write itself still completes in the background.

use std::fs::{create_dir_all, rename, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::admission::{EntryStatus, QueueEntry};
use crate::core::error::{EngineError, EngineResult};
use crate::core::sla_clock::{ClockState, WorkItem};
use crate::core::store::{QueueStore, WorkItemStore};
use crate::infra::store::memory::StoreState;
use crate::util::clock::Clock;
use crate::util::types::{EntryId, QueueKey, RequesterId, WorkItemId};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Record {
    WorkItem(WorkItem),
    Entry(QueueEntry),
}

fn io_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::StorageUnavailable(e.to_string())
}

/// Journal file plus the tables replayed from it.
struct Journal {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl Journal {
    fn append(&self, record: &Record) -> EngineResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_error)?;
        let line = serde_json::to_string(record).map_err(io_error)?;
        writeln!(file, "{line}").map_err(io_error)
    }

    /// Persist a staged snapshot, then install it. `state` is the guard of
    /// `self.state`, held across both steps.
    fn commit_work_item(&self, state: &mut StoreState, item: WorkItem) -> EngineResult<WorkItem> {
        self.append(&Record::WorkItem(item.clone()))?;
        state.apply_work_item(item.clone());
        Ok(item)
    }

    fn commit_entry(&self, state: &mut StoreState, entry: QueueEntry) -> EngineResult<QueueEntry> {
        self.append(&Record::Entry(entry.clone()))?;
        state.apply_entry(entry.clone());
        Ok(entry)
    }

    fn compaction_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Durable store persisting to `<dir>/<name>.jsonl`.
pub struct FileStore {
    journal: Arc<Journal>,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Open or create the journal `name` under `dir` and replay it.
    pub fn open(
        dir: impl AsRef<Path>,
        name: impl AsRef<str>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        let dir = dir.as_ref();
        create_dir_all(dir).map_err(io_error)?;
        let path = dir.join(format!("{}.jsonl", name.as_ref()));
        let mut state = StoreState::default();
        let replayed = Self::replay(&path, &mut state)?;
        tracing::info!(path = %path.display(), records = replayed, "file store opened");
        Ok(Self {
            journal: Arc::new(Journal {
                path,
                state: Mutex::new(state),
            }),
            clock,
        })
    }

    /// Journal location.
    pub fn path(&self) -> &Path {
        &self.journal.path
    }

    fn replay(path: &Path, state: &mut StoreState) -> EngineResult<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let file = OpenOptions::new().read(true).open(path).map_err(io_error)?;
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(io_error)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line).map_err(io_error)? {
                Record::WorkItem(item) => state.apply_work_item(item),
                Record::Entry(entry) => state.apply_entry(entry),
            }
            count += 1;
        }
        Ok(count)
    }

    /// Run a journal write off the async executor.
    async fn write<T, F>(&self, op: F) -> EngineResult<T>
    where
        F: FnOnce(&Journal) -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let journal = Arc::clone(&self.journal);
        #[cfg(feature = "tokio-runtime")]
        {
            tokio::task::spawn_blocking(move || op(&journal))
                .await
                .map_err(io_error)?
        }
        #[cfg(not(feature = "tokio-runtime"))]
        {
            op(&journal)
        }
    }

    /// Rewrite the journal with the latest snapshot of every record.
    ///
    /// The compacted journal is written and synced beside the live one, then
    /// renamed over it. On failure the live journal is left untouched.
    pub fn compact(&self) -> EngineResult<()> {
        let state = self.journal.state.lock();
        let tmp = self.journal.compaction_path();
        let file = File::create(&tmp).map_err(io_error)?;
        let mut out = BufWriter::new(file);
        for item in state.work_items() {
            let line = serde_json::to_string(&Record::WorkItem(item.clone())).map_err(io_error)?;
            writeln!(out, "{line}").map_err(io_error)?;
        }
        let mut entries: Vec<&QueueEntry> = state.entries().collect();
        entries.sort_by_key(|e| e.seq);
        for entry in entries {
            let line = serde_json::to_string(&Record::Entry(entry.clone())).map_err(io_error)?;
            writeln!(out, "{line}").map_err(io_error)?;
        }
        let file = out.into_inner().map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        rename(&tmp, &self.journal.path).map_err(io_error)?;
        tracing::debug!(path = %self.journal.path.display(), "journal compacted");
        Ok(())
    }
}

#[async_trait]
impl WorkItemStore for FileStore {
    async fn insert_work_item(&self, item: WorkItem) -> EngineResult<WorkItem> {
        self.write(move |journal| {
            let mut state = journal.state.lock();
            let stored = state.stage_insert_work_item(item)?;
            journal.commit_work_item(&mut state, stored)
        })
        .await
    }

    async fn get_work_item(&self, id: &WorkItemId) -> EngineResult<Option<WorkItem>> {
        Ok(self.journal.state.lock().get_work_item(id))
    }

    async fn list_work_items(&self, state: ClockState) -> EngineResult<Vec<WorkItem>> {
        Ok(self.journal.state.lock().list_work_items(state))
    }

    async fn update_work_item(&self, item: WorkItem) -> EngineResult<WorkItem> {
        self.write(move |journal| {
            let mut state = journal.state.lock();
            let stored = state.stage_update_work_item(item)?;
            journal.commit_work_item(&mut state, stored)
        })
        .await
    }
}

#[async_trait]
impl QueueStore for FileStore {
    async fn admit_if_absent(
        &self,
        key: &QueueKey,
        requester: &RequesterId,
    ) -> EngineResult<(QueueEntry, bool)> {
        let (key, requester, now) = (key.clone(), requester.clone(), self.clock.now());
        self.write(move |journal| {
            let mut state = journal.state.lock();
            let (entry, created) = state.stage_admission(&key, &requester, now);
            if created {
                journal.commit_entry(&mut state, entry.clone())?;
            }
            Ok((entry, created))
        })
        .await
    }

    async fn get_entry(&self, id: EntryId) -> EngineResult<Option<QueueEntry>> {
        Ok(self.journal.state.lock().get_entry(id))
    }

    async fn list_entries(&self, key: &QueueKey) -> EngineResult<Vec<QueueEntry>> {
        Ok(self.journal.state.lock().list_entries(key))
    }

    async fn promote_entry(&self, id: EntryId, max_active: usize) -> EngineResult<QueueEntry> {
        self.write(move |journal| {
            let mut state = journal.state.lock();
            let entry = state.stage_promotion(id, max_active)?;
            journal.commit_entry(&mut state, entry)
        })
        .await
    }

    async fn transition_entry(
        &self,
        id: EntryId,
        expected: EntryStatus,
        next: EntryStatus,
    ) -> EngineResult<QueueEntry> {
        self.write(move |journal| {
            let mut state = journal.state.lock();
            let entry = state.stage_transition(id, expected, next)?;
            journal.commit_entry(&mut state, entry)
        })
        .await
    }
}
