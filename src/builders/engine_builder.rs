//! Builder assembling an [`Orchestrator`] from [`EngineConfig`].

use std::sync::Arc;

use crate::config::{EngineConfig, StoreBackendConfig};
use crate::core::{EngineError, EngineStore, EventSink, Orchestrator, TracingEventSink};
use crate::infra::store::{FileStore, MemoryStore};
use crate::util::clock::{Clock, SystemClock};

/// Assembles the engine: validates the policy, opens the configured store,
/// and wires clock and event sink.
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    store: Option<Arc<dyn EngineStore>>,
}

impl EngineBuilder {
    /// Start from a configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingEventSink),
            store: None,
        }
    }

    /// Configuration being built.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clock stamping queue entries and events.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Event sink receiving engine events.
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Use an externally provided store instead of the configured backend.
    pub fn with_store(mut self, store: Arc<dyn EngineStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the orchestrator.
    ///
    /// Fails fast with [`EngineError::PolicyMisconfigured`] for an unusable
    /// calendar or settings, and with [`EngineError::StorageUnavailable`] if
    /// the configured store cannot be opened.
    pub fn build(self) -> Result<Orchestrator, EngineError> {
        let policy = self.config.calendar.to_policy()?;
        self.config
            .validate()
            .map_err(|e| EngineError::PolicyMisconfigured(format!("config invalid: {e}")))?;

        let store: Arc<dyn EngineStore> = match self.store {
            Some(store) => store,
            None => match &self.config.store {
                StoreBackendConfig::InMemory => Arc::new(MemoryStore::new(Arc::clone(&self.clock))),
                StoreBackendConfig::File { dir, name } => {
                    Arc::new(FileStore::open(dir, name, Arc::clone(&self.clock))?)
                }
            },
        };

        tracing::info!(
            calendar = %policy,
            store = ?self.config.store,
            max_active_per_queue = self.config.max_active_per_queue,
            auto_promote = self.config.auto_promote,
            "engine assembled"
        );

        Ok(Orchestrator::new(store, policy, self.config.settings())
            .with_clock(self.clock)
            .with_event_sink(self.events))
    }
}
