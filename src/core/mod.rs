//! Core engine: business calendar, SLA clock, queue admission, orchestration.

pub mod admission;
pub mod calendar;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod sla_clock;
pub mod store;

pub use admission::{AdmissionOutcome, EntryStatus, Position, QueueAdmission, QueueEntry};
pub use calendar::BusinessCalendarPolicy;
pub use error::{AppResult, EngineError, EngineResult};
pub use events::{build_event, EngineEvent, EventKind, EventSink, InMemoryEventSink, TracingEventSink};
pub use orchestrator::{
    AssignmentOutcome, CreatedWorkItem, Orchestrator, OrchestratorSettings, TickDirection, TickReport,
};
pub use sla_clock::{
    ClockState, SlaClock, SlaStatus, Transition, WorkItem, WorkItemStatus, MAX_TARGET_MINUTES,
};
pub use store::{EngineStore, QueueStore, WorkItemStore};
