//! # Prometheus SLA Engine
//!
//! Business-hours-aware SLA deadlines and fair attendant queue admission for
//! customer support workloads.
//!
//! Support work items carry a resolution target measured in business time.
//! The engine computes the deadline for each item against a configurable
//! business calendar, pauses the clock when business hours end, and resumes
//! it (shifting the deadline) when they start again. Alongside it, requesters
//! asking for a live attendant are admitted into per-key FIFO queues with at
//! most one open entry per requester and a bounded number of active
//! assignments.
//!
//! ## Layout
//!
//! - [`core::calendar`]: pure business-calendar arithmetic over a timezone.
//! - [`core::sla_clock`]: deadline state machine (`open`, `pause`, `resume`, `resolve`).
//! - [`core::admission`]: queue entries, positions and atomic admission.
//! - [`core::orchestrator`]: the event-driven coordinator; the only place that
//!   talks to storage, with every call bounded by a timeout.
//! - [`infra::store`]: in-memory and JSON-lines journal backends.
//! - [`runtime::api`]: typed request/response table for transports.
//!
//! ```rust,ignore
//! use prometheus_sla_engine::builders::EngineBuilder;
//! use prometheus_sla_engine::config::EngineConfig;
//! use prometheus_sla_engine::util::{QueueKey, RequesterId, WorkItemId};
//!
//! let engine = EngineBuilder::new(EngineConfig::from_env()?).build()?;
//!
//! let created = engine
//!     .on_work_item_created(WorkItemId::new("ticket-42"), chrono::Utc::now(), 240)
//!     .await?;
//! println!("due {}", created.deadline);
//!
//! let admitted = engine
//!     .on_admission_requested(QueueKey::new("billing"), RequesterId::new("+5511999990000"))
//!     .await?;
//! println!("you are number {}", admitted.position.as_number());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Calendar, SLA clock, queue admission, storage traits and orchestration.
pub mod core;
/// Configuration models for the calendar, storage backend and timeouts.
pub mod config;
/// Builders to assemble the engine from configuration.
pub mod builders;
/// Storage backends.
pub mod infra;
/// API surface for transports.
pub mod runtime;
/// Shared identifiers, clocks and telemetry.
pub mod util;
