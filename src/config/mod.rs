//! Configuration models for the business calendar, storage, and runtime.

pub mod engine;

pub use engine::{CalendarConfig, EngineConfig, StoreBackendConfig};
