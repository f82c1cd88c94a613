//! API surface: typed operation table and dispatcher.

pub mod api;

pub use api::{handle, health, EngineRequest, EngineResponse, Health};
