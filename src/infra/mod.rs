//! Infrastructure adapters for durable engine state.

pub mod store;

pub use store::{FileStore, MemoryStore};
