//! # Herbie Checkpoint
//!
//! Persisted state for resumable script runs.
//!
//! ## Features
//!
//! - Execution cursor saved after every completed step
//! - Cooperative stop flag readable across processes
//! - Global and per-domain keyword tables

pub mod state;
pub mod store;

pub use state::{KeywordTables, PersistedState};
pub use store::{FileStateStore, MemoryStateStore};
