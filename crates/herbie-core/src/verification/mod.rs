//! Verification subsystem.
//!
//! Scripted runs evaluate a verify statement once through [`immediate`].
//! Usability tests hand the whole command tree to a
//! [`VerificationManager`], which checks each statement once and then keeps
//! a [`Watcher`] on the page until the statement holds, its deadline
//! passes or the test ends.

mod checks;
pub mod immediate;
mod manager;
mod watcher;

pub use manager::{SetupStatus, StatementResult, VerificationManager, INCOMPLETE_MESSAGE};
pub use watcher::{Category, Observation, Probe, WatchHandle, Watcher};
