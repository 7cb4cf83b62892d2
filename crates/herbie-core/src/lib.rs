//! # Herbie Core
//!
//! Scripting engine for browser automation.
//!
//! ## Components
//!
//! - [`ScriptParser`] - Indented pseudo-English to a command tree
//! - [`keywords`] - Keyword alias resolution per registrable domain
//! - [`Locator`] - Heuristic element lookup with retries
//! - [`Executor`] - Sequential step runner with a persisted cursor
//! - [`verification`] - Immediate checks and passive watchers
//! - [`ExecutionSession`] - Owns the page, stores, sink and config
//!
//! Everything talks to the browser through [`herbie_protocols::Page`].

pub mod actions;
pub mod error;
pub mod executor;
pub mod keywords;
pub mod locator;
pub mod parser;
pub mod session;
pub mod sinks;
pub mod verification;

pub use error::{SessionError, StepFailure};
pub use executor::{Executor, RunOutcome};
pub use keywords::{domain_for_url, registrable_domain, resolve_keywords, KeywordSet};
pub use locator::Locator;
pub use parser::ScriptParser;
pub use session::{ExecutionSession, UsabilityReport, UsabilityTask, NOT_YET_MET_MESSAGE};
pub use sinks::{ChannelSink, RecordingSink, TracingSink};
pub use verification::{SetupStatus, StatementResult, VerificationManager};
