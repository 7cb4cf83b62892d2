//! # Herbie Protocols
//!
//! Shared data model and protocol definitions (traits) for the Herbie
//! scripting engine. Contains only types and interfaces - no engine logic.
//!
//! ## Core Traits
//!
//! - [`Page`] - A browser page the engine drives through element handles
//! - [`KeywordStore`] - Source of global and per-domain keyword aliases
//! - [`ExecutionStore`] - Persisted cursor, stop flag and command tree
//! - [`EventSink`] - Receiver of progress, log and verification events

pub mod command;
pub mod error;
pub mod event;
pub mod keyword;
pub mod page;
pub mod store;
pub mod verification;

pub use command::{
    count_nodes, Action, Command, ElementState, PageTarget, Verification, VerifyOperator,
    VerifyType,
};
pub use error::{CommandError, PageError, StoreError};
pub use event::{EngineEvent, EventSink, LogEntry, Progress, VerificationEvent};
pub use keyword::Keyword;
pub use page::{
    DomEvent, ElementRef, EventKind, EventTarget, MutationKind, MutationRecord, Page,
    PropertyValue, VisibilityInfo,
};
pub use store::{ExecutionStore, KeywordStore};
pub use verification::VerificationResult;
