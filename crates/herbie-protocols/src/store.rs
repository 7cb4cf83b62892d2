//! Persisted state protocol definitions.
//!
//! The engine treats keyword tables, the execution cursor, the stop flag and
//! the command tree as external key-value state. It reads them fresh at step
//! boundaries so a run can resume after the page (and all in-memory state)
//! is torn down.

use async_trait::async_trait;

use crate::command::Command;
use crate::error::StoreError;
use crate::keyword::Keyword;

/// Source of keyword aliases.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Keywords that apply on every domain.
    async fn global_keywords(&self) -> Result<Vec<Keyword>, StoreError>;

    /// Keywords scoped to a registrable domain such as `example.com`.
    async fn local_keywords(&self, domain: &str) -> Result<Vec<Keyword>, StoreError>;
}

/// Execution cursor, stop flag and command tree.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Index of the last completed top-level step.
    async fn cursor(&self) -> Result<Option<usize>, StoreError>;

    async fn set_cursor(&self, line: usize) -> Result<(), StoreError>;

    async fn clear_cursor(&self) -> Result<(), StoreError>;

    async fn stop_flag(&self) -> Result<bool, StoreError>;

    async fn set_stop_flag(&self, stop: bool) -> Result<(), StoreError>;

    async fn command_tree(&self) -> Result<Vec<Command>, StoreError>;

    async fn set_command_tree(&self, tree: &[Command]) -> Result<(), StoreError>;
}
