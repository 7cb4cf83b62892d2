//! Outward engine events.

use serde::{Deserialize, Serialize};

/// Step progress: `line` of `total` top-level commands completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub line: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// One-based line of the step in the script source.
    pub line: usize,
    pub description: String,
}

/// Outcome of a verify statement, keyed by its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEvent {
    pub source_text: String,
    pub success: bool,
    pub message: String,
}

/// Any outward event, for sinks that forward over a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Progress(Progress),
    Log(LogEntry),
    Verification(VerificationEvent),
}

/// Fire-and-forget receiver of engine events.
pub trait EventSink: Send + Sync {
    fn on_progress(&self, progress: Progress);

    fn on_log(&self, entry: LogEntry);

    fn on_verification_result(&self, event: VerificationEvent);
}
