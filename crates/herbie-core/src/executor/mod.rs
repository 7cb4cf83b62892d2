//! Command executor.
//!
//! Runs a command tree step by step against a page. Progress and the
//! persisted cursor track the top-level tree only; `under` blocks run their
//! subcommands inline. Log entries carry each step's one-based script line.

mod step;

use std::time::Duration;

use herbie_config::{ExecutorConfig, LocatorConfig, OnElementNotFound};
use herbie_protocols::{Command, EventSink, ExecutionStore, LogEntry, Page, Progress};
use tracing::{info, warn};

use crate::error::{SessionError, StepFailure};
use crate::locator::Locator;
use step::script_line;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every step from the start line ran.
    Completed,
    /// The stop flag was set before step `at` ran.
    Stopped { at: usize },
    /// Step `at` failed under the abort policy.
    Aborted { at: usize, failure: StepFailure },
}

/// Result of one step, after its own logging.
#[derive(Debug)]
pub(crate) enum StepResult {
    Done,
    /// Failed or not found under the skip policy; already logged.
    Skipped,
    Failed(StepFailure),
    Stopped,
}

/// Sequential step runner for one page.
pub struct Executor<'a> {
    page: &'a dyn Page,
    store: &'a dyn ExecutionStore,
    sink: &'a dyn EventSink,
    locator: Locator<'a>,
    heading_depth: usize,
    config: ExecutorConfig,
}

impl<'a> Executor<'a> {
    pub fn new(
        page: &'a dyn Page,
        store: &'a dyn ExecutionStore,
        sink: &'a dyn EventSink,
        config: ExecutorConfig,
        locator: &LocatorConfig,
    ) -> Self {
        Self {
            page,
            store,
            sink,
            locator: Locator::from_config(page, locator),
            heading_depth: locator.heading_depth,
            config,
        }
    }

    /// Run `tree` from `start_line`.
    ///
    /// Step failures end the run under the abort policy and never surface
    /// as errors. `Err` means the state store itself failed.
    pub async fn execute_commands(
        &self,
        start_line: usize,
        tree: &[Command],
    ) -> Result<RunOutcome, SessionError> {
        let total = tree.len();
        info!(start_line, total, policy = ?self.config.on_element_not_found, "Executing commands");

        for (i, cmd) in tree.iter().enumerate().skip(start_line) {
            if self.store.stop_flag().await? {
                info!(line = i, "Stop flag set, halting");
                return Ok(RunOutcome::Stopped { at: i });
            }

            match self.step(cmd).await? {
                StepResult::Done => {
                    self.sink.on_progress(Progress { line: i + 1, total });
                    self.sink.on_log(LogEntry {
                        line: script_line(cmd),
                        description: step::performed(cmd),
                    });
                    self.store.set_cursor(i).await?;
                }
                StepResult::Skipped => self.store.set_cursor(i).await?,
                StepResult::Failed(failure) => {
                    warn!(line = i, error = %failure, "Run aborted");
                    return Ok(RunOutcome::Aborted { at: i, failure });
                }
                StepResult::Stopped => return Ok(RunOutcome::Stopped { at: i }),
            }
        }

        info!(total, "Run completed");
        Ok(RunOutcome::Completed)
    }

    /// Delay before a step's action: its timeout, or the configured default.
    fn delay_for(&self, cmd: &Command) -> Duration {
        let ms = if cmd.timeout > 0 {
            cmd.timeout
        } else {
            self.config.default_delay_ms
        };
        Duration::from_millis(ms)
    }

    fn skips(&self) -> bool {
        self.config.on_element_not_found == OnElementNotFound::Skip
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
