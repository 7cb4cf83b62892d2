//! Single-step dispatch.

use std::time::Duration;

use herbie_protocols::command::unquote;
use herbie_protocols::{
    Action, Command, ElementRef, ElementState, EventTarget, LogEntry, Verification,
    VerificationEvent, VerificationResult,
};
use tracing::{debug, info, warn};

use super::{Executor, StepResult};
use crate::actions;
use crate::error::{SessionError, StepFailure};
use crate::locator::Locator;
use crate::verification::immediate;

/// `Performed '<action>' on '<target>'`
pub(crate) fn performed(cmd: &Command) -> String {
    format!("Performed '{}' on '{}'", verb(cmd), target(cmd))
}

/// One-based script line carried by log entries.
pub(crate) fn script_line(cmd: &Command) -> usize {
    cmd.line + 1
}

fn verb(cmd: &Command) -> &str {
    cmd.verb().unwrap_or("noop")
}

/// The locator operand, or the first operand for steps without one.
fn target(cmd: &Command) -> String {
    cmd.locator()
        .or_else(|| cmd.code.get(1).map(|t| unquote(t).to_string()))
        .unwrap_or_default()
}

impl Executor<'_> {
    pub(super) async fn step(&self, cmd: &Command) -> Result<StepResult, SessionError> {
        let action = match cmd.action() {
            Ok(action) => action,
            Err(e) => return Ok(self.fail(cmd, e.into())),
        };
        debug!(line = cmd.line, action = action.name(), "Running step");

        let outcome = match &action {
            Action::Noop => Ok(()),
            Action::Under { .. } => return self.block(cmd).await,
            Action::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            Action::Navigate { url } => {
                tokio::time::sleep(self.delay_for(cmd)).await;
                actions::navigate(self.page, url).await.map_err(StepFailure::from)
            }
            Action::Press { key, locator: None } => {
                tokio::time::sleep(self.delay_for(cmd)).await;
                actions::press(self.page, EventTarget::Document, key)
                    .await
                    .map_err(StepFailure::from)
            }
            Action::Verify(verification) => {
                self.verify(cmd, verification).await;
                Ok(())
            }
            Action::Unsupported { verb } => Err(StepFailure::Unsupported(verb.clone())),
            Action::Click { locator }
            | Action::Type { locator, .. }
            | Action::Select { locator, .. }
            | Action::Mouseover { locator }
            | Action::Press {
                locator: Some(locator),
                ..
            } => {
                let Some(el) = self.resolve(cmd, locator).await else {
                    return Ok(self.not_found(cmd, locator));
                };
                tokio::time::sleep(self.delay_for(cmd)).await;
                self.perform(&action, el).await
            }
        };

        Ok(match outcome {
            Ok(()) => StepResult::Done,
            Err(failure) => self.fail(cmd, failure),
        })
    }

    async fn perform(&self, action: &Action, el: ElementRef) -> Result<(), StepFailure> {
        let page = self.page;
        let result = match action {
            Action::Click { .. } => actions::click(page, el).await,
            Action::Type { value, .. } => actions::type_text(page, el, value).await,
            Action::Select { value, .. } => actions::select(page, el, value).await,
            Action::Mouseover { .. } => actions::mouseover(page, el).await,
            Action::Press { key, .. } => actions::press(page, EventTarget::Element(el), key).await,
            _ => Ok(()),
        };
        result.map_err(StepFailure::from)
    }

    /// Run an `under` block's subcommands in order.
    async fn block(&self, cmd: &Command) -> Result<StepResult, SessionError> {
        for sub in &cmd.subcommands {
            if self.store.stop_flag().await? {
                info!(line = sub.line, "Stop flag set inside block");
                return Ok(StepResult::Stopped);
            }
            match Box::pin(self.step(sub)).await? {
                StepResult::Done => self.sink.on_log(LogEntry {
                    line: script_line(sub),
                    description: performed(sub),
                }),
                StepResult::Skipped => {}
                other => return Ok(other),
            }
        }
        Ok(StepResult::Done)
    }

    /// Locate a step's element. Under the skip policy this polls single
    /// attempts until the command's timeout is spent.
    async fn resolve(&self, cmd: &Command, locator: &str) -> Option<ElementRef> {
        if !self.skips() {
            return self.lookup(&self.locator, cmd, locator).await;
        }

        let single = self.locator.single_attempt();
        let poll = self.config.skip_poll_ms.max(1);
        let mut remaining = cmd.timeout;
        loop {
            if let Some(el) = self.lookup(&single, cmd, locator).await {
                return Some(el);
            }
            if remaining == 0 {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(poll)).await;
            remaining = remaining.saturating_sub(poll);
        }
    }

    async fn lookup(&self, locator: &Locator<'_>, cmd: &Command, target: &str) -> Option<ElementRef> {
        if let Some(heading) = cmd.header.as_deref() {
            let found = locator
                .find_through_heading(heading, target, self.heading_depth)
                .await;
            if found.is_some() {
                return found;
            }
            debug!(heading, target, "Nothing under heading, trying the whole page");
        }
        match locator.find_element(target).await {
            Some(el) => Some(el),
            None => locator.find_desc(target).await,
        }
    }

    async fn verify(&self, cmd: &Command, verification: &Verification) {
        let element = match verification {
            Verification::Page { .. } => None,
            _ => match verification.locator() {
                Some(loc) => match self.lookup(&self.locator, cmd, loc).await {
                    Some(el) => Some(el),
                    None => {
                        let result = if matches!(
                            verification,
                            Verification::State {
                                state: ElementState::Hidden,
                                ..
                            }
                        ) {
                            VerificationResult::pass(
                                "State verification passed: element is hidden (not in DOM)",
                            )
                        } else {
                            VerificationResult::fail(format!(
                                "Element not found for verification: {loc}"
                            ))
                        };
                        self.report(cmd, result);
                        return;
                    }
                },
                None => self.page.query_selector("body").await.ok().flatten(),
            },
        };

        tokio::time::sleep(self.delay_for(cmd)).await;
        let result = immediate::verify(self.page, verification, element).await;
        self.report(cmd, result);
    }

    fn report(&self, cmd: &Command, result: VerificationResult) {
        let mark = if result.success {
            info!(line = cmd.line, message = %result.message, "Verification passed");
            "✅"
        } else {
            warn!(line = cmd.line, message = %result.message, "Verification failed");
            "❌"
        };
        self.sink.on_log(LogEntry {
            line: script_line(cmd),
            description: format!("{mark} {}", result.message),
        });
        self.sink.on_verification_result(VerificationEvent {
            source_text: cmd.src.clone(),
            success: result.success,
            message: result.message,
        });
    }

    fn not_found(&self, cmd: &Command, locator: &str) -> StepResult {
        if self.skips() {
            warn!(line = cmd.line, locator, "Element not found, skipping step");
            self.sink.on_log(LogEntry {
                line: script_line(cmd),
                description: format!("cannot find tag '{locator}'"),
            });
            return StepResult::Skipped;
        }
        self.fail(cmd, StepFailure::ElementNotFound(locator.to_string()))
    }

    fn fail(&self, cmd: &Command, failure: StepFailure) -> StepResult {
        warn!(line = cmd.line, src = %cmd.src, error = %failure, "Step failed");
        self.sink.on_log(LogEntry {
            line: script_line(cmd),
            description: format!(
                "❌ Error: '{}' on '{}' failed - {failure}",
                verb(cmd),
                target(cmd)
            ),
        });
        if self.skips() {
            StepResult::Skipped
        } else {
            StepResult::Failed(failure)
        }
    }
}
