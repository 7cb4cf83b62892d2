//! Passive watchers.
//!
//! A [`Watcher`] owns one spawned task that re-evaluates a [`Probe`] each
//! time the page changes in a way the probe cares about, or on a fixed poll
//! for values that change without a DOM mutation. The task ends on the
//! first pass, when its deadline passes, or when its [`WatchHandle`] is
//! stopped.

use std::sync::Arc;
use std::time::Duration;

use herbie_protocols::{
    ElementRef, ElementState, MutationKind, MutationRecord, Page, PageError, PageTarget,
    VerificationResult, VerifyOperator, VerifyType,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::checks;

/// Attributes whose change can flip an element state.
const STATE_ATTRIBUTES: &[&str] = &["style", "class", "disabled", "checked", "hidden"];

/// Registry a watcher is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Text,
    Attribute,
    State,
    Page,
}

/// A condition a watcher re-checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Text {
        element: ElementRef,
        operator: VerifyOperator,
        expected: String,
    },
    Attribute {
        element: ElementRef,
        attribute: VerifyType,
        operator: VerifyOperator,
        expected: String,
        locator: String,
    },
    /// `element` is `None` only for a hidden check whose element was absent.
    State {
        element: Option<ElementRef>,
        state: ElementState,
    },
    Page {
        target: PageTarget,
        operator: VerifyOperator,
        expected: String,
    },
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Satisfied(VerificationResult),
    /// Not yet; carries the latest failing result.
    Unmet(VerificationResult),
    /// The condition can no longer become true.
    Gone(VerificationResult),
}

impl From<VerificationResult> for Observation {
    fn from(result: VerificationResult) -> Self {
        if result.success {
            Observation::Satisfied(result)
        } else {
            Observation::Unmet(result)
        }
    }
}

impl Probe {
    pub fn category(&self) -> Category {
        match self {
            Probe::Text { .. } => Category::Text,
            Probe::Attribute { .. } => Category::Attribute,
            Probe::State { .. } => Category::State,
            Probe::Page { .. } => Category::Page,
        }
    }

    /// Whether the probe needs a poll whatever the mutation feed reports.
    fn polls(&self) -> bool {
        match self {
            Probe::Page { .. } => true,
            Probe::Attribute { attribute, .. } => matches!(
                attribute,
                VerifyType::Value | VerifyType::Checked | VerifyType::Selected
            ),
            _ => false,
        }
    }

    /// Whether `record` may have changed the outcome.
    fn wants(&self, record: &MutationRecord) -> bool {
        match self {
            Probe::Text { .. } => true,
            Probe::Attribute {
                element, attribute, ..
            } => match record.kind {
                MutationKind::ChildList => true,
                MutationKind::Attributes => {
                    record.target == *element
                        && record.attribute_name.as_deref() == Some(attribute.as_str())
                }
                MutationKind::CharacterData => false,
            },
            Probe::State { .. } => match record.kind {
                MutationKind::ChildList => true,
                MutationKind::Attributes => record
                    .attribute_name
                    .as_deref()
                    .is_some_and(|name| STATE_ATTRIBUTES.contains(&name)),
                MutationKind::CharacterData => false,
            },
            Probe::Page { .. } => false,
        }
    }

    /// Evaluate the probe. While watching, text only counts once its
    /// element is attached and rendered.
    pub async fn observe(&self, page: &dyn Page, watching: bool) -> Observation {
        match self.evaluate(page, watching).await {
            Ok(observation) => observation,
            Err(e) => {
                debug!(error = %e, "Probe evaluation failed");
                Observation::Unmet(VerificationResult::fail(e.to_string()))
            }
        }
    }

    async fn evaluate(&self, page: &dyn Page, watching: bool) -> Result<Observation, PageError> {
        match self {
            Probe::Text {
                element,
                operator,
                expected,
            } => {
                if watching && !shown(page, *element).await? {
                    return Ok(Observation::Unmet(VerificationResult::fail(format!(
                        "Text {} \"{expected}\" is not displayed",
                        checks::spaced(*operator)
                    ))));
                }
                let actual = page.inner_text(*element).await?.trim().to_string();
                Ok(checks::compare("Text", *operator, expected, actual).into())
            }
            Probe::Attribute {
                element,
                attribute,
                operator,
                expected,
                locator,
            } => {
                if !checks::connected(page, *element).await {
                    return Ok(Observation::Gone(VerificationResult::fail(format!(
                        "Element removed from DOM during attribute verification: {locator}"
                    ))));
                }
                let actual = checks::attribute_value(page, *element, *attribute).await?;
                Ok(checks::compare(attribute.as_str(), *operator, expected, actual).into())
            }
            Probe::State { element, state } => {
                let attached = match element {
                    Some(el) if checks::connected(page, *el).await => Some(*el),
                    _ => None,
                };
                match attached {
                    Some(el) => Ok(checks::state(page, el, *state).await?.into()),
                    None if *state == ElementState::Hidden => Ok(Observation::Satisfied(
                        VerificationResult::pass(
                            "State verification passed: element is hidden (not in DOM)",
                        ),
                    )),
                    None => Ok(Observation::Unmet(VerificationResult::fail(format!(
                        "State verification failed: element is not {state} (not in DOM)"
                    )))),
                }
            }
            Probe::Page {
                target,
                operator,
                expected,
            } => {
                let actual = checks::page_value(page, *target).await?;
                let subject = format!("Page {}", target.as_str());
                Ok(checks::compare(&subject, *operator, expected, actual).into())
            }
        }
    }

    /// Failure reported when the deadline passes with `last` still unmet.
    fn timed_out(&self, last: VerificationResult, deadline: Duration) -> VerificationResult {
        let secs = deadline.as_secs();
        match self {
            Probe::Page {
                target,
                operator,
                expected,
            } => {
                let actual = last.actual_value.unwrap_or_default();
                VerificationResult::fail(format!(
                    "Page {} verification timed out after {secs} seconds. Expected {operator} \"{expected}\" but got \"{actual}\"",
                    target.as_str()
                ))
                .with_actual(actual)
            }
            _ => {
                let result =
                    VerificationResult::fail(format!("Verification timed out after {secs} seconds"));
                match last.actual_value {
                    Some(actual) => result.with_actual(actual),
                    None => result,
                }
            }
        }
    }
}

async fn shown(page: &dyn Page, el: ElementRef) -> Result<bool, PageError> {
    Ok(checks::connected(page, el).await && page.visibility(el).await?.is_rendered())
}

/// Handle to a running watch.
#[derive(Debug)]
pub struct WatchHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Cancel the watch. No callback runs after this returns.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            debug!(error = %e, "Watcher task ended abnormally");
        }
    }
}

/// Spawns watch tasks against one page.
#[derive(Clone)]
pub struct Watcher {
    page: Arc<dyn Page>,
    deadline: Duration,
    poll_interval: Duration,
}

enum Wake {
    Tick,
    Record(MutationRecord),
    Lagged,
    Closed,
}

impl Watcher {
    pub fn new(page: Arc<dyn Page>, deadline: Duration, poll_interval: Duration) -> Self {
        Self {
            page,
            deadline,
            poll_interval,
        }
    }

    /// Start watching `probe`.
    ///
    /// `on_satisfied` runs with the first passing result. `on_timeout` runs
    /// with the failure once the deadline passes or the probe reports the
    /// condition gone. At most one of them runs.
    pub fn start<S, T>(self, probe: Probe, on_satisfied: S, on_timeout: T) -> WatchHandle
    where
        S: FnOnce(VerificationResult) + Send + 'static,
        T: FnOnce(VerificationResult) + Send + 'static,
    {
        let token = CancellationToken::new();
        // Subscribe before spawning so no mutation after `start` is missed.
        let feed = self.page.mutations();
        let task = tokio::spawn(self.run(probe, feed, token.clone(), on_satisfied, on_timeout));
        WatchHandle { token, task }
    }

    async fn run<S, T>(
        self,
        probe: Probe,
        mut feed: Option<broadcast::Receiver<MutationRecord>>,
        token: CancellationToken,
        on_satisfied: S,
        on_timeout: T,
    ) where
        S: FnOnce(VerificationResult),
        T: FnOnce(VerificationResult),
    {
        let category = probe.category();
        let mut polling = probe.polls() || feed.is_none();
        debug!(?category, polling, deadline_ms = self.deadline.as_millis() as u64, "Watcher started");

        let mut ticker = tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let expiry = tokio::time::sleep(self.deadline);
        tokio::pin!(expiry);

        // The first evaluation covers changes made before the subscription.
        let mut pending_check = true;

        loop {
            if std::mem::take(&mut pending_check) {
                let observation = probe.observe(self.page.as_ref(), true).await;
                if token.is_cancelled() {
                    return;
                }
                match observation {
                    Observation::Satisfied(result) => {
                        debug!(?category, "Watcher satisfied");
                        on_satisfied(result);
                        return;
                    }
                    Observation::Gone(result) => {
                        debug!(?category, "Watched element gone");
                        on_timeout(result);
                        return;
                    }
                    Observation::Unmet(_) => {}
                }
            }

            let wake = tokio::select! {
                _ = token.cancelled() => {
                    debug!(?category, "Watcher cancelled");
                    return;
                }
                _ = &mut expiry => {
                    let last = probe.observe(self.page.as_ref(), true).await;
                    if token.is_cancelled() {
                        return;
                    }
                    debug!(?category, "Watcher deadline reached");
                    match last {
                        Observation::Satisfied(result) => on_satisfied(result),
                        Observation::Unmet(result) | Observation::Gone(result) => {
                            on_timeout(probe.timed_out(result, self.deadline))
                        }
                    }
                    return;
                }
                _ = ticker.tick(), if polling => Wake::Tick,
                wake = next_record(&mut feed) => wake,
            };

            match wake {
                Wake::Tick | Wake::Lagged => pending_check = true,
                Wake::Record(record) => pending_check = probe.wants(&record),
                Wake::Closed => {
                    feed = None;
                    polling = true;
                }
            }
        }
    }
}

async fn next_record(feed: &mut Option<broadcast::Receiver<MutationRecord>>) -> Wake {
    let Some(rx) = feed.as_mut() else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(record) => Wake::Record(record),
        Err(RecvError::Lagged(_)) => Wake::Lagged,
        Err(RecvError::Closed) => Wake::Closed,
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
