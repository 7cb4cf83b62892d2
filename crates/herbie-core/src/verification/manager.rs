//! Passive verification manager.
//!
//! Installs one watcher per verify statement of a command tree, reports
//! each outcome to the [`EventSink`] exactly once, and flushes whatever is
//! still outstanding when the test ends.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use herbie_config::{LocatorConfig, VerificationConfig};
use herbie_protocols::{
    Command, CommandError, ElementState, EventSink, Page, Verification, VerificationEvent,
    VerificationResult, VerifyType,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::watcher::{Category, Observation, Probe, WatchHandle, Watcher};
use crate::locator::Locator;

pub const INCOMPLETE_MESSAGE: &str =
    "Verification incomplete: test ended before verification completed";

/// Lifecycle of one installed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    Pending,
    Active,
    Complete,
    Failed,
}

/// Latest outcome of a statement, as shown in a usability report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementResult {
    pub message: String,
    pub success: bool,
}

struct Entry {
    src: String,
    status: SetupStatus,
    /// Set once the statement is being watched.
    probe: Option<Probe>,
}

#[derive(Default)]
struct Registries {
    text: Vec<WatchHandle>,
    attribute: Vec<WatchHandle>,
    state: Vec<WatchHandle>,
    page: Vec<WatchHandle>,
}

impl Registries {
    fn slot(&mut self, category: Category) -> &mut Vec<WatchHandle> {
        match category {
            Category::Text => &mut self.text,
            Category::Attribute => &mut self.attribute,
            Category::State => &mut self.state,
            Category::Page => &mut self.page,
        }
    }

    fn drain(&mut self) -> Vec<WatchHandle> {
        let mut all = Vec::new();
        all.append(&mut self.text);
        all.append(&mut self.attribute);
        all.append(&mut self.state);
        all.append(&mut self.page);
        all
    }

    fn running(&self) -> usize {
        [&self.text, &self.attribute, &self.state, &self.page]
            .iter()
            .flat_map(|slot| slot.iter())
            .filter(|h| !h.is_finished())
            .count()
    }
}

struct Inner {
    page: Arc<dyn Page>,
    sink: Arc<dyn EventSink>,
    config: VerificationConfig,
    locator: LocatorConfig,
    entries: Mutex<HashMap<String, Entry>>,
    registries: Mutex<Registries>,
    results: Mutex<BTreeMap<String, StatementResult>>,
}

impl Inner {
    /// Move `key` to its final status and report, unless something else
    /// already settled it. Returns whether this call reported.
    fn settle(&self, key: &str, result: VerificationResult) -> bool {
        let src = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            if matches!(entry.status, SetupStatus::Complete | SetupStatus::Failed) {
                return false;
            }
            entry.status = if result.success {
                SetupStatus::Complete
            } else {
                SetupStatus::Failed
            };
            entry.src.clone()
        };
        self.report(&src, result);
        true
    }

    fn report(&self, src: &str, result: VerificationResult) {
        if result.success {
            info!(src, message = %result.message, "Verification passed");
        } else {
            warn!(src, message = %result.message, "Verification failed");
        }

        {
            let mut results = self.results.lock();
            let keep_success = results.get(src).is_some_and(|r| r.success) && !result.success;
            if !keep_success {
                results.insert(
                    src.to_string(),
                    StatementResult {
                        message: result.message.clone(),
                        success: result.success,
                    },
                );
            }
        }

        self.sink.on_verification_result(VerificationEvent {
            source_text: src.to_string(),
            success: result.success,
            message: result.message,
        });
    }
}

/// Passive verification for one page.
#[derive(Clone)]
pub struct VerificationManager {
    inner: Arc<Inner>,
}

impl VerificationManager {
    pub fn new(
        page: Arc<dyn Page>,
        sink: Arc<dyn EventSink>,
        config: VerificationConfig,
        locator: LocatorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                page,
                sink,
                config,
                locator,
                entries: Mutex::new(HashMap::new()),
                registries: Mutex::new(Registries::default()),
                results: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Install every verify statement in `tree`, nested ones included.
    ///
    /// Setups run concurrently. A statement already installed under the
    /// same `type:src` key is skipped.
    pub async fn install(&self, tree: &[Command]) {
        let mut verifies = Vec::new();
        collect_verifies(tree, &mut verifies);

        let setups: Vec<_> = verifies
            .into_iter()
            .filter_map(|cmd| self.claim(cmd).map(|key| self.setup(key, cmd)))
            .collect();
        let count = setups.len();
        join_all(setups).await;
        debug!(count, watching = self.active_watchers(), "Verification observers installed");
    }

    /// Status of the statement installed for `cmd`.
    pub fn status(&self, cmd: &Command) -> Option<SetupStatus> {
        let key = dedup_key(cmd)?;
        self.inner.entries.lock().get(&key).map(|e| e.status)
    }

    pub fn active_watchers(&self) -> usize {
        self.inner.registries.lock().running()
    }

    /// Latest outcome per statement source. A success is never replaced
    /// by a later failure.
    pub fn results(&self) -> BTreeMap<String, StatementResult> {
        self.inner.results.lock().clone()
    }

    /// End the test. Watchers are stopped, each watched statement gets one
    /// last evaluation, and whatever is still unresolved is reported as
    /// [`INCOMPLETE_MESSAGE`]. Returns how many were reported incomplete.
    pub async fn end_test(&self) -> usize {
        for handle in self.inner.registries.lock().drain() {
            handle.stop();
        }

        let mut outstanding: Vec<(String, Option<Probe>)> = self
            .inner
            .entries
            .lock()
            .iter()
            .filter(|(_, e)| matches!(e.status, SetupStatus::Pending | SetupStatus::Active))
            .map(|(key, e)| (key.clone(), e.probe.clone()))
            .collect();
        outstanding.sort_by(|a, b| a.0.cmp(&b.0));

        let mut incomplete = 0;
        for (key, probe) in outstanding {
            let last = match probe {
                Some(probe) => Some(probe.observe(self.inner.page.as_ref(), true).await),
                None => None,
            };
            let reported = match last {
                Some(Observation::Satisfied(result)) => {
                    self.inner.settle(&key, result);
                    false
                }
                _ => self
                    .inner
                    .settle(&key, VerificationResult::fail(INCOMPLETE_MESSAGE)),
            };
            if reported {
                incomplete += 1;
            }
        }

        self.cleanup();
        incomplete
    }

    /// Cancel every watcher and forget installed statements.
    pub fn cleanup(&self) {
        let handles = self.inner.registries.lock().drain();
        let cancelled = handles.len();
        for handle in &handles {
            handle.stop();
        }
        self.inner.entries.lock().clear();
        debug!(cancelled, "Verification resources cleaned up");
    }

    /// Forget recorded results.
    pub fn reset_results(&self) {
        self.inner.results.lock().clear();
    }

    fn claim(&self, cmd: &Command) -> Option<String> {
        let Some(key) = dedup_key(cmd) else {
            debug!(line = cmd.line, "Skipping verify without type or source");
            return None;
        };
        let mut entries = self.inner.entries.lock();
        if entries.contains_key(&key) {
            debug!(key = %key, "Duplicate verification skipped");
            return None;
        }
        entries.insert(
            key.clone(),
            Entry {
                src: cmd.src.clone(),
                status: SetupStatus::Pending,
                probe: None,
            },
        );
        Some(key)
    }

    async fn setup(&self, key: String, cmd: &Command) {
        let verification = match validate(cmd) {
            Ok(v) => v,
            Err(message) => {
                self.inner.settle(&key, VerificationResult::fail(message));
                return;
            }
        };

        let probe = match self.probe_for(verification).await {
            Ok(probe) => probe,
            Err(failure) => {
                self.inner.settle(&key, failure);
                return;
            }
        };

        match probe.observe(self.inner.page.as_ref(), false).await {
            Observation::Satisfied(result) | Observation::Gone(result) => {
                self.inner.settle(&key, result);
            }
            Observation::Unmet(_) => self.watch(key, probe),
        }
    }

    /// Resolve the element a verification needs and build its probe.
    async fn probe_for(&self, verification: Verification) -> Result<Probe, VerificationResult> {
        let locator = Locator::from_config(self.inner.page.as_ref(), &self.inner.locator);
        let not_found =
            |loc: &str| VerificationResult::fail(format!("Element not found for verification: {loc}"));

        match verification {
            Verification::Page {
                target,
                operator,
                expected,
            } => Ok(Probe::Page {
                target,
                operator,
                expected,
            }),
            Verification::State {
                state: ElementState::Hidden,
                locator: loc,
            } => {
                let element = match loc {
                    Some(loc) => locator.find_element(&loc).await,
                    None => None,
                };
                Ok(Probe::State {
                    element,
                    state: ElementState::Hidden,
                })
            }
            Verification::State { state, locator: loc } => {
                let loc = loc.unwrap_or_default();
                match locator.find_element(&loc).await {
                    Some(el) => Ok(Probe::State {
                        element: Some(el),
                        state,
                    }),
                    None => Err(not_found(&loc)),
                }
            }
            Verification::Text {
                operator,
                expected,
                locator: loc,
            } => {
                let loc = loc.unwrap_or_default();
                match locator.find_element(&loc).await {
                    Some(element) => Ok(Probe::Text {
                        element,
                        operator,
                        expected,
                    }),
                    None => Err(not_found(&loc)),
                }
            }
            Verification::Attribute {
                attribute,
                operator,
                expected,
                locator: loc,
            } => {
                let Some(loc) = loc else {
                    return Err(VerificationResult::fail(
                        "Invalid attribute verification data: missing required properties",
                    ));
                };
                match locator.find_element(&loc).await {
                    Some(element) => Ok(Probe::Attribute {
                        element,
                        attribute,
                        operator,
                        expected,
                        locator: loc,
                    }),
                    None => Err(not_found(&loc)),
                }
            }
        }
    }

    fn watch(&self, key: String, probe: Probe) {
        {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(&key) {
                Some(entry) if entry.status == SetupStatus::Pending => {
                    entry.status = SetupStatus::Active;
                    entry.probe = Some(probe.clone());
                }
                // Settled or torn down while the element was being located.
                _ => return,
            }
        }

        let config = &self.inner.config;
        let deadline = match probe.category() {
            Category::Page => config.page_timeout_ms,
            _ => config.timeout_ms,
        };
        let watcher = Watcher::new(
            Arc::clone(&self.inner.page),
            Duration::from_millis(deadline),
            Duration::from_millis(config.poll_interval_ms),
        );

        let category = probe.category();
        let (ok_inner, ok_key) = (Arc::clone(&self.inner), key.clone());
        let (fail_inner, fail_key) = (Arc::clone(&self.inner), key);
        let handle = watcher.start(
            probe,
            move |result| {
                ok_inner.settle(&ok_key, result);
            },
            move |result| {
                fail_inner.settle(&fail_key, result);
            },
        );
        self.inner.registries.lock().slot(category).push(handle);
    }
}

fn collect_verifies<'a>(commands: &'a [Command], out: &mut Vec<&'a Command>) {
    for cmd in commands {
        if cmd.is_verify() {
            out.push(cmd);
        }
        collect_verifies(&cmd.subcommands, out);
    }
}

fn dedup_key(cmd: &Command) -> Option<String> {
    let verify_type = cmd.verify_type?;
    if cmd.src.is_empty() {
        return None;
    }
    Some(format!("{verify_type}:{}", cmd.src))
}

/// Decode a verify command, enforcing the fields passive checks rely on.
fn validate(cmd: &Command) -> Result<Verification, String> {
    const INVALID: &str = "Invalid verification data";

    let verification = cmd.verification().map_err(|e| match e {
        CommandError::UnknownOperator(_) => e.to_string(),
        _ => INVALID.to_string(),
    })?;

    let needs_locator = match &verification {
        Verification::State { state, .. } => *state != ElementState::Hidden,
        Verification::Text { .. } => true,
        Verification::Attribute { attribute, .. } => {
            matches!(attribute, VerifyType::Value | VerifyType::Placeholder)
        }
        Verification::Page { .. } => false,
    };
    if needs_locator && verification.locator().is_none_or(str::is_empty) {
        return Err(INVALID.to_string());
    }
    Ok(verification)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
