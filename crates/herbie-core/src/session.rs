//! Execution session.
//!
//! An [`ExecutionSession`] ties one page to its state stores, event sink,
//! configuration and verification manager. It is the entry point for
//! scripted runs, resumption and usability tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use herbie_config::Config;
use herbie_protocols::{Command, EventSink, ExecutionStore, KeywordStore, Page};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SessionError;
use crate::executor::{Executor, RunOutcome};
use crate::keywords::KeywordSet;
use crate::parser::ScriptParser;
use crate::verification::{StatementResult, VerificationManager};

pub const NOT_YET_MET_MESSAGE: &str = "Verification not yet met";

/// A usability task handed to [`ExecutionSession::start_usability_test`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsabilityTask {
    /// Generated when absent.
    #[serde(default)]
    pub task_id: Option<String>,
    pub task_name: String,
    pub tester_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Script whose verify statements are watched.
    pub script: String,
}

/// Per-statement outcome of a usability test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsabilityReport {
    pub task_id: String,
    /// ISO-8601, set when the report is produced.
    pub time: String,
    pub verify_statements: BTreeMap<String, StatementResult>,
    pub task_name: String,
    pub tester_name: String,
}

struct ActiveTest {
    task_id: String,
    task_name: String,
    tester_name: String,
    tree: Vec<Command>,
    statements: BTreeMap<String, StatementResult>,
}

impl ActiveTest {
    fn report(&self) -> UsabilityReport {
        UsabilityReport {
            task_id: self.task_id.clone(),
            time: Utc::now().to_rfc3339(),
            verify_statements: self.statements.clone(),
            task_name: self.task_name.clone(),
            tester_name: self.tester_name.clone(),
        }
    }
}

/// Engine front door for one page.
pub struct ExecutionSession {
    page: Arc<dyn Page>,
    keywords: Arc<dyn KeywordStore>,
    store: Arc<dyn ExecutionStore>,
    sink: Arc<dyn EventSink>,
    config: Config,
    parser: ScriptParser,
    manager: VerificationManager,
    test: Mutex<Option<ActiveTest>>,
}

impl ExecutionSession {
    pub fn new(
        page: Arc<dyn Page>,
        keywords: Arc<dyn KeywordStore>,
        store: Arc<dyn ExecutionStore>,
        sink: Arc<dyn EventSink>,
        config: Config,
    ) -> Self {
        let manager = VerificationManager::new(
            page.clone(),
            sink.clone(),
            config.verification.clone(),
            config.locator.clone(),
        );
        Self {
            parser: ScriptParser::from_config(&config.parser),
            page,
            keywords,
            store,
            sink,
            config,
            manager,
            test: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manager(&self) -> &VerificationManager {
        &self.manager
    }

    /// Keywords for the page's current domain.
    async fn keywords(&self) -> Result<KeywordSet, SessionError> {
        let url = match self.page.url().await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Page URL unavailable, using global keywords only");
                None
            }
        };
        Ok(KeywordSet::load(self.keywords.as_ref(), url.as_deref()).await?)
    }

    pub async fn parse_script(&self, text: &str) -> Result<Vec<Command>, SessionError> {
        let keywords = self.keywords().await?;
        Ok(self.parser.parse(text, &keywords))
    }

    /// Parse a single line as line 0. Blank input yields `None`.
    pub async fn parse_line(&self, text: &str) -> Result<Option<Command>, SessionError> {
        let keywords = self.keywords().await?;
        Ok(self.parser.parse_line(0, text, &keywords))
    }

    /// Parse `text`, persist it as the current run and execute it from
    /// `start_line`.
    pub async fn run_script(
        &self,
        text: &str,
        start_line: usize,
    ) -> Result<RunOutcome, SessionError> {
        let tree = self.parse_script(text).await?;
        self.store.set_command_tree(&tree).await?;
        self.store.clear_cursor().await?;
        self.store.set_stop_flag(false).await?;
        info!(commands = tree.len(), start_line, "Starting run");
        self.execute(start_line, &tree).await
    }

    /// Continue the persisted run after its last completed step.
    ///
    /// Returns `None` when nothing is left to run.
    pub async fn resume(&self) -> Result<Option<RunOutcome>, SessionError> {
        let tree = self.store.command_tree().await?;
        let start = self.store.cursor().await?.map_or(0, |c| c + 1);
        if start >= tree.len() {
            debug!(start, total = tree.len(), "Nothing to resume");
            return Ok(None);
        }
        info!(start, total = tree.len(), "Resuming run");
        self.execute(start, &tree).await.map(Some)
    }

    /// Ask the current run to halt before its next step.
    pub async fn stop(&self) -> Result<(), SessionError> {
        info!("Stop requested");
        Ok(self.store.set_stop_flag(true).await?)
    }

    /// Install passive observers for every verify statement in `tree`.
    pub async fn install_observers(&self, tree: &[Command]) {
        self.manager.install(tree).await;
    }

    /// Begin watching the task script's verify statements. Returns the
    /// task id.
    pub async fn start_usability_test(&self, task: UsabilityTask) -> Result<String, SessionError> {
        let tree = self.parse_script(&task.script).await?;
        let mut statements = BTreeMap::new();
        collect_sources(&tree, &mut statements);

        let task_id = task.task_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        {
            let mut slot = self.test.lock();
            if let Some(active) = slot.as_ref() {
                return Err(SessionError::TestAlreadyRunning(active.task_id.clone()));
            }
            *slot = Some(ActiveTest {
                task_id: task_id.clone(),
                task_name: task.task_name,
                tester_name: task.tester_name,
                tree: tree.clone(),
                statements,
            });
        }

        info!(task_id = %task_id, commands = tree.len(), "Usability test started");
        self.manager.reset_results();
        self.manager.install(&tree).await;
        Ok(task_id)
    }

    /// Reinstall the running test's observers, for instance after the page
    /// navigated and every element handle went stale.
    pub async fn reattach_observers(&self) -> Result<(), SessionError> {
        let tree = match self.test.lock().as_ref() {
            Some(active) => active.tree.clone(),
            None => return Err(SessionError::NoTestRunning),
        };
        debug!("Re-establishing usability observers");
        self.manager.cleanup();
        self.manager.install(&tree).await;
        Ok(())
    }

    /// Flush outstanding observers and return the final report.
    pub async fn end_usability_test(&self) -> Result<UsabilityReport, SessionError> {
        let Some(mut active) = self.test.lock().take() else {
            return Err(SessionError::NoTestRunning);
        };

        let flushed = self.manager.end_test().await;
        for (src, result) in self.manager.results() {
            active.statements.insert(src, result);
        }
        let report = active.report();
        let passed = report.verify_statements.values().filter(|r| r.success).count();
        info!(
            task_id = %report.task_id,
            passed,
            total = report.verify_statements.len(),
            flushed,
            "Usability test ended"
        );
        Ok(report)
    }

    async fn execute(&self, start: usize, tree: &[Command]) -> Result<RunOutcome, SessionError> {
        let executor = Executor::new(
            self.page.as_ref(),
            self.store.as_ref(),
            self.sink.as_ref(),
            self.config.executor.clone(),
            &self.config.locator,
        );
        let outcome = executor.execute_commands(start, tree).await?;
        debug!(?outcome, "Run finished");
        Ok(outcome)
    }
}

fn collect_sources(tree: &[Command], out: &mut BTreeMap<String, StatementResult>) {
    for cmd in tree {
        if cmd.is_verify() {
            out.insert(
                cmd.src.clone(),
                StatementResult {
                    message: NOT_YET_MET_MESSAGE.to_string(),
                    success: false,
                },
            );
        }
        collect_sources(&cmd.subcommands, out);
    }
}
