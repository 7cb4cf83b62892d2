//! End-to-end tests: whole scripts through an [`ExecutionSession`] against
//! the in-memory page.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use herbie_checkpoint::{FileStateStore, KeywordTables, MemoryStateStore};
use herbie_config::{Config, OnElementNotFound};
use herbie_core::verification::INCOMPLETE_MESSAGE;
use herbie_core::{
    ExecutionSession, RecordingSink, RunOutcome, SessionError, StatementResult, StepFailure,
    UsabilityTask, NOT_YET_MET_MESSAGE,
};
use herbie_page_memory::MemoryPage;
use herbie_protocols::{EventKind, EventTarget, ExecutionStore, Keyword, Page, PropertyValue};

// ============================================================================
// Test Helpers
// ============================================================================

const SHOP: &str = r#"
<form id="checkout">
  <label for="fname">firstname:</label>
  <input id="fname">
  <button id="submit">Submit</button>
</form>
<div id="spinner">Loading</div>
<div id="result"></div>
"#;

fn shop_page() -> MemoryPage {
    let page = MemoryPage::from_html("https://shop.example.com/checkout", SHOP);
    page.set_title("Checkout");
    let submit = page.find("#submit").unwrap();
    page.on(EventTarget::Element(submit), EventKind::Click, |page, _, _| {
        if let Some(result) = page.find("#result") {
            let _ = page.set_text(result, "Thanks");
        }
        if let Some(spinner) = page.find("#spinner") {
            let _ = page.remove(spinner);
        }
    });
    page
}

struct Harness {
    page: MemoryPage,
    store: Arc<MemoryStateStore>,
    sink: Arc<RecordingSink>,
    session: ExecutionSession,
}

impl Harness {
    fn new() -> Self {
        Self::with(MemoryStateStore::new(), Config::default())
    }

    fn with(store: MemoryStateStore, config: Config) -> Self {
        let page = shop_page();
        let store = Arc::new(store);
        let sink = Arc::new(RecordingSink::new());
        let session = ExecutionSession::new(
            Arc::new(page.clone()),
            store.clone(),
            store.clone(),
            sink.clone(),
            config,
        );
        Self {
            page,
            store,
            sink,
            session,
        }
    }

    fn clicks(&self) -> usize {
        self.page
            .events()
            .iter()
            .filter(|e| e.event.kind == EventKind::Click)
            .count()
    }

    async fn first_name(&self) -> Option<PropertyValue> {
        let input = self.page.find("#fname").unwrap();
        self.page.property(input, "value").await.unwrap()
    }
}

fn task(script: &str) -> UsabilityTask {
    UsabilityTask {
        task_id: Some("task-1".to_string()),
        task_name: "Checkout".to_string(),
        tester_name: "Sam".to_string(),
        description: None,
        script: script.to_string(),
    }
}

// ============================================================================
// Scripted Runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_type_click_verify_immediate() {
    let h = Harness::new();
    let outcome = h
        .session
        .run_script(
            "type 'Bob' in 'firstname'\nclick on 'Submit'\nverify text equals \"Thanks\" in '#result'",
            0,
        )
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.first_name().await, Some(PropertyValue::Text("Bob".into())));
    let verifications = h.sink.verifications();
    assert_eq!(verifications.len(), 1);
    assert!(verifications[0].success);
    assert_eq!(
        verifications[0].message,
        "Verification passed: Text equals \"Thanks\""
    );
    assert_eq!(h.store.snapshot().await.cmdtree.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_local_keywords_shadow_global() {
    let mut tables = KeywordTables {
        global: vec![Keyword::new("checkout", "//button[@id='elsewhere']")],
        local: BTreeMap::new(),
    };
    tables.local.insert(
        "example.com".to_string(),
        vec![Keyword::new("checkout", "//button[@id='submit']")],
    );
    let h = Harness::with(MemoryStateStore::with_keywords(tables), Config::default());

    let cmd = h.session.parse_line("click on 'checkout'").await.unwrap().unwrap();
    assert_eq!(cmd.locator().as_deref(), Some("//button[@id='submit']"));

    let outcome = h.session.run_script("click on 'checkout'", 0).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.clicks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abort_then_resume_after_fix() {
    let h = Harness::new();
    let script = "click on 'Submit'\nclick on 'Retry'\ntype 'Bob' in 'firstname'";

    let outcome = h.session.run_script(script, 0).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Aborted {
            at: 1,
            failure: StepFailure::ElementNotFound("Retry".to_string()),
        }
    );
    assert_eq!(h.store.cursor().await.unwrap(), Some(0));

    let form = h.page.find("#checkout").unwrap();
    h.page.append_html(form, "<button>Retry</button>").unwrap();

    assert_eq!(h.session.resume().await.unwrap(), Some(RunOutcome::Completed));
    assert_eq!(h.clicks(), 2);
    assert_eq!(h.first_name().await, Some(PropertyValue::Text("Bob".into())));

    // Everything ran; nothing is left.
    assert_eq!(h.session.resume().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_blocks_resume_until_next_run() {
    let h = Harness::new();
    h.session
        .run_script("click on 'Submit'\nclick on 'Retry'", 0)
        .await
        .unwrap();

    h.session.stop().await.unwrap();
    assert_eq!(
        h.session.resume().await.unwrap(),
        Some(RunOutcome::Stopped { at: 1 })
    );
    assert_eq!(h.clicks(), 1);

    // A new run clears the flag.
    let outcome = h.session.run_script("click on 'Submit'", 0).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert!(!h.store.stop_flag().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_finishes_script() {
    let mut config = Config::default();
    config.executor.on_element_not_found = OnElementNotFound::Skip;
    let h = Harness::with(MemoryStateStore::new(), config);

    let outcome = h
        .session
        .run_script("click on 'Retry'\ntype 'Bob' in 'firstname'", 0)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(h.sink.logs()[0], "cannot find tag 'Retry'");
    assert_eq!(h.first_name().await, Some(PropertyValue::Text("Bob".into())));
}

#[tokio::test(start_paused = true)]
async fn test_resume_survives_reload_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let script = "click on 'Submit'\nnavigate 'https://shop.example.com/done'\ntype 'Bob' in 'firstname'";

    {
        let page = shop_page();
        page.add_route("https://shop.example.com/done", "<p>Done</p>");
        let store = Arc::new(FileStateStore::new(&path).await.unwrap());
        let session = ExecutionSession::new(
            Arc::new(page.clone()),
            store.clone(),
            store.clone(),
            Arc::new(RecordingSink::new()),
            Config::default(),
        );
        let outcome = session.run_script(script, 0).await.unwrap();
        // The new document has no first-name field.
        assert!(matches!(outcome, RunOutcome::Aborted { at: 2, .. }));
        assert_eq!(page.url().await.unwrap(), "https://shop.example.com/done");
    }

    // Fresh page and store, same state file.
    let page = shop_page();
    let store = Arc::new(FileStateStore::new(&path).await.unwrap());
    let session = ExecutionSession::new(
        Arc::new(page.clone()),
        store.clone(),
        store.clone(),
        Arc::new(RecordingSink::new()),
        Config::default(),
    );
    assert_eq!(session.resume().await.unwrap(), Some(RunOutcome::Completed));
    let input = page.find("#fname").unwrap();
    assert_eq!(
        page.property(input, "value").await.unwrap(),
        Some(PropertyValue::Text("Bob".into()))
    );
}

// ============================================================================
// Usability Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_passive_verification_met_by_later_actions() {
    let h = Harness::new();
    let verify = "verify text equals \"Thanks\" in '#result'";
    h.session.start_usability_test(task(verify)).await.unwrap();
    assert_eq!(h.session.manager().active_watchers(), 1);
    assert!(h.sink.verifications().is_empty());

    // The tester fills in the form.
    h.session
        .run_script("type 'Bob' in 'firstname'\nclick on 'Submit'", 0)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = h.session.end_usability_test().await.unwrap();
    assert_eq!(
        report.verify_statements[verify],
        StatementResult {
            message: "Text equals \"Thanks\" verified".to_string(),
            success: true,
        }
    );
    assert_eq!(h.sink.verifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_report_marks_unmet_statements() {
    let h = Harness::new();
    let script = "verify state is hidden in '#spinner'\n\
                  verify title equals \"Order placed\"\n\
                  verify text equals \"Thanks\" in '#result'";
    let task_id = h.session.start_usability_test(task(script)).await.unwrap();
    assert_eq!(task_id, "task-1");

    h.session.run_script("click on 'Submit'", 0).await.unwrap();
    let report = h.session.end_usability_test().await.unwrap();

    assert_eq!(report.task_id, "task-1");
    assert_eq!(report.task_name, "Checkout");
    assert_eq!(report.tester_name, "Sam");
    assert!(chrono::DateTime::parse_from_rfc3339(&report.time).is_ok());

    let statements = &report.verify_statements;
    assert_eq!(statements.len(), 3);
    assert!(statements["verify state is hidden in '#spinner'"].success);
    assert!(statements["verify text equals \"Thanks\" in '#result'"].success);
    assert_eq!(
        statements["verify title equals \"Order placed\""],
        StatementResult {
            message: INCOMPLETE_MESSAGE.to_string(),
            success: false,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_verify_reports_setup_failure() {
    let h = Harness::new();
    h.session
        .start_usability_test(task("verify the page feels fast"))
        .await
        .unwrap();

    let report = h.session.end_usability_test().await.unwrap();
    let result = &report.verify_statements["verify the page feels fast"];
    assert!(!result.success);
    assert_eq!(result.message, "Invalid verification data");
}

#[tokio::test(start_paused = true)]
async fn test_one_test_at_a_time() {
    let h = Harness::new();
    assert!(matches!(
        h.session.end_usability_test().await,
        Err(SessionError::NoTestRunning)
    ));

    h.session.start_usability_test(task("")).await.unwrap();
    let again = h.session.start_usability_test(task("")).await;
    assert!(matches!(again, Err(SessionError::TestAlreadyRunning(id)) if id == "task-1"));

    let report = h.session.end_usability_test().await.unwrap();
    assert!(report.verify_statements.is_empty());
    assert!(h.session.start_usability_test(task("")).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_statements_start_not_yet_met() {
    let h = Harness::new();
    let verify = "verify text equals \"Thanks\" in '#result'";
    h.session.start_usability_test(task(verify)).await.unwrap();

    // Nothing reported yet, so only the placeholder would be in a report.
    assert!(h.session.manager().results().is_empty());
    let report = h.session.end_usability_test().await.unwrap();
    assert_eq!(report.verify_statements[verify].message, INCOMPLETE_MESSAGE);
    assert_ne!(report.verify_statements[verify].message, NOT_YET_MET_MESSAGE);
}

#[tokio::test(start_paused = true)]
async fn test_generated_task_id_and_camel_case_report() {
    let h = Harness::new();
    let mut t = task("verify url contains \"/checkout\"");
    t.task_id = None;
    let task_id = h.session.start_usability_test(t).await.unwrap();
    assert!(uuid::Uuid::parse_str(&task_id).is_ok());

    let report = h.session.end_usability_test().await.unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["taskId"], task_id);
    assert_eq!(json["testerName"], "Sam");
    assert_eq!(
        json["verifyStatements"]["verify url contains \"/checkout\""]["success"],
        true
    );
}

#[tokio::test(start_paused = true)]
async fn test_reattach_reinstalls_watchers() {
    let h = Harness::new();
    assert!(matches!(
        h.session.reattach_observers().await,
        Err(SessionError::NoTestRunning)
    ));

    h.session
        .start_usability_test(task("verify text equals \"Thanks\" in '#result'"))
        .await
        .unwrap();
    h.session.reattach_observers().await.unwrap();
    assert_eq!(h.session.manager().active_watchers(), 1);

    let result = h.page.find("#result").unwrap();
    h.page.set_text(result, "Thanks").unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let report = h.session.end_usability_test().await.unwrap();
    assert!(report.verify_statements.values().all(|r| r.success));
}
