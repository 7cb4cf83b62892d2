use super::*;
use herbie_page_memory::MemoryPage;
use herbie_protocols::PropertyValue;
use tokio::sync::mpsc;

const DOC: &str = r#"
<div id="msg"></div>
<p id="later" style="display: none">Thanks for waiting</p>
<input id="email" value="">
<div id="spinner">Loading</div>
"#;

type Outcome = Result<VerificationResult, VerificationResult>;

fn setup() -> (MemoryPage, Watcher) {
    let page = MemoryPage::from_html("https://example.com/", DOC);
    let watcher = Watcher::new(
        Arc::new(page.clone()),
        Duration::from_secs(60),
        Duration::from_millis(500),
    );
    (page, watcher)
}

fn start(watcher: Watcher, probe: Probe) -> (WatchHandle, mpsc::UnboundedReceiver<Outcome>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let fail_tx = tx.clone();
    let handle = watcher.start(
        probe,
        move |r| {
            let _ = tx.send(Ok(r));
        },
        move |r| {
            let _ = fail_tx.send(Err(r));
        },
    );
    (handle, rx)
}

fn text_probe(page: &MemoryPage, selector: &str, expected: &str) -> Probe {
    Probe::Text {
        element: page.find(selector).unwrap(),
        operator: VerifyOperator::Contains,
        expected: expected.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_text_appearing_later_is_reported() {
    let (page, watcher) = setup();
    let (handle, mut rx) = start(watcher, text_probe(&page, "#msg", "Thanks"));

    page.set_text(page.find("#msg").unwrap(), "Thanks!").unwrap();

    let outcome = rx.recv().await.unwrap().unwrap();
    assert_eq!(outcome.message, "Text contains \"Thanks\" verified");
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn test_mutation_right_after_start_is_seen_before_deadline() {
    let (page, watcher) = setup();
    let start_at = Instant::now();
    let (_handle, mut rx) = start(watcher, text_probe(&page, "#msg", "Thanks"));
    page.set_text(page.find("#msg").unwrap(), "Thanks!").unwrap();

    let outcome = rx.recv().await.unwrap().unwrap();
    assert_eq!(outcome.message, "Text contains \"Thanks\" verified");
    assert!(start_at.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_change_after_first_check_is_seen_before_deadline() {
    let (page, watcher) = setup();
    let spinner = page.find("#spinner").unwrap();
    let probe = Probe::State {
        element: Some(spinner),
        state: ElementState::Hidden,
    };
    let start_at = Instant::now();
    let (_handle, mut rx) = start(watcher, probe);

    // Let the task run its startup check and park on the feed.
    tokio::task::yield_now().await;
    page.remove(spinner).unwrap();

    assert!(rx.recv().await.unwrap().is_ok());
    assert!(start_at.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_condition_already_true_passes_at_startup() {
    let (page, watcher) = setup();
    page.set_text(page.find("#msg").unwrap(), "Thanks").unwrap();
    let start_at = Instant::now();

    let (_handle, mut rx) = start(watcher, text_probe(&page, "#msg", "Thanks"));

    assert!(rx.recv().await.unwrap().is_ok());
    assert_eq!(start_at.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_undisplayed_text_waits_until_shown() {
    let (page, watcher) = setup();
    let later = page.find("#later").unwrap();
    let probe = text_probe(&page, "#later", "Thanks");

    // A one-off check ignores rendering; a watcher does not.
    assert!(matches!(probe.observe(&page, false).await, Observation::Satisfied(_)));
    assert!(matches!(probe.observe(&page, true).await, Observation::Unmet(_)));

    let (_handle, mut rx) = start(watcher, probe);
    page.set_attribute(later, "style", "display: block").unwrap();

    assert!(rx.recv().await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_reports_timeout() {
    let (page, watcher) = setup();
    let start_at = Instant::now();
    let (_handle, mut rx) = start(watcher, text_probe(&page, "#msg", "never"));

    let failure = rx.recv().await.unwrap().unwrap_err();
    assert_eq!(failure.message, "Verification timed out after 60 seconds");
    assert!(start_at.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_page_title_is_polled() {
    let (page, _) = setup();
    let watcher = Watcher::new(
        Arc::new(page.clone()),
        Duration::from_secs(30),
        Duration::from_millis(500),
    );
    let probe = Probe::Page {
        target: PageTarget::Title,
        operator: VerifyOperator::Equals,
        expected: "Done".to_string(),
    };
    let (_handle, mut rx) = start(watcher, probe);

    tokio::time::sleep(Duration::from_secs(2)).await;
    page.set_title("Done");

    let outcome = rx.recv().await.unwrap().unwrap();
    assert_eq!(outcome.message, "Page title equals \"Done\" verified");
}

#[tokio::test(start_paused = true)]
async fn test_page_timeout_carries_actual_value() {
    let (page, _) = setup();
    let watcher = Watcher::new(
        Arc::new(page.clone()),
        Duration::from_secs(30),
        Duration::from_millis(500),
    );
    let probe = Probe::Page {
        target: PageTarget::Url,
        operator: VerifyOperator::Contains,
        expected: "/thanks".to_string(),
    };
    let (_handle, mut rx) = start(watcher, probe);

    let failure = rx.recv().await.unwrap().unwrap_err();
    assert_eq!(
        failure.message,
        "Page url verification timed out after 30 seconds. Expected contains \"/thanks\" but got \"https://example.com/\""
    );
}

#[tokio::test(start_paused = true)]
async fn test_value_property_changes_are_polled() {
    let (page, watcher) = setup();
    let email = page.find("#email").unwrap();
    let probe = Probe::Attribute {
        element: email,
        attribute: VerifyType::Value,
        operator: VerifyOperator::Equals,
        expected: "a@b.c".to_string(),
        locator: "#email".to_string(),
    };
    let (_handle, mut rx) = start(watcher, probe);

    // Property writes emit no mutation record.
    page.set_property(email, "value", PropertyValue::Text("a@b.c".into()))
        .await
        .unwrap();

    let outcome = rx.recv().await.unwrap().unwrap();
    assert_eq!(outcome.message, "value equals \"a@b.c\" verified");
}

#[tokio::test(start_paused = true)]
async fn test_attribute_element_removed() {
    let (page, watcher) = setup();
    let spinner = page.find("#spinner").unwrap();
    let probe = Probe::Attribute {
        element: spinner,
        attribute: VerifyType::Class,
        operator: VerifyOperator::Contains,
        expected: "done".to_string(),
        locator: "#spinner".to_string(),
    };
    let (_handle, mut rx) = start(watcher, probe);

    page.remove(spinner).unwrap();

    let failure = rx.recv().await.unwrap().unwrap_err();
    assert_eq!(
        failure.message,
        "Element removed from DOM during attribute verification: #spinner"
    );
}

#[tokio::test(start_paused = true)]
async fn test_hidden_state_passes_on_removal() {
    let (page, watcher) = setup();
    let spinner = page.find("#spinner").unwrap();
    let probe = Probe::State {
        element: Some(spinner),
        state: ElementState::Hidden,
    };
    let (_handle, mut rx) = start(watcher, probe);

    page.remove(spinner).unwrap();

    let outcome = rx.recv().await.unwrap().unwrap();
    assert_eq!(
        outcome.message,
        "State verification passed: element is hidden (not in DOM)"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_silences_callbacks() {
    let (page, watcher) = setup();
    let (handle, mut rx) = start(watcher, text_probe(&page, "#msg", "never"));

    handle.stop();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(handle.is_finished());
    assert!(rx.recv().await.is_none());
}

#[test]
fn test_polling_and_filters() {
    let el = ElementRef(1);
    let class = Probe::Attribute {
        element: el,
        attribute: VerifyType::Class,
        operator: VerifyOperator::Contains,
        expected: "x".to_string(),
        locator: "#x".to_string(),
    };
    assert!(!class.polls());
    assert!(class.wants(&MutationRecord {
        kind: MutationKind::Attributes,
        target: el,
        attribute_name: Some("class".to_string()),
    }));
    assert!(!class.wants(&MutationRecord {
        kind: MutationKind::Attributes,
        target: ElementRef(2),
        attribute_name: Some("class".to_string()),
    }));

    let state = Probe::State {
        element: Some(el),
        state: ElementState::Visible,
    };
    assert!(!state.wants(&MutationRecord {
        kind: MutationKind::Attributes,
        target: el,
        attribute_name: Some("title".to_string()),
    }));
    assert_eq!(state.category(), Category::State);
}
