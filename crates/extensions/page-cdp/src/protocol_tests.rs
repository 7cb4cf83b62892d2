use super::*;

#[test]
fn test_request_omits_missing_session() {
    let req = CdpRequest {
        id: 7,
        method: "Runtime.evaluate".to_string(),
        params: Some(serde_json::json!({"expression": "document.title"})),
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("Runtime.evaluate"));
    assert!(!json.contains("sessionId"));
}

#[test]
fn test_event_message_deserialize() {
    let json = r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}, "sessionId": "S1"}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert!(resp.id.is_none());
    assert_eq!(resp.method.as_deref(), Some("Page.loadEventFired"));
    assert_eq!(resp.session_id.as_deref(), Some("S1"));
}

#[test]
fn test_page_info_filters_targets() {
    let json = r#"[
        {"id": "w1", "type": "service_worker", "title": "", "url": "chrome://sw"},
        {"id": "p1", "type": "page", "title": "Shop", "url": "https://shop.example.com/"}
    ]"#;
    let pages: Vec<PageInfo> = serde_json::from_str(json).unwrap();
    let first = pages.iter().find(|p| p.is_page()).unwrap();
    assert_eq!(first.id, "p1");
}

#[test]
fn test_exception_message_prefers_description() {
    let json = r#"{
        "text": "Uncaught",
        "exception": {"type": "object", "description": "Error: herbie:stale:3\n    at get"}
    }"#;
    let details: ExceptionDetails = serde_json::from_str(json).unwrap();
    assert!(details.message().starts_with("Error: herbie:stale:3"));

    let bare: ExceptionDetails = serde_json::from_str(r#"{"text": "Uncaught"}"#).unwrap();
    assert_eq!(bare.message(), "Uncaught");
}
