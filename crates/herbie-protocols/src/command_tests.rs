use super::*;

fn cmd(code: &[&str]) -> Command {
    let mut c = Command::new(0, code.join(" "), 5000);
    c.code = code.iter().map(|s| s.to_string()).collect();
    c
}

#[test]
fn test_empty_code_is_noop() {
    let c = Command::new(3, "---", 5000);
    assert_eq!(c.action().unwrap(), Action::Noop);
}

#[test]
fn test_click_locator_is_unquoted() {
    let c = cmd(&["click", "in", "'Submit'"]);
    assert_eq!(
        c.action().unwrap(),
        Action::Click {
            locator: "Submit".to_string()
        }
    );
}

#[test]
fn test_click_without_operand() {
    let c = cmd(&["click", "in"]);
    assert_eq!(
        c.action().unwrap_err(),
        CommandError::MissingLocator("click".to_string())
    );
}

#[test]
fn test_type_value_and_locator() {
    let c = cmd(&["type", "'Bob'", "in", "'firstname'"]);
    assert_eq!(
        c.action().unwrap(),
        Action::Type {
            locator: "firstname".to_string(),
            value: "Bob".to_string()
        }
    );
}

#[test]
fn test_type_missing_value() {
    let c = cmd(&["type", "in", "'firstname'"]);
    assert!(matches!(c.action(), Err(CommandError::MissingValue(_))));
}

#[test]
fn test_wait_numeric() {
    let c = cmd(&["wait", "2000"]);
    assert_eq!(c.action().unwrap(), Action::Wait { ms: 2000 });
}

#[test]
fn test_wait_non_numeric_is_invalid_operand() {
    let c = cmd(&["wait", "soon"]);
    assert!(matches!(
        c.action(),
        Err(CommandError::InvalidOperand { .. })
    ));
}

#[test]
fn test_open_is_navigate() {
    let c = cmd(&["open", "\"https://example.com\""]);
    assert_eq!(
        c.action().unwrap(),
        Action::Navigate {
            url: "https://example.com".to_string()
        }
    );
}

#[test]
fn test_mouseover_without_in_uses_literal() {
    let c = cmd(&["mouseover", "'#menu'"]);
    assert_eq!(c.action().unwrap().locator(), Some("#menu"));
}

#[test]
fn test_unsupported_verbs() {
    for verb in ["capture", "test", "switch"] {
        let c = cmd(&[verb, "'x'"]);
        assert_eq!(
            c.action().unwrap(),
            Action::Unsupported {
                verb: verb.to_string()
            }
        );
    }
}

#[test]
fn test_verify_text_decoding() {
    let mut c = cmd(&["verify", "\"Welcome\"", "in", "\"#header\""]);
    c.verify_type = Some(VerifyType::Text);
    c.verify_operator = Some(VerifyOperator::Equals);
    c.verify_expected = Some("Welcome".to_string());
    c.verify_locator = Some("#header".to_string());

    let v = c.verification().unwrap();
    assert_eq!(
        v,
        Verification::Text {
            operator: VerifyOperator::Equals,
            expected: "Welcome".to_string(),
            locator: Some("#header".to_string()),
        }
    );
    assert_eq!(v.locator(), Some("#header"));
}

#[test]
fn test_verify_title_without_locator_is_page() {
    let mut c = cmd(&["verify", "\"Dashboard\""]);
    c.verify_type = Some(VerifyType::Title);
    c.verify_operator = Some(VerifyOperator::Contains);
    c.verify_expected = Some("Dashboard".to_string());

    let v = c.verification().unwrap();
    assert!(matches!(
        v,
        Verification::Page {
            target: PageTarget::Title,
            ..
        }
    ));
    assert_eq!(v.verify_type(), VerifyType::Title);
}

#[test]
fn test_verify_title_with_locator_is_attribute() {
    let mut c = cmd(&["verify", "\"Help\"", "in", "\"#link\""]);
    c.verify_type = Some(VerifyType::Title);
    c.verify_operator = Some(VerifyOperator::Equals);
    c.verify_expected = Some("Help".to_string());
    c.verify_locator = Some("#link".to_string());

    assert!(matches!(
        c.verification().unwrap(),
        Verification::Attribute {
            attribute: VerifyType::Title,
            ..
        }
    ));
}

#[test]
fn test_verify_state_unknown_value() {
    let mut c = cmd(&["verify", "\"blinking\""]);
    c.verify_type = Some(VerifyType::State);
    c.verify_operator = Some(VerifyOperator::Is);
    c.verify_expected = Some("blinking".to_string());

    assert!(matches!(
        c.verification(),
        Err(CommandError::InvalidOperand { .. })
    ));
}

#[test]
fn test_verify_text_rejects_is_operator() {
    let mut c = cmd(&["verify", "\"x\""]);
    c.verify_type = Some(VerifyType::Text);
    c.verify_operator = Some(VerifyOperator::Is);
    assert_eq!(
        c.verification().unwrap_err(),
        CommandError::UnknownOperator("is".to_string())
    );
}

#[test]
fn test_operator_parse_and_match() {
    assert_eq!(
        VerifyOperator::parse("Starts   With"),
        Some(VerifyOperator::StartsWith)
    );
    assert_eq!(VerifyOperator::parse("ends_with"), Some(VerifyOperator::EndsWith));
    assert_eq!(VerifyOperator::parse("near"), None);

    assert_eq!(VerifyOperator::Equals.matches("a", "a"), Some(true));
    assert_eq!(VerifyOperator::Contains.matches("abc", "b"), Some(true));
    assert_eq!(VerifyOperator::StartsWith.matches("abc", "b"), Some(false));
    assert_eq!(VerifyOperator::EndsWith.matches("abc", "bc"), Some(true));
    assert_eq!(VerifyOperator::Is.matches("a", "a"), None);
}

#[test]
fn test_verify_type_parse() {
    assert_eq!(VerifyType::parse("Placeholder"), Some(VerifyType::Placeholder));
    assert_eq!(VerifyType::parse("readonly"), Some(VerifyType::Readonly));
    assert_eq!(VerifyType::parse("colour"), None);
}

#[test]
fn test_unquote() {
    assert_eq!(unquote("'a b'"), "a b");
    assert_eq!(unquote("\"x\""), "x");
    assert_eq!(unquote("'mixed\""), "'mixed\"");
    assert_eq!(unquote("'"), "'");
    assert_eq!(unquote("plain"), "plain");
}

#[test]
fn test_count_nodes_nested() {
    let mut parent = cmd(&["under", "'Profile'"]);
    parent.subcommands.push(cmd(&["click", "in", "'Edit'"]));
    let mut inner = cmd(&["under", "'Address'"]);
    inner.subcommands.push(cmd(&["click", "in", "'Save'"]));
    parent.subcommands.push(inner);

    assert_eq!(count_nodes(&[parent, cmd(&["wait", "10"])]), 5);
}

#[test]
fn test_command_serializes_camel_case() {
    let mut c = cmd(&["verify", "\"ok\""]);
    c.verify_type = Some(VerifyType::Url);
    c.verify_operator = Some(VerifyOperator::StartsWith);
    let json = serde_json::to_string(&c).unwrap();
    assert!(json.contains("\"verifyType\":\"url\""));
    assert!(json.contains("\"verifyOperator\":\"starts_with\""));
    assert!(!json.contains("verifyLocator"));

    let back: Command = serde_json::from_str(&json).unwrap();
    assert_eq!(back, c);
}
