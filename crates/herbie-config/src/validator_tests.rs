use super::*;

#[test]
fn test_validate_default_config() {
    let result = ConfigValidator::validate(&Config::default());
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_zero_poll_interval_is_error() {
    let mut config = Config::default();
    config.verification.poll_interval_ms = 0;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result
        .errors
        .iter()
        .any(|e| e.path == "verification.poll_interval_ms"));
}

#[test]
fn test_short_page_timeout_warns() {
    let mut config = Config::default();
    config.verification.page_timeout_ms = 100;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result
        .warnings
        .iter()
        .any(|w| w.path == "verification.page_timeout_ms"));
}

#[test]
fn test_zero_retries_warns() {
    let mut config = Config::default();
    config.locator.retries = 0;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn test_invalid_endpoint() {
    let mut config = Config::default();
    config.browser.cdp_endpoint = "localhost:9222".to_string();

    let result = ConfigValidator::validate(&config);
    assert!(result.errors.iter().any(|e| e.path == "browser.cdp_endpoint"));
}

#[test]
fn test_into_result_reports_first_error() {
    let mut config = Config::default();
    config.executor.skip_poll_ms = 0;

    let err = ConfigValidator::validate(&config).into_result().unwrap_err();
    assert!(err.to_string().contains("executor.skip_poll_ms"));
}
