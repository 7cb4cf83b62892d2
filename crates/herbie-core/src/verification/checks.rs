//! Page reads and comparisons shared by immediate and passive checks.

use herbie_protocols::{
    ElementRef, ElementState, Page, PageError, PageTarget, PropertyValue, VerificationResult,
    VerifyOperator, VerifyType, VisibilityInfo,
};

/// Operator as it reads in messages: `starts_with` becomes `starts with`.
pub(crate) fn spaced(operator: VerifyOperator) -> String {
    operator.as_str().replacen('_', " ", 1)
}

fn property_name(attribute: VerifyType) -> &'static str {
    match attribute {
        VerifyType::Class => "className",
        VerifyType::Readonly => "readOnly",
        other => other.as_str(),
    }
}

/// The DOM property when defined, else the attribute, trimmed.
pub(crate) async fn attribute_value(
    page: &dyn Page,
    el: ElementRef,
    attribute: VerifyType,
) -> Result<String, PageError> {
    let value = match page.property(el, property_name(attribute)).await? {
        Some(prop) => prop.to_js_string(),
        None => page
            .attribute(el, attribute.as_str())
            .await?
            .unwrap_or_default(),
    };
    Ok(value.trim().to_string())
}

pub(crate) async fn page_value(page: &dyn Page, target: PageTarget) -> Result<String, PageError> {
    match target {
        PageTarget::Title => page.title().await,
        PageTarget::Url => page.url().await,
    }
}

/// `element[name] === true`
pub(crate) async fn is_true(page: &dyn Page, el: ElementRef, name: &str) -> Result<bool, PageError> {
    Ok(page.property(el, name).await? == Some(PropertyValue::Bool(true)))
}

pub(crate) async fn is_truthy(page: &dyn Page, el: ElementRef, name: &str) -> Result<bool, PageError> {
    Ok(page
        .property(el, name)
        .await?
        .is_some_and(|value| value.is_truthy()))
}

/// A handle whose element was replaced by a navigation reads as detached.
pub(crate) async fn connected(page: &dyn Page, el: ElementRef) -> bool {
    page.is_connected(el).await.unwrap_or(false)
}

/// Compare with passive-mode wording (`Text contains "x" verified`).
pub(crate) fn compare(
    subject: &str,
    operator: VerifyOperator,
    expected: &str,
    actual: String,
) -> VerificationResult {
    let op = spaced(operator);
    let result = match operator.matches(&actual, expected) {
        None => VerificationResult::fail(format!("Unknown operator: {operator}")),
        Some(true) => VerificationResult::pass(format!("{subject} {op} \"{expected}\" verified")),
        Some(false) => VerificationResult::fail(format!(
            "{subject} {op} \"{expected}\" verification failed. Actual value: \"{actual}\""
        )),
    };
    result.with_actual(actual)
}

/// Evaluate a state on an attached element. A failure carries the reason.
pub(crate) async fn state(
    page: &dyn Page,
    el: ElementRef,
    state: ElementState,
) -> Result<VerificationResult, PageError> {
    let reason = match state {
        ElementState::Visible => {
            let info = page.visibility(el).await?;
            (!info.is_rendered()).then(|| hidden_reason(&info))
        }
        ElementState::Hidden => {
            let info = page.visibility(el).await?;
            info.is_rendered()
                .then(|| format!("element is visible ({}×{})", info.width, info.height))
        }
        ElementState::Enabled => is_truthy(page, el, "disabled")
            .await?
            .then(|| "element has 'disabled' attribute".to_string()),
        ElementState::Disabled => (!is_true(page, el, "disabled").await?)
            .then(|| "element doesn't have 'disabled' attribute".to_string()),
        ElementState::Checked => (!is_true(page, el, "checked").await?)
            .then(|| "element is not checked".to_string()),
    };

    Ok(match reason {
        None => VerificationResult::pass(format!("State verification passed: element is {state}")),
        Some(reason) => VerificationResult::fail(format!(
            "State verification failed: element is not {state} ({reason})"
        )),
    })
}

fn hidden_reason(info: &VisibilityInfo) -> String {
    if info.display == "none" {
        "display is 'none'".to_string()
    } else if info.visibility == "hidden" {
        "visibility is 'hidden'".to_string()
    } else {
        format!("element has no size ({}×{})", info.width, info.height)
    }
}
