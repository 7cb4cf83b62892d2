//! One-shot verification for scripted runs.

use herbie_protocols::{
    ElementRef, ElementState, Page, PageError, PageTarget, Verification, VerificationResult,
    VerifyOperator,
};

use super::checks;

/// Evaluate `verification` once against the current page.
///
/// `element` is the resolved locator target, if any. Page errors become
/// failed results.
pub async fn verify(
    page: &dyn Page,
    verification: &Verification,
    element: Option<ElementRef>,
) -> VerificationResult {
    match evaluate(page, verification, element).await {
        Ok(result) => result,
        Err(e) => VerificationResult::fail(format!("Verification failed: {e}")),
    }
}

async fn evaluate(
    page: &dyn Page,
    verification: &Verification,
    element: Option<ElementRef>,
) -> Result<VerificationResult, PageError> {
    match verification {
        Verification::Text {
            operator, expected, ..
        } => {
            let Some(el) = element else {
                return Ok(VerificationResult::fail("Element not found for text verification"));
            };
            let actual = page.inner_text(el).await?.trim().to_string();
            Ok(judge("Text", "text", *operator, expected, actual))
        }
        Verification::Attribute {
            attribute,
            operator,
            expected,
            ..
        } => {
            let Some(el) = element else {
                return Ok(VerificationResult::fail(format!(
                    "Element not found for {attribute} verification"
                )));
            };
            let actual = checks::attribute_value(page, el, *attribute).await?;
            let name = attribute.as_str();
            Ok(judge(name, name, *operator, expected, actual))
        }
        Verification::State { state, .. } => state_once(page, *state, element).await,
        Verification::Page {
            target,
            operator,
            expected,
        } => {
            let actual = checks::page_value(page, *target).await?;
            let (subject, noun) = match target {
                PageTarget::Title => ("Page title", "title"),
                PageTarget::Url => ("URL", "URL"),
            };
            Ok(judge(subject, noun, *operator, expected, actual))
        }
    }
}

async fn state_once(
    page: &dyn Page,
    state: ElementState,
    element: Option<ElementRef>,
) -> Result<VerificationResult, PageError> {
    let el = match element {
        Some(el) if checks::connected(page, el).await => el,
        _ if state == ElementState::Hidden => {
            return Ok(VerificationResult::pass(
                "State verification passed: element is hidden (not in DOM)",
            ));
        }
        _ => return Ok(VerificationResult::fail("Element not found for state verification")),
    };

    let holds = match state {
        ElementState::Visible => page.visibility(el).await?.is_visible(),
        ElementState::Hidden => !page.visibility(el).await?.is_visible(),
        ElementState::Enabled => !checks::is_truthy(page, el, "disabled").await?,
        ElementState::Disabled => checks::is_true(page, el, "disabled").await?,
        ElementState::Checked => checks::is_true(page, el, "checked").await?,
    };

    Ok(if holds {
        VerificationResult::pass(format!("Verification passed: Element is {state}"))
    } else {
        VerificationResult::fail(format!("Verification failed: Element is not {state}"))
    })
}

fn judge(
    subject: &str,
    noun: &str,
    operator: VerifyOperator,
    expected: &str,
    actual: String,
) -> VerificationResult {
    let op = checks::spaced(operator);
    let result = match operator.matches(&actual, expected) {
        None => VerificationResult::fail(format!("Unknown operator: {operator}")),
        Some(true) => VerificationResult::pass(format!(
            "Verification passed: {subject} {op} \"{expected}\""
        )),
        Some(false) => VerificationResult::fail(format!(
            "Verification failed: Expected {noun} to {op} \"{expected}\", got \"{actual}\""
        )),
    };
    result.with_actual(actual)
}
