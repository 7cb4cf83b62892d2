//! Heading-relative lookup for `under "Heading"` blocks.

use herbie_protocols::command::unquote;
use herbie_protocols::{ElementRef, Page, PageError};

const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "label", "span", "div"];

/// Quote `s` as an XPath string literal.
///
/// XPath 1.0 has no escapes, so a value holding both quote kinds is built
/// with `concat()`.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

pub(super) async fn find(
    page: &dyn Page,
    heading: &str,
    target: &str,
    depth: usize,
) -> Result<Option<ElementRef>, PageError> {
    let h = xpath_literal(unquote(heading.trim()));
    let t = xpath_literal(unquote(target.trim()));

    let candidates = page
        .evaluate_xpath(&format!("//*[contains(text(), {h})]"), None)
        .await?;

    let scope = format!(
        ".{}//*[contains(text(), {t}) or @value={t} or @title={t} or @alt={t} or @placeholder={t}]",
        "/..".repeat(depth)
    );

    for candidate in candidates {
        let tag = page.tag_name(candidate).await?;
        if !HEADING_TAGS.contains(&tag.as_str()) {
            continue;
        }
        if let Some(el) = page.evaluate_xpath(&scope, Some(candidate)).await?.into_iter().next() {
            return Ok(Some(el));
        }
    }
    Ok(None)
}
