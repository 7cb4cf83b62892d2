//! Page backend errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid XPath expression: {0}")]
    InvalidXPath(String),

    #[error("Stale element handle: {0}")]
    StaleElement(u64),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Page backend error: {0}")]
    Backend(String),
}
