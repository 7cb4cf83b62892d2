//! Engine error types.

use herbie_protocols::{CommandError, PageError, StoreError};
use thiserror::Error;

/// Why a single step could not be performed.
///
/// The display string is the human message shown in the run log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepFailure {
    #[error("Element not found for XPath: {0}")]
    ElementNotFound(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Unsupported command: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Page(String),
}

impl From<PageError> for StepFailure {
    fn from(e: PageError) -> Self {
        StepFailure::Page(e.to_string())
    }
}

/// Infrastructure failure of a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("A usability test is already running: {0}")]
    TestAlreadyRunning(String),

    #[error("No usability test is running")]
    NoTestRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_not_found_message() {
        let err = StepFailure::ElementNotFound("//button[1]".to_string());
        assert_eq!(err.to_string(), "Element not found for XPath: //button[1]");
    }

    #[test]
    fn test_command_error_is_transparent() {
        let err: StepFailure = CommandError::MissingValue("type".to_string()).into();
        assert_eq!(err.to_string(), "Missing value for 'type'");
    }

    #[test]
    fn test_page_error_conversion() {
        let err: StepFailure = PageError::StaleElement(7).into();
        assert!(err.to_string().contains("Stale element"));
    }
}
