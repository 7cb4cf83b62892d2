//! CDP error types.

use herbie_protocols::PageError;
use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to connect to Chrome.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Chrome not running with remote debugging.
    #[error("Chrome not available at {0}. Start Chrome with: chrome --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error during endpoint discovery.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("No page target available at {0}")]
    NoPage(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Exception thrown by an evaluated script.
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}

/// Marker thrown by the page helper for handles from another document.
pub(crate) const STALE_MARKER: &str = "herbie:stale:";

impl From<CdpError> for PageError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::JavaScript(message) => javascript_error(message),
            CdpError::NavigationFailed(message) => PageError::NavigationFailed(message),
            other => PageError::Backend(other.to_string()),
        }
    }
}

/// Classify a script exception by the DOM error it carries.
fn javascript_error(message: String) -> PageError {
    if let Some(pos) = message.find(STALE_MARKER) {
        let id = message[pos + STALE_MARKER.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if let Ok(id) = id.parse() {
            return PageError::StaleElement(id);
        }
    }
    if message.contains("is not a valid selector") {
        return PageError::InvalidSelector(message);
    }
    if message.contains("is not a valid XPath expression") {
        return PageError::InvalidXPath(message);
    }
    PageError::JavaScript(message)
}
