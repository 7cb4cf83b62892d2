//! CDP session attached to a single page target.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::client::Transport;
use crate::error::CdpError;
use crate::protocol::ExceptionDetails;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const LOAD_POLL: Duration = Duration::from_millis(100);

pub struct PageSession {
    target_id: String,
    session_id: String,
    transport: Arc<Transport>,
}

impl PageSession {
    pub(crate) fn new(target_id: String, session_id: String, transport: Arc<Transport>) -> Self {
        Self {
            target_id,
            session_id,
            transport,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a CDP command to this page.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport
            .call(method, params, Some(&self.session_id))
            .await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Evaluate an expression and return its JSON value.
    ///
    /// `undefined` comes back as `Value::Null`.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let details: ExceptionDetails =
                serde_json::from_value(exception.clone()).unwrap_or_default();
            return Err(CdpError::JavaScript(details.message()));
        }

        Ok(result["result"]["value"].clone())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(format!("{url}: {error}")));
        }

        self.wait_for_load().await?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    /// Poll `document.readyState` until the document is interactive.
    pub async fn wait_for_load(&self) -> Result<(), CdpError> {
        let deadline = tokio::time::Instant::now() + LOAD_TIMEOUT;
        loop {
            // The context is briefly gone while a navigation commits.
            if let Ok(Value::String(state)) = self.evaluate("document.readyState").await {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }
            tokio::time::sleep(LOAD_POLL).await;
        }
    }
}
