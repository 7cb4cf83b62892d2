//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub locator: LocatorConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub verification: VerificationConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Timeout assigned to every parsed command.
    #[serde(default = "default_command_timeout")]
    pub default_timeout_ms: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_command_timeout(),
        }
    }
}

fn default_command_timeout() -> u64 {
    5000
}

/// Element locator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed delay between attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Parent levels climbed from a heading before searching for the target.
    #[serde(default = "default_heading_depth")]
    pub heading_depth: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            heading_depth: default_heading_depth(),
        }
    }
}

fn default_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_heading_depth() -> usize {
    1
}

/// What the executor does when a step's element cannot be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnElementNotFound {
    /// Report the failure and stop the run.
    #[default]
    Abort,
    /// Keep polling until the command's timeout is spent, then move on.
    Skip,
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Pre-action delay for commands without a timeout.
    #[serde(default = "default_delay")]
    pub default_delay_ms: u64,

    #[serde(default)]
    pub on_element_not_found: OnElementNotFound,

    /// Poll interval of the skip policy's countdown.
    #[serde(default = "default_skip_poll")]
    pub skip_poll_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay(),
            on_element_not_found: OnElementNotFound::default(),
            skip_poll_ms: default_skip_poll(),
        }
    }
}

fn default_delay() -> u64 {
    500
}

fn default_skip_poll() -> u64 {
    100
}

/// Passive verification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Deadline for element verifications.
    #[serde(default = "default_verification_timeout")]
    pub timeout_ms: u64,

    /// Deadline for title and URL verifications.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_verification_timeout(),
            page_timeout_ms: default_page_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_verification_timeout() -> u64 {
    60_000
}

fn default_page_timeout() -> u64 {
    30_000
}

fn default_poll_interval() -> u64 {
    500
}

/// Browser connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_cdp_endpoint")]
    pub cdp_endpoint: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            cdp_endpoint: default_cdp_endpoint(),
        }
    }
}

fn default_cdp_endpoint() -> String {
    "http://localhost:9222".to_string()
}

/// Persisted state configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

fn default_state_path() -> String {
    "~/.herbie/state.json".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
