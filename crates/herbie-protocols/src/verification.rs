//! Uniform verification outcome.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
}

impl VerificationResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            actual_value: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            actual_value: None,
        }
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual_value = Some(actual.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_and_fail() {
        assert!(VerificationResult::pass("ok").success);
        let failed = VerificationResult::fail("nope").with_actual("got");
        assert!(!failed.success);
        assert_eq!(failed.actual_value.as_deref(), Some("got"));
    }
}
