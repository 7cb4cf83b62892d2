//! Keyword aliases for locators.

use serde::{Deserialize, Serialize};

/// Placeholder substituted by quoted command literals.
pub const VARIABLE_PLACEHOLDER: &str = "{$}";

/// A named alias for a locator, optionally parameterized by `{$}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    pub keyword: String,
    pub xpath: String,
    #[serde(default)]
    pub has_variable: bool,
}

impl Keyword {
    pub fn new(keyword: impl Into<String>, xpath: impl Into<String>) -> Self {
        let xpath = xpath.into();
        Self {
            keyword: keyword.into(),
            has_variable: xpath.contains(VARIABLE_PLACEHOLDER),
            xpath,
        }
    }
}
