//! Parsed script commands.
//!
//! A [`Command`] is the flat, serializable form the parser produces and the
//! state store persists. [`Command::action`] decodes it into the exhaustive
//! [`Action`] view the executor dispatches on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Canonical connective that introduces a locator operand.
pub const IN: &str = "in";

/// One parsed script line, with the block it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Zero-based index of the line in the script text.
    pub line: usize,
    /// Verb plus operands.
    pub code: Vec<String>,
    /// Trimmed source text of the line.
    pub src: String,
    /// Per-command timeout in milliseconds.
    pub timeout: u64,
    #[serde(default)]
    pub subcommands: Vec<Command>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_type: Option<VerifyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_operator: Option<VerifyOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_target: Option<String>,
    /// Heading text of the enclosing `under` block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl Command {
    pub fn new(line: usize, src: impl Into<String>, timeout: u64) -> Self {
        Self {
            line,
            code: Vec::new(),
            src: src.into(),
            timeout,
            subcommands: Vec::new(),
            verify_type: None,
            verify_operator: None,
            verify_expected: None,
            verify_locator: None,
            verify_target: None,
            header: None,
        }
    }

    pub fn verb(&self) -> Option<&str> {
        self.code.first().map(String::as_str)
    }

    pub fn is_verify(&self) -> bool {
        self.verb() == Some("verify")
    }

    /// Position of the first `in` token.
    pub fn in_index(&self) -> Option<usize> {
        self.code.iter().position(|t| t == IN)
    }

    /// Raw token following the first `in`.
    pub fn operand(&self) -> Option<&str> {
        self.in_index()
            .and_then(|i| self.code.get(i + 1))
            .map(String::as_str)
    }

    /// Operand after `in`, with surrounding quotes removed.
    pub fn locator(&self) -> Option<String> {
        self.operand().map(|op| unquote(op).to_string())
    }

    /// The value operand (`code[1]`) of `type`/`select`/`verify`, unquoted.
    pub fn value(&self) -> Option<String> {
        self.code
            .get(1)
            .filter(|t| t.as_str() != IN)
            .map(|t| unquote(t).to_string())
    }

    /// All quoted literals in `code`, unquoted, in order.
    pub fn quoted_literals(&self) -> Vec<String> {
        self.code
            .iter()
            .filter(|t| is_quoted(t))
            .map(|t| unquote(t).to_string())
            .collect()
    }

    /// Decode this command into its typed action.
    pub fn action(&self) -> Result<Action, CommandError> {
        let Some(verb) = self.verb() else {
            return Ok(Action::Noop);
        };

        match verb {
            "click" => Ok(Action::Click {
                locator: self.require_locator(verb)?,
            }),
            "type" => Ok(Action::Type {
                locator: self.require_locator(verb)?,
                value: self.value().ok_or_else(|| CommandError::MissingValue(verb.into()))?,
            }),
            "select" => Ok(Action::Select {
                locator: self.require_locator(verb)?,
                value: self.value().ok_or_else(|| CommandError::MissingValue(verb.into()))?,
            }),
            "mouseover" => Ok(Action::Mouseover {
                locator: self
                    .locator()
                    .or_else(|| self.quoted_literals().into_iter().next())
                    .filter(|l| !l.is_empty())
                    .ok_or_else(|| CommandError::MissingLocator(verb.into()))?,
            }),
            "press" => {
                let key = self
                    .code
                    .get(1)
                    .filter(|t| t.as_str() != IN)
                    .map(|t| unquote(t).to_string())
                    .ok_or_else(|| CommandError::MissingValue(verb.into()))?;
                Ok(Action::Press {
                    key,
                    locator: self.locator(),
                })
            }
            "wait" => {
                let raw = self.code.get(1).cloned().unwrap_or_default();
                let ms = raw.parse::<u64>().map_err(|_| CommandError::InvalidOperand {
                    verb: verb.into(),
                    operand: raw.clone(),
                })?;
                Ok(Action::Wait { ms })
            }
            "navigate" | "open" => Ok(Action::Navigate {
                url: self
                    .quoted_literals()
                    .into_iter()
                    .next()
                    .ok_or_else(|| CommandError::MissingValue(verb.into()))?,
            }),
            "verify" => self.verification().map(Action::Verify),
            "under" => Ok(Action::Under {
                heading: self.quoted_literals().into_iter().next(),
            }),
            other => Ok(Action::Unsupported {
                verb: other.to_string(),
            }),
        }
    }

    /// Decode the verify-* fields into a typed verification.
    pub fn verification(&self) -> Result<Verification, CommandError> {
        let locator = self.verify_locator.clone().or_else(|| self.locator());
        let expected = self.verify_expected.clone().or_else(|| self.value());
        let operator = self.verify_operator.unwrap_or(VerifyOperator::Contains);
        let missing = || CommandError::MissingValue("verify".into());

        match self.verify_type.unwrap_or(VerifyType::Text) {
            VerifyType::State => {
                let raw = expected.ok_or_else(missing)?;
                let state = ElementState::parse(&raw).ok_or(CommandError::InvalidOperand {
                    verb: "verify".into(),
                    operand: raw,
                })?;
                Ok(Verification::State { state, locator })
            }
            VerifyType::Text => Ok(Verification::Text {
                operator: comparison(operator)?,
                expected: expected.ok_or_else(missing)?,
                locator,
            }),
            VerifyType::Url => Ok(Verification::Page {
                target: PageTarget::Url,
                operator: comparison(operator)?,
                expected: expected.ok_or_else(missing)?,
            }),
            VerifyType::Title if locator.is_none() => Ok(Verification::Page {
                target: PageTarget::Title,
                operator: comparison(operator)?,
                expected: expected.ok_or_else(missing)?,
            }),
            attribute => Ok(Verification::Attribute {
                attribute,
                operator: comparison(operator)?,
                expected: expected.ok_or_else(missing)?,
                locator,
            }),
        }
    }

    fn require_locator(&self, verb: &str) -> Result<String, CommandError> {
        self.locator()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| CommandError::MissingLocator(verb.into()))
    }
}

fn comparison(operator: VerifyOperator) -> Result<VerifyOperator, CommandError> {
    match operator {
        VerifyOperator::Is => Err(CommandError::UnknownOperator(operator.to_string())),
        op => Ok(op),
    }
}

/// Total number of commands in a tree, nested ones included.
pub fn count_nodes(commands: &[Command]) -> usize {
    commands
        .iter()
        .map(|c| 1 + count_nodes(&c.subcommands))
        .sum()
}

pub fn is_quoted(token: &str) -> bool {
    token.len() >= 2
        && ((token.starts_with('"') && token.ends_with('"'))
            || (token.starts_with('\'') && token.ends_with('\'')))
}

/// Strip one pair of matching surrounding quotes.
pub fn unquote(token: &str) -> &str {
    if is_quoted(token) {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

/// Typed view of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click { locator: String },
    Type { locator: String, value: String },
    Select { locator: String, value: String },
    Press { key: String, locator: Option<String> },
    Mouseover { locator: String },
    Wait { ms: u64 },
    Navigate { url: String },
    Verify(Verification),
    Under { heading: Option<String> },
    Unsupported { verb: String },
    Noop,
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Select { .. } => "select",
            Action::Press { .. } => "press",
            Action::Mouseover { .. } => "mouseover",
            Action::Wait { .. } => "wait",
            Action::Navigate { .. } => "navigate",
            Action::Verify(_) => "verify",
            Action::Under { .. } => "under",
            Action::Unsupported { verb } => verb,
            Action::Noop => "noop",
        }
    }

    /// Locator the action targets, if it needs an element.
    pub fn locator(&self) -> Option<&str> {
        match self {
            Action::Click { locator }
            | Action::Type { locator, .. }
            | Action::Select { locator, .. }
            | Action::Mouseover { locator } => Some(locator),
            Action::Press { locator, .. } => locator.as_deref(),
            Action::Verify(v) => v.locator(),
            _ => None,
        }
    }
}

/// A typed verification statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Text {
        operator: VerifyOperator,
        expected: String,
        locator: Option<String>,
    },
    Attribute {
        attribute: VerifyType,
        operator: VerifyOperator,
        expected: String,
        locator: Option<String>,
    },
    State {
        state: ElementState,
        locator: Option<String>,
    },
    Page {
        target: PageTarget,
        operator: VerifyOperator,
        expected: String,
    },
}

impl Verification {
    pub fn verify_type(&self) -> VerifyType {
        match self {
            Verification::Text { .. } => VerifyType::Text,
            Verification::Attribute { attribute, .. } => *attribute,
            Verification::State { .. } => VerifyType::State,
            Verification::Page { target: PageTarget::Title, .. } => VerifyType::Title,
            Verification::Page { target: PageTarget::Url, .. } => VerifyType::Url,
        }
    }

    pub fn locator(&self) -> Option<&str> {
        match self {
            Verification::Text { locator, .. }
            | Verification::Attribute { locator, .. }
            | Verification::State { locator, .. } => locator.as_deref(),
            Verification::Page { .. } => None,
        }
    }
}

/// Kind of check a verify statement performs.
///
/// `Title` is the page title when no locator is given and the `title`
/// attribute otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyType {
    Text,
    Value,
    Placeholder,
    Href,
    Src,
    Alt,
    Title,
    Class,
    Id,
    Name,
    Checked,
    Selected,
    Disabled,
    Readonly,
    Required,
    State,
    Url,
}

impl VerifyType {
    const ALL: [VerifyType; 17] = [
        VerifyType::Text,
        VerifyType::Value,
        VerifyType::Placeholder,
        VerifyType::Href,
        VerifyType::Src,
        VerifyType::Alt,
        VerifyType::Title,
        VerifyType::Class,
        VerifyType::Id,
        VerifyType::Name,
        VerifyType::Checked,
        VerifyType::Selected,
        VerifyType::Disabled,
        VerifyType::Readonly,
        VerifyType::Required,
        VerifyType::State,
        VerifyType::Url,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyType::Text => "text",
            VerifyType::Value => "value",
            VerifyType::Placeholder => "placeholder",
            VerifyType::Href => "href",
            VerifyType::Src => "src",
            VerifyType::Alt => "alt",
            VerifyType::Title => "title",
            VerifyType::Class => "class",
            VerifyType::Id => "id",
            VerifyType::Name => "name",
            VerifyType::Checked => "checked",
            VerifyType::Selected => "selected",
            VerifyType::Disabled => "disabled",
            VerifyType::Readonly => "readonly",
            VerifyType::Required => "required",
            VerifyType::State => "state",
            VerifyType::Url => "url",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == lower)
    }
}

impl fmt::Display for VerifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a verify statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Is,
}

impl VerifyOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyOperator::Equals => "equals",
            VerifyOperator::Contains => "contains",
            VerifyOperator::StartsWith => "starts_with",
            VerifyOperator::EndsWith => "ends_with",
            VerifyOperator::Is => "is",
        }
    }

    /// Parse `equals`, `starts with`, `starts_with`, ... in any case.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_ascii_lowercase();
        match normalized.as_str() {
            "equals" => Some(VerifyOperator::Equals),
            "contains" => Some(VerifyOperator::Contains),
            "starts_with" => Some(VerifyOperator::StartsWith),
            "ends_with" => Some(VerifyOperator::EndsWith),
            "is" => Some(VerifyOperator::Is),
            _ => None,
        }
    }

    /// Apply the operator. `Is` has no string semantics and yields `None`.
    pub fn matches(&self, actual: &str, expected: &str) -> Option<bool> {
        match self {
            VerifyOperator::Equals => Some(actual == expected),
            VerifyOperator::Contains => Some(actual.contains(expected)),
            VerifyOperator::StartsWith => Some(actual.starts_with(expected)),
            VerifyOperator::EndsWith => Some(actual.ends_with(expected)),
            VerifyOperator::Is => None,
        }
    }
}

impl fmt::Display for VerifyOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementState {
    Visible,
    Enabled,
    Checked,
    Disabled,
    Hidden,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Visible => "visible",
            ElementState::Enabled => "enabled",
            ElementState::Checked => "checked",
            ElementState::Disabled => "disabled",
            ElementState::Hidden => "hidden",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visible" => Some(ElementState::Visible),
            "enabled" => Some(ElementState::Enabled),
            "checked" => Some(ElementState::Checked),
            "disabled" => Some(ElementState::Disabled),
            "hidden" => Some(ElementState::Hidden),
            _ => None,
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageTarget {
    Title,
    Url,
}

impl PageTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageTarget::Title => "title",
            PageTarget::Url => "url",
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
