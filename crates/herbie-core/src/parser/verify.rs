//! Verification statement sub-parser.
//!
//! Pattern families are tried in order and the first match wins:
//!
//! 1. `verify [that] [the] text [of X] <op> "v" [in "loc"]`
//! 2. `verify [that] [the] value|placeholder [of X] <op> "v" [in "loc"]`
//! 3. `verify [that] [the] state [of X] is <state> [in "loc"]`
//! 4. `verify [that] [the] title|url <op> "v"`
//! 5. `verify "v" in "loc"` (text, contains)

use std::sync::LazyLock;

use herbie_protocols::command::IN;
use herbie_protocols::{Command, VerifyOperator, VerifyType};
use regex::{Captures, Regex};

const OP: &str = r"(equals|contains|starts\s+with|ends\s+with)";

/// A locator in quotes that may itself contain quoted XPath literals.
const LOC: &str = r#"[^"]*(?:(?:'[^']*'|"[^"]*")[^"']*)*"#;

const PREFIX: &str = r"(?i)verify\s+(?:that\s+)?(?:the\s+)?";

fn build(pattern: String) -> Regex {
    Regex::new(&pattern).expect("verification pattern")
}

static TEXT: LazyLock<Regex> = LazyLock::new(|| {
    build(format!(
        r#"{PREFIX}text(?:\s+of\s+((?s:.+?)))?\s+{OP}\s+["']([^"']+)["']\s*(?:in\s+["']({LOC})["'])?"#
    ))
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    build(format!(
        r#"{PREFIX}(value|placeholder)(?:\s+of\s+((?s:.+?)))?\s+{OP}\s+["']([^"']+)["']\s*(?:in\s+["']({LOC})["'])?"#
    ))
});

static STATE: LazyLock<Regex> = LazyLock::new(|| {
    build(format!(
        r#"{PREFIX}state(?:\s+of\s+((?s:.+?)))?\s+is\s+(visible|enabled|checked|disabled|hidden)\s*(?:in\s+["']({LOC})["'])?"#
    ))
});

static PAGE: LazyLock<Regex> = LazyLock::new(|| {
    build(format!(r#"{PREFIX}(title|url)\s+{OP}\s+["']([^"']+)["']"#))
});

static SIMPLE: LazyLock<Regex> = LazyLock::new(|| {
    build(format!(r#"(?i)verify\s+["']([^"']+)["']\s+in\s+["']({LOC})["']"#))
});

/// Fields recovered from a verify statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedVerification {
    pub verify_type: VerifyType,
    pub operator: VerifyOperator,
    pub expected: String,
    pub locator: Option<String>,
    pub target: Option<String>,
}

impl ParsedVerification {
    /// Write the fields into `cmd` and reset `code` to its normal form.
    pub fn apply(self, cmd: &mut Command) {
        cmd.code = vec!["verify".to_string(), format!("\"{}\"", self.expected)];
        if let Some(locator) = &self.locator {
            cmd.code.push(IN.to_string());
            cmd.code.push(format!("\"{locator}\""));
        }
        cmd.verify_type = Some(self.verify_type);
        cmd.verify_operator = Some(self.operator);
        cmd.verify_expected = Some(self.expected);
        cmd.verify_locator = self.locator;
        cmd.verify_target = self.target;
    }
}

/// Best-effort form for statements no pattern recognizes.
pub(crate) fn apply_fallback(cmd: &mut Command) {
    cmd.code.push("verify".to_string());
    cmd.verify_type = Some(VerifyType::Text);
    cmd.verify_operator = Some(VerifyOperator::Contains);
}

fn text(caps: &Captures<'_>, i: usize) -> Option<String> {
    caps.get(i)
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

fn operator(caps: &Captures<'_>, i: usize) -> Option<VerifyOperator> {
    caps.get(i).and_then(|m| VerifyOperator::parse(m.as_str()))
}

pub(crate) fn parse_verification(src: &str) -> Option<ParsedVerification> {
    if let Some(caps) = TEXT.captures(src) {
        return Some(ParsedVerification {
            verify_type: VerifyType::Text,
            target: text(&caps, 1),
            operator: operator(&caps, 2)?,
            expected: text(&caps, 3)?,
            locator: text(&caps, 4),
        });
    }

    if let Some(caps) = ATTRIBUTE.captures(src) {
        return Some(ParsedVerification {
            verify_type: VerifyType::parse(&caps[1])?,
            target: text(&caps, 2),
            operator: operator(&caps, 3)?,
            expected: text(&caps, 4)?,
            locator: text(&caps, 5),
        });
    }

    if let Some(caps) = STATE.captures(src) {
        return Some(ParsedVerification {
            verify_type: VerifyType::State,
            target: text(&caps, 1),
            operator: VerifyOperator::Is,
            expected: caps[2].to_lowercase(),
            locator: text(&caps, 3),
        });
    }

    if let Some(caps) = PAGE.captures(src) {
        return Some(ParsedVerification {
            verify_type: VerifyType::parse(&caps[1])?,
            target: None,
            operator: operator(&caps, 2)?,
            expected: text(&caps, 3)?,
            locator: None,
        });
    }

    SIMPLE.captures(src).and_then(|caps| {
        Some(ParsedVerification {
            verify_type: VerifyType::Text,
            target: None,
            operator: VerifyOperator::Contains,
            expected: text(&caps, 1)?,
            locator: text(&caps, 2),
        })
    })
}
