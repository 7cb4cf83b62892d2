//! Line tokenizer and statement builder.

use std::sync::LazyLock;

use herbie_protocols::Command;
use herbie_protocols::command::IN as IN_TOKEN;
use regex::Regex;
use tracing::warn;

use super::verify;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\w+|'[^']+'|"[^"]+"|\{\{(.*?)\}\}|\*|:"#).expect("token pattern")
});

static BULLET_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*[^:]+|:.+").expect("bullet pattern"));

pub(crate) fn tokenize(line: &str) -> Vec<&str> {
    TOKEN.find_iter(line).map(|m| m.as_str()).collect()
}

/// `* Field: value` becomes `type value in Field`.
///
/// Returns `None` when the line is not a well-formed bullet, in which case it
/// is tokenized like any other line.
pub(crate) fn parse_bullet(trimmed: &str) -> Option<Vec<String>> {
    if !trimmed.starts_with('*') {
        return None;
    }
    let parts: Vec<&str> = BULLET_PART.find_iter(trimmed).map(|m| m.as_str()).collect();
    if parts.len() < 2 {
        return None;
    }
    // Both prefixes are single ASCII bytes.
    let field = parts[0][1..].trim();
    let value = parts[1][1..].trim();
    Some(vec![
        "type".to_string(),
        value.to_string(),
        IN_TOKEN.to_string(),
        field.to_string(),
    ])
}

/// Fill `cmd.code` from the tokens of its source line.
pub(crate) fn parse_statement(tokens: &[&str], cmd: &mut Command) {
    let mut unparsed_verify = false;
    let mut j = 0;

    while j < tokens.len() {
        let token = tokens[j];
        j += 1;

        if token.starts_with(['{', '"', '\'']) {
            cmd.code.push(token.to_string());
            continue;
        }

        let candidate = token.to_lowercase();
        match candidate.as_str() {
            "click" => {
                cmd.code.push(candidate);
                cmd.code.push(IN_TOKEN.to_string());
            }
            "wait" => {
                cmd.code.push(candidate);
                if let Some(duration) = tokens.get(j) {
                    cmd.code.push((*duration).to_string());
                    j += 1;
                }
            }
            "type" | "capture" | "test" | "open" | "switch" | "navigate" | "press" | "select"
            | "under" | "mouseover" => cmd.code.push(candidate),
            "button" | "close" | "autocomplete" | "ok" | "save" => cmd.code.push(candidate),
            "on" | "in" | "into" => {
                if cmd.code.last().is_some_and(|t| t != IN_TOKEN) {
                    cmd.code.push(IN_TOKEN.to_string());
                }
            }
            "verify" => {
                if let Some(parsed) = verify::parse_verification(&cmd.src) {
                    parsed.apply(cmd);
                    return;
                }
                warn!(src = %cmd.src, "Could not parse verification statement");
                verify::apply_fallback(cmd);
                unparsed_verify = true;
            }
            _ => {}
        }
    }

    if unparsed_verify && cmd.in_index().is_none() {
        cmd.code.push(IN_TOKEN.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(line: &str) -> Vec<String> {
        let mut cmd = Command::new(0, line.trim(), 5000);
        parse_statement(&tokenize(line.trim()), &mut cmd);
        cmd.code
    }

    #[test]
    fn test_tokenize_keeps_quoted_literals() {
        assert_eq!(
            tokenize(r#"type "Bob Smith" into 'first name'"#),
            vec!["type", "\"Bob Smith\"", "into", "'first name'"]
        );
        assert_eq!(tokenize("click {{button}}"), vec!["click", "{{button}}"]);
    }

    #[test]
    fn test_click_collapses_connectives() {
        assert_eq!(codes("Click on 'Submit'"), vec!["click", "in", "'Submit'"]);
        assert_eq!(codes("click in into 'x'"), vec!["click", "in", "'x'"]);
    }

    #[test]
    fn test_type_into_field() {
        assert_eq!(
            codes("type 'Bob' in 'firstname'"),
            vec!["type", "'Bob'", "in", "'firstname'"]
        );
    }

    #[test]
    fn test_leading_connective_is_dropped() {
        assert_eq!(codes("in 'x' click"), vec!["'x'", "click", "in"]);
        assert!(codes("on").is_empty());
    }

    #[test]
    fn test_wait_takes_operand_verbatim() {
        assert_eq!(codes("wait 2000"), vec!["wait", "2000"]);
        assert_eq!(codes("Wait Soon"), vec!["wait", "Soon"]);
    }

    #[test]
    fn test_unknown_words_dropped() {
        assert_eq!(codes("please click the big button"), vec!["click", "in", "button"]);
        assert!(codes("hello world").is_empty());
    }

    #[test]
    fn test_bullet() {
        assert_eq!(
            parse_bullet("* First Name: Bob Smith").unwrap(),
            vec!["type", "Bob Smith", "in", "First Name"]
        );
        assert_eq!(parse_bullet("* no colon here"), None);
        assert_eq!(parse_bullet("type 'a'"), None);
    }

    #[test]
    fn test_unparsed_verify_appends_in() {
        assert_eq!(codes("verify 'Thanks'"), vec!["verify", "'Thanks'", "in"]);
        assert_eq!(
            codes("verify 'Thanks' on '#msg'"),
            vec!["verify", "'Thanks'", "in", "'#msg'"]
        );
    }

    #[test]
    fn test_matched_verify_is_final() {
        assert_eq!(
            codes(r##"verify text equals "Welcome" in "#header""##),
            vec!["verify", "\"Welcome\"", "in", "\"#header\""]
        );
        assert_eq!(
            codes(r#"verify title contains "Dashboard""#),
            vec!["verify", "\"Dashboard\""]
        );
    }
}
