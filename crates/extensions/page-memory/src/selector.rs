//! CSS selector subset: type, universal, `#id`, `.class` and attribute
//! selectors joined by descendant (` `) or child (`>`) combinators, with
//! comma-separated groups.

use herbie_protocols::PageError;

use crate::dom::{Dom, NodeId};

#[derive(Debug, Clone, PartialEq)]
enum AttrMatch {
    Exists,
    Equals(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrMatch)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

/// One comma-separated alternative, rightmost compound last.
#[derive(Debug, Clone, PartialEq)]
struct Chain {
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectorList {
    chains: Vec<Chain>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, PageError> {
        let invalid = || PageError::InvalidSelector(input.to_string());
        let mut chains = Vec::new();
        for group in split_groups(input) {
            let group = group.trim();
            if group.is_empty() {
                return Err(invalid());
            }
            chains.push(parse_chain(group).ok_or_else(invalid)?);
        }
        if chains.is_empty() {
            return Err(invalid());
        }
        Ok(Self { chains })
    }

    pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        self.chains.iter().any(|c| chain_matches(dom, node, &c.parts))
    }

    /// Matching elements under `root` in document order.
    pub fn select_all(&self, dom: &Dom, root: NodeId) -> Vec<NodeId> {
        dom.descendant_elements(root)
            .into_iter()
            .filter(|n| self.matches(dom, *n))
            .collect()
    }
}

fn split_groups(input: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                groups.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    groups.push(&input[start..]);
    groups
}

fn parse_chain(input: &str) -> Option<Chain> {
    let chars: Vec<char> = input.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;
    let mut combinator = Combinator::Descendant;

    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        if chars[i] == '>' {
            if parts.is_empty() || combinator == Combinator::Child {
                return None;
            }
            combinator = Combinator::Child;
            i += 1;
            continue;
        }
        let (compound, next) = parse_compound(&chars, i)?;
        parts.push((combinator, compound));
        combinator = Combinator::Descendant;
        i = next;
    }

    if parts.is_empty() || combinator == Combinator::Child {
        return None;
    }
    Some(Chain { parts })
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_compound(chars: &[char], mut i: usize) -> Option<(Compound, usize)> {
    let mut compound = Compound::default();
    let start = i;

    if chars[i] == '*' {
        i += 1;
    } else if is_ident(chars[i]) {
        let (tag, next) = read_ident(chars, i);
        compound.tag = Some(tag.to_ascii_lowercase());
        i = next;
    }

    while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '>' {
        match chars[i] {
            '#' => {
                let (id, next) = read_ident(chars, i + 1);
                if id.is_empty() {
                    return None;
                }
                compound.id = Some(id);
                i = next;
            }
            '.' => {
                let (class, next) = read_ident(chars, i + 1);
                if class.is_empty() {
                    return None;
                }
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|c| *c == ']')? + i;
                let body: String = chars[i + 1..close].iter().collect();
                compound.attrs.push(parse_attr(&body)?);
                i = close + 1;
            }
            _ => return None,
        }
    }

    (i > start).then_some((compound, i))
}

fn parse_attr(body: &str) -> Option<(String, AttrMatch)> {
    let body = body.trim();
    match body.split_once('=') {
        None => {
            let name = body.to_ascii_lowercase();
            (!name.is_empty() && name.chars().all(is_ident)).then_some((name, AttrMatch::Exists))
        }
        Some((name, value)) => {
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() || !name.chars().all(is_ident) {
                return None;
            }
            let value = value.trim();
            let value = match value.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let inner = value.strip_prefix(q)?.strip_suffix(q)?;
                    inner.to_string()
                }
                _ if !value.is_empty() && value.chars().all(is_ident) => value.to_string(),
                _ => return None,
            };
            Some((name, AttrMatch::Equals(value)))
        }
    }
}

fn compound_matches(dom: &Dom, node: NodeId, compound: &Compound) -> bool {
    let Some(el) = dom.element(node) else {
        return false;
    };
    if compound.tag.as_ref().is_some_and(|tag| el.tag != *tag) {
        return false;
    }
    if compound
        .id
        .as_ref()
        .is_some_and(|id| dom.attr(node, "id") != Some(id.as_str()))
    {
        return false;
    }
    let classes = dom.classes(node);
    if !compound.classes.iter().all(|c| classes.contains(&c.as_str())) {
        return false;
    }
    compound.attrs.iter().all(|(name, m)| match (dom.attr(node, name), m) {
        (Some(_), AttrMatch::Exists) => true,
        (Some(v), AttrMatch::Equals(expected)) => v == expected,
        (None, _) => false,
    })
}

/// Right-to-left matching of `parts` ending at `node`.
fn chain_matches(dom: &Dom, node: NodeId, parts: &[(Combinator, Compound)]) -> bool {
    let Some(((combinator, compound), rest)) = parts.split_last() else {
        return true;
    };
    if !compound_matches(dom, node, compound) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match combinator {
        Combinator::Child => dom
            .parent(node)
            .is_some_and(|p| chain_matches(dom, p, rest)),
        Combinator::Descendant => dom
            .ancestors(node)
            .into_iter()
            .any(|a| chain_matches(dom, a, rest)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_into;

    fn dom(html: &str) -> Dom {
        let mut dom = Dom::new();
        parse_into(&mut dom, Dom::ROOT, html);
        dom
    }

    fn ids(dom: &Dom, selector: &str) -> Vec<String> {
        SelectorList::parse(selector)
            .unwrap()
            .select_all(dom, Dom::ROOT)
            .into_iter()
            .map(|n| dom.attr(n, "id").unwrap_or("").to_string())
            .collect()
    }

    const PAGE: &str = r#"
        <form id="f">
          <div id="d" class="row main">
            <input id="a" name="user" type="text">
            <span id="s"><input id="b" type="checkbox"></span>
          </div>
        </form>
        <button id="go" class="btn">Go</button>
    "#;

    #[test]
    fn test_simple_selectors() {
        let d = dom(PAGE);
        assert_eq!(ids(&d, "#go"), vec!["go"]);
        assert_eq!(ids(&d, "input"), vec!["a", "b"]);
        assert_eq!(ids(&d, ".row.main"), vec!["d"]);
        assert_eq!(ids(&d, "[name=user]"), vec!["a"]);
        assert_eq!(ids(&d, "input[type='checkbox']"), vec!["b"]);
    }

    #[test]
    fn test_combinators_and_groups() {
        let d = dom(PAGE);
        assert_eq!(ids(&d, "form input"), vec!["a", "b"]);
        assert_eq!(ids(&d, "div > input"), vec!["a"]);
        assert_eq!(ids(&d, "#go, #s"), vec!["s", "go"]);
        assert_eq!(ids(&d, "div>span>input"), vec!["b"]);
    }

    #[test]
    fn test_invalid_selectors() {
        for bad in ["", "Submit!", "div >", "a,,b", "[= x]", "#", "Log in:"] {
            assert!(SelectorList::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_plain_words_parse_as_type_selectors() {
        let d = dom(PAGE);
        // `Submit` is a valid type selector that matches nothing.
        assert!(ids(&d, "Submit").is_empty());
    }
}
