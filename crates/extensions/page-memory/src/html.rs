//! Tolerant HTML parser building a [`Dom`].
//!
//! Handles the subset of HTML that test fixtures and simple pages use:
//! nested elements, quoted and unquoted attributes, void tags, comments,
//! doctype declarations, raw-text elements and the common entities.
//! Mismatched end tags close up to the nearest open element of the same
//! name and are ignored when nothing matches.

use crate::dom::{Dom, NodeId};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "title", "textarea"];

pub(crate) fn parse_into(dom: &mut Dom, parent: NodeId, html: &str) {
    let bytes = html.as_bytes();
    let mut stack: Vec<NodeId> = vec![parent];
    let mut i = 0;
    let mut text_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        let current = stack.last().copied().unwrap_or(parent);
        flush_text(dom, current, &html[text_start..i]);

        if html[i..].starts_with("<!--") {
            i = match html[i + 4..].find("-->") {
                Some(end) => i + 4 + end + 3,
                None => bytes.len(),
            };
            text_start = i;
            continue;
        }

        if html[i..].starts_with("<!") || html[i..].starts_with("<?") {
            i = find_byte(bytes, i, b'>').map(|p| p + 1).unwrap_or(bytes.len());
            text_start = i;
            continue;
        }

        if html[i..].starts_with("</") {
            let end = find_byte(bytes, i, b'>').unwrap_or(bytes.len());
            let name = html[i + 2..end].trim().to_ascii_lowercase();
            if let Some(pos) = stack
                .iter()
                .rposition(|n| *n != parent && dom.tag(*n) == Some(name.as_str()))
            {
                stack.truncate(pos);
            }
            i = (end + 1).min(bytes.len());
            text_start = i;
            continue;
        }

        let Some((tag, attrs, self_closing, next)) = parse_start_tag(html, i) else {
            // A stray '<' is text.
            i += 1;
            continue;
        };

        let element = dom.create_element(current, &tag, attrs);
        i = next;

        if RAW_TEXT_TAGS.contains(&tag.as_str()) && !self_closing {
            let close = format!("</{tag}");
            let lower = html[i..].to_ascii_lowercase();
            let end = lower.find(&close).map(|p| i + p).unwrap_or(bytes.len());
            let raw = &html[i..end];
            if !raw.is_empty() {
                let text = if tag == "script" || tag == "style" {
                    raw.to_string()
                } else {
                    decode_entities(raw)
                };
                dom.create_text(element, text);
            }
            i = find_byte(bytes, end, b'>').map(|p| p + 1).unwrap_or(bytes.len());
        } else if !self_closing && !VOID_TAGS.contains(&tag.as_str()) {
            stack.push(element);
        }
        text_start = i;
    }

    let current = stack.last().copied().unwrap_or(parent);
    flush_text(dom, current, &html[text_start.min(html.len())..]);
}

fn flush_text(dom: &mut Dom, parent: NodeId, raw: &str) {
    if raw.is_empty() {
        return;
    }
    dom.create_text(parent, decode_entities(raw));
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from..].iter().position(|b| *b == needle).map(|p| from + p)
}

/// Parse `<tag attr=...>` starting at `start`. Returns the tag name, its
/// attributes, whether it was self-closing and the index after `>`.
fn parse_start_tag(html: &str, start: usize) -> Option<(String, Vec<(String, String)>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = start + 1;

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-' || bytes[i] == b'_') {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let tag = html[name_start..i].to_ascii_lowercase();

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return Some((tag, attrs, self_closing, i));
        }
        match bytes[i] {
            b'>' => return Some((tag, attrs, self_closing, i + 1)),
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        if i == attr_start {
            // Junk such as a lone quote.
            i += 1;
            continue;
        }
        let name = html[attr_start..i].to_ascii_lowercase();
        self_closing = false;

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                let value_start = i + 1;
                let end = find_byte(bytes, value_start, quote).unwrap_or(bytes.len());
                value = decode_entities(&html[value_start..end]);
                i = (end + 1).min(bytes.len());
            } else {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = decode_entities(&html[value_start..i]);
            }
        }

        if !attrs.iter().any(|(k, _)| *k == name) {
            attrs.push((name, value));
        }
    }
}

pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';').filter(|e| *e <= 10) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
            }
            _ if entity.starts_with('#') => entity[1..].parse().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Dom {
        let mut dom = Dom::new();
        parse_into(&mut dom, Dom::ROOT, html);
        dom
    }

    #[test]
    fn test_nested_elements_and_attributes() {
        let dom = parse(r#"<div id="a" class='x y'><p>Hi <b>there</b></p><input name=q disabled></div>"#);
        let div = dom.by_id("a").unwrap();
        assert_eq!(dom.classes(div), vec!["x", "y"]);
        assert_eq!(dom.text_content(div), "Hi there");

        let input = dom.first_element_by_tag("input").unwrap();
        assert_eq!(dom.attr(input, "name"), Some("q"));
        assert_eq!(dom.attr(input, "disabled"), Some(""));
        assert_eq!(dom.parent(input), Some(div));
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        let dom = parse("<!DOCTYPE html><!-- <p>no</p> --><p>yes</p>");
        assert_eq!(dom.text_content(Dom::ROOT), "yes");
    }

    #[test]
    fn test_raw_text_tags() {
        let dom = parse("<title>A &amp; B</title><script>if (a < b) {}</script>");
        let title = dom.first_element_by_tag("title").unwrap();
        assert_eq!(dom.text_content(title), "A & B");
        let script = dom.first_element_by_tag("script").unwrap();
        assert_eq!(dom.text_content(script), "if (a < b) {}");
    }

    #[test]
    fn test_mismatched_end_tag_closes_to_match() {
        let dom = parse("<div><span>one</div><p>two</p>");
        let p = dom.first_element_by_tag("p").unwrap();
        assert_eq!(dom.parent(p), Some(Dom::ROOT));
    }

    #[test]
    fn test_uppercase_names_lowercased() {
        let dom = parse("<BUTTON ID='go'>Go</BUTTON>");
        let button = dom.first_element_by_tag("button").unwrap();
        assert_eq!(dom.attr(button, "id"), Some("go"));
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#65;&#x42; &bogus; &"), "a <b> AB &bogus; &");
    }
}
