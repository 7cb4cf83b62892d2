//! Keyword alias resolution.
//!
//! A command's locator operand may name a keyword. Local keywords are scoped
//! to the page's registrable domain and shadow global ones.

use herbie_protocols::command::{is_quoted, unquote};
use herbie_protocols::keyword::VARIABLE_PLACEHOLDER;
use herbie_protocols::{Command, Keyword, KeywordStore, StoreError};
use tracing::{debug, warn};
use url::Url;

/// Keywords in effect for one parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordSet {
    pub global: Vec<Keyword>,
    pub local: Vec<Keyword>,
}

impl KeywordSet {
    pub fn new(global: Vec<Keyword>, local: Vec<Keyword>) -> Self {
        Self { global, local }
    }

    /// Load the global table and, when `url` has a host, its domain's table.
    pub async fn load(store: &dyn KeywordStore, url: Option<&str>) -> Result<Self, StoreError> {
        let global = store.global_keywords().await?;
        let local = match url.and_then(domain_for_url) {
            Some(domain) => store.local_keywords(&domain).await?,
            None => Vec::new(),
        };
        debug!(global = global.len(), local = local.len(), "Loaded keywords");
        Ok(Self { global, local })
    }

    pub fn lookup(&self, name: &str) -> Option<&Keyword> {
        self.local
            .iter()
            .find(|k| k.keyword == name)
            .or_else(|| self.global.iter().find(|k| k.keyword == name))
    }
}

/// Replace a keyword locator operand with its XPath.
///
/// Resolving an already resolved command leaves it unchanged, as long as
/// keyword XPaths start with `/`.
pub fn resolve_keywords(cmd: &mut Command, keywords: &KeywordSet) {
    let Some(in_index) = cmd.in_index() else {
        return;
    };
    if in_index + 1 >= cmd.code.len() {
        return;
    }

    if cmd.is_verify() {
        cmd.code.truncate(in_index + 2);
    }

    let target = unquote(&cmd.code[in_index + 1]).to_string();
    if target.starts_with('/') {
        return;
    }

    let Some(keyword) = keywords.lookup(&target) else {
        return;
    };
    debug!(keyword = %target, xpath = %keyword.xpath, "Resolved keyword");

    let xpath = if keyword.has_variable {
        let mut variables: Vec<&str> = cmd
            .code
            .iter()
            .filter(|t| is_quoted(t))
            .map(|t| unquote(t))
            .collect();
        if matches!(cmd.verb(), Some("type" | "verify" | "select")) && !variables.is_empty() {
            variables.remove(0);
        }
        let mut xpath = keyword.xpath.clone();
        for variable in variables {
            xpath = xpath.replacen(VARIABLE_PLACEHOLDER, &format!("'{variable}'"), 1);
        }
        xpath
    } else {
        keyword.xpath.clone()
    };

    if cmd.is_verify() && cmd.verify_locator.is_some() {
        cmd.verify_locator = Some(xpath.clone());
    }
    cmd.code[in_index + 1] = xpath;
}

/// Last two dot-separated labels of `host`.
///
/// This is not public-suffix aware: `a.example.co.uk` reduces to `co.uk`.
pub fn registrable_domain(host: &str) -> &str {
    let mut dots = host.rmatch_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((second, _))) => &host[second + 1..],
        _ => host,
    }
}

/// Registrable domain of a page URL, used as the local keyword scope.
pub fn domain_for_url(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|host| registrable_domain(host).to_string()),
        Err(e) => {
            warn!(url, error = %e, "Invalid URL, skipping local keywords");
            None
        }
    }
}

#[cfg(test)]
#[path = "keywords_tests.rs"]
mod tests;
