//! Persisted state document.

use std::collections::BTreeMap;

use herbie_protocols::{Command, Keyword};
use serde::{Deserialize, Serialize};

/// Keyword tables keyed the way the browser extension stores them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTables {
    #[serde(default, rename = "globalKeywords")]
    pub global: Vec<Keyword>,

    /// Keywords per registrable domain.
    #[serde(default, rename = "localKeywords")]
    pub local: BTreeMap<String, Vec<Keyword>>,
}

impl KeywordTables {
    /// Merge `other` into `self`, replacing keywords with the same name.
    pub fn merge(&mut self, other: KeywordTables) {
        merge_into(&mut self.global, other.global);
        for (domain, keywords) in other.local {
            merge_into(self.local.entry(domain).or_default(), keywords);
        }
    }
}

fn merge_into(target: &mut Vec<Keyword>, incoming: Vec<Keyword>) {
    for kw in incoming {
        match target.iter_mut().find(|k| k.keyword == kw.keyword) {
            Some(existing) => *existing = kw,
            None => target.push(kw),
        }
    }
}

/// Everything a run needs to survive a page reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(flatten)]
    pub keywords: KeywordTables,

    /// Last completed top-level step.
    #[serde(default, rename = "herbiestartline")]
    pub cursor: Option<usize>,

    #[serde(default, rename = "herbie_stop")]
    pub stop: bool,

    #[serde(default)]
    pub cmdtree: Vec<Command>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        let mut state = PersistedState::default();
        state.cursor = Some(3);
        state.stop = true;
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"herbiestartline\":3"));
        assert!(json.contains("\"herbie_stop\":true"));
        assert!(json.contains("globalKeywords"));
        assert!(json.contains("localKeywords"));
    }

    #[test]
    fn test_empty_document_deserializes() {
        let state: PersistedState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, PersistedState::default());
    }

    #[test]
    fn test_merge_replaces_by_name() {
        let mut tables = KeywordTables {
            global: vec![Keyword::new("save", "//button[1]")],
            local: BTreeMap::new(),
        };
        let mut incoming = KeywordTables::default();
        incoming.global.push(Keyword::new("save", "//button[2]"));
        incoming.global.push(Keyword::new("cancel", "//button[3]"));
        incoming
            .local
            .insert("example.com".to_string(), vec![Keyword::new("save", "#s")]);

        tables.merge(incoming);
        assert_eq!(tables.global.len(), 2);
        assert_eq!(tables.global[0].xpath, "//button[2]");
        assert_eq!(tables.local["example.com"][0].xpath, "#s");
    }
}
