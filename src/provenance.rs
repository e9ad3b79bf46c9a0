//! Entity provenance
//!
//! Maps each entity key to the documents (and lines) that declare it.
//! Line numbers come from a textual scan for `'#Key':` / `"#Key":` and are
//! best effort: a key formatted any other way is reported at line 1.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::document::LoadedDocument;

/// One declaration of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySource {
    pub document_location: PathBuf,
    pub line_number: usize,
}

/// Entity key -> declarations, least specific document first
pub type EntitySources = BTreeMap<String, Vec<EntitySource>>;

fn declaration_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*(?:'(#[^']*)'|"(#[^"]*)")\s*:"#).unwrap())
}

/// First declaration line (1-based) of every quoted entity key in `text`
pub fn scan_declarations(text: &str) -> HashMap<String, usize> {
    let mut lines = HashMap::new();
    for (index, line) in text.lines().enumerate() {
        if let Some(caps) = declaration_line().captures(line) {
            if let Some(key) = caps.get(1).or_else(|| caps.get(2)) {
                lines.entry(key.as_str().to_string()).or_insert(index + 1);
            }
        }
    }
    lines
}

/// Build the provenance map for documents given in merge order.
///
/// Documents are visited most specific first, as resolution discovers
/// them, and each list is reversed at the end so the least specific
/// declaration comes first.
pub fn track_entity_sources(documents: &[LoadedDocument]) -> EntitySources {
    let mut sources = EntitySources::new();

    for doc in documents.iter().rev() {
        let lines = scan_declarations(&doc.raw_text);
        for key in doc.entities.keys() {
            sources.entry(key.clone()).or_default().push(EntitySource {
                document_location: doc.path.clone(),
                line_number: lines.get(key).copied().unwrap_or(1),
            });
        }
    }

    for list in sources.values_mut() {
        list.reverse();
    }
    sources
}
