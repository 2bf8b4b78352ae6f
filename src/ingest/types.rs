// src/ingest/types.rs
use anyhow::Result;
use serde_json::{Map, Value};

use super::knowledge_base::KbSection;

/// One raw knowledge-base article with its raw (Chinese-keyed) fields.
#[derive(Debug, Clone, PartialEq)]
pub struct KbEntry {
    pub section: KbSection,
    pub fields: Map<String, Value>,
}

impl KbEntry {
    /// Trimmed string field; empty when absent or not a string.
    pub fn text(&self, key: &str) -> &str {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
    }

    /// First non-empty field among `keys`.
    pub fn first_text(&self, keys: &[&str]) -> &str {
        keys.iter()
            .map(|k| self.text(k))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }

    /// Explicit `标签` list; non-string entries are ignored.
    pub fn explicit_tags(&self) -> Vec<String> {
        match self.fields.get("标签") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            Some(Value::String(s)) => s
                .split([',', '，', ';', '；'])
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<KbEntry>>;
    fn name(&self) -> &'static str;
}
