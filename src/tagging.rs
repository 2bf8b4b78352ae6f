//! Tag extraction: literal, case-sensitive substring matching of taxonomy
//! triggers against a text blob.
//!
//! Substring matching yields false positives (a single-character region alias
//! inside an unrelated word, for instance); that is accepted behavior.

use std::collections::BTreeSet;

use crate::taxonomy::{TagRule, Taxonomy, TaxonomyGroup};

/// Tags from every group whose triggers occur in `text`.
pub fn extract_tags(text: &str, taxonomy: &Taxonomy) -> BTreeSet<String> {
    extract_groups(text, taxonomy, &TaxonomyGroup::ALL)
}

/// Tags from the selected groups only.
pub fn extract_groups(
    text: &str,
    taxonomy: &Taxonomy,
    groups: &[TaxonomyGroup],
) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    if text.is_empty() {
        return out;
    }
    for g in groups {
        out.extend(
            match_rules(text, taxonomy.group(*g))
                .into_iter()
                .map(String::from),
        );
    }
    out
}

/// Matching tags of one rule list, in rule order, each at most once.
pub fn match_rules<'a>(text: &str, rules: &'a [TagRule]) -> Vec<&'a str> {
    let mut hits: Vec<&str> = Vec::new();
    for rule in rules {
        // first trigger found is enough
        if rule.triggers.iter().any(|t| text.contains(t.as_str()))
            && !hits.contains(&rule.tag.as_str())
        {
            hits.push(rule.tag.as_str());
        }
    }
    hits
}

/// Merge extracted tags into an explicit tag list, keeping the explicit order
/// first and dropping duplicates and blanks.
pub fn merge_tags<I, S>(explicit: Vec<String>, extracted: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::with_capacity(explicit.len());
    let extracted = extracted.into_iter().map(|s| -> String { s.into() });
    for tag in explicit.into_iter().chain(extracted) {
        let t = tag.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
