// src/ingest/mod.rs
pub mod knowledge_base;
pub mod types;

use crate::ingest::types::SourceProvider;
use crate::store::ContentStore;
use crate::taxonomy::Taxonomy;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Knowledge-base entries read from providers.");
        describe_counter!("ingest_inserted_total", "Entries stored as news or reports.");
        describe_counter!(
            "ingest_duplicates_total",
            "Entries skipped because the title already exists."
        );
        describe_counter!("ingest_skipped_empty_total", "Entries without a usable title.");
        describe_counter!("ingest_provider_errors_total", "Provider read/parse errors.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when ingestion last ran.");
    });
}

/// Normalize text: decode entities, strip markup, unify quotes, collapse
/// whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("static tag regex")
    });
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Curly quotes to ASCII; fullwidth CJK quotes are kept
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (NBSP and ideographic space included)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static ws regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped_empty: usize,
}

/// Read every provider, tag the entries and store them. Items whose title is
/// already present in the target collection are skipped, so re-running an
/// import is harmless.
///
/// Provider failures are logged and counted; store failures abort the run.
pub async fn run_once(
    providers: &[Box<dyn SourceProvider>],
    store: &dyn ContentStore,
    taxonomy: &Taxonomy,
) -> anyhow::Result<IngestReport> {
    ensure_metrics_described();

    let mut entries = Vec::new();
    for p in providers {
        match p.fetch_entries().await {
            Ok(mut v) => entries.append(&mut v),
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }
    }
    counter!("ingest_items_total").increment(entries.len() as u64);

    let mut report = IngestReport::default();
    for entry in &entries {
        let Some(item) = knowledge_base::to_content(entry, taxonomy) else {
            report.skipped_empty += 1;
            continue;
        };
        let title = item.title.clone();
        match store.insert_content(item).await? {
            Some(id) => {
                report.inserted += 1;
                tracing::debug!(target: "ingest", id, section = entry.section.key(), %title, "inserted");
            }
            None => report.duplicates += 1,
        }
    }

    counter!("ingest_inserted_total").increment(report.inserted as u64);
    counter!("ingest_duplicates_total").increment(report.duplicates as u64);
    counter!("ingest_skipped_empty_total").increment(report.skipped_empty as u64);
    gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

    tracing::info!(
        target: "ingest",
        inserted = report.inserted,
        duplicates = report.duplicates,
        skipped_empty = report.skipped_empty,
        "knowledge base import finished"
    );
    Ok(report)
}
