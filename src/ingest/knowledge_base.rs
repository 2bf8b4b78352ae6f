// src/ingest/knowledge_base.rs
//! Knowledge-base export: a JSON object keyed by section name, each holding
//! an array of articles.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::PathBuf;

use super::normalize_text;
use super::types::{KbEntry, SourceProvider};
use crate::content::{ContentKind, TaggedContent};
use crate::dates::parse_date;
use crate::tagging::{extract_groups, merge_tags};
use crate::taxonomy::{Taxonomy, TaxonomyGroup};

/// Publisher recorded on exchange-authored articles.
pub const EXCHANGE_SOURCE: &str = "上海石油天然气交易中心";
pub const POLICY_SOURCE: &str = "政策发布";
/// Summary length kept for guide reports.
pub const SUMMARY_CHARS: usize = 200;
/// Policy titles mentioning these issuers are featured.
const FEATURED_ISSUERS: &[&str] = &["国家能源局", "发改委"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KbSection {
    /// 规章制度知识库
    Regulations,
    /// 上市品种与交易指引知识库
    TradingGuides,
    /// 客服助手知识库
    ServiceDesk,
    /// 政策数据详情知识库
    PolicyDetails,
}

impl KbSection {
    pub const ALL: [KbSection; 4] = [
        KbSection::Regulations,
        KbSection::TradingGuides,
        KbSection::ServiceDesk,
        KbSection::PolicyDetails,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            KbSection::Regulations => "规章制度知识库",
            KbSection::TradingGuides => "上市品种与交易指引知识库",
            KbSection::ServiceDesk => "客服助手知识库",
            KbSection::PolicyDetails => "政策数据详情知识库",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key.trim())
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            KbSection::TradingGuides => ContentKind::Report,
            _ => ContentKind::News,
        }
    }

    /// News category, or report type for guides.
    pub fn category(&self) -> &'static str {
        match self {
            KbSection::Regulations => "规章制度",
            KbSection::TradingGuides => "交易指引",
            KbSection::ServiceDesk => "服务指南",
            KbSection::PolicyDetails => "政策法规",
        }
    }

    /// Taxonomy groups searched for tags.
    pub fn groups(&self) -> &'static [TaxonomyGroup] {
        match self {
            KbSection::Regulations | KbSection::PolicyDetails => &TaxonomyGroup::ALL,
            KbSection::TradingGuides => &[TaxonomyGroup::Region, TaxonomyGroup::Product],
            KbSection::ServiceDesk => &[TaxonomyGroup::Region, TaxonomyGroup::Policy],
        }
    }

    fn title_keys(&self) -> &'static [&'static str] {
        match self {
            KbSection::Regulations | KbSection::ServiceDesk => &["详情标题", "标题"],
            KbSection::TradingGuides | KbSection::PolicyDetails => &["标题"],
        }
    }

    fn body_key(&self) -> &'static str {
        match self {
            KbSection::PolicyDetails => "详细内容",
            _ => "详情内容",
        }
    }

    fn date_key(&self) -> &'static str {
        match self {
            KbSection::PolicyDetails => "发布日期",
            _ => "发布时间",
        }
    }

    fn url_key(&self) -> &'static str {
        match self {
            KbSection::PolicyDetails => "链接",
            _ => "页面地址",
        }
    }
}

/// Split a knowledge-base document into entries. Unknown sections are
/// skipped; a known section that is not an array is an error.
pub fn parse_document(json: &str) -> Result<Vec<KbEntry>> {
    let root: Value = serde_json::from_str(json).context("knowledge base is not valid JSON")?;
    let Value::Object(sections) = root else {
        return Err(anyhow!("knowledge base root must be an object"));
    };
    let mut out = Vec::new();
    // section order is fixed so imports are reproducible
    for section in KbSection::ALL {
        let Some(v) = sections.get(section.key()) else {
            continue;
        };
        let items = v
            .as_array()
            .ok_or_else(|| anyhow!("section {} must be an array", section.key()))?;
        for item in items {
            if let Value::Object(fields) = item {
                out.push(KbEntry {
                    section,
                    fields: fields.clone(),
                });
            }
        }
    }
    for key in sections.keys() {
        if KbSection::from_key(key).is_none() {
            tracing::debug!(target: "ingest", section = %key, "unknown knowledge-base section skipped");
        }
    }
    Ok(out)
}

fn summarize(body: &str) -> String {
    if body.chars().count() > SUMMARY_CHARS {
        let head: String = body.chars().take(SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

/// Turn one entry into a tagged news item or report. `None` when it has no
/// title after normalization.
pub fn to_content(entry: &KbEntry, taxonomy: &Taxonomy) -> Option<TaggedContent> {
    let section = entry.section;
    let title = normalize_text(entry.first_text(section.title_keys()));
    if title.is_empty() {
        return None;
    }
    let body = normalize_text(entry.text(section.body_key()));

    let scanned = match section {
        KbSection::PolicyDetails => format!("{title} {body}"),
        _ => body.clone(),
    };
    let extracted = extract_groups(&scanned, taxonomy, section.groups());
    let tags = merge_tags(entry.explicit_tags(), extracted);

    let published_at = parse_date(entry.text(section.date_key()));
    let url = Some(entry.text(section.url_key()).to_string()).filter(|u| !u.is_empty());

    let mut item = match section.kind() {
        ContentKind::News => TaggedContent::news(title, body, published_at),
        ContentKind::Report => {
            let mut r = TaggedContent::report(title, summarize(&body), published_at);
            r.author = Some(EXCHANGE_SOURCE.to_string());
            r
        }
    };
    item.category = section.category().to_string();
    item.tags = tags;
    item.url = url;
    item.source = Some(
        match section {
            KbSection::PolicyDetails => POLICY_SOURCE,
            _ => EXCHANGE_SOURCE,
        }
        .to_string(),
    );
    item.is_featured = section == KbSection::PolicyDetails
        && FEATURED_ISSUERS.iter().any(|i| item.title.contains(i));
    Some(item)
}

#[derive(Debug, Clone)]
enum KbSource {
    File(PathBuf),
    Inline(String),
}

/// Reads a knowledge-base export from disk or from an in-memory string.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseProvider {
    source: KbSource,
}

impl KnowledgeBaseProvider {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: KbSource::File(path.into()),
        }
    }

    pub fn from_json_str(json: impl Into<String>) -> Self {
        Self {
            source: KbSource::Inline(json.into()),
        }
    }
}

#[async_trait::async_trait]
impl SourceProvider for KnowledgeBaseProvider {
    async fn fetch_entries(&self) -> Result<Vec<KbEntry>> {
        match &self.source {
            KbSource::File(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading knowledge base {}", path.display()))?;
                parse_document(&raw)
            }
            KbSource::Inline(raw) => parse_document(raw),
        }
    }

    fn name(&self) -> &'static str {
        "knowledge_base"
    }
}
