//! Content records served by the portal: tagged news/reports plus price,
//! deal and index rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ContentId = u64;

/// Which collection a tagged item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    News,
    Report,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::News => "news",
            ContentKind::Report => "report",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "news" => Ok(ContentKind::News),
            "report" => Ok(ContentKind::Report),
            other => Err(format!("unknown content type `{other}`")),
        }
    }
}

/// Visibility tier of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Free,
    #[serde(alias = "paid")]
    Premium,
    Vip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Draft,
    #[default]
    Published,
    Archived,
}

/// A news item or research report with its taxonomy tags.
///
/// Tags are assigned at ingestion and only change through manual re-tagging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedContent {
    #[serde(default)]
    pub id: ContentId,
    #[serde(rename = "content_type")]
    pub kind: ContentKind,
    pub title: String,
    /// Article body for news, summary for reports.
    #[serde(rename = "content", default)]
    pub body: String,
    /// News category or report type.
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl TaggedContent {
    pub fn new(
        kind: ContentKind,
        title: impl Into<String>,
        body: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            kind,
            title: title.into(),
            body: body.into(),
            category: String::new(),
            source: None,
            author: None,
            tags: Vec::new(),
            published_at,
            access_level: AccessLevel::Free,
            status: PublishStatus::Published,
            is_featured: false,
            view_count: 0,
            url: None,
        }
    }

    pub fn news(
        title: impl Into<String>,
        body: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self::new(ContentKind::News, title, body, published_at)
    }

    pub fn report(
        title: impl Into<String>,
        summary: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self::new(ContentKind::Report, title, summary, published_at)
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = crate::tagging::merge_tags(Vec::new(), tags);
        self
    }

    pub fn with_access(mut self, level: AccessLevel) -> Self {
        self.access_level = level;
        self
    }

    pub fn with_status(mut self, status: PublishStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn featured(mut self, yes: bool) -> Self {
        self.is_featured = yes;
        self
    }

    pub fn with_views(mut self, views: u64) -> Self {
        self.view_count = views;
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == PublishStatus::Published
    }

    pub fn is_free(&self) -> bool {
        self.access_level == AccessLevel::Free
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    #[serde(default)]
    pub id: u64,
    pub product_name: String,
    pub product_type: String,
    pub region: String,
    pub price: f64,
    pub price_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    /// Only the newest row of a (product, region) series carries the flag.
    #[serde(default)]
    pub is_latest: bool,
    pub price_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    #[serde(default)]
    pub id: u64,
    pub deal_id: String,
    pub product_name: String,
    pub product_type: String,
    pub buyer: String,
    pub seller: String,
    pub deal_price: f64,
    pub deal_quantity: f64,
    /// Total traded value.
    pub deal_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_type: Option<String>,
    pub deal_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(default)]
    pub id: u64,
    pub index_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_code: Option<String>,
    pub index_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub index_date: DateTime<Utc>,
}
