//! User records and the preference profile the recommender reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::{ContentKind, TaggedContent};

pub type UserId = u64;

/// Account tier; premium unlocks deals and non-free reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    #[default]
    Free,
    #[serde(alias = "paid")]
    Premium,
}

impl AccountTier {
    pub fn is_premium(&self) -> bool {
        matches!(self, AccountTier::Premium)
    }
}

/// Persisted user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub region: String,
    pub trading_products: Vec<String>,
    #[serde(rename = "user_type")]
    pub tier: AccountTier,
    /// Unique, insertion-ordered. Grows only.
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl UserRecord {
    /// Merge `tags` into the record. Returns how many were new.
    pub fn add_tags<S: AsRef<str>>(&mut self, tags: &[S], now: DateTime<Utc>) -> usize {
        let added = merge_unique(&mut self.tags, tags);
        self.updated_at = now;
        added
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// Append every non-blank tag not already present; never removes.
pub fn merge_unique<S: AsRef<str>>(existing: &mut Vec<String>, new_tags: &[S]) -> usize {
    let mut added = 0;
    for t in new_tags {
        let t = t.as_ref().trim();
        if t.is_empty() || existing.iter().any(|e| e == t) {
            continue;
        }
        existing.push(t.to_string());
        added += 1;
    }
    added
}

/// Read-only projection of a user used for matching content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub region: String,
    pub trading_products: Vec<String>,
    pub tags: Vec<String>,
    pub tier: AccountTier,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserProfile {
    fn from(u: &UserRecord) -> Self {
        Self {
            user_id: u.id,
            region: u.region.clone(),
            trading_products: u.trading_products.clone(),
            tags: u.tags.clone(),
            tier: u.tier,
            updated_at: u.updated_at,
        }
    }
}

impl UserProfile {
    /// Any content tag appears in the user's tag set.
    pub fn shares_tag(&self, content_tags: &[String]) -> bool {
        content_tags.iter().any(|t| self.tags.contains(t))
    }

    /// `text` mentions the user's region. An empty region matches nothing.
    pub fn region_in(&self, text: &str) -> bool {
        !self.region.is_empty() && text.contains(self.region.as_str())
    }

    /// `title` mentions any subscribed product name.
    pub fn product_in(&self, title: &str) -> bool {
        self.trading_products
            .iter()
            .any(|p| !p.is_empty() && title.contains(p.as_str()))
    }

    /// Tag intersection, or region in a news body, or a subscribed product
    /// in a report title.
    pub fn matches(&self, content: &TaggedContent) -> bool {
        if self.shares_tag(&content.tags) {
            return true;
        }
        match content.kind {
            ContentKind::News => self.region_in(&content.body),
            ContentKind::Report => self.product_in(&content.title),
        }
    }

    /// Free users only ever see free items.
    pub fn can_access(&self, content: &TaggedContent) -> bool {
        self.tier.is_premium() || content.is_free()
    }

    /// Merge new tags and bump the last-modified marker.
    pub fn add_tags<S: AsRef<str>>(mut self, tags: &[S], now: DateTime<Utc>) -> Self {
        merge_unique(&mut self.tags, tags);
        self.updated_at = now;
        self
    }
}
