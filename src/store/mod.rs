// src/store/mod.rs
//! Storage seams: content, users and behavior events.
//!
//! Every list read takes an explicit limit. Implementations must make the
//! tag merge and the behavior append atomic per record.

pub mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::behavior::BehaviorEvent;
use crate::content::{
    AccessLevel, ContentId, ContentKind, Deal, IndexRecord, PriceRecord, PublishStatus,
    TaggedContent,
};
use crate::error::StoreError;
use crate::profile::{AccountTier, UserId, UserProfile, UserRecord};

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of a filtered listing plus the total number of matches.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentSort {
    /// Publish time, newest first.
    #[default]
    Newest,
    /// View count, highest first; publish time breaks ties.
    MostViewed,
}

/// Filter for the news and report collections.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentQuery {
    pub kind: ContentKind,
    pub status: Option<PublishStatus>,
    pub category: Option<String>,
    pub access_level: Option<AccessLevel>,
    pub featured: Option<bool>,
    pub published_since: Option<DateTime<Utc>>,
    /// Candidates must satisfy `UserProfile::matches` for this profile.
    pub profile: Option<UserProfile>,
    /// Candidates must mention one of these in the title; empty means any.
    pub title_any: Vec<String>,
    pub sort: ContentSort,
    pub skip: usize,
    pub limit: usize,
}

impl ContentQuery {
    pub fn new(kind: ContentKind, limit: usize) -> Self {
        Self {
            kind,
            status: None,
            category: None,
            access_level: None,
            featured: None,
            published_since: None,
            profile: None,
            title_any: Vec::new(),
            sort: ContentSort::Newest,
            skip: 0,
            limit,
        }
    }

    pub fn published(mut self) -> Self {
        self.status = Some(PublishStatus::Published);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn access(mut self, level: AccessLevel) -> Self {
        self.access_level = Some(level);
        self
    }

    pub fn featured(mut self, yes: bool) -> Self {
        self.featured = Some(yes);
        self
    }

    pub fn since(mut self, t: DateTime<Utc>) -> Self {
        self.published_since = Some(t);
        self
    }

    pub fn matching(mut self, profile: &UserProfile) -> Self {
        self.profile = Some(profile.clone());
        self
    }

    pub fn title_contains_any(mut self, keywords: &[String]) -> Self {
        self.title_any = keywords.to_vec();
        self
    }

    pub fn sort(mut self, sort: ContentSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn accepts(&self, c: &TaggedContent) -> bool {
        c.kind == self.kind
            && self.status.is_none_or_eq(c.status)
            && self.access_level.is_none_or_eq(c.access_level)
            && self.featured.is_none_or_eq(c.is_featured)
            && self.category.as_deref().map_or(true, |cat| c.category == cat)
            && self.published_since.map_or(true, |t| c.published_at >= t)
            && self.profile.as_ref().map_or(true, |p| p.matches(c))
            && (self.title_any.is_empty()
                || self.title_any.iter().any(|k| c.title.contains(k.as_str())))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceQuery {
    pub product_type: Option<String>,
    pub region: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub latest_only: bool,
    pub limit: usize,
}

impl PriceQuery {
    pub fn accepts(&self, p: &PriceRecord) -> bool {
        self.product_type.as_deref().map_or(true, |t| p.product_type == t)
            && self.region.as_deref().map_or(true, |r| p.region == r)
            && self.since.map_or(true, |t| p.price_date >= t)
            && (!self.latest_only || p.is_latest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DealSort {
    #[default]
    Newest,
    /// Deal amount, highest first; deal date breaks ties.
    LargestAmount,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DealQuery {
    pub product_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub sort: DealSort,
    pub skip: usize,
    pub limit: usize,
}

impl DealQuery {
    pub fn accepts(&self, d: &Deal) -> bool {
        self.product_type.as_deref().map_or(true, |t| d.product_type == t)
            && self.since.map_or(true, |t| d.deal_date >= t)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexQuery {
    pub index_name: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl IndexQuery {
    pub fn accepts(&self, i: &IndexRecord) -> bool {
        self.index_name.as_deref().map_or(true, |n| i.index_name == n)
            && self.since.map_or(true, |t| i.index_date >= t)
    }
}

/// Fields supplied at registration; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub region: String,
    pub trading_products: Vec<String>,
    pub company_name: Option<String>,
    pub tags: Vec<String>,
    pub tier: AccountTier,
}

#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn query_content(&self, q: &ContentQuery) -> StoreResult<Page<TaggedContent>>;
    /// `None` when an item with the same title already exists in that collection.
    async fn insert_content(&self, item: TaggedContent) -> StoreResult<Option<ContentId>>;
    /// Bumps the view counter and returns the updated item.
    async fn record_view(&self, kind: ContentKind, id: ContentId) -> StoreResult<Option<TaggedContent>>;

    /// Price date, newest first.
    async fn query_prices(&self, q: &PriceQuery) -> StoreResult<Vec<PriceRecord>>;
    /// Newest latest-flagged record per (product, region).
    async fn latest_prices(&self) -> StoreResult<Vec<PriceRecord>>;
    async fn insert_price(&self, p: PriceRecord) -> StoreResult<u64>;

    async fn query_deals(&self, q: &DealQuery) -> StoreResult<Page<Deal>>;
    async fn insert_deal(&self, d: Deal) -> StoreResult<u64>;

    /// Index date, newest first.
    async fn query_indexes(&self, q: &IndexQuery) -> StoreResult<Vec<IndexRecord>>;
    async fn insert_index(&self, i: IndexRecord) -> StoreResult<u64>;
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn user(&self, id: UserId) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<UserId>;
    /// Merge tags into the stored set; returns the number newly added, or
    /// `None` for an unknown user.
    async fn merge_user_tags(&self, id: UserId, tags: &[String]) -> StoreResult<Option<usize>>;
    async fn set_user_tier(&self, id: UserId, tier: AccountTier) -> StoreResult<bool>;
}

#[async_trait::async_trait]
pub trait BehaviorStore: Send + Sync {
    async fn append_behavior(&self, event: BehaviorEvent) -> StoreResult<()>;
    /// Events of `user` at or after `since`, newest first, at most `limit`.
    async fn recent_behaviors(
        &self,
        user: UserId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<BehaviorEvent>>;
}

trait OptionFilter<T> {
    fn is_none_or_eq(&self, v: T) -> bool;
}

impl<T: PartialEq + Copy> OptionFilter<T> for Option<T> {
    fn is_none_or_eq(&self, v: T) -> bool {
        self.map_or(true, |want| want == v)
    }
}
