// src/service.rs
//! Portal operations over injected stores.
//!
//! Each call reads a fresh snapshot; nothing is cached between requests.
//! Recommendation pools degrade to empty on store failures; the other
//! operations surface them as `PortalError::Store`.

use chrono::{Duration, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::behavior::{anon_hash, infer_tags, BehaviorAction, BehaviorEvent, BehaviorSummary};
use crate::config::PortalConfig;
use crate::content::{AccessLevel, ContentKind, Deal, IndexRecord, PriceRecord, TaggedContent};
use crate::error::PortalError;
use crate::profile::{AccountTier, UserId, UserRecord};
use crate::recommend::{
    self, ContentPools, GuessYouLike, HotTopics, PersonalizedFeed, BEHAVIOR_EVENT_LIMIT,
    BEHAVIOR_WINDOW_DAYS, GUESS_LIMIT, HOT_DEALS_DAYS, HOT_NEWS_DAYS, KEYWORD_LIMIT, NEWS_LIMIT,
    REPORT_LIMIT,
};
use crate::store::{
    BehaviorStore, ContentQuery, ContentSort, ContentStore, DealQuery, DealSort, IndexQuery,
    MemoryStore, NewUser, Page, PriceQuery, UserStore,
};
use crate::tagging::merge_tags;
use crate::taxonomy::Taxonomy;

pub const DEFAULT_PRICE_DAYS: i64 = 7;
pub const DEFAULT_DEAL_DAYS: i64 = 30;
pub const DEFAULT_INDEX_DAYS: i64 = 7;

/// Page number and size of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paging {
    pub page: usize,
    pub limit: usize,
}

impl Paging {
    pub const DEFAULT_LIMIT: usize = 10;
    pub const MAX_LIMIT: usize = 100;

    /// `page` starts at 1; `limit` must be within 1..=100.
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Result<Self, PortalError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT);
        if page == 0 {
            return Err(PortalError::Validation("page must be >= 1".into()));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(PortalError::Validation(format!(
                "limit must be within 1..={}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Registration payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub trading_products: Option<Vec<String>>,
    #[serde(default)]
    pub company_name: Option<String>,
}

fn days_back(days: Option<i64>, default: i64) -> Result<chrono::DateTime<Utc>, PortalError> {
    let days = days.unwrap_or(default);
    if days < 1 {
        return Err(PortalError::Validation("days must be >= 1".into()));
    }
    Duration::try_days(days)
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .ok_or_else(|| PortalError::Validation(format!("days out of range: {days}")))
}

pub struct PortalService {
    content: Arc<dyn ContentStore>,
    users: Arc<dyn UserStore>,
    behaviors: Arc<dyn BehaviorStore>,
    config: PortalConfig,
    taxonomy: Arc<Taxonomy>,
}

impl PortalService {
    pub fn new(
        content: Arc<dyn ContentStore>,
        users: Arc<dyn UserStore>,
        behaviors: Arc<dyn BehaviorStore>,
        config: PortalConfig,
        taxonomy: Arc<Taxonomy>,
    ) -> Self {
        Self {
            content,
            users,
            behaviors,
            config,
            taxonomy,
        }
    }

    /// All three stores backed by one `MemoryStore`.
    pub fn in_memory(store: Arc<MemoryStore>, config: PortalConfig, taxonomy: Arc<Taxonomy>) -> Self {
        Self::new(store.clone(), store.clone(), store, config, taxonomy)
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    fn pool_limit(&self) -> usize {
        self.config.candidate_pool_limit.max(1)
    }

    // ---- registration & user ----

    pub async fn register(&self, req: Registration) -> Result<UserId, PortalError> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();
        let region = req.region.trim().to_string();
        for (field, value) in [("username", &username), ("email", &email), ("region", &region)] {
            if value.is_empty() {
                return Err(PortalError::Validation(format!("missing required field: {field}")));
            }
        }
        let Some(products) = req.trading_products else {
            return Err(PortalError::Validation(
                "missing required field: trading_products".into(),
            ));
        };
        if !self.config.is_valid_region(&region) {
            return Err(PortalError::Validation(format!("invalid region: {region}")));
        }
        if let Some(bad) = products.iter().find(|p| !self.config.is_valid_product(p)) {
            return Err(PortalError::Validation(format!("invalid trading product: {bad}")));
        }
        if self.users.find_user_by_username(&username).await?.is_some() {
            return Err(PortalError::Conflict("username already exists".into()));
        }
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(PortalError::Conflict("email already registered".into()));
        }

        let company_name = req
            .company_name
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let mut seed = vec![region.clone()];
        seed.extend(products.iter().cloned());
        let tags = merge_tags(seed, company_name.clone());

        let id = self
            .users
            .insert_user(NewUser {
                username,
                email,
                region,
                trading_products: products,
                company_name,
                tags,
                tier: AccountTier::Free,
            })
            .await?;
        info!(target: "api", user_id = id, "user registered");
        Ok(id)
    }

    pub async fn user(&self, id: UserId) -> Result<UserRecord, PortalError> {
        self.users
            .user(id)
            .await?
            .ok_or_else(|| PortalError::NotFound("user not found".into()))
    }

    pub async fn upgrade(&self, id: UserId) -> Result<(), PortalError> {
        if !self.users.set_user_tier(id, AccountTier::Premium).await? {
            return Err(PortalError::NotFound("user not found".into()));
        }
        info!(target: "api", user_id = id, "user upgraded to premium");
        Ok(())
    }

    /// Merge `tags` into the user's profile and return the resulting set.
    pub async fn add_user_tags(&self, id: UserId, tags: Vec<String>) -> Result<Vec<String>, PortalError> {
        let tags = merge_tags(tags, Vec::<String>::new());
        if tags.is_empty() {
            return Err(PortalError::Validation("tags must not be empty".into()));
        }
        let Some(added) = self.users.merge_user_tags(id, &tags).await? else {
            return Err(PortalError::NotFound("user not found".into()));
        };
        debug!(target: "api", user_id = id, added, "user tags merged");
        Ok(self.user(id).await?.tags)
    }

    /// Append a behavior event, then fold the inferred tags into the profile.
    ///
    /// Returns the inferred tags. A failed merge is logged and dropped.
    pub async fn record_behavior(
        &self,
        id: UserId,
        behavior_type: &str,
        details: Value,
    ) -> Result<Vec<String>, PortalError> {
        let action = BehaviorAction::from_parts(behavior_type, details)?;
        if let BehaviorAction::Search { query } = &action {
            debug!(target: "behavior", user_id = id, query_id = %anon_hash(query), "search recorded");
        }
        let event = BehaviorEvent::new(id, action, Utc::now());
        let tags = infer_tags(&event);
        let kind = event.action.kind();
        self.behaviors.append_behavior(event).await?;
        counter!("behavior_events_total", "type" => kind).increment(1);

        if !tags.is_empty() {
            match self.users.merge_user_tags(id, &tags).await {
                Ok(Some(added)) => {
                    counter!("behavior_tags_added_total").increment(added as u64);
                    debug!(target: "behavior", user_id = id, added, "inferred tags merged");
                }
                Ok(None) => {
                    warn!(target: "behavior", user_id = id, "inferred tags dropped: unknown user")
                }
                Err(e) => {
                    warn!(target: "behavior", user_id = id, error = %e, "inferred tags dropped")
                }
            }
        }
        Ok(tags)
    }

    /// Tier of the user, free when the user is unknown or unreadable.
    async fn tier_of(&self, id: UserId) -> AccountTier {
        match self.users.user(id).await {
            Ok(Some(u)) => u.tier,
            Ok(None) => AccountTier::Free,
            Err(e) => {
                warn!(target: "recommend", user_id = id, error = %e, "user lookup failed, assuming free tier");
                AccountTier::Free
            }
        }
    }

    async fn ensure_premium(&self, id: UserId) -> Result<(), PortalError> {
        let user = self.user(id).await?;
        if !user.tier.is_premium() {
            return Err(PortalError::Forbidden("premium membership required".into()));
        }
        Ok(())
    }

    // ---- content ----

    pub async fn list_news(
        &self,
        paging: Paging,
        category: Option<String>,
    ) -> Result<Page<TaggedContent>, PortalError> {
        let mut q = ContentQuery::new(ContentKind::News, paging.limit)
            .published()
            .skip(paging.skip());
        if let Some(c) = category.filter(|c| !c.trim().is_empty()) {
            q = q.category(c);
        }
        Ok(self.content.query_content(&q).await?)
    }

    /// News detail; counts as a view.
    pub async fn news_detail(&self, id: u64) -> Result<TaggedContent, PortalError> {
        self.content
            .record_view(ContentKind::News, id)
            .await?
            .ok_or_else(|| PortalError::NotFound("news not found".into()))
    }

    pub async fn prices(
        &self,
        product_type: Option<String>,
        region: Option<String>,
        days: Option<i64>,
    ) -> Result<Vec<PriceRecord>, PortalError> {
        let q = PriceQuery {
            product_type: product_type.filter(|s| !s.is_empty()),
            region: region.filter(|s| !s.is_empty()),
            since: Some(days_back(days, DEFAULT_PRICE_DAYS)?),
            latest_only: false,
            limit: self.pool_limit(),
        };
        Ok(self.content.query_prices(&q).await?)
    }

    pub async fn latest_prices(&self) -> Result<Vec<PriceRecord>, PortalError> {
        Ok(self.content.latest_prices().await?)
    }

    /// Premium only.
    pub async fn deals(
        &self,
        user: UserId,
        paging: Paging,
        product_type: Option<String>,
        days: Option<i64>,
    ) -> Result<Page<Deal>, PortalError> {
        self.ensure_premium(user).await?;
        let q = DealQuery {
            product_type: product_type.filter(|s| !s.is_empty()),
            since: Some(days_back(days, DEFAULT_DEAL_DAYS)?),
            sort: DealSort::Newest,
            skip: paging.skip(),
            limit: paging.limit,
        };
        Ok(self.content.query_deals(&q).await?)
    }

    /// Free-tier users only see free reports.
    pub async fn reports(
        &self,
        user: UserId,
        paging: Paging,
        report_type: Option<String>,
    ) -> Result<Page<TaggedContent>, PortalError> {
        let mut q = ContentQuery::new(ContentKind::Report, paging.limit).skip(paging.skip());
        if let Some(t) = report_type.filter(|t| !t.trim().is_empty()) {
            q = q.category(t);
        }
        if !self.tier_of(user).await.is_premium() {
            q = q.access(AccessLevel::Free);
        }
        Ok(self.content.query_content(&q).await?)
    }

    pub async fn indexes(
        &self,
        index_name: Option<String>,
        days: Option<i64>,
    ) -> Result<Vec<IndexRecord>, PortalError> {
        let q = IndexQuery {
            index_name: index_name.filter(|s| !s.is_empty()),
            since: Some(days_back(days, DEFAULT_INDEX_DAYS)?),
            limit: self.pool_limit(),
        };
        Ok(self.content.query_indexes(&q).await?)
    }

    // ---- recommendation ----

    async fn content_pool(&self, q: ContentQuery) -> Vec<TaggedContent> {
        match self.content.query_content(&q).await {
            Ok(page) => page.items,
            Err(e) => {
                warn!(target: "recommend", kind = %q.kind, error = %e, "candidate pool unavailable");
                Vec::new()
            }
        }
    }

    pub async fn personalized(&self, id: UserId) -> Result<PersonalizedFeed, PortalError> {
        let profile = self.user(id).await?.profile();
        let latest_prices = match self.content.latest_prices().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(target: "recommend", error = %e, "price pool unavailable");
                Vec::new()
            }
        };
        // Matching happens in the store so older matches survive the cap.
        let mut reports = ContentQuery::new(ContentKind::Report, REPORT_LIMIT).matching(&profile);
        if !profile.tier.is_premium() {
            reports = reports.access(AccessLevel::Free);
        }
        let pools = ContentPools {
            news: self
                .content_pool(
                    ContentQuery::new(ContentKind::News, NEWS_LIMIT)
                        .published()
                        .matching(&profile),
                )
                .await,
            reports: self.content_pool(reports).await,
            latest_prices,
        };
        let feed = recommend::recommend(&profile, &pools);
        counter!("recommendations_served_total", "mode" => "personalized").increment(1);
        debug!(
            target: "recommend",
            user_id = id,
            news = feed.news.len(),
            reports = feed.reports.len(),
            alerts = feed.price_alerts.len(),
            "personalized feed built"
        );
        Ok(feed)
    }

    pub async fn guess_you_like(&self, id: UserId) -> GuessYouLike {
        let now = Utc::now();
        let tier = self.tier_of(id).await;
        let since = now - Duration::days(BEHAVIOR_WINDOW_DAYS);
        let events = match self.behaviors.recent_behaviors(id, since, BEHAVIOR_EVENT_LIMIT).await {
            Ok(ev) => ev,
            Err(e) => {
                warn!(target: "recommend", user_id = id, error = %e, "behavior history unavailable");
                Vec::new()
            }
        };
        let summary = BehaviorSummary::from_events(&events);
        let favorite = summary.favorite_kind();
        let keywords = summary.leading_keywords(KEYWORD_LIMIT);
        let picks = |kind: ContentKind| {
            let q = ContentQuery::new(kind, GUESS_LIMIT);
            if keywords.is_empty() {
                q.featured(true)
            } else {
                q.title_contains_any(keywords)
            }
        };
        let (news, reports) = match favorite {
            Some(ContentKind::News) => (
                self.content_pool(picks(ContentKind::News).published()).await,
                Vec::new(),
            ),
            Some(ContentKind::Report) => {
                let mut q = picks(ContentKind::Report);
                if !tier.is_premium() {
                    q = q.access(AccessLevel::Free);
                }
                (Vec::new(), self.content_pool(q).await)
            }
            None => (Vec::new(), Vec::new()),
        };
        let out = recommend::guess_you_like(tier, favorite, keywords, &news, &reports);
        counter!("recommendations_served_total", "mode" => "guess").increment(1);
        debug!(
            target: "recommend",
            user_id = id,
            events = events.len(),
            favorite = ?favorite,
            picks = out.recommendations.len(),
            "guess-you-like built"
        );
        out
    }

    pub async fn hot_topics(&self, id: UserId) -> HotTopics {
        let now = Utc::now();
        let tier = self.tier_of(id).await;
        let limit = self.pool_limit();
        let news = self
            .content_pool(
                ContentQuery::new(ContentKind::News, limit)
                    .published()
                    .since(now - Duration::days(HOT_NEWS_DAYS))
                    .sort(ContentSort::MostViewed),
            )
            .await;
        let deals = if tier.is_premium() {
            let q = DealQuery {
                since: Some(now - Duration::days(HOT_DEALS_DAYS)),
                sort: DealSort::LargestAmount,
                limit,
                ..Default::default()
            };
            match self.content.query_deals(&q).await {
                Ok(page) => page.items,
                Err(e) => {
                    warn!(target: "recommend", error = %e, "deal pool unavailable");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        counter!("recommendations_served_total", "mode" => "hot").increment(1);
        recommend::hot_topics(tier, &news, &deals, now)
    }

    /// Tags found in `text`, sorted.
    pub fn extract_tags(&self, text: &str) -> Vec<String> {
        let started = Instant::now();
        let tags = crate::tagging::extract_tags(text, &self.taxonomy);
        histogram!("tag_extract_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        tags.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> PortalService {
        PortalService::in_memory(
            Arc::new(MemoryStore::new()),
            PortalConfig::default(),
            Arc::new(Taxonomy::builtin().clone()),
        )
    }

    fn registration(name: &str) -> Registration {
        Registration {
            username: name.into(),
            email: format!("{name}@example.test"),
            region: "上海".into(),
            trading_products: Some(vec!["管道天然气".into(), "液化天然气(LNG)".into()]),
            company_name: Some("华港燃气集团有限公司".into()),
        }
    }

    #[test]
    fn paging_bounds() {
        assert_eq!(Paging::new(None, None).unwrap(), Paging::default());
        assert_eq!(Paging::new(Some(3), Some(20)).unwrap().skip(), 40);
        assert!(Paging::new(Some(0), None).is_err());
        assert!(Paging::new(None, Some(0)).is_err());
        assert!(Paging::new(None, Some(101)).is_err());
    }

    #[test]
    fn days_back_rejects_out_of_range() {
        assert!(days_back(None, DEFAULT_PRICE_DAYS).is_ok());
        assert!(days_back(Some(365), DEFAULT_PRICE_DAYS).is_ok());
        assert!(matches!(days_back(Some(0), 7), Err(PortalError::Validation(_))));
        assert!(matches!(days_back(Some(i64::MAX), 7), Err(PortalError::Validation(_))));
        assert!(matches!(
            days_back(Some(100_000_000_000), 7),
            Err(PortalError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn register_seeds_tags_and_rejects_duplicates() {
        let svc = service();
        let id = svc.register(registration("alice")).await.unwrap();
        let u = svc.user(id).await.unwrap();
        assert_eq!(
            u.tags,
            vec!["上海", "管道天然气", "液化天然气(LNG)", "华港燃气集团有限公司"]
        );
        assert_eq!(u.tier, AccountTier::Free);

        let dup = svc.register(registration("alice")).await.unwrap_err();
        assert!(matches!(dup, PortalError::Conflict(_)));
        let mut same_mail = registration("bob");
        same_mail.email = "alice@example.test".into();
        assert!(matches!(
            svc.register(same_mail).await.unwrap_err(),
            PortalError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn register_validates_enumerations() {
        let svc = service();
        let mut r = registration("carol");
        r.region = "火星".into();
        assert!(matches!(svc.register(r).await, Err(PortalError::Validation(_))));
        let mut r = registration("carol");
        r.trading_products = Some(vec!["氢气".into()]);
        assert!(matches!(svc.register(r).await, Err(PortalError::Validation(_))));
        let mut r = registration("carol");
        r.trading_products = None;
        assert!(matches!(svc.register(r).await, Err(PortalError::Validation(_))));
        let mut r = registration("carol");
        r.username = "  ".into();
        assert!(matches!(svc.register(r).await, Err(PortalError::Validation(_))));
    }

    #[tokio::test]
    async fn behavior_inference_grows_profile() {
        let svc = service();
        let id = svc.register(registration("dave")).await.unwrap();
        let inferred = svc
            .record_behavior(id, "search", json!({"query": "最近半年 CNG 走势"}))
            .await
            .unwrap();
        assert_eq!(inferred, vec!["最近半年", "CNG", "走势", "最近半年"]);
        svc.record_behavior(id, "view", json!({"content_type": "report", "duration": 60}))
            .await
            .unwrap();
        let tags = svc.user(id).await.unwrap().tags;
        for t in ["最近半年", "CNG", "走势", "interested-in-report"] {
            assert!(tags.iter().any(|x| x == t), "missing {t}");
        }
        assert_eq!(tags.iter().filter(|t| *t == "最近半年").count(), 1);
    }

    #[tokio::test]
    async fn behavior_for_unknown_user_is_still_recorded() {
        let svc = service();
        let tags = svc
            .record_behavior(404, "search", json!({"query": "LNG"}))
            .await
            .unwrap();
        assert_eq!(tags, vec!["LNG"]);
        assert!(matches!(
            svc.record_behavior(1, "like", json!({})).await,
            Err(PortalError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn deals_require_premium() {
        let svc = service();
        let id = svc.register(registration("erin")).await.unwrap();
        let err = svc.deals(id, Paging::default(), None, None).await.unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
        svc.upgrade(id).await.unwrap();
        let page = svc.deals(id, Paging::default(), None, None).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn personalized_for_missing_user_is_not_found() {
        let svc = service();
        assert!(matches!(
            svc.personalized(9).await,
            Err(PortalError::NotFound(_))
        ));
        let g = svc.guess_you_like(9).await;
        assert!(g.recommendations.is_empty());
        let h = svc.hot_topics(9).await;
        assert!(h.hot_news.is_empty() && h.hot_deals.is_empty());
    }

    #[tokio::test]
    async fn add_tags_rejects_blank_lists() {
        let svc = service();
        let id = svc.register(registration("frank")).await.unwrap();
        assert!(matches!(
            svc.add_user_tags(id, vec![" ".into()]).await,
            Err(PortalError::Validation(_))
        ));
        let tags = svc.add_user_tags(id, vec!["LNG".into(), "LNG".into()]).await.unwrap();
        assert_eq!(tags.iter().filter(|t| *t == "LNG").count(), 1);
        assert!(matches!(
            svc.add_user_tags(999, vec!["LNG".into()]).await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[test]
    fn extract_tags_is_sorted_and_deduplicated() {
        let tags = service().extract_tags("上海地区管道天然气价格上涨");
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);
        assert!(tags.contains(&"上海".to_string()));
        assert!(tags.contains(&"管道天然气".to_string()));
    }
}
