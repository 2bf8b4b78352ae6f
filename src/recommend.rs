//! Recommendation engine.
//!
//! Pure functions over candidate pools already read from the store: the
//! personalized feed, "guess you like" and hot topics. Nothing here fails;
//! a missing pool simply produces an empty section.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::content::{ContentKind, Deal, PriceRecord, TaggedContent};
use crate::profile::{AccountTier, UserProfile};

pub const NEWS_LIMIT: usize = 5;
pub const REPORT_LIMIT: usize = 3;
/// Only the first subscribed products get a price alert.
pub const PRICE_ALERT_PRODUCTS: usize = 2;

pub const GUESS_LIMIT: usize = 5;
pub const BEHAVIOR_WINDOW_DAYS: i64 = 7;
pub const BEHAVIOR_EVENT_LIMIT: usize = 20;
pub const KEYWORD_LIMIT: usize = 3;

pub const HOT_NEWS_LIMIT: usize = 10;
pub const HOT_NEWS_DAYS: i64 = 7;
pub const HOT_DEALS_LIMIT: usize = 5;
pub const HOT_DEALS_DAYS: i64 = 3;

pub const NEWS_REASON: &str = "基于您的关注标签推荐";
pub const REPORT_REASON: &str = "基于您的交易品种推荐";
pub const GUESS_BASIS: &str = "您最近的浏览偏好";

/// A recommended record with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation<T> {
    #[serde(flatten)]
    pub item: T,
    pub recommendation_reason: String,
}

impl<T> Recommendation<T> {
    fn new(item: T, reason: impl Into<String>) -> Self {
        Self {
            item,
            recommendation_reason: reason.into(),
        }
    }
}

/// Candidate rows the personalized feed chooses from.
#[derive(Debug, Clone, Default)]
pub struct ContentPools {
    pub news: Vec<TaggedContent>,
    pub reports: Vec<TaggedContent>,
    pub latest_prices: Vec<PriceRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonalizedFeed {
    pub news: Vec<Recommendation<TaggedContent>>,
    pub reports: Vec<Recommendation<TaggedContent>>,
    pub price_alerts: Vec<Recommendation<PriceRecord>>,
}

impl PersonalizedFeed {
    pub fn len(&self) -> usize {
        self.news.len() + self.reports.len() + self.price_alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuessYouLike {
    pub recommendations: Vec<TaggedContent>,
    pub based_on: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotTopics {
    pub hot_news: Vec<TaggedContent>,
    pub hot_deals: Vec<Deal>,
    pub generated_at: DateTime<Utc>,
}

fn newest_first(a: &TaggedContent, b: &TaggedContent) -> Ordering {
    b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id))
}

/// Personalized feed for one profile.
pub fn recommend(profile: &UserProfile, pools: &ContentPools) -> PersonalizedFeed {
    let mut news: Vec<&TaggedContent> = pools
        .news
        .iter()
        .filter(|c| c.kind == ContentKind::News && c.is_published() && profile.matches(c))
        .collect();
    news.sort_by(|a, b| newest_first(a, b));

    let mut reports: Vec<&TaggedContent> = pools
        .reports
        .iter()
        .filter(|c| c.kind == ContentKind::Report && profile.matches(c) && profile.can_access(c))
        .collect();
    reports.sort_by(|a, b| newest_first(a, b));

    PersonalizedFeed {
        news: news
            .into_iter()
            .take(NEWS_LIMIT)
            .map(|c| Recommendation::new(c.clone(), NEWS_REASON))
            .collect(),
        reports: reports
            .into_iter()
            .take(REPORT_LIMIT)
            .map(|c| Recommendation::new(c.clone(), REPORT_REASON))
            .collect(),
        price_alerts: price_alerts(profile, &pools.latest_prices),
    }
}

/// Newest latest-flagged price in the user's region for each of the first
/// subscribed products.
pub fn price_alerts(profile: &UserProfile, prices: &[PriceRecord]) -> Vec<Recommendation<PriceRecord>> {
    profile
        .trading_products
        .iter()
        .take(PRICE_ALERT_PRODUCTS)
        .filter_map(|product| {
            prices
                .iter()
                .filter(|p| p.is_latest && p.product_type == *product && p.region == profile.region)
                .max_by_key(|p| p.price_date)
                .map(|p| Recommendation::new(p.clone(), format!("您关注的{product}最新价格")))
        })
        .collect()
}

/// Behavior-driven picks from the pool of the user's favorite content type.
///
/// Search keywords select by title; without keywords only featured items
/// qualify. `None` (a type with no collection) yields nothing.
pub fn guess_you_like(
    tier: AccountTier,
    favorite: Option<ContentKind>,
    keywords: &[String],
    news: &[TaggedContent],
    reports: &[TaggedContent],
) -> GuessYouLike {
    let selected = |c: &TaggedContent| {
        if keywords.is_empty() {
            c.is_featured
        } else {
            keywords.iter().any(|k| c.title.contains(k.as_str()))
        }
    };

    let mut picks: Vec<&TaggedContent> = match favorite {
        Some(ContentKind::News) => news
            .iter()
            .filter(|c| c.kind == ContentKind::News && c.is_published() && selected(*c))
            .collect(),
        Some(ContentKind::Report) => reports
            .iter()
            .filter(|c| {
                c.kind == ContentKind::Report
                    && (tier.is_premium() || c.is_free())
                    && selected(*c)
            })
            .collect(),
        None => Vec::new(),
    };
    picks.sort_by(|a, b| newest_first(a, b));

    GuessYouLike {
        recommendations: picks.into_iter().take(GUESS_LIMIT).cloned().collect(),
        based_on: GUESS_BASIS.to_string(),
    }
}

/// Most viewed recent news, plus the largest recent deals for premium users.
pub fn hot_topics(
    tier: AccountTier,
    news: &[TaggedContent],
    deals: &[Deal],
    now: DateTime<Utc>,
) -> HotTopics {
    let news_since = now - Duration::days(HOT_NEWS_DAYS);
    let mut hot_news: Vec<&TaggedContent> = news
        .iter()
        .filter(|c| c.kind == ContentKind::News && c.is_published() && c.published_at >= news_since)
        .collect();
    hot_news.sort_by(|a, b| b.view_count.cmp(&a.view_count).then_with(|| newest_first(a, b)));

    let hot_deals = if tier.is_premium() {
        let deals_since = now - Duration::days(HOT_DEALS_DAYS);
        let mut d: Vec<&Deal> = deals.iter().filter(|d| d.deal_date >= deals_since).collect();
        d.sort_by(|a, b| {
            b.deal_amount
                .total_cmp(&a.deal_amount)
                .then(b.deal_date.cmp(&a.deal_date))
        });
        d.into_iter().take(HOT_DEALS_LIMIT).cloned().collect()
    } else {
        Vec::new()
    };

    HotTopics {
        hot_news: hot_news.into_iter().take(HOT_NEWS_LIMIT).cloned().collect(),
        hot_deals,
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorAction, BehaviorEvent, BehaviorSummary};
    use crate::content::{AccessLevel, PublishStatus};

    fn profile(tier: AccountTier, tags: &[&str]) -> UserProfile {
        UserProfile {
            user_id: 1,
            region: "上海".into(),
            trading_products: vec!["管道天然气".into(), "液化天然气(LNG)".into(), "压缩天然气(CNG)".into()],
            tags: tags.iter().map(|s| s.to_string()).collect(),
            tier,
            updated_at: Utc::now(),
        }
    }

    fn at(hours_ago: i64) -> DateTime<Utc> {
        Utc::now() - Duration::hours(hours_ago)
    }

    fn with_id(mut c: TaggedContent, id: u64) -> TaggedContent {
        c.id = id;
        c
    }

    fn price(product: &str, region: &str, latest: bool, hours_ago: i64) -> PriceRecord {
        PriceRecord {
            id: 0,
            product_name: product.into(),
            product_type: product.into(),
            region: region.into(),
            price: 3.5,
            price_unit: "元/立方米".into(),
            change_amount: None,
            change_percent: None,
            market: None,
            is_latest: latest,
            price_date: at(hours_ago),
        }
    }

    fn deal(id: &str, amount: f64, hours_ago: i64) -> Deal {
        Deal {
            id: 0,
            deal_id: id.into(),
            product_name: "管道天然气".into(),
            product_type: "管道天然气".into(),
            buyer: "b".into(),
            seller: "s".into(),
            deal_price: 3.4,
            deal_quantity: 100.0,
            deal_amount: amount,
            region: None,
            deal_type: None,
            deal_date: at(hours_ago),
        }
    }

    #[test]
    fn free_user_only_gets_free_matching_report() {
        let pools = ContentPools {
            reports: vec![
                with_id(TaggedContent::report("A", "", at(1)).with_tags(["LNG"]).with_access(AccessLevel::Premium), 1),
                with_id(TaggedContent::report("B", "", at(2)).with_tags(["LNG"]), 2),
            ],
            ..Default::default()
        };
        let feed = recommend(&profile(AccountTier::Free, &["上海", "LNG"]), &pools);
        let titles: Vec<_> = feed.reports.iter().map(|r| r.item.title.as_str()).collect();
        assert_eq!(titles, vec!["B"]);
        assert_eq!(feed.reports[0].recommendation_reason, REPORT_REASON);
    }

    #[test]
    fn news_is_capped_sorted_and_published_only() {
        let mut news: Vec<TaggedContent> = (0..8)
            .map(|i| with_id(TaggedContent::news(format!("n{i}"), "上海燃气", at(i)), i as u64 + 1))
            .collect();
        news[0].status = PublishStatus::Draft;
        news.push(with_id(TaggedContent::news("unrelated", "北京", at(0)), 100));
        let pools = ContentPools {
            news,
            ..Default::default()
        };
        let feed = recommend(&profile(AccountTier::Free, &[]), &pools);
        let titles: Vec<_> = feed.news.iter().map(|r| r.item.title.as_str()).collect();
        assert_eq!(titles, vec!["n1", "n2", "n3", "n4", "n5"]);
        assert!(feed.news.windows(2).all(|w| w[0].item.published_at >= w[1].item.published_at));
        assert!(feed.news.iter().all(|r| r.recommendation_reason == NEWS_REASON));
    }

    #[test]
    fn reports_match_on_product_title_and_cap_at_three() {
        let reports = (0..5)
            .map(|i| with_id(TaggedContent::report(format!("管道天然气周报{i}"), "", at(i)), i as u64 + 1))
            .collect();
        let pools = ContentPools {
            reports,
            ..Default::default()
        };
        let feed = recommend(&profile(AccountTier::Premium, &[]), &pools);
        assert_eq!(feed.reports.len(), REPORT_LIMIT);
        assert_eq!(feed.reports[0].item.title, "管道天然气周报0");
    }

    #[test]
    fn price_alerts_cover_first_two_products_in_region() {
        let prices = vec![
            price("管道天然气", "上海", true, 0),
            price("管道天然气", "上海", false, 0),
            price("管道天然气", "北京", true, 0),
            price("液化天然气(LNG)", "上海", true, 5),
            price("液化天然气(LNG)", "上海", true, 1),
            price("压缩天然气(CNG)", "上海", true, 0),
        ];
        let alerts = price_alerts(&profile(AccountTier::Free, &[]), &prices);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].item.product_type, "管道天然气");
        assert_eq!(alerts[0].recommendation_reason, "您关注的管道天然气最新价格");
        assert_eq!(alerts[1].item.product_type, "液化天然气(LNG)");
        assert!(Utc::now() - alerts[1].item.price_date < Duration::hours(2));
    }

    #[test]
    fn empty_pools_give_empty_feed() {
        assert!(recommend(&profile(AccountTier::Free, &["上海"]), &ContentPools::default()).is_empty());
    }

    fn events(list: &[BehaviorAction]) -> BehaviorSummary {
        let evs: Vec<BehaviorEvent> = list
            .iter()
            .cloned()
            .map(|a| BehaviorEvent::new(1, a, Utc::now()))
            .collect();
        BehaviorSummary::from_events(&evs)
    }

    fn guess(
        tier: AccountTier,
        s: &BehaviorSummary,
        news: &[TaggedContent],
        reports: &[TaggedContent],
    ) -> GuessYouLike {
        guess_you_like(tier, s.favorite_kind(), s.leading_keywords(KEYWORD_LIMIT), news, reports)
    }

    fn view(t: &str) -> BehaviorAction {
        BehaviorAction::View {
            content_type: t.into(),
            duration: 5.0,
            content_id: None,
        }
    }

    #[test]
    fn guess_defaults_to_featured_news() {
        let news = vec![
            with_id(TaggedContent::news("plain", "", at(0)), 1),
            with_id(TaggedContent::news("star", "", at(1)).featured(true), 2),
        ];
        let g = guess(AccountTier::Free, &BehaviorSummary::default(), &news, &[]);
        assert_eq!(g.recommendations.len(), 1);
        assert_eq!(g.recommendations[0].title, "star");
        assert_eq!(g.based_on, GUESS_BASIS);
    }

    #[test]
    fn guess_uses_search_keywords_on_titles() {
        let news: Vec<TaggedContent> = ["LNG进口", "管道气价格", "煤炭", "LNG船运", "氢能"]
            .iter()
            .enumerate()
            .map(|(i, t)| with_id(TaggedContent::news(*t, "", at(i as i64)), i as u64 + 1))
            .collect();
        let s = events(&[BehaviorAction::Search { query: "LNG 价格".into() }]);
        let g = guess(AccountTier::Free, &s, &news, &[]);
        let titles: Vec<_> = g.recommendations.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["LNG进口", "管道气价格", "LNG船运"]);
    }

    #[test]
    fn guess_reports_respect_tier() {
        let reports = vec![
            with_id(TaggedContent::report("paid", "", at(0)).featured(true).with_access(AccessLevel::Premium), 1),
            with_id(TaggedContent::report("free", "", at(1)).featured(true), 2),
        ];
        let s = events(&[view("report"), view("report"), view("news")]);
        let free = guess(AccountTier::Free, &s, &[], &reports);
        assert_eq!(free.recommendations.len(), 1);
        assert_eq!(free.recommendations[0].title, "free");
        let premium = guess(AccountTier::Premium, &s, &[], &reports);
        assert_eq!(premium.recommendations.len(), 2);
    }

    #[test]
    fn guess_for_other_content_types_is_empty() {
        let news = vec![with_id(TaggedContent::news("star", "", at(0)).featured(true), 1)];
        let s = events(&[view("price")]);
        assert!(guess(AccountTier::Free, &s, &news, &[]).recommendations.is_empty());
    }

    #[test]
    fn hot_topics_rank_by_views_within_window() {
        let news = vec![
            with_id(TaggedContent::news("old", "", at(24 * 8)).with_views(1000), 1),
            with_id(TaggedContent::news("mid", "", at(2)).with_views(50), 2),
            with_id(TaggedContent::news("top", "", at(3)).with_views(90), 3),
        ];
        let h = hot_topics(AccountTier::Free, &news, &[deal("D1", 1.0, 1)], Utc::now());
        let titles: Vec<_> = h.hot_news.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["top", "mid"]);
        assert!(h.hot_deals.is_empty(), "free tier never sees deals");
    }

    #[test]
    fn hot_deals_for_premium_by_amount_then_date() {
        let deals = vec![
            deal("small", 10.0, 1),
            deal("big-old", 99.0, 30),
            deal("big-new", 99.0, 2),
            deal("stale", 500.0, 24 * 4),
        ];
        let h = hot_topics(AccountTier::Premium, &[], &deals, Utc::now());
        let ids: Vec<_> = h.hot_deals.iter().map(|d| d.deal_id.as_str()).collect();
        assert_eq!(ids, vec!["big-new", "big-old", "small"]);
    }

    #[test]
    fn hot_news_is_capped_at_ten_most_viewed() {
        let news: Vec<TaggedContent> = (0..14)
            .map(|i| with_id(TaggedContent::news(format!("n{i}"), "", at(i)).with_views(i as u64 * 10), i as u64 + 1))
            .collect();
        let h = hot_topics(AccountTier::Free, &news, &[], Utc::now());
        assert_eq!(h.hot_news.len(), HOT_NEWS_LIMIT);
        assert_eq!(h.hot_news[0].title, "n13");
        assert_eq!(h.hot_news[HOT_NEWS_LIMIT - 1].title, "n4");
    }

    #[test]
    fn hot_deals_are_capped_at_five_largest() {
        let deals: Vec<Deal> = (0..8)
            .map(|i| deal(&format!("D{i}"), 100.0 + i as f64, 1))
            .collect();
        let h = hot_topics(AccountTier::Premium, &[], &deals, Utc::now());
        let ids: Vec<_> = h.hot_deals.iter().map(|d| d.deal_id.as_str()).collect();
        assert_eq!(ids, vec!["D7", "D6", "D5", "D4", "D3"]);
    }

    #[test]
    fn guess_is_capped_at_five_newest() {
        let news: Vec<TaggedContent> = (0..9)
            .map(|i| with_id(TaggedContent::news(format!("star{i}"), "", at(i)).featured(true), i as u64 + 1))
            .collect();
        let g = guess(AccountTier::Free, &BehaviorSummary::default(), &news, &[]);
        let titles: Vec<_> = g.recommendations.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["star0", "star1", "star2", "star3", "star4"]);
        assert_eq!(titles.len(), GUESS_LIMIT);
    }
}
