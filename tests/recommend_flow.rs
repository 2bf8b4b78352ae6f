// tests/recommend_flow.rs
//
// End-to-end recommendation scenarios through PortalService over the seeded
// demo dataset: profile growth, tier gating and behavior-driven picks.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use energy_portal::config::PortalConfig;
use energy_portal::content::{ContentKind, TaggedContent};
use energy_portal::service::Registration;
use energy_portal::store::{ContentStore, MemoryStore};
use energy_portal::taxonomy::Taxonomy;
use energy_portal::{seed, PortalService};

async fn seeded_portal() -> PortalService {
    let store = Arc::new(MemoryStore::new());
    let taxonomy = Arc::new(Taxonomy::builtin().clone());
    seed::load_into(store.as_ref(), seed::demo_dataset(Utc::now(), &taxonomy))
        .await
        .expect("seed");
    PortalService::in_memory(store, PortalConfig::default(), taxonomy)
}

async fn lng_trader(portal: &PortalService, name: &str) -> u64 {
    portal
        .register(Registration {
            username: name.into(),
            email: format!("{name}@example.test"),
            region: "上海".into(),
            trading_products: Some(vec!["液化天然气(LNG)".into()]),
            company_name: None,
        })
        .await
        .expect("register")
}

#[tokio::test]
async fn feed_grows_with_tags_and_tier() {
    let portal = seeded_portal().await;
    let id = lng_trader(&portal, "hana").await;

    // only the latest Shanghai LNG price matches the fresh profile
    let feed = portal.personalized(id).await.unwrap();
    assert!(feed.news.is_empty());
    assert!(feed.reports.is_empty());
    assert_eq!(feed.price_alerts.len(), 1);
    let alert = &feed.price_alerts[0].item;
    assert_eq!((alert.product_type.as_str(), alert.region.as_str()), ("液化天然气(LNG)", "上海"));
    assert!(alert.is_latest);

    portal
        .add_user_tags(id, vec!["LNG".into(), "液化天然气".into()])
        .await
        .unwrap();
    let feed = portal.personalized(id).await.unwrap();
    let titles: Vec<&str> = feed.news.iter().map(|r| r.item.title.as_str()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles[0].starts_with("中海油"), "newest first: {titles:?}");
    assert!(titles[1].starts_with("江苏"));
    assert!(feed.news.iter().all(|r| r.recommendation_reason == "基于您的关注标签推荐"));
    assert!(feed.reports.is_empty(), "premium report hidden from free tier");

    portal.upgrade(id).await.unwrap();
    let feed = portal.personalized(id).await.unwrap();
    assert_eq!(feed.reports.len(), 1);
    assert_eq!(feed.reports[0].item.title, "LNG进口策略优化研究报告");
}

#[tokio::test]
async fn guess_you_like_follows_recent_behavior() {
    let portal = seeded_portal().await;
    let id = lng_trader(&portal, "ivan").await;

    // no history: featured news
    let g = portal.guess_you_like(id).await;
    assert_eq!(g.recommendations.len(), 1);
    assert!(g.recommendations[0].is_featured);

    for _ in 0..2 {
        portal
            .record_behavior(id, "view", json!({"content_type": "report", "duration": 90}))
            .await
            .unwrap();
    }
    portal
        .record_behavior(id, "search", json!({"query": "LNG"}))
        .await
        .unwrap();

    let g = portal.guess_you_like(id).await;
    assert!(g.recommendations.is_empty(), "only match is premium");

    portal.upgrade(id).await.unwrap();
    let g = portal.guess_you_like(id).await;
    assert_eq!(g.recommendations.len(), 1);
    assert_eq!(g.recommendations[0].title, "LNG进口策略优化研究报告");

    let tags = portal.user(id).await.unwrap().tags;
    assert!(tags.iter().any(|t| t == "interested-in-report"));
    assert!(tags.iter().any(|t| t == "LNG"));
}

#[tokio::test]
async fn hot_topics_gate_deals_by_tier() {
    let portal = seeded_portal().await;
    let id = lng_trader(&portal, "judy").await;

    let hot = portal.hot_topics(id).await;
    assert_eq!(hot.hot_news.len(), 5);
    let views: Vec<u64> = hot.hot_news.iter().map(|n| n.view_count).collect();
    let mut sorted = views.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(views, sorted);
    assert!(hot.hot_deals.is_empty());

    portal.upgrade(id).await.unwrap();
    let hot = portal.hot_topics(id).await;
    let amounts: Vec<f64> = hot.hot_deals.iter().map(|d| d.deal_amount).collect();
    assert_eq!(amounts, vec![27_040_000.0, 17_250_000.0, 12_450_000.0]);
}

#[tokio::test]
async fn unknown_user_degrades_to_free_defaults() {
    let portal = seeded_portal().await;
    assert!(portal.personalized(77).await.is_err());
    let g = portal.guess_you_like(77).await;
    assert!(g.recommendations.iter().all(|c| c.is_featured));
    assert!(portal.hot_topics(77).await.hot_deals.is_empty());
}

#[tokio::test]
async fn older_matches_survive_a_flood_of_newer_rows() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let month_ago = now - Duration::days(30);
    store
        .insert_content(TaggedContent::news("上海LNG接收站扩建", "上海地区新增储罐", month_ago).with_tags(["LNG"]))
        .await
        .unwrap();
    store
        .insert_content(TaggedContent::news("年度保供要闻", "", month_ago).featured(true))
        .await
        .unwrap();
    store
        .insert_content(TaggedContent::report("液化天然气(LNG)季度回顾", "", month_ago))
        .await
        .unwrap();
    for i in 0..600 {
        let at = now - Duration::minutes(i);
        store
            .insert_content(TaggedContent::news(format!("快讯{i}"), "", at))
            .await
            .unwrap();
        store
            .insert_content(TaggedContent::report(format!("简报{i}"), "", at))
            .await
            .unwrap();
    }
    let portal = PortalService::in_memory(
        store,
        PortalConfig::default(),
        Arc::new(Taxonomy::builtin().clone()),
    );
    let id = lng_trader(&portal, "kate").await;

    let feed = portal.personalized(id).await.unwrap();
    let news: Vec<&str> = feed.news.iter().map(|r| r.item.title.as_str()).collect();
    assert_eq!(news, vec!["上海LNG接收站扩建"]);
    let reports: Vec<&str> = feed.reports.iter().map(|r| r.item.title.as_str()).collect();
    assert_eq!(reports, vec!["液化天然气(LNG)季度回顾"]);

    let g = portal.guess_you_like(id).await;
    let picks: Vec<&str> = g.recommendations.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(picks, vec!["年度保供要闻"]);
}

#[tokio::test]
async fn guess_you_like_reads_only_the_latest_twenty_events() {
    let portal = seeded_portal().await;
    let id = lng_trader(&portal, "liam").await;

    for _ in 0..25 {
        portal
            .record_behavior(id, "view", json!({"content_type": "news", "duration": 5}))
            .await
            .unwrap();
    }
    for _ in 0..20 {
        portal
            .record_behavior(id, "view", json!({"content_type": "report", "duration": 5}))
            .await
            .unwrap();
    }

    // older news views fall outside the window, so reports win
    let g = portal.guess_you_like(id).await;
    assert_eq!(g.recommendations.len(), 2);
    assert!(g
        .recommendations
        .iter()
        .all(|c| c.kind == ContentKind::Report && c.is_featured && c.is_free()));
}
