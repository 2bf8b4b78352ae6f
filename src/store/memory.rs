// src/store/memory.rs
//! In-process store backed by plain vectors behind one `RwLock`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    BehaviorStore, ContentQuery, ContentSort, ContentStore, DealQuery, DealSort, IndexQuery,
    NewUser, Page, PriceQuery, StoreResult, UserStore,
};
use crate::behavior::BehaviorEvent;
use crate::content::{ContentId, ContentKind, Deal, IndexRecord, PriceRecord, TaggedContent};
use crate::profile::{merge_unique, AccountTier, UserId, UserRecord};

#[derive(Debug, Default)]
struct Tables {
    news: Vec<TaggedContent>,
    reports: Vec<TaggedContent>,
    prices: Vec<PriceRecord>,
    deals: Vec<Deal>,
    indexes: Vec<IndexRecord>,
    users: Vec<UserRecord>,
    behaviors: Vec<BehaviorEvent>,
    last_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn collection(&self, kind: ContentKind) -> &Vec<TaggedContent> {
        match kind {
            ContentKind::News => &self.news,
            ContentKind::Report => &self.reports,
        }
    }

    fn collection_mut(&mut self, kind: ContentKind) -> &mut Vec<TaggedContent> {
        match kind {
            ContentKind::News => &mut self.news,
            ContentKind::Report => &mut self.reports,
        }
    }

    fn user_mut(&mut self, id: UserId) -> Option<&mut UserRecord> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

/// Thread-safe store for tests, demos and single-node deployments.
///
/// A poisoned lock is recovered rather than propagated; every write leaves
/// the tables consistent before it can panic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both content collections are empty.
    pub fn is_empty(&self) -> bool {
        let t = self.read();
        t.news.is_empty() && t.reports.is_empty()
    }
}

fn paged<T>(rows: Vec<T>, skip: usize, limit: usize) -> Page<T> {
    let total = rows.len();
    let items = rows.into_iter().skip(skip).take(limit).collect();
    Page { items, total }
}

fn newer_first<T>(a: &DateTime<Utc>, b: &DateTime<Utc>, ida: T, idb: T) -> std::cmp::Ordering
where
    T: Ord,
{
    b.cmp(a).then(idb.cmp(&ida))
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn query_content(&self, q: &ContentQuery) -> StoreResult<Page<TaggedContent>> {
        let t = self.read();
        let mut rows: Vec<TaggedContent> = t
            .collection(q.kind)
            .iter()
            .filter(|c| q.accepts(c))
            .cloned()
            .collect();
        drop(t);
        match q.sort {
            ContentSort::Newest => {
                rows.sort_by(|a, b| newer_first(&a.published_at, &b.published_at, a.id, b.id))
            }
            ContentSort::MostViewed => rows.sort_by(|a, b| {
                b.view_count
                    .cmp(&a.view_count)
                    .then_with(|| newer_first(&a.published_at, &b.published_at, a.id, b.id))
            }),
        }
        Ok(paged(rows, q.skip, q.limit))
    }

    async fn insert_content(&self, mut item: TaggedContent) -> StoreResult<Option<ContentId>> {
        let mut t = self.write();
        if t.collection(item.kind).iter().any(|c| c.title == item.title) {
            return Ok(None);
        }
        item.id = t.next_id();
        let id = item.id;
        t.collection_mut(item.kind).push(item);
        Ok(Some(id))
    }

    async fn record_view(&self, kind: ContentKind, id: ContentId) -> StoreResult<Option<TaggedContent>> {
        let mut t = self.write();
        Ok(t.collection_mut(kind)
            .iter_mut()
            .find(|c| c.id == id)
            .map(|c| {
                c.view_count += 1;
                c.clone()
            }))
    }

    async fn query_prices(&self, q: &PriceQuery) -> StoreResult<Vec<PriceRecord>> {
        let mut rows: Vec<PriceRecord> =
            self.read().prices.iter().filter(|p| q.accepts(p)).cloned().collect();
        rows.sort_by(|a, b| newer_first(&a.price_date, &b.price_date, a.id, b.id));
        rows.truncate(q.limit);
        Ok(rows)
    }

    async fn latest_prices(&self) -> StoreResult<Vec<PriceRecord>> {
        let t = self.read();
        let mut newest: HashMap<(&str, &str), &PriceRecord> = HashMap::new();
        for p in t.prices.iter().filter(|p| p.is_latest) {
            let key = (p.product_type.as_str(), p.region.as_str());
            let newer = newest
                .get(&key)
                .map_or(true, |cur| cur.price_date < p.price_date);
            if newer {
                newest.insert(key, p);
            }
        }
        let mut rows: Vec<PriceRecord> = newest.into_values().cloned().collect();
        rows.sort_by(|a, b| {
            (a.product_type.as_str(), a.region.as_str())
                .cmp(&(b.product_type.as_str(), b.region.as_str()))
        });
        Ok(rows)
    }

    async fn insert_price(&self, mut p: PriceRecord) -> StoreResult<u64> {
        let mut t = self.write();
        p.id = t.next_id();
        let id = p.id;
        t.prices.push(p);
        Ok(id)
    }

    async fn query_deals(&self, q: &DealQuery) -> StoreResult<Page<Deal>> {
        let mut rows: Vec<Deal> = self.read().deals.iter().filter(|d| q.accepts(d)).cloned().collect();
        match q.sort {
            DealSort::Newest => rows.sort_by(|a, b| newer_first(&a.deal_date, &b.deal_date, a.id, b.id)),
            DealSort::LargestAmount => rows.sort_by(|a, b| {
                b.deal_amount
                    .total_cmp(&a.deal_amount)
                    .then_with(|| newer_first(&a.deal_date, &b.deal_date, a.id, b.id))
            }),
        }
        Ok(paged(rows, q.skip, q.limit))
    }

    async fn insert_deal(&self, mut d: Deal) -> StoreResult<u64> {
        let mut t = self.write();
        d.id = t.next_id();
        let id = d.id;
        t.deals.push(d);
        Ok(id)
    }

    async fn query_indexes(&self, q: &IndexQuery) -> StoreResult<Vec<IndexRecord>> {
        let mut rows: Vec<IndexRecord> =
            self.read().indexes.iter().filter(|i| q.accepts(i)).cloned().collect();
        rows.sort_by(|a, b| newer_first(&a.index_date, &b.index_date, a.id, b.id));
        rows.truncate(q.limit);
        Ok(rows)
    }

    async fn insert_index(&self, mut i: IndexRecord) -> StoreResult<u64> {
        let mut t = self.write();
        i.id = t.next_id();
        let id = i.id;
        t.indexes.push(i);
        Ok(id)
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryStore {
    async fn user(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .read()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.read().users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<UserId> {
        let now = Utc::now();
        let mut t = self.write();
        let id = t.next_id();
        let mut tags = Vec::new();
        merge_unique(&mut tags, user.tags.as_slice());
        t.users.push(UserRecord {
            id,
            username: user.username,
            email: user.email,
            region: user.region,
            trading_products: user.trading_products,
            tier: user.tier,
            tags,
            company_name: user.company_name,
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        });
        Ok(id)
    }

    async fn merge_user_tags(&self, id: UserId, tags: &[String]) -> StoreResult<Option<usize>> {
        let now = Utc::now();
        Ok(self.write().user_mut(id).map(|u| u.add_tags(tags, now)))
    }

    async fn set_user_tier(&self, id: UserId, tier: AccountTier) -> StoreResult<bool> {
        let now = Utc::now();
        let mut t = self.write();
        let Some(u) = t.user_mut(id) else {
            return Ok(false);
        };
        u.tier = tier;
        u.updated_at = now;
        Ok(true)
    }
}

#[async_trait::async_trait]
impl BehaviorStore for MemoryStore {
    async fn append_behavior(&self, event: BehaviorEvent) -> StoreResult<()> {
        self.write().behaviors.push(event);
        Ok(())
    }

    async fn recent_behaviors(
        &self,
        user: UserId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<BehaviorEvent>> {
        let t = self.read();
        // append order breaks timestamp ties, later first
        let mut rows: Vec<(usize, &BehaviorEvent)> = t
            .behaviors
            .iter()
            .enumerate()
            .filter(|(_, e)| e.user_id == user && e.timestamp >= since)
            .collect();
        rows.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorAction;
    use crate::content::AccessLevel;
    use chrono::Duration;

    fn price(product: &str, region: &str, days_ago: i64, latest: bool) -> PriceRecord {
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
            price_date: Utc::now() - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn duplicate_titles_are_rejected_per_collection() {
        let s = MemoryStore::new();
        let now = Utc::now();
        assert!(s.insert_content(TaggedContent::news("同名", "a", now)).await.unwrap().is_some());
        assert!(s.insert_content(TaggedContent::news("同名", "b", now)).await.unwrap().is_none());
        assert!(s.insert_content(TaggedContent::report("同名", "c", now)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn query_content_sorts_newest_first_and_pages() {
        let s = MemoryStore::new();
        let now = Utc::now();
        for i in 0..5 {
            s.insert_content(TaggedContent::news(format!("n{i}"), "", now - Duration::hours(i)))
                .await
                .unwrap();
        }
        let q = ContentQuery::new(ContentKind::News, 2).skip(1);
        let page = s.query_content(&q).await.unwrap();
        assert_eq!(page.total, 5);
        let titles: Vec<_> = page.items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["n1", "n2"]);
    }

    #[tokio::test]
    async fn limit_bounds_matching_rows_only() {
        let s = MemoryStore::new();
        let now = Utc::now();
        s.insert_content(TaggedContent::news("old LNG", "", now - Duration::days(30)).with_tags(["LNG"]))
            .await
            .unwrap();
        for i in 0..20 {
            s.insert_content(TaggedContent::news(format!("n{i}"), "", now - Duration::minutes(i)))
                .await
                .unwrap();
        }
        let q = ContentQuery::new(ContentKind::News, 5).title_contains_any(&["LNG".into()]);
        let page = s.query_content(&q).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "old LNG");
    }

    #[tokio::test]
    async fn record_view_increments() {
        let s = MemoryStore::new();
        let id = s
            .insert_content(TaggedContent::news("t", "", Utc::now()))
            .await
            .unwrap()
            .unwrap();
        s.record_view(ContentKind::News, id).await.unwrap();
        let after = s.record_view(ContentKind::News, id).await.unwrap().unwrap();
        assert_eq!(after.view_count, 2);
        assert!(s.record_view(ContentKind::Report, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_prices_keep_one_row_per_product_and_region() {
        let s = MemoryStore::new();
        s.insert_price(price("LNG", "上海", 0, true)).await.unwrap();
        s.insert_price(price("LNG", "上海", 2, true)).await.unwrap();
        s.insert_price(price("LNG", "上海", 1, false)).await.unwrap();
        s.insert_price(price("LNG", "北京", 0, true)).await.unwrap();
        let rows = s.latest_prices().await.unwrap();
        assert_eq!(rows.len(), 2);
        let sh = rows.iter().find(|p| p.region == "上海").unwrap();
        assert!(Utc::now() - sh.price_date < Duration::hours(1));
    }

    #[tokio::test]
    async fn deals_sort_by_amount_then_date() {
        let s = MemoryStore::new();
        let now = Utc::now();
        for (amount, days) in [(10.0, 2), (30.0, 1), (30.0, 0)] {
            s.insert_deal(Deal {
                id: 0,
                deal_id: format!("D{days}"),
                product_name: "管道天然气".into(),
                product_type: "管道天然气".into(),
                buyer: "b".into(),
                seller: "s".into(),
                deal_price: 1.0,
                deal_quantity: 1.0,
                deal_amount: amount,
                region: None,
                deal_type: None,
                deal_date: now - Duration::days(days),
            })
            .await
            .unwrap();
        }
        let q = DealQuery {
            sort: DealSort::LargestAmount,
            limit: 10,
            ..Default::default()
        };
        let ids: Vec<_> = s
            .query_deals(&q)
            .await
            .unwrap()
            .items
            .into_iter()
            .map(|d| d.deal_id)
            .collect();
        assert_eq!(ids, vec!["D0", "D1", "D2"]);
    }

    #[tokio::test]
    async fn tag_merge_is_idempotent() {
        let s = MemoryStore::new();
        let id = s
            .insert_user(NewUser {
                username: "u".into(),
                email: "u@x.test".into(),
                region: "上海".into(),
                trading_products: vec![],
                company_name: None,
                tags: vec!["上海".into(), "上海".into()],
                tier: AccountTier::Free,
            })
            .await
            .unwrap();
        let tags = vec!["LNG".to_string()];
        assert_eq!(s.merge_user_tags(id, &tags).await.unwrap(), Some(1));
        assert_eq!(s.merge_user_tags(id, &tags).await.unwrap(), Some(0));
        assert_eq!(s.user(id).await.unwrap().unwrap().tags, vec!["上海", "LNG"]);
        assert_eq!(s.merge_user_tags(999, &tags).await.unwrap(), None);
    }

    #[tokio::test]
    async fn recent_behaviors_are_windowed_sorted_and_limited() {
        let s = MemoryStore::new();
        let now = Utc::now();
        for h in [1, 200, 3, 2] {
            s.append_behavior(BehaviorEvent::new(
                1,
                BehaviorAction::Search { query: format!("q{h}") },
                now - Duration::hours(h),
            ))
            .await
            .unwrap();
        }
        s.append_behavior(BehaviorEvent::new(2, BehaviorAction::Search { query: "other".into() }, now))
            .await
            .unwrap();
        let rows = s.recent_behaviors(1, now - Duration::days(7), 2).await.unwrap();
        let qs: Vec<_> = rows
            .iter()
            .map(|e| match &e.action {
                BehaviorAction::Search { query } => query.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(qs, vec!["q1", "q2"]);
    }

    #[tokio::test]
    async fn access_filter_applies_to_reports() {
        let s = MemoryStore::new();
        let now = Utc::now();
        s.insert_content(TaggedContent::report("A", "", now).with_access(AccessLevel::Premium))
            .await
            .unwrap();
        s.insert_content(TaggedContent::report("B", "", now)).await.unwrap();
        let q = ContentQuery::new(ContentKind::Report, 10).access(AccessLevel::Free);
        let page = s.query_content(&q).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "B");
    }
}
