// src/seed.rs
//! Deterministic demo dataset for local runs and tests.

use chrono::{DateTime, Duration, Utc};

use crate::content::{AccessLevel, Deal, IndexRecord, PriceRecord, TaggedContent};
use crate::error::StoreError;
use crate::store::ContentStore;
use crate::tagging::extract_tags;
use crate::taxonomy::Taxonomy;

pub const DEMO_PRODUCTS: [(&str, f64); 3] = [
    ("管道天然气", 3.5),
    ("液化天然气(LNG)", 4.2),
    ("压缩天然气(CNG)", 3.8),
];
pub const DEMO_REGIONS: [&str; 4] = ["上海", "北京", "广州", "深圳"];
pub const DEMO_DAYS: i64 = 7;
const EXCHANGE: &str = "上海石油天然气交易中心";

#[derive(Debug, Clone, Default)]
pub struct DemoDataset {
    pub news: Vec<TaggedContent>,
    pub reports: Vec<TaggedContent>,
    pub prices: Vec<PriceRecord>,
    pub deals: Vec<Deal>,
    pub indexes: Vec<IndexRecord>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Explicit tags first, then whatever the taxonomy finds in title and body.
fn tagged(mut item: TaggedContent, explicit: &[&str], taxonomy: &Taxonomy) -> TaggedContent {
    let scanned = format!("{} {}", item.title, item.body);
    let explicit = explicit.iter().map(|s| s.to_string()).collect();
    item.tags = crate::tagging::merge_tags(explicit, extract_tags(&scanned, taxonomy));
    item
}

pub fn demo_dataset(now: DateTime<Utc>, taxonomy: &Taxonomy) -> DemoDataset {
    DemoDataset {
        news: demo_news(now, taxonomy),
        reports: demo_reports(now, taxonomy),
        prices: demo_prices(now),
        deals: demo_deals(now),
        indexes: demo_indexes(now),
    }
}

fn demo_news(now: DateTime<Utc>, taxonomy: &Taxonomy) -> Vec<TaggedContent> {
    let rows: [(&str, &str, &str, &str, &[&str], u64); 5] = [
        (
            "国家发改委：推动天然气市场化改革，建立多元化供应体系",
            "国家发改委近日发布通知，要求各地加快推进天然气市场化改革，建立多元化供应体系。通知指出，要进一步放开天然气气源和销售价格，完善管道运输价格机制，推动天然气交易中心建设，形成公开透明的价格形成机制。",
            "国家发改委",
            "政策法规",
            &["天然气改革", "市场化", "价格机制"],
            128,
        ),
        (
            "中海油与卡塔尔能源公司签署长期LNG购销协议",
            "中国海洋石油集团有限公司（中海油）与卡塔尔能源公司今日签署了一份为期27年的液化天然气（LNG）长期购销协议。根据协议，卡塔尔能源公司每年将向中海油供应400万吨LNG。",
            "中海油官网",
            "企业新闻",
            &["中海油", "LNG", "国际合作", "卡塔尔"],
            96,
        ),
        (
            "2024年上半年中国天然气消费量同比增长8.5%",
            "根据国家统计局最新数据，2024年上半年，中国天然气表观消费量达到1950亿立方米，同比增长8.5%。其中，城市燃气消费增长最快，工业用气保持稳定增长。",
            "国家统计局",
            "市场动态",
            &["天然气消费", "市场数据", "2024年"],
            64,
        ),
        (
            "新技术：氢能与天然气混合输送技术取得突破",
            "中国石油天然气管道科学研究院成功完成氢能与天然气混合输送技术试验。该技术可以利用现有天然气管网输送氢气，为未来氢能大规模应用奠定基础。",
            "中石油管道研究院",
            "技术创新",
            &["氢能", "天然气", "管道输送", "技术创新"],
            41,
        ),
        (
            "江苏LNG接收站三期工程正式投产",
            "江苏LNG接收站三期扩建工程今日正式投产运行。项目新增3座20万立方米储罐，年接收能力从650万吨提升至1000万吨，将有效提升长三角地区天然气供应保障能力。",
            "中石油新闻中心",
            "企业新闻",
            &["江苏", "LNG接收站", "基础设施"],
            77,
        ),
    ];
    rows.into_iter()
        .enumerate()
        .map(|(i, (title, body, source, category, tags, views))| {
            let item = TaggedContent::news(title, body, now - Duration::hours(6 * i as i64))
                .with_source(source)
                .with_category(category)
                .with_views(views)
                .featured(i == 0);
            tagged(item, tags, taxonomy)
        })
        .collect()
}

fn demo_reports(now: DateTime<Utc>, taxonomy: &Taxonomy) -> Vec<TaggedContent> {
    let rows: [(&str, &str, &str, &str, &[&str], AccessLevel); 3] = [
        (
            "2024年中国天然气市场发展趋势分析",
            "张明",
            "行业分析",
            "本报告深入分析了2024年中国天然气市场的供需状况、价格走势、政策环境等关键因素，并对未来发展趋势进行了预测。",
            &["市场分析", "2024年", "发展趋势"],
            AccessLevel::Free,
        ),
        (
            "LNG进口策略优化研究报告",
            "李华",
            "市场预测",
            "基于国际LNG市场价格波动和供应格局变化，本报告提出了优化中国LNG进口策略的建议。",
            &["LNG", "进口策略", "国际市场"],
            AccessLevel::Premium,
        ),
        (
            "碳中和背景下天然气行业转型路径研究",
            "王强",
            "技术研究",
            "探讨在碳中和目标下，天然气行业如何通过技术创新和产业升级实现绿色转型。",
            &["碳中和", "转型升级", "技术创新"],
            AccessLevel::Free,
        ),
    ];
    rows.into_iter()
        .enumerate()
        .map(|(i, (title, author, report_type, summary, tags, access))| {
            let mut item = TaggedContent::report(title, summary, now - Duration::days(i as i64))
                .with_category(report_type)
                .with_access(access)
                .featured(true);
            item.author = Some(author.to_string());
            tagged(item, tags, taxonomy)
        })
        .collect()
}

/// Day offset 0 is today and carries the latest flag.
fn demo_prices(now: DateTime<Utc>) -> Vec<PriceRecord> {
    let price_at = |day: i64, pi: usize, ri: usize| -> f64 {
        let step = (day as usize * 5 + pi * 3 + ri * 7) % 7;
        round2(DEMO_PRODUCTS[pi].1 + (step as f64 - 3.0) * 0.1)
    };
    let mut out = Vec::new();
    for day in 0..DEMO_DAYS {
        for (pi, (product, _)) in DEMO_PRODUCTS.iter().enumerate() {
            for (ri, region) in DEMO_REGIONS.iter().enumerate() {
                let price = price_at(day, pi, ri);
                let (change_amount, change_percent) = if day + 1 < DEMO_DAYS {
                    let prev = price_at(day + 1, pi, ri);
                    (
                        Some(round2(price - prev)),
                        Some(round2((price - prev) / prev * 100.0)),
                    )
                } else {
                    (None, None)
                };
                out.push(PriceRecord {
                    id: 0,
                    product_name: product.to_string(),
                    product_type: product.to_string(),
                    region: region.to_string(),
                    price,
                    price_unit: "元/立方米".into(),
                    change_amount,
                    change_percent,
                    market: Some(EXCHANGE.into()),
                    is_latest: day == 0,
                    price_date: now - Duration::days(day),
                });
            }
        }
    }
    out
}

fn demo_deals(now: DateTime<Utc>) -> Vec<Deal> {
    let rows = [
        ("华港燃气集团有限公司", "中国石化天然气分公司华南天然气销售中心", "管道天然气", 5000.0, 3.45, 17_250_000.0, "广州", 1),
        ("上海燃气集团", "中海油气电集团", "液化天然气(LNG)", 3000.0, 4.15, 12_450_000.0, "上海", 2),
        ("深圳燃气集团", "中石油昆仑能源", "管道天然气", 8000.0, 3.38, 27_040_000.0, "深圳", 3),
    ];
    rows.into_iter()
        .enumerate()
        .map(|(i, (buyer, seller, product, quantity, price, amount, region, days))| Deal {
            id: 0,
            deal_id: format!("DEAL-{:04}", i + 1),
            product_name: product.to_string(),
            product_type: product.to_string(),
            buyer: buyer.to_string(),
            seller: seller.to_string(),
            deal_price: price,
            deal_quantity: quantity,
            deal_amount: amount,
            region: Some(region.to_string()),
            deal_type: Some("现货".into()),
            // a few minutes inside the day so the 3-day window still sees the oldest
            deal_date: now - Duration::days(days) + Duration::minutes(5),
        })
        .collect()
}

fn demo_indexes(now: DateTime<Utc>) -> Vec<IndexRecord> {
    let mut out = Vec::new();
    for day in 0..DEMO_DAYS {
        for (k, (name, code, spread)) in [
            ("中国天然气价格指数", "CNGPI", 5.0),
            ("天然气供需平衡指数", "GSDBI", 3.0),
        ]
        .into_iter()
        .enumerate()
        {
            let wave = ((day as usize * 3 + k * 2) % 7) as f64 / 3.0 - 1.0;
            let change = round2(wave * spread / 2.5);
            out.push(IndexRecord {
                id: 0,
                index_name: name.into(),
                index_code: Some(code.into()),
                index_value: round2(100.0 + wave * spread),
                change_amount: Some(change),
                change_percent: Some(change),
                region: None,
                index_date: now - Duration::days(day),
            });
        }
    }
    out
}

/// Insert the dataset; returns how many rows were written.
pub async fn load_into(store: &dyn ContentStore, data: DemoDataset) -> Result<usize, StoreError> {
    let mut written = 0;
    for item in data.news.into_iter().chain(data.reports) {
        if store.insert_content(item).await?.is_some() {
            written += 1;
        }
    }
    for p in data.prices {
        store.insert_price(p).await?;
        written += 1;
    }
    for d in data.deals {
        store.insert_deal(d).await?;
        written += 1;
    }
    for i in data.indexes {
        store.insert_index(i).await?;
        written += 1;
    }
    Ok(written)
}
