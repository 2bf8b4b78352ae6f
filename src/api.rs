use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::error::PortalError;
use crate::profile::{UserId, UserRecord};
use crate::recommend::{GuessYouLike, HotTopics, PersonalizedFeed};
use crate::service::{Paging, PortalService, Registration};
use crate::store::Page;

/// Header set by the upstream auth layer once the caller is resolved.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<PortalService>,
}

impl AppState {
    pub fn new(portal: PortalService) -> Self {
        Self {
            portal: Arc::new(portal),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // catalog & registration
        .route("/api/auth/regions", get(regions))
        .route("/api/auth/trading-products", get(trading_products))
        .route("/api/auth/system-users", get(system_users))
        .route("/api/auth/register", post(register))
        // user
        .route("/api/user/profile", get(profile))
        .route("/api/user/upgrade", post(upgrade))
        .route("/api/user/tags", get(user_tags).post(add_user_tags))
        .route("/api/user/behavior", post(record_behavior))
        // content
        .route("/api/energy/news", get(news))
        .route("/api/energy/news/{id}", get(news_detail))
        .route("/api/energy/prices", get(prices))
        .route("/api/energy/prices/latest", get(latest_prices))
        .route("/api/energy/deals", get(deals))
        .route("/api/energy/reports", get(reports))
        .route("/api/energy/indexes", get(indexes))
        // recommendation
        .route("/api/recommendation/personalized", get(personalized))
        .route("/api/recommendation/guess-you-like", get(guess_you_like))
        .route("/api/recommendation/hot-topics", get(hot_topics))
        .route("/api/tags/extract", post(extract_tags))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Caller resolved from the `X-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| PortalError::Unauthorized("missing user identity".into()))?;
        raw.to_str()
            .ok()
            .and_then(|s| s.trim().parse::<UserId>().ok())
            .map(CurrentUser)
            .ok_or_else(|| PortalError::Unauthorized("invalid user identity".into()))
    }
}

type ApiResult<T> = Result<T, PortalError>;

/// Paginated list body.
#[derive(Serialize)]
struct Listing<T> {
    data: Vec<T>,
    total: usize,
    page: usize,
    limit: usize,
}

impl<T> Listing<T> {
    fn new(page: Page<T>, paging: Paging) -> Self {
        Self {
            data: page.items,
            total: page.total,
            page: paging.page,
            limit: paging.limit,
        }
    }
}

/// Unpaginated list body.
#[derive(Serialize)]
struct Rows<T> {
    count: usize,
    data: Vec<T>,
}

impl<T> From<Vec<T>> for Rows<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

// ---- catalog & registration ----

async fn regions(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "regions": state.portal.config().regions }))
}

async fn trading_products(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "products": state.portal.config().trading_products }))
}

async fn system_users(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "users": state.portal.config().system_users }))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<Registration>,
) -> ApiResult<impl IntoResponse> {
    let user_id = state.portal.register(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "注册成功", "user_id": user_id })),
    ))
}

// ---- user ----

async fn profile(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
) -> ApiResult<Json<UserRecord>> {
    Ok(Json(state.portal.user(id).await?))
}

async fn upgrade(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
) -> ApiResult<Json<Value>> {
    state.portal.upgrade(id).await?;
    Ok(Json(json!({ "message": "升级成功", "user_type": "premium" })))
}

async fn user_tags(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
) -> ApiResult<Json<Value>> {
    let user = state.portal.user(id).await?;
    Ok(Json(json!({ "tags": user.tags })))
}

#[derive(Deserialize)]
struct TagsReq {
    #[serde(default)]
    tags: Vec<String>,
}

async fn add_user_tags(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
    Json(body): Json<TagsReq>,
) -> ApiResult<Json<Value>> {
    let tags = state.portal.add_user_tags(id, body.tags).await?;
    Ok(Json(json!({ "message": "标签更新成功", "tags": tags })))
}

#[derive(Deserialize)]
struct BehaviorReq {
    #[serde(default)]
    behavior_type: String,
    #[serde(default)]
    details: Value,
}

async fn record_behavior(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
    Json(body): Json<BehaviorReq>,
) -> ApiResult<impl IntoResponse> {
    let inferred = state
        .portal
        .record_behavior(id, &body.behavior_type, body.details)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "行为记录成功", "inferred_tags": inferred })),
    ))
}

// ---- content ----

#[derive(Deserialize, Default)]
struct NewsParams {
    page: Option<usize>,
    limit: Option<usize>,
    category: Option<String>,
}

async fn news(
    State(state): State<AppState>,
    Query(q): Query<NewsParams>,
) -> ApiResult<impl IntoResponse> {
    let paging = Paging::new(q.page, q.limit)?;
    let page = state.portal.list_news(paging, q.category).await?;
    Ok(Json(Listing::new(page, paging)))
}

async fn news_detail(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.portal.news_detail(id).await?))
}

#[derive(Deserialize, Default)]
struct PriceParams {
    product_type: Option<String>,
    region: Option<String>,
    days: Option<i64>,
}

async fn prices(
    State(state): State<AppState>,
    Query(q): Query<PriceParams>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.portal.prices(q.product_type, q.region, q.days).await?;
    Ok(Json(Rows::from(rows)))
}

async fn latest_prices(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(Rows::from(state.portal.latest_prices().await?)))
}

#[derive(Deserialize, Default)]
struct DealParams {
    page: Option<usize>,
    limit: Option<usize>,
    product_type: Option<String>,
    days: Option<i64>,
}

async fn deals(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
    Query(q): Query<DealParams>,
) -> ApiResult<impl IntoResponse> {
    let paging = Paging::new(q.page, q.limit)?;
    let page = state.portal.deals(id, paging, q.product_type, q.days).await?;
    Ok(Json(Listing::new(page, paging)))
}

#[derive(Deserialize, Default)]
struct ReportParams {
    page: Option<usize>,
    limit: Option<usize>,
    report_type: Option<String>,
}

async fn reports(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
    Query(q): Query<ReportParams>,
) -> ApiResult<impl IntoResponse> {
    let paging = Paging::new(q.page, q.limit)?;
    let page = state.portal.reports(id, paging, q.report_type).await?;
    Ok(Json(Listing::new(page, paging)))
}

#[derive(Deserialize, Default)]
struct IndexParams {
    index_name: Option<String>,
    days: Option<i64>,
}

async fn indexes(
    State(state): State<AppState>,
    Query(q): Query<IndexParams>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.portal.indexes(q.index_name, q.days).await?;
    Ok(Json(Rows::from(rows)))
}

// ---- recommendation ----

async fn personalized(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
) -> ApiResult<Json<PersonalizedFeed>> {
    Ok(Json(state.portal.personalized(id).await?))
}

async fn guess_you_like(
    State(state): State<AppState>,
    CurrentUser(id): CurrentUser,
) -> Json<GuessYouLike> {
    Json(state.portal.guess_you_like(id).await)
}

async fn hot_topics(State(state): State<AppState>, CurrentUser(id): CurrentUser) -> Json<HotTopics> {
    Json(state.portal.hot_topics(id).await)
}

#[derive(Deserialize)]
struct ExtractReq {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct ExtractResp {
    tags: Vec<String>,
}

async fn extract_tags(State(state): State<AppState>, Json(body): Json<ExtractReq>) -> Json<ExtractResp> {
    Json(ExtractResp {
        tags: state.portal.extract_tags(&body.text),
    })
}
