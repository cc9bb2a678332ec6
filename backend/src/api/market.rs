use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::responses::{clamp_limit, with_cache_control, ApiError, ApiResponse};
use super::AppState;
use crate::cache::CacheRecord;
use crate::feeds::related_news;
use crate::types::{NewsItem, PricePoint, TokenDetail};

const TOKEN_LISTING_LIMIT: usize = 200;
const DEFAULT_HISTORY_DAYS: u32 = 30;

const LISTING_MAX_AGE: u32 = 300;
const PRICE_MAX_AGE: u32 = 60;
const HISTORY_MAX_AGE: u32 = 3600;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PriceParams {
    pub ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub symbol: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDetailView {
    #[serde(flatten)]
    pub detail: TokenDetail,
    pub related_news: Vec<NewsItem>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<PricePoint>,
    pub count: usize,
    pub symbol: String,
    pub days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tokens", get(list_tokens))
        .route("/api/tokens/:symbol", get(token_detail))
        .route("/api/prices", get(prices))
        .route("/api/prices/all", get(all_prices))
        .route("/api/prices/history", get(price_history))
        .route("/api/market/stats", get(market_stats))
        .route("/api/market/movers", get(market_movers))
        .route("/api/exchanges", get(list_exchanges))
        .route("/api/defi", get(list_defi))
}

async fn list_tokens(State(state): State<AppState>) -> Response {
    let tokens = state.aggregator.providers().list_top_tokens(TOKEN_LISTING_LIMIT).await;
    state
        .cache
        .try_write_all(tokens.iter().cloned().map(CacheRecord::Token).collect());
    ApiResponse::list(tokens).cached(LISTING_MAX_AGE)
}

async fn token_detail(State(state): State<AppState>, Path(symbol): Path<String>) -> Result<Response, ApiError> {
    info!("Token detail requested for {}", symbol);

    let (detail, news) = tokio::join!(
        state.aggregator.providers().get_token_detail(&symbol),
        state.aggregator.crypto_news(),
    );
    let detail = detail.ok_or_else(|| ApiError::not_found("Token not found"))?;

    let related_news = related_news(&news, &detail.token.name, &detail.token.symbol);
    Ok(ApiResponse::item(TokenDetailView { detail, related_news }).cached(LISTING_MAX_AGE))
}

async fn prices(State(state): State<AppState>, Query(params): Query<PriceParams>) -> Result<Response, ApiError> {
    let ids: Vec<String> = params
        .ids
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(ApiError::bad_request("Missing ids parameter"));
    }

    let updates = state.aggregator.providers().get_price_updates(&ids).await;
    Ok(ApiResponse::list(updates).cached(PRICE_MAX_AGE))
}

async fn all_prices(State(state): State<AppState>, Query(params): Query<LimitParams>) -> Response {
    let limit = clamp_limit(params.limit, 100, TOKEN_LISTING_LIMIT);
    let tokens = state.aggregator.providers().list_top_tokens(limit).await;
    ApiResponse::list(tokens).cached(PRICE_MAX_AGE)
}

async fn price_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ApiError> {
    let symbol = params
        .symbol
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing symbol parameter"))?;
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS).max(1);

    let data = state.aggregator.providers().get_price_history(&symbol, days).await;
    let message = data
        .is_empty()
        .then(|| format!("No price history available for {}", symbol));

    let body = HistoryResponse {
        success: !data.is_empty(),
        count: data.len(),
        data,
        symbol,
        days,
        message,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    Ok(with_cache_control(HISTORY_MAX_AGE, Json(body)))
}

async fn market_stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state
        .aggregator
        .providers()
        .get_market_stats()
        .await
        .ok_or_else(|| ApiError::not_found("Market stats unavailable"))?;
    Ok(ApiResponse::item(stats).cached(LISTING_MAX_AGE))
}

async fn market_movers(State(state): State<AppState>) -> Response {
    let movers = state.aggregator.providers().get_top_gainers_losers().await;
    let count = movers.gainers.len() + movers.losers.len();
    ApiResponse::with_count(movers, count).cached(LISTING_MAX_AGE)
}

async fn list_exchanges(State(state): State<AppState>, Query(params): Query<LimitParams>) -> Response {
    let limit = clamp_limit(params.limit, 50, 100);
    let exchanges = state.aggregator.providers().list_exchanges(limit).await;
    ApiResponse::list(exchanges).cached(LISTING_MAX_AGE)
}

async fn list_defi(State(state): State<AppState>, Query(params): Query<LimitParams>) -> Response {
    let limit = clamp_limit(params.limit, 50, 100);
    let protocols = state.aggregator.providers().list_defi_protocols(limit).await;
    ApiResponse::list(protocols).cached(LISTING_MAX_AGE)
}
