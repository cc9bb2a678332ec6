use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::market::LimitParams;
use super::responses::{clamp_limit, ApiResponse};
use super::AppState;
use crate::cache::CacheRecord;

const FEED_MAX_AGE: u32 = 300;
const TESTNET_MAX_AGE: u32 = 3600;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/api/news", get(crypto_news))
        .route("/api/ai", get(ai_news))
        .route("/api/airdrops", get(airdrops))
        .route("/api/testnets", get(testnets))
        .route("/api/search", get(search))
}

async fn crypto_news(State(state): State<AppState>) -> Response {
    let news = state.aggregator.crypto_news().await;
    state
        .cache
        .try_write_all(news.iter().cloned().map(CacheRecord::News).collect());
    ApiResponse::list(news).cached(FEED_MAX_AGE)
}

async fn ai_news(State(state): State<AppState>) -> Response {
    ApiResponse::list(state.aggregator.ai_news().await).cached(FEED_MAX_AGE)
}

async fn airdrops(State(state): State<AppState>, Query(params): Query<LimitParams>) -> Response {
    let limit = clamp_limit(params.limit, 50, 100);
    let mut airdrops = state.aggregator.scraper().scrape_airdrops().await;
    airdrops.truncate(limit);

    state
        .cache
        .try_write_all(airdrops.iter().cloned().map(CacheRecord::Airdrop).collect());
    ApiResponse::list(airdrops).cached(FEED_MAX_AGE)
}

async fn testnets(State(state): State<AppState>) -> Response {
    ApiResponse::list(state.aggregator.providers().list_testnets().await).cached(TESTNET_MAX_AGE)
}

/// Queries shorter than two characters return empty results without any fetch.
async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let results = state.aggregator.search(params.q.as_deref().unwrap_or_default()).await;
    let count = results.total();
    ApiResponse::with_count(results, count).cached(FEED_MAX_AGE)
}
