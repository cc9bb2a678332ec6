//! Read-only JSON API over the aggregator.
//!
//! Every endpoint answers with the `{success, data, count, timestamp}`
//! envelope. Upstream failures surface as empty data, never as 5xx.

pub mod content;
pub mod market;
pub mod responses;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::cache::CacheSink;

pub use responses::{ApiError, ApiResponse};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub cache: Arc<dyn CacheSink>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, cache: Arc<dyn CacheSink>) -> Self {
        Self { aggregator, cache }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(market::market_routes())
        .merge(content::content_routes())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "vigilnet-hub",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
