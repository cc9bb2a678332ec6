use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use vigilnet_hub::api::{create_router, AppState};
use vigilnet_hub::cache::sink_from_url;
use vigilnet_hub::{Aggregator, HttpClient, HubConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("🔄 Loading VigilNet Hub configuration...");
    let config = HubConfig::load_from_env();

    let http = HttpClient::with_reqwest()?;
    let aggregator = Arc::new(Aggregator::from_config(&config, http));
    let cache = sink_from_url(config.database_url.as_deref());

    let app = create_router(AppState::new(aggregator, cache)).layer(CorsLayer::permissive());

    info!("🔧 Routes configured:");
    info!("  - /api/tokens, /api/tokens/:symbol (Token listings and detail)");
    info!("  - /api/prices, /api/prices/all, /api/prices/history (Prices)");
    info!("  - /api/market/stats, /api/market/movers (Market overview)");
    info!("  - /api/exchanges, /api/defi (Exchanges and DeFi)");
    info!("  - /api/news, /api/ai (Feed aggregation)");
    info!("  - /api/airdrops, /api/testnets (Airdrops and test networks)");
    info!("  - /api/search, /health");

    let address = config.bind_address();
    info!("🚀 Starting server on {}", address);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("🎯 Server bound to {}, starting HTTP service...", address);
    axum::serve(listener, app).await?;

    Ok(())
}
