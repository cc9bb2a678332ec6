use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct TrendingResponse {
    #[serde(default)]
    pub coins: Vec<TrendingCoin>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingCoin {
    pub item: TrendingItem,
}

#[derive(Debug, Deserialize)]
pub struct TrendingItem {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub large: Option<String>,
    pub small: Option<String>,
    pub thumb: Option<String>,
}

/// One entry of `/simple/price`, keyed by coin id in the response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimplePrice {
    pub usd: Option<f64>,
    pub usd_24h_change: Option<f64>,
    pub usd_market_cap: Option<f64>,
}

pub type SimplePriceMap = HashMap<String, SimplePrice>;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub coins: Vec<SearchCoin>,
}

#[derive(Debug, Deserialize)]
pub struct SearchCoin {
    pub id: String,
    pub symbol: String,
}

/// `[[timestamp_ms, value], ...]` series from `/coins/{id}/market_chart`.
#[derive(Debug, Default, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, Option<f64>)>,
}
