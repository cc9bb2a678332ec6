//! Wire shapes of the CoinMarketCap Pro API.
//!
//! Only the fields the hub maps are modelled; everything is optional because
//! the API omits fields freely across plans and endpoint versions.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct CmcEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub status: Option<CmcStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CmcStatus {
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

/// v1 endpoints key a single object per symbol, v2 endpoints a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Listing tags arrive as bare slugs or as objects depending on endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CmcTag {
    Slug(String),
    Detailed { slug: String },
}

impl CmcTag {
    pub fn slug(&self) -> &str {
        match self {
            CmcTag::Slug(slug) => slug,
            CmcTag::Detailed { slug } => slug,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmcPlatform {
    pub name: String,
    pub symbol: String,
    pub token_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcUsdQuote {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub volume_change_24h: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub percent_change_30d: Option<f64>,
    pub percent_change_60d: Option<f64>,
    pub percent_change_90d: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_dominance: Option<f64>,
    pub fully_diluted_market_cap: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcQuote {
    #[serde(rename = "USD")]
    pub usd: Option<CmcUsdQuote>,
}

/// One coin as returned by listings, quotes and category endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CmcCoin {
    pub id: u64,
    pub name: String,
    pub symbol: String,
    pub slug: String,
    pub cmc_rank: Option<u32>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub date_added: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<CmcTag>>,
    pub platform: Option<CmcPlatform>,
    #[serde(default)]
    pub quote: CmcQuote,
}

impl CmcCoin {
    pub fn usd(&self) -> CmcUsdQuote {
        self.quote.usd.clone().unwrap_or_default()
    }

    pub fn tag_slugs(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|t| t.slug().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcUrls {
    #[serde(default)]
    pub website: Vec<String>,
    #[serde(default)]
    pub technical_doc: Vec<String>,
    #[serde(default)]
    pub twitter: Vec<String>,
    #[serde(default)]
    pub reddit: Vec<String>,
    #[serde(default)]
    pub chat: Vec<String>,
    #[serde(default)]
    pub source_code: Vec<String>,
}

/// Metadata from the v2 info endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CmcInfo {
    pub id: u64,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub date_added: Option<String>,
    pub date_launched: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub platform: Option<CmcPlatform>,
    #[serde(default)]
    pub urls: CmcUrls,
}

pub type CmcSymbolMap<T> = HashMap<String, OneOrMany<T>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcGlobalUsd {
    pub total_market_cap: Option<f64>,
    pub total_volume_24h: Option<f64>,
    pub total_market_cap_yesterday_percentage_change: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcGlobalQuote {
    #[serde(rename = "USD")]
    pub usd: Option<CmcGlobalUsd>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmcGlobalMetrics {
    pub btc_dominance: Option<f64>,
    pub eth_dominance: Option<f64>,
    pub active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    pub quote: CmcGlobalQuote,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcExchangeUsd {
    pub volume_24h: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CmcExchangeQuote {
    #[serde(rename = "USD")]
    pub usd: Option<CmcExchangeUsd>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmcExchange {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub date_launched: Option<String>,
    pub exchange_score: Option<f64>,
    pub country: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub quote: CmcExchangeQuote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmcCategorySummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CmcCategory {
    #[serde(default)]
    pub coins: Vec<CmcCoin>,
}
