use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single news entry normalized from an RSS or Atom feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,            // "<source>-<guid|link|index>", unique within one fetch batch
    pub title: String,
    pub link: String,
    pub pub_date: String,      // RFC 3339 when the feed date parses, raw text otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,            // "<provider>-<providerId>"
    pub name: String,
    pub symbol: String,        // uppercase
    pub price: f64,            // USD, never negative
    pub price_change_24h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_1h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_7d: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub coin_id: String,       // provider slug used for follow-up calls
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reddit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
}

impl SocialLinks {
    pub fn is_empty(&self) -> bool {
        self.twitter.is_none()
            && self.reddit.is_none()
            && self.telegram.is_none()
            && self.discord.is_none()
            && self.github.is_none()
    }
}

/// Hosting chain for tokens issued on another network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPlatform {
    pub name: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenDetail {
    #[serde(flatten)]
    pub token: Token,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub fully_diluted_market_cap: Option<f64>,
    pub market_cap_dominance: Option<f64>,
    pub market_cap_change_24h: Option<f64>,
    pub volume_change_24h: Option<f64>,
    pub price_change_30d: Option<f64>,
    pub price_change_60d: Option<f64>,
    pub price_change_90d: Option<f64>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub whitepaper: Option<String>,
    pub tags: Vec<String>,
    pub social_links: SocialLinks,
    pub platform: Option<TokenPlatform>,
    pub date_added: Option<String>,
    pub date_launched: Option<String>,
}

/// Coarse lifecycle bucket derived from the scraped free-text status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AirdropStatus {
    Active,
    Ended,
    Upcoming,
    #[default]
    Unknown,
}

impl AirdropStatus {
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return AirdropStatus::Unknown;
        };
        let lower = raw.to_lowercase();
        if lower.contains("active") || lower.contains("ongoing") {
            AirdropStatus::Active
        } else if lower.contains("ended") || lower.contains("closed") {
            AirdropStatus::Ended
        } else if lower.contains("upcoming") || lower.contains("soon") {
            AirdropStatus::Upcoming
        } else {
            AirdropStatus::Unknown
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Airdrop {
    pub id: String,
    pub title: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub status_kind: AirdropStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Testnet {
    pub id: String,
    pub name: String,
    pub chain_id: u64,
    pub rpc: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub explorers: Vec<String>,
    pub testnet: bool,         // always true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_currency: Option<NativeCurrency>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    pub active_cryptocurrencies: u64,
    pub market_cap_change_24h: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub timestamp: i64,        // epoch milliseconds
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub coin_id: String,
    pub symbol: String,
    pub price: f64,
    pub price_change_24h: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GainersLosers {
    pub gainers: Vec<Token>,
    pub losers: Vec<Token>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub trading_volume_24h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_established: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefiProtocol {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub tvl: f64,              // market cap stands in for TVL
    pub tvl_change_24h: f64,
    pub chains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Per-type filtered results of a cross-source search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub query: String,
    pub tokens: Vec<Token>,
    pub news: Vec<NewsItem>,
    pub airdrops: Vec<Airdrop>,
    pub token_count: usize,
    pub news_count: usize,
    pub airdrop_count: usize,
}

impl SearchResults {
    pub fn total(&self) -> usize {
        self.token_count + self.news_count + self.airdrop_count
    }
}

pub type PriceMap = HashMap<String, f64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airdrop_status_classification() {
        assert_eq!(AirdropStatus::classify(Some("Active now")), AirdropStatus::Active);
        assert_eq!(AirdropStatus::classify(Some("ONGOING")), AirdropStatus::Active);
        assert_eq!(AirdropStatus::classify(Some("Campaign ended")), AirdropStatus::Ended);
        assert_eq!(AirdropStatus::classify(Some("closed")), AirdropStatus::Ended);
        assert_eq!(AirdropStatus::classify(Some("Coming soon")), AirdropStatus::Upcoming);
        assert_eq!(AirdropStatus::classify(Some("Confirmed")), AirdropStatus::Unknown);
        assert_eq!(AirdropStatus::classify(None), AirdropStatus::Unknown);
    }

    #[test]
    fn test_token_serializes_camel_case_and_skips_absent_fields() {
        let token = Token {
            id: "coinmarketcap-1".to_string(),
            name: "Bitcoin".to_string(),
            symbol: "BTC".to_string(),
            price: 65000.0,
            price_change_24h: 1.5,
            coin_id: "bitcoin".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["priceChange24h"], 1.5);
        assert_eq!(json["coinId"], "bitcoin");
        assert!(json.get("marketCap").is_none());
    }

    #[test]
    fn test_token_detail_flattens_base_token() {
        let detail = TokenDetail {
            token: Token {
                symbol: "ETH".to_string(),
                ..Default::default()
            },
            max_supply: Some(1.0),
            ..Default::default()
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["symbol"], "ETH");
        assert_eq!(json["maxSupply"], 1.0);
    }
}
