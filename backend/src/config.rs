use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use tracing::{info, warn};

use crate::feeds::FeedSource;
use crate::http::BROWSER_USER_AGENT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub coinmarketcap: ProviderSettings,
    pub coingecko: ProviderSettings,
    pub coinbase: ProviderSettings,
    pub airdrops: ScraperSettings,
    pub feeds: FeedSettings,
    pub chains: ChainDatasetSettings,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSettings {
    pub api_url: String,
    pub api_key: Option<String>,
}

impl ProviderSettings {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: None,
        }
    }

    pub fn with_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Key with surrounding whitespace removed; blank keys count as absent.
    pub fn key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    pub listing_url: String,
    pub base_origin: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub timeout_seconds: u64,
    pub crypto_feeds: Vec<FeedSource>,
    pub ai_feeds: Vec<FeedSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainDatasetSettings {
    pub dataset_url: String,
    pub timeout_seconds: u64,
    pub max_entries: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            coinmarketcap: ProviderSettings::new("https://pro-api.coinmarketcap.com"),
            coingecko: ProviderSettings::new("https://api.coingecko.com/api/v3"),
            coinbase: ProviderSettings::new("https://api.coinbase.com/api/v3/brokerage"),
            airdrops: ScraperSettings::default(),
            feeds: FeedSettings::default(),
            chains: ChainDatasetSettings::default(),
            database_url: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            listing_url: "https://airdrops.io/".to_string(),
            base_origin: "https://airdrops.io".to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_seconds: 15,
            max_items: 50,
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            crypto_feeds: vec![
                FeedSource::new("https://coinmarketcap.com/headlines/news/rss/", "CoinMarketCap"),
                FeedSource::new("https://coindesk.com/arc/outboundfeeds/rss/", "CoinDesk"),
                FeedSource::new("https://cointelegraph.com/rss", "CoinTelegraph"),
                FeedSource::new("https://decrypt.co/feed", "Decrypt"),
            ],
            ai_feeds: vec![
                FeedSource::new("https://venturebeat.com/category/ai/feed", "VentureBeat AI"),
                FeedSource::new("https://thenextweb.com/feed", "The Next Web"),
            ],
        }
    }
}

impl Default for ChainDatasetSettings {
    fn default() -> Self {
        Self {
            dataset_url: "https://chainid.network/chains.json".to_string(),
            timeout_seconds: 10,
            max_entries: 100,
        }
    }
}

impl HubConfig {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        info!("Loading hub configuration from: {}", path);
        let content = fs::read_to_string(path)?;
        let config: HubConfig = serde_json::from_str(&content)?;
        info!("Hub configuration loaded successfully");
        Ok(config)
    }

    pub fn load_from_env() -> Self {
        let mut config = match env::var("VIGILNET_CONFIG") {
            Ok(path) => Self::load_from_file(&path).unwrap_or_else(|e| {
                warn!("Failed to load config file {}: {}, using defaults", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        };

        config.apply_env(|key| env::var(key).ok());
        config
    }

    /// Overlays environment values; `lookup` is injectable so tests never touch the process env.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("COINMARKETCAP_API_KEY") {
            self.coinmarketcap.api_key = Some(key);
            info!("Loaded CoinMarketCap API key");
        }

        if let Some(key) = lookup("COINBASE_API_KEY") {
            self.coinbase.api_key = Some(key);
            info!("Loaded Coinbase API key");
        }

        if let Some(key) = lookup("COINGECKO_API_KEY") {
            self.coingecko.api_key = Some(key);
        }

        if let Some(url) = lookup("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database_url = Some(url);
            }
        }

        if let Some(host) = lookup("VIGILNET_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("VIGILNET_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid VIGILNET_PORT value: {}", port),
            }
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_have_no_api_keys() {
        let config = HubConfig::default();
        assert!(config.coinmarketcap.key().is_none());
        assert!(config.coinbase.key().is_none());
        assert_eq!(config.feeds.crypto_feeds.len(), 4);
        assert_eq!(config.airdrops.max_items, 50);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_apply_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("COINMARKETCAP_API_KEY", "cmc-key"),
            ("VIGILNET_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/vigilnet"),
        ]
        .into_iter()
        .collect();

        let mut config = HubConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.coinmarketcap.key(), Some("cmc-key"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/vigilnet"));
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = HubConfig::default();
        config.apply_env(|key| (key == "VIGILNET_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_blank_key_counts_as_absent() {
        let settings = ProviderSettings::new("https://example.com").with_key("   ");
        assert!(settings.key().is_none());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"host": "127.0.0.1", "port": 9000}}, "coinmarketcap": {{"api_url": "http://localhost:1", "api_key": "k"}}}}"#
        )
        .unwrap();

        let config = HubConfig::load_from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.coinmarketcap.key(), Some("k"));
        assert_eq!(config.coingecko.api_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.feeds.ai_feeds.len(), 2);
    }
}
