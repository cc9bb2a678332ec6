use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    ChainRegistry, CoinGeckoProvider, CoinMarketCapProvider, CoinbaseProvider, PriceHistoryProvider, TokenListSource,
};
use crate::config::HubConfig;
use crate::http::{FetchError, HttpClient};
use crate::types::{DefiProtocol, Exchange, GainersLosers, MarketStats, PricePoint, PriceUpdate, Testnet, Token, TokenDetail};

/// Owns every market-data provider and the order they are consulted in.
pub struct ProviderManager {
    coinmarketcap: Arc<CoinMarketCapProvider>,
    coinbase: Arc<CoinbaseProvider>,
    coingecko: Arc<CoinGeckoProvider>,
    history: PriceHistoryProvider,
    chains: ChainRegistry,
    token_sources: Vec<Arc<dyn TokenListSource>>,
}

impl ProviderManager {
    pub fn new(config: &HubConfig, http: HttpClient) -> Self {
        let coinmarketcap = Arc::new(CoinMarketCapProvider::new(http.clone(), config.coinmarketcap.clone()));
        let coinbase = Arc::new(CoinbaseProvider::new(http.clone(), config.coinbase.clone()));
        let coingecko = Arc::new(CoinGeckoProvider::new(http.clone(), config.coingecko.clone()));

        let mut token_sources: Vec<Arc<dyn TokenListSource>> = Vec::new();

        info!("🔄 Initializing CoinMarketCap...");
        if coinmarketcap.is_configured() {
            info!("✅ CoinMarketCap initialized (primary)");
        } else {
            warn!("❌ CoinMarketCap API key not configured, listings fall through to the next provider");
        }
        token_sources.push(coinmarketcap.clone());

        info!("🔄 Initializing Coinbase...");
        if coinbase.is_configured() {
            token_sources.push(coinbase.clone());
            info!("✅ Coinbase initialized (source count: {})", token_sources.len());
        } else {
            warn!("❌ Coinbase API key not configured, skipping");
        }

        token_sources.push(coingecko.clone());
        info!("✅ CoinGecko initialized as fallback (source count: {})", token_sources.len());

        Self {
            history: PriceHistoryProvider::new(http.clone(), config.coingecko.clone()),
            chains: ChainRegistry::new(http, config.chains.clone()),
            coinmarketcap,
            coinbase,
            coingecko,
            token_sources,
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.token_sources.iter().map(|s| s.name()).collect()
    }

    pub fn coinmarketcap(&self) -> &CoinMarketCapProvider {
        &self.coinmarketcap
    }

    /// Listing sources in fallback order, for callers that fan out over them.
    pub fn token_sources(&self) -> &[Arc<dyn TokenListSource>] {
        &self.token_sources
    }

    /// First source that answers wins; a source that errors hands over to the next.
    #[instrument(skip(self))]
    pub async fn list_top_tokens(&self, limit: usize) -> Vec<Token> {
        for source in &self.token_sources {
            match source.try_list_top_tokens(limit).await {
                Ok(mut tokens) => {
                    tokens.truncate(limit);
                    info!("Fetched {} tokens from {}", tokens.len(), source.name());
                    return tokens;
                }
                Err(FetchError::NotConfigured(what)) => {
                    info!("{} skipped ({} not configured)", source.name(), what);
                }
                Err(e) => {
                    warn!("{} listing failed, trying next provider: {}", source.name(), e);
                }
            }
        }

        error!("All token listing providers failed");
        Vec::new()
    }

    /// Batched prices. Symbols go to CoinMarketCap; without it, ids are tried
    /// as Coinbase products (`BTC` becomes `BTC-USD`) and then as CoinGecko ids.
    #[instrument(skip(self))]
    pub async fn get_price_updates(&self, ids: &[String]) -> Vec<PriceUpdate> {
        let ids: Vec<String> = ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Vec::new();
        }

        if self.coinmarketcap.is_configured() {
            let symbols: Vec<String> = ids.iter().map(|id| id.to_uppercase()).collect();
            match self.coinmarketcap.try_get_prices(&symbols).await {
                Ok(prices) => {
                    let timestamp = chrono::Utc::now().timestamp_millis();
                    return symbols
                        .iter()
                        .filter_map(|symbol| {
                            prices.get(symbol).map(|price| PriceUpdate {
                                coin_id: symbol.to_lowercase(),
                                symbol: symbol.clone(),
                                price: *price,
                                price_change_24h: 0.0,
                                timestamp,
                            })
                        })
                        .collect();
                }
                Err(e) => warn!("CoinMarketCap prices failed, trying next provider: {}", e),
            }
        }

        if self.coinbase.is_configured() {
            let products: Vec<String> = ids
                .iter()
                .map(|id| {
                    if id.contains('-') {
                        id.to_uppercase()
                    } else {
                        format!("{}-USD", id.to_uppercase())
                    }
                })
                .collect();
            match self.coinbase.try_price_updates(&products).await {
                Ok(updates) => return updates,
                Err(e) => warn!("Coinbase prices failed, trying next provider: {}", e),
            }
        }

        self.coingecko.get_price_updates(&ids).await
    }

    pub async fn get_token_detail(&self, symbol: &str) -> Option<TokenDetail> {
        self.coinmarketcap.get_token_detail(symbol).await
    }

    pub async fn get_market_stats(&self) -> Option<MarketStats> {
        self.coinmarketcap.get_market_stats().await
    }

    pub async fn get_top_gainers_losers(&self) -> GainersLosers {
        self.coinmarketcap.get_top_gainers_losers().await
    }

    pub async fn list_exchanges(&self, limit: usize) -> Vec<Exchange> {
        self.coinmarketcap.list_exchanges(limit).await
    }

    pub async fn list_defi_protocols(&self, limit: usize) -> Vec<DefiProtocol> {
        self.coinmarketcap.list_defi_protocols(limit).await
    }

    pub async fn get_price_history(&self, symbol: &str, days: u32) -> Vec<PricePoint> {
        self.history.get_price_history(symbol, days).await
    }

    pub async fn list_testnets(&self) -> Vec<Testnet> {
        self.chains.list_testnets().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use crate::http::{StubReply, StubTransport};

    const CMC: &str = "https://cmc.test";
    const COINBASE: &str = "https://coinbase.test";
    const GECKO: &str = "https://gecko.test";

    fn config(cmc_key: Option<&str>, coinbase_key: Option<&str>) -> HubConfig {
        let mut config = HubConfig::default();
        config.coinmarketcap = ProviderSettings::new(CMC);
        config.coinbase = ProviderSettings::new(COINBASE);
        config.coingecko = ProviderSettings::new(GECKO);
        config.coinmarketcap.api_key = cmc_key.map(str::to_string);
        config.coinbase.api_key = coinbase_key.map(str::to_string);
        config
    }

    const TRENDING: &str = r#"{"coins":[{"item":{"id":"pepe","name":"Pepe","symbol":"pepe"}}]}"#;
    const PRICES: &str = r#"{"pepe":{"usd":0.00001,"usd_24h_change":1.0}}"#;

    #[tokio::test]
    async fn test_chain_order_skips_unconfigured_coinbase() {
        let stub = Arc::new(StubTransport::new());
        let manager = ProviderManager::new(&config(None, Some("short")), HttpClient::new(stub));
        assert_eq!(manager.source_names(), vec!["CoinMarketCap", "CoinGecko"]);

        let stub = Arc::new(StubTransport::new());
        let manager = ProviderManager::new(&config(None, Some("0123456789abcdefghijKLMN")), HttpClient::new(stub));
        assert_eq!(manager.source_names(), vec!["CoinMarketCap", "Coinbase", "CoinGecko"]);
    }

    #[tokio::test]
    async fn test_failed_primary_falls_back_to_coingecko() {
        let stub = Arc::new(
            StubTransport::new()
                .on("cmc.test", StubReply::status(500, "down"))
                .on("/search/trending", StubReply::json(TRENDING))
                .on("/simple/price", StubReply::json(PRICES)),
        );
        let manager = ProviderManager::new(&config(Some("cmc-key"), None), HttpClient::new(stub.clone()));

        let tokens = manager.list_top_tokens(10).await;

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].id, "coingecko-pepe");
        assert_eq!(stub.requests_to("cmc.test").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_primary_answer_is_final() {
        let stub = Arc::new(
            StubTransport::new()
                .on("cmc.test", StubReply::json(r#"{"data":[]}"#))
                .on("/search/trending", StubReply::json(TRENDING)),
        );
        let manager = ProviderManager::new(&config(Some("cmc-key"), None), HttpClient::new(stub.clone()));

        assert!(manager.list_top_tokens(10).await.is_empty());
        assert!(stub.requests_to("gecko.test").is_empty());
    }

    #[tokio::test]
    async fn test_price_updates_without_keys_use_coingecko_ids() {
        let stub = Arc::new(StubTransport::new().on("/simple/price", StubReply::json(PRICES)));
        let manager = ProviderManager::new(&config(None, None), HttpClient::new(stub.clone()));

        let updates = manager.get_price_updates(&["pepe".to_string(), " ".to_string()]).await;

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].coin_id, "pepe");
        assert!(stub.requests_to("cmc.test").is_empty());
    }
}
