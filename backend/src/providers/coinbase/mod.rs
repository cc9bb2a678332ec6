pub mod types;

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::instrument;

use super::{or_default, parse_decimal, sanitize_price, TokenListSource};
use crate::config::ProviderSettings;
use crate::http::{FetchError, HttpClient, HttpRequest};
use crate::types::{PriceUpdate, Token};
use self::types::{CoinbaseProduct, ProductsResponse};

const PROVIDER: &str = "Coinbase";

const PRODUCTS_PATH: &str = "/products";
const LISTING_TIMEOUT: Duration = Duration::from_secs(15);
const PRICES_TIMEOUT: Duration = Duration::from_secs(10);

/// Keys shorter than this are placeholders, not credentials.
const MIN_KEY_LEN: usize = 20;

/// Blockchain-exchange provider over the Advanced Trade products endpoint.
pub struct CoinbaseProvider {
    http: HttpClient,
    settings: ProviderSettings,
}

impl CoinbaseProvider {
    pub fn new(http: HttpClient, settings: ProviderSettings) -> Self {
        Self { http, settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.key().map_or(false, |k| k.len() >= MIN_KEY_LEN)
    }

    async fn try_products(&self, timeout: Duration) -> Result<Vec<CoinbaseProduct>, FetchError> {
        let key = self
            .settings
            .key()
            .filter(|k| k.len() >= MIN_KEY_LEN)
            .ok_or(FetchError::NotConfigured("COINBASE_API_KEY"))?;

        let request = HttpRequest::get(format!(
            "{}{}",
            self.settings.api_url.trim_end_matches('/'),
            PRODUCTS_PATH
        ))
        .header("X-API-Key", key)
        .header("Accept", "application/json")
        .timeout(timeout);

        let response: ProductsResponse = self.http.get_json(request).await?;
        Ok(response.products)
    }

    /// Matches product ids case-insensitively; unknown ids are left out.
    pub async fn try_price_updates(&self, product_ids: &[String]) -> Result<Vec<PriceUpdate>, FetchError> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let products = self.try_products(PRICES_TIMEOUT).await?;
        let timestamp = Utc::now().timestamp_millis();

        Ok(product_ids
            .iter()
            .filter_map(|wanted| {
                let product = products
                    .iter()
                    .find(|p| p.product_id.eq_ignore_ascii_case(wanted.trim()))?;
                let price = parse_decimal(product.price.as_deref())?;
                Some(PriceUpdate {
                    coin_id: product.product_id.clone(),
                    symbol: product.symbol(),
                    price: sanitize_price(Some(price)),
                    price_change_24h: parse_decimal(product.price_percentage_change_24h.as_deref()).unwrap_or(0.0),
                    timestamp,
                })
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list_top_tokens(&self, limit: usize) -> Vec<Token> {
        or_default(PROVIDER, "products", self.try_list_top_tokens(limit).await)
    }

    #[instrument(skip(self))]
    pub async fn get_price_updates(&self, product_ids: &[String]) -> Vec<PriceUpdate> {
        or_default(PROVIDER, "prices", self.try_price_updates(product_ids).await)
    }
}

#[async_trait]
impl TokenListSource for CoinbaseProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn try_list_top_tokens(&self, limit: usize) -> Result<Vec<Token>, FetchError> {
        let mut products: Vec<CoinbaseProduct> = self
            .try_products(LISTING_TIMEOUT)
            .await?
            .into_iter()
            .filter(CoinbaseProduct::is_tradable_usd)
            .collect();

        products.sort_by(|a, b| {
            let volume_a = parse_decimal(a.volume_24h.as_deref()).unwrap_or(0.0);
            let volume_b = parse_decimal(b.volume_24h.as_deref()).unwrap_or(0.0);
            volume_b.partial_cmp(&volume_a).unwrap_or(Ordering::Equal)
        });

        Ok(products
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, product)| Token {
                id: format!("coinbase-{}", product.product_id),
                symbol: product.symbol(),
                name: product
                    .base_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| product.symbol()),
                price: sanitize_price(parse_decimal(product.price.as_deref())),
                price_change_24h: parse_decimal(product.price_percentage_change_24h.as_deref()).unwrap_or(0.0),
                volume_24h: parse_decimal(product.volume_24h.as_deref()),
                rank: Some(index as u32 + 1),
                coin_id: product.product_id.to_lowercase(),
                ..Default::default()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{StubReply, StubTransport};
    use std::sync::Arc;

    const KEY: &str = "organizations/abc/apiKeys/0123456789";

    const PRODUCTS: &str = r#"{"products":[
        {"product_id":"ETH-USD","price":"3200.10","price_percentage_change_24h":"-1.5","volume_24h":"5000",
         "base_name":"Ethereum","base_display_symbol":"ETH","quote_currency_id":"USD","status":"online"},
        {"product_id":"BTC-USD","price":"65000","price_percentage_change_24h":"2.25","volume_24h":"9000",
         "base_name":"Bitcoin","base_display_symbol":"BTC","quote_currency_id":"USD","status":"online"},
        {"product_id":"BTC-EUR","price":"60000","volume_24h":"99999","base_display_symbol":"BTC",
         "quote_currency_id":"EUR","status":"online"},
        {"product_id":"OLD-USD","price":"1","volume_24h":"1000000","base_display_symbol":"OLD",
         "quote_currency_id":"USD","status":"online","is_disabled":true},
        {"product_id":"HALT-USD","price":"1","volume_24h":"1000000","base_display_symbol":"HALT",
         "quote_currency_id":"USD","status":"delisted"}
    ]}"#;

    fn provider(stub: Arc<StubTransport>, key: &str) -> CoinbaseProvider {
        CoinbaseProvider::new(
            HttpClient::new(stub),
            ProviderSettings::new("https://coinbase.test/api/v3/brokerage").with_key(key),
        )
    }

    #[tokio::test]
    async fn test_short_key_counts_as_unconfigured() {
        let stub = Arc::new(StubTransport::new().on(PRODUCTS_PATH, StubReply::json(PRODUCTS)));
        let coinbase = provider(stub.clone(), "too-short");

        assert!(!coinbase.is_configured());
        assert!(coinbase.list_top_tokens(10).await.is_empty());
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn test_listing_filters_usd_online_and_sorts_by_volume() {
        let stub = Arc::new(StubTransport::new().on(PRODUCTS_PATH, StubReply::json(PRODUCTS)));
        let coinbase = provider(stub.clone(), KEY);

        let tokens = coinbase.list_top_tokens(10).await;

        let ids: Vec<&str> = tokens.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["coinbase-BTC-USD", "coinbase-ETH-USD"]);
        assert_eq!(tokens[0].rank, Some(1));
        assert_eq!(tokens[0].coin_id, "btc-usd");
        assert_eq!(tokens[1].price_change_24h, -1.5);
        assert_eq!(stub.requests()[0].header_value("x-api-key"), Some(KEY));
    }

    #[tokio::test]
    async fn test_prices_match_case_insensitively() {
        let stub = Arc::new(StubTransport::new().on(PRODUCTS_PATH, StubReply::json(PRODUCTS)));

        let updates = provider(stub, KEY)
            .get_price_updates(&["btc-usd".to_string(), "DOGE-USD".to_string()])
            .await;

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].coin_id, "BTC-USD");
        assert_eq!(updates[0].symbol, "BTC");
        assert_eq!(updates[0].price, 65000.0);
    }
}
