use std::time::Duration;
use tracing::{info, instrument, warn};

use super::coingecko_request;
use super::types::{MarketChart, SearchResponse};
use crate::config::ProviderSettings;
use crate::http::{FetchError, HttpClient};
use crate::types::PricePoint;

const SEARCH_PATH: &str = "/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const CHART_TIMEOUT: Duration = Duration::from_secs(15);

/// Ranges up to this many days are fetched hourly, longer ones daily.
pub const HOURLY_MAX_DAYS: u32 = 7;

pub fn interval_for(days: u32) -> &'static str {
    if days <= HOURLY_MAX_DAYS {
        "hourly"
    } else {
        "daily"
    }
}

/// Resolves a ticker to a CoinGecko id, then loads its market chart.
pub struct PriceHistoryProvider {
    http: HttpClient,
    settings: ProviderSettings,
}

impl PriceHistoryProvider {
    pub fn new(http: HttpClient, settings: ProviderSettings) -> Self {
        Self { http, settings }
    }

    /// First search hit whose symbol matches; no disambiguation.
    pub async fn try_resolve_id(&self, symbol: &str) -> Result<Option<String>, FetchError> {
        let request = coingecko_request(&self.settings, SEARCH_PATH, SEARCH_TIMEOUT).query("query", symbol);
        let response: SearchResponse = self.http.get_json(request).await?;
        Ok(response
            .coins
            .into_iter()
            .find(|coin| coin.symbol.eq_ignore_ascii_case(symbol))
            .map(|coin| coin.id))
    }

    pub async fn try_get_price_history(&self, symbol: &str, days: u32) -> Result<Vec<PricePoint>, FetchError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Ok(Vec::new());
        }
        let days = days.max(1);

        let Some(coin_id) = self.try_resolve_id(symbol).await? else {
            info!("No CoinGecko match for symbol {}", symbol);
            return Ok(Vec::new());
        };

        let request = coingecko_request(&self.settings, &format!("/coins/{}/market_chart", coin_id), CHART_TIMEOUT)
            .query("vs_currency", "usd")
            .query("days", days)
            .query("interval", interval_for(days));
        let chart: MarketChart = self.http.get_json(request).await?;

        Ok(chart
            .prices
            .iter()
            .enumerate()
            .filter_map(|(index, (timestamp, price))| {
                let price = price.filter(|p| p.is_finite())?;
                Some(PricePoint {
                    timestamp: *timestamp as i64,
                    price,
                    volume: chart
                        .total_volumes
                        .get(index)
                        .and_then(|(_, volume)| *volume)
                        .filter(|v| v.is_finite()),
                })
            })
            .collect())
    }

    /// Empty when the symbol is unknown, the series is empty or the call failed.
    #[instrument(skip(self))]
    pub async fn get_price_history(&self, symbol: &str, days: u32) -> Vec<PricePoint> {
        match self.try_get_price_history(symbol, days).await {
            Ok(points) => {
                if points.is_empty() {
                    warn!("No price history available for {}", symbol);
                }
                points
            }
            Err(e) => {
                warn!("Error fetching price history for {}: {}", symbol, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{StubReply, StubTransport};
    use std::sync::Arc;

    const SEARCH: &str = r#"{"coins":[
        {"id":"wrapped-bitcoin","symbol":"WBTC","name":"Wrapped Bitcoin"},
        {"id":"bitcoin","symbol":"BTC","name":"Bitcoin"},
        {"id":"bitcoin-cash","symbol":"BCH","name":"Bitcoin Cash"}
    ]}"#;

    const CHART: &str = r#"{"prices":[[1704067200000,42000.5],[1704070800000,42100.0]],
        "total_volumes":[[1704067200000,1.5e10]]}"#;

    fn history(stub: Arc<StubTransport>) -> PriceHistoryProvider {
        PriceHistoryProvider::new(HttpClient::new(stub), ProviderSettings::new("https://gecko.test/api/v3"))
    }

    #[test]
    fn test_interval_threshold() {
        assert_eq!(interval_for(1), "hourly");
        assert_eq!(interval_for(7), "hourly");
        assert_eq!(interval_for(8), "daily");
        assert_eq!(interval_for(365), "daily");
    }

    #[tokio::test]
    async fn test_history_resolves_symbol_then_loads_chart() {
        let stub = Arc::new(
            StubTransport::new()
                .on("/search?", StubReply::json(SEARCH))
                .on("/coins/bitcoin/market_chart", StubReply::json(CHART)),
        );
        let provider = history(stub.clone());

        let points = provider.get_price_history("btc", 5).await;

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 1_704_067_200_000);
        assert_eq!(points[0].volume, Some(1.5e10));
        assert!(points[1].volume.is_none());

        let chart_request = &stub.requests_to("market_chart")[0];
        assert_eq!(chart_request.query_param("interval"), Some("hourly"));
        assert_eq!(chart_request.query_param("days"), Some("5"));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_empty_without_chart_call() {
        let stub = Arc::new(StubTransport::new().on("/search?", StubReply::json(r#"{"coins":[]}"#)));
        let provider = history(stub.clone());

        assert!(provider.get_price_history("NOPE", 30).await.is_empty());
        assert!(stub.requests_to("market_chart").is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_empty() {
        let stub = Arc::new(StubTransport::new().on("/search?", StubReply::NetworkFailure("reset".to_string())));
        assert!(history(stub).get_price_history("BTC", 30).await.is_empty());
    }
}
