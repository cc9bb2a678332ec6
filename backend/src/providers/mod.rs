pub mod chains;
pub mod coinbase;
pub mod coingecko;
pub mod coinmarketcap;
pub mod manager;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::http::FetchError;
use crate::types::Token;

pub use chains::ChainRegistry;
pub use coinbase::CoinbaseProvider;
pub use coingecko::{CoinGeckoProvider, PriceHistoryProvider};
pub use coinmarketcap::CoinMarketCapProvider;
pub use manager::ProviderManager;

/// A provider able to produce a ranked token listing.
#[async_trait]
pub trait TokenListSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` means "try the next source"; `Ok` with an empty list is a real answer.
    async fn try_list_top_tokens(&self, limit: usize) -> Result<Vec<Token>, FetchError>;
}

/// Prices are USD and never negative; NaN and infinities become zero.
pub(crate) fn sanitize_price(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

pub(crate) fn parse_decimal(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok()).filter(|v| v.is_finite())
}

/// Collapses a provider result into the fail-soft shape callers see.
pub(crate) fn or_default<T: Default>(provider: &str, operation: &str, result: Result<T, FetchError>) -> T {
    match result {
        Ok(value) => value,
        Err(FetchError::NotConfigured(what)) => {
            warn!("{} {} skipped: {} not configured", provider, operation, what);
            T::default()
        }
        Err(e) => {
            error!("Error in {} {}: {}", provider, operation, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_price() {
        assert_eq!(sanitize_price(Some(1.5)), 1.5);
        assert_eq!(sanitize_price(Some(-3.0)), 0.0);
        assert_eq!(sanitize_price(Some(f64::NAN)), 0.0);
        assert_eq!(sanitize_price(None), 0.0);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(Some(" 42.5 ")), Some(42.5));
        assert_eq!(parse_decimal(Some("")), None);
        assert_eq!(parse_decimal(None), None);
    }
}
