use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProductsResponse {
    #[serde(default)]
    pub products: Vec<CoinbaseProduct>,
}

/// Advanced Trade product; numeric fields arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseProduct {
    pub product_id: String,
    pub price: Option<String>,
    pub price_percentage_change_24h: Option<String>,
    pub volume_24h: Option<String>,
    pub base_name: Option<String>,
    pub base_display_symbol: Option<String>,
    pub base_currency_id: Option<String>,
    pub quote_currency_id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub trading_disabled: bool,
}

impl CoinbaseProduct {
    pub fn symbol(&self) -> String {
        self.base_display_symbol
            .as_deref()
            .or(self.base_currency_id.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.product_id)
            .to_uppercase()
    }

    pub fn is_tradable_usd(&self) -> bool {
        self.quote_currency_id.as_deref() == Some("USD")
            && self.status.as_deref() == Some("online")
            && !self.is_disabled
            && !self.trading_disabled
    }
}
