//! Binance API Client
//!
//! Provides spot prices from the Binance public API.
//! No API key required for public endpoints.
//!
//! Uses `/avgPrice` (5-minute average) rather than the last trade so a single
//! outlier print is not pushed on-chain.

use super::price_source::{PriceSource, ProviderStatus};
use crate::error::{FeederError, Result};
use crate::models::{AssetConfig, Quote};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

pub const BASE_URL: &str = "https://api.binance.com/api/v3";

/// Symbols quoted in USDT that can't be derived by upper-casing
const SYMBOL_ALIASES: &[(&str, &str)] = &[("fsui", "SUI")];

/// Assets that have no `<SYMBOL>USDT` pair
const UNQUOTED: &[&str] = &["usdt"];

#[derive(Debug, Deserialize)]
struct AvgPriceResponse {
    price: String,
}

/// Binance API client implementing PriceSource
pub struct BinanceClient {
    client: Client,
    base_url: String,
    /// Current provider status (uses std::sync for sync trait method)
    status: RwLock<ProviderStatus>,
}

impl BinanceClient {
    /// Create a new Binance client with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("OracleFeeder/1.0")
            .build()
            .map_err(|e| FeederError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            status: RwLock::new(ProviderStatus::Healthy),
        })
    }

    /// Convert an asset to its Binance trading pair (e.g., btc -> BTCUSDT)
    pub fn trading_pair(asset: &AssetConfig) -> Option<String> {
        if let Some(pair) = &asset.quote_symbol {
            return Some(pair.to_uppercase());
        }
        let symbol = asset.symbol.as_str();
        if UNQUOTED.contains(&symbol) {
            return None;
        }
        let base = SYMBOL_ALIASES
            .iter()
            .find(|(alias, _)| *alias == symbol)
            .map(|(_, base)| base.to_string())
            .unwrap_or_else(|| symbol.to_uppercase());
        Some(format!("{}USDT", base))
    }

    fn set_status(&self, status: ProviderStatus) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn error(&self, message: impl Into<String>) -> FeederError {
        FeederError::source_error(self.source_name(), message)
    }
}

#[async_trait]
impl PriceSource for BinanceClient {
    fn source_name(&self) -> &str {
        "Binance"
    }

    fn status(&self) -> ProviderStatus {
        *self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    fn supports(&self, asset: &AssetConfig) -> bool {
        Self::trading_pair(asset).is_some()
    }

    async fn fetch(&self, asset: &AssetConfig) -> Result<Quote> {
        let pair = Self::trading_pair(asset).ok_or_else(|| FeederError::UnknownSymbol {
            provider: self.source_name().to_string(),
            symbol: asset.symbol.clone(),
        })?;

        let url = format!("{}/avgPrice", self.base_url);
        debug!("Fetching {} from Binance", pair);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", pair.as_str())])
            .send()
            .await
            .map_err(|e| {
                self.set_status(ProviderStatus::Error);
                self.error(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                self.set_status(ProviderStatus::RateLimited);
            } else {
                self.set_status(ProviderStatus::Error);
            }

            return Err(self.error(format!("API error: {} - {}", status, body)));
        }

        let body: AvgPriceResponse = response.json().await.map_err(|e| {
            self.set_status(ProviderStatus::Error);
            self.error(format!("failed to parse response: {}", e))
        })?;

        let price: f64 = body
            .price
            .parse()
            .map_err(|_| {
                self.set_status(ProviderStatus::Error);
                self.error(format!("malformed price '{}'", body.price))
            })?;

        self.set_status(ProviderStatus::Healthy);
        debug!("Binance {} = {}", pair, price);

        Ok(Quote::now(price, self.source_name()))
    }
}
