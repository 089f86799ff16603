//! CoinGecko API Client
//!
//! Spot USD prices from the `/simple/price` endpoint. CoinGecko keys coins by
//! slug ("bitcoin"), so only symbols in the id table (or assets carrying an
//! explicit quote symbol) are supported.

use super::price_source::{PriceSource, ProviderStatus};
use crate::error::{FeederError, Result};
use crate::models::{AssetConfig, Quote};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

pub const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Simplified price response from CoinGecko /simple/price endpoint
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    #[serde(flatten)]
    prices: HashMap<String, SimplePriceData>,
}

#[derive(Debug, Deserialize)]
struct SimplePriceData {
    usd: Option<f64>,
}

pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    status: RwLock<ProviderStatus>,
}

impl CoinGeckoClient {
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

    /// Map common symbols to CoinGecko IDs
    pub fn symbol_to_id(symbol: &str) -> Option<&'static str> {
        let id = match symbol.to_lowercase().as_str() {
            "btc" => "bitcoin",
            "eth" => "ethereum",
            "sol" => "solana",
            "sui" | "fsui" => "sui",
            "usdt" => "tether",
            "usdc" => "usd-coin",
            "bnb" => "binancecoin",
            "xrp" => "ripple",
            "doge" => "dogecoin",
            "apt" => "aptos",
            "arb" => "arbitrum",
            "op" => "optimism",
            _ => return None,
        };
        Some(id)
    }

    fn coin_id(asset: &AssetConfig) -> Option<String> {
        asset
            .quote_symbol
            .as_ref()
            .map(|id| id.to_lowercase())
            .or_else(|| Self::symbol_to_id(&asset.symbol).map(str::to_string))
    }

    fn set_status(&self, status: ProviderStatus) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn error(&self, message: impl Into<String>) -> FeederError {
        FeederError::source_error(self.source_name(), message)
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn source_name(&self) -> &str {
        "CoinGecko"
    }

    fn status(&self) -> ProviderStatus {
        *self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    fn supports(&self, asset: &AssetConfig) -> bool {
        Self::coin_id(asset).is_some()
    }

    async fn fetch(&self, asset: &AssetConfig) -> Result<Quote> {
        let coin_id = Self::coin_id(asset).ok_or_else(|| FeederError::UnknownSymbol {
            provider: self.source_name().to_string(),
            symbol: asset.symbol.clone(),
        })?;

        let url = format!("{}/simple/price", self.base_url);
        debug!("Fetching price for {} from CoinGecko", coin_id);

        let response = self
            .client
            .get(&url)
            .query(&[("ids", coin_id.as_str()), ("vs_currencies", "usd")])
            .send()
            .await
            .map_err(|e| {
                self.set_status(ProviderStatus::Error);
                self.error(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            self.set_status(if status.as_u16() == 429 {
                ProviderStatus::RateLimited
            } else {
                ProviderStatus::Error
            });
            return Err(self.error(format!("API error: {} - {}", status, body)));
        }

        let data: SimplePriceResponse = response.json().await.map_err(|e| {
            self.set_status(ProviderStatus::Error);
            self.error(format!("failed to parse response: {}", e))
        })?;

        // Extract price from response like: {"bitcoin": {"usd": 64213.55}}
        let price = data
            .prices
            .get(&coin_id)
            .and_then(|entry| entry.usd)
            .ok_or_else(|| self.error(format!("price not found for {}", coin_id)))?;

        self.set_status(ProviderStatus::Healthy);
        debug!("CoinGecko {} = {}", coin_id, price);

        Ok(Quote::now(price, self.source_name()))
    }
}
