// Shared models for the oracle feeder
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Asset configuration (loaded once, read-only afterwards)
// ============================================================================

/// Everything needed to price and publish one asset.
///
/// Built from the deployment registry at startup and never mutated, so it is
/// shared across the scheduler and workers without synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Lower-case asset symbol (e.g. "btc", "usdt", "xau")
    pub symbol: String,
    /// Decimal places used when scaling the price for on-chain storage
    pub decimal_exponent: u32,
    /// Oracle package (contract) identifier
    pub package: String,
    /// Feeder object address that receives this asset's updates
    pub feeder_id: String,
    /// Provider-specific lookup key overriding the built-in symbol tables
    #[serde(default)]
    pub quote_symbol: Option<String>,
}

impl AssetConfig {
    pub fn new(
        symbol: impl Into<String>,
        decimal_exponent: u32,
        package: impl Into<String>,
        feeder_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into().to_lowercase(),
            decimal_exponent,
            package: package.into(),
            feeder_id: feeder_id.into(),
            quote_symbol: None,
        }
    }

    pub fn with_quote_symbol(mut self, quote_symbol: impl Into<String>) -> Self {
        self.quote_symbol = Some(quote_symbol.into());
        self
    }
}

// ============================================================================
// Quote (produced fresh each tick, consumed once)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Decimal price in USD
    pub price: f64,
    pub sampled_at: DateTime<Utc>,
    /// Provider name that produced this quote
    pub source: String,
}

impl Quote {
    pub fn now(price: f64, source: impl Into<String>) -> Self {
        Self {
            price,
            sampled_at: Utc::now(),
            source: source.into(),
        }
    }
}
