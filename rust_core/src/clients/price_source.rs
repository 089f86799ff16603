//! Price Source Trait
//!
//! Defines the common interface every price source implements.
//! Implementations: stable peg, remote quote APIs (Binance, CoinGecko),
//! and the on-chain Pyth aggregator.

use crate::error::{FeederError, Result};
use crate::models::{AssetConfig, Quote};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider health/availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderStatus {
    /// Provider is operational and responding normally
    Healthy,
    /// Provider answered 429, next ticks will likely fail too
    RateLimited,
    /// Last request failed
    Error,
}

impl Default for ProviderStatus {
    fn default() -> Self {
        Self::Healthy
    }
}

/// Common trait for price sources
///
/// A source never retries internally: one `fetch` is one upstream attempt, and
/// the scheduler's next tick is the retry.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Display name used in logs and errors (e.g. "Binance", "Pyth")
    fn source_name(&self) -> &str;

    /// Current provider status
    fn status(&self) -> ProviderStatus {
        ProviderStatus::Healthy
    }

    /// Whether this source knows how to price `asset` at all.
    ///
    /// Checked once at startup so a permanently unmapped symbol fails fast.
    fn supports(&self, asset: &AssetConfig) -> bool;

    /// Sample the current price of `asset`
    async fn fetch(&self, asset: &AssetConfig) -> Result<Quote>;
}

/// Remote HTTP quote providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteProvider {
    Binance,
    CoinGecko,
}

impl FromStr for QuoteProvider {
    type Err = FeederError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "coingecko" => Ok(Self::CoinGecko),
            other => Err(FeederError::Config(format!("unknown quote provider: {}", other))),
        }
    }
}

/// Price source selected once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Stable,
    Remote(QuoteProvider),
    Aggregator,
}

impl SourceKind {
    /// Parse a `stable | remote | aggregator` selector.
    ///
    /// `remote` resolves to `default_provider`; provider names (`binance`,
    /// `coingecko`) and `pyth` are accepted as direct aliases.
    pub fn parse(selector: &str, default_provider: QuoteProvider) -> Result<Self> {
        match selector.trim().to_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "remote" => Ok(Self::Remote(default_provider)),
            "aggregator" | "pyth" => Ok(Self::Aggregator),
            other => other
                .parse::<QuoteProvider>()
                .map(Self::Remote)
                .map_err(|_| FeederError::Config(format!("unknown price source: {}", other))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Remote(QuoteProvider::Binance) => write!(f, "remote(binance)"),
            Self::Remote(QuoteProvider::CoinGecko) => write!(f, "remote(coingecko)"),
            Self::Aggregator => write!(f, "aggregator(pyth)"),
        }
    }
}
