//! Stable peg price source
//!
//! Stablecoins are assumed to trade at their peg. The reported price is the
//! reference plus a small positive jitter so consecutive updates are distinct.
//! No network call, never fails for a supported symbol.

use super::price_source::PriceSource;
use crate::error::{FeederError, Result};
use crate::models::{AssetConfig, Quote};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_PEG: f64 = 1.0;
/// Jitter is drawn from `[0, DEFAULT_JITTER)`
pub const DEFAULT_JITTER: f64 = 0.0001;

#[derive(Debug, Clone)]
pub struct StablePegSource {
    /// symbol -> reference value
    pegs: HashMap<String, f64>,
    jitter: f64,
}

impl StablePegSource {
    /// USD stablecoins pegged at 1.0
    pub fn new() -> Self {
        let pegs = ["usdt", "usdc"]
            .into_iter()
            .map(|symbol| (symbol.to_string(), DEFAULT_PEG))
            .collect();

        Self {
            pegs,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Add or override the reference value for `symbol`
    pub fn with_peg(mut self, symbol: &str, reference: f64) -> Self {
        self.pegs.insert(symbol.to_lowercase(), reference);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.max(0.0);
        self
    }

    fn sample(&self, reference: f64) -> f64 {
        if self.jitter == 0.0 {
            return reference;
        }
        reference + rand::thread_rng().gen::<f64>() * self.jitter
    }
}

impl Default for StablePegSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for StablePegSource {
    fn source_name(&self) -> &str {
        "StablePeg"
    }

    fn supports(&self, asset: &AssetConfig) -> bool {
        self.pegs.contains_key(&asset.symbol)
    }

    async fn fetch(&self, asset: &AssetConfig) -> Result<Quote> {
        let reference = self.pegs.get(&asset.symbol).copied().ok_or_else(|| {
            FeederError::UnknownSymbol {
                provider: self.source_name().to_string(),
                symbol: asset.symbol.clone(),
            }
        })?;

        let price = self.sample(reference);
        debug!("Stable peg {} = {}", asset.symbol, price);
        Ok(Quote::now(price, self.source_name()))
    }
}
