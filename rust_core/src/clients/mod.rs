pub mod binance;
pub mod coingecko;
pub mod price_source;
pub mod pyth;
pub mod stable;

// Re-export commonly used types
pub use binance::BinanceClient;
pub use coingecko::CoinGeckoClient;
pub use price_source::{PriceSource, ProviderStatus, QuoteProvider, SourceKind};
pub use pyth::PythAggregatorSource;
pub use stable::StablePegSource;

use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Parameters needed to construct any source variant
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Per-request timeout for HTTP/RPC sources
    pub request_timeout: Duration,
    /// Extra stable peg for the configured symbol: (symbol, reference)
    pub stable_peg: Option<(String, f64)>,
    pub stable_jitter: f64,
    pub pyth_endpoint: String,
}

impl SourceSettings {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            request_timeout: Duration::from_secs(10),
            stable_peg: None,
            stable_jitter: stable::DEFAULT_JITTER,
            pyth_endpoint: pyth::PYTHNET_HTTP_ENDPOINT.to_string(),
        }
    }
}

/// Construct the single source used for the whole run
pub fn build_price_source(settings: &SourceSettings) -> Result<Arc<dyn PriceSource>> {
    let source: Arc<dyn PriceSource> = match settings.kind {
        SourceKind::Stable => {
            let mut source = StablePegSource::new().with_jitter(settings.stable_jitter);
            if let Some((symbol, reference)) = &settings.stable_peg {
                source = source.with_peg(symbol, *reference);
            }
            Arc::new(source)
        }
        SourceKind::Remote(QuoteProvider::Binance) => {
            Arc::new(BinanceClient::new(settings.request_timeout)?)
        }
        SourceKind::Remote(QuoteProvider::CoinGecko) => {
            Arc::new(CoinGeckoClient::new(settings.request_timeout)?)
        }
        SourceKind::Aggregator => Arc::new(PythAggregatorSource::new(
            settings.pyth_endpoint.clone(),
            settings.request_timeout,
        )),
    };
    Ok(source)
}
