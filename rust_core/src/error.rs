//! Error taxonomy for the feeder.
//!
//! Only [`FeederError::Config`] is fatal. Everything else is contained at the
//! boundary where it happens (a single fetch, a single submission) and turned
//! into a skipped tick or a skipped task.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeederError>;

#[derive(Debug, Error)]
pub enum FeederError {
    /// Missing or malformed run configuration / deployment registry entry
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream unreachable, malformed response, or asset not trading
    #[error("Source error ({provider}): {message}")]
    Source { provider: String, message: String },

    /// The provider has no trading pair / account for this asset
    #[error("Unknown symbol for {provider}: {symbol}")]
    UnknownSymbol { provider: String, symbol: String },

    /// Sampled price cannot be scaled into an on-chain value
    #[error("Invalid price {price}: {reason}")]
    InvalidPrice { price: f64, reason: String },

    /// External submission process failed or exited non-zero
    #[error("Submission failed (exit code {exit_code:?}): {message}")]
    Submission {
        exit_code: Option<i32>,
        message: String,
        output: String,
    },

    #[error("Submission queue full ({capacity} pending), task dropped")]
    QueueFull { capacity: usize },

    #[error("Submission pipeline is closed")]
    PipelineClosed,

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
}

impl FeederError {
    pub fn source_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid_price(price: f64, reason: impl Into<String>) -> Self {
        Self::InvalidPrice {
            price,
            reason: reason.into(),
        }
    }

    /// Fatal errors terminate the process; all others skip one tick or one task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// True for the failures that make a tick skip its submission at fetch time.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::Source { .. } | Self::UnknownSymbol { .. } | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_is_fatal() {
        assert!(FeederError::Config("missing feeder".into()).is_fatal());
        assert!(!FeederError::source_error("Binance", "503").is_fatal());
        assert!(!FeederError::invalid_price(0.0, "non-positive").is_fatal());
        assert!(!FeederError::QueueFull { capacity: 4 }.is_fatal());
        assert!(!FeederError::Submission {
            exit_code: Some(1),
            message: "boom".into(),
            output: String::new(),
        }
        .is_fatal());
    }

    #[test]
    fn test_source_classification() {
        assert!(FeederError::UnknownSymbol {
            provider: "CoinGecko".into(),
            symbol: "xyz".into(),
        }
        .is_source_error());
        assert!(!FeederError::invalid_price(-1.0, "non-positive").is_source_error());
    }

    #[test]
    fn test_display_includes_context() {
        let err = FeederError::source_error("Pyth", "price is not trading");
        assert_eq!(err.to_string(), "Source error (Pyth): price is not trading");
    }
}
