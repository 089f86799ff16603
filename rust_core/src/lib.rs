//! Feeder Core - price sampling and oracle update construction.
//!
//! This module provides:
//! - Interchangeable price sources (stable peg, Binance, CoinGecko, Pyth aggregator)
//! - Fixed-point scaling of decimal prices for on-chain storage
//! - Deployment registry loading (oracle package + feeder addresses)
//! - Deterministic construction of the chain client's update command
//! - The error taxonomy shared by the feeder service

pub mod clients;
pub mod command;
pub mod error;
pub mod models;
pub mod registry;
pub mod utils;

pub use clients::{build_price_source, PriceSource, SourceKind, SourceSettings};
pub use command::{ClientParams, CommandBuilder, CommandDescription};
pub use error::{FeederError, Result};
pub use models::{AssetConfig, Quote};
pub use registry::DeploymentRegistry;
pub use utils::fixed_point::ScaledPrice;
