//! Oracle update command construction
//!
//! Turns a sampled price into the exact argument vector for the chain client:
//!
//! ```text
//! sui client --client.config <cfg> call --package <pkg> --module native_feeder \
//!     --function feed --args <feeder> <sink> <exp> <scaled> [--gas <coin>] --gas-budget <n>
//! ```
//!
//! Arguments are passed to the process directly (never through a shell), and
//! building is pure: identical inputs give an identical [`CommandDescription`].

use crate::error::{FeederError, Result};
use crate::models::AssetConfig;
use crate::utils::fixed_point::ScaledPrice;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_CLIENT_BIN: &str = "sui";
pub const DEFAULT_MODULE: &str = "native_feeder";
pub const DEFAULT_FUNCTION: &str = "feed";
/// Shared clock object passed to `feed`
pub const DEFAULT_SINK_ADDRESS: &str = "0x6";

/// Client and gas settings passed through unchanged into every command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientParams {
    pub program: String,
    pub client_config: PathBuf,
    pub module: String,
    pub function: String,
    pub sink_address: String,
    pub gas: Option<String>,
    pub gas_budget: u64,
}

impl ClientParams {
    pub fn new(client_config: impl Into<PathBuf>, gas_budget: u64) -> Self {
        Self {
            program: DEFAULT_CLIENT_BIN.to_string(),
            client_config: client_config.into(),
            module: DEFAULT_MODULE.to_string(),
            function: DEFAULT_FUNCTION.to_string(),
            sink_address: DEFAULT_SINK_ADDRESS.to_string(),
            gas: None,
            gas_budget,
        }
    }
}

/// A fully-resolved external invocation: program plus ordered arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescription {
    pub program: String,
    pub client_config: PathBuf,
    pub package: String,
    pub module: String,
    pub function: String,
    /// `[feeder, sink, exponent, scaled_price]`
    pub call_args: Vec<String>,
    pub gas: Option<String>,
    pub gas_budget: u64,
    pub scaled_price: ScaledPrice,
}

impl CommandDescription {
    /// Argument vector after the program name
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![
            "client".to_string(),
            "--client.config".to_string(),
            self.client_config.display().to_string(),
            "call".to_string(),
            "--package".to_string(),
            self.package.clone(),
            "--module".to_string(),
            self.module.clone(),
            "--function".to_string(),
            self.function.clone(),
            "--args".to_string(),
        ];
        argv.extend(self.call_args.iter().cloned());
        if let Some(gas) = &self.gas {
            argv.push("--gas".to_string());
            argv.push(gas.clone());
        }
        argv.push("--gas-budget".to_string());
        argv.push(self.gas_budget.to_string());
        argv
    }
}

impl fmt::Display for CommandDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.argv().join(" "))
    }
}

#[derive(Debug, Clone)]
pub struct CommandBuilder {
    params: ClientParams,
    /// Optional sanity ceiling on the decimal price
    max_price: Option<f64>,
}

impl CommandBuilder {
    pub fn new(params: ClientParams) -> Self {
        Self {
            params,
            max_price: None,
        }
    }

    pub fn with_max_price(mut self, max_price: Option<f64>) -> Self {
        self.max_price = max_price;
        self
    }

    pub fn params(&self) -> &ClientParams {
        &self.params
    }

    /// Build the update command for `asset` at `price`.
    ///
    /// Fails with [`FeederError::InvalidPrice`] for non-positive, non-finite,
    /// over-ceiling, or unscalable prices.
    pub fn build(&self, asset: &AssetConfig, price: f64) -> Result<CommandDescription> {
        if let Some(max_price) = self.max_price {
            if price > max_price {
                return Err(FeederError::invalid_price(
                    price,
                    format!("above configured maximum {}", max_price),
                ));
            }
        }

        let scaled = ScaledPrice::from_price(price, asset.decimal_exponent)?;

        Ok(CommandDescription {
            program: self.params.program.clone(),
            client_config: self.params.client_config.clone(),
            package: asset.package.clone(),
            module: self.params.module.clone(),
            function: self.params.function.clone(),
            call_args: vec![
                asset.feeder_id.clone(),
                self.params.sink_address.clone(),
                asset.decimal_exponent.to_string(),
                scaled.to_string(),
            ],
            gas: self.params.gas.clone(),
            gas_budget: self.params.gas_budget,
            scaled_price: scaled,
        })
    }
}
