//! Pyth on-chain aggregator client
//!
//! Reads the aggregate price straight from a Pyth price account on Pythnet.
//! Each fetch opens its own RPC session, issues one `getAccountInfo` request,
//! decodes the account and drops the session before returning, on success
//! and on every error path.

use super::price_source::PriceSource;
use crate::error::{FeederError, Result};
use crate::models::{AssetConfig, Quote};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const PYTHNET_HTTP_ENDPOINT: &str = "https://pythnet.rpcpool.com";

/// Price account keys on Pythnet
const PRICE_ACCOUNTS: &[(&str, &str)] = &[
    ("xau", "8y3WWjvmSmVGWVKH1rCA7VTRmuU7QbJ9axafSsBX5FcD"),
    ("xag", "HMVfAm6uuwnPnHRzaqfMhLNyrYHxaczKTbzeDcjBvuDo"),
];

// ============================================================================
// Price account layout
// ============================================================================

pub const PYTH_MAGIC: u32 = 0xa1b2_c3d4;
const ACCOUNT_TYPE_PRICE: u32 = 3;

const OFFSET_MAGIC: usize = 0;
const OFFSET_ACCOUNT_TYPE: usize = 8;
const OFFSET_EXPONENT: usize = 20;
const OFFSET_AGG_PRICE: usize = 208;
const OFFSET_AGG_CONF: usize = 216;
const OFFSET_AGG_STATUS: usize = 224;
const OFFSET_AGG_PUB_SLOT: usize = 232;
const MIN_ACCOUNT_LEN: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStatus {
    Unknown,
    Trading,
    Halted,
    Auction,
    Ignored,
}

impl From<u32> for PriceStatus {
    fn from(raw: u32) -> Self {
        match raw {
            1 => Self::Trading,
            2 => Self::Halted,
            3 => Self::Auction,
            4 => Self::Ignored,
            _ => Self::Unknown,
        }
    }
}

/// The fields of a Pyth price account the feeder needs
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAccount {
    pub exponent: i32,
    pub aggregate_price: i64,
    pub aggregate_conf: u64,
    pub status: PriceStatus,
    pub publish_slot: u64,
}

impl PriceAccount {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_ACCOUNT_LEN {
            return Err(pyth_error(format!(
                "price account too short: {} bytes",
                data.len()
            )));
        }
        let magic = read_u32(data, OFFSET_MAGIC)?;
        if magic != PYTH_MAGIC {
            return Err(pyth_error(format!("bad account magic {:#x}", magic)));
        }
        let account_type = read_u32(data, OFFSET_ACCOUNT_TYPE)?;
        if account_type != ACCOUNT_TYPE_PRICE {
            return Err(pyth_error(format!(
                "account type {} is not a price account",
                account_type
            )));
        }

        Ok(Self {
            exponent: read_u32(data, OFFSET_EXPONENT)? as i32,
            aggregate_price: read_u64(data, OFFSET_AGG_PRICE)? as i64,
            aggregate_conf: read_u64(data, OFFSET_AGG_CONF)?,
            status: PriceStatus::from(read_u32(data, OFFSET_AGG_STATUS)?),
            publish_slot: read_u64(data, OFFSET_AGG_PUB_SLOT)?,
        })
    }

    /// Decimal aggregate price, `None` unless the product is trading
    pub fn aggregate(&self) -> Option<f64> {
        if self.status != PriceStatus::Trading {
            return None;
        }
        Some(self.aggregate_price as f64 * 10f64.powi(self.exponent))
    }
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| pyth_error(format!("truncated account at offset {}", offset)))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    data.get(offset..offset + 8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| pyth_error(format!("truncated account at offset {}", offset)))
}

fn pyth_error(message: impl Into<String>) -> FeederError {
    FeederError::source_error("Pyth", message)
}

// ============================================================================
// JSON-RPC session
// ============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<AccountInfoResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    value: Option<AccountValue>,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    /// `[payload, encoding]`
    data: (String, String),
}

/// One connection's worth of RPC state; closed when dropped
struct RpcSession {
    client: Client,
    endpoint: String,
    open_sessions: Arc<AtomicUsize>,
}

impl RpcSession {
    fn open(endpoint: &str, timeout: Duration, open_sessions: Arc<AtomicUsize>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| pyth_error(format!("failed to open RPC session: {}", e)))?;

        open_sessions.fetch_add(1, Ordering::SeqCst);
        debug!("Opened Pythnet session to {}", endpoint);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            open_sessions,
        })
    }

    async fn account_data(&self, account_key: &str) -> Result<Vec<u8>> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAccountInfo",
            "params": [account_key, { "encoding": "base64" }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| pyth_error(format!("RPC request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(pyth_error(format!("RPC HTTP error: {}", response.status())));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| pyth_error(format!("malformed RPC response: {}", e)))?;

        if let Some(err) = body.error {
            return Err(pyth_error(format!("RPC error {}: {}", err.code, err.message)));
        }

        let (payload, encoding) = body
            .result
            .and_then(|result| result.value)
            .map(|value| value.data)
            .ok_or_else(|| pyth_error(format!("account {} not found", account_key)))?;

        if encoding != "base64" {
            return Err(pyth_error(format!("unexpected account encoding {}", encoding)));
        }

        STANDARD
            .decode(payload)
            .map_err(|e| pyth_error(format!("invalid base64 account data: {}", e)))
    }
}

impl Drop for RpcSession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        debug!("Closed Pythnet session to {}", self.endpoint);
    }
}

// ============================================================================
// Price source
// ============================================================================

pub struct PythAggregatorSource {
    endpoint: String,
    timeout: Duration,
    accounts: HashMap<String, String>,
    open_sessions: Arc<AtomicUsize>,
}

impl PythAggregatorSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            accounts: PRICE_ACCOUNTS
                .iter()
                .map(|(symbol, key)| (symbol.to_string(), key.to_string()))
                .collect(),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sessions currently open (0 whenever no fetch is in progress)
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    fn account_key(&self, asset: &AssetConfig) -> Option<String> {
        asset
            .quote_symbol
            .clone()
            .or_else(|| self.accounts.get(&asset.symbol).cloned())
    }
}

#[async_trait]
impl PriceSource for PythAggregatorSource {
    fn source_name(&self) -> &str {
        "Pyth"
    }

    fn supports(&self, asset: &AssetConfig) -> bool {
        self.account_key(asset).is_some()
    }

    async fn fetch(&self, asset: &AssetConfig) -> Result<Quote> {
        let account_key = self.account_key(asset).ok_or_else(|| FeederError::UnknownSymbol {
            provider: self.source_name().to_string(),
            symbol: asset.symbol.clone(),
        })?;

        let data = {
            let session = RpcSession::open(&self.endpoint, self.timeout, self.open_sessions.clone())?;
            session.account_data(&account_key).await?
        };

        let account = PriceAccount::parse(&data)?;
        let price = account
            .aggregate()
            .ok_or_else(|| pyth_error(format!("{} price is not trading ({:?})", asset.symbol, account.status)))?;

        debug!(
            "Pyth {} = {} (conf {}, slot {})",
            asset.symbol, price, account.aggregate_conf, account.publish_slot
        );

        Ok(Quote::now(price, self.source_name()))
    }
}
