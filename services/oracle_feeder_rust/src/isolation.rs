//! Fetch guard
//!
//! Every call into a [`PriceSource`] goes through [`guarded_fetch`]: the call
//! is bounded by a timeout and a panic inside the source is caught, so each
//! outcome comes back as a plain `Result` the scheduler can skip on.
//! Submissions get the same treatment inside the pipeline workers.

use feeder_rust_core::clients::PriceSource;
use feeder_rust_core::error::{FeederError, Result};
use feeder_rust_core::models::{AssetConfig, Quote};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

pub async fn guarded_fetch(
    source: &dyn PriceSource,
    asset: &AssetConfig,
    timeout: Duration,
) -> Result<Quote> {
    let fetch = AssertUnwindSafe(source.fetch(asset)).catch_unwind();

    match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(FeederError::source_error(
            source.source_name(),
            format!("fetch panicked: {}", panic_message(panic.as_ref())),
        )),
        Err(_) => Err(FeederError::Timeout {
            operation: format!("{} fetch", source.source_name()),
            after: timeout,
        }),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
