//! End-to-end feeder tests: registry file -> config -> source -> pipeline -> runner

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use feeder_rust_core::clients::StablePegSource;
use feeder_rust_core::command::CommandDescription;
use feeder_rust_core::error::Result as FeederResult;
use feeder_rust_core::models::AssetConfig;
use oracle_feeder_rust::{build_feeder, CommandOutput, CommandRunner, Feeder, FeederConfig, TickOutcome};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use serde_json::json;
use std::time::Duration;
use tempfile::NamedTempFile;

const REGISTRY: &str = r#"{
    "abex_feeder": {
        "package": "0x07700da7e886a5e40042e155c847fbe400f1aa3e",
        "feeder": {
            "usdt": "0x33134da8a9ef5010ec4222d2c4499bf604d7cbd4",
            "btc": "0x64aca68029bb832219611fcb9f85df64e4c9b6c3"
        }
    }
}"#;

fn registry_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(REGISTRY.as_bytes()).unwrap();
    file
}

fn config(registry: &NamedTempFile, extra: &[(&str, &str)]) -> FeederConfig {
    let mut vars: HashMap<String, String> = [
        ("FEEDER_TOKEN", "usdt"),
        ("FEEDER_SOURCE", "stable"),
        ("FEEDER_EXP", "9"),
        ("FEEDER_INTERVAL_SECS", "10"),
        ("FEEDER_CLIENT_CONFIG", "/tmp/testnet-usdt-feeder.yaml"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert(
        "FEEDER_DEPLOYMENTS".to_string(),
        registry.path().display().to_string(),
    );
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    FeederConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn test_dry_run_feeder_from_registry() {
    let registry = registry_file();
    let config = config(&registry, &[("FEEDER_DRY_RUN", "true")]);
    let feeder = build_feeder(&config).unwrap();

    assert_eq!(feeder.asset().feeder_id, "0x33134da8a9ef5010ec4222d2c4499bf604d7cbd4");
    match feeder.tick().await {
        TickOutcome::Submitted { scaled_price, .. } => {
            assert!((1_000_000_000..1_000_100_000).contains(&scaled_price));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let snapshot = feeder.run_until(async {}).await;
    assert_eq!(snapshot.submissions_succeeded, 1);
    assert_eq!(snapshot.submissions_failed, 0);
}

#[tokio::test]
async fn test_real_process_runner_with_echo_client() {
    let registry = registry_file();
    let config = config(&registry, &[("FEEDER_CLIENT_BIN", "echo")]);
    let feeder = build_feeder(&config).unwrap();

    assert!(matches!(feeder.tick().await, TickOutcome::Submitted { .. }));
    let snapshot = feeder.run_until(async {}).await;
    assert_eq!(snapshot.submissions_succeeded, 1);
}

#[tokio::test]
async fn test_failing_client_is_contained() {
    let registry = registry_file();
    let config = config(&registry, &[("FEEDER_CLIENT_BIN", "false")]);
    let feeder = build_feeder(&config).unwrap();

    for _ in 0..3 {
        assert!(matches!(feeder.tick().await, TickOutcome::Submitted { .. }));
    }
    let snapshot = feeder.run_until(async {}).await;
    assert_eq!(snapshot.submissions_failed, 3);
    assert_eq!(snapshot.ticks, 3);
}

#[tokio::test]
async fn test_unregistered_asset_fails_startup() {
    let registry = registry_file();
    let config = config(&registry, &[("FEEDER_TOKEN", "eth"), ("FEEDER_SOURCE", "binance")]);
    let err = build_feeder(&config).err().expect("eth has no feeder");
    assert!(format!("{:#}", err).contains("no feeder registered"));
}

#[tokio::test]
async fn test_unpriceable_asset_fails_startup() {
    let registry = registry_file();
    // btc is registered but the stable source has no peg for it
    let config = config(&registry, &[("FEEDER_TOKEN", "btc")]);
    let err = build_feeder(&config).err().expect("stable source cannot price btc");
    assert!(err.to_string().contains("cannot price"));
}

#[tokio::test]
async fn test_missing_registry_fails_startup() {
    let registry = registry_file();
    let mut config = config(&registry, &[]);
    config.deployments_path = "/nonexistent/deployments-testnet.json".into();
    assert!(build_feeder(&config).is_err());
}

const BTC_PRICE_ACCOUNT: &str = "GVXRSBjFk6e6J3NbVPXohDJetcTjaeeuykUpbQF8UoMU";

/// Minimal trading Pyth price account: 6_400_050_000_000 * 10^-8
fn pyth_account_body() -> String {
    let mut data = vec![0u8; 240];
    data[0..4].copy_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
    data[8..12].copy_from_slice(&3u32.to_le_bytes());
    data[20..24].copy_from_slice(&(-8i32).to_le_bytes());
    data[208..216].copy_from_slice(&6_400_050_000_000i64.to_le_bytes());
    data[224..228].copy_from_slice(&1u32.to_le_bytes());
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": { "value": { "data": [STANDARD.encode(&data), "base64"] } }
    })
    .to_string()
}

#[tokio::test]
async fn test_quote_symbol_enables_unlisted_pyth_asset() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_body(mockito::Matcher::Regex(BTC_PRICE_ACCOUNT.to_string()))
        .with_status(200)
        .with_body(pyth_account_body())
        .create_async()
        .await;

    let registry = registry_file();
    let rpc = server.url();
    let config = config(
        &registry,
        &[
            ("FEEDER_TOKEN", "btc"),
            ("FEEDER_SOURCE", "pyth"),
            ("FEEDER_PYTH_RPC", rpc.as_str()),
            ("FEEDER_QUOTE_SYMBOL", BTC_PRICE_ACCOUNT),
            ("FEEDER_DRY_RUN", "true"),
        ],
    );
    let feeder = build_feeder(&config).unwrap();
    assert_eq!(feeder.asset().quote_symbol.as_deref(), Some(BTC_PRICE_ACCOUNT));

    match feeder.tick().await {
        TickOutcome::Submitted { scaled_price, .. } => {
            assert_eq!(scaled_price, 64_000_500_000_000);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    mock.assert_async().await;

    let snapshot = feeder.run_until(async {}).await;
    assert_eq!(snapshot.submissions_succeeded, 1);
}

#[tokio::test]
async fn test_unlisted_pyth_asset_needs_quote_symbol() {
    let registry = registry_file();
    let config = config(&registry, &[("FEEDER_TOKEN", "btc"), ("FEEDER_SOURCE", "pyth")]);
    let err = build_feeder(&config).err().expect("btc has no built-in Pyth account");
    assert!(err.to_string().contains("Pyth cannot price asset 'btc'"));
}

/// Takes five seconds per submission and counts overlapping runs
#[derive(Default)]
struct SlowRunner {
    running: AtomicUsize,
    peak: AtomicUsize,
    runs: AtomicUsize,
}

#[async_trait]
impl CommandRunner for SlowRunner {
    async fn run(&self, _command: &CommandDescription) -> FeederResult<CommandOutput> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(CommandOutput::default())
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_submissions_never_delay_ticks() {
    let registry = registry_file();
    let config = config(
        &registry,
        &[
            ("FEEDER_INTERVAL_SECS", "1"),
            ("FEEDER_MAX_CONCURRENT", "2"),
            ("FEEDER_QUEUE_CAPACITY", "64"),
        ],
    );
    let runner = Arc::new(SlowRunner::default());
    let asset = AssetConfig::new(
        "usdt",
        9,
        "0x07700da7e886a5e40042e155c847fbe400f1aa3e",
        "0x33134da8a9ef5010ec4222d2c4499bf604d7cbd4",
    );
    let feeder = Feeder::from_config(&config, asset, Arc::new(StablePegSource::new()), runner.clone());

    // Ticks at 0..=20s while each submission takes 5s on 2 workers
    let snapshot = feeder
        .run_until(tokio::time::sleep(Duration::from_millis(20_500)))
        .await;

    assert_eq!(snapshot.ticks, 21);
    assert_eq!(snapshot.submissions_enqueued, 21);
    assert_eq!(snapshot.peak_in_flight, 2);
    assert_eq!(runner.peak.load(Ordering::SeqCst), 2);
    // Shutdown drains everything that was queued
    assert_eq!(runner.runs.load(Ordering::SeqCst), 21);
    assert_eq!(snapshot.submissions_succeeded, 21);
}
