//! CLI bootstrap: loads configuration, seeds the market catalog, starts the
//! pipeline (ring buffers + processor + output consumers) and installs a
//! Ctrl-C handler that drives cooperative shutdown.
//!
//! The HTTP/JSON ingress that would normally front this process is outside
//! this crate's scope (§1); this binary exists so the engine is a runnable
//! process on its own, with real logging, real configuration and a real
//! shutdown sequence.

use std::time::Duration;

use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use ringmatch::config::Config;
use ringmatch::models::Market;
use ringmatch::persistence::{InMemoryStore, PersistenceStore, PgStore};
use ringmatch::pipeline::Pipeline;

/// At least two symbols initialized OPEN with tick 0.01 and min_order_size 1
/// (§6 "Seeded markets").
fn seed_markets() -> Vec<Market> {
    let now = Utc::now();
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
    let just_before_midnight = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
    let tick = Decimal::new(1, 2); // 0.01
    let min_size = Decimal::ONE;

    vec![
        Market::new_seed("BTC-USDT", "Bitcoin/Tether", tick, min_size, midnight, just_before_midnight, now),
        Market::new_seed("ETH-USDT", "Ethereum/Tether", tick, min_size, midnight, just_before_midnight, now),
    ]
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _log_guard = ringmatch::logging::init_logging(&config);

    tracing::info!(
        input_ring_size = config.input_ring_size,
        output_ring_size = config.output_ring_size,
        wait_strategy = config.wait_strategy.as_str(),
        "starting ringmatch"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let markets = seed_markets();

    let pipeline = match runtime.block_on(PgStore::connect(
        &config.db_url,
        config.db_max_connections,
        Duration::from_millis(config.db_acquire_timeout_ms),
    )) {
        Ok(store) => {
            tracing::info!("connected to durable storage");
            start_pipeline_with_store(&config, markets, store)
        }
        Err(err) => {
            tracing::warn!(error = %err, "durable storage unavailable at startup, falling back to in-memory persistence sink");
            start_pipeline_with_store(&config, markets, InMemoryStore::new())
        }
    };

    install_shutdown_handler(&runtime);
    wait_for_shutdown_signal(&runtime);

    tracing::info!("shutdown signal received, draining pipeline");
    pipeline.shutdown();
    tracing::info!("ringmatch stopped");
    Ok(())
}

fn start_pipeline_with_store<S: PersistenceStore>(config: &Config, markets: Vec<Market>, store: S) -> Pipeline {
    Pipeline::start(config, markets, store)
}

static SHUTDOWN: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

fn install_shutdown_handler(runtime: &tokio::runtime::Runtime) {
    runtime.spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            SHUTDOWN.store(true, std::sync::atomic::Ordering::Release);
        }
    });
}

fn wait_for_shutdown_signal(_runtime: &tokio::runtime::Runtime) {
    while !SHUTDOWN.load(std::sync::atomic::Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(50));
    }
}
