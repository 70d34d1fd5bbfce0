//! evm-bench - Ethereum JSON-RPC Load Generator
//!
//! Drives sustained, rate-controlled traffic against a JSON-RPC endpoint
//! and reports throughput, latency distribution, and success/failure
//! counts.
//!
//! # Usage
//!
//! ```bash
//! # Submit signed transfers at 1000/s for ten minutes
//! evm-bench --testcase 1 --rpc-url ws://localhost:8546 --duration 10m
//!
//! # Same, waiting for confirmation of every transaction
//! evm-bench --testcase 1 --receipt
//!
//! # Read-only ERC-20 balance queries against a fresh token
//! evm-bench --testcase 2 --exec-rate 500
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result, bail};
use bench_core::{BenchmarkEngine, Options, TestWallet, TxMonitor, Workload};
use clap::Parser;
use eth_workloads::{QueryErc20Workload, TransferEthWorkload};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod report;
mod summary;

use report::InfluxReporter;
use summary::print_summary;

/// Development mnemonic used when no seed file is supplied.
const DEFAULT_MNEMONIC: &str = "test test test test test test test test test test test junk";

// ═══════════════════════════════════════════════════════════════════════════════
// CLI ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// evm-bench - Ethereum JSON-RPC Load Generator
#[derive(Parser, Debug)]
#[command(name = "evm-bench")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Benchmark testcase: 1 = transaction processing, 2 = query processing
    #[arg(long, default_value_t = 1)]
    testcase: u32,

    /// RPC URL of the node under test
    #[arg(long, default_value = "ws://localhost:8546")]
    rpc_url: String,

    /// Wallet seed phrase file; a development mnemonic is used when absent
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Number of workers (one derived account each)
    #[arg(long, default_value_t = 1000)]
    workers: usize,

    /// Number of pooled RPC connections shared by workers
    #[arg(long, default_value_t = 1)]
    connections: usize,

    /// Benchmark duration (e.g. 30s, 10m)
    #[arg(long, default_value = "10m", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Target workload execution rate per second
    #[arg(long, default_value_t = 1000)]
    exec_rate: u32,

    /// Per-work-item deadline
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// ERC20 token address; a benchmark token is deployed when absent
    #[arg(long)]
    erc20: Option<Address>,

    /// Wait for transaction confirmation (testcase 1)
    #[arg(long)]
    receipt: bool,

    /// Enable the InfluxDB histogram reporter
    #[arg(long)]
    influxdb: bool,

    /// InfluxDB server URL
    #[arg(long = "influxdb.url", env = "INFLUXDB_URL", default_value = "http://localhost:8086")]
    influxdb_url: String,

    /// InfluxDB auth token
    #[arg(long = "influxdb.token", env = "INFLUXDB_TOKEN", default_value = "")]
    influxdb_token: String,

    /// InfluxDB bucket
    #[arg(long = "influxdb.bucket", env = "INFLUXDB_BUCKET", default_value = "benchmark")]
    influxdb_bucket: String,

    /// InfluxDB organization
    #[arg(long = "influxdb.org", env = "INFLUXDB_ORG", default_value = "")]
    influxdb_org: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "EVM_BENCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "EVM_BENCH_JSON_LOGS")]
    json_logs: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        testcase = args.testcase,
        rpc_url = %args.rpc_url,
        "Starting evm-bench"
    );

    let mnemonic = match &args.seed {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?,
        None => DEFAULT_MNEMONIC.to_string(),
    };

    info!(accounts = args.workers, "Deriving test accounts");
    let wallet = Arc::new(
        TestWallet::from_mnemonic(&mnemonic, args.workers)
            .context("Failed to derive test accounts")?,
    );

    // Root cancellation token: SIGINT/SIGTERM stop the producer, the run
    // drains, and the summary still prints.
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let mut workload: Box<dyn Workload> = match args.testcase {
        1 => {
            let monitor = if args.receipt {
                info!("Starting transaction confirmation monitor");
                Some(
                    TxMonitor::start(&args.rpc_url, shutdown.child_token())
                        .await
                        .context("Failed to start confirmation monitor")?,
                )
            } else {
                None
            };
            Box::new(TransferEthWorkload::new(wallet, monitor))
        }
        2 => Box::new(QueryErc20Workload::new(wallet, args.erc20)),
        other => bail!("Unknown testcase {other} (expected 1 or 2)"),
    };

    let opts = Options {
        rpc_url: args.rpc_url,
        num_workers: args.workers,
        num_clients: args.connections,
        execute_rate: args.exec_rate,
        duration: args.duration,
        timeout: args.timeout,
    };
    let mut engine = BenchmarkEngine::new(opts).context("Invalid benchmark options")?;

    if args.influxdb {
        let tags = vec![("testcase".to_string(), workload.name().to_string())];
        let reporter = InfluxReporter::new(
            &args.influxdb_url,
            &args.influxdb_org,
            &args.influxdb_token,
            args.influxdb_bucket,
            tags,
        );
        engine.set_reporter(Arc::new(reporter));
    }

    info!("Starting benchmark");
    let result = engine
        .run(&shutdown, workload.as_mut())
        .await
        .context("Benchmark failed")?;

    print_summary(&result);
    info!("evm-bench finished");
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// INITIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {e}"))?;
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Received Ctrl+C, stopping the producer...");
        }
        () = terminate => {
            warn!("Received SIGTERM, stopping the producer...");
        }
    }
}
