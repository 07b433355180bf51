//! unionlink — mirrors UnionWallet `Link` / `UnLink` events into a database
//! and serves the resulting pairs over HTTP.
//!
//! Usage:
//! ```bash
//! RPC_URL_1=https://bsc-dataseed.binance.org \
//! RPC_URL_2=https://bsc-dataseed1.defibit.io \
//! UNIONWALLET_CONTRACT=0x... \
//! DATABASE_URL=sqlite:unionlink.db?mode=rwc \
//! unionlink
//! ```

mod logging;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};

use unionlink_api::{create_api_router, ApiState};
use unionlink_core::config::{ScannerConfig, DEFAULT_START_BLOCK};
use unionlink_core::metrics::ScannerMetrics;
use unionlink_core::shutdown::Shutdown;
use unionlink_evm::{ScannerBuilder, Supervisor};
use unionlink_rpc::EndpointPool;

use crate::logging::{init_tracing, LogConfig};

/// Mirrors UnionWallet link events and serves them over HTTP.
///
/// RPC endpoints are read from `RPC_URL_1`, `RPC_URL_2`, … (stopping at the
/// first gap) and tried in that order.
#[derive(Parser, Debug)]
#[command(name = "unionlink")]
#[command(version)]
struct Cli {
    /// UnionWallet contract address.
    #[arg(long, env = "UNIONWALLET_CONTRACT")]
    contract: String,

    /// First block to scan when no checkpoint is further ahead.
    #[arg(long, env = "START_BLOCK", default_value_t = DEFAULT_START_BLOCK)]
    start_block: u64,

    /// `memory`, `sqlite:…` or `postgres://…`.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:unionlink.db?mode=rwc")]
    database_url: String,

    /// Read API listen address.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON log output.
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Blocks per `eth_getLogs` window.
    #[arg(long, env = "WINDOW_SIZE")]
    window_size: Option<u64>,

    /// Blocks a window's end must stay behind the head.
    #[arg(long, env = "CONFIRMATION_MARGIN")]
    confirmation_margin: Option<u64>,

    /// Sleep before every head poll (ms).
    #[arg(long, env = "POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Extra wait when the head is not far enough ahead (ms).
    #[arg(long, env = "CATCH_UP_WAIT_MS")]
    catch_up_wait_ms: Option<u64>,

    /// First reconnect backoff (ms).
    #[arg(long, env = "RECONNECT_BACKOFF_MS")]
    reconnect_backoff_ms: Option<u64>,

    /// Reconnect backoff ceiling (ms).
    #[arg(long, env = "RECONNECT_BACKOFF_MAX_MS")]
    reconnect_backoff_max_ms: Option<u64>,

    /// Retries for a transient storage failure.
    #[arg(long, env = "STORE_MAX_RETRIES")]
    store_max_retries: Option<u32>,

    /// Pause before a failed scanning run is restarted (ms).
    #[arg(long, env = "RESTART_PAUSE_MS")]
    restart_pause_ms: Option<u64>,
}

impl Cli {
    fn scanner_config(&self) -> Result<ScannerConfig> {
        let contract: Address = self
            .contract
            .parse()
            .with_context(|| format!("invalid UNIONWALLET_CONTRACT: {}", self.contract))?;

        let mut config = ScannerConfig {
            contract,
            start_block: self.start_block,
            ..Default::default()
        };
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.confirmation_margin {
            config.confirmation_margin = v;
        }
        if let Some(v) = self.poll_interval_ms {
            config.poll_interval_ms = v;
        }
        if let Some(v) = self.catch_up_wait_ms {
            config.catch_up_wait_ms = v;
        }
        if let Some(v) = self.reconnect_backoff_ms {
            config.reconnect_backoff_ms = v;
        }
        if let Some(v) = self.reconnect_backoff_max_ms {
            config.reconnect_backoff_max_ms = v;
        }
        if let Some(v) = self.store_max_retries {
            config.store_max_retries = v;
        }
        if let Some(v) = self.restart_pause_ms {
            config.restart_pause_ms = v;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.json_logs,
    });

    let config = cli.scanner_config()?;
    let endpoints = EndpointPool::from_env().context("failed to read RPC endpoints")?;
    info!(
        contract = %config.contract,
        start_block = config.start_block,
        endpoints = endpoints.len(),
        "starting unionlink"
    );
    for endpoint in endpoints.iter() {
        debug!(ordinal = endpoint.ordinal, url = %endpoint.url, "RPC endpoint");
    }

    let store = unionlink_storage::connect(&cli.database_url)
        .await
        .context("failed to open link store")?;
    info!(backend = backend_name(&cli.database_url), "link store ready");

    let metrics = Arc::new(ScannerMetrics::new());
    let scanner = ScannerBuilder::new()
        .with_config(config)
        .endpoints(endpoints)
        .store(store.clone())
        .metrics(metrics.clone())
        .build()
        .context("invalid scanner configuration")?;

    let (shutdown_tx, shutdown) = Shutdown::channel();

    let listener = tokio::net::TcpListener::bind(cli.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind_addr))?;
    let router = create_api_router(ApiState::new(store, metrics));
    let api_handle = tokio::spawn(unionlink_api::serve(listener, router, shutdown.clone()));

    let scanner_shutdown_tx = shutdown_tx.clone();
    let mut scanner_handle = tokio::spawn(async move {
        let result = Supervisor::new(scanner).run(shutdown).await;
        if result.is_err() {
            // Bring the API down with the scanner.
            let _ = scanner_shutdown_tx.send(true);
        }
        result
    });

    info!(addr = %cli.bind_addr, "unionlink ready");

    let scan_result = tokio::select! {
        _ = shutdown_signal() => {
            info!("shutting down");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(Duration::from_secs(30), &mut scanner_handle).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    warn!("scanner shutdown timed out");
                    None
                }
            }
        }
        joined = &mut scanner_handle => Some(joined),
    };

    match tokio::time::timeout(Duration::from_secs(10), api_handle).await {
        Ok(Ok(Ok(()))) => debug!("API server stopped"),
        Ok(Ok(Err(e))) => error!(error = %e, "API server error"),
        Ok(Err(e)) => error!(error = %e, "API server task panicked"),
        Err(_) => warn!("API server shutdown timed out"),
    }

    match scan_result {
        Some(Ok(Ok(scanner))) => {
            info!(next_block = scanner.window().start, "shutdown complete");
            Ok(())
        }
        Some(Ok(Err(e))) => Err(e).context("scanner stopped"),
        Some(Err(e)) => bail!("scanner task panicked: {e}"),
        None => Ok(()),
    }
}

fn backend_name(url: &str) -> &'static str {
    if url == "memory" {
        "memory"
    } else if url.starts_with("sqlite:") {
        "sqlite"
    } else {
        "postgres"
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const CONTRACT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "unionlink",
            "--contract",
            CONTRACT,
            "--start-block",
            "100",
            "--window-size",
            "10",
            "--confirmation-margin",
            "5",
            "--restart-pause-ms",
            "1000",
        ])
        .unwrap();
        let config = cli.scanner_config().unwrap();

        assert_eq!(config.contract.to_checksum(None), CONTRACT);
        assert_eq!(config.start_block, 100);
        assert_eq!(config.window_size, 10);
        assert_eq!(config.lag(), 15);
        assert_eq!(config.restart_pause_ms, 1_000);
        assert_eq!(config.poll_interval_ms, ScannerConfig::default().poll_interval_ms);
    }

    #[test]
    fn bad_contract_is_rejected() {
        let cli = Cli::try_parse_from(["unionlink", "--contract", "0x1234"]).unwrap();
        assert!(cli.scanner_config().is_err());
    }

    #[test]
    fn backend_names() {
        assert_eq!(backend_name("memory"), "memory");
        assert_eq!(backend_name("sqlite::memory:"), "sqlite");
        assert_eq!(backend_name("postgres://localhost/unionlink"), "postgres");
    }
}
