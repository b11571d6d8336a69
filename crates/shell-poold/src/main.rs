//! shell-poold — the Shell Reserve mobile mining pool daemon.
//!
//! Startup sequence:
//!   1. Load and validate the pool configuration
//!   2. Probe the upstream node RPC
//!   3. Bind the stratum listener and serve until interrupted

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use shell_core::constants::{
    EXIT_CONFIG_INVALID, EXIT_LISTENER_BIND_FAILED, EXIT_UPSTREAM_UNREACHABLE,
};
use shell_core::types::Hash256;
use shell_pool::{PoolConfig, PoolError, PoolServer};
use shell_rpc::{NodeRpcClient, TemplateSource};

#[derive(Parser, Debug)]
#[command(
    name = "shell-poold",
    version,
    about = "Shell Reserve stratum pool — mobile-aware share validation and payout accounting"
)]
struct Args {
    /// Path to a JSON pool configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stratum listen endpoint (overrides the config file).
    #[arg(long)]
    listen: Option<String>,

    /// Upstream node JSON-RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8554")]
    upstream: String,

    /// Genesis block hash (hex) anchoring the seed schedule.
    #[arg(long, default_value = "0000000000000000000000000000000000000000000000000000000000000000")]
    genesis_hash: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shell=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("shell-poold starting");

    // ── Configuration ─────────────────────────────────────────────────────────
    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration invalid");
            std::process::exit(EXIT_CONFIG_INVALID);
        }
    };
    if let Some(listen) = args.listen {
        config.endpoint = listen;
    }
    if let Err(e) = config.validate() {
        error!(error = %e, "configuration invalid");
        std::process::exit(EXIT_CONFIG_INVALID);
    }
    let Ok(genesis) = Hash256::from_hex(&args.genesis_hash) else {
        error!("genesis hash is not 64 hex chars");
        std::process::exit(EXIT_CONFIG_INVALID);
    };

    // ── Upstream probe ────────────────────────────────────────────────────────
    let upstream: Arc<dyn TemplateSource> = match NodeRpcClient::new(&args.upstream) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "upstream client construction failed");
            std::process::exit(EXIT_UPSTREAM_UNREACHABLE);
        }
    };
    if let Err(e) = upstream.fetch_template().await {
        error!(error = %e, url = %args.upstream, "upstream node unreachable");
        std::process::exit(EXIT_UPSTREAM_UNREACHABLE);
    }

    // ── Serve ─────────────────────────────────────────────────────────────────
    let server = Arc::new(
        PoolServer::new(config, upstream, genesis).unwrap_or_else(|e| {
            error!(error = %e, "pool construction failed");
            std::process::exit(EXIT_CONFIG_INVALID);
        }),
    );

    let shutdown_handle = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        shutdown_handle.shutdown();
    });

    if let Err(e) = server.run().await {
        if e.downcast_ref::<PoolError>()
            .map(|p| matches!(p, PoolError::BindFailed(_)))
            .unwrap_or(false)
        {
            error!(error = %e, "listener bind failed");
            std::process::exit(EXIT_LISTENER_BIND_FAILED);
        }
        return Err(e);
    }
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<PoolConfig> {
    match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)?;
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(PoolConfig::default()),
    }
}
