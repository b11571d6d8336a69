//! shell-minerd — the Shell Reserve dual-algorithm miner daemon.
//!
//! Startup sequence:
//!   1. Load and validate the miner configuration
//!   2. Probe the upstream node RPC
//!   3. Run the orchestrator (seed rotation, scheduler, dual-algo race)

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use shell_core::constants::{
    EXIT_CONFIG_INVALID, EXIT_HARDWARE_ERROR, EXIT_UPSTREAM_UNREACHABLE,
};
use shell_core::types::Hash256;
use shell_miner::{AlgoMode, IntensityLevel, MinerConfig, MiningOrchestrator};
use shell_rpc::{NodeRpcClient, TemplateSource};

#[derive(Parser, Debug)]
#[command(
    name = "shell-minerd",
    version,
    about = "Shell Reserve miner — RandomX and MobileX, raced on every template"
)]
struct Args {
    /// Path to a JSON miner configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Upstream node JSON-RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8554")]
    upstream: String,

    /// Genesis block hash (hex) anchoring the seed schedule.
    #[arg(long, default_value = "0000000000000000000000000000000000000000000000000000000000000000")]
    genesis_hash: String,

    /// Algorithm mode override: randomx | mobilex | dual.
    #[arg(long)]
    algo: Option<String>,

    /// Intensity preset override: light | medium | full.
    #[arg(long)]
    intensity: Option<String>,
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
    info!("shell-minerd starting");

    // ── Configuration ─────────────────────────────────────────────────────────
    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "configuration invalid");
            std::process::exit(EXIT_CONFIG_INVALID);
        }
    };
    if let Some(algo) = &args.algo {
        config.algo = match algo.as_str() {
            "randomx" => AlgoMode::Randomx,
            "mobilex" => AlgoMode::Mobilex,
            "dual" => AlgoMode::Dual,
            other => {
                error!(algo = other, "unknown algorithm mode");
                std::process::exit(EXIT_CONFIG_INVALID);
            }
        };
    }
    if let Some(intensity) = &args.intensity {
        config.intensity = match intensity.as_str() {
            "light" => IntensityLevel::Light,
            "medium" => IntensityLevel::Medium,
            "full" => IntensityLevel::Full,
            other => {
                error!(intensity = other, "unknown intensity preset");
                std::process::exit(EXIT_CONFIG_INVALID);
            }
        };
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

    // ── Mine ──────────────────────────────────────────────────────────────────
    let orchestrator = Arc::new(MiningOrchestrator::new(
        config,
        genesis,
        shell_core::constants::SEED_ROTATION_BLOCKS,
    ));

    let shutdown_handle = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        shutdown_handle.shutdown();
    });

    if let Err(e) = orchestrator.run(upstream).await {
        // Worker spawn or dataset allocation failures are fatal to the
        // mining subsystem.
        error!(error = %e, "unrecoverable miner failure");
        std::process::exit(EXIT_HARDWARE_ERROR);
    }
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<MinerConfig> {
    match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)?;
            Ok(serde_json::from_str(&json)?)
        }
        None => Ok(MinerConfig::default()),
    }
}
