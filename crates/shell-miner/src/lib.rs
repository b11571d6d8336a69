//! shell-miner
//!
//! The mining orchestrator: owns the RandomX cache lifecycle (seed
//! rotation is a global barrier), runs the rolling speed monitor, pulls
//! templates from the upstream node, and races a RandomX-only worker
//! against a MobileX worker fanned out over the heterogeneous scheduler.
//! The first solution wins and cancels the other side through a shared
//! quit signal; submission failures are logged and mining continues.

pub mod config;
pub mod orchestrator;
pub mod seed;
pub mod speed;

pub use config::{AlgoMode, IntensityLevel, MinerConfig, ThermalLimits};
pub use orchestrator::MiningOrchestrator;
pub use seed::SeedManager;
pub use speed::SpeedMonitor;
