//! shell-pool
//!
//! Mobile-aware stratum pool server: newline-delimited JSON-RPC 1.0 over
//! TCP with mobile extensions (thermal reports, device profiling,
//! mobile-tuned difficulty, thermal-proof share validation). A background
//! task polls the upstream node for fresh templates and republishes them
//! as jobs; connections validate shares against the current job with the
//! MobileX verification path and forward block-grade solutions upstream.

pub mod client;
pub mod config;
pub mod device;
pub mod difficulty;
pub mod error;
pub mod job;
pub mod protocol;
pub mod server;
pub mod share;

pub use config::PoolConfig;
pub use error::PoolError;
pub use job::{JobManager, MiningJob, WorkSize};
pub use server::PoolServer;
