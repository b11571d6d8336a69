//! shell-mobilex
//!
//! The MobileX proof-of-work core: a memory-hard RandomX base hash
//! composed with mobile-binding work (a quantized neural-mix step, an
//! ARM64-tunable permutation schedule, and a thermal attestation), plus
//! the heterogeneous big/little scheduler that distributes hashing across
//! core classes.
//!
//! Everything here is bit-deterministic across platforms: the permutation
//! schedule depends only on the header, never on the host's vector width.

pub mod error;
pub mod mobilex;
pub mod npu;
pub mod randomx;
pub mod scheduler;
pub mod thermal;

pub use error::PowError;
pub use mobilex::{
    difficulty_to_target, meets_target, should_audit, AuditParams, MobileXHasher, MobileXParams,
    ThermalAuditor,
};
pub use randomx::{RandomxCache, RandomxVm, RANDOMX_LIGHT_CACHE_BYTES};
pub use scheduler::{CoreClass, HeterogeneousScheduler, SchedulerConfig, SchedulerMetrics};
pub use thermal::{
    decode_thermal_proof, encode_thermal_proof, ThermalPolicy, ThermalTelemetry, ThermalWindow,
};
