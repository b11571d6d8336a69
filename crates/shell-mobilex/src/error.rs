use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PowError {
    #[error("hash does not meet target")]
    AboveTarget,

    #[error("thermal proof outside tolerance: implied clock {implied_mhz} MHz, target {target_mhz} MHz ±{tolerance_pct}%")]
    ThermalOutOfBand {
        implied_mhz: u32,
        target_mhz: u32,
        tolerance_pct: u32,
    },

    #[error("randomx cache size must be a positive multiple of 64 bytes, got {0}")]
    BadCacheSize(usize),

    #[error("audit re-execution produced a different digest")]
    AuditMismatch,

    #[error("scheduler is not running")]
    SchedulerStopped,

    #[error("worker thread spawn failed: {0}")]
    SpawnFailed(String),
}
