use thiserror::Error;

/// Pool-side failures. Share rejections are returned to the submitting
/// client as `result: false`; the reason stays server-side in the logs.
#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    // ── Share rejections ─────────────────────────────────────────────────────
    #[error("malformed share field '{field}': expected {expected} hex chars")]
    MalformedShareField {
        field: &'static str,
        expected: usize,
    },

    #[error("duplicate share")]
    DuplicateShare,

    #[error("share references stale or unknown job {0}")]
    StaleJob(String),

    #[error("share ntime outside acceptance window")]
    NtimeOutOfRange,

    #[error("thermal proof outside tolerance band")]
    ThermalRejected,

    #[error("share hash above pool target")]
    AboveTarget,

    #[error("client is not authorized")]
    Unauthorized,

    // ── Service failures ─────────────────────────────────────────────────────
    #[error("no job available yet")]
    NoCurrentJob,

    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("listener bind failed: {0}")]
    BindFailed(String),
}
