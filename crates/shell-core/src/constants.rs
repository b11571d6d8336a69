//! ─── Shell Reserve Protocol Constants ───────────────────────────────────────
//!
//! "Central-bank settlement, settled on-chain."
//!
//! Base unit: kria (1 XSL = 100,000,000 kria)
//! Ticker:    XSL
//! Cadence:   one block every 5 minutes

// ── Monetary units ───────────────────────────────────────────────────────────

/// 1 XSL expressed in kria.
pub const KRIA_PER_XSL: u64 = 100_000_000;

// ── Block cadence ────────────────────────────────────────────────────────────

/// Target block interval in seconds. Predicate time arithmetic uses
/// `height * BLOCK_SECONDS` as its approximate clock.
pub const BLOCK_SECONDS: i64 = 300;

/// Confirmations at which a transaction is treated as irrevocably settled.
pub const FINALITY_CONFIRMATIONS: u32 = 6;

// ── Vault covenants ──────────────────────────────────────────────────────────

/// Amounts at or above this require a successful compliance attestation
/// before any tier may approve a spend (1,000,000 XSL).
pub const COMPLIANCE_ATTESTATION_THRESHOLD: u64 = 1_000_000 * KRIA_PER_XSL;

/// Default review delay once an amount crosses the attestation threshold
/// (blocks).
pub const COMPLIANCE_DELAY_BLOCKS: u32 = 144;

// ── Claimable balances ───────────────────────────────────────────────────────

/// Maximum predicate tree depth accepted at creation. Deeper trees are
/// rejected to bound recursion during evaluation.
pub const MAX_PREDICATE_DEPTH: usize = 16;

// ── MobileX proof-of-work ────────────────────────────────────────────────────

/// Hash iterations between neural-mix (NPU) steps.
pub const NPU_INTERVAL_DEFAULT: u32 = 150;

/// RandomX seed rotation period (blocks).
pub const SEED_ROTATION_BLOCKS: u64 = 2_048;

/// Per-block target effective clock (MHz) before difficulty scaling.
pub const THERMAL_TARGET_CLOCK_MHZ: u32 = 2_000;

/// Accepted deviation around the target clock, in percent.
pub const THERMAL_TOLERANCE_PCT: f64 = 5.0;

/// Rolling thermal-proof window used for statistical validation.
pub const THERMAL_WINDOW_BLOCKS: usize = 1_000;

/// Standard deviations beyond which a proof is flagged as an outlier.
pub const THERMAL_OUTLIER_SIGMA: f64 = 3.0;

/// Fraction of blocks re-executed at reduced clock during validation.
pub const THERMAL_AUDIT_RATE: f64 = 0.10;

/// Clock fraction applied during audit re-execution.
pub const THERMAL_AUDIT_CLOCK_FRACTION: f64 = 0.5;

// ── Stratum pool ─────────────────────────────────────────────────────────────

/// Target seconds between shares per client.
pub const POOL_TARGET_SHARE_SECS: u64 = 30;

/// Inter-arrival below this raises difficulty.
pub const POOL_RETARGET_FAST_SECS: u64 = 20;

/// Inter-arrival above this lowers difficulty.
pub const POOL_RETARGET_SLOW_SECS: u64 = 40;

/// Mobile difficulty bounds and starting point.
pub const MIN_MOBILE_DIFFICULTY: f64 = 1.0;
pub const MAX_MOBILE_DIFFICULTY: f64 = 10_000.0;
pub const INITIAL_MOBILE_DIFFICULTY: f64 = 16.0;

/// Recent-share duplicate window (seconds) and table cap.
pub const SHARE_TTL_SECS: i64 = 300;
pub const MAX_RECENT_SHARES: usize = 10_000;

/// Share ntime acceptance window relative to server time (seconds).
pub const NTIME_MAX_PAST_SECS: i64 = 600;
pub const NTIME_MAX_FUTURE_SECS: i64 = 120;

/// Per-connection read deadline (seconds), reset after each message.
pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Upstream template poll period (seconds).
pub const JOB_REFRESH_SECS: u64 = 30;

// ── Process exit codes ───────────────────────────────────────────────────────

/// Configuration failed validation.
pub const EXIT_CONFIG_INVALID: i32 = 2;

/// Upstream node unreachable after retries.
pub const EXIT_UPSTREAM_UNREACHABLE: i32 = 3;

/// Listener socket could not be bound.
pub const EXIT_LISTENER_BIND_FAILED: i32 = 4;

/// Unrecoverable hardware/resource failure (dataset alloc, thread spawn).
pub const EXIT_HARDWARE_ERROR: i32 = 5;
