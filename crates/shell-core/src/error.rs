use thiserror::Error;

/// Consensus-facing error taxonomy. Every validation path (commitments,
/// vaults, channels, claimables, settlement proofs) returns these; the
/// transaction validator rejects the offending transaction and nothing is
/// retried.
#[derive(Debug, Error, PartialEq)]
pub enum ShellError {
    // ── Commitment errors ────────────────────────────────────────────────────
    #[error("invalid commitment: bytes are not a compressed on-curve point")]
    InvalidCommitment,

    #[error("invalid blinding factor: scalar is null or out of range")]
    InvalidBlindingFactor,

    #[error("confidential balance check failed: inputs − outputs − fee does not open to zero")]
    BalanceProofInvalid,

    // ── Vault errors ─────────────────────────────────────────────────────────
    #[error("tier '{tier}' declares threshold {threshold} but only {keys} keys")]
    InsufficientKeys {
        tier: &'static str,
        threshold: u8,
        keys: usize,
    },

    #[error("inheritance transitions must be sorted by activation height")]
    InvalidTransitionOrder,

    #[error("tier block delays must be non-decreasing from hot to emergency")]
    TierDelayOrdering,

    // ── Channel errors ───────────────────────────────────────────────────────
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("channel already exists: {0}")]
    DuplicateChannel(String),

    #[error("channel is closed; no further state transitions permitted")]
    ChannelClosed,

    #[error("stale nonce: channel at {current}, update carries {got}")]
    StaleNonce { current: u64, got: u64 },

    #[error("balance mismatch: {b0} + {b1} != capacity {capacity}")]
    BalanceMismatch { b0: u64, b1: u64, capacity: u64 },

    #[error("missing signature from participant {0}")]
    MissingSignature(usize),

    #[error("bad signature from participant {0}")]
    BadSignature(usize),

    #[error("channel capacity must be greater than zero")]
    ZeroCapacity,

    #[error("participant public key is absent")]
    AbsentParticipant,

    // ── Claimable-balance errors ─────────────────────────────────────────────
    #[error("claimable balance not found: {0}")]
    ClaimableNotFound(String),

    #[error("no valid claim: claimer is not listed or predicate unsatisfied")]
    NoValidClaim,

    #[error("claimable amount must be greater than zero")]
    ZeroClaimableAmount,

    #[error("claimable balance requires at least one claimant")]
    NoClaimants,

    #[error("claimant destination key is absent")]
    NullDestination,

    #[error("predicate tree exceeds maximum depth of {max}")]
    PredicateTooDeep { max: usize },

    #[error("composite predicate requires at least {min} children, got {got}")]
    PredicateArity { min: usize, got: usize },

    #[error("malformed predicate encoding")]
    PredicateEncoding,

    // ── Settlement errors ────────────────────────────────────────────────────
    #[error("settlement proof hash mismatch")]
    ProofHashMismatch,

    #[error("settlement proof not final: {confirmations} of {required} confirmations")]
    ProofNotFinal { confirmations: u32, required: u32 },

    // ── Serialization / wire ─────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("wire format error: {0}")]
    WireFormat(String),
}
