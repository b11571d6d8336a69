use serde::{Deserialize, Serialize};

use shell_core::error::ShellError;
use shell_core::types::PubKey;

// ── VaultTier ────────────────────────────────────────────────────────────────

/// The four named policy tiers, ordered from most to least operational.
/// Spending evaluation scans hot-first; the active-policy query scans
/// emergency-first (most permissive currently available).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultTier {
    Hot,
    Warm,
    Cold,
    Emergency,
}

impl VaultTier {
    /// Spend-evaluation order.
    pub const SPEND_ORDER: [VaultTier; 4] = [
        VaultTier::Hot,
        VaultTier::Warm,
        VaultTier::Cold,
        VaultTier::Emergency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VaultTier::Hot => "hot",
            VaultTier::Warm => "warm",
            VaultTier::Cold => "cold",
            VaultTier::Emergency => "emergency",
        }
    }
}

// ── TimePolicy ───────────────────────────────────────────────────────────────

/// A threshold-multisig policy with a block-height delay and an optional
/// validity window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimePolicy {
    /// Signatures required (1 ≤ threshold ≤ key_count).
    pub threshold: u8,
    /// Declared key count; must equal `keys.len()`.
    pub key_count: u8,
    /// Blocks after `lock_time` before this tier activates.
    pub block_delay: u32,
    /// Blocks the tier stays active once reached; 0 means unbounded.
    pub time_window: u32,
    /// The authorized keys.
    pub keys: Vec<PubKey>,
}

impl TimePolicy {
    pub fn new(threshold: u8, block_delay: u32, time_window: u32, keys: Vec<PubKey>) -> Self {
        Self {
            threshold,
            key_count: keys.len() as u8,
            block_delay,
            time_window,
            keys,
        }
    }

    pub fn validate(&self, tier: &'static str) -> Result<(), ShellError> {
        if self.threshold == 0
            || self.keys.len() < self.threshold as usize
            || self.key_count as usize != self.keys.len()
        {
            return Err(ShellError::InsufficientKeys {
                tier,
                threshold: self.threshold,
                keys: self.keys.len(),
            });
        }
        Ok(())
    }

    /// Are this tier's time constraints met at `block_height`?
    pub fn time_available(&self, block_height: u32, lock_time: u32) -> bool {
        let activation = lock_time.saturating_add(self.block_delay);
        if block_height < activation {
            return false;
        }
        self.time_window == 0 || block_height <= activation.saturating_add(self.time_window)
    }

    /// Full satisfaction check: signatures plus time constraints.
    pub fn satisfied(&self, sig_count: u8, block_height: u32, lock_time: u32) -> bool {
        sig_count >= self.threshold && self.time_available(block_height, lock_time)
    }
}

// ── TimeHierarchy ────────────────────────────────────────────────────────────

/// The four tiers of a vault. Block delays must be non-decreasing across
/// hot → warm → cold → emergency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeHierarchy {
    pub hot: TimePolicy,
    pub warm: TimePolicy,
    pub cold: TimePolicy,
    pub emergency: TimePolicy,
}

impl TimeHierarchy {
    pub fn tier(&self, tier: VaultTier) -> &TimePolicy {
        match tier {
            VaultTier::Hot => &self.hot,
            VaultTier::Warm => &self.warm,
            VaultTier::Cold => &self.cold,
            VaultTier::Emergency => &self.emergency,
        }
    }

    pub fn validate(&self) -> Result<(), ShellError> {
        self.hot.validate("hot")?;
        self.warm.validate("warm")?;
        self.cold.validate("cold")?;
        self.emergency.validate("emergency")?;

        let delays = [
            self.hot.block_delay,
            self.warm.block_delay,
            self.cold.block_delay,
            self.emergency.block_delay,
        ];
        if delays.windows(2).any(|w| w[0] > w[1]) {
            return Err(ShellError::TierDelayOrdering);
        }
        Ok(())
    }
}

// ── Spend evaluation I/O ─────────────────────────────────────────────────────

/// Inputs to a spend evaluation.
#[derive(Clone, Copy, Debug)]
pub struct SpendContext {
    pub sig_count: u8,
    pub block_height: u32,
    pub lock_time: u32,
    pub amount: u64,
}

/// Outcome of a spend evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyDecision {
    pub approved: bool,
    /// Name of the satisfying tier when approved.
    pub policy_name: Option<&'static str>,
    /// Rejection reason when not approved.
    pub reason: Option<&'static str>,
}

impl PolicyDecision {
    pub fn approve(tier: VaultTier) -> Self {
        Self {
            approved: true,
            policy_name: Some(tier.name()),
            reason: None,
        }
    }

    pub fn reject(reason: &'static str) -> Self {
        Self {
            approved: false,
            policy_name: None,
            reason: Some(reason),
        }
    }
}
