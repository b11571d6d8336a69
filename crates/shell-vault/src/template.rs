use serde::{Deserialize, Serialize};
use tracing::debug;

use shell_core::error::ShellError;
use shell_core::types::Hash256;
use shell_crypto::hash::sha256;

use crate::composition::PolicyComposition;
use crate::policy::{PolicyDecision, SpendContext, TimeHierarchy, VaultTier};

// ── Compliance hook ──────────────────────────────────────────────────────────

/// Attestation oracle consulted for spends at or above the template's
/// attestation threshold. Injected by the operator; the engine never
/// hard-codes an outcome.
pub trait ComplianceOracle: Send + Sync {
    fn attest(&self, ctx: &SpendContext) -> bool;
}

/// Fixed-outcome oracle for tests and for deployments without an
/// attestation pipeline (where `StaticComplianceOracle(false)` makes every
/// large spend fail closed).
pub struct StaticComplianceOracle(pub bool);

impl ComplianceOracle for StaticComplianceOracle {
    fn attest(&self, _ctx: &SpendContext) -> bool {
        self.0
    }
}

// ── Template fields ──────────────────────────────────────────────────────────

/// Emergency recovery parameters (guardian multisig path).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmergencyRecovery {
    pub guardian_threshold: u8,
    pub emergency_delay: u32,
    /// Commitment to the off-chain recovery script.
    pub recovery_script: Hash256,
    pub external_approval: bool,
}

/// Compliance hook parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplianceHooks {
    /// Amounts at or above this require attestation (kria).
    pub attestation_threshold: u64,
    pub compliance_delay: u32,
    pub validator_threshold: u8,
}

/// One step of an inheritance schedule: at `activation_height` the vault
/// switches to `hierarchy`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InheritanceTransition {
    pub activation_height: u32,
    pub hierarchy: TimeHierarchy,
}

// ── EnhancedVaultTemplate ────────────────────────────────────────────────────

/// An institutional vault covenant. Immutable after creation; identified
/// on-chain by the SHA-256 of its canonical serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnhancedVaultTemplate {
    pub version: u16,
    pub created_at: u32,
    pub hierarchy: TimeHierarchy,
    pub composition: Option<PolicyComposition>,
    /// Height-sorted hierarchy transitions; empty when no schedule exists.
    pub inheritance: Vec<InheritanceTransition>,
    pub emergency: EmergencyRecovery,
    pub compliance: ComplianceHooks,
}

impl EnhancedVaultTemplate {
    /// Validate and construct. Fails with `InsufficientKeys` if any tier
    /// declares a threshold its key set cannot meet, and with
    /// `InvalidTransitionOrder` if inheritance transitions are not sorted
    /// by activation height.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: u16,
        created_at: u32,
        hierarchy: TimeHierarchy,
        composition: Option<PolicyComposition>,
        inheritance: Vec<InheritanceTransition>,
        emergency: EmergencyRecovery,
        compliance: ComplianceHooks,
    ) -> Result<Self, ShellError> {
        hierarchy.validate()?;
        for t in &inheritance {
            t.hierarchy.validate()?;
        }
        if inheritance
            .windows(2)
            .any(|w| w[0].activation_height >= w[1].activation_height)
        {
            return Err(ShellError::InvalidTransitionOrder);
        }
        Ok(Self {
            version,
            created_at,
            hierarchy,
            composition,
            inheritance,
            emergency,
            compliance,
        })
    }

    /// The hierarchy in force at `block_height`: the latest transition
    /// whose activation height has been reached, else the initial one.
    pub fn effective_hierarchy(&self, block_height: u32) -> &TimeHierarchy {
        self.inheritance
            .iter()
            .rev()
            .find(|t| t.activation_height <= block_height)
            .map(|t| &t.hierarchy)
            .unwrap_or(&self.hierarchy)
    }

    /// Deterministic spend evaluation.
    ///
    /// Tiers are consulted hot-first; the first satisfied tier approves.
    /// Spends at or above the attestation threshold must additionally pass
    /// the compliance oracle, and a present composition tree must also
    /// evaluate true.
    pub fn evaluate_spend(
        &self,
        ctx: &SpendContext,
        oracle: &dyn ComplianceOracle,
    ) -> PolicyDecision {
        if ctx.amount >= self.compliance.attestation_threshold && !oracle.attest(ctx) {
            debug!(amount = ctx.amount, "spend blocked pending compliance review");
            return PolicyDecision::reject("compliance review required");
        }

        if let Some(tree) = &self.composition {
            if !tree.evaluate(ctx.sig_count, ctx.block_height, ctx.lock_time) {
                return PolicyDecision::reject("composition not satisfied");
            }
        }

        let hierarchy = self.effective_hierarchy(ctx.block_height);
        for tier in VaultTier::SPEND_ORDER {
            if hierarchy
                .tier(tier)
                .satisfied(ctx.sig_count, ctx.block_height, ctx.lock_time)
            {
                return PolicyDecision::approve(tier);
            }
        }
        PolicyDecision::reject("no policy satisfied")
    }

    /// The most permissive tier whose *time* constraints are currently met
    /// (emergency → cold → warm → hot). Signature counts are a spend-time
    /// property and are not consulted here; this query serves planning.
    pub fn active_policy(&self, block_height: u32, lock_time: u32) -> Option<VaultTier> {
        let hierarchy = self.effective_hierarchy(block_height);
        VaultTier::SPEND_ORDER
            .iter()
            .rev()
            .copied()
            .find(|t| hierarchy.tier(*t).time_available(block_height, lock_time))
    }

    // ── Canonical serialization ──────────────────────────────────────────────

    /// Canonical little-endian binary encoding: version, timestamp, the
    /// four tiers' `(threshold, key_count, block_delay, time_window)`,
    /// emergency recovery fields, then compliance hook fields. This is the
    /// preimage of the on-chain template commitment.
    pub fn serialize_canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(97);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.created_at.to_le_bytes());
        for tier in VaultTier::SPEND_ORDER {
            let p = self.hierarchy.tier(tier);
            out.push(p.threshold);
            out.push(p.key_count);
            out.extend_from_slice(&p.block_delay.to_le_bytes());
            out.extend_from_slice(&p.time_window.to_le_bytes());
        }
        out.push(self.emergency.guardian_threshold);
        out.extend_from_slice(&self.emergency.emergency_delay.to_le_bytes());
        out.extend_from_slice(self.emergency.recovery_script.as_bytes());
        out.push(self.emergency.external_approval as u8);
        out.extend_from_slice(&self.compliance.attestation_threshold.to_le_bytes());
        out.extend_from_slice(&self.compliance.compliance_delay.to_le_bytes());
        out.push(self.compliance.validator_threshold);
        out
    }

    /// SHA-256 of the canonical serialization: the template's identity.
    pub fn template_hash(&self) -> Hash256 {
        Hash256::from_bytes(sha256(&self.serialize_canonical()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TimePolicy;
    use shell_core::constants::{COMPLIANCE_ATTESTATION_THRESHOLD, KRIA_PER_XSL};
    use shell_core::types::PubKey;

    fn keys(n: usize) -> Vec<PubKey> {
        (0..n)
            .map(|i| {
                let mut b = [0u8; 33];
                b[0] = 0x02;
                b[1] = i as u8;
                PubKey::from_bytes(b)
            })
            .collect()
    }

    fn sovereign_hierarchy() -> TimeHierarchy {
        TimeHierarchy {
            hot: TimePolicy::new(11, 0, 0, keys(15)),
            warm: TimePolicy::new(8, 144, 0, keys(15)),
            cold: TimePolicy::new(5, 1_008, 0, keys(15)),
            emergency: TimePolicy::new(3, 4_320, 0, keys(15)),
        }
    }

    fn sovereign_vault() -> EnhancedVaultTemplate {
        EnhancedVaultTemplate::new(
            1,
            1_900_000_000u32,
            sovereign_hierarchy(),
            None,
            vec![],
            EmergencyRecovery {
                guardian_threshold: 3,
                emergency_delay: 4_320,
                recovery_script: Hash256::from_bytes([0x55; 32]),
                external_approval: true,
            },
            ComplianceHooks {
                attestation_threshold: COMPLIANCE_ATTESTATION_THRESHOLD,
                compliance_delay: 144,
                validator_threshold: 2,
            },
        )
        .unwrap()
    }

    #[test]
    fn sovereign_hot_spend_approved() {
        let vault = sovereign_vault();
        let decision = vault.evaluate_spend(
            &SpendContext {
                sig_count: 11,
                block_height: 100_000,
                lock_time: 99_900,
                amount: 1_000 * KRIA_PER_XSL,
            },
            &StaticComplianceOracle(true),
        );
        assert!(decision.approved);
        assert_eq!(decision.policy_name, Some("hot"));
    }

    #[test]
    fn compliance_gate_blocks_large_spend() {
        let vault = sovereign_vault();
        let ctx = SpendContext {
            sig_count: 11,
            block_height: 100_000,
            lock_time: 99_900,
            amount: 2_000_000 * KRIA_PER_XSL,
        };
        let ok = vault.evaluate_spend(&ctx, &StaticComplianceOracle(true));
        assert!(ok.approved);
        assert_eq!(ok.policy_name, Some("hot"));

        let blocked = vault.evaluate_spend(&ctx, &StaticComplianceOracle(false));
        assert!(!blocked.approved);
        assert_eq!(blocked.reason, Some("compliance review required"));
    }

    #[test]
    fn first_satisfied_tier_wins() {
        let vault = sovereign_vault();
        // 11 signatures at a height where every tier's delay has passed:
        // hot must win because it is consulted first.
        let decision = vault.evaluate_spend(
            &SpendContext {
                sig_count: 11,
                block_height: 200_000,
                lock_time: 100_000,
                amount: 1,
            },
            &StaticComplianceOracle(false),
        );
        assert_eq!(decision.policy_name, Some("hot"));
    }

    #[test]
    fn falls_through_to_later_tier() {
        let vault = sovereign_vault();
        // Only 5 signatures: hot (11) and warm (8) fail, cold (5) passes
        // once its 1008-block delay has elapsed.
        let decision = vault.evaluate_spend(
            &SpendContext {
                sig_count: 5,
                block_height: 101_100,
                lock_time: 100_000,
                amount: 1,
            },
            &StaticComplianceOracle(false),
        );
        assert_eq!(decision.policy_name, Some("cold"));
    }

    #[test]
    fn nothing_satisfied_is_deterministic_reject() {
        let vault = sovereign_vault();
        let ctx = SpendContext {
            sig_count: 2,
            block_height: 100_001,
            lock_time: 100_000,
            amount: 1,
        };
        let a = vault.evaluate_spend(&ctx, &StaticComplianceOracle(false));
        let b = vault.evaluate_spend(&ctx, &StaticComplianceOracle(false));
        assert_eq!(a, b);
        assert!(!a.approved);
        assert_eq!(a.reason, Some("no policy satisfied"));
    }

    #[test]
    fn active_policy_prefers_most_permissive() {
        let vault = sovereign_vault();
        // Past the emergency delay every tier is available; the query must
        // report emergency, not hot.
        assert_eq!(
            vault.active_policy(105_000, 100_000),
            Some(VaultTier::Emergency)
        );
        // Just after lock time only hot (delay 0) is available.
        assert_eq!(vault.active_policy(100_001, 100_000), Some(VaultTier::Hot));
    }

    #[test]
    fn canonical_serialization_is_97_bytes() {
        let vault = sovereign_vault();
        let bytes = vault.serialize_canonical();
        assert_eq!(bytes.len(), 97);
        // version little-endian at the front
        assert_eq!(&bytes[..2], &[1, 0]);
        // hot tier threshold/key_count follow created_at
        assert_eq!(bytes[6], 11);
        assert_eq!(bytes[7], 15);
    }

    #[test]
    fn template_hash_is_stable_and_field_sensitive() {
        let a = sovereign_vault();
        let b = sovereign_vault();
        assert_eq!(a.template_hash(), b.template_hash());

        let mut c = sovereign_vault();
        c.compliance.validator_threshold = 3;
        assert_ne!(a.template_hash(), c.template_hash());
    }

    #[test]
    fn inheritance_picks_latest_reached_transition() {
        let mut relaxed = sovereign_hierarchy();
        relaxed.hot = TimePolicy::new(2, 0, 0, keys(3));
        let vault = EnhancedVaultTemplate::new(
            1,
            0,
            sovereign_hierarchy(),
            None,
            vec![InheritanceTransition {
                activation_height: 150_000,
                hierarchy: relaxed,
            }],
            sovereign_vault().emergency,
            sovereign_vault().compliance,
        )
        .unwrap();

        // Before activation the original 11-of-15 hot tier applies.
        assert_eq!(vault.effective_hierarchy(149_999).hot.threshold, 11);
        // From activation onward the inherited 2-of-3 applies.
        assert_eq!(vault.effective_hierarchy(150_000).hot.threshold, 2);
    }

    #[test]
    fn unsorted_inheritance_rejected() {
        let err = EnhancedVaultTemplate::new(
            1,
            0,
            sovereign_hierarchy(),
            None,
            vec![
                InheritanceTransition {
                    activation_height: 200_000,
                    hierarchy: sovereign_hierarchy(),
                },
                InheritanceTransition {
                    activation_height: 100_000,
                    hierarchy: sovereign_hierarchy(),
                },
            ],
            sovereign_vault().emergency,
            sovereign_vault().compliance,
        )
        .unwrap_err();
        assert_eq!(err, ShellError::InvalidTransitionOrder);
    }

    #[test]
    fn composition_gate_must_also_hold() {
        let mut vault = sovereign_vault();
        vault.composition = Some(PolicyComposition::Leaf(TimePolicy::new(
            12, 0, 0, keys(15),
        )));
        // Hot tier is satisfied with 11 signatures but the composition
        // requires 12.
        let decision = vault.evaluate_spend(
            &SpendContext {
                sig_count: 11,
                block_height: 100_000,
                lock_time: 99_900,
                amount: 1,
            },
            &StaticComplianceOracle(false),
        );
        assert!(!decision.approved);
        assert_eq!(decision.reason, Some("composition not satisfied"));
    }
}
