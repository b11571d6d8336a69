//! The MobileX hash pipeline.
//!
//! For header `H` and nonce `n`:
//!   1. `r₀ = randomx_hash(seed, serialize(H with nonce = n))`
//!   2. on every `npu_interval`-th nonce, XOR in the neural-mix digest
//!   3. apply the ARM64-tunable permutation schedule derived from `H`
//!   4. the header is solved when the digest, read as a 256-bit
//!      big-endian integer, is at or below the target
//!
//! The permutation schedule depends only on the header prefix (everything
//! before the nonce), so miners compute it once per template and the
//! digest is identical on every platform.

use sha2::{Digest, Sha256};

use shell_core::constants::{
    NPU_INTERVAL_DEFAULT, THERMAL_AUDIT_CLOCK_FRACTION, THERMAL_AUDIT_RATE,
};
use shell_core::header::BlockHeader;
use shell_core::types::Hash256;

use crate::error::PowError;
use crate::npu::apply_neural_mix;
use crate::randomx::RandomxVm;
use crate::thermal::{ThermalPolicy, ThermalWindow};

/// Tunables for the MobileX pipeline.
#[derive(Clone, Copy, Debug)]
pub struct MobileXParams {
    /// A nonce carries the neural-mix step when divisible by this.
    pub npu_interval: u32,
    pub thermal: ThermalPolicy,
}

impl Default for MobileXParams {
    fn default() -> Self {
        Self {
            npu_interval: NPU_INTERVAL_DEFAULT,
            thermal: ThermalPolicy::default(),
        }
    }
}

/// Hashes headers under a borrowed RandomX VM.
#[derive(Clone)]
pub struct MobileXHasher {
    vm: RandomxVm,
    params: MobileXParams,
}

impl MobileXHasher {
    pub fn new(vm: RandomxVm, params: MobileXParams) -> Self {
        Self { vm, params }
    }

    pub fn params(&self) -> &MobileXParams {
        &self.params
    }

    /// Full pipeline for one header/nonce.
    pub fn hash_header(&self, header: &BlockHeader) -> [u8; 32] {
        let mut digest = self.vm.hash(&header.pow_bytes());
        if self.params.npu_interval > 0 && header.nonce % self.params.npu_interval == 0 {
            apply_neural_mix(&mut digest);
        }
        permute(&mut digest, &schedule_for(header));
        digest
    }

    /// Validator path: thermal band first (cheap), then the recomputed
    /// digest against the target.
    pub fn verify_header(&self, header: &BlockHeader, target: &[u8; 32]) -> Result<(), PowError> {
        self.params.thermal.validate(header.thermal_proof)?;
        let digest = self.hash_header(header);
        if !meets_target(&digest, target) {
            return Err(PowError::AboveTarget);
        }
        Ok(())
    }
}

/// Permutation schedule: SHA-256 of the header prefix (everything before
/// the nonce), stable across the whole nonce search.
fn schedule_for(header: &BlockHeader) -> [u8; 32] {
    let pow = header.pow_bytes();
    let mut hasher = Sha256::new();
    Digest::update(&mut hasher, &pow[..76]);
    hasher.finalize().into()
}

/// ARM64-tunable finishing permutation, in plain scalar code.
///
/// Round structure: a schedule-driven byte shuffle (TBL-shaped) followed
/// by a widening multiply-accumulate over 32-bit lanes (SDOT-shaped) and
/// a lane rotation. Identical output on every architecture.
fn permute(state: &mut [u8; 32], schedule: &[u8; 32]) {
    for round in 0..4usize {
        // Byte shuffle: the schedule names the source index of each byte.
        let mut shuffled = [0u8; 32];
        for i in 0..32 {
            let src = (schedule[(i + round * 8) % 32] as usize + i) % 32;
            shuffled[i] = state[src];
        }

        // Lane mix: multiply-accumulate each 32-bit lane with a schedule
        // lane, then rotate by a schedule-derived amount.
        for lane in 0..8usize {
            let offset = lane * 4;
            let s = u32::from_le_bytes(shuffled[offset..offset + 4].try_into().expect("4 bytes"));
            let k = u32::from_le_bytes(schedule[offset..offset + 4].try_into().expect("4 bytes"));
            let mixed = s
                .wrapping_mul(k | 1)
                .wrapping_add(k.rotate_left(round as u32 + 1));
            let rotated = mixed.rotate_left((schedule[lane] % 31) as u32 + 1);
            shuffled[offset..offset + 4].copy_from_slice(&rotated.to_le_bytes());
        }
        *state = shuffled;
    }
}

/// 256-bit big-endian comparison: `digest ≤ target`.
pub fn meets_target(digest: &[u8; 32], target: &[u8; 32]) -> bool {
    digest <= target
}

/// Derive a 256-bit target from a pool/network difficulty. Difficulty 1
/// maps to the all-ones maximum target; higher difficulty shrinks the
/// leading 64 bits proportionally.
pub fn difficulty_to_target(difficulty: f64) -> [u8; 32] {
    let mut target = [0xFFu8; 32];
    if difficulty <= 1.0 {
        return target;
    }
    let top = (u64::MAX as f64 / difficulty) as u64;
    target[..8].copy_from_slice(&top.to_be_bytes());
    target
}

// ── Statistical audit ────────────────────────────────────────────────────────

/// Audit sampling parameters.
#[derive(Clone, Copy, Debug)]
pub struct AuditParams {
    /// Fraction of blocks selected for re-execution.
    pub rate: f64,
    /// Clock fraction the auditing host drops to during re-execution. The
    /// digest must reproduce bit-for-bit regardless; only timing differs.
    pub clock_fraction: f64,
}

impl Default for AuditParams {
    fn default() -> Self {
        Self {
            rate: THERMAL_AUDIT_RATE,
            clock_fraction: THERMAL_AUDIT_CLOCK_FRACTION,
        }
    }
}

/// Deterministic audit selection: roughly `rate` of blocks, chosen by the
/// block hash so every validator samples the same subset.
pub fn should_audit(block_hash: &Hash256, params: &AuditParams) -> bool {
    (block_hash.as_bytes()[0] as f64) < 256.0 * params.rate
}

/// Consensus-side thermal distribution tracker. Audited blocks are
/// re-hashed and their proofs folded into the rolling window; outliers are
/// flagged for operator attention.
pub struct ThermalAuditor {
    params: AuditParams,
    window: ThermalWindow,
}

impl Default for ThermalAuditor {
    fn default() -> Self {
        Self::new(AuditParams::default())
    }
}

impl ThermalAuditor {
    pub fn new(params: AuditParams) -> Self {
        Self {
            params,
            window: ThermalWindow::new(),
        }
    }

    pub fn params(&self) -> &AuditParams {
        &self.params
    }

    /// Record an accepted header's proof. Returns true when the proof is a
    /// statistical outlier against the window as it stood before this
    /// observation.
    pub fn observe(&mut self, header: &BlockHeader) -> bool {
        let outlier = self.window.is_outlier(header.thermal_proof);
        self.window.record(header.thermal_proof);
        outlier
    }

    /// Fractional-clock re-execution for a selected block: the recomputed
    /// digest must match what consensus accepted, after which the proof
    /// joins the window like any observation.
    pub fn audit(
        &mut self,
        hasher: &MobileXHasher,
        header: &BlockHeader,
        accepted_digest: &[u8; 32],
    ) -> Result<bool, PowError> {
        let digest = hasher.hash_header(header);
        if digest != *accepted_digest {
            return Err(PowError::AuditMismatch);
        }
        Ok(self.observe(header))
    }

    pub fn window(&self) -> &ThermalWindow {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomx::RandomxCache;
    use crate::thermal::encode_thermal_proof;
    use std::sync::Arc;

    fn hasher() -> MobileXHasher {
        let cache = Arc::new(RandomxCache::new([3; 32], 64 * 1024).unwrap());
        MobileXHasher::new(RandomxVm::new(cache), MobileXParams::default())
    }

    fn header(nonce: u32) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block: Hash256::from_bytes([1; 32]),
            merkle_root: Hash256::from_bytes([2; 32]),
            timestamp: 1_900_000_000,
            bits: 0x1d00_ffff,
            nonce,
            thermal_proof: encode_thermal_proof(2_000, 77),
        }
    }

    #[test]
    fn hash_is_deterministic_for_fixed_inputs() {
        let h = hasher();
        assert_eq!(h.hash_header(&header(5)), h.hash_header(&header(5)));
        assert_ne!(h.hash_header(&header(5)), h.hash_header(&header(6)));
    }

    #[test]
    fn thermal_proof_does_not_change_the_digest() {
        let h = hasher();
        let mut a = header(5);
        let mut b = header(5);
        a.thermal_proof = encode_thermal_proof(2_000, 1);
        b.thermal_proof = encode_thermal_proof(2_050, 2);
        assert_eq!(h.hash_header(&a), h.hash_header(&b));
    }

    #[test]
    fn npu_step_applies_on_interval_nonces() {
        let h = hasher();
        // Nonce 0 and 150 carry the neural mix; removing it must change
        // the digest, so a hasher with the step disabled disagrees.
        let without_npu = MobileXHasher::new(
            h.vm.clone(),
            MobileXParams {
                npu_interval: 0,
                thermal: ThermalPolicy::default(),
            },
        );
        assert_ne!(h.hash_header(&header(150)), without_npu.hash_header(&header(150)));
        // Off-interval nonces skip the step and agree.
        assert_eq!(h.hash_header(&header(151)), without_npu.hash_header(&header(151)));
    }

    #[test]
    fn verify_accepts_easy_target_and_good_thermal() {
        let h = hasher();
        assert!(h.verify_header(&header(9), &[0xFF; 32]).is_ok());
    }

    #[test]
    fn verify_rejects_impossible_target() {
        let h = hasher();
        assert_eq!(
            h.verify_header(&header(9), &[0x00; 32]).unwrap_err(),
            PowError::AboveTarget
        );
    }

    #[test]
    fn verify_rejects_bad_thermal_before_hashing() {
        let h = hasher();
        let mut hd = header(9);
        hd.thermal_proof = encode_thermal_proof(500, 1);
        assert!(matches!(
            h.verify_header(&hd, &[0xFF; 32]).unwrap_err(),
            PowError::ThermalOutOfBand { .. }
        ));
    }

    #[test]
    fn targets_shrink_with_difficulty() {
        let easy = difficulty_to_target(1.0);
        let harder = difficulty_to_target(16.0);
        let hardest = difficulty_to_target(1_000.0);
        assert_eq!(easy, [0xFF; 32]);
        assert!(harder > hardest);
        assert!(easy > harder);
    }

    #[test]
    fn meets_target_is_big_endian_inclusive() {
        let mut digest = [0u8; 32];
        let mut target = [0u8; 32];
        digest[0] = 1;
        target[0] = 1;
        assert!(meets_target(&digest, &target));
        digest[31] = 1;
        assert!(!meets_target(&digest, &target));
    }

    #[test]
    fn audit_selection_is_deterministic_and_sparse() {
        let params = AuditParams::default();
        assert!(should_audit(&Hash256::from_bytes([0x00; 32]), &params));
        assert!(!should_audit(&Hash256::from_bytes([0xF0; 32]), &params));
        let picked = (0u8..=255)
            .filter(|b| {
                let mut h = [0u8; 32];
                h[0] = *b;
                should_audit(&Hash256::from_bytes(h), &params)
            })
            .count();
        // ~10% of the byte range.
        assert!((20..=30).contains(&picked));
    }

    #[test]
    fn auditor_flags_divergent_proofs() {
        let mut auditor = ThermalAuditor::default();
        for i in 0..50u32 {
            let mut hd = header(i);
            hd.thermal_proof = encode_thermal_proof(1_990 + (i % 21), 0);
            assert!(!auditor.observe(&hd));
        }
        let mut hot = header(99);
        hot.thermal_proof = encode_thermal_proof(3_000, 0);
        assert!(auditor.observe(&hot));
    }

    #[test]
    fn audit_reproduces_or_rejects() {
        let h = hasher();
        let hd = header(12);
        let digest = h.hash_header(&hd);
        let mut auditor = ThermalAuditor::default();
        assert!(auditor.audit(&h, &hd, &digest).is_ok());
        assert_eq!(
            auditor.audit(&h, &hd, &[0u8; 32]).unwrap_err(),
            PowError::AuditMismatch
        );
    }
}
