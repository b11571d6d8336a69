use serde::{Deserialize, Serialize};

use shell_core::constants::FINALITY_CONFIRMATIONS;
use shell_core::error::ShellError;
use shell_core::types::{Hash256, Timestamp};
use shell_crypto::hash::sha256;

/// Attestation that a transaction is included at a given depth.
///
/// The proof hash commits to the ASCII rendering of the identifying
/// fields: `SHA256(tx_hash ∥ ":" ∥ block_hash ∥ ":" ∥ height ∥ ":" ∥
/// confirmations)` with hashes in hex and numbers in decimal. Validation
/// recomputes every derived field exactly; any discrepancy fails.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementProof {
    pub tx_hash: Hash256,
    pub block_hash: Hash256,
    pub block_height: u64,
    pub confirmations: u32,
    pub timestamp: Timestamp,
    /// Deterministic external reference for ISO messaging.
    pub iso_reference: String,
    pub proof_hash: Hash256,
    /// True at or beyond `FINALITY_CONFIRMATIONS`.
    pub is_irrevocable: bool,
    /// Set when the proof was generated at finality.
    pub finalization_time: Option<Timestamp>,
}

impl SettlementProof {
    pub fn generate(
        tx_hash: Hash256,
        block_hash: Hash256,
        block_height: u64,
        confirmations: u32,
        timestamp: Timestamp,
    ) -> Self {
        let is_irrevocable = confirmations >= FINALITY_CONFIRMATIONS;
        Self {
            tx_hash,
            block_hash,
            block_height,
            confirmations,
            timestamp,
            iso_reference: iso_reference(&tx_hash, timestamp),
            proof_hash: proof_hash(&tx_hash, &block_hash, block_height, confirmations),
            is_irrevocable,
            finalization_time: is_irrevocable.then_some(timestamp),
        }
    }

    /// Recompute every derived field; a proof validates only if all of
    /// them match exactly.
    pub fn validate(&self) -> Result<(), ShellError> {
        let expected =
            proof_hash(&self.tx_hash, &self.block_hash, self.block_height, self.confirmations);
        if self.proof_hash != expected {
            return Err(ShellError::ProofHashMismatch);
        }
        if self.iso_reference != iso_reference(&self.tx_hash, self.timestamp) {
            return Err(ShellError::ProofHashMismatch);
        }
        let finality = self.confirmations >= FINALITY_CONFIRMATIONS;
        if self.is_irrevocable != finality || self.finalization_time.is_some() != finality {
            return Err(ShellError::ProofNotFinal {
                confirmations: self.confirmations,
                required: FINALITY_CONFIRMATIONS,
            });
        }
        Ok(())
    }
}

fn proof_hash(
    tx_hash: &Hash256,
    block_hash: &Hash256,
    height: u64,
    confirmations: u32,
) -> Hash256 {
    let preimage = format!(
        "{}:{}:{}:{}",
        tx_hash.to_hex(),
        block_hash.to_hex(),
        height,
        confirmations
    );
    Hash256::from_bytes(sha256(preimage.as_bytes()))
}

fn iso_reference(tx_hash: &Hash256, timestamp: Timestamp) -> String {
    format!("SETL-{}-{timestamp}", &tx_hash.to_hex()[..12].to_uppercase())
}
