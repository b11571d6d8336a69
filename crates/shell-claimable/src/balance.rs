use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use shell_core::error::ShellError;
use shell_core::types::{Amount, Hash256, PubKey};
use shell_crypto::hash::sha256_concat;

use crate::predicate::ClaimPredicate;

/// Evidence supplied with a claim attempt. Currently hash preimages only;
/// time conditions are judged from the chain height.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProof {
    pub preimages: Vec<Vec<u8>>,
}

/// A party entitled to claim, provided its predicate holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claimant {
    pub destination: PubKey,
    pub predicate: ClaimPredicate,
}

/// An on-chain escrow redeemable by any listed claimant that satisfies its
/// predicate. Created once; destroyed atomically on a successful claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimableBalance {
    pub id: Hash256,
    pub amount: Amount,
    pub claimants: Vec<Claimant>,
    pub create_height: u32,
    pub creator: PubKey,
}

/// Process-wide claimable-balance state. Single writer per logical
/// transaction; readers take the shared lock.
#[derive(Default)]
pub struct ClaimableRegistry {
    balances: RwLock<HashMap<Hash256, ClaimableBalance>>,
}

impl ClaimableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a claimable balance.
    ///
    /// `nonce` is a caller-supplied uniqueness hint folded into the ID
    /// (`SHA256(creator ∥ amount_le64 ∥ nonce_le64)`); an explicit nonce
    /// keeps IDs deterministic under test.
    pub fn create(
        &self,
        creator: PubKey,
        amount: Amount,
        claimants: Vec<Claimant>,
        create_height: u32,
        nonce: u64,
    ) -> Result<Hash256, ShellError> {
        if amount == 0 {
            return Err(ShellError::ZeroClaimableAmount);
        }
        if claimants.is_empty() {
            return Err(ShellError::NoClaimants);
        }
        for claimant in &claimants {
            if claimant.destination.is_null() {
                return Err(ShellError::NullDestination);
            }
            claimant.predicate.validate()?;
        }

        let id = sha256_concat(&[
            creator.as_bytes(),
            &amount.to_le_bytes(),
            &nonce.to_le_bytes(),
        ]);

        let mut balances = self.balances.write().unwrap_or_else(|e| e.into_inner());
        balances.insert(
            id,
            ClaimableBalance {
                id,
                amount,
                claimants,
                create_height,
                creator,
            },
        );
        info!(balance = %id, amount, "claimable balance created");
        Ok(id)
    }

    /// Attempt a claim. The first listed claimant whose destination matches
    /// `claimer` and whose predicate evaluates true wins; the balance is
    /// removed and returned for payout. Anything else is `NoValidClaim`.
    pub fn claim(
        &self,
        balance_id: &Hash256,
        claimer: &PubKey,
        proof: &ClaimProof,
        current_height: u32,
    ) -> Result<ClaimableBalance, ShellError> {
        let mut balances = self.balances.write().unwrap_or_else(|e| e.into_inner());
        let balance = balances
            .get(balance_id)
            .ok_or_else(|| ShellError::ClaimableNotFound(balance_id.to_hex()))?;

        let entitled = balance.claimants.iter().any(|c| {
            c.destination == *claimer && c.predicate.evaluate(proof, current_height)
        });
        if !entitled {
            return Err(ShellError::NoValidClaim);
        }

        // Remove-and-return keeps creation → destruction atomic under the
        // single write lock.
        let claimed = balances.remove(balance_id).expect("checked above");
        info!(balance = %balance_id, amount = claimed.amount, "claimable balance claimed");
        Ok(claimed)
    }

    pub fn get(&self, balance_id: &Hash256) -> Option<ClaimableBalance> {
        let balances = self.balances.read().unwrap_or_else(|e| e.into_inner());
        balances.get(balance_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.balances
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shell_crypto::hash::sha256;

    fn pk(tag: u8) -> PubKey {
        let mut b = [0u8; 33];
        b[0] = 0x02;
        b[1] = tag;
        PubKey::from_bytes(b)
    }

    fn single_claimant(dest: PubKey, predicate: ClaimPredicate) -> Vec<Claimant> {
        vec![Claimant {
            destination: dest,
            predicate,
        }]
    }

    #[test]
    fn create_validates_inputs() {
        let registry = ClaimableRegistry::new();
        assert_eq!(
            registry
                .create(pk(1), 0, single_claimant(pk(2), ClaimPredicate::Unconditional), 0, 1)
                .unwrap_err(),
            ShellError::ZeroClaimableAmount
        );
        assert_eq!(
            registry.create(pk(1), 10, vec![], 0, 1).unwrap_err(),
            ShellError::NoClaimants
        );
        assert_eq!(
            registry
                .create(
                    pk(1),
                    10,
                    single_claimant(PubKey::from_bytes([0; 33]), ClaimPredicate::Unconditional),
                    0,
                    1
                )
                .unwrap_err(),
            ShellError::NullDestination
        );
    }

    #[test]
    fn id_is_deterministic_in_nonce() {
        let registry = ClaimableRegistry::new();
        let claimants = single_claimant(pk(2), ClaimPredicate::Unconditional);
        let a = registry
            .create(pk(1), 10, claimants.clone(), 0, 42)
            .unwrap();
        let b = registry.create(pk(1), 10, claimants, 0, 43).unwrap();
        assert_ne!(a, b);
        assert_eq!(
            a,
            sha256_concat(&[pk(1).as_bytes(), &10u64.to_le_bytes(), &42u64.to_le_bytes()])
        );
    }

    #[test]
    fn hash_preimage_claim_round_trip() {
        let registry = ClaimableRegistry::new();
        let dest = pk(2);
        let id = registry
            .create(
                pk(1),
                5_000,
                single_claimant(dest, ClaimPredicate::HashPreimage(sha256(b"secret"))),
                100,
                1,
            )
            .unwrap();

        // Empty proof fails and leaves the balance in place.
        assert_eq!(
            registry
                .claim(&id, &dest, &ClaimProof::default(), 200)
                .unwrap_err(),
            ShellError::NoValidClaim
        );
        assert!(registry.get(&id).is_some());

        let proof = ClaimProof {
            preimages: vec![b"secret".to_vec()],
        };
        let claimed = registry.claim(&id, &dest, &proof, 200).unwrap();
        assert_eq!(claimed.amount, 5_000);

        // Destroyed atomically: a second claim sees NotFound.
        assert!(matches!(
            registry.claim(&id, &dest, &proof, 200).unwrap_err(),
            ShellError::ClaimableNotFound(_)
        ));
    }

    #[test]
    fn wrong_claimer_rejected() {
        let registry = ClaimableRegistry::new();
        let id = registry
            .create(
                pk(1),
                10,
                single_claimant(pk(2), ClaimPredicate::Unconditional),
                0,
                1,
            )
            .unwrap();
        assert_eq!(
            registry
                .claim(&id, &pk(3), &ClaimProof::default(), 0)
                .unwrap_err(),
            ShellError::NoValidClaim
        );
    }

    #[test]
    fn first_matching_claimant_wins() {
        let registry = ClaimableRegistry::new();
        let dest = pk(2);
        // Same destination twice: a time-locked entry first, then an
        // unconditional fallback.
        let claimants = vec![
            Claimant {
                destination: dest,
                predicate: ClaimPredicate::AfterTime(i64::MAX),
            },
            Claimant {
                destination: dest,
                predicate: ClaimPredicate::Unconditional,
            },
        ];
        let id = registry.create(pk(1), 10, claimants, 0, 1).unwrap();
        // First entry never matures, second carries the claim.
        assert!(registry.claim(&id, &dest, &ClaimProof::default(), 5).is_ok());
    }

    #[test]
    fn time_gated_claim_respects_height() {
        let registry = ClaimableRegistry::new();
        let dest = pk(2);
        // Matures at chain time 300 × 1000.
        let id = registry
            .create(
                pk(1),
                10,
                single_claimant(dest, ClaimPredicate::AfterTime(300_000)),
                0,
                1,
            )
            .unwrap();
        assert_eq!(
            registry
                .claim(&id, &dest, &ClaimProof::default(), 999)
                .unwrap_err(),
            ShellError::NoValidClaim
        );
        assert!(registry
            .claim(&id, &dest, &ClaimProof::default(), 1_000)
            .is_ok());
    }

    #[test]
    fn invalid_predicate_rejected_at_create() {
        let registry = ClaimableRegistry::new();
        let bad = ClaimPredicate::And(vec![ClaimPredicate::Unconditional]);
        assert_eq!(
            registry
                .create(pk(1), 10, single_claimant(pk(2), bad), 0, 1)
                .unwrap_err(),
            ShellError::PredicateArity { min: 2, got: 1 }
        );
    }
}
