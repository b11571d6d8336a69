//! Pedersen commitments on secp256k1.
//!
//! A commitment to value `v` under blinding `r` is `C = v·H + r·G`, where
//! `G` is the curve base point and `H` is the value generator, derived
//! deterministically so that nobody knows its discrete log with respect to
//! `G`. Commitments are additively homomorphic:
//! `open(C₁ + C₂) = (v₁ + v₂, r₁ + r₂ mod n)`.

use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar, U256};
use once_cell::sync::Lazy;

use shell_core::error::ShellError;
use shell_core::types::Hash256;

use crate::hash::{double_sha256, sha256};

/// Compressed SEC1 encoding length.
pub const COMMITMENT_SIZE: usize = 33;

/// Domain-separation tag for the value generator derivation.
const VALUE_GENERATOR_TAG: &[u8] = b"Shell Reserve Value Generator v1.0";

/// The value generator `H = hash_to_scalar(tag) · G`, memoized for the
/// process lifetime. Derivation through a hashed scalar guarantees the
/// discrete log of `H` base `G` is unknown.
static VALUE_GENERATOR: Lazy<ProjectivePoint> =
    Lazy::new(|| ProjectivePoint::GENERATOR * hash_to_scalar(VALUE_GENERATOR_TAG));

/// SHA-256 reduced modulo the curve order `n`.
fn hash_to_scalar(data: &[u8]) -> Scalar {
    let digest = sha256(data);
    <Scalar as Reduce<U256>>::reduce_bytes(&digest.into())
}

/// The process-wide value generator `H`.
pub fn value_generator() -> ProjectivePoint {
    *VALUE_GENERATOR
}

// ── BlindingFactor ───────────────────────────────────────────────────────────

/// A uniformly random scalar in `[1, n)` hiding the committed value.
#[derive(Clone, PartialEq)]
pub struct BlindingFactor {
    scalar: Scalar,
}

impl BlindingFactor {
    /// Uniform random non-zero scalar.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let scalar = Scalar::random(&mut rng);
            if !bool::from(scalar.is_zero()) {
                return Self { scalar };
            }
        }
    }

    /// Parse a 32-byte big-endian scalar. Rejects zero and values at or
    /// above the curve order.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, ShellError> {
        let maybe = Scalar::from_repr(bytes.into());
        let scalar: Scalar = Option::from(maybe).ok_or(ShellError::InvalidBlindingFactor)?;
        if bool::from(scalar.is_zero()) {
            return Err(ShellError::InvalidBlindingFactor);
        }
        Ok(Self { scalar })
    }

    /// The zero scalar. Only meaningful for explicit-amount commitments
    /// such as the fee term in a balance proof; `from_bytes` never yields it.
    pub fn zero() -> Self {
        Self { scalar: Scalar::ZERO }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.scalar.to_bytes().into()
    }

    /// `(self + other) mod n`.
    pub fn add(&self, other: &BlindingFactor) -> BlindingFactor {
        BlindingFactor { scalar: self.scalar + other.scalar }
    }

    /// `(self − other) mod n`.
    pub fn sub(&self, other: &BlindingFactor) -> BlindingFactor {
        BlindingFactor { scalar: self.scalar - other.scalar }
    }

    fn scalar(&self) -> &Scalar {
        &self.scalar
    }
}

impl Drop for BlindingFactor {
    fn drop(&mut self) {
        // Overwrite secret scalar material before release.
        self.scalar = Scalar::ZERO;
    }
}

impl std::fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlindingFactor(…)")
    }
}

// ── PedersenCommitment ───────────────────────────────────────────────────────

/// A curve point committing to a hidden amount.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PedersenCommitment {
    point: ProjectivePoint,
}

impl PedersenCommitment {
    /// `C = v·H + r·G`.
    pub fn commit(value: u64, blinding: &BlindingFactor) -> Self {
        let point = value_generator() * Scalar::from(value)
            + ProjectivePoint::GENERATOR * *blinding.scalar();
        Self { point }
    }

    /// Recompute and compare: does this commitment open to `(value, blinding)`?
    pub fn verify_open(&self, value: u64, blinding: &BlindingFactor) -> bool {
        Self::commit(value, blinding) == *self
    }

    /// Homomorphic addition: `open(C₁ + C₂) = (v₁ + v₂, r₁ + r₂)`.
    pub fn add(&self, other: &PedersenCommitment) -> PedersenCommitment {
        PedersenCommitment { point: self.point + other.point }
    }

    /// Homomorphic subtraction (adds the negated point).
    pub fn sub(&self, other: &PedersenCommitment) -> PedersenCommitment {
        PedersenCommitment { point: self.point - other.point }
    }

    /// Compressed 33-byte SEC1 encoding. The identity point (the degenerate
    /// zero commitment) encodes as 33 zero bytes.
    pub fn to_bytes(&self) -> [u8; COMMITMENT_SIZE] {
        if bool::from(self.point.is_identity()) {
            return [0u8; COMMITMENT_SIZE];
        }
        let encoded = self.point.to_affine().to_encoded_point(true);
        let mut out = [0u8; COMMITMENT_SIZE];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Parse a compressed encoding; fails with `InvalidCommitment` unless
    /// the bytes name an on-curve point (or the all-zero identity encoding).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ShellError> {
        if bytes.len() != COMMITMENT_SIZE {
            return Err(ShellError::InvalidCommitment);
        }
        if bytes.iter().all(|b| *b == 0) {
            return Ok(Self { point: ProjectivePoint::IDENTITY });
        }
        let encoded =
            EncodedPoint::from_bytes(bytes).map_err(|_| ShellError::InvalidCommitment)?;
        let affine: AffinePoint = Option::from(AffinePoint::from_encoded_point(&encoded))
            .ok_or(ShellError::InvalidCommitment)?;
        Ok(Self { point: ProjectivePoint::from(affine) })
    }

    /// Double-SHA-256 of the compressed encoding: the on-chain identifier.
    pub fn hash(&self) -> Hash256 {
        Hash256::from_bytes(double_sha256(&self.to_bytes()))
    }

    fn point(&self) -> &ProjectivePoint {
        &self.point
    }
}

// ── Homomorphic balance check ────────────────────────────────────────────────

/// Verify the confidential-transaction balance equation:
/// `ΣC_in − ΣC_out − commit(fee, 0) = commit(0, excess)`, i.e. the
/// difference opens to zero value under the sender-revealed excess blinding.
pub fn verify_confidential_balance(
    inputs: &[PedersenCommitment],
    outputs: &[PedersenCommitment],
    fee: u64,
    excess: &BlindingFactor,
) -> Result<(), ShellError> {
    let sum = |cs: &[PedersenCommitment]| {
        cs.iter()
            .fold(ProjectivePoint::IDENTITY, |acc, c| acc + c.point())
    };
    let fee_term = PedersenCommitment::commit(fee, &BlindingFactor::zero());
    let difference = sum(inputs) - sum(outputs) - fee_term.point();
    let expected = ProjectivePoint::GENERATOR * *excess.scalar();
    if difference == expected {
        Ok(())
    } else {
        Err(ShellError::BalanceProofInvalid)
    }
}
