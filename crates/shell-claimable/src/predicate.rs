use serde::{Deserialize, Serialize};

use shell_core::constants::{BLOCK_SECONDS, MAX_PREDICATE_DEPTH};
use shell_core::error::ShellError;
use shell_crypto::hash::sha256;

use crate::balance::ClaimProof;

// Predicate encoding tags (wire contract).
const TAG_UNCONDITIONAL: u8 = 0;
const TAG_BEFORE_TIME: u8 = 1;
const TAG_AFTER_TIME: u8 = 2;
const TAG_HASH_PREIMAGE: u8 = 3;
const TAG_AND: u8 = 4;
const TAG_OR: u8 = 5;
const TAG_NOT: u8 = 6;

/// A recursive claim condition.
///
/// Time predicates compare against `height · BLOCK_SECONDS`, the chain's
/// approximate clock, so evaluation never depends on wall-clock
/// attestations. Composite nodes own their children; trees deeper than
/// `MAX_PREDICATE_DEPTH` are rejected at validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimPredicate {
    /// Always satisfied.
    Unconditional,
    /// Chain time is strictly before the Unix timestamp.
    BeforeTime(i64),
    /// Chain time is at or after the Unix timestamp.
    AfterTime(i64),
    /// The proof carries a preimage of this SHA-256 hash.
    HashPreimage([u8; 32]),
    /// All children hold (at least two).
    And(Vec<ClaimPredicate>),
    /// Any child holds (at least two).
    Or(Vec<ClaimPredicate>),
    /// The child does not hold.
    Not(Box<ClaimPredicate>),
}

impl ClaimPredicate {
    /// Structural validation: composite arity and bounded depth.
    pub fn validate(&self) -> Result<(), ShellError> {
        self.validate_at(1)
    }

    fn validate_at(&self, depth: usize) -> Result<(), ShellError> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(ShellError::PredicateTooDeep {
                max: MAX_PREDICATE_DEPTH,
            });
        }
        match self {
            ClaimPredicate::Unconditional
            | ClaimPredicate::BeforeTime(_)
            | ClaimPredicate::AfterTime(_)
            | ClaimPredicate::HashPreimage(_) => Ok(()),
            ClaimPredicate::And(children) | ClaimPredicate::Or(children) => {
                if children.len() < 2 {
                    return Err(ShellError::PredicateArity {
                        min: 2,
                        got: children.len(),
                    });
                }
                children.iter().try_for_each(|c| c.validate_at(depth + 1))
            }
            ClaimPredicate::Not(child) => child.validate_at(depth + 1),
        }
    }

    /// Deterministic, short-circuiting evaluation.
    pub fn evaluate(&self, proof: &ClaimProof, current_height: u32) -> bool {
        let chain_time = current_height as i64 * BLOCK_SECONDS;
        match self {
            ClaimPredicate::Unconditional => true,
            ClaimPredicate::BeforeTime(t) => chain_time < *t,
            ClaimPredicate::AfterTime(t) => chain_time >= *t,
            ClaimPredicate::HashPreimage(h) => {
                proof.preimages.iter().any(|p| sha256(p) == *h)
            }
            ClaimPredicate::And(children) => {
                children.iter().all(|c| c.evaluate(proof, current_height))
            }
            ClaimPredicate::Or(children) => {
                children.iter().any(|c| c.evaluate(proof, current_height))
            }
            ClaimPredicate::Not(child) => !child.evaluate(proof, current_height),
        }
    }

    // ── Wire encoding ────────────────────────────────────────────────────────

    /// Tag byte, variant payload; composites carry a u8 child count then
    /// the recursively encoded children.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            ClaimPredicate::Unconditional => out.push(TAG_UNCONDITIONAL),
            ClaimPredicate::BeforeTime(t) => {
                out.push(TAG_BEFORE_TIME);
                out.extend_from_slice(&t.to_le_bytes());
            }
            ClaimPredicate::AfterTime(t) => {
                out.push(TAG_AFTER_TIME);
                out.extend_from_slice(&t.to_le_bytes());
            }
            ClaimPredicate::HashPreimage(h) => {
                out.push(TAG_HASH_PREIMAGE);
                out.extend_from_slice(h);
            }
            ClaimPredicate::And(children) => {
                out.push(TAG_AND);
                out.push(children.len() as u8);
                children.iter().for_each(|c| c.encode_into(out));
            }
            ClaimPredicate::Or(children) => {
                out.push(TAG_OR);
                out.push(children.len() as u8);
                children.iter().for_each(|c| c.encode_into(out));
            }
            ClaimPredicate::Not(child) => {
                out.push(TAG_NOT);
                out.push(1);
                child.encode_into(out);
            }
        }
    }

    /// Decode a predicate from its wire form; the whole input must be
    /// consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, ShellError> {
        let mut cursor = 0usize;
        let predicate = Self::decode_at(bytes, &mut cursor)?;
        if cursor != bytes.len() {
            return Err(ShellError::PredicateEncoding);
        }
        predicate.validate()?;
        Ok(predicate)
    }

    fn decode_at(bytes: &[u8], cursor: &mut usize) -> Result<Self, ShellError> {
        let tag = *bytes.get(*cursor).ok_or(ShellError::PredicateEncoding)?;
        *cursor += 1;
        match tag {
            TAG_UNCONDITIONAL => Ok(ClaimPredicate::Unconditional),
            TAG_BEFORE_TIME | TAG_AFTER_TIME => {
                let end = cursor.checked_add(8).ok_or(ShellError::PredicateEncoding)?;
                let slice = bytes.get(*cursor..end).ok_or(ShellError::PredicateEncoding)?;
                let t = i64::from_le_bytes(slice.try_into().expect("8-byte slice"));
                *cursor = end;
                Ok(if tag == TAG_BEFORE_TIME {
                    ClaimPredicate::BeforeTime(t)
                } else {
                    ClaimPredicate::AfterTime(t)
                })
            }
            TAG_HASH_PREIMAGE => {
                let end = cursor.checked_add(32).ok_or(ShellError::PredicateEncoding)?;
                let slice = bytes.get(*cursor..end).ok_or(ShellError::PredicateEncoding)?;
                let mut h = [0u8; 32];
                h.copy_from_slice(slice);
                *cursor = end;
                Ok(ClaimPredicate::HashPreimage(h))
            }
            TAG_AND | TAG_OR => {
                let count = *bytes.get(*cursor).ok_or(ShellError::PredicateEncoding)?;
                *cursor += 1;
                let children = (0..count)
                    .map(|_| Self::decode_at(bytes, cursor))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if tag == TAG_AND {
                    ClaimPredicate::And(children)
                } else {
                    ClaimPredicate::Or(children)
                })
            }
            TAG_NOT => {
                let count = *bytes.get(*cursor).ok_or(ShellError::PredicateEncoding)?;
                if count != 1 {
                    return Err(ShellError::PredicateEncoding);
                }
                *cursor += 1;
                Ok(ClaimPredicate::Not(Box::new(Self::decode_at(
                    bytes, cursor,
                )?)))
            }
            _ => Err(ShellError::PredicateEncoding),
        }
    }
}
