//! shell-crypto
//!
//! Curve and commitment primitives for Shell Reserve: SHA-256 helpers,
//! secp256k1 ECDSA keys, and the Pedersen commitment scheme used by
//! confidential amounts. All point/scalar arithmetic is delegated to the
//! `k256` crate, which is constant-time with respect to secret scalars.

pub mod hash;
pub mod keys;
pub mod pedersen;

pub use hash::{double_sha256, sha256};
pub use keys::{verify_signature, Keypair};
pub use pedersen::{
    verify_confidential_balance, BlindingFactor, PedersenCommitment, COMMITMENT_SIZE,
};
