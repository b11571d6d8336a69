//! shell-claimable
//!
//! Claimable balances: conditional on-chain payments gated by a recursive
//! predicate language. A balance lists one or more claimants, each a
//! destination key paired with a predicate; the first listed claimant whose
//! key matches and whose predicate holds may sweep the balance, which is
//! destroyed atomically on success.

pub mod balance;
pub mod predicate;

pub use balance::{ClaimProof, Claimant, ClaimableBalance, ClaimableRegistry};
pub use predicate::ClaimPredicate;
