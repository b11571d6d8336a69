//! shell-settlement
//!
//! The boundary between on-chain finality and external messaging:
//! settlement proofs (a cryptographic attestation that a transaction is
//! irrevocably included at a given depth) and the ISO 20022 envelope
//! mapping used to notify correspondent systems.

pub mod iso20022;
pub mod proof;

pub use iso20022::{IsoEnvelope, IsoMessageType};
pub use proof::SettlementProof;
