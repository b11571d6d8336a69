use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use shell_core::types::{Amount, Hash256, Timestamp};
use shell_crypto::hash::sha256;

use crate::proof::SettlementProof;

/// Supported ISO 20022 message families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsoMessageType {
    /// Customer credit transfer.
    Pacs008,
    /// Financial-institution credit transfer.
    Pacs009,
    /// Payment cancellation request.
    Camt056,
    /// Customer payment initiation.
    Pain001,
}

impl IsoMessageType {
    pub fn tag(&self) -> &'static str {
        match self {
            IsoMessageType::Pacs008 => "pacs.008",
            IsoMessageType::Pacs009 => "pacs.009",
            IsoMessageType::Camt056 => "camt.056",
            IsoMessageType::Pain001 => "pain.001",
        }
    }
}

/// Envelope mapping one settled transaction to external messaging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IsoEnvelope {
    pub message_type: IsoMessageType,
    pub message_id: String,
    pub end_to_end_id: String,
    pub tx_hash: Hash256,
    /// ISO value date, `YYYY-MM-DD` UTC.
    pub value_date: String,
    pub sender_bic: Option<String>,
    pub receiver_bic: Option<String>,
    /// Amount in kria (XSL base units).
    pub amount: Amount,
    /// Attached once finality has been reached; never before.
    pub settlement_proof: Option<SettlementProof>,
}

impl IsoEnvelope {
    /// Build an envelope. IDs derive deterministically from the
    /// transaction hash and timestamp; a non-final proof is dropped.
    pub fn build(
        message_type: IsoMessageType,
        tx_hash: Hash256,
        amount: Amount,
        timestamp: Timestamp,
        sender_bic: Option<String>,
        receiver_bic: Option<String>,
        proof: Option<SettlementProof>,
    ) -> Self {
        let settlement_proof = proof.filter(|p| {
            let keep = p.is_irrevocable;
            if !keep {
                debug!(tx = %tx_hash, "proof not final; envelope sent without it");
            }
            keep
        });
        Self {
            message_type,
            message_id: message_id(&tx_hash, timestamp),
            end_to_end_id: format!("E2E{}", &tx_hash.to_hex()[..16].to_uppercase()),
            tx_hash,
            value_date: value_date(timestamp),
            sender_bic,
            receiver_bic,
            amount,
            settlement_proof,
        }
    }

    /// Whether both BICs (when present) are structurally plausible:
    /// 8 or 11 alphanumeric characters.
    pub fn bics_plausible(&self) -> bool {
        let ok = |bic: &Option<String>| {
            bic.as_deref().map_or(true, |b| {
                (b.len() == 8 || b.len() == 11) && b.chars().all(|c| c.is_ascii_alphanumeric())
            })
        };
        ok(&self.sender_bic) && ok(&self.receiver_bic)
    }
}

fn message_id(tx_hash: &Hash256, timestamp: Timestamp) -> String {
    let digest = sha256(
        &[
            tx_hash.as_bytes().as_slice(),
            timestamp.to_le_bytes().as_slice(),
        ]
        .concat(),
    );
    format!("XSL{}", hex::encode(&digest[..12]).to_uppercase())
}

fn value_date(timestamp: Timestamp) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> Hash256 {
        Hash256::from_bytes([0xCD; 32])
    }

    fn final_proof() -> SettlementProof {
        SettlementProof::generate(
            tx(),
            Hash256::from_bytes([0xEF; 32]),
            840_000,
            6,
            1_900_000_000,
        )
    }

    #[test]
    fn envelope_ids_are_deterministic() {
        let a = IsoEnvelope::build(
            IsoMessageType::Pacs008,
            tx(),
            1_000,
            1_900_000_000,
            None,
            None,
            None,
        );
        let b = IsoEnvelope::build(
            IsoMessageType::Pacs008,
            tx(),
            1_000,
            1_900_000_000,
            None,
            None,
            None,
        );
        assert_eq!(a.message_id, b.message_id);
        assert_eq!(a.end_to_end_id, b.end_to_end_id);
        assert!(a.message_id.starts_with("XSL"));

        let c = IsoEnvelope::build(
            IsoMessageType::Pacs008,
            tx(),
            1_000,
            1_900_000_001,
            None,
            None,
            None,
        );
        assert_ne!(a.message_id, c.message_id);
    }

    #[test]
    fn final_proof_is_attached() {
        let envelope = IsoEnvelope::build(
            IsoMessageType::Pacs009,
            tx(),
            500,
            1_900_000_000,
            Some("SHELUS33".into()),
            Some("SHELGB2LXXX".into()),
            Some(final_proof()),
        );
        assert!(envelope.settlement_proof.is_some());
        assert!(envelope.bics_plausible());
    }

    #[test]
    fn non_final_proof_is_dropped() {
        let mut proof = final_proof();
        proof = SettlementProof::generate(
            proof.tx_hash,
            proof.block_hash,
            proof.block_height,
            3,
            proof.timestamp,
        );
        let envelope = IsoEnvelope::build(
            IsoMessageType::Camt056,
            tx(),
            500,
            1_900_000_000,
            None,
            None,
            Some(proof),
        );
        assert!(envelope.settlement_proof.is_none());
    }

    #[test]
    fn value_date_is_utc_calendar_date() {
        let envelope = IsoEnvelope::build(
            IsoMessageType::Pain001,
            tx(),
            1,
            0,
            None,
            None,
            None,
        );
        assert_eq!(envelope.value_date, "1970-01-01");
    }

    #[test]
    fn malformed_bics_flagged() {
        let envelope = IsoEnvelope::build(
            IsoMessageType::Pacs008,
            tx(),
            1,
            0,
            Some("BAD-BIC!".into()),
            None,
            None,
        );
        assert!(!envelope.bics_plausible());
    }

    #[test]
    fn message_tags_match_wire_names() {
        assert_eq!(IsoMessageType::Pacs008.tag(), "pacs.008");
        assert_eq!(IsoMessageType::Pain001.tag(), "pain.001");
    }
}
