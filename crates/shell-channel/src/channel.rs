use serde::{Deserialize, Serialize};

use shell_core::types::{Hash256, OutPoint, PubKey, Signature};
use shell_crypto::hash::sha256_concat;

/// Derive a channel ID from the participants and the funding outpoint:
/// `SHA256(alice ∥ bob ∥ funding_txid ∥ funding_vout_le32)`.
///
/// Participant order is part of the identity. Callers supply a canonical
/// order (lexicographic by compressed pubkey) to obtain a stable ID.
pub fn derive_channel_id(alice: &PubKey, bob: &PubKey, funding: &OutPoint) -> Hash256 {
    sha256_concat(&[
        alice.as_bytes(),
        bob.as_bytes(),
        funding.txid.as_bytes(),
        &funding.vout.to_le_bytes(),
    ])
}

/// On-chain channel state.
///
/// Invariants: `balances[0] + balances[1] == capacity` at all times;
/// `nonce` strictly increases across valid updates; once `is_open` drops
/// to false no further transitions are permitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub channel_id: Hash256,
    pub participants: [PubKey; 2],
    pub capacity: u64,
    pub balances: [u64; 2],
    pub nonce: u64,
    /// Block height after which either side may force-close unilaterally.
    pub expiry: u32,
    pub is_open: bool,
}

/// A co-signed off-chain state transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    pub channel_id: Hash256,
    pub balances: [u64; 2],
    pub nonce: u64,
    /// One slot per participant, in channel participant order.
    pub signatures: [Option<Signature>; 2],
}

impl ChannelUpdate {
    /// Canonical signing payload, part of the wire contract:
    /// `channel_id ∥ balances[0]_le64 ∥ balances[1]_le64 ∥ nonce_le64`.
    pub fn signing_bytes(&self) -> [u8; 56] {
        let mut out = [0u8; 56];
        out[0..32].copy_from_slice(self.channel_id.as_bytes());
        out[32..40].copy_from_slice(&self.balances[0].to_le_bytes());
        out[40..48].copy_from_slice(&self.balances[1].to_le_bytes());
        out[48..56].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(tag: u8) -> PubKey {
        let mut b = [0u8; 33];
        b[0] = 0x02;
        b[1] = tag;
        PubKey::from_bytes(b)
    }

    #[test]
    fn channel_id_depends_on_participant_order() {
        let funding = OutPoint {
            txid: Hash256::from_bytes([9; 32]),
            vout: 1,
        };
        let ab = derive_channel_id(&pk(1), &pk(2), &funding);
        let ba = derive_channel_id(&pk(2), &pk(1), &funding);
        assert_ne!(ab, ba);
    }

    #[test]
    fn channel_id_depends_on_funding_outpoint() {
        let txid = Hash256::from_bytes([9; 32]);
        let a = derive_channel_id(&pk(1), &pk(2), &OutPoint { txid, vout: 0 });
        let b = derive_channel_id(&pk(1), &pk(2), &OutPoint { txid, vout: 1 });
        assert_ne!(a, b);
    }

    #[test]
    fn signing_bytes_layout() {
        let update = ChannelUpdate {
            channel_id: Hash256::from_bytes([0xAA; 32]),
            balances: [0x0102, 0x0304],
            nonce: 7,
            signatures: [None, None],
        };
        let bytes = update.signing_bytes();
        assert_eq!(&bytes[0..32], &[0xAA; 32]);
        assert_eq!(&bytes[32..40], &0x0102u64.to_le_bytes());
        assert_eq!(&bytes[40..48], &0x0304u64.to_le_bytes());
        assert_eq!(&bytes[48..56], &7u64.to_le_bytes());
    }
}
