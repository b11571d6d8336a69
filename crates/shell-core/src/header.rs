use serde::{Deserialize, Serialize};

use crate::error::ShellError;
use crate::types::Hash256;

/// Standard header portion of the wire format (before the thermal proof).
pub const HEADER_BASE_SIZE: usize = 80;

/// Full wire size: 80-byte standard header plus 8-byte thermal proof.
pub const HEADER_WIRE_SIZE: usize = 88;

/// Block header with the MobileX thermal attestation.
///
/// The proof-of-work preimage is the standard 80-byte serialization; the
/// thermal proof is produced *during* hashing and therefore rides after it
/// on the wire, never inside the hashed bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    /// Encoded thermal attestation: `(clock_mhz << 32) | cycle_count_lo`.
    pub thermal_proof: u64,
}

impl BlockHeader {
    /// The 80-byte proof-of-work preimage. All integers little-endian.
    pub fn pow_bytes(&self) -> [u8; HEADER_BASE_SIZE] {
        let mut out = [0u8; HEADER_BASE_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Full 88-byte wire serialization (header ∥ thermal_proof LE).
    pub fn wire_bytes(&self) -> [u8; HEADER_WIRE_SIZE] {
        let mut out = [0u8; HEADER_WIRE_SIZE];
        out[..HEADER_BASE_SIZE].copy_from_slice(&self.pow_bytes());
        out[HEADER_BASE_SIZE..].copy_from_slice(&self.thermal_proof.to_le_bytes());
        out
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, ShellError> {
        if bytes.len() != HEADER_WIRE_SIZE {
            return Err(ShellError::WireFormat(format!(
                "header must be {HEADER_WIRE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut prev = [0u8; 32];
        prev.copy_from_slice(&bytes[4..36]);
        let mut merkle = [0u8; 32];
        merkle.copy_from_slice(&bytes[36..68]);

        let le32 = |s: &[u8]| u32::from_le_bytes([s[0], s[1], s[2], s[3]]);
        Ok(Self {
            version: le32(&bytes[0..4]),
            prev_block: Hash256::from_bytes(prev),
            merkle_root: Hash256::from_bytes(merkle),
            timestamp: le32(&bytes[68..72]),
            bits: le32(&bytes[72..76]),
            nonce: le32(&bytes[76..80]),
            thermal_proof: u64::from_le_bytes([
                bytes[80], bytes[81], bytes[82], bytes[83], bytes[84], bytes[85], bytes[86],
                bytes[87],
            ]),
        })
    }

    /// Copy of this header with a different nonce (mining inner loop).
    pub fn with_nonce(&self, nonce: u32) -> Self {
        let mut h = *self;
        h.nonce = nonce;
        h
    }
}
