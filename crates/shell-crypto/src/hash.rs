use sha2::{Digest, Sha256};

use shell_core::types::Hash256;

/// SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256(SHA-256(data)), the identifier hash used throughout the chain.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// SHA-256 over the concatenation of several byte slices.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    Hash256::from_bytes(hasher.finalize().into())
}
