//! secp256k1 ECDSA keys.
//!
//! RFC 6979 deterministic nonces via `k256::ecdsa` — no RNG dependency for
//! signing. Secret key material is zeroized on drop.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use zeroize::Zeroize;

use shell_core::types::{PubKey, Signature};

/// A secp256k1 keypair for channel participants, vault keys, and claimants.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Restore from a 32-byte secret. Fails on the zero scalar.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Option<Self> {
        SigningKey::from_bytes((&bytes).into())
            .ok()
            .map(|signing_key| Self { signing_key })
    }

    /// Compressed public key (33 bytes).
    pub fn public_key(&self) -> PubKey {
        let sec1 = self.signing_key.verifying_key().to_sec1_bytes();
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1[..33]);
        PubKey::from_bytes(bytes)
    }

    /// Sign a message (hashed internally with SHA-256, RFC 6979 nonce).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig: EcdsaSignature = self.signing_key.sign(message);
        let bytes: [u8; 64] = sig.to_bytes().into();
        Signature::from_bytes(bytes)
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Verify an ECDSA signature against a compressed public key.
///
/// Returns false (never panics) for malformed keys or signatures, so
/// consensus code can treat any failure uniformly as a bad signature.
pub fn verify_signature(pubkey: &PubKey, message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(pubkey.as_bytes()) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_slice(signature.as_bytes()) else {
        return false;
    };
    verifying_key.verify(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"settlement instruction");
        assert!(verify_signature(&kp.public_key(), b"settlement instruction", &sig));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"message one");
        assert!(!verify_signature(&kp.public_key(), b"message two", &sig));
    }

    #[test]
    fn wrong_key_fails() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let sig = kp.sign(b"payload");
        assert!(!verify_signature(&other.public_key(), b"payload", &sig));
    }

    #[test]
    fn deterministic_signatures() {
        let kp = Keypair::from_secret_bytes([0x42; 32]).unwrap();
        assert_eq!(kp.sign(b"same input"), kp.sign(b"same input"));
    }

    #[test]
    fn secret_round_trip() {
        let kp = Keypair::generate();
        let restored = Keypair::from_secret_bytes(kp.secret_bytes()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn garbage_pubkey_rejected() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"x");
        let bogus = PubKey::from_bytes([0xFF; 33]);
        assert!(!verify_signature(&bogus, b"x", &sig));
    }
}
