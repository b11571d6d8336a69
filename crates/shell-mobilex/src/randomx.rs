//! Portable RandomX stand-in.
//!
//! The real RandomX primitive is an external collaborator; consensus only
//! assumes a pure function `randomx_hash(seed, input) → 32 bytes`. This
//! module provides a deterministic, memory-touching realization with the
//! same shape: a seed-expanded cache plus a VM whose reads walk the cache
//! data-dependently. It is NOT the reference RandomX — it exists so every
//! layer above (MobileX, miner, pool, tests) exercises the exact
//! seed/cache/VM lifecycle the real primitive requires.

use std::sync::Arc;

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Keccak256, Shake256};

use crate::error::PowError;

/// Default light-mode cache size (2 MiB).
pub const RANDOMX_LIGHT_CACHE_BYTES: usize = 2 * 1024 * 1024;

/// Mixing rounds per hash.
const VM_ROUNDS: usize = 8;

/// Seed-expanded scratch memory shared read-only by all VMs.
#[derive(Debug)]
pub struct RandomxCache {
    seed: [u8; 32],
    blob: Vec<u8>,
}

impl RandomxCache {
    /// Expand `seed` into `size_bytes` of cache via SHAKE-256. Allocation
    /// failure is a resource error surfaced to the subsystem owner.
    pub fn new(seed: [u8; 32], size_bytes: usize) -> Result<Self, PowError> {
        if size_bytes == 0 || size_bytes % 64 != 0 {
            return Err(PowError::BadCacheSize(size_bytes));
        }
        let mut hasher = Shake256::default();
        hasher.update(b"shell.randomx.cache.v1");
        hasher.update(&seed);
        let mut reader = hasher.finalize_xof();
        let mut blob = vec![0u8; size_bytes];
        reader.read(&mut blob);
        Ok(Self { seed, blob })
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    pub fn size_bytes(&self) -> usize {
        self.blob.len()
    }

    #[inline]
    fn word(&self, index: usize) -> u64 {
        let offset = (index % (self.blob.len() / 8)) * 8;
        u64::from_le_bytes(
            self.blob[offset..offset + 8]
                .try_into()
                .expect("8-byte slice"),
        )
    }
}

/// A hashing VM borrowing a cache. Cheap to clone; the cache is shared.
#[derive(Clone)]
pub struct RandomxVm {
    cache: Arc<RandomxCache>,
}

impl RandomxVm {
    pub fn new(cache: Arc<RandomxCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<RandomxCache> {
        &self.cache
    }

    /// `randomx_hash(seed, input)`: Keccak-256 absorb, then `VM_ROUNDS` of
    /// data-dependent cache reads folded into the state, Keccak between
    /// rounds.
    pub fn hash(&self, input: &[u8]) -> [u8; 32] {
        let mut state: [u8; 32] = Keccak256::new()
            .chain_update(b"shell.randomx.v1")
            .chain_update(self.cache.seed)
            .chain_update(input)
            .finalize()
            .into();

        for round in 0..VM_ROUNDS {
            // Read address is taken from the evolving state: the cache walk
            // cannot be precomputed without the cache.
            let addr = u64::from_le_bytes(state[0..8].try_into().expect("8-byte slice"));
            let fetched = self.cache.word(addr as usize ^ round);

            let mut mixed = [0u8; 40];
            mixed[..32].copy_from_slice(&state);
            mixed[32..].copy_from_slice(&fetched.to_le_bytes());
            state = Keccak256::digest(mixed).into();
        }
        state
    }
}

/// Deterministic seed for a rotation boundary, used until the block hash
/// at that height is known: `SHA256(rotation_height_le64 ∥ genesis_hash)`.
pub fn rotation_seed(rotation_height: u64, genesis_hash: &[u8; 32]) -> [u8; 32] {
    use sha2::{Digest as _, Sha256};
    let mut hasher = Sha256::new();
    sha2::Digest::update(&mut hasher, rotation_height.to_le_bytes());
    sha2::Digest::update(&mut hasher, genesis_hash);
    hasher.finalize().into()
}
