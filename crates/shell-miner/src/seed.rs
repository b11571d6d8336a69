use std::sync::{Arc, Mutex};

use tracing::info;

use shell_core::types::Hash256;
use shell_mobilex::randomx::rotation_seed;
use shell_mobilex::{PowError, RandomxCache};

/// Owns the RandomX cache across seed rotations.
///
/// The seed changes every `rotation_blocks` blocks. Until the block hash
/// at a rotation boundary is available the seed is derived from the
/// boundary height and the genesis hash; once known, the boundary block's
/// hash takes over. Re-initialization is single-threaded behind the slot
/// mutex: a caller that hits a rotation blocks every other caller until
/// the new cache is ready, which is the global barrier the miner needs —
/// nothing can hash under the old cache once rotation begins.
pub struct SeedManager {
    genesis: Hash256,
    rotation_blocks: u64,
    cache_bytes: usize,
    slot: Mutex<Option<(u64, Arc<RandomxCache>)>>,
}

impl SeedManager {
    pub fn new(genesis: Hash256, rotation_blocks: u64, cache_bytes: usize) -> Self {
        Self {
            genesis,
            rotation_blocks: rotation_blocks.max(1),
            cache_bytes,
            slot: Mutex::new(None),
        }
    }

    /// The rotation boundary governing `height`.
    pub fn rotation_height(&self, height: u64) -> u64 {
        height / self.rotation_blocks * self.rotation_blocks
    }

    /// Seed bytes for `height`: the boundary block's hash when known,
    /// otherwise the deterministic genesis-derived fallback.
    pub fn seed_for(&self, height: u64, boundary_hash: Option<Hash256>) -> [u8; 32] {
        match boundary_hash {
            Some(hash) => *hash.as_bytes(),
            None => rotation_seed(self.rotation_height(height), self.genesis.as_bytes()),
        }
    }

    /// Cache for mining at `height`, reinitializing on rotation
    /// boundaries. May block for the duration of a cache build.
    pub fn cache_for_height(
        &self,
        height: u64,
        boundary_hash: Option<Hash256>,
    ) -> Result<Arc<RandomxCache>, PowError> {
        let rotation = self.rotation_height(height);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((cached_rotation, cache)) = slot.as_ref() {
            if *cached_rotation == rotation {
                return Ok(Arc::clone(cache));
            }
        }
        info!(rotation, "rotating randomx seed; rebuilding cache");
        let seed = self.seed_for(height, boundary_hash);
        let cache = Arc::new(RandomxCache::new(seed, self.cache_bytes)?);
        *slot = Some((rotation, Arc::clone(&cache)));
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SeedManager {
        SeedManager::new(Hash256::from_bytes([9; 32]), 2_048, 64 * 1024)
    }

    #[test]
    fn rotation_heights_floor_to_boundary() {
        let m = manager();
        assert_eq!(m.rotation_height(0), 0);
        assert_eq!(m.rotation_height(2_047), 0);
        assert_eq!(m.rotation_height(2_048), 2_048);
        assert_eq!(m.rotation_height(5_000), 4_096);
    }

    #[test]
    fn cache_is_reused_within_a_rotation() {
        let m = manager();
        let a = m.cache_for_height(10, None).unwrap();
        let b = m.cache_for_height(2_047, None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn cache_is_rebuilt_across_rotations() {
        let m = manager();
        let a = m.cache_for_height(10, None).unwrap();
        let b = m.cache_for_height(2_048, None).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.seed(), b.seed());
    }

    #[test]
    fn boundary_hash_overrides_fallback_seed() {
        let m = manager();
        let fallback = m.seed_for(2_048, None);
        let pinned = m.seed_for(2_048, Some(Hash256::from_bytes([0xAB; 32])));
        assert_ne!(fallback, pinned);
        assert_eq!(pinned, [0xAB; 32]);
    }
}
