//! Share parsing and validation.
//!
//! Validation order is contractual: structural hex checks, the duplicate
//! table, job match, ntime window, thermal band, then the MobileX hash
//! against the pool target. A share that also clears the network target is
//! handed back as a block candidate for upstream submission.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use shell_core::constants::{
    MAX_RECENT_SHARES, NTIME_MAX_FUTURE_SECS, NTIME_MAX_PAST_SECS, SHARE_TTL_SECS,
};
use shell_core::header::BlockHeader;
use shell_core::types::Hash256;
use shell_crypto::hash::double_sha256;
use shell_miner::SeedManager;
use shell_mobilex::{
    difficulty_to_target, meets_target, MobileXHasher, MobileXParams, RandomxVm, ThermalPolicy,
};

use crate::error::PoolError;
use crate::job::MiningJob;

// ── Share ────────────────────────────────────────────────────────────────────

/// A parsed `mining.submit` payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Share {
    pub client_id: u64,
    pub worker_name: String,
    pub job_id: String,
    pub extranonce2: String,
    pub ntime: String,
    pub nonce: String,
    pub thermal_proof: String,
    pub difficulty: f64,
    pub submitted_at: i64,
}

impl Share {
    /// Parse the submit 6-tuple
    /// `[worker_name, job_id, extranonce2, ntime, nonce, thermal_proof]`
    /// with exact hex widths 8/8/8/16.
    pub fn from_params(
        client_id: u64,
        difficulty: f64,
        params: &Value,
        now: i64,
    ) -> Result<Self, PoolError> {
        let arr = params.as_array().ok_or(PoolError::MalformedShareField {
            field: "params",
            expected: 6,
        })?;
        let field = |i: usize, name: &'static str| -> Result<String, PoolError> {
            arr.get(i)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(PoolError::MalformedShareField {
                    field: name,
                    expected: 0,
                })
        };
        let share = Self {
            client_id,
            worker_name: field(0, "worker_name")?,
            job_id: field(1, "job_id")?,
            extranonce2: field(2, "extranonce2")?,
            ntime: field(3, "ntime")?,
            nonce: field(4, "nonce")?,
            thermal_proof: field(5, "thermal_proof")?,
            difficulty,
            submitted_at: now,
        };
        check_hex("extranonce2", &share.extranonce2, 8)?;
        check_hex("ntime", &share.ntime, 8)?;
        check_hex("nonce", &share.nonce, 8)?;
        check_hex("thermal_proof", &share.thermal_proof, 16)?;
        Ok(share)
    }

    pub fn ntime_value(&self) -> u32 {
        u32::from_str_radix(&self.ntime, 16).unwrap_or(0)
    }

    pub fn nonce_value(&self) -> u32 {
        u32::from_str_radix(&self.nonce, 16).unwrap_or(0)
    }

    pub fn thermal_value(&self) -> u64 {
        u64::from_str_radix(&self.thermal_proof, 16).unwrap_or(0)
    }

    fn dedup_key(&self) -> ShareKey {
        (
            self.worker_name.clone(),
            self.job_id.clone(),
            self.extranonce2.clone(),
            self.ntime.clone(),
            self.nonce.clone(),
        )
    }
}

fn check_hex(field: &'static str, s: &str, expected: usize) -> Result<(), PoolError> {
    if s.len() != expected || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PoolError::MalformedShareField { field, expected });
    }
    Ok(())
}

// ── Duplicate table ──────────────────────────────────────────────────────────

type ShareKey = (String, String, String, String, String);

/// Rolling duplicate table. Entries expire after `SHARE_TTL_SECS`; the
/// table is pruned of expired entries once it exceeds `MAX_RECENT_SHARES`.
/// Unexpired entries are never evicted.
#[derive(Default)]
pub struct RecentShareTable {
    entries: HashMap<ShareKey, i64>,
}

impl RecentShareTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a share; fails if the same 5-tuple arrived within the TTL.
    pub fn check_and_insert(&mut self, share: &Share, now: i64) -> Result<(), PoolError> {
        let key = share.dedup_key();
        if let Some(seen_at) = self.entries.get(&key) {
            if now - seen_at < SHARE_TTL_SECS {
                return Err(PoolError::DuplicateShare);
            }
        }
        self.entries.insert(key, now);
        if self.entries.len() > MAX_RECENT_SHARES {
            self.entries.retain(|_, at| now - *at < SHARE_TTL_SECS);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Validator ────────────────────────────────────────────────────────────────

/// Outcome of a successful share validation.
#[derive(Debug)]
pub struct ShareOutcome {
    pub hash: [u8; 32],
    /// Present when the share also clears the network target: the solved
    /// header to submit upstream.
    pub block_candidate: Option<BlockHeader>,
}

/// Validates shares with the MobileX verification path. The RandomX cache
/// is keyed to the job height through the shared seed schedule, so pool
/// and miners always hash under the same seed.
pub struct ShareValidator {
    seeds: SeedManager,
    recent: Mutex<RecentShareTable>,
    thermal_policy: ThermalPolicy,
    thermal_compliance: bool,
}

impl ShareValidator {
    pub fn new(seeds: SeedManager, thermal_compliance: bool) -> Self {
        Self {
            seeds,
            recent: Mutex::new(RecentShareTable::new()),
            thermal_policy: ThermalPolicy::default(),
            thermal_compliance,
        }
    }

    /// Reconstruct the tentative header a share commits to.
    pub fn build_header(job: &MiningJob, extranonce1: &str, share: &Share) -> BlockHeader {
        let merkle_seed = [
            extranonce1.as_bytes(),
            share.extranonce2.as_bytes(),
            job.id.as_bytes(),
        ]
        .concat();
        BlockHeader {
            version: 1,
            prev_block: Hash256::from_hex(&job.previous_hash).unwrap_or(Hash256::ZERO),
            merkle_root: Hash256::from_bytes(double_sha256(&merkle_seed)),
            timestamp: share.ntime_value(),
            bits: 0x1d00_ffff,
            nonce: share.nonce_value(),
            thermal_proof: share.thermal_value(),
        }
    }

    pub fn validate(
        &self,
        share: &Share,
        job: &MiningJob,
        extranonce1: &str,
        now: i64,
    ) -> Result<ShareOutcome, PoolError> {
        // 2. Duplicate detection (structural checks ran at parse).
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .check_and_insert(share, now)?;

        // 3. Must reference the advertised job.
        if share.job_id != job.id {
            return Err(PoolError::StaleJob(share.job_id.clone()));
        }

        // 4. ntime window.
        let ntime = share.ntime_value() as i64;
        if ntime < now - NTIME_MAX_PAST_SECS || ntime > now + NTIME_MAX_FUTURE_SECS {
            return Err(PoolError::NtimeOutOfRange);
        }

        // 5. Tentative header and thermal band.
        let header = Self::build_header(job, extranonce1, share);
        if self.thermal_compliance && self.thermal_policy.validate(header.thermal_proof).is_err()
        {
            return Err(PoolError::ThermalRejected);
        }

        // 6. MobileX hash against pool target, then network target.
        let cache = self
            .seeds
            .cache_for_height(job.height, None)
            .map_err(|e| PoolError::ConfigInvalid(e.to_string()))?;
        let hasher = MobileXHasher::new(
            RandomxVm::new(cache),
            MobileXParams {
                npu_interval: job.work_size.npu_iterations,
                thermal: self.thermal_policy,
            },
        );
        let hash = hasher.hash_header(&header);

        let pool_target = difficulty_to_target(share.difficulty);
        if !meets_target(&hash, &pool_target) {
            return Err(PoolError::AboveTarget);
        }

        let network_target = Hash256::from_hex(&job.target)
            .map(|h| *h.as_bytes())
            .unwrap_or([0u8; 32]);
        let block_candidate = meets_target(&hash, &network_target).then_some(header);
        if block_candidate.is_some() {
            debug!(job = %job.id, worker = %share.worker_name, "share is a block candidate");
        }
        Ok(ShareOutcome {
            hash,
            block_candidate,
        })
    }
}
