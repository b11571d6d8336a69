use serde::{Deserialize, Serialize};

use shell_core::constants::{
    CONNECTION_TIMEOUT_SECS, INITIAL_MOBILE_DIFFICULTY, JOB_REFRESH_SECS, MAX_MOBILE_DIFFICULTY,
    MIN_MOBILE_DIFFICULTY, SHARE_TTL_SECS,
};

use crate::error::PoolError;

/// Pool operator configuration surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Listen endpoint, `host:port`.
    pub endpoint: String,
    /// Operator fee in percent of block rewards.
    pub pool_fee_percent: f64,
    /// Minimum accrued balance (kria) before a payout is cut.
    pub payout_threshold: u64,
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    pub initial_difficulty: f64,
    /// Seconds between upstream template polls.
    pub job_refresh_secs: u64,
    /// Enforce the thermal-proof band on submitted shares.
    pub thermal_compliance: bool,
    /// Reward multiplier for NPU-capable devices.
    pub npu_bonus_multiplier: f64,
    /// Recent-share duplicate window (seconds).
    pub share_expiry_secs: i64,
    /// Per-connection read deadline (seconds).
    pub connection_timeout_secs: u64,
    /// RandomX cache size used by share validation.
    #[serde(default = "default_cache_bytes")]
    pub randomx_cache_bytes: usize,
}

fn default_cache_bytes() -> usize {
    shell_mobilex::RANDOMX_LIGHT_CACHE_BYTES
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            endpoint: "0.0.0.0:3333".into(),
            pool_fee_percent: 1.0,
            payout_threshold: 10 * 100_000_000,
            min_difficulty: MIN_MOBILE_DIFFICULTY,
            max_difficulty: MAX_MOBILE_DIFFICULTY,
            initial_difficulty: INITIAL_MOBILE_DIFFICULTY,
            job_refresh_secs: JOB_REFRESH_SECS,
            thermal_compliance: true,
            npu_bonus_multiplier: 1.1,
            share_expiry_secs: SHARE_TTL_SECS,
            connection_timeout_secs: CONNECTION_TIMEOUT_SECS,
            randomx_cache_bytes: default_cache_bytes(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.endpoint.parse::<std::net::SocketAddr>().is_err() {
            return Err(PoolError::ConfigInvalid(format!(
                "endpoint '{}' is not host:port",
                self.endpoint
            )));
        }
        if !(0.0..=100.0).contains(&self.pool_fee_percent) {
            return Err(PoolError::ConfigInvalid("pool fee must be 0–100%".into()));
        }
        if self.min_difficulty <= 0.0 || self.min_difficulty > self.max_difficulty {
            return Err(PoolError::ConfigInvalid(
                "difficulty bounds must satisfy 0 < min ≤ max".into(),
            ));
        }
        if !(self.min_difficulty..=self.max_difficulty).contains(&self.initial_difficulty) {
            return Err(PoolError::ConfigInvalid(
                "initial difficulty outside bounds".into(),
            ));
        }
        if self.connection_timeout_secs == 0 || self.job_refresh_secs == 0 {
            return Err(PoolError::ConfigInvalid(
                "timeouts must be positive".into(),
            ));
        }
        if self.randomx_cache_bytes == 0 || self.randomx_cache_bytes % 64 != 0 {
            return Err(PoolError::ConfigInvalid(
                "randomx cache size must be a positive multiple of 64".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_endpoint_rejected() {
        let mut config = PoolConfig::default();
        config.endpoint = "not-an-endpoint".into();
        assert!(matches!(
            config.validate(),
            Err(PoolError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn initial_difficulty_must_sit_inside_bounds() {
        let mut config = PoolConfig::default();
        config.initial_difficulty = config.max_difficulty * 2.0;
        assert!(config.validate().is_err());
    }
}
