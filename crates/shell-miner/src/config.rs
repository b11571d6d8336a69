use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use shell_core::constants::NPU_INTERVAL_DEFAULT;
use shell_mobilex::{RANDOMX_LIGHT_CACHE_BYTES, SchedulerConfig};

/// Which proof-of-work the miner drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgoMode {
    /// Plain RandomX hashing only.
    Randomx,
    /// The full MobileX pipeline only.
    Mobilex,
    /// Race both; first solution wins.
    Dual,
}

/// Thermal operating limits for the mining host.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ThermalLimits {
    /// Reduce intensity above this core temperature.
    pub throttle_start_celsius: f32,
    /// Restore intensity below this.
    pub throttle_stop_celsius: f32,
    pub optimal_celsius: f32,
    pub tolerance_pct: f64,
}

impl Default for ThermalLimits {
    fn default() -> Self {
        Self {
            throttle_start_celsius: 75.0,
            throttle_stop_celsius: 65.0,
            optimal_celsius: 55.0,
            tolerance_pct: 5.0,
        }
    }
}

/// Named intensity presets with per-preset core counts and thermal caps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityLevel {
    Light,
    Medium,
    Full,
}

impl IntensityLevel {
    /// Core counts and thermal cap for this preset, bounded by the
    /// configured totals.
    pub fn preset(&self, big: usize, little: usize) -> (usize, usize, f32) {
        match self {
            IntensityLevel::Light => (1.min(big), little.min(1), 60.0),
            IntensityLevel::Medium => ((big / 2).max(1), little, 70.0),
            IntensityLevel::Full => (big, little, 80.0),
        }
    }
}

/// Miner configuration surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinerConfig {
    /// RandomX cache size in bytes (light mode) or dataset size (full).
    pub randomx_cache_bytes: usize,
    pub full_dataset: bool,
    pub npu_interval: u32,
    /// Optional path to a vendor NPU model blob; absent means the portable
    /// integer pipeline runs on CPU.
    pub npu_model_path: Option<PathBuf>,
    pub thermal: ThermalLimits,
    pub big_cores: usize,
    pub little_cores: usize,
    pub intensity: IntensityLevel,
    pub algo: AlgoMode,
}

impl Default for MinerConfig {
    fn default() -> Self {
        let cores = SchedulerConfig::default();
        Self {
            randomx_cache_bytes: RANDOMX_LIGHT_CACHE_BYTES,
            full_dataset: false,
            npu_interval: NPU_INTERVAL_DEFAULT,
            npu_model_path: None,
            thermal: ThermalLimits::default(),
            big_cores: cores.big_cores,
            little_cores: cores.little_cores,
            intensity: IntensityLevel::Medium,
            algo: AlgoMode::Dual,
        }
    }
}

impl MinerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.randomx_cache_bytes == 0 || self.randomx_cache_bytes % 64 != 0 {
            return Err(format!(
                "randomx_cache_bytes must be a positive multiple of 64, got {}",
                self.randomx_cache_bytes
            ));
        }
        if self.big_cores == 0 {
            return Err("at least one big core is required".into());
        }
        if self.thermal.throttle_stop_celsius >= self.thermal.throttle_start_celsius {
            return Err("throttle_stop must be below throttle_start".into());
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let (big, little, _cap) = self.intensity.preset(self.big_cores, self.little_cores);
        SchedulerConfig {
            big_cores: big,
            little_cores: little,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(MinerConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_cache_size_rejected() {
        let mut config = MinerConfig::default();
        config.randomx_cache_bytes = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_thermal_band_rejected() {
        let mut config = MinerConfig::default();
        config.thermal.throttle_stop_celsius = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn presets_bound_core_counts() {
        assert_eq!(IntensityLevel::Light.preset(4, 4).0, 1);
        assert_eq!(IntensityLevel::Medium.preset(4, 4).0, 2);
        assert_eq!(IntensityLevel::Full.preset(4, 4), (4, 4, 80.0));
    }

    #[test]
    fn config_json_round_trip() {
        let config = MinerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: MinerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.algo, AlgoMode::Dual);
        assert_eq!(back.randomx_cache_bytes, config.randomx_cache_bytes);
    }
}
