//! Device profiling and per-class work tuning.

use serde::{Deserialize, Serialize};

use crate::job::WorkSize;

/// Rough device tiers recognized from `mining.set_device_info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Flagship,
    MidRange,
    Budget,
}

/// Client-reported device capabilities.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub device_class: String,
    #[serde(default)]
    pub soc_model: String,
    #[serde(default)]
    pub thermal_cap_celsius: f32,
    #[serde(default)]
    pub npu_capable: bool,
}

impl DeviceClass {
    /// Classify a reported SoC model string.
    pub fn from_soc(soc: &str) -> Self {
        let soc = soc.to_ascii_lowercase();
        const FLAGSHIP: [&str; 3] = ["snapdragon 8 gen 3", "a17 pro", "tensor g3"];
        const MID_RANGE: [&str; 3] = ["snapdragon 7 gen 3", "a16", "tensor g2"];
        if FLAGSHIP.iter().any(|m| soc.contains(m)) {
            DeviceClass::Flagship
        } else if MID_RANGE.iter().any(|m| soc.contains(m)) {
            DeviceClass::MidRange
        } else {
            DeviceClass::Budget
        }
    }

    /// Work-size override applied to the next job for this device.
    pub fn work_size(&self) -> WorkSize {
        match self {
            DeviceClass::Flagship => WorkSize {
                search_space: 1_048_576,
                npu_iterations: 100,
                cache_size: 3 * 1024 * 1024,
            },
            DeviceClass::MidRange => WorkSize {
                search_space: 524_288,
                npu_iterations: 150,
                cache_size: 2 * 1024 * 1024,
            },
            DeviceClass::Budget => WorkSize {
                search_space: 262_144,
                npu_iterations: 200,
                cache_size: 1024 * 1024,
            },
        }
    }

    /// Budget devices start at half the base difficulty.
    pub fn difficulty_multiplier(&self) -> f64 {
        match self {
            DeviceClass::Budget => 0.5,
            _ => 1.0,
        }
    }
}
