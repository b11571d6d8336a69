//! Thermal attestation.
//!
//! A thermal proof is a 64-bit field in the block header encoding the
//! effective clock (MHz, high 32 bits) and the low half of the cycle
//! counter observed while hashing. Local validation checks the implied
//! clock against a tolerance band around the per-block target; the
//! consensus layer additionally keeps a rolling window of accepted proofs
//! and flags 3-σ outliers. The window is process-local and deterministic
//! given its contents.

use std::collections::VecDeque;
use std::fs;

use serde::{Deserialize, Serialize};

use shell_core::constants::{
    THERMAL_OUTLIER_SIGMA, THERMAL_TARGET_CLOCK_MHZ, THERMAL_TOLERANCE_PCT, THERMAL_WINDOW_BLOCKS,
};

use crate::error::PowError;

/// Pack `(clock_mhz, cycle_count)` into the header field. Only the low 32
/// bits of the cycle counter survive.
pub fn encode_thermal_proof(clock_mhz: u32, cycle_count: u64) -> u64 {
    ((clock_mhz as u64) << 32) | (cycle_count & 0xFFFF_FFFF)
}

/// Unpack a thermal proof into `(clock_mhz, cycle_count_lo)`.
pub fn decode_thermal_proof(proof: u64) -> (u32, u32) {
    ((proof >> 32) as u32, (proof & 0xFFFF_FFFF) as u32)
}

// ── Local band validation ────────────────────────────────────────────────────

/// Per-block thermal acceptance policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ThermalPolicy {
    /// Target effective clock (MHz) after difficulty scaling.
    pub target_clock_mhz: u32,
    /// Accepted deviation in percent.
    pub tolerance_pct: f64,
}

impl Default for ThermalPolicy {
    fn default() -> Self {
        Self {
            target_clock_mhz: THERMAL_TARGET_CLOCK_MHZ,
            tolerance_pct: THERMAL_TOLERANCE_PCT,
        }
    }
}

impl ThermalPolicy {
    /// Scale the target clock for a block's difficulty. Harder blocks are
    /// allowed proportionally more headroom, never less than the base.
    pub fn scaled(&self, difficulty_factor: f64) -> Self {
        let factor = difficulty_factor.max(1.0);
        Self {
            target_clock_mhz: (self.target_clock_mhz as f64 * factor) as u32,
            tolerance_pct: self.tolerance_pct,
        }
    }

    /// Check a proof's implied clock against the tolerance band.
    pub fn validate(&self, proof: u64) -> Result<(), PowError> {
        let (clock_mhz, _) = decode_thermal_proof(proof);
        let target = self.target_clock_mhz as f64;
        let tolerance = target * self.tolerance_pct / 100.0;
        let implied = clock_mhz as f64;
        if implied < target - tolerance || implied > target + tolerance {
            return Err(PowError::ThermalOutOfBand {
                implied_mhz: clock_mhz,
                target_mhz: self.target_clock_mhz,
                tolerance_pct: self.tolerance_pct as u32,
            });
        }
        Ok(())
    }
}

// ── Rolling statistical window ───────────────────────────────────────────────

/// Rolling distribution of accepted proof clocks. Bounded at
/// `THERMAL_WINDOW_BLOCKS`; outliers are flagged at
/// `THERMAL_OUTLIER_SIGMA` standard deviations from the window mean.
#[derive(Debug, Default)]
pub struct ThermalWindow {
    clocks: VecDeque<f64>,
}

impl ThermalWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, proof: u64) {
        let (clock_mhz, _) = decode_thermal_proof(proof);
        if self.clocks.len() == THERMAL_WINDOW_BLOCKS {
            self.clocks.pop_front();
        }
        self.clocks.push_back(clock_mhz as f64);
    }

    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.clocks.is_empty() {
            return 0.0;
        }
        self.clocks.iter().sum::<f64>() / self.clocks.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        if self.clocks.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .clocks
            .iter()
            .map(|c| (c - mean) * (c - mean))
            .sum::<f64>()
            / self.clocks.len() as f64;
        variance.sqrt()
    }

    /// Would this proof be a statistical outlier against the window?
    /// Windows too small to estimate a deviation never flag.
    pub fn is_outlier(&self, proof: u64) -> bool {
        if self.clocks.len() < 2 {
            return false;
        }
        let sigma = self.std_dev();
        if sigma == 0.0 {
            return false;
        }
        let (clock_mhz, _) = decode_thermal_proof(proof);
        ((clock_mhz as f64) - self.mean()).abs() > THERMAL_OUTLIER_SIGMA * sigma
    }
}

// ── Miner-side telemetry ─────────────────────────────────────────────────────

/// Best-effort hardware telemetry used by the mining side to populate
/// thermal proofs and throttle decisions. Sysfs reads fail on most
/// virtualized hosts; a load-derived synthetic estimate keeps the values
/// usable there.
#[derive(Debug, Clone, Copy)]
pub struct ThermalTelemetry {
    pub clock_mhz: u32,
    pub temperature_celsius: f32,
    /// True when the temperature was estimated rather than measured.
    pub synthetic: bool,
}

impl ThermalTelemetry {
    pub fn capture() -> Self {
        let clock_mhz = read_cpu_frequency_mhz().unwrap_or(THERMAL_TARGET_CLOCK_MHZ);
        match read_temperature_celsius() {
            Some(temperature_celsius) => Self {
                clock_mhz,
                temperature_celsius,
                synthetic: false,
            },
            None => Self {
                clock_mhz,
                temperature_celsius: synthetic_temperature(),
                synthetic: true,
            },
        }
    }
}

fn read_cpu_frequency_mhz() -> Option<u32> {
    fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq")
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
        .map(|khz| khz / 1000)
}

fn read_temperature_celsius() -> Option<f32> {
    for path in [
        "/sys/class/thermal/thermal_zone0/temp",
        "/sys/class/hwmon/hwmon0/temp1_input",
    ] {
        if let Some(milli) = fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse::<f32>().ok())
        {
            if milli > 0.0 {
                return Some(milli / 1000.0);
            }
        }
    }
    None
}

fn synthetic_temperature() -> f32 {
    let load = fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|s| s.split_whitespace().next()?.parse::<f32>().ok())
        .unwrap_or(0.0);
    40.0 + (load * 20.0).min(50.0)
}
