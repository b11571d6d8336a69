use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

/// Period of the rolling hash-rate report.
const REPORT_PERIOD: Duration = Duration::from_secs(10);

/// Rolling hashes-per-second monitor shared by every mining worker.
#[derive(Clone, Default)]
pub struct SpeedMonitor {
    hashes: Arc<AtomicU64>,
    rate_hps: Arc<AtomicU64>,
}

impl SpeedMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `n` hash attempts.
    pub fn record(&self, n: u64) {
        self.hashes.fetch_add(n, Ordering::Relaxed);
    }

    /// Latest computed rate (hashes per second).
    pub fn hashes_per_sec(&self) -> u64 {
        self.rate_hps.load(Ordering::Relaxed)
    }

    /// Drain the attempt counter and fold it into the rate over `secs`.
    pub fn roll(&self, secs: u64) -> u64 {
        let delta = self.hashes.swap(0, Ordering::Relaxed);
        let rate = delta / secs.max(1);
        self.rate_hps.store(rate, Ordering::Relaxed);
        rate
    }

    /// Spawn the 10-second reporting task; exits when `quit` flips.
    pub fn spawn(self, mut quit: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REPORT_PERIOD);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so the first report
            // covers a full period.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let rate = self.roll(REPORT_PERIOD.as_secs());
                        info!(hashes_per_sec = rate, "mining speed");
                    }
                    _ = quit.changed() => {
                        if *quit.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
