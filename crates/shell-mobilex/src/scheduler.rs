//! Heterogeneous big/little work distribution.
//!
//! Mobile SoCs pair performance ("big") cores with efficiency ("little")
//! cores. The scheduler spawns one pinned worker per core slot, feeds work
//! through MPMC queues (one per class, so big cores drain first), and
//! exposes a monotone intensity dial that bounds how many workers are
//! active without touching the queues. Thermal throttling decisions live
//! in the mining orchestrator; intensity is just the knob it turns.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

use crate::error::PowError;

/// Core class of a worker slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreClass {
    Big,
    Little,
}

/// Worker counts per class.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub big_cores: usize,
    pub little_cores: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let total = num_cpus::get().max(2);
        let big = (total / 2).max(1);
        Self {
            big_cores: big,
            little_cores: total - big,
        }
    }
}

impl SchedulerConfig {
    pub fn total(&self) -> usize {
        self.big_cores + self.little_cores
    }
}

/// Metrics snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerMetrics {
    pub active_cores: usize,
    pub queue_depth: usize,
    pub big_hashes: u64,
    pub little_hashes: u64,
}

/// Work handler invoked by every worker for each item it consumes.
pub type WorkHandler = Arc<dyn Fn(&[u8], CoreClass) + Send + Sync>;

struct Shared {
    quit: AtomicBool,
    /// How many worker slots are currently allowed to consume.
    active: AtomicUsize,
    big_hashes: AtomicU64,
    little_hashes: AtomicU64,
}

pub struct HeterogeneousScheduler {
    config: SchedulerConfig,
    shared: Arc<Shared>,
    big_tx: Sender<Vec<u8>>,
    big_rx: Receiver<Vec<u8>>,
    little_tx: Sender<Vec<u8>>,
    little_rx: Receiver<Vec<u8>>,
    workers: Vec<JoinHandle<()>>,
}

impl HeterogeneousScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (big_tx, big_rx) = unbounded();
        let (little_tx, little_rx) = unbounded();
        Self {
            config,
            shared: Arc::new(Shared {
                quit: AtomicBool::new(false),
                active: AtomicUsize::new(config.total()),
                big_hashes: AtomicU64::new(0),
                little_hashes: AtomicU64::new(0),
            }),
            big_tx,
            big_rx,
            little_tx,
            little_rx,
            workers: Vec::new(),
        }
    }

    /// Spawn `big + little` workers, each best-effort pinned to a core of
    /// its class and handed the shared work handler.
    pub fn start(&mut self, handler: WorkHandler) -> Result<(), PowError> {
        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        for slot in 0..self.config.total() {
            let class = if slot < self.config.big_cores {
                CoreClass::Big
            } else {
                CoreClass::Little
            };
            let rx = match class {
                CoreClass::Big => self.big_rx.clone(),
                CoreClass::Little => self.little_rx.clone(),
            };
            let shared = Arc::clone(&self.shared);
            let handler = Arc::clone(&handler);
            let core_id = core_ids.get(slot).copied();

            let handle = std::thread::Builder::new()
                .name(format!("mobilex-{}-{slot}", class_label(class)))
                .spawn(move || {
                    if let Some(id) = core_id {
                        // Best-effort; pinning failures are harmless.
                        let _ = core_affinity::set_for_current(id);
                    }
                    worker_loop(slot, class, rx, shared, handler);
                })
                .map_err(|e| PowError::SpawnFailed(e.to_string()))?;
            self.workers.push(handle);
        }
        info!(
            big = self.config.big_cores,
            little = self.config.little_cores,
            "heterogeneous scheduler started"
        );
        Ok(())
    }

    /// Enqueue a work item. Big-class first until its queue saturates,
    /// then spill to the little class.
    pub fn distribute_mining(&self, work: Vec<u8>) -> Result<(), PowError> {
        if self.workers.is_empty() || self.shared.quit.load(Ordering::Acquire) {
            return Err(PowError::SchedulerStopped);
        }
        let big_saturated = self.big_tx.len() >= self.config.big_cores.max(1) * 2;
        if big_saturated && self.config.little_cores > 0 {
            self.little_tx.send(work).map_err(|_| PowError::SchedulerStopped)
        } else {
            self.big_tx.send(work).map_err(|_| PowError::SchedulerStopped)
        }
    }

    /// Shift one worker slot out of the active set (bounded at zero).
    pub fn reduce_intensity(&self) {
        let _ = self
            .shared
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| a.checked_sub(1));
    }

    /// Shift one worker slot back in (bounded at `big + little`).
    pub fn increase_intensity(&self) {
        let total = self.config.total();
        let _ = self
            .shared
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| {
                (a < total).then_some(a + 1)
            });
    }

    pub fn active_workers(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn get_metrics(&self) -> SchedulerMetrics {
        SchedulerMetrics {
            active_cores: self.active_workers(),
            queue_depth: self.big_tx.len() + self.little_tx.len(),
            big_hashes: self.shared.big_hashes.load(Ordering::Relaxed),
            little_hashes: self.shared.little_hashes.load(Ordering::Relaxed),
        }
    }

    /// Bitfield of worker slots: bit `i` set when slot `i` is active.
    pub fn get_core_state(&self) -> u64 {
        let active = self.active_workers().min(64);
        if active == 64 {
            u64::MAX
        } else {
            (1u64 << active) - 1
        }
    }

    /// Stop accepting work, drain the queues to quiescence, and join every
    /// worker.
    pub fn shutdown(&mut self) {
        self.shared.quit.store(true, Ordering::Release);
        // Wake anything parked on an intensity gate so it can observe quit.
        self.shared
            .active
            .store(self.config.total(), Ordering::Release);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!("heterogeneous scheduler stopped");
    }
}

impl Drop for HeterogeneousScheduler {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

fn class_label(class: CoreClass) -> &'static str {
    match class {
        CoreClass::Big => "big",
        CoreClass::Little => "little",
    }
}

fn worker_loop(
    slot: usize,
    class: CoreClass,
    rx: Receiver<Vec<u8>>,
    shared: Arc<Shared>,
    handler: WorkHandler,
) {
    debug!(slot, class = class_label(class), "worker up");
    loop {
        let quitting = shared.quit.load(Ordering::Acquire);

        // Intensity gate: parked slots consume nothing, so the queue keeps
        // its items for the active set. Ignored during drain.
        if !quitting && slot >= shared.active.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(20));
            continue;
        }

        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(work) => {
                handler(&work, class);
                let counter = match class {
                    CoreClass::Big => &shared.big_hashes,
                    CoreClass::Little => &shared.little_hashes,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                // Queue momentarily empty; exit once shutdown began.
                if quitting {
                    break;
                }
            }
        }
    }
    debug!(slot, "worker drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn two_by_two() -> SchedulerConfig {
        SchedulerConfig {
            big_cores: 2,
            little_cores: 2,
        }
    }

    #[test]
    fn processes_every_item_exactly_once() {
        let processed = Arc::new(AtomicUsize::new(0));
        let mut scheduler = HeterogeneousScheduler::new(two_by_two());
        let counter = Arc::clone(&processed);
        scheduler
            .start(Arc::new(move |_work, _class| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        for i in 0..200u32 {
            scheduler.distribute_mining(i.to_le_bytes().to_vec()).unwrap();
        }
        scheduler.shutdown();
        assert_eq!(processed.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn intensity_is_monotone_and_bounded() {
        let scheduler = HeterogeneousScheduler::new(two_by_two());
        assert_eq!(scheduler.active_workers(), 4);
        for _ in 0..10 {
            scheduler.reduce_intensity();
        }
        assert_eq!(scheduler.active_workers(), 0);
        for _ in 0..10 {
            scheduler.increase_intensity();
        }
        assert_eq!(scheduler.active_workers(), 4);
    }

    #[test]
    fn core_state_tracks_intensity() {
        let scheduler = HeterogeneousScheduler::new(two_by_two());
        assert_eq!(scheduler.get_core_state(), 0b1111);
        scheduler.reduce_intensity();
        assert_eq!(scheduler.get_core_state(), 0b111);
    }

    #[test]
    fn distribute_fails_before_start_and_after_shutdown() {
        let mut scheduler = HeterogeneousScheduler::new(two_by_two());
        assert_eq!(
            scheduler.distribute_mining(vec![1]).unwrap_err(),
            PowError::SchedulerStopped
        );
        scheduler.start(Arc::new(|_, _| {})).unwrap();
        scheduler.distribute_mining(vec![1]).unwrap();
        scheduler.shutdown();
        assert_eq!(
            scheduler.distribute_mining(vec![2]).unwrap_err(),
            PowError::SchedulerStopped
        );
    }

    #[test]
    fn metrics_count_per_class_work() {
        let mut scheduler = HeterogeneousScheduler::new(SchedulerConfig {
            big_cores: 1,
            little_cores: 1,
        });
        scheduler.start(Arc::new(|_, _| {})).unwrap();
        for i in 0..50u32 {
            scheduler.distribute_mining(i.to_le_bytes().to_vec()).unwrap();
        }
        scheduler.shutdown();
        let metrics = scheduler.get_metrics();
        assert_eq!(metrics.big_hashes + metrics.little_hashes, 50);
        assert_eq!(metrics.queue_depth, 0);
    }

    #[test]
    fn drain_completes_with_reduced_intensity() {
        // Shutdown must finish even if intensity was dialed to zero first.
        let mut scheduler = HeterogeneousScheduler::new(two_by_two());
        scheduler.start(Arc::new(|_, _| {})).unwrap();
        for _ in 0..4 {
            scheduler.reduce_intensity();
        }
        for i in 0..20u32 {
            scheduler.distribute_mining(i.to_le_bytes().to_vec()).unwrap();
        }
        scheduler.shutdown();
        let metrics = scheduler.get_metrics();
        assert_eq!(metrics.big_hashes + metrics.little_hashes, 20);
    }
}
