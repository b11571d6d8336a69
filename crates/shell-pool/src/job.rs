//! Job management.
//!
//! One background task polls the upstream node and republishes fresh
//! templates as mining jobs with mobile-specific fields. The current job
//! lives in a `watch` channel: replacement is an atomic swap, reads are
//! lock-free, and every connection observes new jobs through its own
//! receiver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use shell_crypto::hash::sha256;
use shell_rpc::{BlockTemplate, TemplateSource};

/// Per-device work sizing pushed with each job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSize {
    pub search_space: u64,
    pub npu_iterations: u32,
    pub cache_size: u64,
}

impl Default for WorkSize {
    fn default() -> Self {
        // Mid-range defaults; overridden per device class.
        Self {
            search_space: 524_288,
            npu_iterations: 150,
            cache_size: 2 * 1024 * 1024,
        }
    }
}

/// A published mining job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MiningJob {
    pub id: String,
    pub height: u64,
    /// Previous block hash, hex.
    pub previous_hash: String,
    pub coinbase_value: u64,
    /// Network target, hex, big-endian.
    pub target: String,
    pub mobile_difficulty: f64,
    /// NPU seed material, hex.
    pub npu_work: String,
    /// Thermal target (°C) for mobile workers.
    pub thermal_target: f32,
    pub work_size: WorkSize,
}

impl MiningJob {
    pub fn from_template(template: &BlockTemplate, seq: u64, mobile_difficulty: f64) -> Self {
        let npu_seed = sha256(
            &[
                template.prev_block.as_bytes(),
                template.height.to_le_bytes().as_slice(),
            ]
            .concat(),
        );
        Self {
            id: format!("{seq:08x}"),
            height: template.height,
            previous_hash: template.prev_block.clone(),
            coinbase_value: template.coinbase_value,
            target: template.target.clone(),
            mobile_difficulty,
            npu_work: hex::encode(npu_seed),
            thermal_target: 45.0,
            work_size: WorkSize::default(),
        }
    }

    /// `mining.notify` params:
    /// `[job_id, prev_hash, coinbase1, coinbase2, merkle_branches,
    ///   nversion, nbits, clean_jobs, mobile]`.
    pub fn notify_params(&self, work_size: WorkSize, clean_jobs: bool) -> serde_json::Value {
        json!([
            self.id,
            self.previous_hash,
            hex::encode(self.height.to_le_bytes()),
            hex::encode(self.coinbase_value.to_le_bytes()),
            [],
            "00000001",
            "1d00ffff",
            clean_jobs,
            {
                "thermal_target": self.thermal_target,
                "npu_work": self.npu_work,
                "work_size": work_size,
            }
        ])
    }
}

/// Owns the current-job reference and the monotonic job sequence.
pub struct JobManager {
    current: watch::Sender<Option<Arc<MiningJob>>>,
    seq: AtomicU64,
    base_difficulty: f64,
}

impl JobManager {
    pub fn new(base_difficulty: f64) -> Arc<Self> {
        let (current, _) = watch::channel(None);
        Arc::new(Self {
            current,
            seq: AtomicU64::new(1),
            base_difficulty,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<MiningJob>>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<Arc<MiningJob>> {
        self.current.borrow().clone()
    }

    /// Atomically replace the advertised job.
    pub fn publish(&self, template: &BlockTemplate) -> Arc<MiningJob> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let job = Arc::new(MiningJob::from_template(template, seq, self.base_difficulty));
        info!(job = %job.id, height = job.height, "new job published");
        let _ = self.current.send(Some(Arc::clone(&job)));
        job
    }

    /// Background poller: fetch a template every `refresh_secs`, publish
    /// when the chain tip moved. Fetch errors are logged and retried.
    pub fn spawn_poller(
        self: &Arc<Self>,
        source: Arc<dyn TemplateSource>,
        refresh_secs: u64,
        mut quit: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut last_prev: Option<String> = None;
            loop {
                match source.fetch_template().await {
                    Ok(template) => {
                        if last_prev.as_deref() != Some(template.prev_block.as_str()) {
                            last_prev = Some(template.prev_block.clone());
                            manager.publish(&template);
                        }
                    }
                    Err(e) => warn!(error = %e, "template poll failed"),
                }
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(refresh_secs)) => {}
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
