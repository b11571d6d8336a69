use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use shell_core::constants::JOB_REFRESH_SECS;
use shell_core::header::BlockHeader;
use shell_core::types::Hash256;
use shell_mobilex::thermal::encode_thermal_proof;
use shell_mobilex::{
    meets_target, HeterogeneousScheduler, MobileXHasher, MobileXParams, RandomxVm,
    ThermalPolicy, ThermalTelemetry,
};
use shell_rpc::{BlockTemplate, TemplateSource};

use crate::config::{AlgoMode, MinerConfig};
use crate::seed::SeedManager;
use crate::speed::SpeedMonitor;

/// Nonces per scheduler work item.
const WORK_RANGE: u32 = 512;

/// Backoff after a failed template fetch.
const FETCH_RETRY: Duration = Duration::from_secs(5);

/// A solve session: one template being worked by the scheduler. Installed
/// in a shared slot the worker handler reads; swapping the slot retires
/// every in-flight work item for the previous session.
struct SolveSession {
    id: u64,
    hasher: MobileXHasher,
    header: BlockHeader,
    target: [u8; 32],
    solved: AtomicBool,
    solution_tx: crossbeam_channel::Sender<BlockHeader>,
    speed: SpeedMonitor,
}

type SessionSlot = Arc<RwLock<Option<Arc<SolveSession>>>>;

/// Top-level mining driver. Worker lifecycle per template:
/// Idle → Fetching → Solving → Submitting → Idle, with the shared quit
/// signal honored at every stage boundary and inside hash loops.
pub struct MiningOrchestrator {
    config: MinerConfig,
    seeds: SeedManager,
    speed: SpeedMonitor,
    quit_tx: watch::Sender<bool>,
    session_slot: SessionSlot,
    session_counter: AtomicU64,
}

impl MiningOrchestrator {
    pub fn new(config: MinerConfig, genesis_hash: Hash256, rotation_blocks: u64) -> Self {
        let seeds = SeedManager::new(genesis_hash, rotation_blocks, config.randomx_cache_bytes);
        let (quit_tx, _) = watch::channel(false);
        Self {
            config,
            seeds,
            speed: SpeedMonitor::new(),
            quit_tx,
            session_slot: Arc::new(RwLock::new(None)),
            session_counter: AtomicU64::new(1),
        }
    }

    pub fn speed(&self) -> &SpeedMonitor {
        &self.speed
    }

    /// Broadcast cancellation. Idempotent; every stage observes it at its
    /// next checkpoint.
    pub fn shutdown(&self) {
        self.quit_tx.send_replace(true);
    }

    /// Main loop: fetch a template, solve it under the configured
    /// algorithm mode, submit, repeat. Fetch and submission failures are
    /// logged and retried; only cancellation ends the loop.
    pub async fn run(&self, source: Arc<dyn TemplateSource>) -> anyhow::Result<()> {
        let mut scheduler = HeterogeneousScheduler::new(self.config.scheduler_config());
        scheduler.start(make_handler(Arc::clone(&self.session_slot)))?;
        let speed_task = self.speed.clone().spawn(self.quit_tx.subscribe());

        let mut quit = self.quit_tx.subscribe();
        info!(algo = ?self.config.algo, "miner running");

        while !*quit.borrow() {
            // ── Fetching ─────────────────────────────────────────────────
            let template = tokio::select! {
                _ = quit.changed() => break,
                result = source.fetch_template() => match result {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(error = %e, "template fetch failed; retrying");
                        tokio::select! {
                            _ = quit.changed() => break,
                            _ = tokio::time::sleep(FETCH_RETRY) => {}
                        }
                        continue;
                    }
                }
            };
            let (target, prev_block) =
                match (template.target_bytes(), template.prev_block_hash()) {
                    (Ok(t), Ok(p)) => (t, p),
                    _ => {
                        warn!(height = template.height, "malformed template; skipping");
                        continue;
                    }
                };

            self.manage_intensity(&scheduler);

            // Seed rotation barrier: cache (re)build blocks the loop, and
            // the new session only ever sees the new cache.
            let cache = match tokio::task::block_in_place(|| {
                self.seeds.cache_for_height(template.height, None)
            }) {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "randomx cache init failed");
                    continue;
                }
            };

            // ── Solving ──────────────────────────────────────────────────
            let header = build_header(&template, prev_block);
            let vm = RandomxVm::new(cache);
            let solved = self
                .solve(&scheduler, vm, header, target, &mut quit)
                .await;

            // ── Submitting ───────────────────────────────────────────────
            if let Some(solution) = solved {
                let block_hex = assemble_block_hex(&solution, &template);
                match source.submit_block(block_hex).await {
                    Ok(()) => info!(height = template.height, nonce = solution.nonce, "block submitted"),
                    Err(e) => warn!(error = %e, "block submission failed; mining continues"),
                }
            }
        }

        scheduler.shutdown();
        self.shutdown();
        let _ = speed_task.await;
        info!("miner stopped");
        Ok(())
    }

    /// Race the configured algorithm arms on one template. Returns the
    /// winning header, or None on cancellation / template refresh.
    async fn solve(
        &self,
        scheduler: &HeterogeneousScheduler,
        vm: RandomxVm,
        header: BlockHeader,
        target: [u8; 32],
        quit: &mut watch::Receiver<bool>,
    ) -> Option<BlockHeader> {
        let (solution_tx, solution_rx) = crossbeam_channel::unbounded();
        let race_quit = Arc::new(AtomicBool::new(false));

        // MobileX arm: install a session and feed nonce ranges through the
        // heterogeneous scheduler.
        let session = if self.config.algo != AlgoMode::Randomx {
            let hasher = MobileXHasher::new(
                vm.clone(),
                MobileXParams {
                    npu_interval: self.config.npu_interval,
                    thermal: ThermalPolicy::default(),
                },
            );
            let session = Arc::new(SolveSession {
                id: self.session_counter.fetch_add(1, Ordering::Relaxed),
                hasher,
                header,
                target,
                solved: AtomicBool::new(false),
                solution_tx: solution_tx.clone(),
                speed: self.speed.clone(),
            });
            *self
                .session_slot
                .write()
                .unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&session));
            Some(session)
        } else {
            None
        };

        // RandomX-only arm: a dedicated blocking worker.
        let randomx_arm = (self.config.algo != AlgoMode::Mobilex).then(|| {
            let vm = vm.clone();
            let race_quit = Arc::clone(&race_quit);
            let solution_tx = solution_tx.clone();
            let speed = self.speed.clone();
            tokio::task::spawn_blocking(move || {
                solve_randomx(vm, header, target, race_quit, solution_tx, speed)
            })
        });

        let deadline = Instant::now() + Duration::from_secs(JOB_REFRESH_SECS);
        let mut next_nonce: u32 = 0;
        let result = loop {
            if let Ok(solution) = solution_rx.try_recv() {
                debug!(nonce = solution.nonce, "solution found");
                break Some(solution);
            }
            if *quit.borrow() || Instant::now() >= deadline {
                break None;
            }
            // Keep the scheduler fed a couple of ranges ahead per worker.
            if let Some(session) = &session {
                while scheduler.get_metrics().queue_depth < scheduler.active_workers() + 2 {
                    let work = encode_work(session.id, next_nonce, WORK_RANGE);
                    if scheduler.distribute_mining(work).is_err() {
                        break;
                    }
                    next_nonce = next_nonce.wrapping_add(WORK_RANGE);
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        // The winner cancels the loser; both cancellations are idempotent
        // and neither depends on anyone draining a channel.
        race_quit.store(true, Ordering::Release);
        if let Some(session) = &session {
            session.solved.store(true, Ordering::Release);
        }
        *self
            .session_slot
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
        if let Some(arm) = randomx_arm {
            let _ = arm.await;
        }
        result
    }

    /// Thermal-driven intensity: one step down above throttle-start, one
    /// step back up below throttle-stop.
    fn manage_intensity(&self, scheduler: &HeterogeneousScheduler) {
        let telemetry = ThermalTelemetry::capture();
        if telemetry.temperature_celsius > self.config.thermal.throttle_start_celsius {
            scheduler.reduce_intensity();
            info!(
                temperature = telemetry.temperature_celsius,
                active = scheduler.active_workers(),
                "thermal throttle: intensity reduced"
            );
        } else if telemetry.temperature_celsius < self.config.thermal.throttle_stop_celsius {
            scheduler.increase_intensity();
        }
    }
}

/// Scheduler work handler: hash a nonce range for the installed session.
/// Items for a retired session are dropped unprocessed.
fn make_handler(slot: SessionSlot) -> Arc<dyn Fn(&[u8], shell_mobilex::CoreClass) + Send + Sync> {
    Arc::new(move |work, _class| {
        let Some((id, start, count)) = decode_work(work) else {
            return;
        };
        let session = {
            let guard = slot.read().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(s) if s.id == id => Arc::clone(s),
                _ => return,
            }
        };
        let mut header = session.header;
        let mut attempts = 0u64;
        for nonce in start..start.wrapping_add(count) {
            if nonce % 64 == 0 && session.solved.load(Ordering::Acquire) {
                break;
            }
            header.nonce = nonce;
            attempts += 1;
            let digest = session.hasher.hash_header(&header);
            if meets_target(&digest, &session.target) {
                let telemetry = ThermalTelemetry::capture();
                header.thermal_proof =
                    encode_thermal_proof(telemetry.clock_mhz, nonce as u64);
                session.solved.store(true, Ordering::Release);
                let _ = session.solution_tx.send(header);
                break;
            }
        }
        session.speed.record(attempts);
    })
}

/// RandomX-only hash loop; checks the race cancellation every 128 nonces.
fn solve_randomx(
    vm: RandomxVm,
    mut header: BlockHeader,
    target: [u8; 32],
    race_quit: Arc<AtomicBool>,
    solution_tx: crossbeam_channel::Sender<BlockHeader>,
    speed: SpeedMonitor,
) {
    for nonce in 0u32.. {
        if nonce % 128 == 0 && race_quit.load(Ordering::Acquire) {
            speed.record((nonce % 128) as u64);
            return;
        }
        header.nonce = nonce;
        let digest = vm.hash(&header.pow_bytes());
        if meets_target(&digest, &target) {
            speed.record((nonce % 128) as u64 + 1);
            let telemetry = ThermalTelemetry::capture();
            header.thermal_proof = encode_thermal_proof(telemetry.clock_mhz, nonce as u64);
            let _ = solution_tx.send(header);
            return;
        }
    }
}

fn build_header(template: &BlockTemplate, prev_block: Hash256) -> BlockHeader {
    BlockHeader {
        version: 1,
        prev_block,
        merkle_root: merkle_root_for(template),
        timestamp: template.cur_time.max(template.min_time) as u32,
        bits: 0,
        nonce: 0,
        thermal_proof: 0,
    }
}

/// Transaction commitment for the header. Full merkle assembly (coinbase
/// construction, witness commitments) belongs to the external block
/// builder; at this boundary the template's transaction list is hashed
/// as-is.
fn merkle_root_for(template: &BlockTemplate) -> Hash256 {
    let joined = template.transactions.concat();
    Hash256::from_bytes(shell_crypto::hash::double_sha256(joined.as_bytes()))
}

fn assemble_block_hex(header: &BlockHeader, template: &BlockTemplate) -> String {
    let mut out = hex::encode(header.wire_bytes());
    for tx in &template.transactions {
        out.push_str(tx);
    }
    out
}

fn encode_work(id: u64, start: u32, count: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&start.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out
}

fn decode_work(work: &[u8]) -> Option<(u64, u32, u32)> {
    if work.len() != 16 {
        return None;
    }
    Some((
        u64::from_le_bytes(work[0..8].try_into().ok()?),
        u32::from_le_bytes(work[8..12].try_into().ok()?),
        u32::from_le_bytes(work[12..16].try_into().ok()?),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    struct StaticSource {
        template: BlockTemplate,
        submitted: Mutex<Vec<String>>,
    }

    impl StaticSource {
        fn easy() -> Arc<Self> {
            Arc::new(Self {
                template: BlockTemplate {
                    height: 7,
                    prev_block: "33".repeat(32),
                    transactions: vec!["aa".into(), "bb".into()],
                    coinbase_value: 95 * 100_000_000,
                    // Trivial target: the first attempt on any arm wins.
                    target: "ff".repeat(32),
                    min_time: 1_900_000_000,
                    cur_time: 1_900_000_000,
                },
                submitted: Mutex::new(Vec::new()),
            })
        }

        fn submissions(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    impl TemplateSource for StaticSource {
        fn fetch_template(&self) -> BoxFuture<'_, anyhow::Result<BlockTemplate>> {
            Box::pin(async move { Ok(self.template.clone()) })
        }

        fn submit_block(&self, block_hex: String) -> BoxFuture<'_, anyhow::Result<()>> {
            Box::pin(async move {
                self.submitted.lock().unwrap().push(block_hex);
                Ok(())
            })
        }
    }

    fn test_config() -> MinerConfig {
        MinerConfig {
            randomx_cache_bytes: 64 * 1024,
            big_cores: 1,
            little_cores: 1,
            ..MinerConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dual_mode_solves_and_submits() {
        let source = StaticSource::easy();
        let orchestrator = Arc::new(MiningOrchestrator::new(
            test_config(),
            Hash256::from_bytes([1; 32]),
            2_048,
        ));

        let runner = {
            let orchestrator = Arc::clone(&orchestrator);
            let source = Arc::clone(&source);
            tokio::spawn(async move { orchestrator.run(source).await })
        };

        let deadline = Instant::now() + Duration::from_secs(30);
        while source.submissions() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        orchestrator.shutdown();
        runner.await.unwrap().unwrap();

        assert!(source.submissions() >= 1, "no block was submitted");
        let block = source.submitted.lock().unwrap()[0].clone();
        // 88-byte header (176 hex chars) followed by the template txs.
        assert!(block.len() >= 176);
        assert!(block.ends_with("aabb"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_cancels_an_unsolvable_template() {
        let source = StaticSource::easy();
        // Impossible target: solving can never finish.
        let mut template = source.template.clone();
        template.target = "00".repeat(32);
        let source = Arc::new(StaticSource {
            template,
            submitted: Mutex::new(Vec::new()),
        });

        let orchestrator = Arc::new(MiningOrchestrator::new(
            test_config(),
            Hash256::from_bytes([1; 32]),
            2_048,
        ));
        let runner = {
            let orchestrator = Arc::clone(&orchestrator);
            let source = Arc::clone(&source);
            tokio::spawn(async move { orchestrator.run(source).await })
        };

        tokio::time::sleep(Duration::from_millis(300)).await;
        orchestrator.shutdown();
        runner.await.unwrap().unwrap();
        assert_eq!(source.submissions(), 0);
    }

    #[test]
    fn work_encoding_round_trip() {
        let work = encode_work(42, 1_000, 512);
        assert_eq!(decode_work(&work), Some((42, 1_000, 512)));
        assert_eq!(decode_work(&work[..10]), None);
    }
}
