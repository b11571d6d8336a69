//! The stratum TCP server.
//!
//! Connections are handled in parallel; the job reference is swapped
//! atomically and read lock-free through `watch`; the client registry sits
//! behind a shared/exclusive lock. Malformed JSON earns a -32700 response
//! without closing the connection, unknown methods -32601. Each
//! connection's read deadline equals the configured timeout and resets on
//! every message.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use shell_core::types::Hash256;
use shell_miner::SeedManager;
use shell_rpc::TemplateSource;

use crate::client::{ClientRegistry, ClientState};
use crate::config::PoolConfig;
use crate::device::{DeviceClass, DeviceInfo};
use crate::error::PoolError;
use crate::job::{JobManager, MiningJob};
use crate::protocol::{
    StratumNotification, StratumRequest, StratumResponse, ERR_METHOD_NOT_FOUND, ERR_PARSE,
};
use crate::share::{Share, ShareValidator};

struct ServerCtx {
    config: PoolConfig,
    jobs: Arc<JobManager>,
    validator: ShareValidator,
    clients: ClientRegistry,
    source: Arc<dyn TemplateSource>,
}

pub struct PoolServer {
    ctx: Arc<ServerCtx>,
    quit_tx: watch::Sender<bool>,
}

impl PoolServer {
    pub fn new(
        config: PoolConfig,
        source: Arc<dyn TemplateSource>,
        genesis_hash: Hash256,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let seeds = SeedManager::new(
            genesis_hash,
            shell_core::constants::SEED_ROTATION_BLOCKS,
            config.randomx_cache_bytes,
        );
        let ctx = Arc::new(ServerCtx {
            jobs: JobManager::new(config.initial_difficulty),
            validator: ShareValidator::new(seeds, config.thermal_compliance),
            clients: ClientRegistry::new(
                config.initial_difficulty,
                config.min_difficulty,
                config.max_difficulty,
            ),
            source,
            config,
        });
        let (quit_tx, _) = watch::channel(false);
        Ok(Self { ctx, quit_tx })
    }

    /// Idempotent shutdown broadcast.
    pub fn shutdown(&self) {
        self.quit_tx.send_replace(true);
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.ctx.config.endpoint)
            .await
            .map_err(|e| PoolError::BindFailed(e.to_string()))?;
        self.run_on(listener).await
    }

    /// Serve on an already-bound listener (tests bind port 0 themselves).
    pub async fn run_on(&self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, "stratum pool listening");

        let poller = self.ctx.jobs.spawn_poller(
            Arc::clone(&self.ctx.source),
            self.ctx.config.job_refresh_secs,
            self.quit_tx.subscribe(),
        );
        let broadcaster = spawn_job_broadcaster(Arc::clone(&self.ctx), self.quit_tx.subscribe());

        let mut quit = self.quit_tx.subscribe();
        loop {
            tokio::select! {
                changed = quit.changed() => {
                    if changed.is_err() || *quit.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let ctx = Arc::clone(&self.ctx);
                        let quit = self.quit_tx.subscribe();
                        tokio::spawn(handle_connection(ctx, stream, quit));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
        }

        poller.abort();
        broadcaster.abort();
        info!("stratum pool stopped");
        Ok(())
    }
}

/// Push new jobs to every authorized client as they are published.
fn spawn_job_broadcaster(
    ctx: Arc<ServerCtx>,
    mut quit: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let mut jobs = ctx.jobs.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = jobs.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let job = jobs.borrow().clone();
                    if let Some(job) = job {
                        ctx.clients.for_each_authorized(|client| {
                            push_notify(client, &job, true);
                        });
                    }
                }
                changed = quit.changed() => {
                    if changed.is_err() || *quit.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

async fn handle_connection(
    ctx: Arc<ServerCtx>,
    stream: TcpStream,
    mut quit: watch::Receiver<bool>,
) {
    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let (client_id, _) = ctx.clients.register(outbound_tx);
    let writer = tokio::spawn(writer_loop(write_half, outbound_rx));

    let mut lines = BufReader::new(read_half).lines();
    let read_deadline = Duration::from_secs(ctx.config.connection_timeout_secs);

    loop {
        tokio::select! {
            changed = quit.changed() => {
                if changed.is_err() || *quit.borrow() {
                    break;
                }
            }
            read = tokio::time::timeout(read_deadline, lines.next_line()) => {
                match read {
                    Err(_) => {
                        debug!(client = client_id, "read deadline expired");
                        break;
                    }
                    Ok(Ok(Some(line))) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Some(response) = dispatch(&ctx, client_id, &line) {
                            if let Some(client) = ctx.clients.get(client_id) {
                                client
                                    .lock()
                                    .unwrap_or_else(|e| e.into_inner())
                                    .send_line(response.to_line());
                            }
                        }
                    }
                    Ok(Ok(None)) | Ok(Err(_)) => break,
                }
            }
        }
    }

    // In-flight duplicate-table entries stay until their TTL expires.
    ctx.clients.remove(client_id);
    writer.abort();
}

async fn writer_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

fn dispatch(ctx: &Arc<ServerCtx>, client_id: u64, line: &str) -> Option<StratumResponse> {
    let request: StratumRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            debug!(client = client_id, error = %e, "malformed request");
            return Some(StratumResponse::err(Value::Null, ERR_PARSE, "parse error"));
        }
    };
    let id = request.id.clone();

    let response = match request.method.as_str() {
        "mining.subscribe" => handle_subscribe(ctx, client_id, id),
        "mining.authorize" => handle_authorize(ctx, client_id, id, &request.params),
        "mining.submit" => handle_submit(ctx, client_id, id, &request.params),
        "mining.set_device_info" => handle_set_device_info(ctx, client_id, id, &request.params),
        "mining.report_thermal" => handle_report_thermal(ctx, client_id, id, &request.params),
        "mining.get_mobile_config" => handle_get_mobile_config(ctx, client_id, id),
        other => {
            debug!(client = client_id, method = other, "unknown method");
            StratumResponse::err(id, ERR_METHOD_NOT_FOUND, "method not found")
        }
    };
    Some(response)
}

fn handle_subscribe(ctx: &Arc<ServerCtx>, client_id: u64, id: Value) -> StratumResponse {
    let Some(client) = ctx.clients.get(client_id) else {
        return StratumResponse::ok(id, json!(false));
    };
    let extranonce1 = client
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .extranonce1
        .clone();
    StratumResponse::ok(id, json!([format!("shell-{extranonce1}"), extranonce1, 4]))
}

fn handle_authorize(
    ctx: &Arc<ServerCtx>,
    client_id: u64,
    id: Value,
    params: &Value,
) -> StratumResponse {
    let worker = params
        .get(0)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    if worker.is_empty() {
        return StratumResponse::ok(id, json!(false));
    }
    let Some(client) = ctx.clients.get(client_id) else {
        return StratumResponse::ok(id, json!(false));
    };
    let mut state = client.lock().unwrap_or_else(|e| e.into_inner());
    state.worker_name = Some(worker.clone());
    info!(client = client_id, worker = %worker, "worker authorized");

    // Initial difficulty, then the current job if one exists.
    push_set_difficulty(&state, state.difficulty.current());
    if let Some(job) = ctx.jobs.current() {
        push_notify(&state, &job, true);
    }
    StratumResponse::ok(id, json!(true))
}

fn handle_submit(
    ctx: &Arc<ServerCtx>,
    client_id: u64,
    id: Value,
    params: &Value,
) -> StratumResponse {
    let now = chrono::Utc::now().timestamp();

    let Some(client) = ctx.clients.get(client_id) else {
        return reject_share(id, client_id, &PoolError::Unauthorized);
    };
    let (difficulty, extranonce1, authorized) = {
        let state = client.lock().unwrap_or_else(|e| e.into_inner());
        (
            state.difficulty.current(),
            state.extranonce1.clone(),
            state.is_authorized(),
        )
    };
    if !authorized {
        return reject_share(id, client_id, &PoolError::Unauthorized);
    }
    let Some(job) = ctx.jobs.current() else {
        return reject_share(id, client_id, &PoolError::NoCurrentJob);
    };
    let share = match Share::from_params(client_id, difficulty, params, now) {
        Ok(s) => s,
        Err(e) => {
            let mut state = client.lock().unwrap_or_else(|p| p.into_inner());
            state.rejected_shares += 1;
            drop(state);
            return reject_share(id, client_id, &e);
        }
    };

    match ctx.validator.validate(&share, &job, &extranonce1, now) {
        Ok(outcome) => {
            let mut state = client.lock().unwrap_or_else(|e| e.into_inner());
            state.accepted_shares += 1;
            if let Some(new_difficulty) = state.difficulty.on_share(now) {
                push_set_difficulty(&state, new_difficulty);
            }
            drop(state);

            if let Some(header) = outcome.block_candidate {
                info!(job = %job.id, "block-grade share; submitting upstream");
                let source = Arc::clone(&ctx.source);
                tokio::spawn(async move {
                    let block_hex = hex::encode(header.wire_bytes());
                    if let Err(e) = source.submit_block(block_hex).await {
                        warn!(error = %e, "upstream block submission failed");
                    }
                });
            }
            StratumResponse::ok(id, json!(true))
        }
        Err(e) => {
            let mut state = client.lock().unwrap_or_else(|p| p.into_inner());
            state.rejected_shares += 1;
            drop(state);
            reject_share(id, client_id, &e)
        }
    }
}

/// Rejected share: `result: false` to the client, reason server-side only.
fn reject_share(id: Value, client_id: u64, reason: &PoolError) -> StratumResponse {
    debug!(client = client_id, reason = %reason, "share rejected");
    StratumResponse::ok(id, json!(false))
}

fn handle_set_device_info(
    ctx: &Arc<ServerCtx>,
    client_id: u64,
    id: Value,
    params: &Value,
) -> StratumResponse {
    // Accept either an object or a single-element array of one.
    let info_value = if params.is_array() {
        params.get(0).cloned().unwrap_or(Value::Null)
    } else {
        params.clone()
    };
    let info: DeviceInfo = serde_json::from_value(info_value).unwrap_or_default();
    let class = DeviceClass::from_soc(&info.soc_model);

    let Some(client) = ctx.clients.get(client_id) else {
        return StratumResponse::ok(id, json!(false));
    };
    let mut state = client.lock().unwrap_or_else(|e| e.into_inner());
    state.work_size = class.work_size();
    state.device_class = class;

    // Re-base difficulty for the device tier.
    let multiplier = class.difficulty_multiplier();
    if (multiplier - state.applied_multiplier).abs() > f64::EPSILON {
        let factor = multiplier / state.applied_multiplier;
        let new_difficulty = state.difficulty.scale(factor);
        state.applied_multiplier = multiplier;
        push_set_difficulty(&state, new_difficulty);
    }
    state.device = Some(info);
    info!(client = client_id, class = ?class, "device profiled");
    StratumResponse::ok(id, json!(true))
}

fn handle_report_thermal(
    ctx: &Arc<ServerCtx>,
    client_id: u64,
    id: Value,
    params: &Value,
) -> StratumResponse {
    let report = if params.is_array() {
        params.get(0).cloned().unwrap_or(Value::Null)
    } else {
        params.clone()
    };
    let throttled = report
        .get("throttled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let temperature = report
        .get("temperature")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let Some(client) = ctx.clients.get(client_id) else {
        return StratumResponse::ok(id, json!(false));
    };
    let mut state = client.lock().unwrap_or_else(|e| e.into_inner());
    state.throttled = throttled;
    if throttled {
        let new_difficulty = state.difficulty.on_throttle();
        push_set_difficulty(&state, new_difficulty);
        info!(
            client = client_id,
            temperature, "client throttled; difficulty reduced"
        );
    }
    StratumResponse::ok(id, json!(true))
}

fn handle_get_mobile_config(ctx: &Arc<ServerCtx>, client_id: u64, id: Value) -> StratumResponse {
    let Some(client) = ctx.clients.get(client_id) else {
        return StratumResponse::ok(id, json!(null));
    };
    let state = client.lock().unwrap_or_else(|e| e.into_inner());
    let thermal_target = ctx
        .jobs
        .current()
        .map(|j| j.thermal_target)
        .unwrap_or(45.0);
    StratumResponse::ok(
        id,
        json!({
            "device_class": state.device_class,
            "work_size": state.work_size,
            "difficulty": state.difficulty.current(),
            "thermal_target": thermal_target,
            "npu_interval": state.work_size.npu_iterations,
        }),
    )
}

// ── Notifications ────────────────────────────────────────────────────────────

fn push_set_difficulty(state: &ClientState, difficulty: f64) {
    let line =
        StratumNotification::new("mining.set_difficulty", json!([difficulty])).to_line();
    state.send_line(line);
}

fn push_notify(state: &ClientState, job: &MiningJob, clean_jobs: bool) {
    let line = StratumNotification::new(
        "mining.notify",
        job.notify_params(state.work_size, clean_jobs),
    )
    .to_line();
    state.send_line(line);
}
