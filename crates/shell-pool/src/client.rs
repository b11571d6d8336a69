//! Connected-client registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use crate::device::{DeviceClass, DeviceInfo};
use crate::difficulty::DifficultyRetargeter;
use crate::job::WorkSize;

/// Per-connection state. Guarded by a short-critical-section mutex; the
/// outbound channel decouples protocol handling from socket writes.
pub struct ClientState {
    pub id: u64,
    pub extranonce1: String,
    /// Set by `mining.authorize`.
    pub worker_name: Option<String>,
    pub difficulty: DifficultyRetargeter,
    pub device: Option<DeviceInfo>,
    pub device_class: DeviceClass,
    /// Device-class difficulty factor currently applied.
    pub applied_multiplier: f64,
    pub work_size: WorkSize,
    pub throttled: bool,
    pub accepted_shares: u64,
    pub rejected_shares: u64,
    pub outbound: mpsc::UnboundedSender<String>,
}

impl ClientState {
    pub fn is_authorized(&self) -> bool {
        self.worker_name.is_some()
    }

    /// Queue a line for the connection writer.
    pub fn send_line(&self, line: String) {
        let _ = self.outbound.send(line);
    }
}

/// Shared registry of live connections, guarded by a shared/exclusive
/// lock: the dispatch path reads, register/remove write.
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: RwLock<HashMap<u64, Arc<Mutex<ClientState>>>>,
    initial_difficulty: f64,
    min_difficulty: f64,
    max_difficulty: f64,
}

impl ClientRegistry {
    pub fn new(initial_difficulty: f64, min_difficulty: f64, max_difficulty: f64) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            clients: RwLock::new(HashMap::new()),
            initial_difficulty,
            min_difficulty,
            max_difficulty,
        }
    }

    /// Admit a connection; returns its ID and assigned extranonce1.
    pub fn register(&self, outbound: mpsc::UnboundedSender<String>) -> (u64, String) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let extranonce1 = format!("{id:08x}");
        let state = ClientState {
            id,
            extranonce1: extranonce1.clone(),
            worker_name: None,
            difficulty: DifficultyRetargeter::new(
                self.initial_difficulty,
                self.min_difficulty,
                self.max_difficulty,
            ),
            device: None,
            device_class: DeviceClass::Budget,
            applied_multiplier: 1.0,
            work_size: WorkSize::default(),
            throttled: false,
            accepted_shares: 0,
            rejected_shares: 0,
            outbound,
        };
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(Mutex::new(state)));
        debug!(client = id, "client registered");
        (id, extranonce1)
    }

    pub fn remove(&self, id: u64) {
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        debug!(client = id, "client removed");
    }

    pub fn get(&self, id: u64) -> Option<Arc<Mutex<ClientState>>> {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` on every authorized client.
    pub fn for_each_authorized(&self, mut f: impl FnMut(&ClientState)) {
        let clients = self.clients.read().unwrap_or_else(|e| e.into_inner());
        for client in clients.values() {
            let state = client.lock().unwrap_or_else(|e| e.into_inner());
            if state.is_authorized() {
                f(&state);
            }
        }
    }
}
