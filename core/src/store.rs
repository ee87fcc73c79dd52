//! In-memory store and the per-task locking scheme described in §5.
//!
//! Generalizes the teacher's single `Orchestrator` owning one linear
//! simulation state (`orchestrator/engine.rs`) into a keyed collection of
//! independently-lockable task entities — the "per-task actor" realisation
//! the spec calls for. `DashMap` gives lock-free lookup by key; the
//! `tokio::sync::Mutex` wrapping each [`TaskRecord`] is what actually
//! serialises the composite mutations in §4.2-§4.4.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::DispatchConfig;
use crate::heartbeat::HeartbeatTracker;
use crate::models::{BucketAssignment, BucketResult, Task};
use crate::wallet::WalletBook;

/// A task plus everything that mutates alongside it in the same
/// write-critical section: its bucket results and its live leases. Bundling
/// them behind one lock is what makes "torn halves" (§5) impossible —
/// inserting a result and removing its lease happen under a single guard.
#[derive(Debug)]
pub struct TaskRecord {
    pub task: Task,
    pub results: BTreeMap<u64, BucketResult>,
    pub assignments: BTreeMap<u64, BucketAssignment>,
}

impl TaskRecord {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            results: BTreeMap::new(),
            assignments: BTreeMap::new(),
        }
    }

    /// Ranges covered by finished results or live leases — the planner's
    /// `covered` input, per §4.1.
    pub fn covered_ranges(&self) -> Vec<(usize, usize)> {
        self.results
            .values()
            .map(BucketResult::range)
            .chain(self.assignments.values().map(BucketAssignment::range))
            .collect()
    }
}

/// The whole engine's state: tasks (each independently lockable), the
/// immutable input item sequences they reference, the wallet book (one
/// lock for the whole ledger, per §5), and the heartbeat table.
pub struct Store {
    tasks: DashMap<String, Arc<Mutex<TaskRecord>>>,
    items: DashMap<String, Arc<Vec<Value>>>,
    pub wallet: Mutex<WalletBook>,
    pub heartbeats: HeartbeatTracker,
    pub config: DispatchConfig,
}

impl Store {
    pub fn new(config: DispatchConfig) -> Self {
        let heartbeats = HeartbeatTracker::new(config.worker_timeout);
        Self {
            tasks: DashMap::new(),
            items: DashMap::new(),
            wallet: Mutex::new(WalletBook::new()),
            heartbeats,
            config,
        }
    }

    pub fn insert_task(&self, task: Task, items: Vec<Value>) {
        self.items.insert(task.id.clone(), Arc::new(items));
        self.tasks.insert(task.id.clone(), Arc::new(Mutex::new(TaskRecord::new(task))));
    }

    pub fn task_handle(&self, task_id: &str) -> Option<Arc<Mutex<TaskRecord>>> {
        self.tasks.get(task_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn items_for(&self, task_id: &str) -> Option<Arc<Vec<Value>>> {
        self.items.get(task_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove_task(&self, task_id: &str) -> bool {
        self.items.remove(task_id);
        self.tasks.remove(task_id).is_some()
    }

    /// Snapshot of every task, for `GET /api/tasks` — each entry's lock is
    /// acquired and released independently, so this never blocks on a
    /// single slow task and never holds more than one lock at a time.
    pub async fn all_tasks(&self) -> Vec<Task> {
        let handles: Vec<Arc<Mutex<TaskRecord>>> = self.tasks.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut tasks = Vec::with_capacity(handles.len());
        for handle in handles {
            tasks.push(handle.lock().await.task.clone());
        }
        tasks
    }
}
