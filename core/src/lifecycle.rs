//! Task lifecycle facade (C7) — the one surface `server` talks to.
//!
//! `DispatchService` composes C1-C6 under the locking discipline of §5:
//! acquire the task's mutex first, the wallet mutex second, never the
//! reverse. Generalizes the teacher's `Orchestrator` (`orchestrator/engine.rs`),
//! which is the single place that sequences agent/transaction/settlement
//! calls against its simulation state, into an async facade over a keyed
//! task store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use crate::aggregator::{self, ProgressBatch, TerminalBucket};
use crate::allocator::{self, NextBucketOutcome};
use crate::config::DispatchConfig;
use crate::error::{DispatchError, DispatchResult, StateReason};
use crate::ids::new_task_id;
use crate::models::task::{BucketConfig, BudgetBlock, Progress, Task, TaskStatus};
use crate::models::{BucketAssignment, BucketResult, TransactionMeta, User, WalletTransaction};
use crate::money::{round_external, Money};
use crate::settlement::{self, PayoutReceipt};
use crate::store::{Store, TaskRecord};
use crate::wallet;

/// An already-resolved pointer to wherever the uploaded code archive and
/// data file ended up; `core` never touches bytes (§4.7 ADDED). The
/// `server` crate's multipart handler is responsible for producing one, or
/// leaving it `None` to fall back to the base spec's literal rule (§4.7):
/// artifacts live under a storage id equal to the task id, which only
/// `core` can mint.
pub type StorageRef = String;

#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub creator_id: String,
    pub name: String,
    pub capability_required: String,
    pub storage_ref: Option<StorageRef>,
    pub items: Vec<Value>,
    pub cost_per_bucket: Money,
    pub max_billable_buckets: u64,
    pub platform_fee_percent: Money,
    pub bucket_config: Option<BucketConfig>,
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub user: User,
    pub wallet_transactions: Vec<WalletTransaction>,
    pub wallet_transactions_total: usize,
}

#[derive(Debug, Clone)]
pub struct ResultsView {
    pub results: Vec<BucketResult>,
    pub assignments: Vec<BucketAssignment>,
}

const PROFILE_TRANSACTION_LIMIT: usize = 25;

pub struct DispatchService {
    store: Arc<Store>,
}

impl DispatchService {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            store: Arc::new(Store::new(config)),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// `createTask` (§4.7): validate, assign an id, initialise the budget
    /// block, and store the task `queued`.
    #[instrument(skip(self, input), fields(creator_id = %input.creator_id))]
    pub fn create_task(&self, input: CreateTaskInput) -> DispatchResult<Task> {
        if input.name.trim().is_empty() {
            return Err(DispatchError::Validation("name must not be empty".into()));
        }
        if input.cost_per_bucket <= Money::ZERO {
            return Err(DispatchError::Validation("costPerBucket must be positive".into()));
        }
        if input.max_billable_buckets == 0 {
            return Err(DispatchError::Validation("maxBillableBuckets must be at least 1".into()));
        }
        if matches!(input.storage_ref.as_deref(), Some("")) {
            return Err(DispatchError::Validation("storageRef must not be empty".into()));
        }
        if input.items.is_empty() {
            return Err(DispatchError::Planner(crate::error::PlannerError::EmptyInput));
        }

        let bucket_config = input.bucket_config.unwrap_or(BucketConfig {
            max_buckets: self.store.config.default_max_buckets,
            max_bucket_bytes: self.store.config.default_bucket_bytes,
        });
        let budget_total = round_external(input.cost_per_bucket * Money::from(input.max_billable_buckets));

        let now = Utc::now();
        let id = new_task_id();
        // §4.7 base spec: "persists uploaded artifacts under a storage id
        // equal to the task id". `server` may supply its own storage_ref
        // when it needs to write bytes before the task id exists; otherwise
        // the task's own freshly-minted id is the storage id.
        let data_items_ref = input.storage_ref.unwrap_or_else(|| id.clone());
        let task = Task {
            id,
            creator_id: input.creator_id,
            status: TaskStatus::Queued,
            capability_required: input.capability_required,
            name: input.name,
            data_items_ref,
            total_items: input.items.len(),
            bucket_config,
            next_bucket_index: 0,
            assigned_workers: Default::default(),
            revoked: false,
            budget: BudgetBlock {
                cost_per_bucket: input.cost_per_bucket,
                max_billable_buckets: input.max_billable_buckets,
                budget_total,
                chunks_paid: 0,
                budget_spent: Money::ZERO,
                platform_fee_percent: input.platform_fee_percent,
            },
            progress: Some(Progress::default()),
            created_at: now,
            updated_at: now,
        };

        self.store.insert_task(task.clone(), input.items);
        tracing::info!(task_id = %task.id, "task created");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> Vec<Task> {
        let tasks = self.store.all_tasks().await;
        match status {
            Some(status) => tasks.into_iter().filter(|t| t.status == status).collect(),
            None => tasks,
        }
    }

    async fn handle(&self, task_id: &str) -> DispatchResult<Arc<tokio::sync::Mutex<TaskRecord>>> {
        self.store
            .task_handle(task_id)
            .ok_or_else(|| DispatchError::TaskNotFound(task_id.to_string()))
    }

    /// `claim(taskId, workerId)`: refuse if revoked, else opt the worker in
    /// and flip `queued -> processing`.
    #[instrument(skip(self))]
    pub async fn claim(&self, task_id: &str, worker_id: &str) -> DispatchResult<Task> {
        let handle = self.handle(task_id).await?;
        let mut record = handle.lock().await;
        if record.task.revoked {
            return Err(DispatchError::Validation("task is revoked".into()));
        }
        record.task.assigned_workers.insert(worker_id.to_string());
        if record.task.status == TaskStatus::Queued {
            record.task.status = TaskStatus::Processing;
        }
        record.task.updated_at = Utc::now();
        Ok(record.task.clone())
    }

    #[instrument(skip(self))]
    pub async fn drop_worker(&self, task_id: &str, worker_id: &str) -> DispatchResult<Task> {
        let handle = self.handle(task_id).await?;
        let mut record = handle.lock().await;
        allocator::drop_assignments(&mut record, worker_id);
        Ok(record.task.clone())
    }

    #[instrument(skip(self))]
    pub async fn revoke(&self, task_id: &str) -> DispatchResult<Task> {
        let handle = self.handle(task_id).await?;
        let mut record = handle.lock().await;
        allocator::revoke(&mut record);
        Ok(record.task.clone())
    }

    #[instrument(skip(self))]
    pub async fn reinvoke(&self, task_id: &str) -> DispatchResult<Task> {
        let handle = self.handle(task_id).await?;
        let mut record = handle.lock().await;
        allocator::reinvoke(&mut record);
        Ok(record.task.clone())
    }

    /// `deleteTask`: cascades to results and assignments by construction
    /// (they live inside the same [`TaskRecord`]); the caller (`server`) is
    /// responsible for removing the on-disk storage directory named after
    /// `storageRef`, per §4.7 ADDED.
    #[instrument(skip(self))]
    pub async fn delete_task(&self, task_id: &str) -> DispatchResult<()> {
        if self.store.remove_task(task_id) {
            Ok(())
        } else {
            Err(DispatchError::TaskNotFound(task_id.to_string()))
        }
    }

    #[instrument(skip(self))]
    pub async fn results_for(&self, task_id: &str) -> DispatchResult<ResultsView> {
        let handle = self.handle(task_id).await?;
        let record = handle.lock().await;
        Ok(ResultsView {
            results: record.results.values().cloned().collect(),
            assignments: record.assignments.values().cloned().collect(),
        })
    }

    /// `nextBucket`: §4.2 steps (a)-(h). Acquires the task lock, then (only
    /// if budget checks are enabled) peeks the customer's balance under the
    /// wallet lock — task-before-wallet, per the fixed lock order in §5.
    #[instrument(skip(self))]
    pub async fn next_bucket(&self, task_id: &str, worker_id: &str) -> DispatchResult<NextBucketOutcome> {
        let handle = self.handle(task_id).await?;
        let items = self
            .store
            .items_for(task_id)
            .ok_or_else(|| DispatchError::TaskNotFound(task_id.to_string()))?;
        let mut record = handle.lock().await;

        let customer_balance = if self.store.config.disable_budget_checks {
            Money::ZERO
        } else {
            let wallet = self.store.wallet.lock().await;
            wallet.get_user(&record.task.creator_id).map(|u| u.wallet_balance).unwrap_or(Money::ZERO)
        };

        let outcome = allocator::next_bucket(&mut record, &items, worker_id, &self.store.config, customer_balance);
        if let NextBucketOutcome::Declined(reason) = outcome {
            tracing::debug!(%task_id, %worker_id, ?reason, "bucket declined");
        }
        Ok(outcome)
    }

    /// The literal item slice for a granted bucket, so the worker need not
    /// re-read the source file (§6).
    pub fn item_slice(&self, task_id: &str, range_start: usize, range_end: usize) -> Vec<Value> {
        self.store
            .items_for(task_id)
            .map(|items| items[range_start.min(items.len())..range_end.min(items.len())].to_vec())
            .unwrap_or_default()
    }

    /// `recordProgress` (§4.3 steps 1-2).
    #[instrument(skip(self, batch))]
    pub async fn record_progress(&self, task_id: &str, bucket_index: u64, batch: ProgressBatch) -> DispatchResult<BucketResult> {
        let handle = self.handle(task_id).await?;
        let mut record = handle.lock().await;
        if !record.task.assigned_workers.contains(&batch.worker_id) {
            return Err(DispatchError::WorkerNotRegistered {
                task_id: task_id.to_string(),
                worker_id: batch.worker_id,
            });
        }
        let range_start = record
            .assignments
            .get(&bucket_index)
            .map(|a| a.range_start)
            .unwrap_or(batch.range_start);
        let range_end = record.assignments.get(&bucket_index).map(|a| a.range_end);

        let entry = record
            .results
            .entry(bucket_index)
            .or_insert_with(|| BucketResult::new(task_id.to_string(), bucket_index, range_start, range_end.unwrap_or(range_start), batch.worker_id.clone()));
        let (batch_offset, batch_size) = (batch.batch_offset, batch.batch_size);
        aggregator::merge_progress(entry, batch);
        let result = entry.clone();

        if let Some(lease) = record.assignments.get_mut(&bucket_index) {
            lease.processed_count = result.processed_items;
            lease.progress_range_end = result.range_end;
            lease.last_batch_offset = batch_offset.or(lease.last_batch_offset);
            lease.last_batch_size = batch_size.or(lease.last_batch_size);
            lease.updated_at = Utc::now();
        }
        Ok(result)
    }

    /// `recordBucket` (§4.3 step 3 + §4.4). Settlement happens under both
    /// the task lock (already held) and the wallet lock, acquired in that
    /// fixed order.
    #[instrument(skip(self, terminal))]
    pub async fn record_bucket(
        &self,
        task_id: &str,
        bucket_index: u64,
        terminal: TerminalBucket,
    ) -> DispatchResult<(BucketResult, Option<PayoutReceipt>)> {
        let handle = self.handle(task_id).await?;
        let mut record = handle.lock().await;

        let range_start = terminal.range_start;
        let range_end = terminal.range_end;
        let worker_id = terminal.worker_id.clone();
        let entry = record
            .results
            .entry(bucket_index)
            .or_insert_with(|| BucketResult::new(task_id.to_string(), bucket_index, range_start, range_end, worker_id));
        aggregator::merge_terminal(entry, terminal);

        allocator::release_on_result(&mut record, bucket_index);

        let receipt = {
            let mut wallet = self.store.wallet.lock().await;
            let result = record.results.get_mut(&bucket_index).expect("just inserted");
            let outcome = settlement::settle_bucket(&mut wallet, &mut record.task, result);
            match outcome {
                Ok(receipt) => receipt,
                Err(err) => {
                    tracing::warn!(%task_id, bucket_index, error = %err, "payout deferred");
                    None
                }
            }
        };

        self.recompute_progress(&mut record);
        let result = record.results.get(&bucket_index).expect("present").clone();
        Ok((result, receipt))
    }

    /// `computeProgress`: derive `processedBuckets`/`processedItems`/
    /// `progress` from results and follow the state machine in §4.7.
    /// Recomputed on every touch, never persisted independently (§3).
    fn recompute_progress(&self, record: &mut TaskRecord) {
        let processed_buckets = record.results.values().filter(|r| r.status.is_terminal()).count() as u64;
        let processed_items: usize = record.results.values().map(|r| r.processed_items).sum();
        let progress = if record.task.total_items == 0 {
            0
        } else {
            ((processed_items as f64 / record.task.total_items as f64) * 100.0).min(100.0) as u8
        };
        record.task.progress = Some(Progress {
            processed_buckets,
            processed_items,
            progress,
        });
        if progress >= 100 && !record.task.is_terminal() {
            record.task.status = TaskStatus::Completed;
        }
        record.task.updated_at = Utc::now();
    }

    #[instrument(skip(self))]
    pub async fn heartbeat(&self, worker_id: &str) -> chrono::DateTime<Utc> {
        self.store.heartbeats.heartbeat(worker_id)
    }

    pub fn online_status(&self, worker_id: &str) -> (bool, Option<chrono::DateTime<Utc>>, Option<i64>) {
        self.store.heartbeats.status(worker_id)
    }

    /// `GET /api/me`: profile plus the last [`PROFILE_TRANSACTION_LIMIT`]
    /// transactions and the true total, per §1.2 ADDED.
    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: &str) -> ProfileView {
        let mut wallet = self.store.wallet.lock().await;
        wallet.ensure_user(user_id, self.store.config.dev_initial_wallet);
        let user = wallet.get_user(user_id).expect("just ensured").clone();
        let (wallet_transactions, wallet_transactions_total) = wallet.transactions_for(user_id, PROFILE_TRANSACTION_LIMIT);
        ProfileView {
            user,
            wallet_transactions,
            wallet_transactions_total,
        }
    }

    #[instrument(skip(self))]
    pub async fn deposit(&self, user_id: &str, amount: Money) -> DispatchResult<(User, WalletTransaction)> {
        let mut wallet = self.store.wallet.lock().await;
        wallet.ensure_user(user_id, self.store.config.dev_initial_wallet);
        let tx = wallet::deposit(&mut wallet, &self.store.config, user_id, amount)?;
        Ok((wallet.get_user(user_id).expect("just ensured").clone(), tx))
    }

    #[instrument(skip(self))]
    pub async fn withdraw(&self, user_id: &str, amount: Money) -> DispatchResult<(User, WalletTransaction)> {
        let mut wallet = self.store.wallet.lock().await;
        wallet.ensure_user(user_id, self.store.config.dev_initial_wallet);
        let tx = wallet::withdraw(&mut wallet, &self.store.config, user_id, amount)?;
        Ok((wallet.get_user(user_id).expect("just ensured").clone(), tx))
    }

    /// Apply a completed external checkout as a deposit, bypassing the
    /// sandbox gate (§6 `/api/stripe/webhook`): the checkout provider is the
    /// trust boundary, not the in-process sandbox flag.
    #[instrument(skip(self))]
    pub async fn apply_external_deposit(&self, user_id: &str, amount: Money, reason: &str) -> DispatchResult<WalletTransaction> {
        if amount <= Money::ZERO {
            return Err(DispatchError::Validation("deposit amount must be positive".into()));
        }
        let mut wallet = self.store.wallet.lock().await;
        wallet.ensure_user(user_id, self.store.config.dev_initial_wallet);
        let meta = TransactionMeta {
            task_id: None,
            chunk_index: None,
            reason: Some(reason.to_string()),
        };
        let tx = wallet.adjust(user_id, amount, crate::models::TransactionType::WalletDeposit, meta)?;
        Ok(tx)
    }

    pub fn state_reason_wire(reason: StateReason) -> &'static str {
        reason.as_wire_str()
    }
}
