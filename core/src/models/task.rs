//! Task model (§3).
//!
//! CRITICAL: every monetary field is a [`crate::money::Money`] (`Decimal`),
//! never a binary float — see `crate::money`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::money::Money;

/// Lifecycle status. `Completed`/`Failed` are terminal and sticky:
/// `reinvoke` re-enables claims but never moves a terminal task backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Planning limits for the bucket planner (C2). May be enlarged by
/// normalisation; never shrunk below an observed large item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketConfig {
    pub max_buckets: usize,
    pub max_bucket_bytes: usize,
}

/// The budget block described in §3. `chunks_paid <= max_billable_buckets`
/// and `budget_spent == chunks_paid * cost_per_bucket` are invariants
/// maintained exclusively by `crate::settlement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetBlock {
    pub cost_per_bucket: Money,
    pub max_billable_buckets: u64,
    pub budget_total: Money,
    pub chunks_paid: u64,
    pub budget_spent: Money,
    pub platform_fee_percent: Decimal,
}

/// Derived, read-only progress figures. Never an independent source of
/// truth: always recomputed from bucket results (`crate::lifecycle::recompute_progress`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub processed_buckets: u64,
    pub processed_items: usize,
    pub progress: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub creator_id: String,
    pub status: TaskStatus,
    pub capability_required: String,
    pub name: String,

    /// Opaque pointer to the immutable input item sequence, resolved
    /// through `crate::store::Store::items`.
    pub data_items_ref: String,
    pub total_items: usize,

    pub bucket_config: BucketConfig,
    pub next_bucket_index: u64,
    pub assigned_workers: HashSet<String>,
    pub revoked: bool,

    pub budget: BudgetBlock,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True once `progress.progress == 100` has been recomputed and
    /// `status` has followed it, per the state machine in §4.7.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }
}
