//! Assignment allocator (C3, §4.2) — grants, resumes, releases, and revokes
//! exclusive bucket leases.
//!
//! All operations here take an already-locked [`TaskRecord`] (see
//! `crate::store`): the caller holds the per-task mutex for the whole
//! sequence, which is what makes the allocator's lease invariants hold
//! under concurrent requests. Grounded on the `Arc<SessionStore>` per-key
//! locking pattern used for in-flight work leases in the reference
//! scheduler examples, generalized here to a per-task rather than a
//! per-process granularity.

use chrono::Utc;
use serde_json::Value;

use crate::config::DispatchConfig;
use crate::error::StateReason;
use crate::models::BucketAssignment;
use crate::money::Money;
use crate::planner::{self, normalize_bucket_config};
use crate::store::TaskRecord;

/// Result of a `nextBucket` call, mirroring the `{ ok, ... } | { ok:false,
/// message }` wire shape from §6 without committing to a serialization.
#[derive(Debug, Clone)]
pub enum NextBucketOutcome {
    Granted {
        bucket_index: u64,
        range_start: usize,
        range_end: usize,
        bytes_used: usize,
        resume: bool,
    },
    Declined(StateReason),
}

/// §4.2 steps (b)-(h). Step (a) (task lookup) and the item-slice projection
/// happen in `crate::lifecycle`, which owns the `Store` lookups this
/// function doesn't need.
pub fn next_bucket(
    record: &mut TaskRecord,
    items: &[Value],
    worker_id: &str,
    config: &DispatchConfig,
    customer_balance: Money,
) -> NextBucketOutcome {
    if record.task.revoked {
        return NextBucketOutcome::Declined(StateReason::Revoked);
    }
    if !record.task.assigned_workers.contains(worker_id) {
        return NextBucketOutcome::Declined(StateReason::NotAssigned);
    }

    sweep_expired(record, Utc::now());

    if let Some(existing) = resumable_lease(record, worker_id) {
        let (idx, range_start, range_end, bytes_used) = existing;
        let lease = record.assignments.get_mut(&idx).expect("looked up by key");
        lease.refresh(config.lease_ttl);
        return NextBucketOutcome::Granted {
            bucket_index: idx,
            range_start,
            range_end,
            bytes_used,
            resume: true,
        };
    }

    if !config.disable_budget_checks {
        let active_leases = record.assignments.len() as u64;
        if record.task.budget.chunks_paid + active_leases >= record.task.budget.max_billable_buckets {
            return NextBucketOutcome::Declined(StateReason::BudgetExhausted);
        }
        if customer_balance < record.task.budget.cost_per_bucket {
            return NextBucketOutcome::Declined(StateReason::InsufficientFunds);
        }
    }

    normalize_bucket_config(items, &mut record.task.bucket_config);
    let covered = record.covered_ranges();
    let Some(planned) = planner::select_bucket(items, &record.task.bucket_config, &covered) else {
        return NextBucketOutcome::Declined(StateReason::NoBucket);
    };

    let bucket_index = record.task.next_bucket_index;
    record.task.next_bucket_index += 1;
    record.task.updated_at = Utc::now();

    let lease = BucketAssignment::new(
        record.task.id.clone(),
        bucket_index,
        worker_id.to_string(),
        planned.range_start,
        planned.range_end,
        planned.bytes_used,
        config.lease_ttl,
    );
    record.assignments.insert(bucket_index, lease);

    NextBucketOutcome::Granted {
        bucket_index,
        range_start: planned.range_start,
        range_end: planned.range_end,
        bytes_used: planned.bytes_used,
        resume: false,
    }
}

/// The oldest non-expired, non-terminal lease this worker already holds, if
/// any — §4.2's resume rule ("if multiple matches exist, the oldest by
/// `assignedAt` wins").
fn resumable_lease(record: &TaskRecord, worker_id: &str) -> Option<(u64, usize, usize, usize)> {
    record
        .assignments
        .values()
        .filter(|lease| lease.worker_id == worker_id)
        .filter(|lease| !record.results.get(&lease.bucket_index).is_some_and(|r| r.status.is_terminal()))
        .min_by_key(|lease| lease.assigned_at)
        .map(|lease| (lease.bucket_index, lease.range_start, lease.range_end, lease.bytes_used))
}

/// `releaseOnResult`: delete the lease for `bucket_index`, plus any other
/// lease whose range overlaps it (dedup after a crashed worker re-covering
/// the same ground), per §4.3 step 3.
pub fn release_on_result(record: &mut TaskRecord, bucket_index: u64) {
    let range = record
        .assignments
        .get(&bucket_index)
        .map(BucketAssignment::range)
        .or_else(|| record.results.get(&bucket_index).map(|r| r.range()));
    record.assignments.remove(&bucket_index);
    if let Some(range) = range {
        record
            .assignments
            .retain(|_, lease| !crate::aggregator::ranges_overlap(lease.range(), range));
    }
}

/// `dropAssignments`: a worker opts out of a task.
pub fn drop_assignments(record: &mut TaskRecord, worker_id: &str) {
    record.task.assigned_workers.remove(worker_id);
    record.assignments.retain(|_, lease| lease.worker_id != worker_id);
    record.task.updated_at = Utc::now();
}

/// `revoke`: pause the task. Pending leases are discarded; results remain.
pub fn revoke(record: &mut TaskRecord) {
    record.task.revoked = true;
    record.task.assigned_workers.clear();
    record.assignments.clear();
    record.task.updated_at = Utc::now();
}

/// `reinvoke`: resume the task. Workers must re-claim before leasing again.
pub fn reinvoke(record: &mut TaskRecord) {
    record.task.revoked = false;
    record.task.updated_at = Utc::now();
}

/// `sweepExpired`: drop leases past their TTL. Safe to call on every
/// allocator entry point; idempotent.
pub fn sweep_expired(record: &mut TaskRecord, now: chrono::DateTime<Utc>) {
    record.assignments.retain(|_, lease| !lease.is_expired(now));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{BucketConfig, BudgetBlock, Task, TaskStatus};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    fn task() -> Task {
        let now = Utc::now();
        let mut assigned = HashSet::new();
        assigned.insert("w1".to_string());
        Task {
            id: "t1".into(),
            creator_id: "customer".into(),
            status: TaskStatus::Processing,
            capability_required: String::new(),
            name: "t".into(),
            data_items_ref: "ref".into(),
            total_items: 10,
            bucket_config: BucketConfig {
                max_buckets: 10,
                max_bucket_bytes: 1024,
            },
            next_bucket_index: 0,
            assigned_workers: assigned,
            revoked: false,
            budget: BudgetBlock {
                cost_per_bucket: dec!(2),
                max_billable_buckets: 5,
                budget_total: dec!(10),
                chunks_paid: 0,
                budget_spent: dec!(0),
                platform_fee_percent: dec!(10),
            },
            progress: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn items(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!(i)).collect()
    }

    #[test]
    fn revoked_task_declines_with_revoked_reason() {
        let mut record = TaskRecord::new(task());
        record.task.revoked = true;
        let outcome = next_bucket(&mut record, &items(10), "w1", &DispatchConfig::default(), dec!(100));
        assert!(matches!(outcome, NextBucketOutcome::Declined(StateReason::Revoked)));
    }

    #[test]
    fn unassigned_worker_declined() {
        let mut record = TaskRecord::new(task());
        let outcome = next_bucket(&mut record, &items(10), "stranger", &DispatchConfig::default(), dec!(100));
        assert!(matches!(outcome, NextBucketOutcome::Declined(StateReason::NotAssigned)));
    }

    #[test]
    fn grants_monotone_bucket_indices() {
        let mut record = TaskRecord::new(task());
        let cfg = DispatchConfig::default();
        let first = next_bucket(&mut record, &items(10), "w1", &cfg, dec!(100));
        let idx1 = match first {
            NextBucketOutcome::Granted { bucket_index, .. } => bucket_index,
            _ => panic!("expected grant"),
        };
        release_on_result(&mut record, idx1);
        let second = next_bucket(&mut record, &items(10), "w1", &cfg, dec!(100));
        let idx2 = match second {
            NextBucketOutcome::Granted { bucket_index, .. } => bucket_index,
            _ => panic!("expected grant"),
        };
        assert!(idx2 > idx1);
    }

    #[test]
    fn repeated_calls_resume_same_lease() {
        let mut record = TaskRecord::new(task());
        let cfg = DispatchConfig::default();
        let first = next_bucket(&mut record, &items(10), "w1", &cfg, dec!(100));
        let second = next_bucket(&mut record, &items(10), "w1", &cfg, dec!(100));
        match (first, second) {
            (
                NextBucketOutcome::Granted { bucket_index: a, range_start: rs_a, .. },
                NextBucketOutcome::Granted { bucket_index: b, range_start: rs_b, resume, .. },
            ) => {
                assert_eq!(a, b);
                assert_eq!(rs_a, rs_b);
                assert!(resume);
            }
            _ => panic!("expected two grants"),
        }
    }

    #[test]
    fn budget_exhaustion_declines_when_checks_enabled() {
        let mut record = TaskRecord::new(task());
        record.task.budget.max_billable_buckets = 0;
        let mut cfg = DispatchConfig::default();
        cfg.disable_budget_checks = false;
        let outcome = next_bucket(&mut record, &items(10), "w1", &cfg, dec!(100));
        assert!(matches!(outcome, NextBucketOutcome::Declined(StateReason::BudgetExhausted)));
    }

    #[test]
    fn expired_lease_is_swept_and_reallocated() {
        let mut record = TaskRecord::new(task());
        let mut cfg = DispatchConfig::default();
        cfg.lease_ttl = Duration::from_millis(0);
        let first = next_bucket(&mut record, &items(10), "w1", &cfg, dec!(100));
        let idx1 = match first {
            NextBucketOutcome::Granted { bucket_index, .. } => bucket_index,
            _ => panic!("expected grant"),
        };
        sweep_expired(&mut record, Utc::now() + chrono::Duration::seconds(1));
        assert!(record.assignments.is_empty());
        let second = next_bucket(&mut record, &items(10), "w1", &cfg, dec!(100));
        let idx2 = match second {
            NextBucketOutcome::Granted { bucket_index, .. } => bucket_index,
            _ => panic!("expected grant"),
        };
        assert!(idx2 > idx1);
    }
}
