//! Payout settler (C5, §4.4).
//!
//! Three ledger writes — customer debit, worker credit, platform accrual —
//! applied as one check-then-mutate unit, mirroring the teacher's RTGS
//! settlement discipline in `backend/src/settlement/rtgs.rs`: validate
//! first, and if any precondition fails, no state changes occur at all.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::SettlementError;
use crate::models::bucket_result::{BucketResult, BucketStatus};
use crate::models::task::Task;
use crate::models::user::{TransactionMeta, TransactionType, WalletTransaction};
use crate::money::{round_external, round_internal, Money};
use crate::wallet::WalletBook;

/// The three transactions recorded by one successful payout.
#[derive(Debug, Clone)]
pub struct PayoutReceipt {
    pub debit: WalletTransaction,
    pub credit: WalletTransaction,
    pub platform_fee: WalletTransaction,
}

/// Apply the payout for `result` if it is eligible, idempotently.
///
/// Returns `Ok(None)` (a no-op, not an error) when the bucket isn't
/// `completed`, payout was already issued, or the task's billable-bucket
/// budget is exhausted — all per §4.4's idempotence and budget-cap rules.
/// Returns `Err(SettlementError::CustomerNotFound)` when the task's creator
/// has no wallet; per §7's propagation policy, callers must swallow this
/// specific error rather than fail the enclosing request — the result stays
/// `completed` with `payout_issued = false` and is retried on the next
/// touch of the bucket.
pub fn settle_bucket(
    wallet: &mut WalletBook,
    task: &mut Task,
    result: &mut BucketResult,
) -> Result<Option<PayoutReceipt>, SettlementError> {
    if result.status != BucketStatus::Completed || result.payout_issued {
        return Ok(None);
    }
    if task.budget.chunks_paid >= task.budget.max_billable_buckets {
        return Ok(None);
    }
    if wallet.get_user(&task.creator_id).is_none() {
        return Err(SettlementError::CustomerNotFound(task.id.clone()));
    }

    let cost = task.budget.cost_per_bucket;
    let platform_share = platform_share(cost, task.budget.platform_fee_percent);
    let worker_share = cost - platform_share;

    let meta = || TransactionMeta {
        task_id: Some(task.id.clone()),
        chunk_index: Some(result.bucket_index),
        reason: None,
    };

    let debit = wallet.adjust(&task.creator_id, -cost, TransactionType::ChunkDebit, meta())?;

    wallet.ensure_user(&result.worker_id, Decimal::ZERO);
    let credit = wallet.adjust(&result.worker_id, worker_share, TransactionType::ChunkCredit, meta())?;

    let platform_fee = wallet.accrue_platform_fee(platform_share, meta());

    result.payout_issued = true;
    result.payout_at = Some(Utc::now());
    task.budget.chunks_paid += 1;
    task.budget.budget_spent = round_external(task.budget.budget_spent + cost);

    Ok(Some(PayoutReceipt {
        debit,
        credit,
        platform_fee,
    }))
}

/// `round_half_even(cost * feePercent / 100, 6 dp)`, per §4.4.
pub fn platform_share(cost: Money, fee_percent: Decimal) -> Money {
    round_internal(cost * fee_percent / Decimal::from(100))
}
