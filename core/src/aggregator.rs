//! Progress & result aggregator (C4, §4.3).
//!
//! Pure merge logic: given the current [`BucketResult`] (or none yet) and an
//! incoming progress batch or terminal result, compute the next
//! `BucketResult`. Mirrors the teacher's "validate, then mutate atomically,
//! or not at all" settlement discipline (`backend/src/settlement/rtgs.rs`)
//! by never partially applying a batch. Wallet/lease side effects on a
//! terminal transition are the caller's job (`crate::lifecycle`), not
//! this module's — C4 and C5 stay separate components per the spec's
//! component table.

use chrono::Utc;

use crate::models::bucket_result::{truncate_preview, BucketResult, BucketStatus, ItemResult, ItemStatus};

/// One item row inside a progress batch or a terminal result.
#[derive(Debug, Clone)]
pub struct IncomingItem {
    pub local_index: usize,
    pub status: ItemStatus,
    pub input_preview: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// `recordProgress` payload, bucket-scoped (taskId/bucketIndex are the
/// caller's lookup key, not part of this struct).
#[derive(Debug, Clone)]
pub struct ProgressBatch {
    pub worker_id: String,
    pub range_start: usize,
    pub items_processed: usize,
    pub bytes_used: usize,
    pub items: Vec<IncomingItem>,
    /// Offset/size of the batch that produced this update, carried through
    /// to the lease's `last_batch_offset`/`last_batch_size` (§3) by the
    /// caller; `None` when the worker didn't report batch framing.
    pub batch_offset: Option<usize>,
    pub batch_size: Option<usize>,
}

/// `recordBucket` payload, bucket-scoped.
#[derive(Debug, Clone)]
pub struct TerminalBucket {
    pub worker_id: String,
    pub range_start: usize,
    pub range_end: usize,
    pub status: Option<BucketStatus>,
    pub item_results: Vec<IncomingItem>,
    pub output: Option<String>,
    pub error: Option<String>,
}

fn upsert_incoming(result: &mut BucketResult, range_start: usize, item: IncomingItem) {
    let global_index = range_start + item.local_index;
    result.upsert_item(ItemResult {
        local_index: item.local_index,
        global_index,
        status: item.status,
        input_preview: item.input_preview.map(|s| truncate_preview(&s)),
        output: item.output.map(|s| truncate_preview(&s)),
        error: item.error,
    });
}

/// Merge step 1+2 of §4.3: create the result if it doesn't exist, then fold
/// in a progress batch. `processed_items` and `range_end` only ever grow.
pub fn merge_progress(result: &mut BucketResult, batch: ProgressBatch) {
    result.processed_items = result.processed_items.max(batch.items_processed);
    result.range_end = result.range_end.max(batch.range_start + batch.items_processed);
    result.bytes_used = result.bytes_used.max(batch.bytes_used);
    result.worker_id = batch.worker_id;
    for item in batch.items {
        upsert_incoming(result, batch.range_start, item);
    }
    result.updated_at = Utc::now();
}

/// Derive the effective terminal status from a bucket's item results, per
/// §4.3 step 3: `failed` if any item failed, else `completed` if any item
/// completed, else `skipped`. Returns `None` when there are no items to
/// derive from (caller's explicit `status` is used instead in that case).
pub fn derive_status(items: &[ItemResult]) -> Option<BucketStatus> {
    if items.is_empty() {
        return None;
    }
    if items.iter().any(|i| i.status == ItemStatus::Failed) {
        Some(BucketStatus::Failed)
    } else if items.iter().any(|i| i.status == ItemStatus::Completed) {
        Some(BucketStatus::Completed)
    } else {
        Some(BucketStatus::Skipped)
    }
}

/// Merge step 3 of §4.3: install the terminal item list, derive/overwrite
/// `status`, and set `processed_items = items_count()`. Lease release and
/// overlap dedup (also step 3) happen in `crate::lifecycle`, which owns the
/// rest of the task's assignments/results collections.
pub fn merge_terminal(result: &mut BucketResult, terminal: TerminalBucket) {
    result.worker_id = terminal.worker_id;
    result.range_start = terminal.range_start;
    result.range_end = terminal.range_end.max(terminal.range_start);
    for item in terminal.item_results {
        upsert_incoming(result, terminal.range_start, item);
    }
    result.status = derive_status(&result.item_results).or(terminal.status).unwrap_or(BucketStatus::Completed);
    result.processed_items = result.items_count();
    result.output = terminal.output;
    result.error = terminal.error;
    result.updated_at = Utc::now();
}

/// `true` if two half-open ranges overlap — the basis for the "delete any
/// other result whose range overlaps" dedup rule in §4.3 step 3.
pub fn ranges_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
