//! Bucket planner (C2, §4.1).
//!
//! Contiguous-range partitioning keeps progress indices monotone and
//! dedup trivial; the size cap provides backpressure against oversize
//! items without unbounded config growth; normalisation guarantees forward
//! progress even when a single item exceeds the initial cap. See
//! `backend/src/models/queue_index.rs` in the teacher for the
//! invariant-first doc-comment convention this module follows.

use serde_json::Value;

use crate::models::task::BucketConfig;

/// A bucket the planner is prepared to hand out; the allocator turns this
/// into a [`crate::models::BucketAssignment`] once it commits to granting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedBucket {
    pub range_start: usize,
    pub range_end: usize,
    pub bytes_used: usize,
}

impl PlannedBucket {
    pub fn items_count(&self) -> usize {
        self.range_end - self.range_start
    }
}

/// Canonical serialised byte length of one item — the unit the size cap is
/// measured in.
pub fn item_size(item: &Value) -> usize {
    serde_json::to_vec(item).map(|bytes| bytes.len()).unwrap_or(0)
}

/// Normalise `config` in place so that the largest item in `items` always
/// fits in a single bucket: while the largest item exceeds the cap and more
/// than one bucket is allowed, halve `max_buckets` (floor, min 1) and double
/// `max_bucket_bytes`; if it still doesn't fit, force `max_bucket_bytes` to
/// twice the largest item. Monotonic: buckets only shrink, bytes only grow.
pub fn normalize_bucket_config(items: &[Value], config: &mut BucketConfig) {
    let largest = items.iter().map(item_size).max().unwrap_or(0);
    while largest > config.max_bucket_bytes && config.max_buckets > 1 {
        config.max_buckets = (config.max_buckets / 2).max(1);
        config.max_bucket_bytes *= 2;
    }
    if largest > config.max_bucket_bytes {
        config.max_bucket_bytes = largest * 2;
    }
}

/// Compute the next free contiguous range not covered by `covered` (the
/// union of finished result ranges and currently-assigned lease ranges).
/// `config` must already be normalised. Returns `None` when every item is
/// covered.
pub fn select_bucket(items: &[Value], config: &BucketConfig, covered: &[(usize, usize)]) -> Option<PlannedBucket> {
    let n = items.len();
    if n == 0 {
        return None;
    }
    let is_covered = |idx: usize| covered.iter().any(|&(s, e)| idx >= s && idx < e);

    let mut start = 0usize;
    while start < n && is_covered(start) {
        start += 1;
    }
    if start >= n {
        return None;
    }

    let mut end = start;
    let mut bytes_used = 0usize;
    while end < n && !is_covered(end) {
        let size = item_size(&items[end]);
        if end > start && bytes_used + size > config.max_bucket_bytes {
            break;
        }
        bytes_used += size;
        end += 1;
    }

    Some(PlannedBucket {
        range_start: start,
        range_end: end,
        bytes_used,
    })
}
