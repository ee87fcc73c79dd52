//! Bucket assignment (lease) model (§3) — exists only while a bucket is in
//! flight; deleted on terminal result, drop, revoke, or expiry sweep.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAssignment {
    pub task_id: String,
    pub bucket_index: u64,
    pub worker_id: String,

    pub range_start: usize,
    pub range_end: usize,

    pub assigned_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub processed_count: usize,
    pub progress_range_end: usize,
    pub bytes_used: usize,
    pub last_batch_offset: Option<usize>,
    pub last_batch_size: Option<usize>,
}

impl BucketAssignment {
    pub fn new(
        task_id: String,
        bucket_index: u64,
        worker_id: String,
        range_start: usize,
        range_end: usize,
        bytes_used: usize,
        lease_ttl: std::time::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            bucket_index,
            worker_id,
            range_start,
            range_end,
            assigned_at: now,
            expires_at: now + ChronoDuration::from_std(lease_ttl).unwrap_or(ChronoDuration::zero()),
            updated_at: now,
            processed_count: 0,
            progress_range_end: range_start,
            bytes_used,
            last_batch_offset: None,
            last_batch_size: None,
        }
    }

    pub fn range(&self) -> (usize, usize) {
        (self.range_start, self.range_end)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn refresh(&mut self, lease_ttl: std::time::Duration) {
        let now = Utc::now();
        self.expires_at = now + ChronoDuration::from_std(lease_ttl).unwrap_or(ChronoDuration::zero());
        self.updated_at = now;
    }
}
