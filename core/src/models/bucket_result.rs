//! Bucket result model (§3) — the per-`(taskId, bucketIndex)` outcome
//! merged by `crate::aggregator`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounded per-result storage caps, per §4.3.
pub const MAX_ITEM_RESULTS_STORED: usize = 200;
pub const ITEM_PREVIEW_LIMIT: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStatus {
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl BucketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BucketStatus::Completed | BucketStatus::Failed | BucketStatus::Skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub local_index: usize,
    pub global_index: usize,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Truncate a preview/output string to [`ITEM_PREVIEW_LIMIT`] bytes, leaving
/// a visible marker the way §4.3 specifies.
pub fn truncate_preview(s: &str) -> String {
    if s.len() <= ITEM_PREVIEW_LIMIT {
        return s.to_string();
    }
    let mut end = ITEM_PREVIEW_LIMIT;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let dropped = s.len() - end;
    format!("{}... (+{} chars)", &s[..end], dropped)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketResult {
    pub task_id: String,
    pub bucket_index: u64,
    pub range_start: usize,
    pub range_end: usize,
    pub status: BucketStatus,
    pub processed_items: usize,
    pub bytes_used: usize,
    pub worker_id: String,

    pub item_results: Vec<ItemResult>,
    pub item_results_total: usize,
    pub item_results_truncated: bool,

    pub payout_issued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BucketResult {
    pub fn new(task_id: String, bucket_index: u64, range_start: usize, range_end: usize, worker_id: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            bucket_index,
            range_start,
            range_end,
            status: BucketStatus::Processing,
            processed_items: 0,
            bytes_used: 0,
            worker_id,
            item_results: Vec::new(),
            item_results_total: 0,
            item_results_truncated: false,
            payout_issued: false,
            payout_at: None,
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn items_count(&self) -> usize {
        self.range_end - self.range_start
    }

    pub fn range(&self) -> (usize, usize) {
        (self.range_start, self.range_end)
    }

    /// Insert/replace `item` keyed by `local_index`, keep the list sorted by
    /// `local_index`, and truncate from the front past the cap, per §4.3.
    pub fn upsert_item(&mut self, item: ItemResult) {
        let pos = self
            .item_results
            .iter()
            .position(|existing| existing.local_index == item.local_index);
        match pos {
            Some(pos) => self.item_results[pos] = item,
            None => {
                self.item_results_total += 1;
                let pos = self
                    .item_results
                    .binary_search_by_key(&item.local_index, |existing| existing.local_index)
                    .unwrap_or_else(|e| e);
                self.item_results.insert(pos, item);
            }
        }
        if self.item_results.len() > MAX_ITEM_RESULTS_STORED {
            let overflow = self.item_results.len() - MAX_ITEM_RESULTS_STORED;
            self.item_results.drain(0..overflow);
            self.item_results_truncated = true;
        }
    }
}
