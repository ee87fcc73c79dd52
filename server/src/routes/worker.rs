//! Worker-facing endpoints (§6): the hot path the spec's control-flow
//! summary (§2) walks through.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use dispatch_core::aggregator::{IncomingItem, ProgressBatch, TerminalBucket};
use dispatch_core::allocator::NextBucketOutcome;
use dispatch_core::models::bucket_result::{BucketStatus, ItemStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextChunkBody {
    pub task_id: String,
    pub worker_id: String,
}

pub async fn next_chunk(State(state): State<AppState>, Json(body): Json<NextChunkBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.service.next_bucket(&body.task_id, &body.worker_id).await?;
    match outcome {
        NextBucketOutcome::Granted {
            bucket_index,
            range_start,
            range_end,
            bytes_used,
            resume,
        } => {
            let chunk_data = state.service.item_slice(&body.task_id, range_start, range_end);
            Ok(Json(serde_json::json!({
                "ok": true,
                "bucketIndex": bucket_index,
                "chunkData": chunk_data,
                "rangeStart": range_start,
                "rangeEnd": range_end,
                "bucketBytes": bytes_used,
                "resume": resume,
            })))
        }
        NextBucketOutcome::Declined(reason) => Ok(Json(serde_json::json!({
            "ok": false,
            "message": reason.as_wire_str(),
        }))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireItem {
    pub local_index: usize,
    pub status: ItemStatus,
    #[serde(default)]
    pub input_preview: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<WireItem> for IncomingItem {
    fn from(item: WireItem) -> Self {
        IncomingItem {
            local_index: item.local_index,
            status: item.status,
            input_preview: item.input_preview,
            output: item.output,
            error: item.error,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordProgressBody {
    pub task_id: String,
    pub bucket_index: u64,
    pub worker_id: String,
    pub range_start: usize,
    pub items_processed: usize,
    pub total_items: usize,
    pub bytes_used: usize,
    #[serde(default)]
    pub items: Vec<WireItem>,
    #[serde(default)]
    pub batch_offset: Option<usize>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

pub async fn record_progress(State(state): State<AppState>, Json(body): Json<RecordProgressBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let batch = ProgressBatch {
        worker_id: body.worker_id,
        range_start: body.range_start,
        items_processed: body.items_processed,
        bytes_used: body.bytes_used,
        items: body.items.into_iter().map(Into::into).collect(),
        batch_offset: body.batch_offset,
        batch_size: body.batch_size,
    };
    let result = state.service.record_progress(&body.task_id, body.bucket_index, batch).await?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "processed": result.processed_items,
        "total": body.total_items,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBody {
    pub start: usize,
    pub end: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordChunkBody {
    pub task_id: String,
    pub bucket_index: u64,
    pub worker_id: String,
    #[serde(default)]
    pub status: Option<BucketStatus>,
    pub range: RangeBody,
    #[serde(default)]
    pub item_results: Vec<WireItem>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn record_chunk(State(state): State<AppState>, Json(body): Json<RecordChunkBody>) -> Result<Json<serde_json::Value>, ApiError> {
    let terminal = TerminalBucket {
        worker_id: body.worker_id,
        range_start: body.range.start,
        range_end: body.range.end,
        status: body.status,
        item_results: body.item_results.into_iter().map(Into::into).collect(),
        output: body.output,
        error: body.error,
    };
    let (_, receipt) = state.service.record_bucket(&body.task_id, body.bucket_index, terminal).await?;
    match receipt {
        Some(receipt) => Ok(Json(serde_json::json!({
            "ok": true,
            "payout": {
                "debit": receipt.debit,
                "credit": receipt.credit,
                "platformFee": receipt.platform_fee,
            },
        }))),
        None => Ok(Json(serde_json::json!({ "ok": true }))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatBody {
    pub worker_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatResponse {
    ok: bool,
    server_time: chrono::DateTime<Utc>,
}

pub async fn heartbeat(State(state): State<AppState>, Json(body): Json<HeartbeatBody>) -> Json<HeartbeatResponse> {
    let now = state.service.heartbeat(&body.worker_id).await;
    Json(HeartbeatResponse { ok: true, server_time: now })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OnlineResponse {
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_heartbeat: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_ms: Option<i64>,
}

pub async fn online(State(state): State<AppState>, Path(worker_id): Path<String>) -> Json<OnlineResponse> {
    let (online, last_heartbeat, age_ms) = state.service.online_status(&worker_id);
    Json(OnlineResponse {
        online,
        last_heartbeat,
        age_ms,
    })
}
