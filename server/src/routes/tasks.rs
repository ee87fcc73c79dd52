//! Task CRUD and worker-opt-in endpoints (§6).

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use dispatch_core::lifecycle::CreateTaskInput;
use dispatch_core::models::task::{BucketConfig, TaskStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

/// Root directory uploaded code archives and data files are written under.
/// Out of scope per §1 ("choice of persistent store"); local disk is the
/// reference implementation's choice, the way the teacher keeps I/O at the
/// edges of its simulation core.
fn storage_root() -> std::path::PathBuf {
    std::env::var("STORAGE_DIR").unwrap_or_else(|_| "./data/uploads".to_string()).into()
}

#[derive(Serialize)]
struct TaskResponse {
    task: dispatch_core::models::Task,
}

pub async fn create_task(State(state): State<AppState>, Session(session): Session, mut multipart: Multipart) -> Result<Json<TaskResponse>, ApiError> {
    let mut name = None;
    let mut capability_required = String::new();
    let mut cost_per_bucket: Option<Decimal> = None;
    let mut max_billable_buckets: Option<u64> = None;
    let mut platform_fee_percent: Option<Decimal> = None;
    let mut data_bytes: Option<Vec<u8>> = None;
    let mut code_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(dispatch_core::error::DispatchError::Validation(e.to_string())))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "name" => name = Some(text(field).await?),
            "capabilityRequired" => capability_required = text(field).await?,
            "costPerBucket" => cost_per_bucket = Some(parse_decimal(&text(field).await?)?),
            "maxBillableBuckets" => max_billable_buckets = Some(parse_u64(&text(field).await?)?),
            "platformFeePercent" => platform_fee_percent = Some(parse_decimal(&text(field).await?)?),
            "data" => data_bytes = Some(bytes(field).await?),
            "code" => code_bytes = Some(bytes(field).await?),
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ApiError(dispatch_core::error::DispatchError::Validation("missing field: name".into())))?;
    let cost_per_bucket = cost_per_bucket
        .ok_or_else(|| ApiError(dispatch_core::error::DispatchError::Validation("missing field: costPerBucket".into())))?;
    let max_billable_buckets = max_billable_buckets
        .ok_or_else(|| ApiError(dispatch_core::error::DispatchError::Validation("missing field: maxBillableBuckets".into())))?;
    let platform_fee_percent = platform_fee_percent.unwrap_or(state.service.store().config.platform_fee_percent);
    let code_bytes =
        code_bytes.ok_or_else(|| ApiError(dispatch_core::error::DispatchError::Validation("missing file: code".into())))?;

    let items: Vec<serde_json::Value> = match data_bytes {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| ApiError(dispatch_core::error::DispatchError::Validation(format!("invalid data file: {e}"))))?,
        None => Vec::new(),
    };

    let task = state.service.create_task(CreateTaskInput {
        creator_id: session,
        name,
        capability_required,
        storage_ref: None,
        items,
        cost_per_bucket,
        max_billable_buckets,
        platform_fee_percent,
        bucket_config: None::<BucketConfig>,
    })?;

    // §4.7: artifacts live under a storage id equal to the task id, so
    // `delete_task` below can remove the same directory unconditionally.
    let dir = storage_root().join(&task.id);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError(dispatch_core::error::DispatchError::Internal(e.to_string())))?;
    tokio::fs::write(dir.join("archive.bin"), &code_bytes)
        .await
        .map_err(|e| ApiError(dispatch_core::error::DispatchError::Internal(e.to_string())))?;

    Ok(Json(TaskResponse { task }))
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError(dispatch_core::error::DispatchError::Validation(e.to_string())))
}

async fn bytes(field: axum::extract::multipart::Field<'_>) -> Result<Vec<u8>, ApiError> {
    Ok(field
        .bytes()
        .await
        .map_err(|e| ApiError(dispatch_core::error::DispatchError::Validation(e.to_string())))?
        .to_vec())
}

fn parse_decimal(raw: &str) -> Result<Decimal, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(dispatch_core::error::DispatchError::Validation(format!("invalid decimal: {raw}"))))
}

fn parse_u64(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(dispatch_core::error::DispatchError::Validation(format!("invalid integer: {raw}"))))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

#[derive(Serialize)]
struct TaskListResponse {
    tasks: Vec<dispatch_core::models::Task>,
}

pub async fn list_tasks(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Json<TaskListResponse> {
    let tasks = state.service.list_tasks(query.status).await;
    Json(TaskListResponse { tasks })
}

pub async fn claim(State(state): State<AppState>, Path(task_id): Path<String>, Session(session): Session) -> Result<Json<TaskResponse>, ApiError> {
    let task = state.service.claim(&task_id, &session).await?;
    Ok(Json(TaskResponse { task }))
}

pub async fn drop_task(State(state): State<AppState>, Path(task_id): Path<String>, Session(session): Session) -> Result<Json<TaskResponse>, ApiError> {
    let task = state.service.drop_worker(&task_id, &session).await?;
    Ok(Json(TaskResponse { task }))
}

pub async fn revoke(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<TaskResponse>, ApiError> {
    let task = state.service.revoke(&task_id).await?;
    Ok(Json(TaskResponse { task }))
}

pub async fn reinvoke(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<TaskResponse>, ApiError> {
    let task = state.service.reinvoke(&task_id).await?;
    Ok(Json(TaskResponse { task }))
}

pub async fn delete_task(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    state.service.delete_task(&task_id).await?;
    let dir = storage_root().join(&task_id);
    let _ = tokio::fs::remove_dir_all(dir).await;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultsResponse {
    results: Vec<dispatch_core::models::BucketResult>,
    assignments: Vec<dispatch_core::models::BucketAssignment>,
}

pub async fn results(State(state): State<AppState>, Path(task_id): Path<String>) -> Result<Json<ResultsResponse>, ApiError> {
    let view = state.service.results_for(&task_id).await?;
    Ok(Json(ResultsResponse {
        results: view.results,
        assignments: view.assignments,
    }))
}
