//! Agent HTTP surface (`/api/v1/client/...`).
//!
//! The v1 wire contract the agent fleet speaks: bearer tokens with the
//! `csa_` prefix, strict request bodies (unknown fields rejected), and
//! the legacy `{"error": "<message>"}` error shape. Task slices are
//! exposed as `skip`/`limit` pairs.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, AgentActivity, Attack, CrackOutcome, DeviceStatusReport, ErrorSeverity, StatusReport,
    Task,
};
use crate::services::{AgentInfoPatch, BenchmarkEntry};

use super::auth::authenticated_agent;
use super::error::AgentApiError;
use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/authenticate", get(authenticate))
        .route("/configuration", get(configuration))
        .route("/agents/:id", get(get_agent).put(update_agent))
        .route("/agents/:id/heartbeat", post(heartbeat))
        .route("/agents/:id/submit_benchmark", post(submit_benchmark))
        .route("/agents/:id/submit_error", post(submit_error))
        .route("/agents/:id/shutdown", post(shutdown))
        .route("/tasks/new", get(new_task))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id/accept_task", post(accept_task))
        .route("/tasks/:id/submit_status", post(submit_status))
        .route("/tasks/:id/submit_crack", post(submit_crack))
        .route("/tasks/:id/exhausted", post(exhausted))
        .route("/tasks/:id/abandon", post(abandon))
        .route("/tasks/:id/get_zaps", post(get_zaps))
        .route("/attacks/:id", get(get_attack))
        .route("/attacks/:id/hash_list", get(attack_hash_list))
}

// ---------- wire types ----------

#[derive(Debug, Serialize)]
struct AgentResponse {
    id: Uuid,
    label: Option<String>,
    host_name: String,
    operating_system: String,
    client_signature: String,
    devices: Vec<String>,
    state: String,
    activity: String,
    last_seen_at: Option<DateTime<Utc>>,
    last_ip: Option<String>,
    assigned_task_id: Option<Uuid>,
}

impl From<Agent> for AgentResponse {
    fn from(a: Agent) -> Self {
        Self {
            id: a.id,
            label: a.label,
            host_name: a.host_name,
            operating_system: a.operating_system,
            client_signature: a.client_signature,
            devices: a.devices,
            state: a.state.as_str().to_string(),
            activity: a.activity.as_str().to_string(),
            last_seen_at: a.last_seen_at,
            last_ip: a.last_ip,
            assigned_task_id: a.assigned_task_id,
        }
    }
}

/// Task as the v1 agents consume it: a `skip`/`limit` keyspace window.
#[derive(Debug, Serialize)]
struct TaskResponse {
    id: Uuid,
    attack_id: Uuid,
    skip: u64,
    limit: u64,
    state: String,
    progress_offset: u64,
    estimated_stop: Option<DateTime<Utc>>,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            attack_id: t.attack_id,
            skip: t.keyspace_offset,
            limit: t.keyspace_length,
            state: t.state.as_str().to_string(),
            progress_offset: t.progress_offset,
            estimated_stop: t.estimated_stop,
        }
    }
}

#[derive(Debug, Serialize)]
struct AttackResponse {
    id: Uuid,
    campaign_id: Uuid,
    position: u32,
    mode: String,
    wordlists: Vec<String>,
    rule_list: Option<String>,
    masks: Vec<String>,
    custom_charsets: Vec<String>,
    min_length: Option<u32>,
    max_length: Option<u32>,
    increment: bool,
    workload_profile: u8,
    optimized: bool,
    total_keyspace: u64,
    state: String,
}

impl From<Attack> for AttackResponse {
    fn from(a: Attack) -> Self {
        Self {
            id: a.id,
            campaign_id: a.campaign_id,
            position: a.position,
            mode: a.mode.as_str().to_string(),
            wordlists: a.wordlists,
            rule_list: a.rule_list,
            masks: a.masks,
            custom_charsets: a.custom_charsets,
            min_length: a.min_length,
            max_length: a.max_length,
            increment: a.increment,
            workload_profile: a.workload_profile,
            optimized: a.optimized,
            total_keyspace: a.total_keyspace,
            state: a.state.as_str().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeartbeatRequest {
    #[serde(default)]
    activity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubmitBenchmarkRequest {
    hashcat_benchmarks: Vec<BenchmarkEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubmitErrorRequest {
    severity: String,
    message: String,
    #[serde(default)]
    task_id: Option<Uuid>,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceStatusRequest {
    device_id: u32,
    device_name: String,
    speed: f64,
    #[serde(default)]
    utilization: Option<u8>,
    #[serde(default)]
    temperature: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubmitStatusRequest {
    timestamp: DateTime<Utc>,
    session: String,
    status: i32,
    /// `[processed, total]` within the slice
    progress: (u64, u64),
    restore_point: u64,
    #[serde(default)]
    recovered_hashes: u64,
    #[serde(default)]
    recovered_salts: u64,
    #[serde(default)]
    rejected: u64,
    #[serde(default)]
    estimated_stop: Option<DateTime<Utc>>,
    #[serde(default)]
    guess: Option<serde_json::Value>,
    #[serde(default)]
    device_statuses: Vec<DeviceStatusRequest>,
}

impl From<SubmitStatusRequest> for StatusReport {
    fn from(r: SubmitStatusRequest) -> Self {
        Self {
            timestamp: r.timestamp,
            session: r.session,
            status_code: r.status,
            progress_processed: r.progress.0,
            progress_total: r.progress.1,
            restore_point: r.restore_point,
            recovered_hashes: r.recovered_hashes,
            recovered_salts: r.recovered_salts,
            rejected: r.rejected,
            estimated_stop: r.estimated_stop,
            guess: r.guess,
            device_statuses: r
                .device_statuses
                .into_iter()
                .map(|d| DeviceStatusReport {
                    device_index: d.device_id,
                    device_name: d.device_name,
                    speed: d.speed,
                    utilization: d.utilization,
                    temperature: d.temperature,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubmitCrackRequest {
    timestamp: DateTime<Utc>,
    hash: String,
    plain_text: String,
}

// ---------- handlers ----------

async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    Ok(Json(json!({ "authenticated": true, "agent_id": agent.id })))
}

async fn configuration(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    Ok(Json(json!({
        "api_version": 1,
        "config": {
            "agent_update_interval": agent.config.effective_update_interval(),
            "use_native_hashcat": agent.config.use_native_hashcat,
            "backend_devices": agent.config.backend_devices,
            "opencl_devices": agent.config.opencl_devices,
            "enable_additional_hash_types": agent.config.enable_additional_hash_types,
            "enabled_devices": agent.config.enabled_devices,
        },
    })))
}

async fn get_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentResponse>, AgentApiError> {
    let agent = authenticated_self(&state, &headers, id).await?;
    Ok(Json(agent.into()))
}

async fn update_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<AgentInfoPatch>,
) -> Result<Json<AgentResponse>, AgentApiError> {
    authenticated_self(&state, &headers, id).await?;
    let agent = state.registry.update_from_agent(id, patch).await?;
    Ok(Json(agent.into()))
}

async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<HeartbeatRequest>>,
) -> Result<Response, AgentApiError> {
    authenticated_self(&state, &headers, id).await?;

    let activity = match body.and_then(|Json(b)| b.activity) {
        Some(raw) => Some(parse_activity(&raw)?),
        None => None,
    };
    let ip = client_ip(&headers);

    match state.registry.heartbeat(id, activity, ip).await? {
        Some(feedback) => Ok((StatusCode::OK, Json(json!({ "state": feedback.state }))).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn submit_benchmark(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitBenchmarkRequest>,
) -> Result<StatusCode, AgentApiError> {
    authenticated_self(&state, &headers, id).await?;
    state.registry.submit_benchmark(id, request.hashcat_benchmarks).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_error(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitErrorRequest>,
) -> Result<StatusCode, AgentApiError> {
    authenticated_self(&state, &headers, id).await?;

    let severity = ErrorSeverity::parse_str(&request.severity).ok_or_else(|| {
        AgentApiError::from(DomainError::Malformed(format!(
            "unknown severity: {}",
            request.severity
        )))
    })?;

    state
        .registry
        .submit_error(id, severity, request.task_id, request.message, request.metadata)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AgentApiError> {
    authenticated_self(&state, &headers, id).await?;
    state.registry.shutdown(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn new_task(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    match state.scheduler.request_task(agent.id).await? {
        Some(task) => Ok((StatusCode::OK, Json(TaskResponse::from(task))).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    let task = state
        .tasks
        .get(id)
        .await?
        .filter(|t| t.assigned_agent_id == Some(agent.id))
        .ok_or_else(|| AgentApiError::from(DomainError::not_found("task", id)))?;
    Ok(Json(task.into()))
}

async fn accept_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    state.scheduler.accept_task(agent.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitStatusRequest>,
) -> Result<Response, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    let report: StatusReport = request.into();

    match state.reconciler.submit_status(agent.id, id, &report).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
        // Stale reports are acknowledged without effect
        Err(DomainError::Stale) => Ok(StatusCode::ACCEPTED.into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn submit_crack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitCrackRequest>,
) -> Result<Response, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    let outcome = state
        .ingestor
        .submit_crack(agent.id, id, &request.hash, &request.plain_text, request.timestamp)
        .await?;

    match outcome {
        CrackOutcome::ListComplete => Ok(StatusCode::NO_CONTENT.into_response()),
        CrackOutcome::MoreRemain | CrackOutcome::AlreadyCracked => {
            Ok((StatusCode::OK, Json(json!({ "message": "hash accepted" }))).into_response())
        }
    }
}

async fn exhausted(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    state.scheduler.mark_exhausted(agent.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn abandon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    let new_state = state.scheduler.abandon_task(agent.id, id).await?;
    Ok(Json(json!({ "success": true, "state": new_state.as_str() })))
}

async fn get_zaps(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AgentApiError> {
    let agent = authenticated_agent(&state, &headers).await?;
    let zaps = state.ingestor.get_zaps(agent.id, id).await?;
    if zaps.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(plain_text(zaps))
}

async fn get_attack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AttackResponse>, AgentApiError> {
    authenticated_agent(&state, &headers).await?;
    let attack = state
        .attacks
        .get(id)
        .await?
        .ok_or_else(|| AgentApiError::from(DomainError::not_found("attack", id)))?;
    Ok(Json(attack.into()))
}

/// The attack's remaining work: every uncracked hash value, one per line.
async fn attack_hash_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AgentApiError> {
    authenticated_agent(&state, &headers).await?;
    let values = uncracked_for_attack(&state, id).await?;
    Ok(plain_text(values))
}

// ---------- helpers ----------

/// Authenticate and require the path id to be the caller itself.
async fn authenticated_self(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
) -> Result<Agent, AgentApiError> {
    let agent = authenticated_agent(state, headers).await?;
    if agent.id != id {
        return Err(AgentApiError::from(DomainError::Forbidden(
            "token does not match the requested agent".to_string(),
        )));
    }
    Ok(agent)
}

async fn uncracked_for_attack(state: &AppState, attack_id: Uuid) -> DomainResult<Vec<String>> {
    let attack = state
        .attacks
        .get(attack_id)
        .await?
        .ok_or_else(|| DomainError::not_found("attack", attack_id))?;
    let campaign = state
        .campaigns
        .get(attack.campaign_id)
        .await?
        .ok_or_else(|| DomainError::not_found("campaign", attack.campaign_id))?;
    state.hash_lists.uncracked_values(campaign.hash_list_id).await
}

fn parse_activity(raw: &str) -> Result<AgentActivity, AgentApiError> {
    AgentActivity::parse_str(raw).ok_or_else(|| {
        AgentApiError::from(DomainError::Malformed(format!("unknown activity: {raw}")))
    })
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn plain_text(lines: Vec<String>) -> Response {
    let mut body = lines.join("\n");
    body.push('\n');
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
