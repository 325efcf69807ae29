//! Web UI HTTP surface (`/api/v1/web/...`).
//!
//! CRUD over campaigns, attacks, agents, and hash lists, progress
//! metrics, and SSE live streams. Requests are lenient (unknown fields
//! ignored); errors are FastAPI-style `{"detail": ...}` bodies. The JWT
//! itself is validated upstream; only presence is checked here.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    attack::mask_keyspace, Attack, AttackMode, Campaign, CampaignState, HashItem, HashList,
};
use crate::services::{canonicalize_hash, AdminAgentPatch, EntityKind};

use super::auth::require_web_session;
use super::error::WebApiError;
use super::sse::live_stream;
use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route("/campaigns/:id", get(get_campaign).patch(update_campaign).delete(delete_campaign))
        .route("/campaigns/:id/start", post(start_campaign))
        .route("/campaigns/:id/pause", post(pause_campaign))
        .route("/campaigns/:id/resume", post(resume_campaign))
        .route("/campaigns/:id/archive", post(archive_campaign))
        .route("/campaigns/:id/progress", get(campaign_progress))
        .route("/campaigns/:id/attacks", get(list_attacks).post(create_attack))
        .route("/attacks/:id", get(get_attack).patch(update_attack).delete(delete_attack))
        .route("/agents", get(list_agents).post(create_agent))
        .route("/agents/:id", get(get_agent).patch(update_agent))
        .route("/agents/:id/errors", get(agent_errors))
        .route("/hash_lists", get(list_hash_lists).post(create_hash_list))
        .route("/hash_lists/:id", get(get_hash_list))
        .route("/hash_lists/:id/items", get(list_hash_items).post(upload_hash_items))
        .route("/live/campaigns", get(live_campaigns))
        .route("/live/agents", get(live_agents))
        .route("/live/toasts", get(live_toasts))
}

// ---------- campaigns ----------

#[derive(Debug, Deserialize)]
struct CreateCampaignRequest {
    project_id: Uuid,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: i32,
    hash_list_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct UpdateCampaignRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
}

#[derive(Debug, Serialize)]
struct CampaignResponse {
    id: Uuid,
    project_id: Uuid,
    name: String,
    description: Option<String>,
    priority: i32,
    hash_list_id: Uuid,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            project_id: c.project_id,
            name: c.name,
            description: c.description,
            priority: c.priority,
            hash_list_id: c.hash_list_id,
            state: c.state.as_str().to_string(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

async fn list_campaigns(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<CampaignResponse>>, WebApiError> {
    require_web_session(&headers)?;
    let campaigns = state.campaigns.list().await?;
    Ok(Json(campaigns.into_iter().map(Into::into).collect()))
}

async fn create_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), WebApiError> {
    require_web_session(&headers)?;

    state
        .hash_lists
        .get(request.hash_list_id)
        .await?
        .ok_or_else(|| DomainError::not_found("hash_list", request.hash_list_id))?;

    let mut campaign = Campaign::new(request.project_id, request.name, request.hash_list_id)
        .with_priority(request.priority);
    campaign.description = request.description;
    state.campaigns.create(&campaign).await?;
    state.events.emit(EntityKind::Campaign, campaign.id);

    Ok((StatusCode::CREATED, Json(campaign.into())))
}

async fn get_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, WebApiError> {
    require_web_session(&headers)?;
    let campaign = load_campaign(&state, id).await?;
    Ok(Json(campaign.into()))
}

async fn update_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, WebApiError> {
    require_web_session(&headers)?;
    let mut campaign = load_campaign(&state, id).await?;

    if let Some(name) = request.name {
        campaign.name = name;
    }
    if let Some(description) = request.description {
        campaign.description = Some(description);
    }
    if let Some(priority) = request.priority {
        campaign.priority = priority;
    }
    campaign.updated_at = Utc::now();

    state.campaigns.update(&campaign).await?;
    state.events.emit(EntityKind::Campaign, id);
    Ok(Json(campaign.into()))
}

async fn delete_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, WebApiError> {
    require_web_session(&headers)?;
    let campaign = load_campaign(&state, id).await?;

    if campaign.state == CampaignState::Active {
        return Err(WebApiError::from(DomainError::Conflict(
            "pause the campaign before deleting it".to_string(),
        )));
    }

    state.campaigns.delete(id).await?;
    state.events.emit(EntityKind::Campaign, id);
    Ok(StatusCode::NO_CONTENT)
}

async fn start_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, WebApiError> {
    require_web_session(&headers)?;
    let campaign = state.scheduler.start_campaign(id).await?;
    Ok(Json(campaign.into()))
}

async fn pause_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, WebApiError> {
    require_web_session(&headers)?;
    let campaign = state.scheduler.pause_campaign(id).await?;
    Ok(Json(campaign.into()))
}

async fn resume_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, WebApiError> {
    require_web_session(&headers)?;
    let campaign = state.scheduler.resume_campaign(id).await?;
    Ok(Json(campaign.into()))
}

async fn archive_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, WebApiError> {
    require_web_session(&headers)?;
    let mut campaign = load_campaign(&state, id).await?;
    campaign
        .transition_to(CampaignState::Archived)
        .map_err(DomainError::Conflict)?;
    state.campaigns.update(&campaign).await?;
    state.events.emit(EntityKind::Campaign, id);
    Ok(Json(campaign.into()))
}

#[derive(Debug, Serialize)]
struct AttackProgress {
    attack_id: Uuid,
    position: u32,
    state: String,
    total_keyspace: u64,
    tasks: HashMap<String, u64>,
}

#[derive(Debug, Serialize)]
struct CampaignProgressResponse {
    campaign_id: Uuid,
    state: String,
    item_count: u64,
    cracked_count: u64,
    attacks: Vec<AttackProgress>,
}

async fn campaign_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignProgressResponse>, WebApiError> {
    require_web_session(&headers)?;
    let campaign = load_campaign(&state, id).await?;
    let list = state
        .hash_lists
        .get(campaign.hash_list_id)
        .await?
        .ok_or_else(|| DomainError::not_found("hash_list", campaign.hash_list_id))?;

    let mut attacks = Vec::new();
    for attack in state.attacks.list_by_campaign(id).await? {
        let counts = state.tasks.count_by_state(attack.id).await?;
        attacks.push(AttackProgress {
            attack_id: attack.id,
            position: attack.position,
            state: attack.state.as_str().to_string(),
            total_keyspace: attack.total_keyspace,
            tasks: counts
                .into_iter()
                .map(|(s, n)| (s.as_str().to_string(), n))
                .collect(),
        });
    }

    Ok(Json(CampaignProgressResponse {
        campaign_id: id,
        state: campaign.state.as_str().to_string(),
        item_count: list.item_count,
        cracked_count: list.cracked_count,
        attacks,
    }))
}

// ---------- attacks ----------

#[derive(Debug, Deserialize)]
struct CreateAttackRequest {
    #[serde(default)]
    position: Option<u32>,
    mode: String,
    #[serde(default)]
    wordlists: Vec<String>,
    #[serde(default)]
    rule_list: Option<String>,
    #[serde(default)]
    masks: Vec<String>,
    #[serde(default)]
    custom_charsets: Vec<String>,
    #[serde(default)]
    min_length: Option<u32>,
    #[serde(default)]
    max_length: Option<u32>,
    #[serde(default)]
    increment: bool,
    #[serde(default)]
    workload_profile: Option<u8>,
    #[serde(default)]
    optimized: Option<bool>,
    /// Required for wordlist-backed modes; derived from the masks when
    /// omitted on mask attacks.
    #[serde(default)]
    total_keyspace: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UpdateAttackRequest {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    wordlists: Option<Vec<String>>,
    #[serde(default)]
    rule_list: Option<String>,
    #[serde(default)]
    masks: Option<Vec<String>>,
    #[serde(default)]
    custom_charsets: Option<Vec<String>>,
    #[serde(default)]
    min_length: Option<u32>,
    #[serde(default)]
    max_length: Option<u32>,
    #[serde(default)]
    increment: Option<bool>,
    #[serde(default)]
    workload_profile: Option<u8>,
    #[serde(default)]
    optimized: Option<bool>,
    #[serde(default)]
    total_keyspace: Option<u64>,
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
    complexity_score: f64,
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
            complexity_score: a.complexity_score,
            state: a.state.as_str().to_string(),
        }
    }
}

async fn list_attacks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Vec<AttackResponse>>, WebApiError> {
    require_web_session(&headers)?;
    let attacks = state.attacks.list_by_campaign(campaign_id).await?;
    Ok(Json(attacks.into_iter().map(Into::into).collect()))
}

async fn create_attack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(campaign_id): Path<Uuid>,
    Json(request): Json<CreateAttackRequest>,
) -> Result<(StatusCode, Json<AttackResponse>), WebApiError> {
    require_web_session(&headers)?;
    let campaign = load_campaign(&state, campaign_id).await?;

    let mode = AttackMode::parse_str(&request.mode)
        .ok_or_else(|| WebApiError::bad_request(format!("unknown attack mode: {}", request.mode)))?;

    let position = match request.position {
        Some(p) if p >= 1 => p,
        Some(_) => return Err(WebApiError::bad_request("position starts at 1")),
        None => state.attacks.list_by_campaign(campaign_id).await?.len() as u32 + 1,
    };

    let total_keyspace = resolve_keyspace(request.total_keyspace, &request.masks)?;

    let mut attack = Attack::new(campaign_id, position, mode).with_keyspace(total_keyspace);
    attack.wordlists = request.wordlists;
    attack.rule_list = request.rule_list;
    attack.masks = request.masks;
    attack.custom_charsets = request.custom_charsets;
    attack.min_length = request.min_length;
    attack.max_length = request.max_length;
    attack.increment = request.increment;
    if let Some(workload_profile) = request.workload_profile {
        attack.workload_profile = workload_profile;
    }
    if let Some(optimized) = request.optimized {
        attack.optimized = optimized;
    }

    state.attacks.create(&attack).await?;

    // Attacks added to a live campaign are planned right away; drafts
    // plan when the campaign starts.
    if campaign.state == CampaignState::Active {
        state.scheduler.ensure_planned(attack.id).await?;
    }

    state.events.emit(EntityKind::Attack, attack.id);
    Ok((StatusCode::CREATED, Json(attack.into())))
}

async fn get_attack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AttackResponse>, WebApiError> {
    require_web_session(&headers)?;
    let attack = load_attack(&state, id).await?;
    Ok(Json(attack.into()))
}

async fn update_attack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAttackRequest>,
) -> Result<Json<AttackResponse>, WebApiError> {
    require_web_session(&headers)?;

    // Pause/resume travels through the scheduler so held tasks are
    // preempted or re-armed consistently.
    if let Some(raw) = &request.state {
        let attack = match raw.as_str() {
            "paused" => state.scheduler.pause_attack(id).await?,
            "running" | "pending" => state.scheduler.resume_attack(id).await?,
            other => {
                return Err(WebApiError::bad_request(format!(
                    "attack state cannot be set to {other}"
                )))
            }
        };
        return Ok(Json(attack.into()));
    }

    let mut attack = load_attack(&state, id).await?;
    let mut reconfigured = false;

    if let Some(wordlists) = request.wordlists {
        attack.wordlists = wordlists;
        reconfigured = true;
    }
    if let Some(rule_list) = request.rule_list {
        attack.rule_list = Some(rule_list);
        reconfigured = true;
    }
    if let Some(masks) = request.masks {
        attack.masks = masks;
        reconfigured = true;
    }
    if let Some(custom_charsets) = request.custom_charsets {
        attack.custom_charsets = custom_charsets;
        reconfigured = true;
    }
    if let Some(min_length) = request.min_length {
        attack.min_length = Some(min_length);
        reconfigured = true;
    }
    if let Some(max_length) = request.max_length {
        attack.max_length = Some(max_length);
        reconfigured = true;
    }
    if let Some(increment) = request.increment {
        attack.increment = increment;
        reconfigured = true;
    }
    if let Some(workload_profile) = request.workload_profile {
        attack.workload_profile = workload_profile;
    }
    if let Some(optimized) = request.optimized {
        attack.optimized = optimized;
    }
    if let Some(total) = request.total_keyspace {
        attack = attack.with_keyspace(total);
    } else if reconfigured && !attack.masks.is_empty() {
        let total = attack.masks.iter().map(|m| mask_keyspace(m)).sum();
        attack = attack.with_keyspace(total);
    }
    attack.updated_at = Utc::now();
    state.attacks.update(&attack).await?;

    // Any configuration change invalidates in-flight slices.
    if reconfigured && !attack.state.is_terminal() {
        state.scheduler.rebalance_attack(id).await?;
    }

    state.events.emit(EntityKind::Attack, id);
    let attack = load_attack(&state, id).await?;
    Ok(Json(attack.into()))
}

async fn delete_attack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, WebApiError> {
    require_web_session(&headers)?;
    let attack = load_attack(&state, id).await?;

    // Free any holding agents before the cascade removes their tasks.
    for task in state.tasks.list_by_attack(id).await? {
        if task.state.is_held() {
            state
                .scheduler
                .release_task(task.id, crate::domain::models::TaskState::Pending)
                .await?;
        }
    }

    state.attacks.delete(attack.id).await?;
    state.events.emit(EntityKind::Attack, id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------- agents ----------

#[derive(Debug, Serialize)]
struct AgentSummary {
    id: Uuid,
    label: Option<String>,
    host_name: String,
    operating_system: String,
    state: String,
    activity: String,
    devices: Vec<String>,
    last_seen_at: Option<DateTime<Utc>>,
    assigned_task_id: Option<Uuid>,
}

impl From<crate::domain::models::Agent> for AgentSummary {
    fn from(a: crate::domain::models::Agent) -> Self {
        Self {
            id: a.id,
            label: a.label,
            host_name: a.host_name,
            operating_system: a.operating_system,
            state: a.state.as_str().to_string(),
            activity: a.activity.as_str().to_string(),
            devices: a.devices,
            last_seen_at: a.last_seen_at,
            assigned_task_id: a.assigned_task_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct AgentErrorResponse {
    id: Uuid,
    severity: String,
    message: String,
    task_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ErrorsQuery {
    #[serde(default = "default_error_limit")]
    limit: u32,
}

fn default_error_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
struct CreateAgentRequest {
    host_name: String,
    #[serde(default = "default_os")]
    operating_system: String,
    #[serde(default = "default_signature")]
    client_signature: String,
    #[serde(default)]
    devices: Vec<String>,
}

fn default_os() -> String {
    "unknown".to_string()
}

fn default_signature() -> String {
    "unregistered".to_string()
}

/// The one place the bearer token is ever shown.
#[derive(Debug, Serialize)]
struct AgentCreatedResponse {
    id: Uuid,
    token: String,
    state: String,
}

async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AgentSummary>>, WebApiError> {
    require_web_session(&headers)?;
    let agents = state.registry.list().await?;
    Ok(Json(agents.into_iter().map(Into::into).collect()))
}

async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<AgentCreatedResponse>), WebApiError> {
    require_web_session(&headers)?;
    let agent = state
        .registry
        .register(
            request.client_signature,
            request.host_name,
            request.operating_system,
            request.devices,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AgentCreatedResponse {
            id: agent.id,
            token: agent.token,
            state: agent.state.as_str().to_string(),
        }),
    ))
}

async fn get_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentSummary>, WebApiError> {
    require_web_session(&headers)?;
    let agent = state.registry.get(id).await?;
    Ok(Json(agent.into()))
}

async fn update_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<AdminAgentPatch>,
) -> Result<Json<AgentSummary>, WebApiError> {
    require_web_session(&headers)?;
    let agent = state.registry.update_from_admin(id, patch).await?;
    Ok(Json(agent.into()))
}

async fn agent_errors(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<ErrorsQuery>,
) -> Result<Json<Vec<AgentErrorResponse>>, WebApiError> {
    require_web_session(&headers)?;
    let errors = state.registry.errors(id, query.limit).await?;
    Ok(Json(
        errors
            .into_iter()
            .map(|e| AgentErrorResponse {
                id: e.id,
                severity: e.severity.as_str().to_string(),
                message: e.message,
                task_id: e.task_id,
                created_at: e.created_at,
            })
            .collect(),
    ))
}

// ---------- hash lists ----------

#[derive(Debug, Deserialize)]
struct CreateHashListRequest {
    project_id: Uuid,
    name: String,
    hash_type: u32,
}

#[derive(Debug, Serialize)]
struct HashListResponse {
    id: Uuid,
    project_id: Uuid,
    name: String,
    hash_type: u32,
    item_count: u64,
    cracked_count: u64,
}

impl From<HashList> for HashListResponse {
    fn from(l: HashList) -> Self {
        Self {
            id: l.id,
            project_id: l.project_id,
            name: l.name,
            hash_type: l.hash_type,
            item_count: l.item_count,
            cracked_count: l.cracked_count,
        }
    }
}

#[derive(Debug, Serialize)]
struct HashItemResponse {
    id: Uuid,
    hash_value: String,
    salt: Option<String>,
    cracked: bool,
    plaintext: Option<String>,
    cracked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ItemsQuery {
    #[serde(default)]
    cracked: Option<bool>,
}

async fn list_hash_lists(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<HashListResponse>>, WebApiError> {
    require_web_session(&headers)?;
    let lists = state.hash_lists.list().await?;
    Ok(Json(lists.into_iter().map(Into::into).collect()))
}

async fn create_hash_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateHashListRequest>,
) -> Result<(StatusCode, Json<HashListResponse>), WebApiError> {
    require_web_session(&headers)?;
    let list = HashList::new(request.project_id, request.name, request.hash_type);
    state.hash_lists.create(&list).await?;
    Ok((StatusCode::CREATED, Json(list.into())))
}

async fn get_hash_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<HashListResponse>, WebApiError> {
    require_web_session(&headers)?;
    let list = state
        .hash_lists
        .get(id)
        .await?
        .ok_or_else(|| DomainError::not_found("hash_list", id))?;
    Ok(Json(list.into()))
}

async fn list_hash_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<Vec<HashItemResponse>>, WebApiError> {
    require_web_session(&headers)?;
    let items = state.hash_lists.list_items(id, query.cracked).await?;
    Ok(Json(
        items
            .into_iter()
            .map(|i| HashItemResponse {
                id: i.id,
                hash_value: i.hash_value,
                salt: i.salt,
                cracked: i.cracked,
                plaintext: i.plaintext,
                cracked_at: i.cracked_at,
            })
            .collect(),
    ))
}

/// Upload hash material as newline-separated text. Values are
/// canonicalised for the list's hash type; duplicates are skipped.
async fn upload_hash_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<serde_json::Value>, WebApiError> {
    require_web_session(&headers)?;
    let list = state
        .hash_lists
        .get(id)
        .await?
        .ok_or_else(|| DomainError::not_found("hash_list", id))?;

    let items: Vec<HashItem> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| HashItem::new(id, canonicalize_hash(line, list.hash_type)))
        .collect();
    if items.is_empty() {
        return Err(WebApiError::bad_request("no hash values in upload"));
    }

    let added = state.hash_lists.add_items(id, &items).await?;
    let list = state
        .hash_lists
        .get(id)
        .await?
        .ok_or_else(|| DomainError::not_found("hash_list", id))?;

    Ok(Json(serde_json::json!({
        "added": added,
        "item_count": list.item_count,
    })))
}

// ---------- live streams ----------

async fn live_campaigns(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, WebApiError> {
    require_web_session(&headers)?;
    Ok(live_stream(&state.events, &[EntityKind::Campaign, EntityKind::Attack, EntityKind::Task]))
}

async fn live_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, WebApiError> {
    require_web_session(&headers)?;
    Ok(live_stream(&state.events, &[EntityKind::Agent]))
}

async fn live_toasts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, WebApiError> {
    require_web_session(&headers)?;
    Ok(live_stream(&state.events, &[EntityKind::Crack]))
}

// ---------- helpers ----------

async fn load_campaign(state: &AppState, id: Uuid) -> Result<Campaign, WebApiError> {
    Ok(state
        .campaigns
        .get(id)
        .await?
        .ok_or_else(|| DomainError::not_found("campaign", id))?)
}

async fn load_attack(state: &AppState, id: Uuid) -> Result<Attack, WebApiError> {
    Ok(state
        .attacks
        .get(id)
        .await?
        .ok_or_else(|| DomainError::not_found("attack", id))?)
}

/// An explicit keyspace wins; mask attacks can derive one from their
/// masks; anything else must say how big it is.
fn resolve_keyspace(explicit: Option<u64>, masks: &[String]) -> Result<u64, WebApiError> {
    if let Some(total) = explicit {
        return Ok(total);
    }
    if !masks.is_empty() {
        return Ok(masks.iter().map(|m| mask_keyspace(m)).sum());
    }
    Err(WebApiError::bad_request(
        "total_keyspace is required when no masks are given",
    ))
}
