//! Control HTTP surface (`/api/v1/control/...`).
//!
//! Automation-facing bulk operations over campaign id lists. Bearer
//! tokens carry the `cst_` prefix; errors are RFC 9457 problem documents.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;

use super::auth::control_user;
use super::error::ProblemError;
use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/campaigns/start", post(start_campaigns))
        .route("/campaigns/stop", post(stop_campaigns))
        .route("/campaigns/status", get(campaigns_status))
}

#[derive(Debug, Deserialize)]
struct BulkCampaignRequest {
    campaign_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
struct BulkOutcome {
    id: Uuid,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    /// Comma-separated campaign ids
    ids: String,
}

#[derive(Debug, Serialize)]
struct CampaignStatus {
    id: Uuid,
    state: String,
}

async fn start_campaigns(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkCampaignRequest>,
) -> Result<Json<Vec<BulkOutcome>>, ProblemError> {
    control_user(&headers)?;

    let mut outcomes = Vec::with_capacity(request.campaign_ids.len());
    for id in request.campaign_ids {
        let outcome = match state.scheduler.start_campaign(id).await {
            Ok(_) => BulkOutcome { id, status: "started".to_string(), detail: None },
            Err(e) => BulkOutcome { id, status: "error".to_string(), detail: Some(e.to_string()) },
        };
        outcomes.push(outcome);
    }
    Ok(Json(outcomes))
}

async fn stop_campaigns(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkCampaignRequest>,
) -> Result<Json<Vec<BulkOutcome>>, ProblemError> {
    control_user(&headers)?;

    let mut outcomes = Vec::with_capacity(request.campaign_ids.len());
    for id in request.campaign_ids {
        let outcome = match state.scheduler.pause_campaign(id).await {
            Ok(_) => BulkOutcome { id, status: "stopped".to_string(), detail: None },
            Err(e) => BulkOutcome { id, status: "error".to_string(), detail: Some(e.to_string()) },
        };
        outcomes.push(outcome);
    }
    Ok(Json(outcomes))
}

async fn campaigns_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<CampaignStatus>>, ProblemError> {
    control_user(&headers)?;

    let mut statuses = Vec::new();
    for raw in query.ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = Uuid::parse_str(raw)
            .map_err(|_| DomainError::Malformed(format!("invalid campaign id: {raw}")))?;
        let campaign = state
            .campaigns
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", id))?;
        statuses.push(CampaignStatus { id, state: campaign.state.as_str().to_string() });
    }
    Ok(Json(statuses))
}
