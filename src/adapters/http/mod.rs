//! HTTP adapters: the agent, web UI, and control surfaces.

pub mod agent_api;
pub mod auth;
pub mod control_api;
pub mod error;
pub mod sse;
pub mod web_api;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::ports::{
    AttackRepository, CampaignRepository, HashListRepository, TaskRepository,
};
use crate::services::{
    AgentRegistry, CrackIngestor, EventBus, ProgressReconciler, TaskScheduler,
};

/// Shared handler state: the core services plus read access to the
/// repositories for plain GET endpoints.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub scheduler: Arc<TaskScheduler>,
    pub reconciler: Arc<ProgressReconciler>,
    pub ingestor: Arc<CrackIngestor>,
    pub events: Arc<EventBus>,
    pub tasks: Arc<dyn TaskRepository>,
    pub attacks: Arc<dyn AttackRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub hash_lists: Arc<dyn HashListRepository>,
}

/// Deadline on any core operation; exceeded requests fail retryably.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Assemble the full application router: all three surfaces under their
/// versioned prefixes, request tracing, the operation deadline, and CORS
/// for the web UI.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/client", agent_api::router())
        .nest(
            "/api/v1/web",
            web_api::router().layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .nest("/api/v1/control", control_api::router())
        .layer(middleware::from_fn(enforce_deadline))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cut requests off at [`OPERATION_TIMEOUT`]. Row locks are released with
/// the dropped future; callers may retry.
async fn enforce_deadline(request: Request, next: Next) -> Response {
    match tokio::time::timeout(OPERATION_TIMEOUT, next.run(request)).await {
        Ok(response) => response,
        Err(_) => StatusCode::GATEWAY_TIMEOUT.into_response(),
    }
}
