mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use cipherswarm::adapters::http::{build_router, AppState};
use helpers::harness::Harness;

const MD5: u32 = 0;
const MD5_HELLO: &str = "5d41402abc4b2a76b9719d911017c592";

fn app(h: &Harness) -> Router {
    build_router(AppState {
        registry: h.registry.clone(),
        scheduler: h.scheduler.clone(),
        reconciler: h.reconciler.clone(),
        ingestor: h.ingestor.clone(),
        events: h.events.clone(),
        tasks: h.tasks.clone(),
        attacks: h.attacks.clone(),
        campaigns: h.campaigns.clone(),
        hash_lists: h.hash_lists.clone(),
    })
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_token_yields_legacy_error_shape() {
    let h = Harness::new().await;
    let response = app(&h)
        .oneshot(get("/api/v1/client/authenticate", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body.get("error").is_some(), "expected legacy error body, got {body}");
}

#[tokio::test]
async fn authenticate_returns_the_agent_id() {
    let h = Harness::new().await;
    let agent = h.active_agent("rig-01", MD5, 1e6).await;

    let response = app(&h)
        .oneshot(get("/api/v1/client/authenticate", Some(&agent.token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], json!(true));
    assert_eq!(body["agent_id"], json!(agent.id));
}

#[tokio::test]
async fn task_flow_over_the_wire() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1e7).await;
    let router = app(&h);

    // Fetch work
    let response = router
        .clone()
        .oneshot(get("/api/v1/client/tasks/new", Some(&agent.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let task = body_json(response).await;
    assert_eq!(task["skip"], json!(0));
    assert_eq!(task["limit"], json!(1_000_000));
    let task_id = task["id"].as_str().unwrap().to_string();

    // Accept
    let response = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/client/tasks/{task_id}/accept_task"), &agent.token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Status
    let status_body = json!({
        "timestamp": chrono::Utc::now(),
        "session": "hashcat",
        "status": 3,
        "progress": [500_000, 1_000_000],
        "restore_point": 500_000,
        "device_statuses": [
            { "device_id": 0, "device_name": "GPU0", "speed": 1.0e7 }
        ],
    });
    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/client/tasks/{task_id}/submit_status"),
            &agent.token,
            status_body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Crack: single-item list finishes → 204
    let crack_body = json!({
        "timestamp": chrono::Utc::now(),
        "hash": MD5_HELLO,
        "plain_text": "hello",
    });
    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/client/tasks/{task_id}/submit_crack"),
            &agent.token,
            crack_body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Exhausted
    let response = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/client/tasks/{task_id}/exhausted"), &agent.token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn tasks_new_without_work_is_204() {
    let h = Harness::new().await;
    let agent = h.active_agent("rig-01", MD5, 1e6).await;

    let response = app(&h)
        .oneshot(get("/api/v1/client/tasks/new", Some(&agent.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn throttled_heartbeat_is_429_with_retry_after() {
    let h = Harness::new().await;
    let agent = h.active_agent("rig-01", MD5, 1e6).await;
    let router = app(&h);
    let uri = format!("/api/v1/client/agents/{}/heartbeat", agent.id);

    let response = router.clone().oneshot(post_empty(&uri, &agent.token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router.clone().oneshot(post_empty(&uri, &agent.token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
        Some("15")
    );
}

#[tokio::test]
async fn paused_campaign_preempts_over_the_wire() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (campaign, _) = h.running_campaign(&list, 1_000_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1e7).await;
    let router = app(&h);

    let response = router
        .clone()
        .oneshot(get("/api/v1/client/tasks/new", Some(&agent.token)))
        .await
        .unwrap();
    let task = body_json(response).await;
    let task_id = task["id"].as_str().unwrap().to_string();

    h.scheduler.pause_campaign(campaign.id).await.unwrap();

    let status_body = json!({
        "timestamp": chrono::Utc::now(),
        "session": "hashcat",
        "status": 3,
        "progress": [1, 1_000_000],
        "restore_point": 1,
    });
    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/client/tasks/{task_id}/submit_status"),
            &agent.token,
            status_body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn abandon_reports_success_and_state() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1e7).await;
    let router = app(&h);

    let response = router
        .clone()
        .oneshot(get("/api/v1/client/tasks/new", Some(&agent.token)))
        .await
        .unwrap();
    let task = body_json(response).await;
    let task_id = task["id"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/client/tasks/{task_id}/abandon"), &agent.token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["state"], json!("pending"));
}

#[tokio::test]
async fn get_zaps_returns_plain_text() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO, "0cc175b9c0f1b6a831c399e269772661"]).await;
    let _ = h.running_campaign(&list, 1_000_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1e7).await;
    let router = app(&h);

    let response = router
        .clone()
        .oneshot(get("/api/v1/client/tasks/new", Some(&agent.token)))
        .await
        .unwrap();
    let task = body_json(response).await;
    let task_id = task["id"].as_str().unwrap().to_string();

    // Nothing cracked yet: empty delta
    let response = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/client/tasks/{task_id}/get_zaps"), &agent.token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    h.ingestor
        .submit_crack(
            agent.id,
            task["id"].as_str().unwrap().parse().unwrap(),
            MD5_HELLO,
            "hello",
            chrono::Utc::now(),
        )
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/client/tasks/{task_id}/get_zaps"), &agent.token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain")));
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), format!("{MD5_HELLO}\n"));
}

#[tokio::test]
async fn control_surface_speaks_problem_json() {
    let h = Harness::new().await;
    let router = app(&h);

    let response = router
        .clone()
        .oneshot(get("/api/v1/control/campaigns/status?ids=", Some("csa_wrong_kind")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/problem+json")
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], json!(401));
    assert!(body.get("title").is_some());
}

#[tokio::test]
async fn control_bulk_start_reports_per_campaign_outcomes() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (campaign, _) = h.campaign_with_attack(&list, 1_000, 0).await;
    let router = app(&h);

    let token = format!("cst_{}_s3cret", uuid::Uuid::new_v4());
    let missing = uuid::Uuid::new_v4();
    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/control/campaigns/start",
            &token,
            json!({ "campaign_ids": [campaign.id, missing] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let outcomes = body.as_array().unwrap();
    assert_eq!(outcomes[0]["status"], json!("started"));
    assert_eq!(outcomes[1]["status"], json!("error"));
}

#[tokio::test]
async fn web_surface_uses_detail_errors() {
    let h = Harness::new().await;
    let router = app(&h);

    // No session at all
    let response = router
        .clone()
        .oneshot(get("/api/v1/web/campaigns", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body.get("detail").is_some(), "expected detail body, got {body}");

    // Any bearer passes presence validation
    let response = router
        .clone()
        .oneshot(get("/api/v1/web/campaigns", Some("some.jwt.token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
