mod helpers;

use chrono::{Duration, Utc};
use cipherswarm::domain::errors::DomainError;
use cipherswarm::domain::models::{DeviceStatusReport, StatusReport, TaskState};
use helpers::harness::Harness;

const MD5: u32 = 0;
const MD5_HELLO: &str = "5d41402abc4b2a76b9719d911017c592";

fn report(processed: u64, total: u64, speed: f64) -> StatusReport {
    StatusReport {
        timestamp: Utc::now(),
        session: "hashcat".to_string(),
        status_code: 3,
        progress_processed: processed,
        progress_total: total,
        restore_point: processed,
        recovered_hashes: 0,
        recovered_salts: 0,
        rejected: 0,
        estimated_stop: None,
        guess: None,
        device_statuses: vec![DeviceStatusReport {
            device_index: 0,
            device_name: "GPU0".to_string(),
            speed,
            utilization: None,
            temperature: None,
        }],
    }
}

async fn harness_with_running_task() -> (Harness, uuid::Uuid, uuid::Uuid, uuid::Uuid) {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (campaign, _) = h.running_campaign(&list, 1_000_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");
    h.scheduler.accept_task(agent.id, task.id).await.unwrap();
    (h, agent.id, task.id, campaign.id)
}

#[tokio::test]
async fn first_status_moves_task_to_running_and_records_progress() {
    let (h, agent_id, task_id, _) = harness_with_running_task().await;

    h.reconciler
        .submit_status(agent_id, task_id, &report(250_000, 1_000_000, 50_000.0))
        .await
        .expect("status failed");

    let task = h.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Running);
    assert_eq!(task.progress_offset, 250_000);
    assert!(task.last_status_at.is_some());
    // 750_000 remaining at 50_000 h/s is a 15 s horizon
    let eta = task.estimated_stop.expect("estimate");
    let secs = (eta - Utc::now()).num_seconds();
    assert!((13..=17).contains(&secs), "eta {secs}s out of range");
}

/// S6: a report older than the stored state minus the window is dropped.
#[tokio::test]
async fn stale_status_is_ignored() {
    let (h, agent_id, task_id, _) = harness_with_running_task().await;

    h.reconciler
        .submit_status(agent_id, task_id, &report(400_000, 1_000_000, 50_000.0))
        .await
        .unwrap();
    let before = h.tasks.get(task_id).await.unwrap().unwrap();

    let mut old = report(100_000, 1_000_000, 50_000.0);
    old.timestamp = Utc::now() - Duration::seconds(60);
    let err = h.reconciler.submit_status(agent_id, task_id, &old).await.unwrap_err();
    assert!(matches!(err, DomainError::Stale));

    let after = h.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(after.progress_offset, before.progress_offset);
    assert_eq!(after.last_status_at, before.last_status_at);
}

#[tokio::test]
async fn progress_beyond_slice_length_is_malformed() {
    let (h, agent_id, task_id, _) = harness_with_running_task().await;

    let err = h
        .reconciler
        .submit_status(agent_id, task_id, &report(2_000_000, 1_000_000, 50_000.0))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Malformed(_)));
}

#[tokio::test]
async fn progress_must_be_monotonic() {
    let (h, agent_id, task_id, _) = harness_with_running_task().await;

    h.reconciler
        .submit_status(agent_id, task_id, &report(600_000, 1_000_000, 50_000.0))
        .await
        .unwrap();
    let err = h
        .reconciler
        .submit_status(agent_id, task_id, &report(100_000, 1_000_000, 50_000.0))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Malformed(_)));

    let task = h.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.progress_offset, 600_000);
}

/// Processing the entire slice is valid and may precede `exhausted`.
#[tokio::test]
async fn full_slice_progress_is_valid() {
    let (h, agent_id, task_id, _) = harness_with_running_task().await;

    h.reconciler
        .submit_status(agent_id, task_id, &report(1_000_000, 1_000_000, 50_000.0))
        .await
        .expect("full progress is valid");

    h.scheduler.mark_exhausted(agent_id, task_id).await.expect("exhaust after full progress");
}

/// S5: pause preempts status updates; resume restores the flow.
#[tokio::test]
async fn paused_campaign_preempts_status_updates() {
    let (h, agent_id, task_id, campaign_id) = harness_with_running_task().await;

    h.reconciler
        .submit_status(agent_id, task_id, &report(100_000, 1_000_000, 50_000.0))
        .await
        .unwrap();

    h.scheduler.pause_campaign(campaign_id).await.unwrap();

    let err = h
        .reconciler
        .submit_status(agent_id, task_id, &report(200_000, 1_000_000, 50_000.0))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Preempted));

    let task = h.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.progress_offset, 100_000);

    h.scheduler.resume_campaign(campaign_id).await.unwrap();
    h.reconciler
        .submit_status(agent_id, task_id, &report(200_000, 1_000_000, 50_000.0))
        .await
        .expect("status after resume");

    let task = h.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Running);
    assert_eq!(task.progress_offset, 200_000);
}

#[tokio::test]
async fn status_from_a_stranger_is_not_found() {
    let (h, _, task_id, _) = harness_with_running_task().await;
    let stranger = h.active_agent("rig-99", MD5, 1_000_000.0).await;

    let err = h
        .reconciler
        .submit_status(stranger.id, task_id, &report(1, 1_000_000, 50_000.0))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}
