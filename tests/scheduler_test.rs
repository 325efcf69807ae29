mod helpers;

use chrono::Utc;
use cipherswarm::domain::errors::DomainError;
use cipherswarm::domain::models::{
    AttackState, CampaignState, CrackOutcome, DeviceStatusReport, SchedulerConfig, StatusReport,
    TaskState,
};
use helpers::harness::Harness;

const MD5: u32 = 0;
const MD5_HELLO: &str = "5d41402abc4b2a76b9719d911017c592";

fn status_report(processed: u64, total: u64, speed: f64) -> StatusReport {
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
            utilization: Some(97),
            temperature: Some(64),
        }],
    }
}

/// S1: a single agent works a dictionary attack to completion.
#[tokio::test]
async fn single_agent_dictionary_attack_completes() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (campaign, attack) = h.running_campaign(&list, 1_000_000, 50).await;
    let agent = h.active_agent("rig-01", MD5, 10_000_000.0).await;

    let task = h
        .scheduler
        .request_task(agent.id)
        .await
        .expect("request failed")
        .expect("expected a task");
    assert_eq!(task.keyspace_offset, 0);
    assert_eq!(task.keyspace_length, 1_000_000);
    assert_eq!(task.state, TaskState::Assigned);

    h.scheduler.accept_task(agent.id, task.id).await.expect("accept failed");
    h.reconciler
        .submit_status(agent.id, task.id, &status_report(500_000, 1_000_000, 10_000_000.0))
        .await
        .expect("status failed");

    let outcome = h
        .ingestor
        .submit_crack(agent.id, task.id, MD5_HELLO, "hello", Utc::now())
        .await
        .expect("crack failed");
    assert_eq!(outcome, CrackOutcome::ListComplete);

    h.scheduler.mark_exhausted(agent.id, task.id).await.expect("exhaust failed");

    let list = h.hash_lists.get(list.id).await.unwrap().unwrap();
    assert_eq!(list.cracked_count, 1);

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Exhausted);

    let attack = h.attacks.get(attack.id).await.unwrap().unwrap();
    assert!(matches!(attack.state, AttackState::Completed | AttackState::Exhausted));

    let campaign = h.campaigns.get(campaign.id).await.unwrap().unwrap();
    assert_eq!(campaign.state, CampaignState::Completed);
}

/// S2: two agents split the keyspace; an abandoned slice goes to a third.
#[tokio::test]
async fn two_agents_split_keyspace_and_abandon_requeues() {
    // 10_000 h/s at a 100 s target cuts 2_000_000 into two slices
    let config = SchedulerConfig { target_slice_seconds: 100, ..SchedulerConfig::default() };
    let h = Harness::with_config(config).await;

    let list = h.hash_list(MD5, &[MD5_HELLO, "0cc175b9c0f1b6a831c399e269772661"]).await;

    // Benchmarks first so the planner sees a 10_000 h/s median
    let a1 = h.active_agent("rig-01", MD5, 10_000.0).await;
    let a2 = h.active_agent("rig-02", MD5, 10_000.0).await;

    let (_campaign, attack) = h.running_campaign(&list, 2_000_000, 10).await;

    let t1 = h.scheduler.request_task(a1.id).await.unwrap().expect("a1 task");
    let t2 = h.scheduler.request_task(a2.id).await.unwrap().expect("a2 task");

    assert_eq!(t1.keyspace_offset, 0);
    assert_eq!(t2.keyspace_offset, 1_000_000);
    assert_ne!(t1.id, t2.id);

    let new_state = h.scheduler.abandon_task(a1.id, t1.id).await.expect("abandon failed");
    assert_eq!(new_state, TaskState::Pending);

    let a3 = h.active_agent("rig-03", MD5, 10_000.0).await;
    let t3 = h.scheduler.request_task(a3.id).await.unwrap().expect("a3 task");
    assert_eq!(t3.id, t1.id);
    assert_eq!(t3.keyspace_offset, 0);

    // No keyspace offset is ever held by two agents at once
    let tasks = h.tasks.list_by_attack(attack.id).await.unwrap();
    let held: Vec<_> = tasks.iter().filter(|t| t.assigned_agent_id.is_some()).collect();
    let mut offsets: Vec<u64> = held.iter().map(|t| t.keyspace_offset).collect();
    offsets.dedup();
    assert_eq!(offsets.len(), held.len());
}

/// Requesting twice returns the same assignment, never a second slice.
#[tokio::test]
async fn agent_holds_at_most_one_task() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000_000_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;

    let first = h.scheduler.request_task(agent.id).await.unwrap().expect("task");
    let second = h.scheduler.request_task(agent.id).await.unwrap().expect("same task");
    assert_eq!(first.id, second.id);

    let agent = h.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent.assigned_task_id, Some(first.id));
}

#[tokio::test]
async fn higher_priority_campaign_is_dispatched_first() {
    let h = Harness::new().await;
    let low_list = h.hash_list(MD5, &["0cc175b9c0f1b6a831c399e269772661"]).await;
    let high_list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&low_list, 1_000, 1).await;
    let (_, high_attack) = h.running_campaign(&high_list, 1_000, 99).await;

    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");
    assert_eq!(task.attack_id, high_attack.id);
}

#[tokio::test]
async fn agents_without_matching_benchmark_get_nothing() {
    let h = Harness::new().await;
    let list = h.hash_list(1000, &["31d6cfe0d16ae931b73c59d7e0c089c0"]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;

    // Benchmarked for MD5 only, attack needs NTLM
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap();
    assert!(task.is_none());
}

#[tokio::test]
async fn additional_hash_types_opt_in_widens_eligibility() {
    let h = Harness::new().await;
    let list = h.hash_list(1000, &["31d6cfe0d16ae931b73c59d7e0c089c0"]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;

    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let mut agent = h.agents.get(agent.id).await.unwrap().unwrap();
    agent.config.enable_additional_hash_types = true;
    h.agents.update(&agent).await.unwrap();

    let task = h.scheduler.request_task(agent.id).await.unwrap();
    assert!(task.is_some());
}

#[tokio::test]
async fn accept_is_idempotent_and_moves_attack_to_running() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (_, attack) = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;

    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");
    h.scheduler.accept_task(agent.id, task.id).await.expect("first accept");
    h.scheduler.accept_task(agent.id, task.id).await.expect("second accept is a no-op");

    let attack = h.attacks.get(attack.id).await.unwrap().unwrap();
    assert_eq!(attack.state, AttackState::Running);

    let reloaded = h.tasks.get(task.id).await.unwrap().unwrap();
    assert!(reloaded.accepted_at.is_some());
}

#[tokio::test]
async fn foreign_tasks_are_invisible() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;
    let owner = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let other = h.active_agent("rig-02", MD5, 1_000_000.0).await;

    let task = h.scheduler.request_task(owner.id).await.unwrap().expect("task");
    let err = h.scheduler.accept_task(other.id, task.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn abandon_on_terminal_task_conflicts() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;

    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");
    h.scheduler.mark_exhausted(agent.id, task.id).await.unwrap();

    let err = h.scheduler.abandon_task(agent.id, task.id).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. } | DomainError::Conflict(_)));
}

#[tokio::test]
async fn mark_exhausted_is_retry_safe() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;

    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");
    h.scheduler.mark_exhausted(agent.id, task.id).await.expect("first exhaust");
    h.scheduler.mark_exhausted(agent.id, task.id).await.expect("retried exhaust is a no-op");
}

#[tokio::test]
async fn zero_keyspace_attack_is_exhausted_on_start() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (campaign, attack) = h.campaign_with_attack(&list, 0, 0).await;

    h.scheduler.start_campaign(campaign.id).await.expect("start failed");

    let attack = h.attacks.get(attack.id).await.unwrap().unwrap();
    assert_eq!(attack.state, AttackState::Exhausted);
    assert!(h.tasks.list_by_attack(attack.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn keyspace_intervals_partition_the_attack() {
    let config = SchedulerConfig { target_slice_seconds: 60, ..SchedulerConfig::default() };
    let h = Harness::with_config(config).await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    // 1_000_000 h/s at a 60 s target: 17 slices, last one short
    let (_, attack) = h.running_campaign(&list, 1_000_000_000, 0).await;
    let _ = h.active_agent("rig-01", MD5, 1_000_000.0).await;

    let tasks = h.tasks.list_by_attack(attack.id).await.unwrap();
    assert!(!tasks.is_empty());
    let mut expected = 0u64;
    for task in &tasks {
        assert_eq!(task.keyspace_offset, expected);
        expected += task.keyspace_length;
    }
    assert_eq!(expected, attack.total_keyspace);
}

/// S5 lives in progress_test.rs; pausing here checks the task side.
#[tokio::test]
async fn pause_marks_held_tasks_and_resume_rearms_them() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (campaign, _) = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");

    h.scheduler.pause_campaign(campaign.id).await.expect("pause failed");
    let paused = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(paused.state, TaskState::Paused);
    assert_eq!(paused.assigned_agent_id, Some(agent.id));

    h.scheduler.resume_campaign(campaign.id).await.expect("resume failed");
    let rearmed = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(rearmed.state, TaskState::Assigned);
    assert_eq!(rearmed.assigned_agent_id, Some(agent.id));
}
