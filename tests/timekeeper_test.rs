mod helpers;

use chrono::{Duration, Utc};
use cipherswarm::domain::models::{AgentState, AttackState, CampaignState, TaskState};
use helpers::harness::Harness;

const MD5: u32 = 0;
const MD5_HELLO: &str = "5d41402abc4b2a76b9719d911017c592";

/// S3: a silent agent goes offline and its task returns to the queue.
#[tokio::test]
async fn heartbeat_timeout_releases_the_held_task() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;
    let a1 = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(a1.id).await.unwrap().expect("task");

    // Backdate the agent's last check-in past max(3 × interval, 90 s)
    let mut agent = h.agents.get(a1.id).await.unwrap().unwrap();
    agent.last_seen_at = Some(Utc::now() - Duration::minutes(10));
    h.agents.update(&agent).await.unwrap();

    let stats = h.timekeeper.sweep(Utc::now()).await.expect("sweep failed");
    assert_eq!(stats.agents_offlined, 1);

    let agent = h.agents.get(a1.id).await.unwrap().unwrap();
    assert_eq!(agent.state, AgentState::Offline);
    assert_eq!(agent.assigned_task_id, None);

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Pending);
    assert_eq!(task.assigned_agent_id, None);

    // Another agent can now pick the slice up
    let a2 = h.active_agent("rig-02", MD5, 1_000_000.0).await;
    let retaken = h.scheduler.request_task(a2.id).await.unwrap().expect("requeued task");
    assert_eq!(retaken.id, task.id);
}

#[tokio::test]
async fn unaccepted_assignments_expire_back_to_pending() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");

    // Keep the agent alive but never accept
    let mut agent_row = h.agents.get(agent.id).await.unwrap().unwrap();
    agent_row.last_seen_at = Some(Utc::now());
    h.agents.update(&agent_row).await.unwrap();

    let mut stale = h.tasks.get(task.id).await.unwrap().unwrap();
    stale.assigned_at = Some(Utc::now() - Duration::seconds(200));
    h.tasks.update(&stale).await.unwrap();

    let stats = h.timekeeper.sweep(Utc::now()).await.expect("sweep failed");
    assert_eq!(stats.assignments_expired, 1);

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Pending);
    assert_eq!(task.assigned_agent_id, None);

    let agent = h.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent.assigned_task_id, None);
}

#[tokio::test]
async fn stale_running_tasks_are_abandoned_then_requeued() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");
    h.scheduler.accept_task(agent.id, task.id).await.unwrap();

    // The agent keeps heartbeating but its status reports dried up
    let mut agent_row = h.agents.get(agent.id).await.unwrap().unwrap();
    agent_row.last_seen_at = Some(Utc::now());
    h.agents.update(&agent_row).await.unwrap();

    let mut stale = h.tasks.get(task.id).await.unwrap().unwrap();
    stale.state = TaskState::Running;
    stale.last_status_at = Some(Utc::now() - Duration::seconds(400));
    h.tasks.update(&stale).await.unwrap();

    let stats = h.timekeeper.sweep(Utc::now()).await.expect("first sweep");
    assert_eq!(stats.tasks_abandoned, 1);

    let task_row = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task_row.state, TaskState::Abandoned);
    assert_eq!(task_row.assigned_agent_id, None);

    // A minor error was recorded against the agent
    let errors = h.agent_errors.list_by_agent(agent.id, 10).await.unwrap();
    assert!(errors.iter().any(|e| e.task_id == Some(task.id)));

    let stats = h.timekeeper.sweep(Utc::now()).await.expect("second sweep");
    assert_eq!(stats.tasks_requeued, 1);

    let task_row = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task_row.state, TaskState::Pending);
}

#[tokio::test]
async fn sweep_rolls_finished_attacks_up_to_the_campaign() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let (campaign, attack) = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");

    // Settle the slice without going through mark_exhausted's own rollup
    h.scheduler.release_task(task.id, TaskState::Exhausted).await.unwrap();

    h.timekeeper.sweep(Utc::now()).await.expect("sweep failed");

    let attack = h.attacks.get(attack.id).await.unwrap().unwrap();
    assert_eq!(attack.state, AttackState::Exhausted);

    let campaign = h.campaigns.get(campaign.id).await.unwrap().unwrap();
    assert_eq!(campaign.state, CampaignState::Completed);
}

#[tokio::test]
async fn quiet_sweep_changes_nothing() {
    let h = Harness::new().await;
    let list = h.hash_list(MD5, &[MD5_HELLO]).await;
    let _ = h.running_campaign(&list, 1_000, 0).await;
    let agent = h.active_agent("rig-01", MD5, 1_000_000.0).await;
    let task = h.scheduler.request_task(agent.id).await.unwrap().expect("task");

    let stats = h.timekeeper.sweep(Utc::now()).await.expect("sweep failed");
    assert!(stats.is_quiet());

    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Assigned);
    assert_eq!(task.assigned_agent_id, Some(agent.id));
}
