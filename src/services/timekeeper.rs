//! Timekeeper.
//!
//! A single periodic sweeper that enforces time-based policy: heartbeat
//! timeouts, stale status detection, orphaned-assignment recovery, and
//! campaign/attack state rollup. Each sweep works against the repository
//! like any other caller; there is no shared in-memory state with the
//! request path.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentError, AgentState, CampaignState, ErrorSeverity, SchedulerConfig, TaskState,
};
use crate::domain::ports::{
    AgentErrorRepository, AgentRepository, AttackRepository, CampaignRepository, TaskRepository,
};
use crate::services::event_bus::{EntityKind, EventBus};
use crate::services::task_scheduler::TaskScheduler;

/// Counters from one sweep, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub agents_offlined: usize,
    pub tasks_requeued: usize,
    pub tasks_abandoned: usize,
    pub assignments_expired: usize,
}

impl SweepStats {
    pub fn is_quiet(&self) -> bool {
        *self == Self::default()
    }
}

/// Periodic policy sweeper.
pub struct Timekeeper {
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    agent_errors: Arc<dyn AgentErrorRepository>,
    scheduler: Arc<TaskScheduler>,
    events: Arc<EventBus>,
    config: SchedulerConfig,
}

impl Timekeeper {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        agent_errors: Arc<dyn AgentErrorRepository>,
        scheduler: Arc<TaskScheduler>,
        events: Arc<EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        Self { agents, tasks, attacks, campaigns, agent_errors, scheduler, events, config }
    }

    /// Run sweeps until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.sweep_interval_seconds.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep(Utc::now()).await {
                        Ok(stats) if !stats.is_quiet() => {
                            info!(?stats, "timekeeper sweep applied changes");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "timekeeper sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One full sweep at the given instant.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> DomainResult<SweepStats> {
        let mut stats = SweepStats::default();

        stats.tasks_requeued = self.requeue_abandoned().await?;
        stats.agents_offlined = self.offline_silent_agents(now).await?;
        stats.tasks_abandoned = self.abandon_stale_running(now).await?;
        stats.assignments_expired = self.expire_unaccepted(now).await?;
        self.rollup_active_campaigns().await?;

        Ok(stats)
    }

    /// Slices abandoned in an earlier sweep go back into the queue.
    async fn requeue_abandoned(&self) -> DomainResult<usize> {
        let mut requeued = 0;
        for task in self.tasks.list_by_state(TaskState::Abandoned).await? {
            self.scheduler.release_task(task.id, TaskState::Pending).await?;
            requeued += 1;
        }
        Ok(requeued)
    }

    /// Agents silent past `max(3 × update_interval, 90s)` go offline and
    /// their held slices return to the queue.
    async fn offline_silent_agents(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let mut offlined = 0;

        for state in [AgentState::Active, AgentState::Pending] {
            for agent in self.agents.list_by_state(state).await? {
                let last_seen = agent.last_seen_at.unwrap_or(agent.created_at);
                let silent_for = (now - last_seen).num_seconds().max(0) as u64;
                if silent_for <= agent.heartbeat_timeout_secs() {
                    continue;
                }

                warn!(agent_id = %agent.id, silent_for, "agent missed heartbeats; marking offline");
                self.scheduler.release_task_of(&agent, TaskState::Pending).await?;

                if let Some(mut agent) = self.agents.get(agent.id).await? {
                    if agent.can_transition_to(AgentState::Offline) {
                        let _ = agent.transition_to(AgentState::Offline);
                        self.agents.update(&agent).await?;
                        self.events.emit(EntityKind::Agent, agent.id);
                        offlined += 1;
                    }
                }
            }
        }

        Ok(offlined)
    }

    /// Running tasks whose reports dried up past the status threshold are
    /// abandoned on the agent's behalf; requeue happens next sweep.
    async fn abandon_stale_running(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let mut abandoned = 0;

        for task in self.tasks.list_by_state(TaskState::Running).await? {
            let Some(agent_id) = task.assigned_agent_id else {
                continue;
            };
            let threshold = match self.agents.get(agent_id).await? {
                Some(agent) => agent.status_timeout_secs(),
                None => 180,
            };
            let anchor = task
                .last_status_at
                .or(task.accepted_at)
                .or(task.assigned_at)
                .unwrap_or(task.created_at);
            let silent_for = (now - anchor).num_seconds().max(0) as u64;
            if silent_for <= threshold {
                continue;
            }

            warn!(task_id = %task.id, agent_id = %agent_id, silent_for, "status reports dried up; abandoning task");
            self.scheduler.release_task(task.id, TaskState::Abandoned).await?;

            let report = AgentError::new(
                agent_id,
                ErrorSeverity::Minor,
                "task abandoned by server after stale status",
            )
            .with_task(task.id);
            self.agent_errors.create(&report).await?;
            abandoned += 1;
        }

        Ok(abandoned)
    }

    /// Assignments never accepted within the accept timeout revert to
    /// pending so another agent can pick them up.
    async fn expire_unaccepted(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let mut expired = 0;

        for task in self.tasks.list_by_state(TaskState::Assigned).await? {
            if task.accepted_at.is_some() {
                continue;
            }
            let assigned_at = task.assigned_at.unwrap_or(task.created_at);
            let waiting_for = (now - assigned_at).num_seconds().max(0) as u64;
            if waiting_for <= self.config.accept_timeout_seconds {
                continue;
            }

            info!(task_id = %task.id, waiting_for, "assignment never accepted; requeueing");
            self.scheduler.release_task(task.id, TaskState::Pending).await?;
            expired += 1;
        }

        Ok(expired)
    }

    /// Roll attack and campaign states up for everything still active.
    async fn rollup_active_campaigns(&self) -> DomainResult<()> {
        for campaign in self.campaigns.list_by_state(CampaignState::Active).await? {
            for attack in self.attacks.list_by_campaign(campaign.id).await? {
                if !attack.state.is_terminal() {
                    self.scheduler.rollup_attack(attack.id).await?;
                }
            }
            self.scheduler.rollup_campaign(campaign.id).await?;
        }
        Ok(())
    }
}
