//! Task scheduler.
//!
//! Owns the assignment protocol between agents and keyspace slices. The
//! central invariants: at most one active task per agent, at most one
//! assigned agent per task, and no slice is ever handed to two agents.
//! Both sides of an assignment are persisted in one version-checked
//! transaction; collisions surface as `StaleVersion` and are retried
//! against the next ranked candidate.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, AgentError, Attack, AttackState, Campaign, CampaignState, ErrorSeverity, HashList,
    SchedulerConfig, Task, TaskState,
};
use crate::domain::ports::{
    AgentErrorRepository, AgentRepository, AttackRepository, CampaignRepository,
    HashListRepository, TaskRepository,
};
use crate::services::event_bus::{EntityKind, EventBus};
use crate::services::keyspace_planner::KeyspacePlanner;

/// Benchmark deviation that triggers a replan on abandon: the abandoning
/// agent's speed differing from the planning median by more than half of it.
const REPLAN_DEVIATION_RATIO: f64 = 0.5;

/// Coordinates task assignment, release, and campaign/attack rollup.
pub struct TaskScheduler {
    tasks: Arc<dyn TaskRepository>,
    agents: Arc<dyn AgentRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    agent_errors: Arc<dyn AgentErrorRepository>,
    planner: KeyspacePlanner,
    events: Arc<EventBus>,
    config: SchedulerConfig,
}

impl TaskScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        agents: Arc<dyn AgentRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        agent_errors: Arc<dyn AgentErrorRepository>,
        events: Arc<EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        let planner = KeyspacePlanner::new(config.clone());
        Self {
            tasks,
            agents,
            attacks,
            campaigns,
            hash_lists,
            agent_errors,
            planner,
            events,
            config,
        }
    }

    /// Hand the best-ranked pending task to an agent, or return the task
    /// it already holds. `None` means no eligible work exists.
    #[instrument(skip(self), fields(agent_id = %agent_id))]
    pub async fn request_task(&self, agent_id: Uuid) -> DomainResult<Option<Task>> {
        let mut agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| DomainError::not_found("agent", agent_id))?;

        if !agent.state.can_hold_work() {
            return Err(DomainError::Forbidden(format!(
                "agent is {} and cannot receive work",
                agent.state.as_str()
            )));
        }

        // At-most-one active task per agent: hand back the current one.
        if let Some(task_id) = agent.assigned_task_id {
            return self.tasks.get(task_id).await;
        }

        let hash_types = self.agents.benchmarked_hash_types(agent_id).await?;
        let candidates = self
            .tasks
            .next_candidates(
                &hash_types,
                agent.config.enable_additional_hash_types,
                self.config.assign_retry_limit,
            )
            .await?;

        for candidate in candidates {
            let mut task = candidate;
            task.state = TaskState::Assigned;
            task.assigned_agent_id = Some(agent.id);
            task.assigned_at = Some(Utc::now());
            task.accepted_at = None;

            match self.tasks.assign(&task, &agent).await {
                Ok(()) => {
                    info!(task_id = %task.id, agent_id = %agent.id, "task assigned");
                    self.events.emit(EntityKind::Task, task.id);
                    self.events.emit(EntityKind::Agent, agent.id);
                    return self.tasks.get(task.id).await;
                }
                Err(DomainError::StaleVersion { entity: "task", .. }) => {
                    // Another agent won this slice; try the next candidate.
                    continue;
                }
                Err(DomainError::StaleVersion { entity: "agent", .. }) => {
                    agent = self
                        .agents
                        .get(agent_id)
                        .await?
                        .ok_or_else(|| DomainError::not_found("agent", agent_id))?;
                    if let Some(task_id) = agent.assigned_task_id {
                        return self.tasks.get(task_id).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Record that the agent accepted its assignment. Idempotent: a second
    /// accept from the owner is a no-op.
    #[instrument(skip(self), fields(agent_id = %agent_id, task_id = %task_id))]
    pub async fn accept_task(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<()> {
        let mut task = self.owned_task(agent_id, task_id).await?;

        if task.state.is_terminal() {
            return Err(DomainError::Conflict("task already finished".to_string()));
        }
        if task.accepted_at.is_some() {
            return Ok(());
        }

        task.accepted_at = Some(Utc::now());
        self.tasks.update(&task).await?;

        // First accepted slice moves the attack out of pending.
        if let Some(mut attack) = self.attacks.get(task.attack_id).await? {
            if attack.state == AttackState::Pending {
                attack
                    .transition_to(AttackState::Running)
                    .map_err(DomainError::Conflict)?;
                self.attacks.update(&attack).await?;
                self.events.emit(EntityKind::Attack, attack.id);
            }
        }

        self.events.emit(EntityKind::Task, task.id);
        Ok(())
    }

    /// Give a task back: the slice returns to pending, the agent is freed,
    /// and a minor error is recorded. A materially mis-benchmarked agent
    /// triggers a replan of the attack's incomplete keyspace.
    #[instrument(skip(self), fields(agent_id = %agent_id, task_id = %task_id))]
    pub async fn abandon_task(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<TaskState> {
        let mut task = self.owned_task(agent_id, task_id).await?;
        if task.state.is_terminal() {
            return Err(DomainError::Conflict("task already finished".to_string()));
        }

        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| DomainError::not_found("agent", agent_id))?;

        task.state = TaskState::Pending;
        reset_for_requeue(&mut task);
        self.tasks.release(&task, &agent).await?;

        let report = AgentError::new(agent_id, ErrorSeverity::Minor, "task abandoned by agent")
            .with_task(task_id);
        self.agent_errors.create(&report).await?;

        warn!(task_id = %task_id, agent_id = %agent_id, "task abandoned");
        self.events.emit(EntityKind::Task, task_id);
        self.events.emit(EntityKind::Agent, agent_id);

        if let Some(attack) = self.attacks.get(task.attack_id).await? {
            if self.benchmark_deviates(agent_id, &attack).await? {
                self.replan_attack(&attack).await?;
            }
        }

        Ok(TaskState::Pending)
    }

    /// The agent enumerated its whole slice. Rolls attack and campaign
    /// states up when this was the last open slice. Retry-safe.
    #[instrument(skip(self), fields(agent_id = %agent_id, task_id = %task_id))]
    pub async fn mark_exhausted(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<()> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| DomainError::not_found("task", task_id))?;

        // A retried exhaust after the assignment was cleared is a no-op.
        if task.state == TaskState::Exhausted {
            return Ok(());
        }

        let mut task = self.assert_owned(task, agent_id)?;
        if task.state.is_terminal() {
            return Err(DomainError::Conflict("task already finished".to_string()));
        }

        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| DomainError::not_found("agent", agent_id))?;

        task.state = TaskState::Exhausted;
        task.progress_offset = task.keyspace_length;
        task.clear_assignment();
        self.tasks.release(&task, &agent).await?;

        info!(task_id = %task_id, "task exhausted");
        self.events.emit(EntityKind::Task, task_id);
        self.events.emit(EntityKind::Agent, agent_id);

        self.rollup_attack(task.attack_id).await
    }

    /// Start a draft campaign: plan every attack that has no tasks yet and
    /// open the campaign for dispatch.
    #[instrument(skip(self), fields(campaign_id = %campaign_id))]
    pub async fn start_campaign(&self, campaign_id: Uuid) -> DomainResult<Campaign> {
        let mut campaign = self
            .campaigns
            .get(campaign_id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", campaign_id))?;

        campaign
            .transition_to(CampaignState::Active)
            .map_err(DomainError::Conflict)?;
        self.campaigns.update(&campaign).await?;

        for attack in self.attacks.list_by_campaign(campaign_id).await? {
            self.plan_attack_if_needed(&attack).await?;
        }

        info!(campaign_id = %campaign_id, "campaign started");
        self.events.emit(EntityKind::Campaign, campaign_id);
        Ok(campaign)
    }

    /// Pause a campaign. Held tasks stay with their agents but are marked
    /// paused; the next status report preempts each agent.
    #[instrument(skip(self), fields(campaign_id = %campaign_id))]
    pub async fn pause_campaign(&self, campaign_id: Uuid) -> DomainResult<Campaign> {
        let mut campaign = self
            .campaigns
            .get(campaign_id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", campaign_id))?;

        campaign
            .transition_to(CampaignState::Paused)
            .map_err(DomainError::Conflict)?;
        self.campaigns.update(&campaign).await?;

        for task in self.tasks.list_held_by_campaign(campaign_id).await? {
            if matches!(task.state, TaskState::Assigned | TaskState::Running) {
                self.set_task_state_with_retry(task.id, TaskState::Paused).await?;
            }
        }

        info!(campaign_id = %campaign_id, "campaign paused");
        self.events.emit(EntityKind::Campaign, campaign_id);
        Ok(campaign)
    }

    /// Resume a paused campaign, moving its paused tasks back to assigned.
    #[instrument(skip(self), fields(campaign_id = %campaign_id))]
    pub async fn resume_campaign(&self, campaign_id: Uuid) -> DomainResult<Campaign> {
        let mut campaign = self
            .campaigns
            .get(campaign_id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", campaign_id))?;

        campaign
            .transition_to(CampaignState::Active)
            .map_err(DomainError::Conflict)?;
        self.campaigns.update(&campaign).await?;

        for task in self.tasks.list_held_by_campaign(campaign_id).await? {
            if task.state == TaskState::Paused {
                self.set_task_state_with_retry(task.id, TaskState::Assigned).await?;
            }
        }

        info!(campaign_id = %campaign_id, "campaign resumed");
        self.events.emit(EntityKind::Campaign, campaign_id);
        Ok(campaign)
    }

    /// Pause a single attack; its held tasks are preempted like a campaign
    /// pause.
    pub async fn pause_attack(&self, attack_id: Uuid) -> DomainResult<Attack> {
        let mut attack = self
            .attacks
            .get(attack_id)
            .await?
            .ok_or_else(|| DomainError::not_found("attack", attack_id))?;

        attack
            .transition_to(AttackState::Paused)
            .map_err(DomainError::Conflict)?;
        self.attacks.update(&attack).await?;

        for task in self.tasks.list_by_attack(attack_id).await? {
            if matches!(task.state, TaskState::Assigned | TaskState::Running) {
                self.set_task_state_with_retry(task.id, TaskState::Paused).await?;
            }
        }

        self.events.emit(EntityKind::Attack, attack_id);
        Ok(attack)
    }

    /// Resume a paused attack.
    pub async fn resume_attack(&self, attack_id: Uuid) -> DomainResult<Attack> {
        let mut attack = self
            .attacks
            .get(attack_id)
            .await?
            .ok_or_else(|| DomainError::not_found("attack", attack_id))?;

        attack
            .transition_to(AttackState::Running)
            .map_err(DomainError::Conflict)?;
        self.attacks.update(&attack).await?;

        for task in self.tasks.list_by_attack(attack_id).await? {
            if task.state == TaskState::Paused {
                self.set_task_state_with_retry(task.id, TaskState::Assigned).await?;
            }
        }

        self.events.emit(EntityKind::Attack, attack_id);
        Ok(attack)
    }

    /// The attack's configuration changed: abandon every in-flight slice
    /// back to pending and replan the incomplete keyspace.
    #[instrument(skip(self), fields(attack_id = %attack_id))]
    pub async fn rebalance_attack(&self, attack_id: Uuid) -> DomainResult<()> {
        let attack = self
            .attacks
            .get(attack_id)
            .await?
            .ok_or_else(|| DomainError::not_found("attack", attack_id))?;

        for task in self.tasks.list_by_attack(attack_id).await? {
            if task.state.is_held() {
                self.release_task(task.id, TaskState::Pending).await?;
            }
        }

        self.replan_attack(&attack).await
    }

    /// Release whatever task the agent currently holds back to `to_state`.
    /// Used when an agent goes offline, is stopped, or reports fatally.
    pub async fn release_task_of(&self, agent: &Agent, to_state: TaskState) -> DomainResult<Option<Task>> {
        let Some(task_id) = agent.assigned_task_id else {
            return Ok(None);
        };
        let Some(mut task) = self.tasks.get(task_id).await? else {
            return Ok(None);
        };

        task.state = to_state;
        if to_state == TaskState::Pending {
            reset_for_requeue(&mut task);
        } else {
            task.clear_assignment();
        }
        self.tasks.release(&task, agent).await?;

        self.events.emit(EntityKind::Task, task_id);
        self.events.emit(EntityKind::Agent, agent.id);
        Ok(Some(task))
    }

    /// Release a task from its agent (if any) into `to_state`.
    pub async fn release_task(&self, task_id: Uuid, to_state: TaskState) -> DomainResult<()> {
        let Some(mut task) = self.tasks.get(task_id).await? else {
            return Ok(());
        };

        let holder = match task.assigned_agent_id {
            Some(agent_id) => self.agents.get(agent_id).await?,
            None => None,
        };

        task.state = to_state;
        if to_state == TaskState::Pending {
            reset_for_requeue(&mut task);
        } else {
            task.clear_assignment();
        }

        match holder {
            Some(agent) => self.tasks.release(&task, &agent).await?,
            None => self.tasks.update(&task).await?,
        }

        self.events.emit(EntityKind::Task, task_id);
        Ok(())
    }

    /// Check an attack for completion and roll state changes up to its
    /// campaign.
    pub async fn rollup_attack(&self, attack_id: Uuid) -> DomainResult<()> {
        let Some(attack) = self.attacks.get(attack_id).await? else {
            return Ok(());
        };
        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", attack.campaign_id))?;
        let list = self
            .hash_lists
            .get(campaign.hash_list_id)
            .await?
            .ok_or_else(|| DomainError::not_found("hash_list", campaign.hash_list_id))?;

        if !attack.state.is_terminal() {
            let tasks = self.tasks.list_by_attack(attack_id).await?;
            let all_terminal = !tasks.is_empty() && tasks.iter().all(|t| t.state.is_terminal());
            if all_terminal {
                let target = if list.is_fully_cracked() {
                    AttackState::Completed
                } else {
                    AttackState::Exhausted
                };
                let mut attack = attack;
                attack.transition_to(target).map_err(DomainError::Conflict)?;
                self.attacks.update(&attack).await?;
                info!(attack_id = %attack_id, state = target.as_str(), "attack finished");
                self.events.emit(EntityKind::Attack, attack_id);
            }
        }

        self.rollup_campaign(campaign.id).await
    }

    /// Move a campaign to completed once its hash list is done or every
    /// attack reached a terminal state.
    pub async fn rollup_campaign(&self, campaign_id: Uuid) -> DomainResult<()> {
        let Some(campaign) = self.campaigns.get(campaign_id).await? else {
            return Ok(());
        };
        if !matches!(campaign.state, CampaignState::Active | CampaignState::Paused) {
            return Ok(());
        }

        let list = self
            .hash_lists
            .get(campaign.hash_list_id)
            .await?
            .ok_or_else(|| DomainError::not_found("hash_list", campaign.hash_list_id))?;

        if list.is_fully_cracked() {
            return self.complete_campaign_for_cracked_list(campaign_id).await;
        }

        let attacks = self.attacks.list_by_campaign(campaign_id).await?;
        let all_terminal = !attacks.is_empty() && attacks.iter().all(|a| a.state.is_terminal());
        if all_terminal {
            let mut campaign = campaign;
            campaign
                .transition_to(CampaignState::Completed)
                .map_err(DomainError::Conflict)?;
            self.campaigns.update(&campaign).await?;
            info!(campaign_id = %campaign_id, "campaign completed");
            self.events.emit(EntityKind::Campaign, campaign_id);
        }

        Ok(())
    }

    /// Every item in the campaign's hash list is cracked: retire pending
    /// slices, complete attacks whose tasks are all settled, and complete
    /// the campaign once nothing is left in flight. Slices still held by
    /// agents are preempted on their next status report.
    pub(crate) async fn complete_campaign_for_cracked_list(&self, campaign_id: Uuid) -> DomainResult<()> {
        let Some(campaign) = self.campaigns.get(campaign_id).await? else {
            return Ok(());
        };

        let mut all_attacks_terminal = true;
        for attack in self.attacks.list_by_campaign(campaign_id).await? {
            if attack.state.is_terminal() {
                continue;
            }

            let tasks = self.tasks.list_by_attack(attack.id).await?;
            for task in &tasks {
                if task.state == TaskState::Pending {
                    self.set_task_state_with_retry(task.id, TaskState::Completed).await?;
                }
            }

            let tasks = self.tasks.list_by_attack(attack.id).await?;
            if tasks.iter().all(|t| t.state.is_terminal()) {
                let mut attack = attack;
                attack
                    .transition_to(AttackState::Completed)
                    .map_err(DomainError::Conflict)?;
                self.attacks.update(&attack).await?;
                self.events.emit(EntityKind::Attack, attack.id);
            } else {
                all_attacks_terminal = false;
            }
        }

        if all_attacks_terminal && campaign.can_transition_to(CampaignState::Completed) {
            let mut campaign = campaign;
            campaign
                .transition_to(CampaignState::Completed)
                .map_err(DomainError::Conflict)?;
            self.campaigns.update(&campaign).await?;
            info!(campaign_id = %campaign_id, "campaign completed (hash list fully cracked)");
            self.events.emit(EntityKind::Campaign, campaign_id);
        }

        Ok(())
    }

    /// Plan an attack added to an already-running campaign.
    pub async fn ensure_planned(&self, attack_id: Uuid) -> DomainResult<()> {
        let attack = self
            .attacks
            .get(attack_id)
            .await?
            .ok_or_else(|| DomainError::not_found("attack", attack_id))?;
        self.plan_attack_if_needed(&attack).await
    }

    /// Plan an attack that has no tasks yet. Zero-keyspace attacks are
    /// immediately exhausted.
    async fn plan_attack_if_needed(&self, attack: &Attack) -> DomainResult<()> {
        if !self.tasks.list_by_attack(attack.id).await?.is_empty() {
            return Ok(());
        }

        if attack.total_keyspace == 0 {
            let mut attack = attack.clone();
            attack
                .transition_to(AttackState::Exhausted)
                .map_err(DomainError::Conflict)?;
            self.attacks.update(&attack).await?;
            self.events.emit(EntityKind::Attack, attack.id);
            return Ok(());
        }

        let median = self.planning_speed(attack).await?;
        let specs = self.planner.plan(attack, median);
        let tasks: Vec<Task> = specs.into_iter().map(|s| Task::from_spec(attack.id, s)).collect();
        info!(attack_id = %attack.id, slices = tasks.len(), "attack planned");
        self.tasks.create_many(&tasks).await?;
        self.events.emit(EntityKind::Attack, attack.id);
        Ok(())
    }

    /// Replan the attack's incomplete keyspace at the current median speed.
    async fn replan_attack(&self, attack: &Attack) -> DomainResult<()> {
        let existing = self.tasks.list_by_attack(attack.id).await?;
        let median = self.planning_speed(attack).await?;
        let replan = self.planner.replan(&existing, median);
        if replan.is_empty() {
            return Ok(());
        }

        self.tasks.delete_many(&replan.retire).await?;
        let tasks: Vec<Task> = replan
            .specs
            .into_iter()
            .map(|s| Task::from_spec(attack.id, s))
            .collect();
        self.tasks.create_many(&tasks).await?;

        info!(
            attack_id = %attack.id,
            retired = replan.retire.len(),
            created = tasks.len(),
            "attack replanned"
        );
        self.events.emit(EntityKind::Attack, attack.id);
        Ok(())
    }

    /// Median active-agent speed for the attack's hash type.
    async fn planning_speed(&self, attack: &Attack) -> DomainResult<Option<f64>> {
        let hash_type = self.attack_hash_type(attack).await?;
        self.agents.median_hash_speed(hash_type).await
    }

    /// Whether the agent's benchmarked speed for the attack's hash type
    /// deviates from the planning median by more than half the median.
    async fn benchmark_deviates(&self, agent_id: Uuid, attack: &Attack) -> DomainResult<bool> {
        let hash_type = self.attack_hash_type(attack).await?;
        let Some(median) = self.agents.median_hash_speed(hash_type).await? else {
            return Ok(false);
        };
        let Some(speed) = self.agents.agent_hash_speed(agent_id, hash_type).await? else {
            return Ok(false);
        };
        Ok((speed - median).abs() > median * REPLAN_DEVIATION_RATIO)
    }

    /// Resolve an attack's hash type through its campaign's hash list.
    async fn attack_hash_type(&self, attack: &Attack) -> DomainResult<u32> {
        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", attack.campaign_id))?;
        let list = self.list_of(&campaign).await?;
        Ok(list.hash_type)
    }

    async fn list_of(&self, campaign: &Campaign) -> DomainResult<HashList> {
        self.hash_lists
            .get(campaign.hash_list_id)
            .await?
            .ok_or_else(|| DomainError::not_found("hash_list", campaign.hash_list_id))
    }

    /// Load a task and assert the agent owns it. Foreign tasks are
    /// invisible: the caller gets `NotFound`, not `Forbidden`.
    async fn owned_task(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<Task> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| DomainError::not_found("task", task_id))?;
        self.assert_owned(task, agent_id)
    }

    fn assert_owned(&self, task: Task, agent_id: Uuid) -> DomainResult<Task> {
        if task.assigned_agent_id == Some(agent_id) {
            Ok(task)
        } else {
            Err(DomainError::not_found("task", task.id))
        }
    }

    /// Flip a task's state with bounded retries on version collisions.
    async fn set_task_state_with_retry(&self, task_id: Uuid, to_state: TaskState) -> DomainResult<()> {
        for _ in 0..self.config.assign_retry_limit.max(1) {
            let Some(mut task) = self.tasks.get(task_id).await? else {
                return Ok(());
            };
            if task.state == to_state || !task.can_transition_to(to_state) {
                return Ok(());
            }
            task.state = to_state;
            match self.tasks.update(&task).await {
                Ok(()) => {
                    self.events.emit(EntityKind::Task, task_id);
                    return Ok(());
                }
                Err(DomainError::StaleVersion { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(DomainError::StaleVersion { entity: "task", id: task_id })
    }
}

/// Reset a slice for a fresh agent: assignment and progress are dropped.
/// Progress only has meaning while one agent holds the slice.
fn reset_for_requeue(task: &mut Task) {
    task.clear_assignment();
    task.progress_offset = 0;
    task.rejected_count = 0;
    task.device_speeds.clear();
    task.estimated_stop = None;
    task.last_status_at = None;
}
