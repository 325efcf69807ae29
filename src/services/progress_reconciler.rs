//! Progress reconciler.
//!
//! Ingests agent status reports: enforces ownership, pause preemption,
//! and the staleness window, validates progress monotonicity, and keeps
//! the task's progress and completion estimate current.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AttackState, CampaignState, DeviceSpeed, SchedulerConfig, StatusReport, TaskState,
};
use crate::domain::ports::{AttackRepository, CampaignRepository, TaskRepository};
use crate::services::event_bus::{EntityKind, EventBus};

/// Longest completion estimate worth storing; beyond this the estimate is
/// left empty rather than projecting years out.
const MAX_ETA_SECS: i64 = 365 * 24 * 3600;

/// Applies status reports to tasks.
pub struct ProgressReconciler {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    events: Arc<EventBus>,
    config: SchedulerConfig,
}

impl ProgressReconciler {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        events: Arc<EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        Self { tasks, attacks, campaigns, events, config }
    }

    /// Apply one status report.
    ///
    /// Outcomes map onto the agent wire: `Preempted` → 410 (stop work),
    /// `Stale` → 202 (dropped), `Malformed` → 422, success → 204.
    #[instrument(skip(self, report), fields(agent_id = %agent_id, task_id = %task_id))]
    pub async fn submit_status(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        report: &StatusReport,
    ) -> DomainResult<()> {
        for _ in 0..self.config.assign_retry_limit.max(1) {
            let mut task = self
                .tasks
                .get(task_id)
                .await?
                .ok_or_else(|| DomainError::not_found("task", task_id))?;

            if task.assigned_agent_id != Some(agent_id) {
                return Err(DomainError::not_found("task", task_id));
            }
            if task.state.is_terminal() {
                return Err(DomainError::Conflict("task already finished".to_string()));
            }

            if task.state == TaskState::Paused || self.work_is_suspended(task.attack_id).await? {
                return Err(DomainError::Preempted);
            }

            // Reports older than the stored state minus the window are noise
            // from a delayed or replayed sender.
            if let Some(last) = task.last_status_at {
                let stale_cutoff =
                    last - chrono::Duration::seconds(self.config.stale_window_seconds as i64);
                if report.timestamp < stale_cutoff {
                    return Err(DomainError::Stale);
                }
            }

            if report.progress_processed > task.keyspace_length {
                return Err(DomainError::Malformed(format!(
                    "processed {} exceeds slice length {}",
                    report.progress_processed, task.keyspace_length
                )));
            }
            if report.progress_processed < task.progress_offset {
                return Err(DomainError::Malformed(format!(
                    "processed {} regresses below recorded progress {}",
                    report.progress_processed, task.progress_offset
                )));
            }

            let now = Utc::now();
            task.progress_offset = report.progress_processed;
            task.last_status_at = Some(now);
            task.rejected_count = report.rejected;
            task.device_speeds = report
                .device_statuses
                .iter()
                .map(|d| DeviceSpeed { device_index: d.device_index, speed: d.speed })
                .collect();
            if task.state == TaskState::Assigned {
                task.state = TaskState::Running;
            }

            task.estimated_stop = estimate_stop(
                task.remaining_keyspace(),
                report.total_speed(),
                now,
            );

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

    /// Whether the owning attack or campaign is paused or already settled,
    /// meaning the agent should stop working this slice.
    async fn work_is_suspended(&self, attack_id: Uuid) -> DomainResult<bool> {
        let attack = self
            .attacks
            .get(attack_id)
            .await?
            .ok_or_else(|| DomainError::not_found("attack", attack_id))?;
        if attack.state == AttackState::Paused {
            return Ok(true);
        }

        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", attack.campaign_id))?;
        Ok(matches!(
            campaign.state,
            CampaignState::Paused | CampaignState::Completed | CampaignState::Archived
        ))
    }
}

/// Completion estimate from remaining work and current speed. No speed or
/// an absurd horizon yields no estimate.
fn estimate_stop(
    remaining: u64,
    speed: f64,
    now: chrono::DateTime<Utc>,
) -> Option<chrono::DateTime<Utc>> {
    if !(speed.is_finite() && speed > 0.0) {
        return None;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let eta_secs = (remaining as f64 / speed).ceil() as i64;
    if eta_secs > MAX_ETA_SECS {
        return None;
    }
    Some(now + chrono::Duration::seconds(eta_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_speed_yields_no_estimate() {
        assert_eq!(estimate_stop(1000, 0.0, Utc::now()), None);
    }

    #[test]
    fn estimate_is_remaining_over_speed() {
        let now = Utc::now();
        let stop = estimate_stop(1000, 100.0, now).unwrap();
        assert_eq!((stop - now).num_seconds(), 10);
    }

    #[test]
    fn absurd_horizons_are_dropped() {
        assert_eq!(estimate_stop(u64::MAX, 1.0, Utc::now()), None);
    }
}
