//! Task domain model.
//!
//! A task is a contiguous slice of an attack's keyspace, assigned to at
//! most one agent at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in the scheduling pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for an eligible agent
    Pending,
    /// Handed to an agent, not yet accepted
    Assigned,
    /// Agent accepted and is reporting progress
    Running,
    /// Owning campaign or attack is paused; agent will be preempted
    Paused,
    /// No further work is meaningful (e.g. the hash list finished)
    Completed,
    /// The agent enumerated the whole slice
    Exhausted,
    /// Given up by the agent or the timekeeper; eligible for requeue
    Abandoned,
    /// Unrecoverable failure on the agent side
    Failed,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Abandoned => "abandoned",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" | "complete" => Some(Self::Completed),
            "exhausted" => Some(Self::Exhausted),
            "abandoned" => Some(Self::Abandoned),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted | Self::Failed)
    }

    /// States in which the task is owned by an agent.
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Assigned | Self::Running | Self::Paused)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> &'static [TaskState] {
        match self {
            Self::Pending => &[Self::Assigned, Self::Completed],
            Self::Assigned => &[
                Self::Running,
                Self::Paused,
                Self::Pending,
                Self::Completed,
                Self::Exhausted,
                Self::Abandoned,
                Self::Failed,
            ],
            Self::Running => &[
                Self::Paused,
                Self::Pending,
                Self::Completed,
                Self::Exhausted,
                Self::Abandoned,
                Self::Failed,
            ],
            Self::Paused => &[Self::Assigned, Self::Pending, Self::Abandoned],
            Self::Abandoned => &[Self::Pending], // Can requeue
            Self::Completed | Self::Exhausted | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// A planner-produced slice, not yet persisted as a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub keyspace_offset: u64,
    pub keyspace_length: u64,
}

impl TaskSpec {
    /// Exclusive end of the slice interval.
    pub fn end(&self) -> u64 {
        self.keyspace_offset + self.keyspace_length
    }
}

/// Per-device speed snapshot from the latest status report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceSpeed {
    pub device_index: u32,
    /// Hashes per second
    pub speed: f64,
}

/// A contiguous keyspace slice of an attack, worked by one agent at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Owning attack
    pub attack_id: Uuid,
    /// First candidate index covered by this slice
    pub keyspace_offset: u64,
    /// Number of candidates in this slice (always > 0)
    pub keyspace_length: u64,
    /// Current state
    pub state: TaskState,
    /// Owning agent while held
    pub assigned_agent_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub last_status_at: Option<DateTime<Utc>>,
    /// Candidates processed within this slice; monotonically non-decreasing
    pub progress_offset: u64,
    /// Candidates the engine rejected (bad encoding, length, ...)
    pub rejected_count: u64,
    /// Per-device speeds from the latest status report
    pub device_speeds: Vec<DeviceSpeed>,
    /// Server-side completion estimate from the latest report
    pub estimated_stop: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Version for optimistic locking; incremented by the repository
    pub version: u64,
}

impl Task {
    /// Materialize a planner slice for an attack.
    pub fn from_spec(attack_id: Uuid, spec: TaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            attack_id,
            keyspace_offset: spec.keyspace_offset,
            keyspace_length: spec.keyspace_length,
            state: TaskState::Pending,
            assigned_agent_id: None,
            assigned_at: None,
            accepted_at: None,
            last_status_at: None,
            progress_offset: 0,
            rejected_count: 0,
            device_speeds: Vec::new(),
            estimated_stop: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Exclusive end of the slice interval.
    pub fn keyspace_end(&self) -> u64 {
        self.keyspace_offset + self.keyspace_length
    }

    /// Candidates left to enumerate in this slice.
    pub fn remaining_keyspace(&self) -> u64 {
        self.keyspace_length.saturating_sub(self.progress_offset)
    }

    /// Aggregate speed across the last reported device snapshot.
    pub fn current_hash_speed(&self) -> f64 {
        self.device_speeds.iter().map(|d| d.speed).sum()
    }

    pub fn can_transition_to(&self, new_state: TaskState) -> bool {
        self.state.can_transition_to(new_state)
    }

    /// Transition to a new state. Assignment fields are managed by the
    /// scheduler, not here.
    pub fn transition_to(&mut self, new_state: TaskState) -> Result<(), String> {
        if !self.can_transition_to(new_state) {
            return Err(format!(
                "cannot transition task from {} to {}",
                self.state.as_str(),
                new_state.as_str()
            ));
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Drop agent ownership. Used on release, abandon, and terminal moves.
    pub fn clear_assignment(&mut self) {
        self.assigned_agent_id = None;
        self.assigned_at = None;
        self.accepted_at = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_states_match_assignment_invariant() {
        assert!(TaskState::Assigned.is_held());
        assert!(TaskState::Running.is_held());
        assert!(TaskState::Paused.is_held());
        assert!(!TaskState::Pending.is_held());
        assert!(!TaskState::Exhausted.is_held());
    }

    #[test]
    fn abandoned_can_only_requeue() {
        assert_eq!(TaskState::Abandoned.valid_transitions(), &[TaskState::Pending]);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for state in [TaskState::Completed, TaskState::Exhausted, TaskState::Failed] {
            assert!(state.is_terminal());
            assert!(state.valid_transitions().is_empty());
        }
    }

    #[test]
    fn remaining_keyspace_tracks_progress() {
        let mut task = Task::from_spec(
            Uuid::new_v4(),
            TaskSpec { keyspace_offset: 100, keyspace_length: 50 },
        );
        assert_eq!(task.keyspace_end(), 150);
        task.progress_offset = 20;
        assert_eq!(task.remaining_keyspace(), 30);
    }
}
