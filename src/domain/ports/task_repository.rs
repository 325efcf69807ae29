//! Task repository port.
//!
//! Assignment and release are two-row transactions over the task and its
//! agent; both rows are version-checked so that no slice is ever handed
//! to two agents across any interleaving.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, Task, TaskState};

/// Repository interface for Task persistence.
///
/// The same versioning convention as [`super::AgentRepository`] applies:
/// models carry the loaded version, the store bumps it on write, and
/// collisions fail with `StaleVersion`.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task.
    async fn create(&self, task: &Task) -> DomainResult<()>;

    /// Create a batch of planner-produced tasks.
    async fn create_many(&self, tasks: &[Task]) -> DomainResult<()>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Version-checked update of an existing task.
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// Delete a batch of tasks (used by replan to retire stale slices).
    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<()>;

    /// Tasks of an attack, ordered by keyspace offset.
    async fn list_by_attack(&self, attack_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Tasks in a given state, across all attacks.
    async fn list_by_state(&self, state: TaskState) -> DomainResult<Vec<Task>>;

    /// Agent-held tasks belonging to a campaign's attacks.
    async fn list_held_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Pending tasks an agent with the given benchmarked hash types could
    /// take, ranked by (campaign priority desc, attack position asc,
    /// keyspace offset asc, task id asc). `any_hash_type` drops the
    /// benchmark filter for agents opted into additional hash types.
    async fn next_candidates(
        &self,
        hash_types: &[u32],
        any_hash_type: bool,
        limit: u32,
    ) -> DomainResult<Vec<Task>>;

    /// Atomically persist an assignment: the task row (which must still be
    /// pending at its loaded version) and the agent row (which must still
    /// hold no task) in one transaction.
    async fn assign(&self, task: &Task, agent: &Agent) -> DomainResult<()>;

    /// Atomically persist a release: task and agent rows in one
    /// transaction, both version-checked.
    async fn release(&self, task: &Task, agent: &Agent) -> DomainResult<()>;

    /// Task counts per state for one attack.
    async fn count_by_state(&self, attack_id: Uuid) -> DomainResult<HashMap<TaskState, u64>>;
}
