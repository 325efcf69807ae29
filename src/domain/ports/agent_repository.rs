//! Agent repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentState, Benchmark};

/// Repository interface for Agent persistence.
///
/// `update` is version-checked: the passed model carries the version it
/// was loaded with, the store bumps it on write, and a collision with a
/// concurrent writer fails with `StaleVersion`. The in-memory copy is
/// stale after a successful write; reload before mutating again.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Persist a newly registered agent.
    async fn create(&self, agent: &Agent) -> DomainResult<()>;

    /// Get an agent by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>>;

    /// Resolve a bearer token to its agent.
    async fn get_by_token(&self, token: &str) -> DomainResult<Option<Agent>>;

    /// Version-checked update of an existing agent.
    async fn update(&self, agent: &Agent) -> DomainResult<()>;

    /// List all agents.
    async fn list(&self) -> DomainResult<Vec<Agent>>;

    /// List agents in a given lifecycle state.
    async fn list_by_state(&self, state: AgentState) -> DomainResult<Vec<Agent>>;

    /// Atomically replace the agent's benchmark set.
    async fn replace_benchmarks(&self, agent_id: Uuid, benchmarks: &[Benchmark]) -> DomainResult<()>;

    /// All benchmarks recorded for an agent.
    async fn benchmarks(&self, agent_id: Uuid) -> DomainResult<Vec<Benchmark>>;

    /// Distinct hash types the agent has benchmarked.
    async fn benchmarked_hash_types(&self, agent_id: Uuid) -> DomainResult<Vec<u32>>;

    /// Median per-agent aggregate speed for a hash type across active
    /// agents. `None` when no active agent has benchmarked the type.
    async fn median_hash_speed(&self, hash_type: u32) -> DomainResult<Option<f64>>;

    /// One agent's aggregate speed (sum over devices) for a hash type.
    async fn agent_hash_speed(&self, agent_id: Uuid, hash_type: u32) -> DomainResult<Option<f64>>;
}
