//! Agent error repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::AgentError;

/// Repository interface for agent error reports.
#[async_trait]
pub trait AgentErrorRepository: Send + Sync {
    /// Persist an error report.
    async fn create(&self, error: &AgentError) -> DomainResult<()>;

    /// Most recent errors for an agent, newest first.
    async fn list_by_agent(&self, agent_id: Uuid, limit: u32) -> DomainResult<Vec<AgentError>>;
}
