//! Zap-list repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;

/// Repository interface for per-(agent, attack) zap-list cursors.
#[async_trait]
pub trait ZapRepository: Send + Sync {
    /// Return the attack's zap entries the agent has not seen yet and
    /// advance the agent's cursor past them, in one transaction. Each
    /// cracked hash value is therefore served to a given agent at most
    /// once.
    async fn drain(&self, agent_id: Uuid, attack_id: Uuid) -> DomainResult<Vec<String>>;
}
