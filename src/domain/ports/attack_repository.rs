//! Attack repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Attack;

/// Repository interface for Attack persistence.
#[async_trait]
pub trait AttackRepository: Send + Sync {
    /// Create a new attack.
    async fn create(&self, attack: &Attack) -> DomainResult<()>;

    /// Get an attack by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Attack>>;

    /// Update an existing attack.
    async fn update(&self, attack: &Attack) -> DomainResult<()>;

    /// Delete an attack (cascades to its tasks).
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// Attacks of a campaign, ordered by position.
    async fn list_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Attack>>;
}
