//! Campaign repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Campaign, CampaignState};

/// Repository interface for Campaign persistence.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Create a new campaign.
    async fn create(&self, campaign: &Campaign) -> DomainResult<()>;

    /// Get a campaign by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Campaign>>;

    /// Update an existing campaign.
    async fn update(&self, campaign: &Campaign) -> DomainResult<()>;

    /// Delete a campaign (cascades to attacks and tasks).
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List all campaigns, highest priority first.
    async fn list(&self) -> DomainResult<Vec<Campaign>>;

    /// List campaigns in a given state.
    async fn list_by_state(&self, state: CampaignState) -> DomainResult<Vec<Campaign>>;
}
