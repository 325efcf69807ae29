//! Crack repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Crack;

/// Repository interface for crack records.
#[async_trait]
pub trait CrackRepository: Send + Sync {
    /// Transactionally record a crack: mark the item, insert the crack
    /// row, bump the list's cracked counter, and append the hash value to
    /// the attack's zap log. Returns `false` without mutating anything
    /// when the item was already cracked (first writer wins).
    async fn record(
        &self,
        hash_item_id: Uuid,
        task_id: Uuid,
        attack_id: Uuid,
        plaintext: &str,
        cracked_at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Cracks produced by one task.
    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<Crack>>;
}
