//! Hash list repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HashItem, HashList};

/// Repository interface for hash lists and their items.
#[async_trait]
pub trait HashListRepository: Send + Sync {
    /// Create a new hash list.
    async fn create(&self, list: &HashList) -> DomainResult<()>;

    /// Get a hash list by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<HashList>>;

    /// List all hash lists.
    async fn list(&self) -> DomainResult<Vec<HashList>>;

    /// Insert items, skipping hash values already present in the list.
    /// Returns the number actually added; `item_count` is bumped to match.
    async fn add_items(&self, list_id: Uuid, items: &[HashItem]) -> DomainResult<u64>;

    /// Get a single item by ID.
    async fn get_item(&self, id: Uuid) -> DomainResult<Option<HashItem>>;

    /// Find an item by its canonical hash value.
    async fn find_item_by_hash(&self, list_id: Uuid, hash_value: &str) -> DomainResult<Option<HashItem>>;

    /// Items of a list, optionally filtered on cracked state.
    async fn list_items(&self, list_id: Uuid, cracked: Option<bool>) -> DomainResult<Vec<HashItem>>;

    /// Hash values still lacking a plaintext, as served to agents.
    async fn uncracked_values(&self, list_id: Uuid) -> DomainResult<Vec<String>>;
}
