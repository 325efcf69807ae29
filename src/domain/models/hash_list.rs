//! Hash list and hash item domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A set of target hashes belonging to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashList {
    /// Unique identifier
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    pub name: String,
    /// Hashcat hash-type number (e.g. 0 = MD5, 1000 = NTLM)
    pub hash_type: u32,
    /// Number of items in the list
    pub item_count: u64,
    /// Number of items with a recovered plaintext
    pub cracked_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HashList {
    pub fn new(project_id: Uuid, name: impl Into<String>, hash_type: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            hash_type,
            item_count: 0,
            cracked_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether every item has a recovered plaintext.
    pub fn is_fully_cracked(&self) -> bool {
        self.item_count > 0 && self.cracked_count >= self.item_count
    }
}

/// An individual target hash, optionally salted.
///
/// Once `cracked` flips to true the crack fields are immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashItem {
    /// Unique identifier
    pub id: Uuid,
    pub hash_list_id: Uuid,
    /// Canonical hash value (lower-hex for hex digests)
    pub hash_value: String,
    pub salt: Option<String>,
    pub cracked: bool,
    pub plaintext: Option<String>,
    pub cracked_at: Option<DateTime<Utc>>,
    pub cracked_by_task_id: Option<Uuid>,
}

impl HashItem {
    pub fn new(hash_list_id: Uuid, hash_value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hash_list_id,
            hash_value: hash_value.into(),
            salt: None,
            cracked: false,
            plaintext: None,
            cracked_at: None,
            cracked_by_task_id: None,
        }
    }

    /// Attach a salt.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_not_fully_cracked() {
        let list = HashList::new(Uuid::new_v4(), "dump", 0);
        assert!(!list.is_fully_cracked());
    }

    #[test]
    fn fully_cracked_when_counts_meet() {
        let mut list = HashList::new(Uuid::new_v4(), "dump", 0);
        list.item_count = 3;
        list.cracked_count = 3;
        assert!(list.is_fully_cracked());
    }
}
