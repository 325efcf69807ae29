//! Crack records and zap-list entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recovered plaintext, at most one per hash item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crack {
    /// Unique identifier
    pub id: Uuid,
    /// Task that produced the plaintext
    pub task_id: Uuid,
    /// Item the plaintext belongs to
    pub hash_item_id: Uuid,
    pub plaintext: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a crack submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrackOutcome {
    /// Recorded; uncracked items remain in the list
    MoreRemain,
    /// Recorded; every item in the list is now cracked
    ListComplete,
    /// The item was already cracked; submission is an idempotent no-op
    AlreadyCracked,
}

/// One hash value in an attack's append-only zap log.
///
/// Agents working the same attack drain these to drop freshly-cracked
/// hashes from their in-flight work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapEntry {
    /// Monotonic serial assigned by the repository
    pub serial: i64,
    pub attack_id: Uuid,
    pub hash_value: String,
}
