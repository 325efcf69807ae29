//! Attack domain model.
//!
//! An attack is a single cracking configuration (mode plus resources)
//! within a campaign. Its keyspace is partitioned into tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hashcat-style attack mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    Dictionary,
    Mask,
    HybridDict,
    HybridMask,
    BruteForce,
}

impl Default for AttackMode {
    fn default() -> Self {
        Self::Dictionary
    }
}

impl AttackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dictionary => "dictionary",
            Self::Mask => "mask",
            Self::HybridDict => "hybrid_dict",
            Self::HybridMask => "hybrid_mask",
            Self::BruteForce => "brute_force",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dictionary" => Some(Self::Dictionary),
            "mask" => Some(Self::Mask),
            "hybrid_dict" => Some(Self::HybridDict),
            "hybrid_mask" => Some(Self::HybridMask),
            "brute_force" => Some(Self::BruteForce),
            _ => None,
        }
    }
}

/// Lifecycle state of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackState {
    /// Planned, no task accepted yet
    Pending,
    /// At least one task accepted
    Running,
    /// Finished because the hash list has no uncracked items left
    Completed,
    /// Every slice was enumerated without finishing the list
    Exhausted,
    /// Unrecoverable failure
    Failed,
    /// Suspended; tasks are preempted
    Paused,
}

impl Default for AttackState {
    fn default() -> Self {
        Self::Pending
    }
}

impl AttackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
            Self::Paused => "paused",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "exhausted" => Some(Self::Exhausted),
            "failed" => Some(Self::Failed),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    /// Whether the scheduler may hand out this attack's pending tasks.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted | Self::Failed)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> &'static [AttackState] {
        match self {
            Self::Pending => &[Self::Running, Self::Paused, Self::Completed, Self::Exhausted, Self::Failed],
            Self::Running => &[Self::Paused, Self::Completed, Self::Exhausted, Self::Failed],
            Self::Paused => &[Self::Pending, Self::Running, Self::Failed],
            Self::Completed | Self::Exhausted | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// A single cracking configuration within a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    /// Unique identifier
    pub id: Uuid,
    /// Owning campaign
    pub campaign_id: Uuid,
    /// Position within the campaign; unique, starts at 1
    pub position: u32,
    pub mode: AttackMode,
    /// Wordlist resource keys (dictionary and hybrid modes)
    pub wordlists: Vec<String>,
    /// Rule list resource key
    pub rule_list: Option<String>,
    /// Mask patterns (mask and hybrid modes)
    pub masks: Vec<String>,
    /// Custom charsets, positionally ?1 through ?4
    pub custom_charsets: Vec<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    /// Enumerate increasing mask lengths
    pub increment: bool,
    /// Engine workload profile (1-4)
    pub workload_profile: u8,
    /// Use the engine's optimized kernels
    pub optimized: bool,
    /// Derived: total candidates this configuration enumerates
    pub total_keyspace: u64,
    /// Derived: log2 of the keyspace, used for display ordering
    pub complexity_score: f64,
    pub state: AttackState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attack {
    pub fn new(campaign_id: Uuid, position: u32, mode: AttackMode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            position,
            mode,
            wordlists: Vec::new(),
            rule_list: None,
            masks: Vec::new(),
            custom_charsets: Vec::new(),
            min_length: None,
            max_length: None,
            increment: false,
            workload_profile: 3,
            optimized: true,
            total_keyspace: 0,
            complexity_score: 0.0,
            state: AttackState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the derived keyspace and its complexity score.
    pub fn with_keyspace(mut self, total_keyspace: u64) -> Self {
        self.total_keyspace = total_keyspace;
        self.complexity_score = complexity_of(total_keyspace);
        self
    }

    /// Add a wordlist resource key.
    pub fn with_wordlist(mut self, key: impl Into<String>) -> Self {
        self.wordlists.push(key.into());
        self
    }

    pub fn can_transition_to(&self, new_state: AttackState) -> bool {
        self.state.can_transition_to(new_state)
    }

    /// Transition to a new lifecycle state.
    pub fn transition_to(&mut self, new_state: AttackState) -> Result<(), String> {
        if !self.can_transition_to(new_state) {
            return Err(format!(
                "cannot transition attack from {} to {}",
                self.state.as_str(),
                new_state.as_str()
            ));
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Candidate count a hashcat mask enumerates.
///
/// Built-in classes: `?l` `?u` (26), `?d` (10), `?s` (33), `?a` (95),
/// `?b` (256), `?h` `?H` (16). `??` is a literal question mark and any
/// other character matches itself. Unknown classes count as one so a
/// malformed mask degrades instead of zeroing the product.
pub fn mask_keyspace(mask: &str) -> u64 {
    let mut total: u64 = 1;
    let mut chars = mask.chars();
    while let Some(c) = chars.next() {
        let charset_size = if c == '?' {
            match chars.next() {
                Some('l' | 'u') => 26,
                Some('d') => 10,
                Some('s') => 33,
                Some('a') => 95,
                Some('b') => 256,
                Some('h' | 'H') => 16,
                _ => 1,
            }
        } else {
            1
        };
        total = total.saturating_mul(charset_size);
    }
    total
}

/// Display complexity of a keyspace: log2, zero for empty keyspaces.
pub fn complexity_of(total_keyspace: u64) -> f64 {
    if total_keyspace == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        (total_keyspace as f64).log2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedulable_states() {
        assert!(AttackState::Pending.is_schedulable());
        assert!(AttackState::Running.is_schedulable());
        assert!(!AttackState::Paused.is_schedulable());
        assert!(!AttackState::Exhausted.is_schedulable());
    }

    #[test]
    fn complexity_is_log2_of_keyspace() {
        assert_eq!(complexity_of(0), 0.0);
        assert_eq!(complexity_of(1024), 10.0);
    }

    #[test]
    fn mask_keyspace_multiplies_charset_sizes() {
        assert_eq!(mask_keyspace("?d?d?d?d"), 10_000);
        assert_eq!(mask_keyspace("?l?u"), 26 * 26);
        assert_eq!(mask_keyspace("pass?d"), 10);
    }

    #[test]
    fn literal_question_mark_counts_once() {
        assert_eq!(mask_keyspace("??"), 1);
        assert_eq!(mask_keyspace("???d"), 10);
    }
}
