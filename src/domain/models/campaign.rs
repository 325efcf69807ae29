//! Campaign domain model.
//!
//! A campaign is an ordered collection of attacks against one hash list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    /// Being configured; not schedulable
    Draft,
    /// Attacks are eligible for dispatch
    Active,
    /// Dispatch suspended; in-flight tasks are preempted
    Paused,
    /// All items cracked or all attacks exhausted
    Completed,
    /// Retired from view
    Archived,
    /// Failed in a way that needs operator attention
    Error,
}

impl Default for CampaignState {
    fn default() -> Self {
        Self::Draft
    }
}

impl CampaignState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Archived => "archived",
            Self::Error => "error",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether tasks of this campaign may be handed to agents.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> &'static [CampaignState] {
        match self {
            Self::Draft => &[Self::Active, Self::Archived],
            Self::Active => &[Self::Paused, Self::Completed, Self::Error, Self::Archived],
            Self::Paused => &[Self::Active, Self::Completed, Self::Archived],
            Self::Completed => &[Self::Archived],
            Self::Archived => &[],
            Self::Error => &[Self::Active, Self::Archived],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// An ordered set of attacks against one hash list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Higher values are dispatched first
    pub priority: i32,
    /// The hash list all attacks target
    pub hash_list_id: Uuid,
    pub state: CampaignState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(project_id: Uuid, name: impl Into<String>, hash_list_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            description: None,
            priority: 0,
            hash_list_id,
            state: CampaignState::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set dispatch priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn can_transition_to(&self, new_state: CampaignState) -> bool {
        self.state.can_transition_to(new_state)
    }

    /// Transition to a new lifecycle state.
    pub fn transition_to(&mut self, new_state: CampaignState) -> Result<(), String> {
        if !self.can_transition_to(new_state) {
            return Err(format!(
                "cannot transition campaign from {} to {}",
                self.state.as_str(),
                new_state.as_str()
            ));
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_campaigns_are_not_schedulable() {
        let campaign = Campaign::new(Uuid::new_v4(), "ops", Uuid::new_v4());
        assert!(!campaign.state.is_schedulable());
        assert!(campaign.can_transition_to(CampaignState::Active));
    }

    #[test]
    fn pause_resume_round_trip() {
        let mut campaign = Campaign::new(Uuid::new_v4(), "ops", Uuid::new_v4());
        campaign.transition_to(CampaignState::Active).unwrap();
        campaign.transition_to(CampaignState::Paused).unwrap();
        campaign.transition_to(CampaignState::Active).unwrap();
        assert_eq!(campaign.state, CampaignState::Active);
    }
}
