//! Agent-reported errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an agent-reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Minor,
    Major,
    Critical,
    /// Takes the agent out of rotation and releases its task
    Fatal,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
            Self::Fatal => "fatal",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "minor" => Some(Self::Minor),
            "major" => Some(Self::Major),
            "critical" => Some(Self::Critical),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }
}

/// A persisted error report from an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentError {
    /// Unique identifier
    pub id: Uuid,
    pub agent_id: Uuid,
    /// Task the error occurred on, when known
    pub task_id: Option<Uuid>,
    pub severity: ErrorSeverity,
    pub message: String,
    /// Free-form structured context from the agent
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AgentError {
    pub fn new(agent_id: Uuid, severity: ErrorSeverity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            task_id: None,
            severity,
            message: message.into(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Attach the task the error occurred on.
    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Attach structured context.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
