//! SQLite implementation of the AgentErrorRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentError, ErrorSeverity};
use crate::domain::ports::AgentErrorRepository;

#[derive(Clone)]
pub struct SqliteAgentErrorRepository {
    pool: SqlitePool,
}

impl SqliteAgentErrorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentErrorRepository for SqliteAgentErrorRepository {
    async fn create(&self, error: &AgentError) -> DomainResult<()> {
        let metadata_json = serde_json::to_string(&error.metadata)?;

        sqlx::query(
            r#"INSERT INTO agent_errors (id, agent_id, task_id, severity, message, metadata, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(error.id.to_string())
        .bind(error.agent_id.to_string())
        .bind(error.task_id.map(|id| id.to_string()))
        .bind(error.severity.as_str())
        .bind(&error.message)
        .bind(&metadata_json)
        .bind(error.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_by_agent(&self, agent_id: Uuid, limit: u32) -> DomainResult<Vec<AgentError>> {
        let rows: Vec<AgentErrorRow> = sqlx::query_as(
            "SELECT * FROM agent_errors WHERE agent_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(agent_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AgentError::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AgentErrorRow {
    id: String,
    agent_id: String,
    task_id: Option<String>,
    severity: String,
    message: String,
    metadata: Option<String>,
    created_at: String,
}

impl TryFrom<AgentErrorRow> for AgentError {
    type Error = DomainError;

    fn try_from(row: AgentErrorRow) -> Result<Self, Self::Error> {
        let severity = ErrorSeverity::parse_str(&row.severity).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid error severity: {}", row.severity))
        })?;

        let metadata = match row.metadata {
            Some(ref json) => serde_json::from_str(json)
                .map_err(|e| DomainError::Serialization(format!("Invalid error metadata: {e}")))?,
            None => serde_json::Value::Null,
        };

        Ok(AgentError {
            id: super::parse_uuid(&row.id)?,
            agent_id: super::parse_uuid(&row.agent_id)?,
            task_id: super::parse_optional_uuid(row.task_id)?,
            severity,
            message: row.message,
            metadata,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
