//! SQLite implementation of the TaskRepository.
//!
//! Assignment and release write the task and agent rows inside one
//! transaction, each guarded by its optimistic version, so a slice can
//! never be handed to two agents.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, DeviceSpeed, Task, TaskState};
use crate::domain::ports::TaskRepository;

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let device_speeds_json = serde_json::to_string(&task.device_speeds)?;

        sqlx::query(
            r#"INSERT INTO tasks (id, attack_id, keyspace_offset, keyspace_length, state,
               assigned_agent_id, assigned_at, accepted_at, last_status_at, progress_offset,
               rejected_count, device_speeds, estimated_stop, created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.attack_id.to_string())
        .bind(task.keyspace_offset as i64)
        .bind(task.keyspace_length as i64)
        .bind(task.state.as_str())
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(task.assigned_at.map(|t| t.to_rfc3339()))
        .bind(task.accepted_at.map(|t| t.to_rfc3339()))
        .bind(task.last_status_at.map(|t| t.to_rfc3339()))
        .bind(task.progress_offset as i64)
        .bind(task.rejected_count as i64)
        .bind(&device_speeds_json)
        .bind(task.estimated_stop.map(|t| t.to_rfc3339()))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.version as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_many(&self, tasks: &[Task]) -> DomainResult<()> {
        for task in tasks {
            self.create(task).await?;
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let device_speeds_json = serde_json::to_string(&task.device_speeds)?;

        let result = sqlx::query(
            r#"UPDATE tasks SET state = ?, assigned_agent_id = ?, assigned_at = ?,
               accepted_at = ?, last_status_at = ?, progress_offset = ?, rejected_count = ?,
               device_speeds = ?, estimated_stop = ?, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(task.state.as_str())
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(task.assigned_at.map(|t| t.to_rfc3339()))
        .bind(task.accepted_at.map(|t| t.to_rfc3339()))
        .bind(task.last_status_at.map(|t| t.to_rfc3339()))
        .bind(task.progress_offset as i64)
        .bind(task.rejected_count as i64)
        .bind(&device_speeds_json)
        .bind(task.estimated_stop.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .bind(task.id.to_string())
        .bind(task.version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM tasks WHERE id = ?")
                .bind(task.id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Err(DomainError::StaleVersion { entity: "task", id: task.id }),
                None => Err(DomainError::not_found("task", task.id)),
            };
        }

        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM tasks WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_by_attack(&self, attack_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE attack_id = ? ORDER BY keyspace_offset")
                .bind(attack_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn list_by_state(&self, state: TaskState) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE state = ? ORDER BY created_at")
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn list_held_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT t.* FROM tasks t
               JOIN attacks a ON a.id = t.attack_id
               WHERE a.campaign_id = ? AND t.state IN ('assigned', 'running', 'paused')
               ORDER BY t.keyspace_offset"#,
        )
        .bind(campaign_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn next_candidates(
        &self,
        hash_types: &[u32],
        any_hash_type: bool,
        limit: u32,
    ) -> DomainResult<Vec<Task>> {
        if !any_hash_type && hash_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = String::from(
            r#"SELECT t.* FROM tasks t
               JOIN attacks a ON a.id = t.attack_id
               JOIN campaigns c ON c.id = a.campaign_id
               JOIN hash_lists hl ON hl.id = c.hash_list_id
               WHERE t.state = 'pending'
                 AND a.state IN ('pending', 'running')
                 AND c.state = 'active'"#,
        );
        if !any_hash_type {
            query.push_str(" AND hl.hash_type IN (");
            query.push_str(&vec!["?"; hash_types.len()].join(", "));
            query.push(')');
        }
        query.push_str(
            " ORDER BY c.priority DESC, a.position ASC, t.keyspace_offset ASC, t.id ASC LIMIT ?",
        );

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        if !any_hash_type {
            for hash_type in hash_types {
                q = q.bind(i64::from(*hash_type));
            }
        }
        q = q.bind(i64::from(limit));

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn assign(&self, task: &Task, agent: &Agent) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let task_result = sqlx::query(
            r#"UPDATE tasks SET state = ?, assigned_agent_id = ?, assigned_at = ?,
               accepted_at = NULL, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ? AND state = 'pending'"#,
        )
        .bind(task.state.as_str())
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(task.assigned_at.map(|t| t.to_rfc3339()))
        .bind(&now)
        .bind(task.id.to_string())
        .bind(task.version as i64)
        .execute(&mut *tx)
        .await?;

        if task_result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::StaleVersion { entity: "task", id: task.id });
        }

        let agent_result = sqlx::query(
            r#"UPDATE agents SET assigned_task_id = ?, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ? AND assigned_task_id IS NULL"#,
        )
        .bind(task.id.to_string())
        .bind(&now)
        .bind(agent.id.to_string())
        .bind(agent.version as i64)
        .execute(&mut *tx)
        .await?;

        if agent_result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::StaleVersion { entity: "agent", id: agent.id });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn release(&self, task: &Task, agent: &Agent) -> DomainResult<()> {
        let device_speeds_json = serde_json::to_string(&task.device_speeds)?;
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let task_result = sqlx::query(
            r#"UPDATE tasks SET state = ?, assigned_agent_id = ?, assigned_at = ?,
               accepted_at = ?, last_status_at = ?, progress_offset = ?, rejected_count = ?,
               device_speeds = ?, estimated_stop = ?, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(task.state.as_str())
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(task.assigned_at.map(|t| t.to_rfc3339()))
        .bind(task.accepted_at.map(|t| t.to_rfc3339()))
        .bind(task.last_status_at.map(|t| t.to_rfc3339()))
        .bind(task.progress_offset as i64)
        .bind(task.rejected_count as i64)
        .bind(&device_speeds_json)
        .bind(task.estimated_stop.map(|t| t.to_rfc3339()))
        .bind(&now)
        .bind(task.id.to_string())
        .bind(task.version as i64)
        .execute(&mut *tx)
        .await?;

        if task_result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::StaleVersion { entity: "task", id: task.id });
        }

        let agent_result = sqlx::query(
            r#"UPDATE agents SET assigned_task_id = NULL, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(&now)
        .bind(agent.id.to_string())
        .bind(agent.version as i64)
        .execute(&mut *tx)
        .await?;

        if agent_result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::StaleVersion { entity: "agent", id: agent.id });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_by_state(&self, attack_id: Uuid) -> DomainResult<HashMap<TaskState, u64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM tasks WHERE attack_id = ? GROUP BY state",
        )
        .bind(attack_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::new();
        for (state, count) in rows {
            if let Some(state) = TaskState::from_str(&state) {
                counts.insert(state, count as u64);
            }
        }
        Ok(counts)
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    attack_id: String,
    keyspace_offset: i64,
    keyspace_length: i64,
    state: String,
    assigned_agent_id: Option<String>,
    assigned_at: Option<String>,
    accepted_at: Option<String>,
    last_status_at: Option<String>,
    progress_offset: i64,
    rejected_count: i64,
    device_speeds: Option<String>,
    estimated_stop: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let state = TaskState::from_str(&row.state)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid task state: {}", row.state)))?;
        let device_speeds: Vec<DeviceSpeed> = super::parse_json_or_default(row.device_speeds)?;

        Ok(Task {
            id: super::parse_uuid(&row.id)?,
            attack_id: super::parse_uuid(&row.attack_id)?,
            keyspace_offset: row.keyspace_offset as u64,
            keyspace_length: row.keyspace_length as u64,
            state,
            assigned_agent_id: super::parse_optional_uuid(row.assigned_agent_id)?,
            assigned_at: super::parse_optional_datetime(row.assigned_at)?,
            accepted_at: super::parse_optional_datetime(row.accepted_at)?,
            last_status_at: super::parse_optional_datetime(row.last_status_at)?,
            progress_offset: row.progress_offset as u64,
            rejected_count: row.rejected_count as u64,
            device_speeds,
            estimated_stop: super::parse_optional_datetime(row.estimated_stop)?,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
            version: row.version as u64,
        })
    }
}
