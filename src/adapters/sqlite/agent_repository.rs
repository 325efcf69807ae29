//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentActivity, AgentConfig, AgentState, Benchmark};
use crate::domain::ports::AgentRepository;

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> DomainResult<()> {
        let devices_json = serde_json::to_string(&agent.devices)?;
        let config_json = serde_json::to_string(&agent.config)?;

        sqlx::query(
            r#"INSERT INTO agents (id, label, host_name, operating_system, client_signature,
               devices, state, activity, config, token, last_seen_at, last_ip,
               assigned_task_id, created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(agent.id.to_string())
        .bind(&agent.label)
        .bind(&agent.host_name)
        .bind(&agent.operating_system)
        .bind(&agent.client_signature)
        .bind(&devices_json)
        .bind(agent.state.as_str())
        .bind(agent.activity.as_str())
        .bind(&config_json)
        .bind(&agent.token)
        .bind(agent.last_seen_at.map(|t| t.to_rfc3339()))
        .bind(&agent.last_ip)
        .bind(agent.assigned_task_id.map(|id| id.to_string()))
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .bind(agent.version as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Agent::try_from).transpose()
    }

    async fn get_by_token(&self, token: &str) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Agent::try_from).transpose()
    }

    async fn update(&self, agent: &Agent) -> DomainResult<()> {
        let devices_json = serde_json::to_string(&agent.devices)?;
        let config_json = serde_json::to_string(&agent.config)?;

        let result = sqlx::query(
            r#"UPDATE agents SET label = ?, host_name = ?, operating_system = ?,
               client_signature = ?, devices = ?, state = ?, activity = ?, config = ?,
               last_seen_at = ?, last_ip = ?, assigned_task_id = ?, updated_at = ?,
               version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(&agent.label)
        .bind(&agent.host_name)
        .bind(&agent.operating_system)
        .bind(&agent.client_signature)
        .bind(&devices_json)
        .bind(agent.state.as_str())
        .bind(agent.activity.as_str())
        .bind(&config_json)
        .bind(agent.last_seen_at.map(|t| t.to_rfc3339()))
        .bind(&agent.last_ip)
        .bind(agent.assigned_task_id.map(|id| id.to_string()))
        .bind(Utc::now().to_rfc3339())
        .bind(agent.id.to_string())
        .bind(agent.version as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing row from a version collision
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM agents WHERE id = ?")
                .bind(agent.id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Err(DomainError::StaleVersion { entity: "agent", id: agent.id }),
                None => Err(DomainError::not_found("agent", agent.id)),
            };
        }

        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Agent::try_from).collect()
    }

    async fn list_by_state(&self, state: AgentState) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> =
            sqlx::query_as("SELECT * FROM agents WHERE state = ? ORDER BY created_at")
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Agent::try_from).collect()
    }

    async fn replace_benchmarks(&self, agent_id: Uuid, benchmarks: &[Benchmark]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM benchmarks WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .execute(&mut *tx)
            .await?;

        for bench in benchmarks {
            sqlx::query(
                r#"INSERT INTO benchmarks (agent_id, hash_type, device_index, runtime_ms,
                   hash_speed, recorded_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(agent_id.to_string())
            .bind(i64::from(bench.hash_type))
            .bind(i64::from(bench.device_index))
            .bind(bench.runtime_ms as i64)
            .bind(bench.hash_speed)
            .bind(bench.recorded_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn benchmarks(&self, agent_id: Uuid) -> DomainResult<Vec<Benchmark>> {
        let rows: Vec<BenchmarkRow> = sqlx::query_as(
            "SELECT * FROM benchmarks WHERE agent_id = ? ORDER BY hash_type, device_index",
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Benchmark::try_from).collect()
    }

    async fn benchmarked_hash_types(&self, agent_id: Uuid) -> DomainResult<Vec<u32>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT hash_type FROM benchmarks WHERE agent_id = ? ORDER BY hash_type",
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(t,)| t as u32).collect())
    }

    async fn median_hash_speed(&self, hash_type: u32) -> DomainResult<Option<f64>> {
        let rows: Vec<(f64,)> = sqlx::query_as(
            r#"SELECT SUM(b.hash_speed) AS agent_speed
               FROM benchmarks b
               JOIN agents a ON a.id = b.agent_id
               WHERE b.hash_type = ? AND a.state = 'active'
               GROUP BY b.agent_id
               ORDER BY agent_speed"#,
        )
        .bind(i64::from(hash_type))
        .fetch_all(&self.pool)
        .await?;

        Ok(median(rows.into_iter().map(|(s,)| s).collect()))
    }

    async fn agent_hash_speed(&self, agent_id: Uuid, hash_type: u32) -> DomainResult<Option<f64>> {
        let row: Option<(Option<f64>,)> = sqlx::query_as(
            "SELECT SUM(hash_speed) FROM benchmarks WHERE agent_id = ? AND hash_type = ?",
        )
        .bind(agent_id.to_string())
        .bind(i64::from(hash_type))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(s,)| s))
    }
}

/// Median of an already-sorted sample; mean of the middle pair when even.
fn median(speeds: Vec<f64>) -> Option<f64> {
    if speeds.is_empty() {
        return None;
    }
    let mid = speeds.len() / 2;
    if speeds.len() % 2 == 1 {
        Some(speeds[mid])
    } else {
        Some((speeds[mid - 1] + speeds[mid]) / 2.0)
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    label: Option<String>,
    host_name: String,
    operating_system: String,
    client_signature: String,
    devices: Option<String>,
    state: String,
    activity: String,
    config: Option<String>,
    token: String,
    last_seen_at: Option<String>,
    last_ip: Option<String>,
    assigned_task_id: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<AgentRow> for Agent {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let state = AgentState::parse_str(&row.state)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid agent state: {}", row.state)))?;
        let activity = AgentActivity::parse_str(&row.activity).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid agent activity: {}", row.activity))
        })?;

        let devices: Vec<String> = super::parse_json_or_default(row.devices)?;
        let config: AgentConfig = match row.config {
            Some(ref json) => serde_json::from_str(json)
                .map_err(|e| DomainError::Serialization(format!("Invalid agent config: {e}")))?,
            None => AgentConfig::default(),
        };

        Ok(Agent {
            id: super::parse_uuid(&row.id)?,
            label: row.label,
            host_name: row.host_name,
            operating_system: row.operating_system,
            client_signature: row.client_signature,
            devices,
            state,
            activity,
            config,
            token: row.token,
            last_seen_at: super::parse_optional_datetime(row.last_seen_at)?,
            last_ip: row.last_ip,
            assigned_task_id: super::parse_optional_uuid(row.assigned_task_id)?,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
            version: row.version as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BenchmarkRow {
    hash_type: i64,
    device_index: i64,
    runtime_ms: i64,
    hash_speed: f64,
    recorded_at: String,
}

impl TryFrom<BenchmarkRow> for Benchmark {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: BenchmarkRow) -> Result<Self, Self::Error> {
        Ok(Benchmark {
            hash_type: row.hash_type as u32,
            device_index: row.device_index as u32,
            runtime_ms: row.runtime_ms as u64,
            hash_speed: row.hash_speed,
            recorded_at: super::parse_datetime(&row.recorded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::median;

    #[test]
    fn median_of_odd_sample_is_middle_value() {
        assert_eq!(median(vec![1.0, 2.0, 10.0]), Some(2.0));
    }

    #[test]
    fn median_of_even_sample_averages_the_middle_pair() {
        assert_eq!(median(vec![1.0, 2.0, 3.0, 10.0]), Some(2.5));
    }

    #[test]
    fn median_of_empty_sample_is_none() {
        assert_eq!(median(vec![]), None);
    }
}
