//! SQLite implementation of the AttackRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Attack, AttackMode, AttackState};
use crate::domain::ports::AttackRepository;

#[derive(Clone)]
pub struct SqliteAttackRepository {
    pool: SqlitePool,
}

impl SqliteAttackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttackRepository for SqliteAttackRepository {
    async fn create(&self, attack: &Attack) -> DomainResult<()> {
        let wordlists_json = serde_json::to_string(&attack.wordlists)?;
        let masks_json = serde_json::to_string(&attack.masks)?;
        let charsets_json = serde_json::to_string(&attack.custom_charsets)?;

        sqlx::query(
            r#"INSERT INTO attacks (id, campaign_id, position, mode, wordlists, rule_list,
               masks, custom_charsets, min_length, max_length, increment, workload_profile,
               optimized, total_keyspace, complexity_score, state, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(attack.id.to_string())
        .bind(attack.campaign_id.to_string())
        .bind(i64::from(attack.position))
        .bind(attack.mode.as_str())
        .bind(&wordlists_json)
        .bind(&attack.rule_list)
        .bind(&masks_json)
        .bind(&charsets_json)
        .bind(attack.min_length.map(i64::from))
        .bind(attack.max_length.map(i64::from))
        .bind(attack.increment)
        .bind(i64::from(attack.workload_profile))
        .bind(attack.optimized)
        .bind(attack.total_keyspace as i64)
        .bind(attack.complexity_score)
        .bind(attack.state.as_str())
        .bind(attack.created_at.to_rfc3339())
        .bind(attack.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Attack>> {
        let row: Option<AttackRow> = sqlx::query_as("SELECT * FROM attacks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Attack::try_from).transpose()
    }

    async fn update(&self, attack: &Attack) -> DomainResult<()> {
        let wordlists_json = serde_json::to_string(&attack.wordlists)?;
        let masks_json = serde_json::to_string(&attack.masks)?;
        let charsets_json = serde_json::to_string(&attack.custom_charsets)?;

        let result = sqlx::query(
            r#"UPDATE attacks SET position = ?, mode = ?, wordlists = ?, rule_list = ?,
               masks = ?, custom_charsets = ?, min_length = ?, max_length = ?, increment = ?,
               workload_profile = ?, optimized = ?, total_keyspace = ?, complexity_score = ?,
               state = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(i64::from(attack.position))
        .bind(attack.mode.as_str())
        .bind(&wordlists_json)
        .bind(&attack.rule_list)
        .bind(&masks_json)
        .bind(&charsets_json)
        .bind(attack.min_length.map(i64::from))
        .bind(attack.max_length.map(i64::from))
        .bind(attack.increment)
        .bind(i64::from(attack.workload_profile))
        .bind(attack.optimized)
        .bind(attack.total_keyspace as i64)
        .bind(attack.complexity_score)
        .bind(attack.state.as_str())
        .bind(attack.updated_at.to_rfc3339())
        .bind(attack.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("attack", attack.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM attacks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("attack", id));
        }

        Ok(())
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Attack>> {
        let rows: Vec<AttackRow> =
            sqlx::query_as("SELECT * FROM attacks WHERE campaign_id = ? ORDER BY position")
                .bind(campaign_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Attack::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AttackRow {
    id: String,
    campaign_id: String,
    position: i64,
    mode: String,
    wordlists: Option<String>,
    rule_list: Option<String>,
    masks: Option<String>,
    custom_charsets: Option<String>,
    min_length: Option<i64>,
    max_length: Option<i64>,
    increment: bool,
    workload_profile: i64,
    optimized: bool,
    total_keyspace: i64,
    complexity_score: f64,
    state: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AttackRow> for Attack {
    type Error = DomainError;

    fn try_from(row: AttackRow) -> Result<Self, Self::Error> {
        let mode = AttackMode::parse_str(&row.mode)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid attack mode: {}", row.mode)))?;
        let state = AttackState::parse_str(&row.state)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid attack state: {}", row.state)))?;

        Ok(Attack {
            id: super::parse_uuid(&row.id)?,
            campaign_id: super::parse_uuid(&row.campaign_id)?,
            position: row.position as u32,
            mode,
            wordlists: super::parse_json_or_default(row.wordlists)?,
            rule_list: row.rule_list,
            masks: super::parse_json_or_default(row.masks)?,
            custom_charsets: super::parse_json_or_default(row.custom_charsets)?,
            min_length: row.min_length.map(|v| v as u32),
            max_length: row.max_length.map(|v| v as u32),
            increment: row.increment,
            workload_profile: row.workload_profile as u8,
            optimized: row.optimized,
            total_keyspace: row.total_keyspace as u64,
            complexity_score: row.complexity_score,
            state,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}
