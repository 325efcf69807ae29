//! SQLite implementation of the CampaignRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Campaign, CampaignState};
use crate::domain::ports::CampaignRepository;

#[derive(Clone)]
pub struct SqliteCampaignRepository {
    pool: SqlitePool,
}

impl SqliteCampaignRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for SqliteCampaignRepository {
    async fn create(&self, campaign: &Campaign) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO campaigns (id, project_id, name, description, priority,
               hash_list_id, state, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(campaign.id.to_string())
        .bind(campaign.project_id.to_string())
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.priority)
        .bind(campaign.hash_list_id.to_string())
        .bind(campaign.state.as_str())
        .bind(campaign.created_at.to_rfc3339())
        .bind(campaign.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Campaign>> {
        let row: Option<CampaignRow> = sqlx::query_as("SELECT * FROM campaigns WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Campaign::try_from).transpose()
    }

    async fn update(&self, campaign: &Campaign) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE campaigns SET name = ?, description = ?, priority = ?, state = ?,
               updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.priority)
        .bind(campaign.state.as_str())
        .bind(campaign.updated_at.to_rfc3339())
        .bind(campaign.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("campaign", campaign.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("campaign", id));
        }

        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Campaign>> {
        let rows: Vec<CampaignRow> =
            sqlx::query_as("SELECT * FROM campaigns ORDER BY priority DESC, created_at")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn list_by_state(&self, state: CampaignState) -> DomainResult<Vec<Campaign>> {
        let rows: Vec<CampaignRow> = sqlx::query_as(
            "SELECT * FROM campaigns WHERE state = ? ORDER BY priority DESC, created_at",
        )
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: String,
    project_id: String,
    name: String,
    description: Option<String>,
    priority: i32,
    hash_list_id: String,
    state: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DomainError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let state = CampaignState::parse_str(&row.state).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid campaign state: {}", row.state))
        })?;

        Ok(Campaign {
            id: super::parse_uuid(&row.id)?,
            project_id: super::parse_uuid(&row.project_id)?,
            name: row.name,
            description: row.description,
            priority: row.priority,
            hash_list_id: super::parse_uuid(&row.hash_list_id)?,
            state,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}
