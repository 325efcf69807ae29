//! SQLite implementation of the CrackRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Crack;
use crate::domain::ports::CrackRepository;

#[derive(Clone)]
pub struct SqliteCrackRepository {
    pool: SqlitePool,
}

impl SqliteCrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CrackRepository for SqliteCrackRepository {
    async fn record(
        &self,
        hash_item_id: Uuid,
        task_id: Uuid,
        attack_id: Uuid,
        plaintext: &str,
        cracked_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        // First writer wins: the cracked = 0 guard serialises concurrent
        // submissions for the same item.
        let claimed = sqlx::query(
            r#"UPDATE hash_items SET cracked = 1, plaintext = ?, cracked_at = ?,
               cracked_by_task_id = ?
               WHERE id = ? AND cracked = 0"#,
        )
        .bind(plaintext)
        .bind(cracked_at.to_rfc3339())
        .bind(task_id.to_string())
        .bind(hash_item_id.to_string())
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO cracks (id, task_id, hash_item_id, plaintext, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(task_id.to_string())
        .bind(hash_item_id.to_string())
        .bind(plaintext)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE hash_lists SET cracked_count = cracked_count + 1, updated_at = ?
               WHERE id = (SELECT hash_list_id FROM hash_items WHERE id = ?)"#,
        )
        .bind(&now)
        .bind(hash_item_id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO zap_entries (attack_id, hash_value, created_at)
               VALUES (?, (SELECT hash_value FROM hash_items WHERE id = ?), ?)"#,
        )
        .bind(attack_id.to_string())
        .bind(hash_item_id.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_task(&self, task_id: Uuid) -> DomainResult<Vec<Crack>> {
        let rows: Vec<CrackRow> =
            sqlx::query_as("SELECT * FROM cracks WHERE task_id = ? ORDER BY created_at")
                .bind(task_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Crack::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct CrackRow {
    id: String,
    task_id: String,
    hash_item_id: String,
    plaintext: String,
    created_at: String,
}

impl TryFrom<CrackRow> for Crack {
    type Error = DomainError;

    fn try_from(row: CrackRow) -> Result<Self, Self::Error> {
        Ok(Crack {
            id: super::parse_uuid(&row.id)?,
            task_id: super::parse_uuid(&row.task_id)?,
            hash_item_id: super::parse_uuid(&row.hash_item_id)?,
            plaintext: row.plaintext,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
