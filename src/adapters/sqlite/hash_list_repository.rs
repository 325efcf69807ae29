//! SQLite implementation of the HashListRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{HashItem, HashList};
use crate::domain::ports::HashListRepository;

#[derive(Clone)]
pub struct SqliteHashListRepository {
    pool: SqlitePool,
}

impl SqliteHashListRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HashListRepository for SqliteHashListRepository {
    async fn create(&self, list: &HashList) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO hash_lists (id, project_id, name, hash_type, item_count,
               cracked_count, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(list.id.to_string())
        .bind(list.project_id.to_string())
        .bind(&list.name)
        .bind(i64::from(list.hash_type))
        .bind(list.item_count as i64)
        .bind(list.cracked_count as i64)
        .bind(list.created_at.to_rfc3339())
        .bind(list.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<HashList>> {
        let row: Option<HashListRow> = sqlx::query_as("SELECT * FROM hash_lists WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(HashList::try_from).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<HashList>> {
        let rows: Vec<HashListRow> = sqlx::query_as("SELECT * FROM hash_lists ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(HashList::try_from).collect()
    }

    async fn add_items(&self, list_id: Uuid, items: &[HashItem]) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut added: u64 = 0;

        for item in items {
            let result = sqlx::query(
                r#"INSERT OR IGNORE INTO hash_items (id, hash_list_id, hash_value, salt,
                   cracked, plaintext, cracked_at, cracked_by_task_id)
                   VALUES (?, ?, ?, ?, 0, NULL, NULL, NULL)"#,
            )
            .bind(item.id.to_string())
            .bind(list_id.to_string())
            .bind(&item.hash_value)
            .bind(&item.salt)
            .execute(&mut *tx)
            .await?;
            added += result.rows_affected();
        }

        if added > 0 {
            sqlx::query(
                "UPDATE hash_lists SET item_count = item_count + ?, updated_at = ? WHERE id = ?",
            )
            .bind(added as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(list_id.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(added)
    }

    async fn get_item(&self, id: Uuid) -> DomainResult<Option<HashItem>> {
        let row: Option<HashItemRow> = sqlx::query_as("SELECT * FROM hash_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(HashItem::try_from).transpose()
    }

    async fn find_item_by_hash(&self, list_id: Uuid, hash_value: &str) -> DomainResult<Option<HashItem>> {
        let row: Option<HashItemRow> =
            sqlx::query_as("SELECT * FROM hash_items WHERE hash_list_id = ? AND hash_value = ?")
                .bind(list_id.to_string())
                .bind(hash_value)
                .fetch_optional(&self.pool)
                .await?;

        row.map(HashItem::try_from).transpose()
    }

    async fn list_items(&self, list_id: Uuid, cracked: Option<bool>) -> DomainResult<Vec<HashItem>> {
        let rows: Vec<HashItemRow> = match cracked {
            Some(cracked) => {
                sqlx::query_as(
                    "SELECT * FROM hash_items WHERE hash_list_id = ? AND cracked = ? ORDER BY hash_value",
                )
                .bind(list_id.to_string())
                .bind(cracked)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM hash_items WHERE hash_list_id = ? ORDER BY hash_value")
                    .bind(list_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(HashItem::try_from).collect()
    }

    async fn uncracked_values(&self, list_id: Uuid) -> DomainResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT hash_value FROM hash_items WHERE hash_list_id = ? AND cracked = 0 ORDER BY hash_value",
        )
        .bind(list_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(v,)| v).collect())
    }
}

#[derive(sqlx::FromRow)]
struct HashListRow {
    id: String,
    project_id: String,
    name: String,
    hash_type: i64,
    item_count: i64,
    cracked_count: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<HashListRow> for HashList {
    type Error = DomainError;

    fn try_from(row: HashListRow) -> Result<Self, Self::Error> {
        Ok(HashList {
            id: super::parse_uuid(&row.id)?,
            project_id: super::parse_uuid(&row.project_id)?,
            name: row.name,
            hash_type: row.hash_type as u32,
            item_count: row.item_count as u64,
            cracked_count: row.cracked_count as u64,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HashItemRow {
    id: String,
    hash_list_id: String,
    hash_value: String,
    salt: Option<String>,
    cracked: bool,
    plaintext: Option<String>,
    cracked_at: Option<String>,
    cracked_by_task_id: Option<String>,
}

impl TryFrom<HashItemRow> for HashItem {
    type Error = DomainError;

    fn try_from(row: HashItemRow) -> Result<Self, Self::Error> {
        Ok(HashItem {
            id: super::parse_uuid(&row.id)?,
            hash_list_id: super::parse_uuid(&row.hash_list_id)?,
            hash_value: row.hash_value,
            salt: row.salt,
            cracked: row.cracked,
            plaintext: row.plaintext,
            cracked_at: super::parse_optional_datetime(row.cracked_at)?,
            cracked_by_task_id: super::parse_optional_uuid(row.cracked_by_task_id)?,
        })
    }
}
