//! SQLite implementation of the ZapRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::ports::ZapRepository;

#[derive(Clone)]
pub struct SqliteZapRepository {
    pool: SqlitePool,
}

impl SqliteZapRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ZapRepository for SqliteZapRepository {
    async fn drain(&self, agent_id: Uuid, attack_id: Uuid) -> DomainResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let cursor: Option<(i64,)> = sqlx::query_as(
            "SELECT last_serial FROM zap_cursors WHERE agent_id = ? AND attack_id = ?",
        )
        .bind(agent_id.to_string())
        .bind(attack_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        let last_serial = cursor.map_or(0, |(s,)| s);

        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"SELECT serial, hash_value FROM zap_entries
               WHERE attack_id = ? AND serial > ?
               ORDER BY serial"#,
        )
        .bind(attack_id.to_string())
        .bind(last_serial)
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let max_serial = rows.last().map_or(last_serial, |(s, _)| *s);
        sqlx::query(
            r#"INSERT INTO zap_cursors (agent_id, attack_id, last_serial) VALUES (?, ?, ?)
               ON CONFLICT (agent_id, attack_id)
               DO UPDATE SET last_serial = excluded.last_serial"#,
        )
        .bind(agent_id.to_string())
        .bind(attack_id.to_string())
        .bind(max_serial)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows.into_iter().map(|(_, v)| v).collect())
    }
}
