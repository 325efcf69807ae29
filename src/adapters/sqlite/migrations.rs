//! SQLite database migration management.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError { version: i64, #[source] source: sqlx::Error },
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub sql: String,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_embedded_migrations(&self, migrations: Vec<Migration>) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<_> = migrations.into_iter().filter(|m| m.version > current_version).collect();

        if pending.is_empty() {
            return Ok(0);
        }

        for migration in &pending {
            self.apply_migration(migration).await?;
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
        Ok(())
    }

    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let result: Option<(i64,)> =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_optional(&self.pool)
                .await
                .map_err(MigrationError::VersionCheckError)?;
        Ok(result.map_or(0, |(v,)| v))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        sqlx::raw_sql(&migration.sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;

        sqlx::query("INSERT OR IGNORE INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError { version: migration.version, source: e })?;

        Ok(())
    }
}

/// All embedded migrations, ordered by version.
pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "initial coordination schema".to_string(),
        sql: INITIAL_SCHEMA.to_string(),
    }]
}

const INITIAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    label TEXT,
    host_name TEXT NOT NULL,
    operating_system TEXT NOT NULL,
    client_signature TEXT NOT NULL,
    devices TEXT NOT NULL DEFAULT '[]',
    state TEXT NOT NULL,
    activity TEXT NOT NULL,
    config TEXT NOT NULL,
    token TEXT NOT NULL UNIQUE,
    last_seen_at TEXT,
    last_ip TEXT,
    assigned_task_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_agents_state ON agents(state);

CREATE TABLE IF NOT EXISTS benchmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    hash_type INTEGER NOT NULL,
    device_index INTEGER NOT NULL,
    runtime_ms INTEGER NOT NULL,
    hash_speed REAL NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_benchmarks_agent ON benchmarks(agent_id);
CREATE INDEX IF NOT EXISTS idx_benchmarks_hash_type ON benchmarks(hash_type);

CREATE TABLE IF NOT EXISTS agent_errors (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
    task_id TEXT,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    metadata TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agent_errors_agent ON agent_errors(agent_id, created_at);

CREATE TABLE IF NOT EXISTS hash_lists (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    hash_type INTEGER NOT NULL,
    item_count INTEGER NOT NULL DEFAULT 0,
    cracked_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hash_items (
    id TEXT PRIMARY KEY,
    hash_list_id TEXT NOT NULL REFERENCES hash_lists(id) ON DELETE CASCADE,
    hash_value TEXT NOT NULL,
    salt TEXT,
    cracked INTEGER NOT NULL DEFAULT 0,
    plaintext TEXT,
    cracked_at TEXT,
    cracked_by_task_id TEXT,
    UNIQUE (hash_list_id, hash_value)
);
CREATE INDEX IF NOT EXISTS idx_hash_items_list ON hash_items(hash_list_id, cracked);

CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    hash_list_id TEXT NOT NULL REFERENCES hash_lists(id),
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_campaigns_state ON campaigns(state);

CREATE TABLE IF NOT EXISTS attacks (
    id TEXT PRIMARY KEY,
    campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    mode TEXT NOT NULL,
    wordlists TEXT NOT NULL DEFAULT '[]',
    rule_list TEXT,
    masks TEXT NOT NULL DEFAULT '[]',
    custom_charsets TEXT NOT NULL DEFAULT '[]',
    min_length INTEGER,
    max_length INTEGER,
    increment INTEGER NOT NULL DEFAULT 0,
    workload_profile INTEGER NOT NULL DEFAULT 3,
    optimized INTEGER NOT NULL DEFAULT 1,
    total_keyspace INTEGER NOT NULL DEFAULT 0,
    complexity_score REAL NOT NULL DEFAULT 0,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (campaign_id, position)
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    attack_id TEXT NOT NULL REFERENCES attacks(id) ON DELETE CASCADE,
    keyspace_offset INTEGER NOT NULL,
    keyspace_length INTEGER NOT NULL,
    state TEXT NOT NULL,
    assigned_agent_id TEXT,
    assigned_at TEXT,
    accepted_at TEXT,
    last_status_at TEXT,
    progress_offset INTEGER NOT NULL DEFAULT 0,
    rejected_count INTEGER NOT NULL DEFAULT 0,
    device_speeds TEXT NOT NULL DEFAULT '[]',
    estimated_stop TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_tasks_attack ON tasks(attack_id, keyspace_offset);
CREATE INDEX IF NOT EXISTS idx_tasks_state ON tasks(state);
CREATE INDEX IF NOT EXISTS idx_tasks_agent ON tasks(assigned_agent_id);

CREATE TABLE IF NOT EXISTS cracks (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL,
    hash_item_id TEXT NOT NULL UNIQUE,
    plaintext TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS zap_entries (
    serial INTEGER PRIMARY KEY AUTOINCREMENT,
    attack_id TEXT NOT NULL,
    hash_value TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_zap_entries_attack ON zap_entries(attack_id, serial);

CREATE TABLE IF NOT EXISTS zap_cursors (
    agent_id TEXT NOT NULL,
    attack_id TEXT NOT NULL,
    last_serial INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (agent_id, attack_id)
);
"#;
