//! Server configuration model.
//!
//! Loaded by the figment-based loader in `infrastructure::config` from
//! defaults, a YAML file, and `CIPHERSWARM_`-prefixed environment
//! variables.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

/// SQLite connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url(), max_connections: default_max_connections() }
    }
}

/// Tunables for the planner, scheduler, reconciler, and timekeeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Lower bound on expected slice runtime
    #[serde(default = "default_min_slice_seconds")]
    pub min_slice_seconds: u64,
    /// Upper bound on expected slice runtime
    #[serde(default = "default_max_slice_seconds")]
    pub max_slice_seconds: u64,
    /// Slice runtime the planner aims for
    #[serde(default = "default_target_slice_seconds")]
    pub target_slice_seconds: u64,
    /// Planning speed (hashes/s) when no benchmarks exist for a hash type
    #[serde(default = "default_fallback_hash_speed")]
    pub fallback_hash_speed: f64,
    /// Seconds an assigned task may sit unaccepted before requeue
    #[serde(default = "default_accept_timeout_seconds")]
    pub accept_timeout_seconds: u64,
    /// Reports older than this relative to the stored state are dropped
    #[serde(default = "default_stale_window_seconds")]
    pub stale_window_seconds: u64,
    /// Minimum seconds between heartbeats per agent
    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,
    /// Timekeeper sweep cadence
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// Bounded retries on optimistic-version collisions
    #[serde(default = "default_assign_retry_limit")]
    pub assign_retry_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_slice_seconds: default_min_slice_seconds(),
            max_slice_seconds: default_max_slice_seconds(),
            target_slice_seconds: default_target_slice_seconds(),
            fallback_hash_speed: default_fallback_hash_speed(),
            accept_timeout_seconds: default_accept_timeout_seconds(),
            stale_window_seconds: default_stale_window_seconds(),
            heartbeat_interval_seconds: default_heartbeat_interval_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            assign_retry_limit: default_assign_retry_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite:cipherswarm.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_slice_seconds() -> u64 {
    60
}

fn default_max_slice_seconds() -> u64 {
    900
}

fn default_target_slice_seconds() -> u64 {
    300
}

fn default_fallback_hash_speed() -> f64 {
    1_000_000.0
}

fn default_accept_timeout_seconds() -> u64 {
    120
}

fn default_stale_window_seconds() -> u64 {
    10
}

fn default_heartbeat_interval_seconds() -> u64 {
    15
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

fn default_assign_retry_limit() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}
