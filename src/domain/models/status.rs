//! Status reports submitted by agents while working a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentState;

/// Per-device snapshot inside a status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusReport {
    pub device_index: u32,
    pub device_name: String,
    /// Hashes per second
    pub speed: f64,
    /// Utilization percentage, when the engine reports one
    pub utilization: Option<u8>,
    /// Degrees Celsius, when the engine reports one
    pub temperature: Option<i32>,
}

/// A progress report from the agent's cracking engine.
///
/// Timestamps come from the agent clock; the reconciler compares them
/// against the stored `last_status_at` for staleness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Agent-clock time the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Engine session label
    pub session: String,
    /// Raw engine status code
    pub status_code: i32,
    /// Candidates processed within the slice
    pub progress_processed: u64,
    /// Slice length as the agent sees it
    pub progress_total: u64,
    /// Engine restore point
    pub restore_point: u64,
    /// Hashes recovered so far in this session
    pub recovered_hashes: u64,
    /// Salts recovered so far in this session
    pub recovered_salts: u64,
    /// Candidates rejected by the engine
    pub rejected: u64,
    /// Agent-side completion estimate
    pub estimated_stop: Option<DateTime<Utc>>,
    /// Opaque hashcat guess block, stored verbatim
    pub guess: Option<serde_json::Value>,
    pub device_statuses: Vec<DeviceStatusReport>,
}

impl StatusReport {
    /// Aggregate speed across all reported devices.
    pub fn total_speed(&self) -> f64 {
        self.device_statuses.iter().map(|d| d.speed).sum()
    }
}

/// Server feedback on a heartbeat: a state the agent should act on.
///
/// `pending` forces a re-benchmark, `stopped` asks the agent to shut
/// down, `error` tells it the server took it out of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatFeedback {
    pub state: AgentState,
}
