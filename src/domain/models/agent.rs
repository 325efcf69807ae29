//! Agent domain model.
//!
//! Agents are worker processes that run an external cracking engine,
//! poll the server for task slices, and report progress and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Registered but has not submitted benchmarks yet
    Pending,
    /// Benchmarked and eligible for work
    Active,
    /// Stopped by an administrator
    Stopped,
    /// A fatal error report took the agent out of rotation
    Error,
    /// Missed heartbeats past the liveness threshold
    Offline,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Pending
    }
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    /// Whether the agent may request and hold tasks in this state.
    pub fn can_hold_work(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> &'static [AgentState] {
        match self {
            Self::Pending => &[Self::Active, Self::Stopped, Self::Error, Self::Offline],
            Self::Active => &[Self::Stopped, Self::Error, Self::Offline],
            // A returning heartbeat or fresh benchmark set brings the agent back
            Self::Offline => &[Self::Pending, Self::Active, Self::Stopped, Self::Error],
            Self::Stopped => &[Self::Pending, Self::Active],
            Self::Error => &[Self::Pending],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// What the agent reported it is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentActivity {
    Starting,
    Benchmarking,
    Updating,
    Downloading,
    Waiting,
    Cracking,
    Stopping,
}

impl Default for AgentActivity {
    fn default() -> Self {
        Self::Starting
    }
}

impl AgentActivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Benchmarking => "benchmarking",
            Self::Updating => "updating",
            Self::Downloading => "downloading",
            Self::Waiting => "waiting",
            Self::Cracking => "cracking",
            Self::Stopping => "stopping",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "starting" => Some(Self::Starting),
            "benchmarking" => Some(Self::Benchmarking),
            "updating" => Some(Self::Updating),
            "downloading" => Some(Self::Downloading),
            "waiting" => Some(Self::Waiting),
            "cracking" => Some(Self::Cracking),
            "stopping" => Some(Self::Stopping),
            _ => None,
        }
    }
}

/// Agent-tunable runtime configuration.
///
/// These fields are pushed to the agent on `GET /configuration` and control
/// how it drives its local cracking engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Seconds between status updates; the liveness threshold derives from it
    pub update_interval: u32,
    /// Use the agent host's native hashcat binary instead of the bundled one
    pub use_native_hashcat: bool,
    /// Backend device selection mask passed through to the engine
    pub backend_devices: Option<String>,
    /// OpenCL device selection mask passed through to the engine
    pub opencl_devices: Option<String>,
    /// Opt in to attacks whose hash type the agent has not benchmarked
    pub enable_additional_hash_types: bool,
    /// Per-device enable bits, positionally matching `Agent::devices`
    pub enabled_devices: Vec<bool>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            update_interval: 30,
            use_native_hashcat: false,
            backend_devices: None,
            opencl_devices: None,
            enable_additional_hash_types: false,
            enabled_devices: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Update interval with the protocol floor of one second applied.
    pub fn effective_update_interval(&self) -> u32 {
        self.update_interval.max(1)
    }
}

/// A measured (device, hash type) cracking speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub hash_type: u32,
    pub device_index: u32,
    /// Benchmark runtime in milliseconds
    pub runtime_ms: u64,
    /// Hashes per second
    pub hash_speed: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A worker process registered with the coordination server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier
    pub id: Uuid,
    /// Operator-assigned display label
    pub label: Option<String>,
    /// Host the agent runs on
    pub host_name: String,
    /// Operating system reported at registration
    pub operating_system: String,
    /// Client version signature reported at registration
    pub client_signature: String,
    /// Ordered device descriptors advertised by the agent
    pub devices: Vec<String>,
    /// Lifecycle state
    pub state: AgentState,
    /// Last reported activity
    pub activity: AgentActivity,
    /// Runtime configuration pushed to the agent
    pub config: AgentConfig,
    /// Bearer token (`csa_<agent_id>_<secret>`), opaque to the core
    pub token: String,
    /// When the agent last checked in
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Source address of the last check-in
    pub last_ip: Option<String>,
    /// The at-most-one task currently held by this agent
    pub assigned_task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Version for optimistic locking; incremented by the repository
    pub version: u64,
}

impl Agent {
    /// Register a new agent. New agents start `pending` until they submit
    /// a benchmark set.
    pub fn register(
        client_signature: impl Into<String>,
        host_name: impl Into<String>,
        operating_system: impl Into<String>,
        devices: Vec<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let enabled_devices = vec![true; devices.len()];
        Self {
            id,
            label: None,
            host_name: host_name.into(),
            operating_system: operating_system.into(),
            client_signature: client_signature.into(),
            devices,
            state: AgentState::Pending,
            activity: AgentActivity::Starting,
            config: AgentConfig { enabled_devices, ..AgentConfig::default() },
            token: generate_token(id),
            last_seen_at: None,
            last_ip: None,
            assigned_task_id: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Liveness threshold in seconds: `max(3 × update_interval, 90)`.
    pub fn heartbeat_timeout_secs(&self) -> u64 {
        u64::from(self.config.effective_update_interval()).saturating_mul(3).max(90)
    }

    /// Status staleness threshold in seconds: `max(3 × update_interval, 180)`.
    pub fn status_timeout_secs(&self) -> u64 {
        u64::from(self.config.effective_update_interval()).saturating_mul(3).max(180)
    }

    pub fn can_transition_to(&self, new_state: AgentState) -> bool {
        self.state.can_transition_to(new_state)
    }

    /// Transition to a new lifecycle state.
    pub fn transition_to(&mut self, new_state: AgentState) -> Result<(), String> {
        if !self.can_transition_to(new_state) {
            return Err(format!(
                "cannot transition agent from {} to {}",
                self.state.as_str(),
                new_state.as_str()
            ));
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Mint a bearer token for a freshly registered agent.
///
/// The `csa_` prefix and embedded agent id are load-bearing for wire
/// compatibility; the trailing secret is opaque.
fn generate_token(agent_id: Uuid) -> String {
    format!("csa_{}_{}", agent_id, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_agents_start_pending_with_a_prefixed_token() {
        let agent = Agent::register("sig/1.0", "rig-01", "linux", vec!["GPU0".into()]);
        assert_eq!(agent.state, AgentState::Pending);
        assert!(agent.token.starts_with(&format!("csa_{}_", agent.id)));
        assert_eq!(agent.config.enabled_devices, vec![true]);
    }

    #[test]
    fn heartbeat_timeout_has_a_floor_of_ninety_seconds() {
        let mut agent = Agent::register("sig", "host", "linux", vec![]);
        agent.config.update_interval = 5;
        assert_eq!(agent.heartbeat_timeout_secs(), 90);
        agent.config.update_interval = 60;
        assert_eq!(agent.heartbeat_timeout_secs(), 180);
    }

    #[test]
    fn active_agent_cannot_return_to_pending_directly() {
        let mut agent = Agent::register("sig", "host", "linux", vec![]);
        agent.state = AgentState::Active;
        assert!(!agent.can_transition_to(AgentState::Pending));
        assert!(agent.can_transition_to(AgentState::Offline));
    }
}
