//! Agent registry.
//!
//! Tracks agent identity, capabilities, benchmarks, liveness, and
//! lifecycle state. Every operation here is called with an already
//! authenticated agent id except `register` and `authenticate` itself;
//! token mechanics beyond the `csa_` prefix are opaque.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Agent, AgentActivity, AgentError, AgentState, Benchmark, ErrorSeverity, HeartbeatFeedback,
    SchedulerConfig, TaskState,
};
use crate::domain::ports::{AgentErrorRepository, AgentRepository};
use crate::services::event_bus::{EntityKind, EventBus};
use crate::services::task_scheduler::TaskScheduler;

/// Fields an agent may patch about itself. State and token are
/// deliberately absent; those belong to the server and administrators.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentInfoPatch {
    pub host_name: Option<String>,
    pub operating_system: Option<String>,
    pub client_signature: Option<String>,
    pub devices: Option<Vec<String>>,
}

/// Fields an administrator may patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminAgentPatch {
    pub label: Option<String>,
    pub update_interval: Option<u32>,
    pub use_native_hashcat: Option<bool>,
    pub backend_devices: Option<String>,
    pub opencl_devices: Option<String>,
    pub enable_additional_hash_types: Option<bool>,
    pub enabled_devices: Option<Vec<bool>>,
    /// Only `stopped` (take out of rotation) and `active` (re-enable)
    /// are admin-settable.
    pub state: Option<AgentState>,
}

/// One measured (device, hash type) speed as submitted by an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkEntry {
    pub hash_type: u32,
    pub device: u32,
    pub runtime_ms: u64,
    pub hash_speed: f64,
}

type HeartbeatLimiter = RateLimiter<Uuid, DefaultKeyedStateStore<Uuid>, DefaultClock>;

/// Agent lifecycle and capability tracking.
pub struct AgentRegistry {
    agents: Arc<dyn AgentRepository>,
    agent_errors: Arc<dyn AgentErrorRepository>,
    scheduler: Arc<TaskScheduler>,
    events: Arc<EventBus>,
    heartbeat_limiter: HeartbeatLimiter,
}

impl AgentRegistry {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        agent_errors: Arc<dyn AgentErrorRepository>,
        scheduler: Arc<TaskScheduler>,
        events: Arc<EventBus>,
        config: &SchedulerConfig,
    ) -> Self {
        let period = Duration::from_secs(config.heartbeat_interval_seconds.max(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
        Self {
            agents,
            agent_errors,
            scheduler,
            events,
            heartbeat_limiter: RateLimiter::keyed(quota),
        }
    }

    /// Register a new agent. Returns the agent including its freshly
    /// minted bearer token; the token is only shown once.
    #[instrument(skip(self, devices))]
    pub async fn register(
        &self,
        client_signature: impl Into<String> + std::fmt::Debug,
        host_name: impl Into<String> + std::fmt::Debug,
        operating_system: impl Into<String> + std::fmt::Debug,
        devices: Vec<String>,
    ) -> DomainResult<Agent> {
        let agent = Agent::register(client_signature, host_name, operating_system, devices);
        self.agents.create(&agent).await?;
        info!(agent_id = %agent.id, host = %agent.host_name, "agent registered");
        self.events.emit(EntityKind::Agent, agent.id);
        Ok(agent)
    }

    /// Resolve a bearer token to its agent.
    pub async fn authenticate(&self, token: &str) -> DomainResult<Agent> {
        if !token.starts_with("csa_") {
            return Err(DomainError::Unauthorized("malformed agent token".to_string()));
        }
        self.agents
            .get_by_token(token)
            .await?
            .ok_or_else(|| DomainError::Unauthorized("unknown agent token".to_string()))
    }

    /// Get an agent by id.
    pub async fn get(&self, agent_id: Uuid) -> DomainResult<Agent> {
        self.agents
            .get(agent_id)
            .await?
            .ok_or_else(|| DomainError::not_found("agent", agent_id))
    }

    /// List all agents.
    pub async fn list(&self) -> DomainResult<Vec<Agent>> {
        self.agents.list().await
    }

    /// Recent error reports for an agent, newest first.
    pub async fn errors(&self, agent_id: Uuid, limit: u32) -> DomainResult<Vec<AgentError>> {
        self.agent_errors.list_by_agent(agent_id, limit).await
    }

    /// Apply an agent-writable patch.
    pub async fn update_from_agent(&self, agent_id: Uuid, patch: AgentInfoPatch) -> DomainResult<Agent> {
        let mut agent = self.get(agent_id).await?;

        if let Some(host_name) = patch.host_name {
            agent.host_name = host_name;
        }
        if let Some(operating_system) = patch.operating_system {
            agent.operating_system = operating_system;
        }
        if let Some(client_signature) = patch.client_signature {
            agent.client_signature = client_signature;
        }
        if let Some(devices) = patch.devices {
            agent.config.enabled_devices = vec![true; devices.len()];
            agent.devices = devices;
        }

        self.agents.update(&agent).await?;
        self.events.emit(EntityKind::Agent, agent_id);
        self.get(agent_id).await
    }

    /// Apply an admin patch, including stop/re-enable.
    pub async fn update_from_admin(&self, agent_id: Uuid, patch: AdminAgentPatch) -> DomainResult<Agent> {
        let mut agent = self.get(agent_id).await?;

        if let Some(state) = patch.state {
            if !matches!(state, AgentState::Stopped | AgentState::Active) {
                return Err(DomainError::Malformed(format!(
                    "agents cannot be set to {} by an administrator",
                    state.as_str()
                )));
            }
            if state == AgentState::Stopped {
                // Stopping releases any held task back into the queue.
                self.scheduler.release_task_of(&agent, TaskState::Pending).await?;
                agent = self.get(agent_id).await?;
            }
            if agent.state != state {
                agent.transition_to(state).map_err(DomainError::Conflict)?;
            }
        }

        if let Some(label) = patch.label {
            agent.label = Some(label);
        }
        if let Some(update_interval) = patch.update_interval {
            if update_interval == 0 {
                return Err(DomainError::Malformed("update_interval must be at least 1".to_string()));
            }
            agent.config.update_interval = update_interval;
        }
        if let Some(use_native_hashcat) = patch.use_native_hashcat {
            agent.config.use_native_hashcat = use_native_hashcat;
        }
        if let Some(backend_devices) = patch.backend_devices {
            agent.config.backend_devices = Some(backend_devices);
        }
        if let Some(opencl_devices) = patch.opencl_devices {
            agent.config.opencl_devices = Some(opencl_devices);
        }
        if let Some(enable_additional_hash_types) = patch.enable_additional_hash_types {
            agent.config.enable_additional_hash_types = enable_additional_hash_types;
        }
        if let Some(enabled_devices) = patch.enabled_devices {
            agent.config.enabled_devices = enabled_devices;
        }

        self.agents.update(&agent).await?;
        self.events.emit(EntityKind::Agent, agent_id);
        self.get(agent_id).await
    }

    /// Atomically replace the agent's benchmark set. The first successful
    /// submission of a pending agent activates it.
    #[instrument(skip(self, entries), fields(agent_id = %agent_id))]
    pub async fn submit_benchmark(&self, agent_id: Uuid, entries: Vec<BenchmarkEntry>) -> DomainResult<()> {
        if entries.is_empty() {
            return Err(DomainError::Malformed("benchmark set may not be empty".to_string()));
        }

        let mut agent = self.get(agent_id).await?;
        let now = Utc::now();
        let benchmarks: Vec<Benchmark> = entries
            .into_iter()
            .map(|e| Benchmark {
                hash_type: e.hash_type,
                device_index: e.device,
                runtime_ms: e.runtime_ms,
                hash_speed: e.hash_speed,
                recorded_at: now,
            })
            .collect();

        self.agents.replace_benchmarks(agent_id, &benchmarks).await?;

        if agent.state == AgentState::Pending {
            agent.transition_to(AgentState::Active).map_err(DomainError::Conflict)?;
            self.agents.update(&agent).await?;
            info!(agent_id = %agent_id, "agent activated after first benchmark");
        }

        self.events.emit(EntityKind::Agent, agent_id);
        Ok(())
    }

    /// Record a check-in. Throttled to one per configured interval per
    /// agent; throttled calls change nothing and fail `TooManyRequests`.
    /// The returned feedback, when present, is a state the agent must act
    /// on (re-benchmark, shut down, or stand down).
    pub async fn heartbeat(
        &self,
        agent_id: Uuid,
        activity: Option<AgentActivity>,
        ip: Option<String>,
    ) -> DomainResult<Option<HeartbeatFeedback>> {
        if self.heartbeat_limiter.check_key(&agent_id).is_err() {
            return Err(DomainError::TooManyRequests);
        }

        let mut agent = self.get(agent_id).await?;
        agent.last_seen_at = Some(Utc::now());
        if let Some(activity) = activity {
            agent.activity = activity;
        }
        if ip.is_some() {
            agent.last_ip = ip;
        }

        // A returning offline agent re-benchmarks before getting work.
        if agent.state == AgentState::Offline {
            agent.transition_to(AgentState::Pending).map_err(DomainError::Conflict)?;
        }

        let feedback = match agent.state {
            AgentState::Pending => Some(HeartbeatFeedback { state: AgentState::Pending }),
            AgentState::Stopped => Some(HeartbeatFeedback { state: AgentState::Stopped }),
            AgentState::Error => Some(HeartbeatFeedback { state: AgentState::Error }),
            AgentState::Active | AgentState::Offline => None,
        };

        self.agents.update(&agent).await?;
        Ok(feedback)
    }

    /// Persist an error report. Fatal severity takes the agent out of
    /// rotation and releases its held task.
    #[instrument(skip(self, message, metadata), fields(agent_id = %agent_id, severity = severity.as_str()))]
    pub async fn submit_error(
        &self,
        agent_id: Uuid,
        severity: ErrorSeverity,
        task_id: Option<Uuid>,
        message: String,
        metadata: serde_json::Value,
    ) -> DomainResult<()> {
        let agent = self.get(agent_id).await?;

        let mut report = AgentError::new(agent_id, severity, message).with_metadata(metadata);
        if let Some(task_id) = task_id {
            report = report.with_task(task_id);
        }
        self.agent_errors.create(&report).await?;

        if severity == ErrorSeverity::Fatal {
            warn!(agent_id = %agent_id, "fatal agent error; removing agent from rotation");
            self.scheduler.release_task_of(&agent, TaskState::Pending).await?;
            let mut agent = self.get(agent_id).await?;
            if agent.state != AgentState::Error {
                agent.transition_to(AgentState::Error).map_err(DomainError::Conflict)?;
                self.agents.update(&agent).await?;
            }
        }

        self.events.emit(EntityKind::Agent, agent_id);
        Ok(())
    }

    /// The agent announced a clean shutdown: release its task and mark it
    /// offline.
    #[instrument(skip(self), fields(agent_id = %agent_id))]
    pub async fn shutdown(&self, agent_id: Uuid) -> DomainResult<()> {
        let agent = self.get(agent_id).await?;
        if agent.state == AgentState::Offline {
            return Ok(());
        }

        self.scheduler.release_task_of(&agent, TaskState::Pending).await?;
        let mut agent = self.get(agent_id).await?;
        agent.transition_to(AgentState::Offline).map_err(DomainError::Conflict)?;
        self.agents.update(&agent).await?;

        info!(agent_id = %agent_id, "agent shut down");
        self.events.emit(EntityKind::Agent, agent_id);
        Ok(())
    }
}
