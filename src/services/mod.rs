//! Service layer: the coordination core.

pub mod agent_registry;
pub mod crack_ingestor;
pub mod event_bus;
pub mod keyspace_planner;
pub mod progress_reconciler;
pub mod task_scheduler;
pub mod timekeeper;

pub use agent_registry::{AdminAgentPatch, AgentInfoPatch, AgentRegistry, BenchmarkEntry};
pub use crack_ingestor::{canonicalize_hash, CrackIngestor};
pub use event_bus::{ChangeEvent, EntityKind, EventBus};
pub use keyspace_planner::{KeyspacePlanner, Replan};
pub use progress_reconciler::ProgressReconciler;
pub use task_scheduler::TaskScheduler;
pub use timekeeper::{SweepStats, Timekeeper};
