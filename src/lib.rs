//! CipherSwarm — distributed password-cracking coordination server.
//!
//! A fleet of worker agents registers here, receives keyspace slices,
//! reports progress, and submits recovered plaintexts. The server owns
//! the global plan: campaigns of ordered attacks over hash lists,
//! partitioned into tasks sized to agent benchmarks, with liveness
//! tracking, crack deduplication, and zap-list propagation.
//!
//! Layout:
//! - `domain`: models, repository ports, error taxonomy
//! - `adapters`: SQLite persistence and the three HTTP surfaces
//! - `services`: planner, registry, scheduler, reconciler, ingestor,
//!   event bus, timekeeper
//! - `infrastructure`: config and logging bootstrap

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;
