//! Adapters: SQLite persistence and the HTTP surfaces.

pub mod http;
pub mod sqlite;
