//! agentstore - persistence layer for AI agent runtimes
//!
//! Stores agents, entities, conversational memories with vector
//! embeddings, relationships, rooms/worlds, tasks, logs, and a generic
//! per-agent cache, behind one async adapter contract with two
//! interchangeable backends: embedded SQLite and pooled PostgreSQL
//! with pgvector.

pub mod embedding;
pub mod error;
pub mod schema;
pub mod storage;
pub mod types;

pub use error::{Result, StoreError};
pub use storage::{create_database_adapter, ConnectionRegistry, DatabaseAdapter};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
