//! Storage engine for agentstore
//!
//! Connection management, migrations, and the adapter implementations
//! for the embedded and networked backends.

pub mod adapter;
pub mod circuit;
pub mod connection;
pub mod migrations;
pub mod postgres;
pub mod postgres_backend;
pub mod queries;
pub mod sqlite_backend;

pub use adapter::{create_database_adapter, DatabaseAdapter, MEMORY_DELETE_BATCH_SIZE};
pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use connection::{ConnectionRegistry, EmbeddedManager, RetryConfig};
pub use migrations::{MigrationService, MigrationTarget};
pub use postgres::PostgresManager;
pub use postgres_backend::PostgresAdapter;
pub use sqlite_backend::SqliteAdapter;
