//! Error types for agentstore

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for agentstore operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main error type for agentstore
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database not initialized")]
    NotInitialized,

    #[error("circuit breaker open for {target}, retry in {retry_after_ms} ms")]
    CircuitOpen { target: String, retry_after_ms: u64 },

    #[error("migration error: {0}")]
    Migration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error(
        "cannot change embedding dimension: agent {agent_id} is pinned to {current}, got {requested}"
    )]
    DimensionChange {
        agent_id: Uuid,
        current: usize,
        requested: usize,
    },

    #[error("unsupported embedding dimension: {0}")]
    UnsupportedDimension(usize),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Check if the error is a transient connectivity failure worth retrying.
    ///
    /// Constraint and invariant violations are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
            ),
            StoreError::Postgres(sqlx::Error::Io(_)) => true,
            StoreError::Postgres(sqlx::Error::PoolTimedOut) => true,
            StoreError::Io(_) => true,
            _ => false,
        }
    }

    /// Whether the error counts toward circuit-breaker failure accounting.
    ///
    /// Only connectivity-class failures open the circuit; a unique-key
    /// violation says nothing about the health of the database.
    pub fn is_connectivity(&self) -> bool {
        self.is_retryable() || matches!(self, StoreError::CircuitOpen { .. })
    }

    /// Check if the error is a unique/foreign-key constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Constraint(_) => true,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            StoreError::Postgres(sqlx::Error::Database(db)) => db
                .code()
                .map(|c| c.starts_with("23")) // integrity constraint class
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_errors_are_not_retryable() {
        assert!(!StoreError::InvalidInput("bad".into()).is_retryable());
        assert!(!StoreError::UnsupportedDimension(100).is_retryable());
        assert!(!StoreError::Constraint("dup".into()).is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_connectivity() {
        let err = StoreError::Postgres(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert!(err.is_connectivity());
    }

    #[test]
    fn test_constraint_detection() {
        assert!(StoreError::Constraint("unique".into()).is_constraint_violation());
        assert!(!StoreError::NotInitialized.is_constraint_violation());
    }
}
