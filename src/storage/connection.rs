//! Connection management for both backends.
//!
//! Owns the physical handles: an embedded SQLite connection behind a
//! single writer mutex, or a pooled PostgreSQL connection set. All
//! adapter I/O routes through a manager obtained from the process-wide
//! `ConnectionRegistry`, which guarantees one manager per
//! (backend, target) without hidden global state.

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::circuit::{CircuitBreaker, CircuitBreakerConfig};
use super::postgres::PostgresManager;
use crate::error::{Result, StoreError};

/// Database file name inside the embedded data directory.
pub const EMBEDDED_DB_FILE: &str = "agentstore.db";

/// Retry policy for transient connection failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random jitter added to every delay, spreading reconnection storms.
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with jitter for the given attempt (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        capped + Duration::from_millis(jitter_ms)
    }
}

/// Run an operation with retry-with-backoff on transient failures.
pub async fn with_retry<T, F, Fut>(retry: &RetryConfig, op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                let delay = retry.delay_for(attempt);
                warn!(
                    op,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Manager for the embedded single-process SQLite database.
///
/// Only one writer can hold the underlying handle, so all operations
/// serialize behind the mutex. Construction is cheap; `initialize`
/// opens the file and is idempotent.
pub struct EmbeddedManager {
    target: String,
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
}

impl EmbeddedManager {
    /// Manager for a file-backed database.
    pub fn new_file(path: PathBuf) -> Self {
        let target = format!("sqlite:{}", path.display());
        Self {
            breaker: CircuitBreaker::new(target.clone(), CircuitBreakerConfig::default()),
            target,
            path: Some(path),
            conn: Mutex::new(None),
            retry: RetryConfig::default(),
        }
    }

    /// Manager for an in-memory database (tests, ephemeral runs).
    pub fn new_in_memory() -> Self {
        let target = "sqlite::memory:".to_string();
        Self {
            breaker: CircuitBreaker::new(target.clone(), CircuitBreakerConfig::default()),
            target,
            path: None,
            conn: Mutex::new(None),
            retry: RetryConfig::default(),
        }
    }

    /// Open the database, retrying transient failures with backoff.
    /// Safe to call repeatedly; an open connection is reused.
    pub async fn initialize(&self) -> Result<()> {
        if self.conn.lock().is_some() {
            return Ok(());
        }
        let path = self.path.clone();
        let conn = with_retry(&self.retry, "embedded-open", || {
            let path = path.clone();
            async move { open_embedded_connection(path.as_deref()) }
        })
        .await?;

        let mut guard = self.conn.lock();
        if guard.is_none() {
            *guard = Some(conn);
            info!(target = %self.target, "embedded database ready");
        }
        Ok(())
    }

    /// Circuit state and initialization combined.
    pub fn is_ready(&self) -> bool {
        self.conn.lock().is_some() && self.breaker.is_ready()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Run a read/write closure against the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.breaker.try_acquire()?;
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::NotInitialized)?;
        self.account(f(conn))
    }

    /// Run a closure inside a transaction; rolled back on error.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.breaker.try_acquire()?;
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let result = (|| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })();
        self.account(result)
    }

    /// Feed the call outcome into circuit accounting. A constraint
    /// violation proves the database answered, so only connectivity
    /// failures count against the circuit.
    fn account<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(err) if err.is_connectivity() => self.breaker.record_failure(),
            Err(_) => self.breaker.record_success(),
        }
        result
    }

    /// Release the connection. Safe to call during shutdown signals and
    /// more than once.
    pub fn close(&self) {
        let mut guard = self.conn.lock();
        if guard.take().is_some() {
            info!(target = %self.target, "embedded database closed");
        }
    }
}

fn open_embedded_connection(path: Option<&Path>) -> Result<Connection> {
    let conn = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            // WAL for crash recovery; NORMAL sync is durable enough under WAL.
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA busy_timeout=5000;
                PRAGMA foreign_keys=ON;
                "#,
            )?;
            conn
        }
        None => {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            conn
        }
    };
    Ok(conn)
}

/// Process-wide registry of connection managers.
///
/// Keyed by normalized (backend, target) so repeated adapter
/// construction reuses the same pool or file handle. Passed by
/// reference into every adapter construction call; the embedded
/// backend corrupts state under concurrent writers, so this is the
/// only sanctioned way to obtain a manager.
#[derive(Default)]
pub struct ConnectionRegistry {
    embedded: DashMap<PathBuf, Arc<EmbeddedManager>>,
    postgres: DashMap<String, Arc<PostgresManager>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the embedded manager for a data directory.
    pub async fn embedded(&self, data_dir: &Path) -> Result<Arc<EmbeddedManager>> {
        let db_path = data_dir.join(EMBEDDED_DB_FILE);
        let manager = self
            .embedded
            .entry(db_path.clone())
            .or_insert_with(|| {
                debug!(path = %db_path.display(), "creating embedded connection manager");
                Arc::new(EmbeddedManager::new_file(db_path.clone()))
            })
            .clone();
        manager.initialize().await?;
        Ok(manager)
    }

    /// Get or create the pooled manager for a connection string.
    pub async fn postgres(&self, url: &str) -> Result<Arc<PostgresManager>> {
        let key = url.trim().trim_end_matches('/').to_string();
        let manager = self
            .postgres
            .entry(key.clone())
            .or_insert_with(|| {
                debug!("creating postgres connection manager");
                Arc::new(PostgresManager::new(key.clone()))
            })
            .clone();
        manager.initialize().await?;
        Ok(manager)
    }

    /// Close every managed connection. Safe during process shutdown.
    pub async fn close_all(&self) {
        for entry in self.embedded.iter() {
            entry.value().close();
        }
        for entry in self.postgres.iter() {
            entry.value().close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_initialize_is_idempotent() {
        let manager = EmbeddedManager::new_in_memory();
        assert!(!manager.is_ready());
        manager.initialize().await.unwrap();
        manager.initialize().await.unwrap();
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn test_with_connection_before_initialize_fails() {
        let manager = EmbeddedManager::new_in_memory();
        let result = manager.with_connection(|_| Ok(()));
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let manager = EmbeddedManager::new_in_memory();
        manager.initialize().await.unwrap();
        manager
            .with_connection(|conn| {
                conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])?;
                Ok(())
            })
            .unwrap();

        let result: Result<()> = manager.with_transaction(|conn| {
            conn.execute("INSERT INTO t (id) VALUES (1)", [])?;
            Err(StoreError::InvalidInput("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = manager
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_registry_returns_same_manager_for_same_target() {
        let registry = ConnectionRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let a = registry.embedded(dir.path()).await.unwrap();
        let b = registry.embedded(dir.path()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_close_is_repeatable() {
        let manager = EmbeddedManager::new_in_memory();
        manager.initialize().await.unwrap();
        manager.close();
        manager.close();
        assert!(!manager.is_ready());
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig::default();
        for attempt in 0..8 {
            let delay = retry.delay_for(attempt);
            assert!(delay <= retry.max_delay + retry.max_jitter);
        }
    }
}
