//! Dynamic plugin migrations.
//!
//! Applies registered schema fragments against either backend,
//! statement by statement. Migrations must be safely re-runnable on
//! every boot: "already exists" errors are downgraded to logs, and a
//! fragment whose content hash is already recorded is skipped.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use super::connection::EmbeddedManager;
use super::postgres::PostgresManager;
use crate::error::{Result, StoreError};
use crate::schema::{split_statements, SchemaFragment, SchemaRegistry};

/// Which database the service applies DDL against.
#[derive(Clone)]
pub enum MigrationTarget {
    Embedded(Arc<EmbeddedManager>),
    Postgres(Arc<PostgresManager>),
}

/// Applies plugin-contributed schema fragments idempotently and tracks
/// what has been applied.
#[derive(Default)]
pub struct MigrationService {
    target: Mutex<Option<MigrationTarget>>,
}

impl MigrationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the service to a database. Must happen before
    /// `run_all_plugin_migrations`.
    pub fn initialize_with_database(&self, target: MigrationTarget) {
        *self.target.lock() = Some(target);
    }

    /// Apply every registered fragment, in registration order.
    pub async fn run_all_plugin_migrations(&self, registry: &SchemaRegistry) -> Result<()> {
        let target = self
            .target
            .lock()
            .clone()
            .ok_or(StoreError::NotInitialized)?;

        match target {
            MigrationTarget::Embedded(manager) => run_embedded(&manager, registry),
            MigrationTarget::Postgres(manager) => run_postgres(&manager, registry).await,
        }
    }
}

/// Errors that signal a schema object already exists. These are expected
/// on re-boot and must never fail the migration.
fn is_already_exists(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already exists") || lower.contains("duplicate column")
}

/// PostgreSQL SQLSTATE codes for duplicate schema objects.
const PG_DUPLICATE_CODES: &[&str] = &["42P06", "42P07", "42701", "42710", "42712"];

fn run_embedded(manager: &EmbeddedManager, registry: &SchemaRegistry) -> Result<()> {
    manager.with_connection(|conn| {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                hash TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    })?;

    for fragment in registry.fragments() {
        let hash = fragment.content_hash();
        let recorded: Option<String> = manager.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT hash FROM schema_migrations WHERE name = ?1")?;
            let mut rows = stmt.query([&fragment.name])?;
            Ok(match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            })
        })?;

        if recorded.as_deref() == Some(hash.as_str()) {
            debug!(fragment = %fragment.name, "fragment unchanged, skipping");
            continue;
        }

        apply_fragment_embedded(manager, fragment)?;

        manager.with_connection(|conn| {
            conn.execute(
                "INSERT INTO schema_migrations (name, hash, applied_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET hash = excluded.hash, applied_at = excluded.applied_at",
                rusqlite::params![fragment.name, hash, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })?;
        info!(fragment = %fragment.name, "applied schema fragment");
    }
    Ok(())
}

fn apply_fragment_embedded(manager: &EmbeddedManager, fragment: &SchemaFragment) -> Result<()> {
    for table in &fragment.tables {
        for statement in split_statements(&table.ddl) {
            let result = manager.with_connection(|conn| {
                conn.execute_batch(&statement)?;
                Ok(())
            });
            match result {
                Ok(()) => {}
                Err(err) if is_already_exists(&err.to_string()) => {
                    info!(
                        fragment = %fragment.name,
                        table = %table.name,
                        "schema object already exists, skipping statement"
                    );
                }
                Err(err) => {
                    return Err(StoreError::Migration(format!(
                        "fragment '{}', table '{}': {}",
                        fragment.name, table.name, err
                    )));
                }
            }
        }
    }
    Ok(())
}

async fn run_postgres(manager: &PostgresManager, registry: &SchemaRegistry) -> Result<()> {
    let pool = manager.pool()?;

    // The networked backend cannot store embeddings without pgvector;
    // fail before any plugin DDL runs.
    let available: Option<(i32,)> =
        sqlx::query_as("SELECT 1 FROM pg_available_extensions WHERE name = 'vector'")
            .fetch_optional(&pool)
            .await
            .map_err(StoreError::from)?;
    if available.is_none() {
        return Err(StoreError::Migration(
            "the 'vector' extension is not available on this server; \
             install pgvector before running migrations"
                .into(),
        ));
    }
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&pool)
        .await
        .map_err(StoreError::from)?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            hash TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&pool)
    .await
    .map_err(StoreError::from)?;

    for fragment in registry.fragments() {
        let hash = fragment.content_hash();
        let recorded: Option<(String,)> =
            sqlx::query_as("SELECT hash FROM schema_migrations WHERE name = $1")
                .bind(&fragment.name)
                .fetch_optional(&pool)
                .await
                .map_err(StoreError::from)?;

        if recorded.map(|(h,)| h) == Some(hash.clone()) {
            debug!(fragment = %fragment.name, "fragment unchanged, skipping");
            continue;
        }

        apply_fragment_postgres(&pool, fragment).await?;

        sqlx::query(
            "INSERT INTO schema_migrations (name, hash, applied_at) VALUES ($1, $2, now())
             ON CONFLICT (name) DO UPDATE SET hash = EXCLUDED.hash, applied_at = now()",
        )
        .bind(&fragment.name)
        .bind(&hash)
        .execute(&pool)
        .await
        .map_err(StoreError::from)?;
        info!(fragment = %fragment.name, "applied schema fragment");
    }
    Ok(())
}

async fn apply_fragment_postgres(pool: &sqlx::PgPool, fragment: &SchemaFragment) -> Result<()> {
    for table in &fragment.tables {
        for statement in split_statements(&table.ddl) {
            match sqlx::query(&statement).execute(pool).await {
                Ok(_) => {}
                Err(sqlx::Error::Database(db))
                    if db
                        .code()
                        .map(|c| PG_DUPLICATE_CODES.contains(&c.as_ref()))
                        .unwrap_or(false)
                        || is_already_exists(db.message()) =>
                {
                    info!(
                        fragment = %fragment.name,
                        table = %table.name,
                        "schema object already exists, skipping statement"
                    );
                }
                Err(err) => {
                    return Err(StoreError::Migration(format!(
                        "fragment '{}', table '{}': {}",
                        fragment.name, table.name, err
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaFragment;

    fn plugin_fragment() -> SchemaFragment {
        SchemaFragment::new("notes-plugin").table(
            "notes",
            "CREATE TABLE IF NOT EXISTS notes (id TEXT PRIMARY KEY, body TEXT NOT NULL);\n\
             --> statement-breakpoint\n\
             CREATE INDEX IF NOT EXISTS idx_notes_body ON notes(body);",
        )
    }

    #[tokio::test]
    async fn test_run_before_initialize_fails_fast() {
        let service = MigrationService::new();
        let registry = SchemaRegistry::new();
        let err = service.run_all_plugin_migrations(&registry).await;
        assert!(matches!(err, Err(StoreError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_migrations_are_re_runnable() {
        let manager = Arc::new(EmbeddedManager::new_in_memory());
        manager.initialize().await.unwrap();

        let mut registry = SchemaRegistry::new();
        registry.register(plugin_fragment()).unwrap();

        let service = MigrationService::new();
        service.initialize_with_database(MigrationTarget::Embedded(manager.clone()));

        service.run_all_plugin_migrations(&registry).await.unwrap();
        service.run_all_plugin_migrations(&registry).await.unwrap();

        let count: i64 = manager
            .with_connection(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'notes'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_object_is_downgraded() {
        let manager = Arc::new(EmbeddedManager::new_in_memory());
        manager.initialize().await.unwrap();

        // Seed the table so the fragment's CREATE without IF NOT EXISTS
        // collides.
        manager
            .with_connection(|conn| {
                conn.execute_batch("CREATE TABLE notes (id TEXT PRIMARY KEY)")?;
                Ok(())
            })
            .unwrap();

        let mut registry = SchemaRegistry::new();
        registry
            .register(
                SchemaFragment::new("notes-plugin")
                    .table("notes", "CREATE TABLE notes (id TEXT PRIMARY KEY)"),
            )
            .unwrap();

        let service = MigrationService::new();
        service.initialize_with_database(MigrationTarget::Embedded(manager));
        service.run_all_plugin_migrations(&registry).await.unwrap();
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists("table notes already exists"));
        assert!(is_already_exists("duplicate column name: body"));
        assert!(!is_already_exists("syntax error near SELEC"));
    }
}
