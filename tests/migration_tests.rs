//! Integration tests for plugin schema discovery and migrations.

use std::sync::Arc;

use agentstore::schema::{
    core_fragment, BackendKind, PluginDescriptor, SchemaFragment, SchemaRegistry,
};
use agentstore::storage::{ConnectionRegistry, MigrationService, MigrationTarget};
use agentstore::StoreError;

fn notes_fragment() -> SchemaFragment {
    SchemaFragment::new("notes-plugin").table(
        "plugin_notes",
        "CREATE TABLE IF NOT EXISTS plugin_notes (\n\
             id TEXT PRIMARY KEY,\n\
             agent_id TEXT NOT NULL,\n\
             body TEXT NOT NULL\n\
         );\n\
         --> statement-breakpoint\n\
         CREATE INDEX IF NOT EXISTS idx_plugin_notes_agent ON plugin_notes(agent_id);",
    )
}

async fn setup() -> (
    tempfile::TempDir,
    Arc<agentstore::storage::EmbeddedManager>,
    MigrationService,
) {
    let dir = tempfile::tempdir().unwrap();
    let registry = ConnectionRegistry::new();
    let manager = registry.embedded(dir.path()).await.unwrap();
    let service = MigrationService::new();
    service.initialize_with_database(MigrationTarget::Embedded(manager.clone()));
    (dir, manager, service)
}

fn count_objects(manager: &agentstore::storage::EmbeddedManager, name: &str) -> i64 {
    manager
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                [name],
                |row| row.get(0),
            )?)
        })
        .unwrap()
}

#[tokio::test]
async fn test_run_before_initialize_fails_fast() {
    let service = MigrationService::new();
    let registry = SchemaRegistry::new();
    let err = service.run_all_plugin_migrations(&registry).await;
    assert!(matches!(err, Err(StoreError::NotInitialized)));
    assert_eq!(err.unwrap_err().to_string(), "database not initialized");
}

#[tokio::test]
async fn test_rerun_produces_no_errors_and_no_duplicates() {
    let (_dir, manager, service) = setup().await;

    let mut registry = SchemaRegistry::new();
    registry
        .register(core_fragment(BackendKind::Embedded))
        .unwrap();
    registry.register(notes_fragment()).unwrap();

    service.run_all_plugin_migrations(&registry).await.unwrap();
    service.run_all_plugin_migrations(&registry).await.unwrap();

    for table in ["agents", "memories", "embeddings", "plugin_notes"] {
        assert_eq!(count_objects(&manager, table), 1, "table {}", table);
    }
    assert_eq!(count_objects(&manager, "idx_plugin_notes_agent"), 1);
}

#[tokio::test]
async fn test_statement_breakpoints_apply_individually() {
    let (_dir, manager, service) = setup().await;

    let mut registry = SchemaRegistry::new();
    registry.register(notes_fragment()).unwrap();
    service.run_all_plugin_migrations(&registry).await.unwrap();

    assert_eq!(count_objects(&manager, "plugin_notes"), 1);
    assert_eq!(count_objects(&manager, "idx_plugin_notes_agent"), 1);
}

#[tokio::test]
async fn test_plugin_discovery_skips_schemaless_plugins() {
    let (_dir, manager, service) = setup().await;

    let plugins = vec![
        PluginDescriptor {
            name: "notes".into(),
            schema: Some(notes_fragment()),
        },
        PluginDescriptor {
            name: "telemetry".into(),
            schema: None,
        },
    ];

    let mut registry = SchemaRegistry::new();
    let report = registry
        .discover_and_register_plugin_schemas(&plugins)
        .unwrap();
    assert_eq!(report.with_schema, 1);
    assert_eq!(report.without_schema, 1);

    service.run_all_plugin_migrations(&registry).await.unwrap();
    assert_eq!(count_objects(&manager, "plugin_notes"), 1);
}

#[tokio::test]
async fn test_changed_fragment_reapplies() {
    let (_dir, manager, service) = setup().await;

    let mut registry = SchemaRegistry::new();
    registry.register(notes_fragment()).unwrap();
    service.run_all_plugin_migrations(&registry).await.unwrap();

    // Same plugin ships a new column in a later release.
    let mut evolved = SchemaRegistry::new();
    let fragment = SchemaFragment::new("notes-plugin").table(
        "plugin_notes",
        "CREATE TABLE IF NOT EXISTS plugin_notes (\n\
             id TEXT PRIMARY KEY,\n\
             agent_id TEXT NOT NULL,\n\
             body TEXT NOT NULL\n\
         );\n\
         --> statement-breakpoint\n\
         ALTER TABLE plugin_notes ADD COLUMN pinned INTEGER NOT NULL DEFAULT 0;",
    );
    evolved.register(fragment).unwrap();
    service.run_all_plugin_migrations(&evolved).await.unwrap();

    let has_pinned: i64 = manager
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('plugin_notes') WHERE name = 'pinned'",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(has_pinned, 1);

    // The evolved fragment's hash is now recorded; another boot skips it.
    service.run_all_plugin_migrations(&evolved).await.unwrap();
}

#[tokio::test]
async fn test_fragment_application_order_is_registration_order() {
    let (_dir, manager, service) = setup().await;

    // Second fragment's DDL depends on the first one's table existing.
    let base = SchemaFragment::new("base-plugin").table(
        "plugin_base",
        "CREATE TABLE IF NOT EXISTS plugin_base (id TEXT PRIMARY KEY);",
    );
    let dependent = SchemaFragment::new("dependent-plugin").table(
        "plugin_child",
        "CREATE TABLE IF NOT EXISTS plugin_child (\n\
             id TEXT PRIMARY KEY,\n\
             base_id TEXT NOT NULL REFERENCES plugin_base(id)\n\
         );",
    );

    let mut registry = SchemaRegistry::new();
    registry.register(base).unwrap();
    registry.register(dependent).unwrap();
    service.run_all_plugin_migrations(&registry).await.unwrap();

    assert_eq!(count_objects(&manager, "plugin_base"), 1);
    assert_eq!(count_objects(&manager, "plugin_child"), 1);
}
