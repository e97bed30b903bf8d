//! Plugin-contributed schema fragments.
//!
//! Independently-authored plugins register a named set of table
//! definitions at boot. Fragments are validated at registration time,
//! not at DDL execution time, and applied in registration order by the
//! migration service.

mod core;

pub use self::core::{core_fragment, BackendKind, CORE_SCHEMA_NAME};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Marker isolating individual DDL statements inside a table definition,
/// so the executor can apply them one at a time and recover partial
/// failures.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// One table's DDL inside a fragment. The text is consumed verbatim by
/// the migration service, statement by statement.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub ddl: String,
}

/// A named set of table definitions contributed by one plugin.
#[derive(Debug, Clone)]
pub struct SchemaFragment {
    pub name: String,
    pub tables: Vec<TableSchema>,
}

impl SchemaFragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    pub fn table(mut self, name: impl Into<String>, ddl: impl Into<String>) -> Self {
        self.tables.push(TableSchema {
            name: name.into(),
            ddl: ddl.into(),
        });
        self
    }

    /// Content hash over the fragment's name and DDL, used to skip
    /// unchanged fragments on re-boot.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        for table in &self.tables {
            hasher.update(table.name.as_bytes());
            hasher.update(table.ddl.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// A plugin as seen by schema discovery: a name and an optional fragment.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub schema: Option<SchemaFragment>,
}

/// Outcome of schema discovery across a plugin list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub with_schema: usize,
    pub without_schema: usize,
}

/// Validate a fragment or table identifier: alphanumeric/underscore/
/// hyphen, max 64 chars.
fn validate_identifier(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidInput(format!("{} name is empty", what)));
    }
    if name.len() > 64 {
        return Err(StoreError::InvalidInput(format!(
            "{} name too long: {} (max 64 characters)",
            what,
            name.len()
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StoreError::InvalidInput(format!(
            "invalid {} name '{}': only alphanumeric, underscore, and hyphen allowed",
            what, name
        )));
    }
    Ok(())
}

/// Split a table's DDL text into individually executable statements.
pub fn split_statements(ddl: &str) -> Vec<String> {
    ddl.split('\n')
        .collect::<Vec<_>>()
        .split(|line| line.trim() == STATEMENT_BREAKPOINT)
        .map(|chunk| chunk.join("\n").trim().to_string())
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

/// Collects schema fragments contributed by plugins at startup.
///
/// Application order is registration order across fragments, authored
/// order within a fragment.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    fragments: Vec<SchemaFragment>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one fragment, validating its shape.
    ///
    /// Duplicate fragment names are rejected; re-registering the same
    /// plugin is a boot-sequence bug worth surfacing.
    pub fn register(&mut self, fragment: SchemaFragment) -> Result<()> {
        validate_identifier(&fragment.name, "fragment")?;
        if self.fragments.iter().any(|f| f.name == fragment.name) {
            return Err(StoreError::InvalidInput(format!(
                "schema fragment '{}' is already registered",
                fragment.name
            )));
        }
        if fragment.tables.is_empty() {
            return Err(StoreError::InvalidInput(format!(
                "schema fragment '{}' has no tables",
                fragment.name
            )));
        }
        for table in &fragment.tables {
            validate_identifier(&table.name, "table")?;
            if table.ddl.trim().is_empty() {
                return Err(StoreError::InvalidInput(format!(
                    "table '{}' in fragment '{}' has empty DDL",
                    table.name, fragment.name
                )));
            }
        }
        debug!(
            fragment = %fragment.name,
            tables = fragment.tables.len(),
            "registered schema fragment"
        );
        self.fragments.push(fragment);
        Ok(())
    }

    /// Walk a plugin list and register each plugin's fragment if present.
    ///
    /// Plugins without a schema are skipped without error; the report
    /// carries the with/without counts.
    pub fn discover_and_register_plugin_schemas(
        &mut self,
        plugins: &[PluginDescriptor],
    ) -> Result<RegistrationReport> {
        let mut report = RegistrationReport::default();
        for plugin in plugins {
            match &plugin.schema {
                Some(fragment) => {
                    self.register(fragment.clone())?;
                    report.with_schema += 1;
                }
                None => {
                    debug!(plugin = %plugin.name, "plugin has no schema, skipping");
                    report.without_schema += 1;
                }
            }
        }
        info!(
            with_schema = report.with_schema,
            without_schema = report.without_schema,
            "discovered plugin schemas"
        );
        Ok(report)
    }

    pub fn fragments(&self) -> &[SchemaFragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(name: &str) -> SchemaFragment {
        SchemaFragment::new(name).table(
            "widgets",
            "CREATE TABLE IF NOT EXISTS widgets (id TEXT PRIMARY KEY)",
        )
    }

    #[test]
    fn test_register_and_order() {
        let mut registry = SchemaRegistry::new();
        registry.register(fragment("alpha")).unwrap();
        registry.register(fragment("beta")).unwrap();
        let names: Vec<_> = registry.fragments().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(fragment("alpha")).unwrap();
        assert!(registry.register(fragment("alpha")).is_err());
    }

    #[test]
    fn test_invalid_shapes_rejected_at_registration() {
        let mut registry = SchemaRegistry::new();
        assert!(registry.register(SchemaFragment::new("no-tables")).is_err());
        assert!(registry
            .register(SchemaFragment::new("bad name!").table("t", "CREATE TABLE t (id TEXT)"))
            .is_err());
        assert!(registry
            .register(SchemaFragment::new("empty-ddl").table("t", "   "))
            .is_err());
    }

    #[test]
    fn test_discovery_counts() {
        let mut registry = SchemaRegistry::new();
        let plugins = vec![
            PluginDescriptor {
                name: "storage".into(),
                schema: Some(fragment("storage")),
            },
            PluginDescriptor {
                name: "telemetry".into(),
                schema: None,
            },
            PluginDescriptor {
                name: "notes".into(),
                schema: Some(fragment("notes")),
            },
        ];
        let report = registry
            .discover_and_register_plugin_schemas(&plugins)
            .unwrap();
        assert_eq!(report.with_schema, 2);
        assert_eq!(report.without_schema, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_split_statements() {
        let ddl = "CREATE TABLE a (id TEXT);\n--> statement-breakpoint\nCREATE INDEX idx_a ON a(id);\n--> statement-breakpoint\n";
        let statements = split_statements(ddl);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE"));
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[test]
    fn test_content_hash_changes_with_ddl() {
        let a = fragment("alpha");
        let mut b = fragment("alpha");
        b.tables[0].ddl.push_str(";");
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), fragment("alpha").content_hash());
    }
}
