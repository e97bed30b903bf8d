//! Core table definitions for both backends.
//!
//! The storage layer contributes its own tables through the same
//! fragment mechanism plugins use, so one code path applies all DDL.

use super::SchemaFragment;

/// Name under which the core schema fragment registers.
pub const CORE_SCHEMA_NAME: &str = "agentstore-core";

/// Which physical backend a fragment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedded,
    Postgres,
}

/// Build the core schema fragment for the given backend.
pub fn core_fragment(kind: BackendKind) -> SchemaFragment {
    match kind {
        BackendKind::Embedded => embedded_fragment(),
        BackendKind::Postgres => postgres_fragment(),
    }
}

fn embedded_fragment() -> SchemaFragment {
    SchemaFragment::new(CORE_SCHEMA_NAME)
        .table(
            "agents",
            r#"CREATE TABLE IF NOT EXISTS agents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    settings TEXT NOT NULL DEFAULT '{}',
    embedding_dimension INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_name ON agents(name);"#,
        )
        .table(
            "entities",
            r#"CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL REFERENCES agents(id),
    names TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_id_agent ON entities(id, agent_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_entities_agent ON entities(agent_id);"#,
        )
        .table(
            "worlds",
            r#"CREATE TABLE IF NOT EXISTS worlds (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL REFERENCES agents(id),
    name TEXT NOT NULL,
    server_id TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_worlds_agent ON worlds(agent_id);"#,
        )
        .table(
            "rooms",
            r#"CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL REFERENCES agents(id),
    world_id TEXT REFERENCES worlds(id),
    name TEXT,
    type TEXT NOT NULL,
    source TEXT NOT NULL,
    channel_id TEXT,
    server_id TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_rooms_agent ON rooms(agent_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_rooms_world ON rooms(world_id);"#,
        )
        .table(
            "participants",
            r#"CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL REFERENCES entities(id),
    room_id TEXT NOT NULL REFERENCES rooms(id),
    state TEXT,
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_participants_entity_room ON participants(entity_id, room_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_participants_room ON participants(room_id);"#,
        )
        .table(
            "memories",
            r#"CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    entity_id TEXT NOT NULL REFERENCES entities(id),
    agent_id TEXT NOT NULL REFERENCES agents(id),
    room_id TEXT NOT NULL REFERENCES rooms(id),
    world_id TEXT,
    content TEXT NOT NULL,
    metadata TEXT,
    is_unique INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_memories_room_type ON memories(room_id, type);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_memories_agent ON memories(agent_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_memories_entity ON memories(entity_id);"#,
        )
        .table(
            "embeddings",
            r#"CREATE TABLE IF NOT EXISTS embeddings (
    id TEXT PRIMARY KEY,
    memory_id TEXT NOT NULL UNIQUE REFERENCES memories(id),
    dim_384 BLOB,
    dim_512 BLOB,
    dim_768 BLOB,
    dim_1024 BLOB,
    dim_1536 BLOB,
    dim_3072 BLOB,
    created_at TEXT NOT NULL,
    CONSTRAINT embedding_vector_required CHECK (
        dim_384 IS NOT NULL OR dim_512 IS NOT NULL OR dim_768 IS NOT NULL
        OR dim_1024 IS NOT NULL OR dim_1536 IS NOT NULL OR dim_3072 IS NOT NULL
    )
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_embeddings_memory ON embeddings(memory_id);"#,
        )
        .table(
            "components",
            r#"CREATE TABLE IF NOT EXISTS components (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL REFERENCES entities(id),
    agent_id TEXT NOT NULL REFERENCES agents(id),
    room_id TEXT REFERENCES rooms(id),
    world_id TEXT REFERENCES worlds(id),
    source_entity_id TEXT,
    type TEXT NOT NULL,
    data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_components_entity ON components(entity_id);"#,
        )
        .table(
            "relationships",
            r#"CREATE TABLE IF NOT EXISTS relationships (
    id TEXT PRIMARY KEY,
    source_entity_id TEXT NOT NULL REFERENCES entities(id),
    target_entity_id TEXT NOT NULL REFERENCES entities(id),
    agent_id TEXT NOT NULL REFERENCES agents(id),
    tags TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_unique
    ON relationships(source_entity_id, target_entity_id, agent_id);"#,
        )
        .table(
            "tasks",
            r#"CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    agent_id TEXT NOT NULL REFERENCES agents(id),
    name TEXT NOT NULL,
    description TEXT,
    room_id TEXT,
    world_id TEXT,
    entity_id TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    updated_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_tasks_agent_name ON tasks(agent_id, name);"#,
        )
        .table(
            "logs",
            r#"CREATE TABLE IF NOT EXISTS logs (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL REFERENCES entities(id),
    room_id TEXT NOT NULL REFERENCES rooms(id),
    type TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_logs_entity ON logs(entity_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_logs_room ON logs(room_id);"#,
        )
        .table(
            "cache",
            r#"CREATE TABLE IF NOT EXISTS cache (
    key TEXT NOT NULL,
    agent_id TEXT NOT NULL REFERENCES agents(id),
    value TEXT NOT NULL,
    expires_at TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (key, agent_id)
);"#,
        )
}

fn postgres_fragment() -> SchemaFragment {
    SchemaFragment::new(CORE_SCHEMA_NAME)
        .table(
            "agents",
            r#"CREATE TABLE IF NOT EXISTS agents (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    enabled BOOLEAN NOT NULL DEFAULT TRUE,
    settings JSONB NOT NULL DEFAULT '{}'::jsonb,
    embedding_dimension INTEGER,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_name ON agents(name);"#,
        )
        .table(
            "entities",
            r#"CREATE TABLE IF NOT EXISTS entities (
    id UUID PRIMARY KEY,
    agent_id UUID NOT NULL REFERENCES agents(id),
    names JSONB NOT NULL DEFAULT '[]'::jsonb,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_id_agent ON entities(id, agent_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_entities_agent ON entities(agent_id);"#,
        )
        .table(
            "worlds",
            r#"CREATE TABLE IF NOT EXISTS worlds (
    id UUID PRIMARY KEY,
    agent_id UUID NOT NULL REFERENCES agents(id),
    name TEXT NOT NULL,
    server_id TEXT,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_worlds_agent ON worlds(agent_id);"#,
        )
        .table(
            "rooms",
            r#"CREATE TABLE IF NOT EXISTS rooms (
    id UUID PRIMARY KEY,
    agent_id UUID NOT NULL REFERENCES agents(id),
    world_id UUID REFERENCES worlds(id),
    name TEXT,
    type TEXT NOT NULL,
    source TEXT NOT NULL,
    channel_id TEXT,
    server_id TEXT,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_rooms_agent ON rooms(agent_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_rooms_world ON rooms(world_id);"#,
        )
        .table(
            "participants",
            r#"CREATE TABLE IF NOT EXISTS participants (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL REFERENCES entities(id),
    room_id UUID NOT NULL REFERENCES rooms(id),
    state TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_participants_entity_room ON participants(entity_id, room_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_participants_room ON participants(room_id);"#,
        )
        .table(
            "memories",
            r#"CREATE TABLE IF NOT EXISTS memories (
    id UUID PRIMARY KEY,
    type TEXT NOT NULL,
    entity_id UUID NOT NULL REFERENCES entities(id),
    agent_id UUID NOT NULL REFERENCES agents(id),
    room_id UUID NOT NULL REFERENCES rooms(id),
    world_id UUID,
    content JSONB NOT NULL,
    metadata JSONB,
    is_unique BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_memories_room_type ON memories(room_id, type);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_memories_agent ON memories(agent_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_memories_entity ON memories(entity_id);"#,
        )
        .table(
            "embeddings",
            r#"CREATE TABLE IF NOT EXISTS embeddings (
    id UUID PRIMARY KEY,
    memory_id UUID NOT NULL UNIQUE REFERENCES memories(id),
    dim_384 vector(384),
    dim_512 vector(512),
    dim_768 vector(768),
    dim_1024 vector(1024),
    dim_1536 vector(1536),
    dim_3072 vector(3072),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT embedding_vector_required CHECK (
        dim_384 IS NOT NULL OR dim_512 IS NOT NULL OR dim_768 IS NOT NULL
        OR dim_1024 IS NOT NULL OR dim_1536 IS NOT NULL OR dim_3072 IS NOT NULL
    )
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_embeddings_memory ON embeddings(memory_id);"#,
        )
        .table(
            "components",
            r#"CREATE TABLE IF NOT EXISTS components (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL REFERENCES entities(id),
    agent_id UUID NOT NULL REFERENCES agents(id),
    room_id UUID REFERENCES rooms(id),
    world_id UUID REFERENCES worlds(id),
    source_entity_id UUID,
    type TEXT NOT NULL,
    data JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_components_entity ON components(entity_id);"#,
        )
        .table(
            "relationships",
            r#"CREATE TABLE IF NOT EXISTS relationships (
    id UUID PRIMARY KEY,
    source_entity_id UUID NOT NULL REFERENCES entities(id),
    target_entity_id UUID NOT NULL REFERENCES entities(id),
    agent_id UUID NOT NULL REFERENCES agents(id),
    tags JSONB NOT NULL DEFAULT '[]'::jsonb,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_unique
    ON relationships(source_entity_id, target_entity_id, agent_id);"#,
        )
        .table(
            "tasks",
            r#"CREATE TABLE IF NOT EXISTS tasks (
    id UUID PRIMARY KEY,
    agent_id UUID NOT NULL REFERENCES agents(id),
    name TEXT NOT NULL,
    description TEXT,
    room_id UUID,
    world_id UUID,
    entity_id UUID,
    tags JSONB NOT NULL DEFAULT '[]'::jsonb,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_tasks_agent_name ON tasks(agent_id, name);"#,
        )
        .table(
            "logs",
            r#"CREATE TABLE IF NOT EXISTS logs (
    id UUID PRIMARY KEY,
    entity_id UUID NOT NULL REFERENCES entities(id),
    room_id UUID NOT NULL REFERENCES rooms(id),
    type TEXT NOT NULL,
    body JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_logs_entity ON logs(entity_id);
--> statement-breakpoint
CREATE INDEX IF NOT EXISTS idx_logs_room ON logs(room_id);"#,
        )
        .table(
            "cache",
            r#"CREATE TABLE IF NOT EXISTS cache (
    key TEXT NOT NULL,
    agent_id UUID NOT NULL REFERENCES agents(id),
    value JSONB NOT NULL,
    expires_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (key, agent_id)
);"#,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::split_statements;

    #[test]
    fn test_core_fragments_cover_all_tables() {
        for kind in [BackendKind::Embedded, BackendKind::Postgres] {
            let fragment = core_fragment(kind);
            assert_eq!(fragment.name, CORE_SCHEMA_NAME);
            let names: Vec<_> = fragment.tables.iter().map(|t| t.name.as_str()).collect();
            assert_eq!(
                names,
                [
                    "agents",
                    "entities",
                    "worlds",
                    "rooms",
                    "participants",
                    "memories",
                    "embeddings",
                    "components",
                    "relationships",
                    "tasks",
                    "logs",
                    "cache"
                ]
            );
        }
    }

    #[test]
    fn test_embedded_ddl_splits_into_statements() {
        let fragment = core_fragment(BackendKind::Embedded);
        let memories = fragment
            .tables
            .iter()
            .find(|t| t.name == "memories")
            .unwrap();
        let statements = split_statements(&memories.ddl);
        assert_eq!(statements.len(), 4); // table + three indexes
    }

    #[test]
    fn test_postgres_embeddings_use_vector_columns() {
        let fragment = core_fragment(BackendKind::Postgres);
        let embeddings = fragment
            .tables
            .iter()
            .find(|t| t.name == "embeddings")
            .unwrap();
        assert!(embeddings.ddl.contains("vector(1536)"));
        assert!(embeddings.ddl.contains("embedding_vector_required"));
    }
}
