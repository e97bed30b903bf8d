//! The adapter contract consumed by the runtime and plugins.
//!
//! Both backends implement the same async trait; callers never see
//! which engine is underneath. Every operation is fallible and atomic
//! per call: retries for connectivity are the adapter's job, not the
//! caller's.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::connection::ConnectionRegistry;
use super::migrations::{MigrationService, MigrationTarget};
use super::postgres_backend::PostgresAdapter;
use super::sqlite_backend::SqliteAdapter;
use crate::error::Result;
use crate::schema::{core_fragment, BackendKind, SchemaRegistry};
use crate::types::{
    AdapterConfig, Agent, Component, Entity, GetLogsParams, GetMemoriesParams, GetTasksParams,
    Log, Memory, MemoryUpdate, Participant, Relationship, Room, SearchMemoriesParams, Task,
    World,
};

/// Deletes of many memories are chunked so arbitrarily large requests
/// stay inside statement/parameter limits.
pub const MEMORY_DELETE_BATCH_SIZE: usize = 100;

/// CRUD/search surface over the persistence layer.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// The agent this adapter instance is scoped to (cache operations
    /// and defaults).
    fn agent_id(&self) -> Uuid;

    /// Whether the underlying connection admits calls right now.
    fn is_ready(&self) -> bool;

    /// Release the underlying connection resources.
    async fn close(&self);

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    async fn create_agent(&self, agent: &Agent) -> Result<bool>;
    async fn get_agent(&self, agent_id: Uuid) -> Result<Option<Agent>>;
    async fn get_agents(&self) -> Result<Vec<Agent>>;
    async fn update_agent(&self, agent: &Agent) -> Result<bool>;

    /// Remove an agent and every row transitively owned by it, in one
    /// transaction. Returns `false` for an unknown agent.
    async fn delete_agent(&self, agent_id: Uuid) -> Result<bool>;

    /// Pin the agent's embedding dimension. The first call fixes it;
    /// later calls with a different value fail.
    async fn ensure_embedding_dimension(&self, agent_id: Uuid, dimension: usize) -> Result<()>;

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Bulk insert. A duplicate (id, agentId) is an error, not an
    /// upsert.
    async fn create_entities(&self, entities: &[Entity]) -> Result<bool>;
    async fn get_entities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Entity>>;
    async fn get_entities_for_room(&self, room_id: Uuid) -> Result<Vec<Entity>>;
    async fn update_entity(&self, entity: &Entity) -> Result<()>;

    /// Case-insensitive substring match over entity names, agent-scoped.
    async fn search_entities_by_name(
        &self,
        query: &str,
        agent_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Entity>>;

    // ------------------------------------------------------------------
    // Worlds and rooms
    // ------------------------------------------------------------------

    async fn create_world(&self, world: &World) -> Result<Uuid>;
    async fn get_world(&self, world_id: Uuid) -> Result<Option<World>>;
    async fn get_all_worlds(&self) -> Result<Vec<World>>;
    async fn update_world(&self, world: &World) -> Result<()>;
    async fn remove_world(&self, world_id: Uuid) -> Result<bool>;

    async fn create_rooms(&self, rooms: &[Room]) -> Result<Vec<Uuid>>;
    async fn get_rooms_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Room>>;
    async fn get_rooms_by_world(&self, world_id: Uuid) -> Result<Vec<Room>>;
    async fn update_room(&self, room: &Room) -> Result<()>;
    async fn delete_room(&self, room_id: Uuid) -> Result<bool>;

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    async fn add_participants_room(&self, entity_ids: &[Uuid], room_id: Uuid) -> Result<bool>;
    async fn remove_participant(&self, entity_id: Uuid, room_id: Uuid) -> Result<bool>;
    async fn get_participants_for_room(&self, room_id: Uuid) -> Result<Vec<Participant>>;
    async fn get_rooms_for_participant(&self, entity_id: Uuid) -> Result<Vec<Uuid>>;

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    async fn create_component(&self, component: &Component) -> Result<bool>;

    /// At most one active component exists per
    /// (entity, type, world, sourceEntity) tuple.
    async fn get_component(
        &self,
        entity_id: Uuid,
        component_type: &str,
        world_id: Option<Uuid>,
        source_entity_id: Option<Uuid>,
    ) -> Result<Option<Component>>;
    async fn get_components(&self, entity_id: Uuid) -> Result<Vec<Component>>;
    async fn update_component(&self, component: &Component) -> Result<()>;
    async fn delete_component(&self, component_id: Uuid) -> Result<bool>;

    // ------------------------------------------------------------------
    // Memories
    // ------------------------------------------------------------------

    /// Insert a memory into a logical table, and its embedding row when
    /// present. Returns the memory id.
    async fn create_memory(&self, memory: &Memory, table: &str) -> Result<Uuid>;
    async fn get_memory_by_id(&self, id: Uuid) -> Result<Option<Memory>>;
    async fn get_memories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Memory>>;
    async fn get_memories(&self, params: &GetMemoriesParams) -> Result<Vec<Memory>>;
    async fn count_memories(&self, room_id: Uuid, table: &str, unique_only: bool)
        -> Result<usize>;

    /// Partial replace: submitted `content`/`metadata` objects replace
    /// the stored values wholesale. Returns `false` for an unknown id.
    async fn update_memory(&self, update: &MemoryUpdate) -> Result<bool>;
    async fn delete_memory(&self, id: Uuid) -> Result<bool>;

    /// Batched delete; an empty list is a no-op that never touches the
    /// database. Each batch runs in its own transaction.
    async fn delete_many_memories(&self, ids: &[Uuid]) -> Result<()>;
    async fn delete_all_memories(&self, room_id: Uuid, table: &str) -> Result<()>;

    /// Cosine similarity search over the dimension-matched vector
    /// column. Results are ordered by similarity descending, filtered
    /// by the match threshold, and each carries its similarity score.
    async fn search_memories_by_embedding(
        &self,
        embedding: &[f32],
        params: &SearchMemoriesParams,
    ) -> Result<Vec<Memory>>;

    // ------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------

    async fn create_relationship(&self, relationship: &Relationship) -> Result<bool>;
    async fn get_relationship(
        &self,
        source_entity_id: Uuid,
        target_entity_id: Uuid,
    ) -> Result<Option<Relationship>>;
    async fn get_relationships(
        &self,
        entity_id: Uuid,
        tags: Option<&[String]>,
    ) -> Result<Vec<Relationship>>;
    async fn update_relationship(&self, relationship: &Relationship) -> Result<()>;

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    async fn create_task(&self, task: &Task) -> Result<Uuid>;
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>>;
    async fn get_tasks(&self, params: &GetTasksParams) -> Result<Vec<Task>>;
    async fn get_tasks_by_name(&self, name: &str) -> Result<Vec<Task>>;
    async fn update_task(&self, task: &Task) -> Result<()>;
    async fn delete_task(&self, id: Uuid) -> Result<bool>;

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    async fn log(&self, entry: &Log) -> Result<()>;
    async fn get_logs(&self, params: &GetLogsParams) -> Result<Vec<Log>>;
    async fn delete_log(&self, id: Uuid) -> Result<bool>;

    // ------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------

    /// Expired entries are never returned (lazy expiry on read).
    async fn get_cache(&self, key: &str) -> Result<Option<Value>>;
    async fn set_cache(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool>;
    async fn delete_cache(&self, key: &str) -> Result<bool>;
}

/// Construct an adapter for the configured backend.
///
/// A present `postgres_url` selects the networked backend; otherwise
/// the embedded backend is rooted at the resolved data directory. The
/// registry guarantees one connection manager per target; the core
/// schema is applied idempotently before the adapter is handed out.
pub async fn create_database_adapter(
    registry: &ConnectionRegistry,
    config: &AdapterConfig,
    agent_id: Uuid,
) -> Result<Arc<dyn DatabaseAdapter>> {
    match &config.postgres_url {
        Some(url) => {
            let manager = registry.postgres(url).await?;
            let service = MigrationService::new();
            service.initialize_with_database(MigrationTarget::Postgres(manager.clone()));
            let mut core = SchemaRegistry::new();
            core.register(core_fragment(BackendKind::Postgres))?;
            service.run_all_plugin_migrations(&core).await?;
            Ok(Arc::new(PostgresAdapter::new(manager, agent_id)))
        }
        None => {
            let data_dir = crate::types::resolve_data_dir(config.data_dir.as_deref());
            let manager = registry.embedded(&data_dir).await?;
            let service = MigrationService::new();
            service.initialize_with_database(MigrationTarget::Embedded(manager.clone()));
            let mut core = SchemaRegistry::new();
            core.register(core_fragment(BackendKind::Embedded))?;
            service.run_all_plugin_migrations(&core).await?;
            Ok(Arc::new(SqliteAdapter::new(manager, agent_id)))
        }
    }
}
