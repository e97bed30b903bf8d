//! Embedded SQLite implementation of the adapter contract.
//!
//! Wraps the shared `EmbeddedManager` and delegates to the functions in
//! `queries.rs`. Multi-table writes run inside a transaction; the
//! single writer mutex serializes all physical access.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::adapter::{DatabaseAdapter, MEMORY_DELETE_BATCH_SIZE};
use super::connection::EmbeddedManager;
use super::queries;
use crate::error::Result;
use crate::types::{
    Agent, Component, Entity, GetLogsParams, GetMemoriesParams, GetTasksParams, Log, Memory,
    MemoryUpdate, Participant, Relationship, Room, SearchMemoriesParams, Task, World,
};

/// Adapter over the embedded single-process database.
pub struct SqliteAdapter {
    manager: Arc<EmbeddedManager>,
    agent_id: Uuid,
}

impl SqliteAdapter {
    pub fn new(manager: Arc<EmbeddedManager>, agent_id: Uuid) -> Self {
        Self { manager, agent_id }
    }

    /// The underlying connection manager (shared per target).
    pub fn manager(&self) -> &Arc<EmbeddedManager> {
        &self.manager
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    async fn close(&self) {
        self.manager.close();
    }

    // Agents -----------------------------------------------------------

    async fn create_agent(&self, agent: &Agent) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::create_agent(conn, agent))
    }

    async fn get_agent(&self, agent_id: Uuid) -> Result<Option<Agent>> {
        self.manager
            .with_connection(|conn| queries::get_agent(conn, agent_id))
    }

    async fn get_agents(&self) -> Result<Vec<Agent>> {
        self.manager.with_connection(queries::get_agents)
    }

    async fn update_agent(&self, agent: &Agent) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::update_agent(conn, agent))
    }

    async fn delete_agent(&self, agent_id: Uuid) -> Result<bool> {
        self.manager
            .with_transaction(|conn| queries::delete_agent_cascade(conn, agent_id))
    }

    async fn ensure_embedding_dimension(&self, agent_id: Uuid, dimension: usize) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::ensure_embedding_dimension(conn, agent_id, dimension))
    }

    // Entities ---------------------------------------------------------

    async fn create_entities(&self, entities: &[Entity]) -> Result<bool> {
        if entities.is_empty() {
            return Ok(true);
        }
        self.manager
            .with_transaction(|conn| queries::create_entities(conn, entities))
    }

    async fn get_entities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Entity>> {
        self.manager
            .with_connection(|conn| queries::get_entities_by_ids(conn, ids))
    }

    async fn get_entities_for_room(&self, room_id: Uuid) -> Result<Vec<Entity>> {
        self.manager
            .with_connection(|conn| queries::get_entities_for_room(conn, room_id))
    }

    async fn update_entity(&self, entity: &Entity) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::update_entity(conn, entity))
    }

    async fn search_entities_by_name(
        &self,
        query: &str,
        agent_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        self.manager
            .with_connection(|conn| queries::search_entities_by_name(conn, query, agent_id, limit))
    }

    // Worlds and rooms -------------------------------------------------

    async fn create_world(&self, world: &World) -> Result<Uuid> {
        self.manager
            .with_connection(|conn| queries::create_world(conn, world))
    }

    async fn get_world(&self, world_id: Uuid) -> Result<Option<World>> {
        self.manager
            .with_connection(|conn| queries::get_world(conn, world_id))
    }

    async fn get_all_worlds(&self) -> Result<Vec<World>> {
        let agent_id = self.agent_id;
        self.manager
            .with_connection(|conn| queries::get_all_worlds(conn, agent_id))
    }

    async fn update_world(&self, world: &World) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::update_world(conn, world))
    }

    async fn remove_world(&self, world_id: Uuid) -> Result<bool> {
        self.manager
            .with_transaction(|conn| queries::remove_world_cascade(conn, world_id))
    }

    async fn create_rooms(&self, rooms: &[Room]) -> Result<Vec<Uuid>> {
        if rooms.is_empty() {
            return Ok(Vec::new());
        }
        self.manager
            .with_transaction(|conn| queries::create_rooms(conn, rooms))
    }

    async fn get_rooms_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Room>> {
        self.manager
            .with_connection(|conn| queries::get_rooms_by_ids(conn, ids))
    }

    async fn get_rooms_by_world(&self, world_id: Uuid) -> Result<Vec<Room>> {
        self.manager
            .with_connection(|conn| queries::get_rooms_by_world(conn, world_id))
    }

    async fn update_room(&self, room: &Room) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::update_room(conn, room))
    }

    async fn delete_room(&self, room_id: Uuid) -> Result<bool> {
        self.manager
            .with_transaction(|conn| queries::delete_room_cascade(conn, room_id))
    }

    // Participants -----------------------------------------------------

    async fn add_participants_room(&self, entity_ids: &[Uuid], room_id: Uuid) -> Result<bool> {
        if entity_ids.is_empty() {
            return Ok(true);
        }
        self.manager
            .with_transaction(|conn| queries::add_participants(conn, entity_ids, room_id))
    }

    async fn remove_participant(&self, entity_id: Uuid, room_id: Uuid) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::remove_participant(conn, entity_id, room_id))
    }

    async fn get_participants_for_room(&self, room_id: Uuid) -> Result<Vec<Participant>> {
        self.manager
            .with_connection(|conn| queries::get_participants_for_room(conn, room_id))
    }

    async fn get_rooms_for_participant(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        self.manager
            .with_connection(|conn| queries::get_rooms_for_participant(conn, entity_id))
    }

    // Components -------------------------------------------------------

    async fn create_component(&self, component: &Component) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::create_component(conn, component))
    }

    async fn get_component(
        &self,
        entity_id: Uuid,
        component_type: &str,
        world_id: Option<Uuid>,
        source_entity_id: Option<Uuid>,
    ) -> Result<Option<Component>> {
        self.manager.with_connection(|conn| {
            queries::get_component(conn, entity_id, component_type, world_id, source_entity_id)
        })
    }

    async fn get_components(&self, entity_id: Uuid) -> Result<Vec<Component>> {
        self.manager
            .with_connection(|conn| queries::get_components(conn, entity_id))
    }

    async fn update_component(&self, component: &Component) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::update_component(conn, component))
    }

    async fn delete_component(&self, component_id: Uuid) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::delete_component(conn, component_id))
    }

    // Memories ---------------------------------------------------------

    async fn create_memory(&self, memory: &Memory, table: &str) -> Result<Uuid> {
        // Memory + embedding are two tables; keep them atomic.
        self.manager
            .with_transaction(|conn| queries::create_memory(conn, memory, table))
    }

    async fn get_memory_by_id(&self, id: Uuid) -> Result<Option<Memory>> {
        self.manager
            .with_connection(|conn| queries::get_memory_by_id(conn, id))
    }

    async fn get_memories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Memory>> {
        self.manager
            .with_connection(|conn| queries::get_memories_by_ids(conn, ids))
    }

    async fn get_memories(&self, params: &GetMemoriesParams) -> Result<Vec<Memory>> {
        self.manager
            .with_connection(|conn| queries::get_memories(conn, params))
    }

    async fn count_memories(
        &self,
        room_id: Uuid,
        table: &str,
        unique_only: bool,
    ) -> Result<usize> {
        self.manager
            .with_connection(|conn| queries::count_memories(conn, room_id, table, unique_only))
    }

    async fn update_memory(&self, update: &MemoryUpdate) -> Result<bool> {
        self.manager
            .with_transaction(|conn| queries::update_memory(conn, update))
    }

    async fn delete_memory(&self, id: Uuid) -> Result<bool> {
        self.manager
            .with_transaction(|conn| queries::delete_memory(conn, id))
    }

    async fn delete_many_memories(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        // One transaction per chunk keeps statement parameter counts
        // bounded for arbitrarily large requests.
        for chunk in ids.chunks(MEMORY_DELETE_BATCH_SIZE) {
            self.manager
                .with_transaction(|conn| queries::delete_memories_chunk(conn, chunk))?;
        }
        Ok(())
    }

    async fn delete_all_memories(&self, room_id: Uuid, table: &str) -> Result<()> {
        self.manager
            .with_transaction(|conn| queries::delete_all_memories(conn, room_id, table))
    }

    async fn search_memories_by_embedding(
        &self,
        embedding: &[f32],
        params: &SearchMemoriesParams,
    ) -> Result<Vec<Memory>> {
        let agent_id = self.agent_id;
        self.manager.with_connection(|conn| {
            queries::search_memories_by_embedding(conn, agent_id, embedding, params)
        })
    }

    // Relationships ----------------------------------------------------

    async fn create_relationship(&self, relationship: &Relationship) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::create_relationship(conn, relationship))
    }

    async fn get_relationship(
        &self,
        source_entity_id: Uuid,
        target_entity_id: Uuid,
    ) -> Result<Option<Relationship>> {
        self.manager.with_connection(|conn| {
            queries::get_relationship(conn, source_entity_id, target_entity_id)
        })
    }

    async fn get_relationships(
        &self,
        entity_id: Uuid,
        tags: Option<&[String]>,
    ) -> Result<Vec<Relationship>> {
        self.manager
            .with_connection(|conn| queries::get_relationships(conn, entity_id, tags))
    }

    async fn update_relationship(&self, relationship: &Relationship) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::update_relationship(conn, relationship))
    }

    // Tasks ------------------------------------------------------------

    async fn create_task(&self, task: &Task) -> Result<Uuid> {
        self.manager
            .with_connection(|conn| queries::create_task(conn, task))
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        self.manager
            .with_connection(|conn| queries::get_task(conn, id))
    }

    async fn get_tasks(&self, params: &GetTasksParams) -> Result<Vec<Task>> {
        let agent_id = self.agent_id;
        self.manager
            .with_connection(|conn| queries::get_tasks(conn, agent_id, params))
    }

    async fn get_tasks_by_name(&self, name: &str) -> Result<Vec<Task>> {
        let agent_id = self.agent_id;
        self.manager
            .with_connection(|conn| queries::get_tasks_by_name(conn, agent_id, name))
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::update_task(conn, task))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::delete_task(conn, id))
    }

    // Logs -------------------------------------------------------------

    async fn log(&self, entry: &Log) -> Result<()> {
        self.manager
            .with_connection(|conn| queries::create_log(conn, entry))
    }

    async fn get_logs(&self, params: &GetLogsParams) -> Result<Vec<Log>> {
        self.manager
            .with_connection(|conn| queries::get_logs(conn, params))
    }

    async fn delete_log(&self, id: Uuid) -> Result<bool> {
        self.manager
            .with_connection(|conn| queries::delete_log(conn, id))
    }

    // Cache ------------------------------------------------------------

    async fn get_cache(&self, key: &str) -> Result<Option<Value>> {
        let agent_id = self.agent_id;
        self.manager
            .with_connection(|conn| queries::get_cache(conn, agent_id, key))
    }

    async fn set_cache(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool> {
        let agent_id = self.agent_id;
        self.manager
            .with_connection(|conn| queries::set_cache(conn, agent_id, key, &value, ttl))
    }

    async fn delete_cache(&self, key: &str) -> Result<bool> {
        let agent_id = self.agent_id;
        self.manager
            .with_connection(|conn| queries::delete_cache(conn, agent_id, key))
    }
}
