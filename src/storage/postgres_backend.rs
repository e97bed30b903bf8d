//! Networked PostgreSQL implementation of the adapter contract.
//!
//! Vectors live in native pgvector columns; similarity is computed by
//! the server with the cosine distance operator. Pool acquisition
//! failures count toward circuit-breaker accounting via the manager.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::adapter::{DatabaseAdapter, MEMORY_DELETE_BATCH_SIZE};
use super::postgres::PostgresManager;
use crate::embedding::{vector_literal, VectorDimension};
use crate::error::{Result, StoreError};
use crate::types::*;

/// Adapter over the pooled PostgreSQL backend.
pub struct PostgresAdapter {
    manager: Arc<PostgresManager>,
    agent_id: Uuid,
}

impl PostgresAdapter {
    pub fn new(manager: Arc<PostgresManager>, agent_id: Uuid) -> Self {
        Self { manager, agent_id }
    }

    fn track<T>(&self, result: std::result::Result<T, sqlx::Error>) -> Result<T> {
        self.manager.account(result.map_err(StoreError::from))
    }

    async fn agent_dimension(&self, agent_id: Uuid) -> Result<Option<usize>> {
        let pool = self.manager.pool()?;
        let row: Option<(Option<i32>,)> = self.track(
            sqlx::query_as("SELECT embedding_dimension FROM agents WHERE id = $1")
                .bind(agent_id)
                .fetch_optional(&pool)
                .await,
        )?;
        match row {
            None => Err(StoreError::InvalidInput(format!(
                "agent {} does not exist",
                agent_id
            ))),
            Some((dim,)) => Ok(dim.map(|d| d as usize)),
        }
    }
}

/// Parse a pgvector text literal (`[0.1,0.2]`) back into a vector.
fn parse_vector_text(text: &str) -> Result<Vec<f32>> {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| StoreError::InvalidInput(format!("bad vector literal: {}", e)))
        })
        .collect()
}

const COALESCED_VECTOR: &str = "COALESCE(e.dim_384::text, e.dim_512::text, e.dim_768::text, \
     e.dim_1024::text, e.dim_1536::text, e.dim_3072::text)";

fn agent_from_row(row: &PgRow) -> Result<Agent> {
    let dim: Option<i32> = row.try_get("embedding_dimension")?;
    Ok(Agent {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        settings: row.try_get("settings")?,
        embedding_dimension: dim.map(|d| d as usize),
        created_at: Some(row.try_get("created_at")?),
        updated_at: Some(row.try_get("updated_at")?),
    })
}

fn entity_from_row(row: &PgRow) -> Result<Entity> {
    let names: Value = row.try_get("names")?;
    Ok(Entity {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        names: serde_json::from_value(names)?,
        metadata: row.try_get("metadata")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

fn world_from_row(row: &PgRow) -> Result<World> {
    Ok(World {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        name: row.try_get("name")?,
        server_id: row.try_get("server_id")?,
        metadata: row.try_get("metadata")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

fn room_from_row(row: &PgRow) -> Result<Room> {
    let channel_type: String = row.try_get("type")?;
    Ok(Room {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        world_id: row.try_get("world_id")?,
        name: row.try_get("name")?,
        channel_type: channel_type
            .parse()
            .map_err(StoreError::InvalidInput)?,
        source: row.try_get("source")?,
        channel_id: row.try_get("channel_id")?,
        server_id: row.try_get("server_id")?,
        metadata: row.try_get("metadata")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

fn participant_from_row(row: &PgRow) -> Result<Participant> {
    let state: Option<String> = row.try_get("state")?;
    Ok(Participant {
        id: row.try_get("id")?,
        entity_id: row.try_get("entity_id")?,
        room_id: row.try_get("room_id")?,
        state: state.and_then(|s| s.parse().ok()),
    })
}

fn memory_from_row(row: &PgRow) -> Result<Memory> {
    let content: Value = row.try_get("content")?;
    Ok(Memory {
        id: Some(row.try_get("id")?),
        entity_id: row.try_get("entity_id")?,
        agent_id: row.try_get("agent_id")?,
        room_id: row.try_get("room_id")?,
        world_id: row.try_get("world_id")?,
        content: serde_json::from_value(content)?,
        embedding: None,
        unique: row.try_get("is_unique")?,
        metadata: row.try_get("metadata")?,
        created_at: Some(row.try_get("created_at")?),
        similarity: None,
    })
}

fn component_from_row(row: &PgRow) -> Result<Component> {
    Ok(Component {
        id: row.try_get("id")?,
        entity_id: row.try_get("entity_id")?,
        agent_id: row.try_get("agent_id")?,
        room_id: row.try_get("room_id")?,
        world_id: row.try_get("world_id")?,
        source_entity_id: row.try_get("source_entity_id")?,
        component_type: row.try_get("type")?,
        data: row.try_get("data")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

fn relationship_from_row(row: &PgRow) -> Result<Relationship> {
    let tags: Value = row.try_get("tags")?;
    Ok(Relationship {
        id: row.try_get("id")?,
        source_entity_id: row.try_get("source_entity_id")?,
        target_entity_id: row.try_get("target_entity_id")?,
        agent_id: row.try_get("agent_id")?,
        tags: serde_json::from_value(tags)?,
        metadata: row.try_get("metadata")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

fn task_from_row(row: &PgRow) -> Result<Task> {
    let tags: Value = row.try_get("tags")?;
    Ok(Task {
        id: Some(row.try_get("id")?),
        agent_id: row.try_get("agent_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        room_id: row.try_get("room_id")?,
        world_id: row.try_get("world_id")?,
        entity_id: row.try_get("entity_id")?,
        tags: serde_json::from_value(tags)?,
        metadata: row.try_get("metadata")?,
        updated_at: Some(row.try_get("updated_at")?),
    })
}

fn log_from_row(row: &PgRow) -> Result<Log> {
    Ok(Log {
        id: Some(row.try_get("id")?),
        entity_id: row.try_get("entity_id")?,
        room_id: row.try_get("room_id")?,
        log_type: row.try_get("type")?,
        body: row.try_get("body")?,
        created_at: Some(row.try_get("created_at")?),
    })
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    async fn close(&self) {
        self.manager.close().await;
    }

    // Agents -----------------------------------------------------------

    async fn create_agent(&self, agent: &Agent) -> Result<bool> {
        let pool = self.manager.pool()?;
        let result = self.track(
            sqlx::query(
                "INSERT INTO agents (id, name, enabled, settings, embedding_dimension)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(agent.id)
            .bind(&agent.name)
            .bind(agent.enabled)
            .bind(&agent.settings)
            .bind(agent.embedding_dimension.map(|d| d as i32))
            .execute(&pool)
            .await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_agent(&self, agent_id: Uuid) -> Result<Option<Agent>> {
        let pool = self.manager.pool()?;
        let row = self.track(
            sqlx::query("SELECT * FROM agents WHERE id = $1")
                .bind(agent_id)
                .fetch_optional(&pool)
                .await,
        )?;
        row.as_ref().map(agent_from_row).transpose()
    }

    async fn get_agents(&self) -> Result<Vec<Agent>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query("SELECT * FROM agents ORDER BY created_at")
                .fetch_all(&pool)
                .await,
        )?;
        rows.iter().map(agent_from_row).collect()
    }

    async fn update_agent(&self, agent: &Agent) -> Result<bool> {
        let pool = self.manager.pool()?;
        let result = self.track(
            sqlx::query(
                "UPDATE agents SET name = $2, enabled = $3, settings = $4, updated_at = now()
                 WHERE id = $1",
            )
            .bind(agent.id)
            .bind(&agent.name)
            .bind(agent.enabled)
            .bind(&agent.settings)
            .execute(&pool)
            .await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_agent(&self, agent_id: Uuid) -> Result<bool> {
        let mut tx = self.manager.begin().await?;

        let exists: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM agents WHERE id = $1")
            .bind(agent_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        if exists.is_none() {
            tx.rollback().await.map_err(StoreError::from)?;
            return Ok(false);
        }

        // Children before parents; any failure rolls the whole cascade
        // back when the transaction drops.
        let statements = [
            "DELETE FROM logs WHERE entity_id IN (SELECT id FROM entities WHERE agent_id = $1)
                OR room_id IN (SELECT id FROM rooms WHERE agent_id = $1)",
            "DELETE FROM embeddings WHERE memory_id IN (SELECT id FROM memories WHERE agent_id = $1)",
            "DELETE FROM memories WHERE agent_id = $1",
            "DELETE FROM components WHERE agent_id = $1
                OR entity_id IN (SELECT id FROM entities WHERE agent_id = $1)",
            "DELETE FROM participants WHERE entity_id IN (SELECT id FROM entities WHERE agent_id = $1)
                OR room_id IN (SELECT id FROM rooms WHERE agent_id = $1)",
            "DELETE FROM cache WHERE agent_id = $1",
            "DELETE FROM relationships WHERE agent_id = $1",
            "DELETE FROM tasks WHERE agent_id = $1",
            "DELETE FROM rooms WHERE agent_id = $1",
            "DELETE FROM entities WHERE agent_id = $1",
            "DELETE FROM worlds WHERE agent_id = $1",
        ];
        for statement in statements {
            sqlx::query(statement)
                .bind(agent_id)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }
        let deleted = sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(agent_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn ensure_embedding_dimension(&self, agent_id: Uuid, dimension: usize) -> Result<()> {
        VectorDimension::from_len(dimension)?;
        match self.agent_dimension(agent_id).await? {
            None => {
                let pool = self.manager.pool()?;
                self.track(
                    sqlx::query(
                        "UPDATE agents SET embedding_dimension = $2, updated_at = now()
                         WHERE id = $1 AND embedding_dimension IS NULL",
                    )
                    .bind(agent_id)
                    .bind(dimension as i32)
                    .execute(&pool)
                    .await,
                )?;
                Ok(())
            }
            Some(current) if current == dimension => Ok(()),
            Some(current) => Err(StoreError::DimensionChange {
                agent_id,
                current,
                requested: dimension,
            }),
        }
    }

    // Entities ---------------------------------------------------------

    async fn create_entities(&self, entities: &[Entity]) -> Result<bool> {
        if entities.is_empty() {
            return Ok(true);
        }
        let mut tx = self.manager.begin().await?;
        for entity in entities {
            sqlx::query(
                "INSERT INTO entities (id, agent_id, names, metadata) VALUES ($1, $2, $3, $4)",
            )
            .bind(entity.id)
            .bind(entity.agent_id)
            .bind(serde_json::to_value(&entity.names)?)
            .bind(&entity.metadata)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }
        tx.commit().await.map_err(StoreError::from)?;
        Ok(true)
    }

    async fn get_entities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query("SELECT * FROM entities WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&pool)
                .await,
        )?;
        rows.iter().map(entity_from_row).collect()
    }

    async fn get_entities_for_room(&self, room_id: Uuid) -> Result<Vec<Entity>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query(
                "SELECT e.* FROM participants p JOIN entities e ON e.id = p.entity_id
                 WHERE p.room_id = $1",
            )
            .bind(room_id)
            .fetch_all(&pool)
            .await,
        )?;
        rows.iter().map(entity_from_row).collect()
    }

    async fn update_entity(&self, entity: &Entity) -> Result<()> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query(
                "UPDATE entities SET names = $3, metadata = $4 WHERE id = $1 AND agent_id = $2",
            )
            .bind(entity.id)
            .bind(entity.agent_id)
            .bind(serde_json::to_value(&entity.names)?)
            .bind(&entity.metadata)
            .execute(&pool)
            .await,
        )?;
        Ok(())
    }

    async fn search_entities_by_name(
        &self,
        query: &str,
        agent_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query(
                "SELECT e.* FROM entities e
                 WHERE e.agent_id = $1 AND EXISTS (
                     SELECT 1 FROM jsonb_array_elements_text(e.names) AS n(name)
                     WHERE n.name ILIKE '%' || $2 || '%'
                 )
                 ORDER BY e.created_at DESC
                 LIMIT $3",
            )
            .bind(agent_id)
            .bind(query)
            .bind(limit as i64)
            .fetch_all(&pool)
            .await,
        )?;
        rows.iter().map(entity_from_row).collect()
    }

    // Worlds and rooms -------------------------------------------------

    async fn create_world(&self, world: &World) -> Result<Uuid> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query(
                "INSERT INTO worlds (id, agent_id, name, server_id, metadata)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(world.id)
            .bind(world.agent_id)
            .bind(&world.name)
            .bind(&world.server_id)
            .bind(&world.metadata)
            .execute(&pool)
            .await,
        )?;
        Ok(world.id)
    }

    async fn get_world(&self, world_id: Uuid) -> Result<Option<World>> {
        let pool = self.manager.pool()?;
        let row = self.track(
            sqlx::query("SELECT * FROM worlds WHERE id = $1")
                .bind(world_id)
                .fetch_optional(&pool)
                .await,
        )?;
        row.as_ref().map(world_from_row).transpose()
    }

    async fn get_all_worlds(&self) -> Result<Vec<World>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query("SELECT * FROM worlds WHERE agent_id = $1 ORDER BY created_at")
                .bind(self.agent_id)
                .fetch_all(&pool)
                .await,
        )?;
        rows.iter().map(world_from_row).collect()
    }

    async fn update_world(&self, world: &World) -> Result<()> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query(
                "UPDATE worlds SET name = $2, server_id = $3, metadata = $4 WHERE id = $1",
            )
            .bind(world.id)
            .bind(&world.name)
            .bind(&world.server_id)
            .bind(&world.metadata)
            .execute(&pool)
            .await,
        )?;
        Ok(())
    }

    async fn remove_world(&self, world_id: Uuid) -> Result<bool> {
        let mut tx = self.manager.begin().await?;
        let statements = [
            "DELETE FROM logs WHERE room_id IN (SELECT id FROM rooms WHERE world_id = $1)",
            "DELETE FROM embeddings WHERE memory_id IN (
                SELECT id FROM memories WHERE room_id IN (SELECT id FROM rooms WHERE world_id = $1))",
            "DELETE FROM memories WHERE room_id IN (SELECT id FROM rooms WHERE world_id = $1)",
            "DELETE FROM participants WHERE room_id IN (SELECT id FROM rooms WHERE world_id = $1)",
            "DELETE FROM components WHERE world_id = $1
                OR room_id IN (SELECT id FROM rooms WHERE world_id = $1)",
            "DELETE FROM rooms WHERE world_id = $1",
        ];
        for statement in statements {
            sqlx::query(statement)
                .bind(world_id)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }
        let deleted = sqlx::query("DELETE FROM worlds WHERE id = $1")
            .bind(world_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_rooms(&self, rooms: &[Room]) -> Result<Vec<Uuid>> {
        if rooms.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.manager.begin().await?;
        let mut ids = Vec::with_capacity(rooms.len());
        for room in rooms {
            sqlx::query(
                "INSERT INTO rooms (id, agent_id, world_id, name, type, source, channel_id, server_id, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(room.id)
            .bind(room.agent_id)
            .bind(room.world_id)
            .bind(&room.name)
            .bind(room.channel_type.to_string())
            .bind(&room.source)
            .bind(&room.channel_id)
            .bind(&room.server_id)
            .bind(&room.metadata)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
            ids.push(room.id);
        }
        tx.commit().await.map_err(StoreError::from)?;
        Ok(ids)
    }

    async fn get_rooms_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Room>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query("SELECT * FROM rooms WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&pool)
                .await,
        )?;
        rows.iter().map(room_from_row).collect()
    }

    async fn get_rooms_by_world(&self, world_id: Uuid) -> Result<Vec<Room>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query("SELECT * FROM rooms WHERE world_id = $1 ORDER BY created_at")
                .bind(world_id)
                .fetch_all(&pool)
                .await,
        )?;
        rows.iter().map(room_from_row).collect()
    }

    async fn update_room(&self, room: &Room) -> Result<()> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query(
                "UPDATE rooms SET world_id = $2, name = $3, type = $4, source = $5,
                     channel_id = $6, server_id = $7, metadata = $8
                 WHERE id = $1",
            )
            .bind(room.id)
            .bind(room.world_id)
            .bind(&room.name)
            .bind(room.channel_type.to_string())
            .bind(&room.source)
            .bind(&room.channel_id)
            .bind(&room.server_id)
            .bind(&room.metadata)
            .execute(&pool)
            .await,
        )?;
        Ok(())
    }

    async fn delete_room(&self, room_id: Uuid) -> Result<bool> {
        let mut tx = self.manager.begin().await?;
        let statements = [
            "DELETE FROM logs WHERE room_id = $1",
            "DELETE FROM embeddings WHERE memory_id IN (SELECT id FROM memories WHERE room_id = $1)",
            "DELETE FROM memories WHERE room_id = $1",
            "DELETE FROM participants WHERE room_id = $1",
            "DELETE FROM components WHERE room_id = $1",
        ];
        for statement in statements {
            sqlx::query(statement)
                .bind(room_id)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }
        let deleted = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(deleted.rows_affected() > 0)
    }

    // Participants -----------------------------------------------------

    async fn add_participants_room(&self, entity_ids: &[Uuid], room_id: Uuid) -> Result<bool> {
        if entity_ids.is_empty() {
            return Ok(true);
        }
        let mut tx = self.manager.begin().await?;
        for entity_id in entity_ids {
            sqlx::query(
                "INSERT INTO participants (id, entity_id, room_id) VALUES ($1, $2, $3)
                 ON CONFLICT (entity_id, room_id) DO NOTHING",
            )
            .bind(Uuid::new_v4())
            .bind(entity_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }
        tx.commit().await.map_err(StoreError::from)?;
        Ok(true)
    }

    async fn remove_participant(&self, entity_id: Uuid, room_id: Uuid) -> Result<bool> {
        let pool = self.manager.pool()?;
        let result = self.track(
            sqlx::query("DELETE FROM participants WHERE entity_id = $1 AND room_id = $2")
                .bind(entity_id)
                .bind(room_id)
                .execute(&pool)
                .await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_participants_for_room(&self, room_id: Uuid) -> Result<Vec<Participant>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query("SELECT * FROM participants WHERE room_id = $1")
                .bind(room_id)
                .fetch_all(&pool)
                .await,
        )?;
        rows.iter().map(participant_from_row).collect()
    }

    async fn get_rooms_for_participant(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        let pool = self.manager.pool()?;
        let rows: Vec<(Uuid,)> = self.track(
            sqlx::query_as("SELECT room_id FROM participants WHERE entity_id = $1")
                .bind(entity_id)
                .fetch_all(&pool)
                .await,
        )?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // Components -------------------------------------------------------

    async fn create_component(&self, component: &Component) -> Result<bool> {
        let pool = self.manager.pool()?;
        if let Some(room_id) = component.room_id {
            let exists: Option<(i32,)> = self.track(
                sqlx::query_as("SELECT 1 FROM rooms WHERE id = $1")
                    .bind(room_id)
                    .fetch_optional(&pool)
                    .await,
            )?;
            if exists.is_none() {
                return Err(StoreError::InvalidInput(format!(
                    "room {} does not exist; create the room before its components",
                    room_id
                )));
            }
        }
        self.track(
            sqlx::query(
                "INSERT INTO components (id, entity_id, agent_id, room_id, world_id, source_entity_id, type, data)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(component.id)
            .bind(component.entity_id)
            .bind(component.agent_id)
            .bind(component.room_id)
            .bind(component.world_id)
            .bind(component.source_entity_id)
            .bind(&component.component_type)
            .bind(&component.data)
            .execute(&pool)
            .await,
        )?;
        Ok(true)
    }

    async fn get_component(
        &self,
        entity_id: Uuid,
        component_type: &str,
        world_id: Option<Uuid>,
        source_entity_id: Option<Uuid>,
    ) -> Result<Option<Component>> {
        let pool = self.manager.pool()?;
        let row = self.track(
            sqlx::query(
                "SELECT * FROM components
                 WHERE entity_id = $1 AND type = $2
                   AND world_id IS NOT DISTINCT FROM $3
                   AND source_entity_id IS NOT DISTINCT FROM $4
                 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(entity_id)
            .bind(component_type)
            .bind(world_id)
            .bind(source_entity_id)
            .fetch_optional(&pool)
            .await,
        )?;
        row.as_ref().map(component_from_row).transpose()
    }

    async fn get_components(&self, entity_id: Uuid) -> Result<Vec<Component>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query("SELECT * FROM components WHERE entity_id = $1 ORDER BY created_at")
                .bind(entity_id)
                .fetch_all(&pool)
                .await,
        )?;
        rows.iter().map(component_from_row).collect()
    }

    async fn update_component(&self, component: &Component) -> Result<()> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query("UPDATE components SET data = $2 WHERE id = $1")
                .bind(component.id)
                .bind(&component.data)
                .execute(&pool)
                .await,
        )?;
        Ok(())
    }

    async fn delete_component(&self, component_id: Uuid) -> Result<bool> {
        let pool = self.manager.pool()?;
        let result = self.track(
            sqlx::query("DELETE FROM components WHERE id = $1")
                .bind(component_id)
                .execute(&pool)
                .await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    // Memories ---------------------------------------------------------

    async fn create_memory(&self, memory: &Memory, table: &str) -> Result<Uuid> {
        if let Some(metadata) = &memory.metadata {
            validate_memory_metadata(metadata)?;
        }

        // Entity-before-memory and room-before-memory, surfaced as
        // clear errors rather than raw FK violations.
        let pool = self.manager.pool()?;
        let entity_exists: Option<(i32,)> = self.track(
            sqlx::query_as("SELECT 1 FROM entities WHERE id = $1")
                .bind(memory.entity_id)
                .fetch_optional(&pool)
                .await,
        )?;
        if entity_exists.is_none() {
            return Err(StoreError::InvalidInput(format!(
                "entity {} does not exist; create the entity before its memories",
                memory.entity_id
            )));
        }
        let room_exists: Option<(i32,)> = self.track(
            sqlx::query_as("SELECT 1 FROM rooms WHERE id = $1")
                .bind(memory.room_id)
                .fetch_optional(&pool)
                .await,
        )?;
        if room_exists.is_none() {
            return Err(StoreError::InvalidInput(format!(
                "room {} does not exist; create the room before its memories",
                memory.room_id
            )));
        }

        // Pin the dimension before opening the transaction so an
        // invariant violation never starts a write.
        if let Some(embedding) = &memory.embedding {
            VectorDimension::from_len(embedding.len())?;
            match self.agent_dimension(memory.agent_id).await? {
                None => {
                    let pool = self.manager.pool()?;
                    self.track(
                        sqlx::query(
                            "UPDATE agents SET embedding_dimension = $2
                             WHERE id = $1 AND embedding_dimension IS NULL",
                        )
                        .bind(memory.agent_id)
                        .bind(embedding.len() as i32)
                        .execute(&pool)
                        .await,
                    )?;
                }
                Some(current) if current == embedding.len() => {}
                Some(current) => {
                    return Err(StoreError::DimensionChange {
                        agent_id: memory.agent_id,
                        current,
                        requested: embedding.len(),
                    });
                }
            }
        }

        let id = memory.id.unwrap_or_else(Uuid::new_v4);
        let mut tx = self.manager.begin().await?;

        sqlx::query(
            "INSERT INTO memories (id, type, entity_id, agent_id, room_id, world_id, content, metadata, is_unique)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(table)
        .bind(memory.entity_id)
        .bind(memory.agent_id)
        .bind(memory.room_id)
        .bind(memory.world_id)
        .bind(serde_json::to_value(&memory.content)?)
        .bind(&memory.metadata)
        .bind(memory.unique)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if let Some(embedding) = &memory.embedding {
            let class = VectorDimension::from_len(embedding.len())?;
            let sql = format!(
                "INSERT INTO embeddings (id, memory_id, {}) VALUES ($1, $2, $3::vector)",
                class.column()
            );
            sqlx::query(&sql)
                .bind(Uuid::new_v4())
                .bind(id)
                .bind(vector_literal(embedding))
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(id)
    }

    async fn get_memory_by_id(&self, id: Uuid) -> Result<Option<Memory>> {
        let pool = self.manager.pool()?;
        let sql = format!(
            "SELECT m.*, {} AS vec
             FROM memories m LEFT JOIN embeddings e ON e.memory_id = m.id
             WHERE m.id = $1",
            COALESCED_VECTOR
        );
        let row = self.track(
            sqlx::query(&sql).bind(id).fetch_optional(&pool).await,
        )?;
        row.map(|row| {
            let mut memory = memory_from_row(&row)?;
            let vec: Option<String> = row.try_get("vec")?;
            memory.embedding = vec.as_deref().map(parse_vector_text).transpose()?;
            Ok(memory)
        })
        .transpose()
    }

    async fn get_memories_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Memory>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.manager.pool()?;
        let sql = format!(
            "SELECT m.*, {} AS vec
             FROM memories m LEFT JOIN embeddings e ON e.memory_id = m.id
             WHERE m.id = ANY($1)",
            COALESCED_VECTOR
        );
        let rows = self.track(sqlx::query(&sql).bind(ids).fetch_all(&pool).await)?;
        rows.into_iter()
            .map(|row| {
                let mut memory = memory_from_row(&row)?;
                let vec: Option<String> = row.try_get("vec")?;
                memory.embedding = vec.as_deref().map(parse_vector_text).transpose()?;
                Ok(memory)
            })
            .collect()
    }

    async fn get_memories(&self, params: &GetMemoriesParams) -> Result<Vec<Memory>> {
        let pool = self.manager.pool()?;
        let mut sql = String::from("SELECT m.* FROM memories m WHERE m.type = $1");
        let mut idx = 1;
        if params.room_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.room_id = ${}", idx));
        }
        if params.entity_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.entity_id = ${}", idx));
        }
        if params.world_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.world_id = ${}", idx));
        }
        if params.unique == Some(true) {
            sql.push_str(" AND m.is_unique");
        }
        if params.start.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.created_at >= ${}", idx));
        }
        if params.end.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.created_at <= ${}", idx));
        }
        sql.push_str(" ORDER BY m.created_at DESC");
        if params.count.is_some() {
            idx += 1;
            sql.push_str(&format!(" LIMIT ${}", idx));
            if params.offset.is_some() {
                idx += 1;
                sql.push_str(&format!(" OFFSET ${}", idx));
            }
        }

        let mut query = sqlx::query(&sql).bind(&params.table);
        if let Some(room_id) = params.room_id {
            query = query.bind(room_id);
        }
        if let Some(entity_id) = params.entity_id {
            query = query.bind(entity_id);
        }
        if let Some(world_id) = params.world_id {
            query = query.bind(world_id);
        }
        if let Some(start) = params.start {
            query = query.bind(start);
        }
        if let Some(end) = params.end {
            query = query.bind(end);
        }
        if let Some(count) = params.count {
            query = query.bind(count as i64);
            if let Some(offset) = params.offset {
                query = query.bind(offset as i64);
            }
        }

        let rows = self.track(query.fetch_all(&pool).await)?;
        rows.iter().map(memory_from_row).collect()
    }

    async fn count_memories(
        &self,
        room_id: Uuid,
        table: &str,
        unique_only: bool,
    ) -> Result<usize> {
        let pool = self.manager.pool()?;
        let sql = if unique_only {
            "SELECT COUNT(*) FROM memories WHERE room_id = $1 AND type = $2 AND is_unique"
        } else {
            "SELECT COUNT(*) FROM memories WHERE room_id = $1 AND type = $2"
        };
        let count: (i64,) = self.track(
            sqlx::query_as(sql)
                .bind(room_id)
                .bind(table)
                .fetch_one(&pool)
                .await,
        )?;
        Ok(count.0 as usize)
    }

    async fn update_memory(&self, update: &MemoryUpdate) -> Result<bool> {
        if let Some(metadata) = &update.metadata {
            validate_memory_metadata(metadata)?;
        }
        let pool = self.manager.pool()?;
        let exists: Option<(i32,)> = self.track(
            sqlx::query_as("SELECT 1 FROM memories WHERE id = $1")
                .bind(update.id)
                .fetch_optional(&pool)
                .await,
        )?;
        if exists.is_none() {
            return Ok(false);
        }

        // Full-replace semantics per submitted object.
        if let Some(content) = &update.content {
            self.track(
                sqlx::query("UPDATE memories SET content = $2 WHERE id = $1")
                    .bind(update.id)
                    .bind(serde_json::to_value(content)?)
                    .execute(&pool)
                    .await,
            )?;
        }
        if let Some(metadata) = &update.metadata {
            self.track(
                sqlx::query("UPDATE memories SET metadata = $2 WHERE id = $1")
                    .bind(update.id)
                    .bind(metadata)
                    .execute(&pool)
                    .await,
            )?;
        }
        Ok(true)
    }

    async fn delete_memory(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.manager.begin().await?;
        sqlx::query("DELETE FROM embeddings WHERE memory_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        let deleted = sqlx::query("DELETE FROM memories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn delete_many_memories(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        for chunk in ids.chunks(MEMORY_DELETE_BATCH_SIZE) {
            let mut tx = self.manager.begin().await?;
            sqlx::query("DELETE FROM embeddings WHERE memory_id = ANY($1)")
                .bind(chunk)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
            sqlx::query("DELETE FROM memories WHERE id = ANY($1)")
                .bind(chunk)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
            tx.commit().await.map_err(StoreError::from)?;
        }
        Ok(())
    }

    async fn delete_all_memories(&self, room_id: Uuid, table: &str) -> Result<()> {
        let mut tx = self.manager.begin().await?;
        sqlx::query(
            "DELETE FROM embeddings WHERE memory_id IN (
                SELECT id FROM memories WHERE room_id = $1 AND type = $2)",
        )
        .bind(room_id)
        .bind(table)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;
        sqlx::query("DELETE FROM memories WHERE room_id = $1 AND type = $2")
            .bind(room_id)
            .bind(table)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn search_memories_by_embedding(
        &self,
        embedding: &[f32],
        params: &SearchMemoriesParams,
    ) -> Result<Vec<Memory>> {
        let class = VectorDimension::from_len(embedding.len())?;
        if let Some(current) = self.agent_dimension(self.agent_id).await? {
            if current != embedding.len() {
                return Err(StoreError::InvalidInput(format!(
                    "query embedding has {} dimensions but agent {} is pinned to {}",
                    embedding.len(),
                    self.agent_id,
                    current
                )));
            }
        }

        let col = class.column();
        let mut sql = format!(
            "SELECT m.*, e.{col}::text AS vec, 1 - (e.{col} <=> $1::vector) AS similarity
             FROM memories m JOIN embeddings e ON e.memory_id = m.id
             WHERE e.{col} IS NOT NULL AND m.type = $2 AND m.agent_id = $3",
            col = col
        );
        let mut idx = 3;
        if params.room_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.room_id = ${}", idx));
        }
        if params.world_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.world_id = ${}", idx));
        }
        if params.entity_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND m.entity_id = ${}", idx));
        }
        if params.unique == Some(true) {
            sql.push_str(" AND m.is_unique");
        }
        idx += 1;
        sql.push_str(&format!(
            " AND 1 - (e.{col} <=> $1::vector) >= ${}",
            idx,
            col = col
        ));
        idx += 1;
        sql.push_str(&format!(" ORDER BY similarity DESC LIMIT ${}", idx));

        let pool = self.manager.pool()?;
        let mut query = sqlx::query(&sql)
            .bind(vector_literal(embedding))
            .bind(&params.table)
            .bind(self.agent_id);
        if let Some(room_id) = params.room_id {
            query = query.bind(room_id);
        }
        if let Some(world_id) = params.world_id {
            query = query.bind(world_id);
        }
        if let Some(entity_id) = params.entity_id {
            query = query.bind(entity_id);
        }
        query = query
            .bind(params.match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD) as f64)
            .bind(params.count.unwrap_or(DEFAULT_SEARCH_COUNT) as i64);

        let rows = self.track(query.fetch_all(&pool).await)?;
        rows.into_iter()
            .map(|row| {
                let mut memory = memory_from_row(&row)?;
                let vec: String = row.try_get("vec")?;
                memory.embedding = Some(parse_vector_text(&vec)?);
                let similarity: f64 = row.try_get("similarity")?;
                memory.similarity = Some(similarity as f32);
                Ok(memory)
            })
            .collect()
    }

    // Relationships ----------------------------------------------------

    async fn create_relationship(&self, relationship: &Relationship) -> Result<bool> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query(
                "INSERT INTO relationships (id, source_entity_id, target_entity_id, agent_id, tags, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(relationship.id)
            .bind(relationship.source_entity_id)
            .bind(relationship.target_entity_id)
            .bind(relationship.agent_id)
            .bind(serde_json::to_value(&relationship.tags)?)
            .bind(&relationship.metadata)
            .execute(&pool)
            .await,
        )?;
        Ok(true)
    }

    async fn get_relationship(
        &self,
        source_entity_id: Uuid,
        target_entity_id: Uuid,
    ) -> Result<Option<Relationship>> {
        let pool = self.manager.pool()?;
        let row = self.track(
            sqlx::query(
                "SELECT * FROM relationships
                 WHERE source_entity_id = $1 AND target_entity_id = $2",
            )
            .bind(source_entity_id)
            .bind(target_entity_id)
            .fetch_optional(&pool)
            .await,
        )?;
        row.as_ref().map(relationship_from_row).transpose()
    }

    async fn get_relationships(
        &self,
        entity_id: Uuid,
        tags: Option<&[String]>,
    ) -> Result<Vec<Relationship>> {
        let pool = self.manager.pool()?;
        let rows = match tags {
            Some(tags) if !tags.is_empty() => self.track(
                sqlx::query(
                    "SELECT * FROM relationships
                     WHERE (source_entity_id = $1 OR target_entity_id = $1)
                       AND tags @> $2::jsonb",
                )
                .bind(entity_id)
                .bind(serde_json::to_value(tags)?)
                .fetch_all(&pool)
                .await,
            )?,
            _ => self.track(
                sqlx::query(
                    "SELECT * FROM relationships
                     WHERE source_entity_id = $1 OR target_entity_id = $1",
                )
                .bind(entity_id)
                .fetch_all(&pool)
                .await,
            )?,
        };
        rows.iter().map(relationship_from_row).collect()
    }

    async fn update_relationship(&self, relationship: &Relationship) -> Result<()> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query("UPDATE relationships SET tags = $2, metadata = $3 WHERE id = $1")
                .bind(relationship.id)
                .bind(serde_json::to_value(&relationship.tags)?)
                .bind(&relationship.metadata)
                .execute(&pool)
                .await,
        )?;
        Ok(())
    }

    // Tasks ------------------------------------------------------------

    async fn create_task(&self, task: &Task) -> Result<Uuid> {
        let pool = self.manager.pool()?;
        let id = task.id.unwrap_or_else(Uuid::new_v4);
        self.track(
            sqlx::query(
                "INSERT INTO tasks (id, agent_id, name, description, room_id, world_id, entity_id, tags, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(id)
            .bind(task.agent_id)
            .bind(&task.name)
            .bind(&task.description)
            .bind(task.room_id)
            .bind(task.world_id)
            .bind(task.entity_id)
            .bind(serde_json::to_value(&task.tags)?)
            .bind(&task.metadata)
            .execute(&pool)
            .await,
        )?;
        Ok(id)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let pool = self.manager.pool()?;
        let row = self.track(
            sqlx::query("SELECT * FROM tasks WHERE id = $1")
                .bind(id)
                .fetch_optional(&pool)
                .await,
        )?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn get_tasks(&self, params: &GetTasksParams) -> Result<Vec<Task>> {
        let pool = self.manager.pool()?;
        let mut sql = String::from("SELECT * FROM tasks WHERE agent_id = $1");
        let mut idx = 1;
        if params.room_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND room_id = ${}", idx));
        }
        if params.entity_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND entity_id = ${}", idx));
        }
        if params.tags.as_ref().map(|t| !t.is_empty()).unwrap_or(false) {
            idx += 1;
            sql.push_str(&format!(" AND tags @> ${}::jsonb", idx));
        }
        sql.push_str(" ORDER BY updated_at DESC");

        let mut query = sqlx::query(&sql).bind(self.agent_id);
        if let Some(room_id) = params.room_id {
            query = query.bind(room_id);
        }
        if let Some(entity_id) = params.entity_id {
            query = query.bind(entity_id);
        }
        if let Some(tags) = &params.tags {
            if !tags.is_empty() {
                query = query.bind(serde_json::to_value(tags)?);
            }
        }
        let rows = self.track(query.fetch_all(&pool).await)?;
        rows.iter().map(task_from_row).collect()
    }

    async fn get_tasks_by_name(&self, name: &str) -> Result<Vec<Task>> {
        let pool = self.manager.pool()?;
        let rows = self.track(
            sqlx::query(
                "SELECT * FROM tasks WHERE agent_id = $1 AND name = $2 ORDER BY updated_at DESC",
            )
            .bind(self.agent_id)
            .bind(name)
            .fetch_all(&pool)
            .await,
        )?;
        rows.iter().map(task_from_row).collect()
    }

    async fn update_task(&self, task: &Task) -> Result<()> {
        let id = task
            .id
            .ok_or_else(|| StoreError::InvalidInput("task update requires an id".into()))?;
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query(
                "UPDATE tasks SET name = $2, description = $3, tags = $4, metadata = $5, updated_at = now()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(&task.name)
            .bind(&task.description)
            .bind(serde_json::to_value(&task.tags)?)
            .bind(&task.metadata)
            .execute(&pool)
            .await,
        )?;
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool> {
        let pool = self.manager.pool()?;
        let result = self.track(
            sqlx::query("DELETE FROM tasks WHERE id = $1")
                .bind(id)
                .execute(&pool)
                .await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    // Logs -------------------------------------------------------------

    async fn log(&self, entry: &Log) -> Result<()> {
        let pool = self.manager.pool()?;
        self.track(
            sqlx::query(
                "INSERT INTO logs (id, entity_id, room_id, type, body) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(entry.id.unwrap_or_else(Uuid::new_v4))
            .bind(entry.entity_id)
            .bind(entry.room_id)
            .bind(&entry.log_type)
            .bind(&entry.body)
            .execute(&pool)
            .await,
        )?;
        Ok(())
    }

    async fn get_logs(&self, params: &GetLogsParams) -> Result<Vec<Log>> {
        let pool = self.manager.pool()?;
        let mut sql = String::from("SELECT * FROM logs WHERE entity_id = $1");
        let mut idx = 1;
        if params.room_id.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND room_id = ${}", idx));
        }
        if params.log_type.is_some() {
            idx += 1;
            sql.push_str(&format!(" AND type = ${}", idx));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if params.count.is_some() {
            idx += 1;
            sql.push_str(&format!(" LIMIT ${}", idx));
            if params.offset.is_some() {
                idx += 1;
                sql.push_str(&format!(" OFFSET ${}", idx));
            }
        }

        let mut query = sqlx::query(&sql).bind(params.entity_id);
        if let Some(room_id) = params.room_id {
            query = query.bind(room_id);
        }
        if let Some(log_type) = &params.log_type {
            query = query.bind(log_type);
        }
        if let Some(count) = params.count {
            query = query.bind(count as i64);
            if let Some(offset) = params.offset {
                query = query.bind(offset as i64);
            }
        }
        let rows = self.track(query.fetch_all(&pool).await)?;
        rows.iter().map(log_from_row).collect()
    }

    async fn delete_log(&self, id: Uuid) -> Result<bool> {
        let pool = self.manager.pool()?;
        let result = self.track(
            sqlx::query("DELETE FROM logs WHERE id = $1")
                .bind(id)
                .execute(&pool)
                .await,
        )?;
        Ok(result.rows_affected() > 0)
    }

    // Cache ------------------------------------------------------------

    async fn get_cache(&self, key: &str) -> Result<Option<Value>> {
        let pool = self.manager.pool()?;
        let row: Option<(Value, Option<chrono::DateTime<chrono::Utc>>)> = self.track(
            sqlx::query_as("SELECT value, expires_at FROM cache WHERE key = $1 AND agent_id = $2")
                .bind(key)
                .bind(self.agent_id)
                .fetch_optional(&pool)
                .await,
        )?;
        let Some((value, expires_at)) = row else {
            return Ok(None);
        };
        if let Some(expires_at) = expires_at {
            if expires_at <= chrono::Utc::now() {
                // Lazy expiry: drop the row on read.
                self.track(
                    sqlx::query("DELETE FROM cache WHERE key = $1 AND agent_id = $2")
                        .bind(key)
                        .bind(self.agent_id)
                        .execute(&pool)
                        .await,
                )?;
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    async fn set_cache(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<bool> {
        let pool = self.manager.pool()?;
        let expires_at = ttl
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| chrono::Utc::now() + d);
        self.track(
            sqlx::query(
                "INSERT INTO cache (key, agent_id, value, expires_at) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (key, agent_id) DO UPDATE SET
                     value = EXCLUDED.value,
                     expires_at = EXCLUDED.expires_at,
                     created_at = now()",
            )
            .bind(key)
            .bind(self.agent_id)
            .bind(&value)
            .bind(expires_at)
            .execute(&pool)
            .await,
        )?;
        Ok(true)
    }

    async fn delete_cache(&self, key: &str) -> Result<bool> {
        let pool = self.manager.pool()?;
        let result = self.track(
            sqlx::query("DELETE FROM cache WHERE key = $1 AND agent_id = $2")
                .bind(key)
                .bind(self.agent_id)
                .execute(&pool)
                .await,
        )?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector_text() {
        assert_eq!(parse_vector_text("[1,2.5,-3]").unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(parse_vector_text("[]").unwrap(), Vec::<f32>::new());
        assert!(parse_vector_text("[a,b]").is_err());
    }
}
