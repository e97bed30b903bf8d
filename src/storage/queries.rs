//! SQL for the embedded backend.
//!
//! Free functions over `&Connection`, composed by the adapter behind
//! the connection manager's `with_connection`/`with_transaction`.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use uuid::Uuid;

use crate::embedding::{blob_to_vector, cosine_similarity, vector_to_blob, VectorDimension};
use crate::error::{Result, StoreError};
use crate::types::*;

fn conv_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}

fn get_uuid(row: &Row, col: &str) -> rusqlite::Result<Uuid> {
    let s: String = row.get(col)?;
    Uuid::parse_str(&s).map_err(conv_err)
}

fn get_uuid_opt(row: &Row, col: &str) -> rusqlite::Result<Option<Uuid>> {
    let s: Option<String> = row.get(col)?;
    s.map(|s| Uuid::parse_str(&s).map_err(conv_err)).transpose()
}

fn get_json(row: &Row, col: &str) -> rusqlite::Result<Value> {
    let s: String = row.get(col)?;
    serde_json::from_str(&s).map_err(conv_err)
}

fn get_json_opt(row: &Row, col: &str) -> rusqlite::Result<Option<Value>> {
    let s: Option<String> = row.get(col)?;
    s.map(|s| serde_json::from_str(&s).map_err(conv_err))
        .transpose()
}

fn get_ts(row: &Row, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(col)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conv_err)
}

fn get_ts_opt(row: &Row, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(col)?;
    s.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(conv_err)
    })
    .transpose()
}

fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

// ============================================================================
// Row mappers
// ============================================================================

fn agent_from_row(row: &Row) -> rusqlite::Result<Agent> {
    let dim: Option<i64> = row.get("embedding_dimension")?;
    Ok(Agent {
        id: get_uuid(row, "id")?,
        name: row.get("name")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        settings: get_json(row, "settings")?,
        embedding_dimension: dim.map(|d| d as usize),
        created_at: Some(get_ts(row, "created_at")?),
        updated_at: Some(get_ts(row, "updated_at")?),
    })
}

fn entity_from_row(row: &Row) -> rusqlite::Result<Entity> {
    let names: Value = get_json(row, "names")?;
    Ok(Entity {
        id: get_uuid(row, "id")?,
        agent_id: get_uuid(row, "agent_id")?,
        names: serde_json::from_value(names).map_err(conv_err)?,
        metadata: get_json(row, "metadata")?,
        created_at: Some(get_ts(row, "created_at")?),
    })
}

fn world_from_row(row: &Row) -> rusqlite::Result<World> {
    Ok(World {
        id: get_uuid(row, "id")?,
        agent_id: get_uuid(row, "agent_id")?,
        name: row.get("name")?,
        server_id: row.get("server_id")?,
        metadata: get_json(row, "metadata")?,
        created_at: Some(get_ts(row, "created_at")?),
    })
}

fn room_from_row(row: &Row) -> rusqlite::Result<Room> {
    let channel_type: String = row.get("type")?;
    Ok(Room {
        id: get_uuid(row, "id")?,
        agent_id: get_uuid(row, "agent_id")?,
        world_id: get_uuid_opt(row, "world_id")?,
        name: row.get("name")?,
        channel_type: channel_type
            .parse()
            .map_err(|e: String| conv_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?,
        source: row.get("source")?,
        channel_id: row.get("channel_id")?,
        server_id: row.get("server_id")?,
        metadata: get_json(row, "metadata")?,
        created_at: Some(get_ts(row, "created_at")?),
    })
}

fn participant_from_row(row: &Row) -> rusqlite::Result<Participant> {
    let state: Option<String> = row.get("state")?;
    Ok(Participant {
        id: get_uuid(row, "id")?,
        entity_id: get_uuid(row, "entity_id")?,
        room_id: get_uuid(row, "room_id")?,
        state: state.and_then(|s| s.parse().ok()),
    })
}

fn memory_from_row(row: &Row) -> rusqlite::Result<Memory> {
    let content: Value = get_json(row, "content")?;
    Ok(Memory {
        id: Some(get_uuid(row, "id")?),
        entity_id: get_uuid(row, "entity_id")?,
        agent_id: get_uuid(row, "agent_id")?,
        room_id: get_uuid(row, "room_id")?,
        world_id: get_uuid_opt(row, "world_id")?,
        content: serde_json::from_value(content).map_err(conv_err)?,
        embedding: None,
        unique: row.get::<_, i64>("is_unique")? != 0,
        metadata: get_json_opt(row, "metadata")?,
        created_at: Some(get_ts(row, "created_at")?),
        similarity: None,
    })
}

fn component_from_row(row: &Row) -> rusqlite::Result<Component> {
    Ok(Component {
        id: get_uuid(row, "id")?,
        entity_id: get_uuid(row, "entity_id")?,
        agent_id: get_uuid(row, "agent_id")?,
        room_id: get_uuid_opt(row, "room_id")?,
        world_id: get_uuid_opt(row, "world_id")?,
        source_entity_id: get_uuid_opt(row, "source_entity_id")?,
        component_type: row.get("type")?,
        data: get_json(row, "data")?,
        created_at: Some(get_ts(row, "created_at")?),
    })
}

fn relationship_from_row(row: &Row) -> rusqlite::Result<Relationship> {
    let tags: Value = get_json(row, "tags")?;
    Ok(Relationship {
        id: get_uuid(row, "id")?,
        source_entity_id: get_uuid(row, "source_entity_id")?,
        target_entity_id: get_uuid(row, "target_entity_id")?,
        agent_id: get_uuid(row, "agent_id")?,
        tags: serde_json::from_value(tags).map_err(conv_err)?,
        metadata: get_json(row, "metadata")?,
        created_at: Some(get_ts(row, "created_at")?),
    })
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let tags: Value = get_json(row, "tags")?;
    Ok(Task {
        id: Some(get_uuid(row, "id")?),
        agent_id: get_uuid(row, "agent_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        room_id: get_uuid_opt(row, "room_id")?,
        world_id: get_uuid_opt(row, "world_id")?,
        entity_id: get_uuid_opt(row, "entity_id")?,
        tags: serde_json::from_value(tags).map_err(conv_err)?,
        metadata: get_json(row, "metadata")?,
        updated_at: Some(get_ts(row, "updated_at")?),
    })
}

fn log_from_row(row: &Row) -> rusqlite::Result<Log> {
    Ok(Log {
        id: Some(get_uuid(row, "id")?),
        entity_id: get_uuid(row, "entity_id")?,
        room_id: get_uuid(row, "room_id")?,
        log_type: row.get("type")?,
        body: get_json(row, "body")?,
        created_at: Some(get_ts(row, "created_at")?),
    })
}

// ============================================================================
// Agents
// ============================================================================

pub fn create_agent(conn: &Connection, agent: &Agent) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "INSERT INTO agents (id, name, enabled, settings, embedding_dimension, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            agent.id.to_string(),
            agent.name,
            agent.enabled as i64,
            serde_json::to_string(&agent.settings)?,
            agent.embedding_dimension.map(|d| d as i64),
            now,
        ],
    )?;
    Ok(changed > 0)
}

pub fn get_agent(conn: &Connection, agent_id: Uuid) -> Result<Option<Agent>> {
    let agent = conn
        .query_row(
            "SELECT id, name, enabled, settings, embedding_dimension, created_at, updated_at
             FROM agents WHERE id = ?1",
            [agent_id.to_string()],
            agent_from_row,
        )
        .optional()?;
    Ok(agent)
}

pub fn get_agents(conn: &Connection) -> Result<Vec<Agent>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, enabled, settings, embedding_dimension, created_at, updated_at
         FROM agents ORDER BY created_at",
    )?;
    let agents = stmt
        .query_map([], agent_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(agents)
}

pub fn update_agent(conn: &Connection, agent: &Agent) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE agents SET name = ?2, enabled = ?3, settings = ?4, updated_at = ?5 WHERE id = ?1",
        params![
            agent.id.to_string(),
            agent.name,
            agent.enabled as i64,
            serde_json::to_string(&agent.settings)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(changed > 0)
}

/// Stored embedding dimension for an agent. Errors if the agent does
/// not exist.
pub fn agent_dimension(conn: &Connection, agent_id: Uuid) -> Result<Option<usize>> {
    let dim: Option<Option<i64>> = conn
        .query_row(
            "SELECT embedding_dimension FROM agents WHERE id = ?1",
            [agent_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match dim {
        None => Err(StoreError::InvalidInput(format!(
            "agent {} does not exist",
            agent_id
        ))),
        Some(d) => Ok(d.map(|v| v as usize)),
    }
}

pub fn ensure_embedding_dimension(
    conn: &Connection,
    agent_id: Uuid,
    dimension: usize,
) -> Result<()> {
    VectorDimension::from_len(dimension)?;
    match agent_dimension(conn, agent_id)? {
        None => {
            conn.execute(
                "UPDATE agents SET embedding_dimension = ?2, updated_at = ?3 WHERE id = ?1",
                params![
                    agent_id.to_string(),
                    dimension as i64,
                    Utc::now().to_rfc3339()
                ],
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

/// Delete an agent and everything reachable from it, children first.
///
/// Runs on a transaction connection; the caller owns commit/rollback.
/// Explicit deletes rather than `ON DELETE CASCADE` so the zero-orphans
/// guarantee holds even for plugin tables authored without FK actions.
pub fn delete_agent_cascade(conn: &Connection, agent_id: Uuid) -> Result<bool> {
    let id = agent_id.to_string();
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM agents WHERE id = ?1", [&id], |row| {
            row.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }

    conn.execute(
        "DELETE FROM logs WHERE entity_id IN (SELECT id FROM entities WHERE agent_id = ?1)
            OR room_id IN (SELECT id FROM rooms WHERE agent_id = ?1)",
        [&id],
    )?;
    conn.execute(
        "DELETE FROM embeddings WHERE memory_id IN (SELECT id FROM memories WHERE agent_id = ?1)",
        [&id],
    )?;
    conn.execute("DELETE FROM memories WHERE agent_id = ?1", [&id])?;
    conn.execute(
        "DELETE FROM components WHERE agent_id = ?1
            OR entity_id IN (SELECT id FROM entities WHERE agent_id = ?1)",
        [&id],
    )?;
    conn.execute(
        "DELETE FROM participants WHERE entity_id IN (SELECT id FROM entities WHERE agent_id = ?1)
            OR room_id IN (SELECT id FROM rooms WHERE agent_id = ?1)",
        [&id],
    )?;
    conn.execute("DELETE FROM cache WHERE agent_id = ?1", [&id])?;
    conn.execute("DELETE FROM relationships WHERE agent_id = ?1", [&id])?;
    conn.execute("DELETE FROM tasks WHERE agent_id = ?1", [&id])?;
    conn.execute("DELETE FROM rooms WHERE agent_id = ?1", [&id])?;
    conn.execute("DELETE FROM entities WHERE agent_id = ?1", [&id])?;
    conn.execute("DELETE FROM worlds WHERE agent_id = ?1", [&id])?;
    let deleted = conn.execute("DELETE FROM agents WHERE id = ?1", [&id])?;
    Ok(deleted > 0)
}

// ============================================================================
// Entities
// ============================================================================

pub fn create_entities(conn: &Connection, entities: &[Entity]) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    for entity in entities {
        conn.execute(
            "INSERT INTO entities (id, agent_id, names, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entity.id.to_string(),
                entity.agent_id.to_string(),
                serde_json::to_string(&entity.names)?,
                serde_json::to_string(&entity.metadata)?,
                entity
                    .created_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| now.clone()),
            ],
        )?;
    }
    Ok(true)
}

pub fn get_entities_by_ids(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Entity>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, agent_id, names, metadata, created_at FROM entities WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let entities = stmt
        .query_map(
            params_from_iter(ids.iter().map(|id| id.to_string())),
            entity_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entities)
}

pub fn get_entities_for_room(conn: &Connection, room_id: Uuid) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.agent_id, e.names, e.metadata, e.created_at
         FROM participants p JOIN entities e ON e.id = p.entity_id
         WHERE p.room_id = ?1",
    )?;
    let entities = stmt
        .query_map([room_id.to_string()], entity_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entities)
}

pub fn update_entity(conn: &Connection, entity: &Entity) -> Result<()> {
    conn.execute(
        "UPDATE entities SET names = ?2, metadata = ?3 WHERE id = ?1 AND agent_id = ?4",
        params![
            entity.id.to_string(),
            serde_json::to_string(&entity.names)?,
            serde_json::to_string(&entity.metadata)?,
            entity.agent_id.to_string(),
        ],
    )?;
    Ok(())
}

pub fn search_entities_by_name(
    conn: &Connection,
    query: &str,
    agent_id: Uuid,
    limit: usize,
) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.agent_id, e.names, e.metadata, e.created_at
         FROM entities e
         WHERE e.agent_id = ?1 AND EXISTS (
             SELECT 1 FROM json_each(e.names)
             WHERE lower(json_each.value) LIKE '%' || lower(?2) || '%'
         )
         ORDER BY e.created_at DESC
         LIMIT ?3",
    )?;
    let entities = stmt
        .query_map(
            params![agent_id.to_string(), query, limit as i64],
            entity_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entities)
}

// ============================================================================
// Worlds
// ============================================================================

pub fn create_world(conn: &Connection, world: &World) -> Result<Uuid> {
    conn.execute(
        "INSERT INTO worlds (id, agent_id, name, server_id, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            world.id.to_string(),
            world.agent_id.to_string(),
            world.name,
            world.server_id,
            serde_json::to_string(&world.metadata)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(world.id)
}

pub fn get_world(conn: &Connection, world_id: Uuid) -> Result<Option<World>> {
    let world = conn
        .query_row(
            "SELECT id, agent_id, name, server_id, metadata, created_at FROM worlds WHERE id = ?1",
            [world_id.to_string()],
            world_from_row,
        )
        .optional()?;
    Ok(world)
}

pub fn get_all_worlds(conn: &Connection, agent_id: Uuid) -> Result<Vec<World>> {
    let mut stmt = conn.prepare(
        "SELECT id, agent_id, name, server_id, metadata, created_at
         FROM worlds WHERE agent_id = ?1 ORDER BY created_at",
    )?;
    let worlds = stmt
        .query_map([agent_id.to_string()], world_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(worlds)
}

pub fn update_world(conn: &Connection, world: &World) -> Result<()> {
    conn.execute(
        "UPDATE worlds SET name = ?2, server_id = ?3, metadata = ?4 WHERE id = ?1",
        params![
            world.id.to_string(),
            world.name,
            world.server_id,
            serde_json::to_string(&world.metadata)?,
        ],
    )?;
    Ok(())
}

/// Remove a world and everything scoped to it: room contents first,
/// then rooms, then world-scoped components, then the world itself.
pub fn remove_world_cascade(conn: &Connection, world_id: Uuid) -> Result<bool> {
    let id = world_id.to_string();
    conn.execute(
        "DELETE FROM logs WHERE room_id IN (SELECT id FROM rooms WHERE world_id = ?1)",
        [&id],
    )?;
    conn.execute(
        "DELETE FROM embeddings WHERE memory_id IN (
            SELECT id FROM memories WHERE room_id IN (SELECT id FROM rooms WHERE world_id = ?1))",
        [&id],
    )?;
    conn.execute(
        "DELETE FROM memories WHERE room_id IN (SELECT id FROM rooms WHERE world_id = ?1)",
        [&id],
    )?;
    conn.execute(
        "DELETE FROM participants WHERE room_id IN (SELECT id FROM rooms WHERE world_id = ?1)",
        [&id],
    )?;
    conn.execute(
        "DELETE FROM components WHERE world_id = ?1
            OR room_id IN (SELECT id FROM rooms WHERE world_id = ?1)",
        [&id],
    )?;
    conn.execute("DELETE FROM rooms WHERE world_id = ?1", [&id])?;
    let deleted = conn.execute("DELETE FROM worlds WHERE id = ?1", [&id])?;
    Ok(deleted > 0)
}

// ============================================================================
// Rooms
// ============================================================================

pub fn create_rooms(conn: &Connection, rooms: &[Room]) -> Result<Vec<Uuid>> {
    let now = Utc::now().to_rfc3339();
    let mut ids = Vec::with_capacity(rooms.len());
    for room in rooms {
        conn.execute(
            "INSERT INTO rooms (id, agent_id, world_id, name, type, source, channel_id, server_id, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                room.id.to_string(),
                room.agent_id.to_string(),
                room.world_id.map(|id| id.to_string()),
                room.name,
                room.channel_type.to_string(),
                room.source,
                room.channel_id,
                room.server_id,
                serde_json::to_string(&room.metadata)?,
                now,
            ],
        )?;
        ids.push(room.id);
    }
    Ok(ids)
}

pub fn get_rooms_by_ids(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Room>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, agent_id, world_id, name, type, source, channel_id, server_id, metadata, created_at
         FROM rooms WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rooms = stmt
        .query_map(
            params_from_iter(ids.iter().map(|id| id.to_string())),
            room_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rooms)
}

pub fn get_rooms_by_world(conn: &Connection, world_id: Uuid) -> Result<Vec<Room>> {
    let mut stmt = conn.prepare(
        "SELECT id, agent_id, world_id, name, type, source, channel_id, server_id, metadata, created_at
         FROM rooms WHERE world_id = ?1 ORDER BY created_at",
    )?;
    let rooms = stmt
        .query_map([world_id.to_string()], room_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rooms)
}

pub fn update_room(conn: &Connection, room: &Room) -> Result<()> {
    conn.execute(
        "UPDATE rooms SET world_id = ?2, name = ?3, type = ?4, source = ?5,
             channel_id = ?6, server_id = ?7, metadata = ?8
         WHERE id = ?1",
        params![
            room.id.to_string(),
            room.world_id.map(|id| id.to_string()),
            room.name,
            room.channel_type.to_string(),
            room.source,
            room.channel_id,
            room.server_id,
            serde_json::to_string(&room.metadata)?,
        ],
    )?;
    Ok(())
}

/// Delete a room and its contents: logs, memories (with embeddings),
/// participants, room-scoped components, then the room.
pub fn delete_room_cascade(conn: &Connection, room_id: Uuid) -> Result<bool> {
    let id = room_id.to_string();
    conn.execute("DELETE FROM logs WHERE room_id = ?1", [&id])?;
    conn.execute(
        "DELETE FROM embeddings WHERE memory_id IN (SELECT id FROM memories WHERE room_id = ?1)",
        [&id],
    )?;
    conn.execute("DELETE FROM memories WHERE room_id = ?1", [&id])?;
    conn.execute("DELETE FROM participants WHERE room_id = ?1", [&id])?;
    conn.execute("DELETE FROM components WHERE room_id = ?1", [&id])?;
    let deleted = conn.execute("DELETE FROM rooms WHERE id = ?1", [&id])?;
    Ok(deleted > 0)
}

// ============================================================================
// Participants
// ============================================================================

pub fn add_participants(conn: &Connection, entity_ids: &[Uuid], room_id: Uuid) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    for entity_id in entity_ids {
        conn.execute(
            "INSERT INTO participants (id, entity_id, room_id, state, created_at)
             VALUES (?1, ?2, ?3, NULL, ?4)
             ON CONFLICT (entity_id, room_id) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                entity_id.to_string(),
                room_id.to_string(),
                now,
            ],
        )?;
    }
    Ok(true)
}

pub fn remove_participant(conn: &Connection, entity_id: Uuid, room_id: Uuid) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM participants WHERE entity_id = ?1 AND room_id = ?2",
        params![entity_id.to_string(), room_id.to_string()],
    )?;
    Ok(deleted > 0)
}

pub fn get_participants_for_room(conn: &Connection, room_id: Uuid) -> Result<Vec<Participant>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_id, room_id, state FROM participants WHERE room_id = ?1",
    )?;
    let participants = stmt
        .query_map([room_id.to_string()], participant_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(participants)
}

pub fn get_rooms_for_participant(conn: &Connection, entity_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare("SELECT room_id FROM participants WHERE entity_id = ?1")?;
    let ids = stmt
        .query_map([entity_id.to_string()], |row| {
            let s: String = row.get(0)?;
            Uuid::parse_str(&s).map_err(conv_err)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

// ============================================================================
// Components
// ============================================================================

pub fn create_component(conn: &Connection, component: &Component) -> Result<bool> {
    if let Some(room_id) = component.room_id {
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM rooms WHERE id = ?1",
                [room_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::InvalidInput(format!(
                "room {} does not exist; create the room before its components",
                room_id
            )));
        }
    }
    conn.execute(
        "INSERT INTO components (id, entity_id, agent_id, room_id, world_id, source_entity_id, type, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            component.id.to_string(),
            component.entity_id.to_string(),
            component.agent_id.to_string(),
            component.room_id.map(|id| id.to_string()),
            component.world_id.map(|id| id.to_string()),
            component.source_entity_id.map(|id| id.to_string()),
            component.component_type,
            serde_json::to_string(&component.data)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(true)
}

pub fn get_component(
    conn: &Connection,
    entity_id: Uuid,
    component_type: &str,
    world_id: Option<Uuid>,
    source_entity_id: Option<Uuid>,
) -> Result<Option<Component>> {
    let component = conn
        .query_row(
            "SELECT id, entity_id, agent_id, room_id, world_id, source_entity_id, type, data, created_at
             FROM components
             WHERE entity_id = ?1 AND type = ?2 AND world_id IS ?3 AND source_entity_id IS ?4
             ORDER BY created_at DESC LIMIT 1",
            params![
                entity_id.to_string(),
                component_type,
                world_id.map(|id| id.to_string()),
                source_entity_id.map(|id| id.to_string()),
            ],
            component_from_row,
        )
        .optional()?;
    Ok(component)
}

pub fn get_components(conn: &Connection, entity_id: Uuid) -> Result<Vec<Component>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_id, agent_id, room_id, world_id, source_entity_id, type, data, created_at
         FROM components WHERE entity_id = ?1 ORDER BY created_at",
    )?;
    let components = stmt
        .query_map([entity_id.to_string()], component_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(components)
}

pub fn update_component(conn: &Connection, component: &Component) -> Result<()> {
    conn.execute(
        "UPDATE components SET data = ?2 WHERE id = ?1",
        params![
            component.id.to_string(),
            serde_json::to_string(&component.data)?
        ],
    )?;
    Ok(())
}

pub fn delete_component(conn: &Connection, component_id: Uuid) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM components WHERE id = ?1",
        [component_id.to_string()],
    )?;
    Ok(deleted > 0)
}

// ============================================================================
// Memories
// ============================================================================

pub fn create_memory(conn: &Connection, memory: &Memory, table: &str) -> Result<Uuid> {
    if let Some(metadata) = &memory.metadata {
        validate_memory_metadata(metadata)?;
    }

    // Entity-before-memory and room-before-memory, surfaced as clear
    // errors rather than raw FK violations.
    let entity_exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM entities WHERE id = ?1",
            [memory.entity_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if entity_exists.is_none() {
        return Err(StoreError::InvalidInput(format!(
            "entity {} does not exist; create the entity before its memories",
            memory.entity_id
        )));
    }
    let room_exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM rooms WHERE id = ?1",
            [memory.room_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if room_exists.is_none() {
        return Err(StoreError::InvalidInput(format!(
            "room {} does not exist; create the room before its memories",
            memory.room_id
        )));
    }

    let id = memory.id.unwrap_or_else(Uuid::new_v4);
    let created_at = memory
        .created_at
        .unwrap_or_else(Utc::now)
        .to_rfc3339();

    conn.execute(
        "INSERT INTO memories (id, type, entity_id, agent_id, room_id, world_id, content, metadata, is_unique, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id.to_string(),
            table,
            memory.entity_id.to_string(),
            memory.agent_id.to_string(),
            memory.room_id.to_string(),
            memory.world_id.map(|w| w.to_string()),
            serde_json::to_string(&memory.content)?,
            memory
                .metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            memory.unique as i64,
            created_at,
        ],
    )?;

    if let Some(embedding) = &memory.embedding {
        insert_embedding(conn, id, memory.agent_id, embedding)?;
    }
    Ok(id)
}

/// Insert the paired embedding row, pinning the agent's dimension on
/// first use.
fn insert_embedding(
    conn: &Connection,
    memory_id: Uuid,
    agent_id: Uuid,
    embedding: &[f32],
) -> Result<()> {
    let class = VectorDimension::from_len(embedding.len())?;
    match agent_dimension(conn, agent_id)? {
        None => {
            conn.execute(
                "UPDATE agents SET embedding_dimension = ?2 WHERE id = ?1",
                params![agent_id.to_string(), embedding.len() as i64],
            )?;
        }
        Some(current) if current == embedding.len() => {}
        Some(current) => {
            return Err(StoreError::DimensionChange {
                agent_id,
                current,
                requested: embedding.len(),
            });
        }
    }

    let sql = format!(
        "INSERT INTO embeddings (id, memory_id, {}, created_at) VALUES (?1, ?2, ?3, ?4)",
        class.column()
    );
    conn.execute(
        &sql,
        params![
            Uuid::new_v4().to_string(),
            memory_id.to_string(),
            vector_to_blob(embedding),
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

const EMBEDDING_COLUMNS: &str =
    "e.dim_384, e.dim_512, e.dim_768, e.dim_1024, e.dim_1536, e.dim_3072";

fn embedding_from_row(row: &Row) -> rusqlite::Result<Option<Vec<f32>>> {
    for col in ["dim_384", "dim_512", "dim_768", "dim_1024", "dim_1536", "dim_3072"] {
        let blob: Option<Vec<u8>> = row.get(col)?;
        if let Some(blob) = blob {
            return Ok(Some(blob_to_vector(&blob).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    Type::Blob,
                    format!("{}", e).into(),
                )
            })?));
        }
    }
    Ok(None)
}

pub fn get_memory_by_id(conn: &Connection, id: Uuid) -> Result<Option<Memory>> {
    let sql = format!(
        "SELECT m.id, m.type, m.entity_id, m.agent_id, m.room_id, m.world_id,
                m.content, m.metadata, m.is_unique, m.created_at, {}
         FROM memories m LEFT JOIN embeddings e ON e.memory_id = m.id
         WHERE m.id = ?1",
        EMBEDDING_COLUMNS
    );
    let memory = conn
        .query_row(&sql, [id.to_string()], |row| {
            let mut memory = memory_from_row(row)?;
            memory.embedding = embedding_from_row(row)?;
            Ok(memory)
        })
        .optional()?;
    Ok(memory)
}

pub fn get_memories_by_ids(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Memory>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT m.id, m.type, m.entity_id, m.agent_id, m.room_id, m.world_id,
                m.content, m.metadata, m.is_unique, m.created_at, {}
         FROM memories m LEFT JOIN embeddings e ON e.memory_id = m.id
         WHERE m.id IN ({})",
        EMBEDDING_COLUMNS,
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(params_from_iter(ids.iter().map(|id| id.to_string())), |row| {
            let mut memory = memory_from_row(row)?;
            memory.embedding = embedding_from_row(row)?;
            Ok(memory)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(memories)
}

pub fn get_memories(conn: &Connection, params: &GetMemoriesParams) -> Result<Vec<Memory>> {
    let mut sql = String::from(
        "SELECT m.id, m.type, m.entity_id, m.agent_id, m.room_id, m.world_id,
                m.content, m.metadata, m.is_unique, m.created_at
         FROM memories m WHERE m.type = ?",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(params.table.clone())];

    if let Some(room_id) = params.room_id {
        sql.push_str(" AND m.room_id = ?");
        args.push(Box::new(room_id.to_string()));
    }
    if let Some(entity_id) = params.entity_id {
        sql.push_str(" AND m.entity_id = ?");
        args.push(Box::new(entity_id.to_string()));
    }
    if let Some(world_id) = params.world_id {
        sql.push_str(" AND m.world_id = ?");
        args.push(Box::new(world_id.to_string()));
    }
    if params.unique == Some(true) {
        sql.push_str(" AND m.is_unique = 1");
    }
    if let Some(start) = params.start {
        sql.push_str(" AND m.created_at >= ?");
        args.push(Box::new(start.to_rfc3339()));
    }
    if let Some(end) = params.end {
        sql.push_str(" AND m.created_at <= ?");
        args.push(Box::new(end.to_rfc3339()));
    }
    sql.push_str(" ORDER BY m.created_at DESC");
    if let Some(count) = params.count {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(count as i64));
        if let Some(offset) = params.offset {
            sql.push_str(" OFFSET ?");
            args.push(Box::new(offset as i64));
        }
    }

    let mut stmt = conn.prepare(&sql)?;
    let memories = stmt
        .query_map(
            params_from_iter(args.iter().map(|a| a.as_ref())),
            memory_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(memories)
}

pub fn count_memories(
    conn: &Connection,
    room_id: Uuid,
    table: &str,
    unique_only: bool,
) -> Result<usize> {
    let sql = if unique_only {
        "SELECT COUNT(*) FROM memories WHERE room_id = ?1 AND type = ?2 AND is_unique = 1"
    } else {
        "SELECT COUNT(*) FROM memories WHERE room_id = ?1 AND type = ?2"
    };
    let count: i64 = conn.query_row(sql, params![room_id.to_string(), table], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn update_memory(conn: &Connection, update: &MemoryUpdate) -> Result<bool> {
    let id = update.id.to_string();
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM memories WHERE id = ?1", [&id], |row| {
            row.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }

    if let Some(metadata) = &update.metadata {
        validate_memory_metadata(metadata)?;
    }

    // Full-replace semantics: each submitted object overwrites the
    // stored one; omitted fields stay untouched.
    if let Some(content) = &update.content {
        conn.execute(
            "UPDATE memories SET content = ?2 WHERE id = ?1",
            params![id, serde_json::to_string(content)?],
        )?;
    }
    if let Some(metadata) = &update.metadata {
        conn.execute(
            "UPDATE memories SET metadata = ?2 WHERE id = ?1",
            params![id, serde_json::to_string(metadata)?],
        )?;
    }
    Ok(true)
}

pub fn delete_memory(conn: &Connection, id: Uuid) -> Result<bool> {
    let id = id.to_string();
    conn.execute("DELETE FROM embeddings WHERE memory_id = ?1", [&id])?;
    let deleted = conn.execute("DELETE FROM memories WHERE id = ?1", [&id])?;
    Ok(deleted > 0)
}

/// Delete one chunk of memory ids (embeddings first).
pub fn delete_memories_chunk(conn: &Connection, ids: &[Uuid]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let marks = placeholders(ids.len());
    let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    conn.execute(
        &format!(
            "DELETE FROM embeddings WHERE memory_id IN ({})",
            marks
        ),
        params_from_iter(id_strings.iter()),
    )?;
    conn.execute(
        &format!("DELETE FROM memories WHERE id IN ({})", marks),
        params_from_iter(id_strings.iter()),
    )?;
    Ok(())
}

pub fn delete_all_memories(conn: &Connection, room_id: Uuid, table: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM embeddings WHERE memory_id IN (
            SELECT id FROM memories WHERE room_id = ?1 AND type = ?2)",
        params![room_id.to_string(), table],
    )?;
    conn.execute(
        "DELETE FROM memories WHERE room_id = ?1 AND type = ?2",
        params![room_id.to_string(), table],
    )?;
    Ok(())
}

/// Scan dimension-matched embeddings and rank by cosine similarity.
pub fn search_memories_by_embedding(
    conn: &Connection,
    agent_id: Uuid,
    embedding: &[f32],
    params: &SearchMemoriesParams,
) -> Result<Vec<Memory>> {
    let class = VectorDimension::from_len(embedding.len())?;
    if let Some(current) = agent_dimension(conn, agent_id)? {
        if current != embedding.len() {
            return Err(StoreError::InvalidInput(format!(
                "query embedding has {} dimensions but agent {} is pinned to {}",
                embedding.len(),
                agent_id,
                current
            )));
        }
    }

    let mut sql = format!(
        "SELECT m.id, m.type, m.entity_id, m.agent_id, m.room_id, m.world_id,
                m.content, m.metadata, m.is_unique, m.created_at, e.{col} AS vec
         FROM memories m JOIN embeddings e ON e.memory_id = m.id
         WHERE e.{col} IS NOT NULL AND m.type = ? AND m.agent_id = ?",
        col = class.column()
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(params.table.clone()),
        Box::new(agent_id.to_string()),
    ];
    if let Some(room_id) = params.room_id {
        sql.push_str(" AND m.room_id = ?");
        args.push(Box::new(room_id.to_string()));
    }
    if let Some(world_id) = params.world_id {
        sql.push_str(" AND m.world_id = ?");
        args.push(Box::new(world_id.to_string()));
    }
    if let Some(entity_id) = params.entity_id {
        sql.push_str(" AND m.entity_id = ?");
        args.push(Box::new(entity_id.to_string()));
    }
    if params.unique == Some(true) {
        sql.push_str(" AND m.is_unique = 1");
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args.iter().map(|a| a.as_ref())), |row| {
            let mut memory = memory_from_row(row)?;
            let blob: Vec<u8> = row.get("vec")?;
            memory.embedding = Some(blob_to_vector(&blob).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Blob, format!("{}", e).into())
            })?);
            Ok(memory)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let threshold = params.match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD);
    let count = params.count.unwrap_or(DEFAULT_SEARCH_COUNT);

    let mut scored: Vec<Memory> = rows
        .into_iter()
        .filter_map(|mut memory| {
            let similarity =
                cosine_similarity(embedding, memory.embedding.as_deref().unwrap_or(&[]));
            if similarity < threshold {
                return None;
            }
            memory.similarity = Some(similarity);
            Some(memory)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(count);
    Ok(scored)
}

// ============================================================================
// Relationships
// ============================================================================

pub fn create_relationship(conn: &Connection, relationship: &Relationship) -> Result<bool> {
    conn.execute(
        "INSERT INTO relationships (id, source_entity_id, target_entity_id, agent_id, tags, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            relationship.id.to_string(),
            relationship.source_entity_id.to_string(),
            relationship.target_entity_id.to_string(),
            relationship.agent_id.to_string(),
            serde_json::to_string(&relationship.tags)?,
            serde_json::to_string(&relationship.metadata)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(true)
}

pub fn get_relationship(
    conn: &Connection,
    source_entity_id: Uuid,
    target_entity_id: Uuid,
) -> Result<Option<Relationship>> {
    let relationship = conn
        .query_row(
            "SELECT id, source_entity_id, target_entity_id, agent_id, tags, metadata, created_at
             FROM relationships WHERE source_entity_id = ?1 AND target_entity_id = ?2",
            params![source_entity_id.to_string(), target_entity_id.to_string()],
            relationship_from_row,
        )
        .optional()?;
    Ok(relationship)
}

pub fn get_relationships(
    conn: &Connection,
    entity_id: Uuid,
    tags: Option<&[String]>,
) -> Result<Vec<Relationship>> {
    let mut sql = String::from(
        "SELECT id, source_entity_id, target_entity_id, agent_id, tags, metadata, created_at
         FROM relationships WHERE (source_entity_id = ? OR target_entity_id = ?)",
    );
    let id = entity_id.to_string();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(id.clone()), Box::new(id)];
    if let Some(tags) = tags {
        for tag in tags {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM json_each(relationships.tags) WHERE json_each.value = ?)",
            );
            args.push(Box::new(tag.clone()));
        }
    }
    let mut stmt = conn.prepare(&sql)?;
    let relationships = stmt
        .query_map(
            params_from_iter(args.iter().map(|a| a.as_ref())),
            relationship_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(relationships)
}

pub fn update_relationship(conn: &Connection, relationship: &Relationship) -> Result<()> {
    conn.execute(
        "UPDATE relationships SET tags = ?2, metadata = ?3 WHERE id = ?1",
        params![
            relationship.id.to_string(),
            serde_json::to_string(&relationship.tags)?,
            serde_json::to_string(&relationship.metadata)?,
        ],
    )?;
    Ok(())
}

// ============================================================================
// Tasks
// ============================================================================

pub fn create_task(conn: &Connection, task: &Task) -> Result<Uuid> {
    let id = task.id.unwrap_or_else(Uuid::new_v4);
    conn.execute(
        "INSERT INTO tasks (id, agent_id, name, description, room_id, world_id, entity_id, tags, metadata, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id.to_string(),
            task.agent_id.to_string(),
            task.name,
            task.description,
            task.room_id.map(|r| r.to_string()),
            task.world_id.map(|w| w.to_string()),
            task.entity_id.map(|e| e.to_string()),
            serde_json::to_string(&task.tags)?,
            serde_json::to_string(&task.metadata)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(id)
}

pub fn get_task(conn: &Connection, id: Uuid) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT id, agent_id, name, description, room_id, world_id, entity_id, tags, metadata, updated_at
             FROM tasks WHERE id = ?1",
            [id.to_string()],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

pub fn get_tasks(conn: &Connection, agent_id: Uuid, params: &GetTasksParams) -> Result<Vec<Task>> {
    let mut sql = String::from(
        "SELECT id, agent_id, name, description, room_id, world_id, entity_id, tags, metadata, updated_at
         FROM tasks WHERE agent_id = ?",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(agent_id.to_string())];
    if let Some(room_id) = params.room_id {
        sql.push_str(" AND room_id = ?");
        args.push(Box::new(room_id.to_string()));
    }
    if let Some(entity_id) = params.entity_id {
        sql.push_str(" AND entity_id = ?");
        args.push(Box::new(entity_id.to_string()));
    }
    if let Some(tags) = &params.tags {
        for tag in tags {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM json_each(tasks.tags) WHERE json_each.value = ?)",
            );
            args.push(Box::new(tag.clone()));
        }
    }
    sql.push_str(" ORDER BY updated_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(
            params_from_iter(args.iter().map(|a| a.as_ref())),
            task_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

pub fn get_tasks_by_name(conn: &Connection, agent_id: Uuid, name: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        "SELECT id, agent_id, name, description, room_id, world_id, entity_id, tags, metadata, updated_at
         FROM tasks WHERE agent_id = ?1 AND name = ?2 ORDER BY updated_at DESC",
    )?;
    let tasks = stmt
        .query_map(params![agent_id.to_string(), name], task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

pub fn update_task(conn: &Connection, task: &Task) -> Result<()> {
    let id = task
        .id
        .ok_or_else(|| StoreError::InvalidInput("task update requires an id".into()))?;
    conn.execute(
        "UPDATE tasks SET name = ?2, description = ?3, tags = ?4, metadata = ?5, updated_at = ?6
         WHERE id = ?1",
        params![
            id.to_string(),
            task.name,
            task.description,
            serde_json::to_string(&task.tags)?,
            serde_json::to_string(&task.metadata)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn delete_task(conn: &Connection, id: Uuid) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", [id.to_string()])?;
    Ok(deleted > 0)
}

// ============================================================================
// Logs
// ============================================================================

pub fn create_log(conn: &Connection, entry: &Log) -> Result<()> {
    conn.execute(
        "INSERT INTO logs (id, entity_id, room_id, type, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id.unwrap_or_else(Uuid::new_v4).to_string(),
            entry.entity_id.to_string(),
            entry.room_id.to_string(),
            entry.log_type,
            serde_json::to_string(&entry.body)?,
            entry
                .created_at
                .unwrap_or_else(Utc::now)
                .to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_logs(conn: &Connection, params: &GetLogsParams) -> Result<Vec<Log>> {
    let mut sql = String::from(
        "SELECT id, entity_id, room_id, type, body, created_at FROM logs WHERE entity_id = ?",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(params.entity_id.to_string())];
    if let Some(room_id) = params.room_id {
        sql.push_str(" AND room_id = ?");
        args.push(Box::new(room_id.to_string()));
    }
    if let Some(log_type) = &params.log_type {
        sql.push_str(" AND type = ?");
        args.push(Box::new(log_type.clone()));
    }
    sql.push_str(" ORDER BY created_at DESC");
    if let Some(count) = params.count {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(count as i64));
        if let Some(offset) = params.offset {
            sql.push_str(" OFFSET ?");
            args.push(Box::new(offset as i64));
        }
    }
    let mut stmt = conn.prepare(&sql)?;
    let logs = stmt
        .query_map(
            params_from_iter(args.iter().map(|a| a.as_ref())),
            log_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(logs)
}

pub fn delete_log(conn: &Connection, id: Uuid) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM logs WHERE id = ?1", [id.to_string()])?;
    Ok(deleted > 0)
}

// ============================================================================
// Cache
// ============================================================================

pub fn get_cache(conn: &Connection, agent_id: Uuid, key: &str) -> Result<Option<Value>> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT value, expires_at FROM cache WHERE key = ?1 AND agent_id = ?2",
            params![key, agent_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((value, expires_at)) = row else {
        return Ok(None);
    };

    if let Some(expires_at) = expires_at {
        let expired = DateTime::parse_from_rfc3339(&expires_at)
            .map(|t| t.with_timezone(&Utc) <= Utc::now())
            .unwrap_or(true);
        if expired {
            // Lazy expiry: drop the row on read.
            conn.execute(
                "DELETE FROM cache WHERE key = ?1 AND agent_id = ?2",
                params![key, agent_id.to_string()],
            )?;
            return Ok(None);
        }
    }
    Ok(Some(serde_json::from_str(&value)?))
}

pub fn set_cache(
    conn: &Connection,
    agent_id: Uuid,
    key: &str,
    value: &Value,
    ttl: Option<std::time::Duration>,
) -> Result<bool> {
    let expires_at = ttl
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .map(|d| (Utc::now() + d).to_rfc3339());
    conn.execute(
        "INSERT INTO cache (key, agent_id, value, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (key, agent_id) DO UPDATE SET
             value = excluded.value,
             expires_at = excluded.expires_at,
             created_at = excluded.created_at",
        params![
            key,
            agent_id.to_string(),
            serde_json::to_string(value)?,
            expires_at,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(true)
}

pub fn delete_cache(conn: &Connection, agent_id: Uuid, key: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM cache WHERE key = ?1 AND agent_id = ?2",
        params![key, agent_id.to_string()],
    )?;
    Ok(deleted > 0)
}
