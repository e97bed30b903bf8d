//! Core types for agentstore

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{Result, StoreError};

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_true() -> bool {
    true
}

/// An agent: the root of ownership for every other row.
///
/// The embedding dimension is unset until the first embedding is written
/// (or `ensure_embedding_dimension` is called) and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Behavioral settings, opaque to the storage layer.
    #[serde(default = "empty_object")]
    pub settings: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A person or system an agent can interact with. Unique per (id, agentId).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: Uuid,
    pub agent_id: Uuid,
    /// Known names, in order of preference.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Kind of conversational channel a room represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    Dm,
    Group,
    VoiceDm,
    VoiceGroup,
    Feed,
    Thread,
    World,
    Forum,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelType::Dm => "DM",
            ChannelType::Group => "GROUP",
            ChannelType::VoiceDm => "VOICE_DM",
            ChannelType::VoiceGroup => "VOICE_GROUP",
            ChannelType::Feed => "FEED",
            ChannelType::Thread => "THREAD",
            ChannelType::World => "WORLD",
            ChannelType::Forum => "FORUM",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "DM" => Ok(ChannelType::Dm),
            "GROUP" => Ok(ChannelType::Group),
            "VOICE_DM" => Ok(ChannelType::VoiceDm),
            "VOICE_GROUP" => Ok(ChannelType::VoiceGroup),
            "FEED" => Ok(ChannelType::Feed),
            "THREAD" => Ok(ChannelType::Thread),
            "WORLD" => Ok(ChannelType::World),
            "FORUM" => Ok(ChannelType::Forum),
            other => Err(format!("unknown channel type: {}", other)),
        }
    }
}

/// A conversational channel scoped to an agent, optionally inside a world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub agent_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    /// Origin platform tag (e.g. "discord", "telegram").
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A higher-level grouping of rooms, e.g. a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Follow state of an entity inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantState {
    Followed,
    Muted,
}

impl std::fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantState::Followed => write!(f, "FOLLOWED"),
            ParticipantState::Muted => write!(f, "MUTED"),
        }
    }
}

impl std::str::FromStr for ParticipantState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FOLLOWED" => Ok(ParticipantState::Followed),
            "MUTED" => Ok(ParticipantState::Muted),
            other => Err(format!("unknown participant state: {}", other)),
        }
    }
}

/// Join row linking an entity to a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub room_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ParticipantState>,
}

/// Content of a memory: text plus arbitrary structured fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl MemoryContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            extra: serde_json::Map::new(),
        }
    }
}

/// A timestamped record belonging to an entity, room, and agent.
///
/// `table` selection (messages, facts, documents, ...) happens at the
/// adapter call site; the struct itself is table-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub entity_id: Uuid,
    pub agent_id: Uuid,
    pub room_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<Uuid>,
    pub content: MemoryContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Marks a memory that passed deduplication.
    #[serde(default)]
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Populated by similarity search only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Partial update for a memory.
///
/// Submitted `content`/`metadata` objects replace the stored value
/// wholesale. There is no deep-merge: callers resend unchanged
/// sub-fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUpdate {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MemoryContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Metadata `type` marking a document fragment.
pub const MEMORY_TYPE_FRAGMENT: &str = "fragment";
/// Metadata `type` marking a source document.
pub const MEMORY_TYPE_DOCUMENT: &str = "document";

/// Validate the typed-metadata invariants before any write is attempted.
///
/// Fragments must reference their document and position; documents must
/// carry their ingestion timestamp. Other metadata types pass through.
pub fn validate_memory_metadata(metadata: &Value) -> Result<()> {
    let Some(kind) = metadata.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    match kind {
        MEMORY_TYPE_FRAGMENT => {
            if metadata.get("documentId").and_then(Value::as_str).is_none() {
                return Err(StoreError::InvalidInput(
                    "fragment metadata requires a documentId".into(),
                ));
            }
            if metadata.get("position").and_then(Value::as_i64).is_none() {
                return Err(StoreError::InvalidInput(
                    "fragment metadata requires a position".into(),
                ));
            }
        }
        MEMORY_TYPE_DOCUMENT => {
            if metadata.get("timestamp").and_then(Value::as_i64).is_none() {
                return Err(StoreError::InvalidInput(
                    "document metadata requires a timestamp".into(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Typed data blob attached to an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub agent_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<Uuid>,
    /// Which entity attached this component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Directed edge between two entities within one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: Uuid,
    pub source_entity_id: Uuid,
    pub target_entity_id: Uuid,
    pub agent_id: Uuid,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A unit of work with a lifecycle independent of memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub agent_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "empty_object")]
    pub metadata: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Append-only audit/event record tied to an entity and room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub entity_id: Uuid,
    pub room_id: Uuid,
    #[serde(rename = "type")]
    pub log_type: String,
    pub body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Filters for memory listing.
#[derive(Debug, Clone, Default)]
pub struct GetMemoriesParams {
    /// Logical memory table (e.g. "messages", "facts", "documents").
    pub table: String,
    pub room_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub world_id: Option<Uuid>,
    pub count: Option<usize>,
    pub offset: Option<usize>,
    pub unique: Option<bool>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Default result count for similarity search.
pub const DEFAULT_SEARCH_COUNT: usize = 10;
/// Default similarity threshold (no filtering).
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.0;

/// Filters for embedding similarity search. The query vector itself is a
/// separate argument to `search_memories_by_embedding`.
#[derive(Debug, Clone, Default)]
pub struct SearchMemoriesParams {
    /// Logical memory table to search.
    pub table: String,
    pub count: Option<usize>,
    pub match_threshold: Option<f32>,
    pub room_id: Option<Uuid>,
    pub world_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub unique: Option<bool>,
}

/// Filters for task listing.
#[derive(Debug, Clone, Default)]
pub struct GetTasksParams {
    pub room_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    /// Tasks must carry every listed tag.
    pub tags: Option<Vec<String>>,
}

/// Filters for log listing.
#[derive(Debug, Clone)]
pub struct GetLogsParams {
    pub entity_id: Uuid,
    pub room_id: Option<Uuid>,
    pub log_type: Option<String>,
    pub count: Option<usize>,
    pub offset: Option<usize>,
}

/// Externally supplied configuration for the adapter factory.
///
/// A present `postgres_url` selects the networked backend; otherwise the
/// embedded backend is rooted at `data_dir`. Everything else (retry
/// counts, pool size, batch size) is a compiled-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Default project-local data directory for the embedded backend.
pub const DEFAULT_DATA_DIR: &str = ".agentstore";

/// Resolve the embedded-backend data directory.
///
/// A leading `~` expands to the current working directory, matching the
/// project-local convention of the runtime this layer serves.
pub fn resolve_data_dir(data_dir: Option<&str>) -> PathBuf {
    let raw = data_dir.unwrap_or(DEFAULT_DATA_DIR);
    if let Some(rest) = raw.strip_prefix('~') {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        return cwd.join(rest.trim_start_matches('/'));
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_type_round_trip() {
        for t in [ChannelType::Dm, ChannelType::VoiceGroup, ChannelType::Forum] {
            let s = t.to_string();
            assert_eq!(s.parse::<ChannelType>().unwrap(), t);
        }
    }

    #[test]
    fn test_fragment_metadata_requires_document_id() {
        let missing = json!({"type": "fragment", "position": 3});
        assert!(validate_memory_metadata(&missing).is_err());

        let complete = json!({
            "type": "fragment",
            "documentId": Uuid::new_v4().to_string(),
            "position": 3
        });
        assert!(validate_memory_metadata(&complete).is_ok());
    }

    #[test]
    fn test_document_metadata_requires_timestamp() {
        let missing = json!({"type": "document"});
        assert!(validate_memory_metadata(&missing).is_err());

        let complete = json!({"type": "document", "timestamp": 1700000000000i64});
        assert!(validate_memory_metadata(&complete).is_ok());
    }

    #[test]
    fn test_untyped_metadata_passes() {
        assert!(validate_memory_metadata(&json!({"source": "discord"})).is_ok());
        assert!(validate_memory_metadata(&json!({"type": "custom"})).is_ok());
    }

    #[test]
    fn test_memory_serialization_is_camel_case() {
        let memory = Memory {
            id: Some(Uuid::new_v4()),
            entity_id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            world_id: None,
            content: MemoryContent::from_text("hello"),
            embedding: None,
            unique: false,
            metadata: None,
            created_at: None,
            similarity: None,
        };
        let json = serde_json::to_string(&memory).unwrap();
        assert!(json.contains("\"entityId\""));
        assert!(json.contains("\"roomId\""));
        assert!(!json.contains("\"similarity\""));
    }

    #[test]
    fn test_resolve_data_dir_tilde_expands_to_cwd() {
        let resolved = resolve_data_dir(Some("~/state/db"));
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(resolved, cwd.join("state/db"));
    }

    #[test]
    fn test_resolve_data_dir_default() {
        assert_eq!(resolve_data_dir(None), PathBuf::from(DEFAULT_DATA_DIR));
    }
}
