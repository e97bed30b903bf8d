//! Integration tests for the embedded adapter.
//!
//! Every test runs against a fresh on-disk database in a temp
//! directory, built through the public factory so the core schema path
//! is exercised too.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use agentstore::storage::ConnectionRegistry;
use agentstore::types::*;
use agentstore::{create_database_adapter, DatabaseAdapter, StoreError};

async fn setup() -> (tempfile::TempDir, Arc<dyn DatabaseAdapter>, Uuid) {
    let dir = tempfile::tempdir().unwrap();
    let registry = ConnectionRegistry::new();
    let agent_id = Uuid::new_v4();
    let config = AdapterConfig {
        postgres_url: None,
        data_dir: Some(dir.path().to_string_lossy().into_owned()),
    };
    let adapter = create_database_adapter(&registry, &config, agent_id)
        .await
        .unwrap();
    (dir, adapter, agent_id)
}

fn agent(id: Uuid, name: &str) -> Agent {
    Agent {
        id,
        name: name.to_string(),
        enabled: true,
        settings: json!({}),
        embedding_dimension: None,
        created_at: None,
        updated_at: None,
    }
}

fn entity(id: Uuid, agent_id: Uuid, names: &[&str]) -> Entity {
    Entity {
        id,
        agent_id,
        names: names.iter().map(|s| s.to_string()).collect(),
        metadata: json!({}),
        created_at: None,
    }
}

fn room(id: Uuid, agent_id: Uuid, world_id: Option<Uuid>) -> Room {
    Room {
        id,
        agent_id,
        world_id,
        name: Some("general".into()),
        channel_type: ChannelType::Group,
        source: "discord".into(),
        channel_id: None,
        server_id: None,
        metadata: json!({}),
        created_at: None,
    }
}

fn memory(entity_id: Uuid, agent_id: Uuid, room_id: Uuid, text: &str) -> Memory {
    Memory {
        id: None,
        entity_id,
        agent_id,
        room_id,
        world_id: None,
        content: MemoryContent::from_text(text),
        embedding: None,
        unique: false,
        metadata: None,
        created_at: None,
        similarity: None,
    }
}

/// Deterministic 384-dim test vector.
fn vector(seed: u32) -> Vec<f32> {
    (0..384).map(|i| ((i + seed) as f32).sin()).collect()
}

/// Seed one agent, one entity, one room.
async fn seed(adapter: &Arc<dyn DatabaseAdapter>, agent_id: Uuid) -> (Uuid, Uuid) {
    adapter.create_agent(&agent(agent_id, "seed")).await.unwrap();
    let entity_id = Uuid::new_v4();
    adapter
        .create_entities(&[entity(entity_id, agent_id, &["Alice"])])
        .await
        .unwrap();
    let room_id = Uuid::new_v4();
    adapter
        .create_rooms(&[room(room_id, agent_id, None)])
        .await
        .unwrap();
    (entity_id, room_id)
}

#[tokio::test]
async fn test_embedding_round_trip_preserves_length() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    let mut m = memory(entity_id, agent_id, room_id, "hello");
    m.embedding = Some(vector(1));
    let id = adapter.create_memory(&m, "messages").await.unwrap();

    let fetched = adapter.get_memory_by_id(id).await.unwrap().unwrap();
    assert_eq!(fetched.embedding.as_ref().map(Vec::len), Some(384));
}

#[tokio::test]
async fn test_delete_agent_cascades_fully() {
    let (_dir, adapter, agent_id) = setup().await;
    adapter.create_agent(&agent(agent_id, "doomed")).await.unwrap();

    let world_id = Uuid::new_v4();
    adapter
        .create_world(&World {
            id: world_id,
            agent_id,
            name: "server".into(),
            server_id: Some("s1".into()),
            metadata: json!({}),
            created_at: None,
        })
        .await
        .unwrap();

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    adapter
        .create_entities(&[
            entity(alice, agent_id, &["Alice"]),
            entity(bob, agent_id, &["Bob"]),
        ])
        .await
        .unwrap();

    let room_id = Uuid::new_v4();
    adapter
        .create_rooms(&[room(room_id, agent_id, Some(world_id))])
        .await
        .unwrap();
    adapter
        .add_participants_room(&[alice, bob], room_id)
        .await
        .unwrap();

    let mut m = memory(alice, agent_id, room_id, "remember this");
    m.embedding = Some(vector(7));
    let memory_id = adapter.create_memory(&m, "messages").await.unwrap();

    adapter
        .create_component(&Component {
            id: Uuid::new_v4(),
            entity_id: alice,
            agent_id,
            room_id: Some(room_id),
            world_id: Some(world_id),
            source_entity_id: Some(bob),
            component_type: "profile".into(),
            data: json!({"color": "green"}),
            created_at: None,
        })
        .await
        .unwrap();

    adapter
        .create_relationship(&Relationship {
            id: Uuid::new_v4(),
            source_entity_id: alice,
            target_entity_id: bob,
            agent_id,
            tags: vec!["friend".into()],
            metadata: json!({}),
            created_at: None,
        })
        .await
        .unwrap();

    let task_id = adapter
        .create_task(&Task {
            id: None,
            agent_id,
            name: "follow-up".into(),
            description: None,
            room_id: Some(room_id),
            world_id: None,
            entity_id: Some(alice),
            tags: vec![],
            metadata: json!({}),
            updated_at: None,
        })
        .await
        .unwrap();

    adapter
        .log(&Log {
            id: None,
            entity_id: alice,
            room_id,
            log_type: "action".into(),
            body: json!({"action": "wave"}),
            created_at: None,
        })
        .await
        .unwrap();

    adapter
        .set_cache("greeting", json!("hi"), None)
        .await
        .unwrap();

    assert!(adapter.delete_agent(agent_id).await.unwrap());

    assert!(adapter.get_agent(agent_id).await.unwrap().is_none());
    assert!(adapter.get_world(world_id).await.unwrap().is_none());
    assert!(adapter
        .get_entities_by_ids(&[alice, bob])
        .await
        .unwrap()
        .is_empty());
    assert!(adapter
        .get_rooms_by_ids(&[room_id])
        .await
        .unwrap()
        .is_empty());
    assert!(adapter.get_memory_by_id(memory_id).await.unwrap().is_none());
    assert!(adapter.get_components(alice).await.unwrap().is_empty());
    assert!(adapter
        .get_relationship(alice, bob)
        .await
        .unwrap()
        .is_none());
    assert!(adapter.get_task(task_id).await.unwrap().is_none());
    assert!(adapter
        .get_participants_for_room(room_id)
        .await
        .unwrap()
        .is_empty());
    assert!(adapter
        .get_logs(&GetLogsParams {
            entity_id: alice,
            room_id: None,
            log_type: None,
            count: None,
            offset: None,
        })
        .await
        .unwrap()
        .is_empty());
    assert!(adapter.get_cache("greeting").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_nonexistent_agent_returns_false() {
    let (_dir, adapter, _) = setup().await;
    assert!(!adapter.delete_agent(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_delete_many_memories_batches() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    // Empty list is a no-op.
    adapter.delete_many_memories(&[]).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..250 {
        let m = memory(entity_id, agent_id, room_id, &format!("note {}", i));
        ids.push(adapter.create_memory(&m, "messages").await.unwrap());
    }
    assert_eq!(
        adapter.count_memories(room_id, "messages", false).await.unwrap(),
        250
    );

    adapter.delete_many_memories(&ids).await.unwrap();
    assert_eq!(
        adapter.count_memories(room_id, "messages", false).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_partial_update_replaces_only_submitted_objects() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    let mut m = memory(entity_id, agent_id, room_id, "original");
    m.embedding = Some(vector(3));
    m.metadata = Some(json!({"type": "custom", "source": "test"}));
    let id = adapter.create_memory(&m, "messages").await.unwrap();

    // Content-only update preserves embedding and metadata.
    assert!(adapter
        .update_memory(&MemoryUpdate {
            id,
            content: Some(MemoryContent::from_text("rewritten")),
            metadata: None,
        })
        .await
        .unwrap());
    let after_content = adapter.get_memory_by_id(id).await.unwrap().unwrap();
    assert_eq!(after_content.content.text.as_deref(), Some("rewritten"));
    assert_eq!(after_content.embedding.as_ref().map(Vec::len), Some(384));
    assert_eq!(
        after_content.metadata,
        Some(json!({"type": "custom", "source": "test"}))
    );

    // Metadata-only update preserves content, and replaces the whole
    // object rather than merging.
    assert!(adapter
        .update_memory(&MemoryUpdate {
            id,
            content: None,
            metadata: Some(json!({"type": "custom"})),
        })
        .await
        .unwrap());
    let after_metadata = adapter.get_memory_by_id(id).await.unwrap().unwrap();
    assert_eq!(after_metadata.content.text.as_deref(), Some("rewritten"));
    assert_eq!(after_metadata.metadata, Some(json!({"type": "custom"})));
}

#[tokio::test]
async fn test_update_missing_memory_returns_false() {
    let (_dir, adapter, _) = setup().await;
    let updated = adapter
        .update_memory(&MemoryUpdate {
            id: Uuid::new_v4(),
            content: Some(MemoryContent::from_text("ghost")),
            metadata: None,
        })
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_search_finds_identical_embedding_first() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    let mut a = memory(entity_id, agent_id, room_id, "about rust");
    a.embedding = Some(vector(1));
    let a_id = adapter.create_memory(&a, "facts").await.unwrap();

    let mut far = vec![0.0; 384];
    far[0] = 1.0;
    let mut b = memory(entity_id, agent_id, room_id, "about cooking");
    b.embedding = Some(far);
    adapter.create_memory(&b, "facts").await.unwrap();

    let results = adapter
        .search_memories_by_embedding(
            &vector(1),
            &SearchMemoriesParams {
                table: "facts".into(),
                count: Some(5),
                match_threshold: Some(0.5),
                room_id: Some(room_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].id, Some(a_id));
    assert!(results[0].similarity.unwrap() > 0.99);
}

#[tokio::test]
async fn test_embedding_dimension_is_immutable() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    adapter
        .ensure_embedding_dimension(agent_id, 384)
        .await
        .unwrap();
    // Same dimension is fine.
    adapter
        .ensure_embedding_dimension(agent_id, 384)
        .await
        .unwrap();

    let err = adapter
        .ensure_embedding_dimension(agent_id, 768)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DimensionChange { .. }));
    assert!(err.to_string().contains("cannot change embedding dimension"));

    // A memory write with the wrong dimension hits the same wall.
    let mut m = memory(entity_id, agent_id, room_id, "wrong dims");
    m.embedding = Some(vec![0.5; 768]);
    assert!(matches!(
        adapter.create_memory(&m, "messages").await,
        Err(StoreError::DimensionChange { .. })
    ));
}

#[tokio::test]
async fn test_unsupported_dimension_rejected() {
    let (_dir, adapter, agent_id) = setup().await;
    adapter.create_agent(&agent(agent_id, "odd")).await.unwrap();
    assert!(matches!(
        adapter.ensure_embedding_dimension(agent_id, 100).await,
        Err(StoreError::UnsupportedDimension(100))
    ));
}

#[tokio::test]
async fn test_fragment_metadata_invariant_enforced() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    let mut m = memory(entity_id, agent_id, room_id, "chunk");
    m.metadata = Some(json!({"type": "fragment", "position": 0}));
    let err = adapter.create_memory(&m, "fragments").await.unwrap_err();
    assert!(err.to_string().contains("documentId"));

    m.metadata = Some(json!({
        "type": "fragment",
        "documentId": Uuid::new_v4().to_string(),
        "position": 0
    }));
    adapter.create_memory(&m, "fragments").await.unwrap();
}

#[tokio::test]
async fn test_duplicate_entities_are_an_error() {
    let (_dir, adapter, agent_id) = setup().await;
    adapter.create_agent(&agent(agent_id, "dup")).await.unwrap();

    let id = Uuid::new_v4();
    adapter
        .create_entities(&[entity(id, agent_id, &["Alice"])])
        .await
        .unwrap();
    let err = adapter
        .create_entities(&[entity(id, agent_id, &["Alice again"])])
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

#[tokio::test]
async fn test_search_entities_by_name_is_case_insensitive() {
    let (_dir, adapter, agent_id) = setup().await;
    adapter.create_agent(&agent(agent_id, "names")).await.unwrap();
    adapter
        .create_entities(&[
            entity(Uuid::new_v4(), agent_id, &["Alice Smith", "al"]),
            entity(Uuid::new_v4(), agent_id, &["Bob Jones"]),
        ])
        .await
        .unwrap();

    let hits = adapter
        .search_entities_by_name("aLiCe", agent_id, 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].names[0], "Alice Smith");

    let all = adapter.search_entities_by_name("o", agent_id, 10).await.unwrap();
    assert_eq!(all.len(), 1); // only "Bob Jones" contains an 'o'
}

#[tokio::test]
async fn test_memory_without_entity_is_rejected() {
    let (_dir, adapter, agent_id) = setup().await;
    let (_, room_id) = seed(&adapter, agent_id).await;

    let m = memory(Uuid::new_v4(), agent_id, room_id, "orphan");
    let err = adapter.create_memory(&m, "messages").await.unwrap_err();
    assert!(err.to_string().contains("entity"));
}

#[tokio::test]
async fn test_cache_expiry_is_lazy_but_strict() {
    let (_dir, adapter, agent_id) = setup().await;
    adapter.create_agent(&agent(agent_id, "cache")).await.unwrap();

    adapter
        .set_cache("stable", json!({"n": 1}), None)
        .await
        .unwrap();
    assert_eq!(
        adapter.get_cache("stable").await.unwrap(),
        Some(json!({"n": 1}))
    );

    adapter
        .set_cache("fleeting", json!("soon gone"), Some(Duration::ZERO))
        .await
        .unwrap();
    assert!(adapter.get_cache("fleeting").await.unwrap().is_none());

    // Overwrite keeps the latest value.
    adapter.set_cache("stable", json!({"n": 2}), None).await.unwrap();
    assert_eq!(
        adapter.get_cache("stable").await.unwrap(),
        Some(json!({"n": 2}))
    );

    assert!(adapter.delete_cache("stable").await.unwrap());
    assert!(adapter.get_cache("stable").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_all_memories_is_table_scoped() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    for i in 0..3 {
        let m = memory(entity_id, agent_id, room_id, &format!("msg {}", i));
        adapter.create_memory(&m, "messages").await.unwrap();
    }
    let f = memory(entity_id, agent_id, room_id, "a fact");
    adapter.create_memory(&f, "facts").await.unwrap();

    adapter.delete_all_memories(room_id, "messages").await.unwrap();
    assert_eq!(
        adapter.count_memories(room_id, "messages", false).await.unwrap(),
        0
    );
    assert_eq!(
        adapter.count_memories(room_id, "facts", false).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_rooms_participants_round_trip() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    adapter
        .add_participants_room(&[entity_id], room_id)
        .await
        .unwrap();
    // Re-adding the same participant is not an error.
    adapter
        .add_participants_room(&[entity_id], room_id)
        .await
        .unwrap();

    let participants = adapter.get_participants_for_room(room_id).await.unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].entity_id, entity_id);

    let rooms = adapter.get_rooms_for_participant(entity_id).await.unwrap();
    assert_eq!(rooms, vec![room_id]);

    assert!(adapter.remove_participant(entity_id, room_id).await.unwrap());
    assert!(adapter
        .get_participants_for_room(room_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_component_uniqueness_tuple() {
    let (_dir, adapter, agent_id) = setup().await;
    let (entity_id, _room_id) = seed(&adapter, agent_id).await;

    let world_id = Uuid::new_v4();
    adapter
        .create_world(&World {
            id: world_id,
            agent_id,
            name: "w".into(),
            server_id: None,
            metadata: json!({}),
            created_at: None,
        })
        .await
        .unwrap();

    adapter
        .create_component(&Component {
            id: Uuid::new_v4(),
            entity_id,
            agent_id,
            room_id: None,
            world_id: Some(world_id),
            source_entity_id: None,
            component_type: "profile".into(),
            data: json!({"v": 1}),
            created_at: None,
        })
        .await
        .unwrap();

    let scoped = adapter
        .get_component(entity_id, "profile", Some(world_id), None)
        .await
        .unwrap();
    assert!(scoped.is_some());

    // Different world scope resolves to nothing.
    let other = adapter
        .get_component(entity_id, "profile", None, None)
        .await
        .unwrap();
    assert!(other.is_none());
}

#[tokio::test]
async fn test_tasks_filtering_by_tags() {
    let (_dir, adapter, agent_id) = setup().await;
    let (_entity_id, room_id) = seed(&adapter, agent_id).await;

    for (name, tags) in [
        ("send-report", vec!["queue", "daily"]),
        ("cleanup", vec!["queue"]),
    ] {
        adapter
            .create_task(&Task {
                id: None,
                agent_id,
                name: name.into(),
                description: None,
                room_id: Some(room_id),
                world_id: None,
                entity_id: None,
                tags: tags.into_iter().map(String::from).collect(),
                metadata: json!({}),
                updated_at: None,
            })
            .await
            .unwrap();
    }

    let queued = adapter
        .get_tasks(&GetTasksParams {
            room_id: Some(room_id),
            entity_id: None,
            tags: Some(vec!["queue".into()]),
        })
        .await
        .unwrap();
    assert_eq!(queued.len(), 2);

    let daily = adapter
        .get_tasks(&GetTasksParams {
            room_id: None,
            entity_id: None,
            tags: Some(vec!["queue".into(), "daily".into()]),
        })
        .await
        .unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].name, "send-report");

    let by_name = adapter.get_tasks_by_name("cleanup").await.unwrap();
    assert_eq!(by_name.len(), 1);
}

#[tokio::test]
async fn test_relationship_uniqueness_and_lookup() {
    let (_dir, adapter, agent_id) = setup().await;
    adapter.create_agent(&agent(agent_id, "rel")).await.unwrap();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    adapter
        .create_entities(&[
            entity(alice, agent_id, &["Alice"]),
            entity(bob, agent_id, &["Bob"]),
        ])
        .await
        .unwrap();

    let rel = Relationship {
        id: Uuid::new_v4(),
        source_entity_id: alice,
        target_entity_id: bob,
        agent_id,
        tags: vec!["friend".into()],
        metadata: json!({}),
        created_at: None,
    };
    adapter.create_relationship(&rel).await.unwrap();

    // Same (source, target, agent) is unique.
    let dup = Relationship {
        id: Uuid::new_v4(),
        ..rel.clone()
    };
    assert!(adapter
        .create_relationship(&dup)
        .await
        .unwrap_err()
        .is_constraint_violation());

    let found = adapter.get_relationship(alice, bob).await.unwrap().unwrap();
    assert_eq!(found.tags, vec!["friend".to_string()]);

    let tagged = adapter
        .get_relationships(alice, Some(&["friend".to_string()]))
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
}

#[tokio::test]
async fn test_factory_reuses_connection_manager_per_target() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ConnectionRegistry::new();
    let config = AdapterConfig {
        postgres_url: None,
        data_dir: Some(dir.path().to_string_lossy().into_owned()),
    };

    let first = create_database_adapter(&registry, &config, Uuid::new_v4())
        .await
        .unwrap();
    let second = create_database_adapter(&registry, &config, Uuid::new_v4())
        .await
        .unwrap();

    // Both adapters see the same database through one shared manager.
    let shared_agent = Uuid::new_v4();
    first
        .create_agent(&agent(shared_agent, "shared"))
        .await
        .unwrap();
    assert!(second.get_agent(shared_agent).await.unwrap().is_some());
}
