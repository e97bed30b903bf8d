//! Integration tests for the networked backend.
//!
//! These need a running PostgreSQL server with the pgvector extension
//! available, so they are ignored by default:
//!
//! ```text
//! POSTGRES_URL=postgres://localhost/agentstore_test cargo test -- --ignored
//! ```

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use agentstore::storage::ConnectionRegistry;
use agentstore::types::*;
use agentstore::{create_database_adapter, DatabaseAdapter};

fn postgres_url() -> String {
    std::env::var("POSTGRES_URL").expect("POSTGRES_URL must be set for postgres tests")
}

async fn setup() -> (Arc<dyn DatabaseAdapter>, Uuid) {
    let registry = ConnectionRegistry::new();
    let agent_id = Uuid::new_v4();
    let config = AdapterConfig {
        postgres_url: Some(postgres_url()),
        data_dir: None,
    };
    let adapter = create_database_adapter(&registry, &config, agent_id)
        .await
        .unwrap();
    (adapter, agent_id)
}

async fn seed(adapter: &Arc<dyn DatabaseAdapter>, agent_id: Uuid) -> (Uuid, Uuid) {
    adapter
        .create_agent(&Agent {
            id: agent_id,
            name: format!("pg-test-{}", agent_id),
            enabled: true,
            settings: json!({}),
            embedding_dimension: None,
            created_at: None,
            updated_at: None,
        })
        .await
        .unwrap();
    let entity_id = Uuid::new_v4();
    adapter
        .create_entities(&[Entity {
            id: entity_id,
            agent_id,
            names: vec!["Alice".into()],
            metadata: json!({}),
            created_at: None,
        }])
        .await
        .unwrap();
    let room_id = Uuid::new_v4();
    adapter
        .create_rooms(&[Room {
            id: room_id,
            agent_id,
            world_id: None,
            name: Some("general".into()),
            channel_type: ChannelType::Group,
            source: "test".into(),
            channel_id: None,
            server_id: None,
            metadata: json!({}),
            created_at: None,
        }])
        .await
        .unwrap();
    (entity_id, room_id)
}

fn vector(seed: u32) -> Vec<f32> {
    (0..384).map(|i| ((i + seed) as f32).sin()).collect()
}

#[tokio::test]
#[ignore]
async fn test_pg_memory_round_trip_and_search() {
    let (adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    let mut m = Memory {
        id: None,
        entity_id,
        agent_id,
        room_id,
        world_id: None,
        content: MemoryContent::from_text("pgvector check"),
        embedding: Some(vector(5)),
        unique: false,
        metadata: None,
        created_at: None,
        similarity: None,
    };
    let id = adapter.create_memory(&m, "messages").await.unwrap();

    let fetched = adapter.get_memory_by_id(id).await.unwrap().unwrap();
    assert_eq!(fetched.embedding.as_ref().map(Vec::len), Some(384));

    let results = adapter
        .search_memories_by_embedding(
            &vector(5),
            &SearchMemoriesParams {
                table: "messages".into(),
                count: Some(3),
                match_threshold: Some(0.5),
                room_id: Some(room_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(results[0].id, Some(id));
    assert!(results[0].similarity.unwrap() > 0.99);

    // Changing dimension after first use is rejected.
    m.embedding = Some(vec![0.1; 768]);
    assert!(adapter.create_memory(&m, "messages").await.is_err());

    assert!(adapter.delete_agent(agent_id).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_pg_cascade_and_cache() {
    let (adapter, agent_id) = setup().await;
    let (entity_id, room_id) = seed(&adapter, agent_id).await;

    adapter
        .add_participants_room(&[entity_id], room_id)
        .await
        .unwrap();
    adapter
        .set_cache("k", json!({"v": 1}), None)
        .await
        .unwrap();
    assert_eq!(adapter.get_cache("k").await.unwrap(), Some(json!({"v": 1})));

    assert!(adapter.delete_agent(agent_id).await.unwrap());
    assert!(adapter.get_agent(agent_id).await.unwrap().is_none());
    assert!(adapter.get_cache("k").await.unwrap().is_none());
    assert!(!adapter.delete_agent(agent_id).await.unwrap());
}
