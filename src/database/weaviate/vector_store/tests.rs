use super::*;
use crate::config::WeaviateConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_store(server: &MockServer) -> VectorStore {
    let config = Config {
        weaviate: WeaviateConfig {
            url: server.uri(),
            ..WeaviateConfig::default()
        },
        ..Config::default()
    };
    VectorStore::new(&config).expect("should create vector store")
}

fn create_test_record(chunk_index: u32) -> ChunkRecord {
    ChunkRecord::new(
        format!("This is test content for chunk {}", chunk_index),
        "test_doc".to_string(),
        chunk_index,
        vec![0.1, 0.2, 0.3, 0.4, 0.5],
    )
}

#[test]
fn vector_store_initialization() {
    let store = VectorStore::new(&Config::default()).expect("should create vector store");
    assert_eq!(store.class_name(), "DocumentChunk");
    assert_eq!(store.base_url.as_str(), "http://localhost:8085/");

    let bad = Config {
        weaviate: WeaviateConfig {
            url: "not a url".to_string(),
            ..WeaviateConfig::default()
        },
        ..Config::default()
    };
    assert!(matches!(VectorStore::new(&bad), Err(RagError::Config(_))));
}

#[test]
fn records_get_distinct_ids() {
    let first = create_test_record(0);
    let second = create_test_record(0);
    assert_ne!(first.id, second.id);
    assert_eq!(first.content, second.content);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn meta_reports_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hostname": "http://[::]:8085",
            "version": "1.24.10",
            "modules": {}
        })))
        .mount(&server)
        .await;

    let meta = create_test_store(&server).meta().expect("meta succeeds");
    assert_eq!(meta.version, "1.24.10");
    assert_eq!(meta.hostname.as_deref(), Some("http://[::]:8085"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weaviate/v1/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.24.10"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        weaviate: WeaviateConfig {
            url: format!("{}/weaviate", server.uri()),
            ..WeaviateConfig::default()
        },
        ..Config::default()
    };
    let store = VectorStore::new(&config).expect("should create vector store");

    let meta = store.meta().expect("meta succeeds");
    assert_eq!(meta.version, "1.24.10");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ensure_schema_creates_missing_class() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"classes": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .and(body_partial_json(json!({
            "class": "DocumentChunk",
            "vectorizer": "none"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"class": "DocumentChunk"})))
        .expect(1)
        .mount(&server)
        .await;

    let created = create_test_store(&server)
        .ensure_schema()
        .expect("schema creation succeeds");
    assert!(created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ensure_schema_keeps_existing_class() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "classes": [{"class": "Other"}, {"class": "DocumentChunk"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let created = create_test_store(&server)
        .ensure_schema()
        .expect("schema check succeeds");
    assert!(!created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn insert_sends_explicit_vector() {
    let server = MockServer::start().await;
    let record = create_test_record(7);

    Mock::given(method("POST"))
        .and(path("/v1/objects"))
        .and(body_partial_json(json!({
            "class": "DocumentChunk",
            "id": record.id,
            "properties": {
                "content": "This is test content for chunk 7",
                "doc_id": "test_doc",
                "chunk_index": 7
            },
            "vector": [0.1, 0.2, 0.3, 0.4, 0.5]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": record.id})))
        .expect(1)
        .mount(&server)
        .await;

    let id = create_test_store(&server)
        .insert(&record)
        .expect("insert succeeds");
    assert_eq!(id, record.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn insert_surfaces_server_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/objects"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_string(r#"{"error":[{"message":"vector lengths don't match"}]}"#),
        )
        .mount(&server)
        .await;

    let result = create_test_store(&server).insert(&create_test_record(0));
    match result {
        Err(RagError::Database(message)) => {
            assert!(message.contains("422"), "{}", message);
            assert!(message.contains("vector lengths"), "{}", message);
        }
        other => panic!("expected database error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_returns_closest_first_within_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("nearVector"))
        .and(body_string_contains("limit: 2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": {"DocumentChunk": [
                {"content": "far", "doc_id": "d", "chunk_index": 2, "_additional": {"distance": 0.9}},
                {"content": "near", "doc_id": "d", "chunk_index": 0, "_additional": {"distance": 0.1}},
                {"content": "middle", "doc_id": null, "chunk_index": null, "_additional": {"distance": 0.4}}
            ]}}
        })))
        .mount(&server)
        .await;

    let results = create_test_store(&server)
        .search(&[0.1, 0.2, 0.3], 2)
        .expect("search succeeds");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "near");
    assert_eq!(results[0].chunk_index, Some(0));
    assert_eq!(results[1].content, "middle");
    assert_eq!(results[1].doc_id, None);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_without_class_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": null},
            "errors": [{
                "message": "Cannot query field \"DocumentChunk\" on type \"GetObjectsObj\".",
                "locations": [{"line": 1, "column": 9}]
            }]
        })))
        .mount(&server)
        .await;

    let store = create_test_store(&server);
    assert!(store.search(&[0.5; 4], 3).expect("search succeeds").is_empty());
    assert_eq!(store.count().expect("count succeeds"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn graphql_errors_are_database_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "vector search: dimension mismatch"}]
        })))
        .mount(&server)
        .await;

    let result = create_test_store(&server).search(&[0.5; 4], 3);
    match result {
        Err(RagError::Database(message)) => assert!(message.contains("dimension mismatch")),
        other => panic!("expected database error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn count_reads_aggregate_meta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("Aggregate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Aggregate": {"DocumentChunk": [{"meta": {"count": 42}}]}}
        })))
        .mount(&server)
        .await;

    assert_eq!(create_test_store(&server).count().expect("count succeeds"), 42);
}

#[test]
fn unreachable_server_is_a_network_error() {
    let config = Config {
        weaviate: WeaviateConfig {
            url: "http://127.0.0.1:1".to_string(),
            timeout_seconds: 2,
            ..WeaviateConfig::default()
        },
        ..Config::default()
    };
    let store = VectorStore::new(&config).expect("should create vector store");
    assert!(matches!(store.meta(), Err(RagError::Network(_))));
}
