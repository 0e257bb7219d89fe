use super::*;
use crate::config::GeminiConfig;
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn model(name: &str, methods: &[&str]) -> GeminiModel {
    GeminiModel {
        name: name.to_string(),
        display_name: None,
        supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
    }
}

fn config_for(server: &MockServer, model: Option<&str>) -> Config {
    Config {
        gemini: GeminiConfig {
            base_url: server.uri(),
            model: model.map(str::to_string),
            ..GeminiConfig::default()
        },
        ..Config::default()
    }
}

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::with_api_key(&config_for(server, Some("gemini-1.5-flash")), "test-key".to_string())
        .expect("should create client")
}

#[test]
fn pick_model_follows_preference_order() {
    let models = vec![
        model("models/gemini-pro", &["generateContent"]),
        model("models/gemini-1.5-pro", &["generateContent", "countTokens"]),
        model("models/gemini-1.5-flash", &["embedContent"]),
    ];

    // flash cannot generate, so the next preference wins
    assert_eq!(pick_model(&models), "gemini-1.5-pro");
}

#[test]
fn pick_model_matches_by_substring() {
    let models = vec![model("models/gemini-1.5-flash-001", &["generateContent"])];
    assert_eq!(pick_model(&models), "gemini-1.5-flash-001");
}

#[test]
fn pick_model_falls_back() {
    assert_eq!(pick_model(&[]), FALLBACK_MODEL);

    let models = vec![model("models/text-bison-001", &["generateText"])];
    assert_eq!(pick_model(&models), FALLBACK_MODEL);
}

#[test]
fn model_short_name() {
    assert_eq!(model("models/gemini-pro", &[]).short_name(), "gemini-pro");
    assert_eq!(model("gemini-pro", &[]).short_name(), "gemini-pro");
}

#[test]
fn reads_key_from_env_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let env_file = temp_dir.path().join(".env");
    std::fs::write(&env_file, "OTHER=1\nGEMINI_API_KEY=from-file\n").expect("should write .env");

    assert_eq!(read_key_from_file(&env_file).as_deref(), Some("from-file"));
    assert_eq!(read_key_from_file(&temp_dir.path().join("missing")), None);

    std::fs::write(&env_file, "GEMINI_API_KEY=\n").expect("should write .env");
    assert_eq!(read_key_from_file(&env_file), None);
}

#[test]
#[serial]
fn resolve_prefers_environment() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let env_file = temp_dir.path().join(".env");
    std::fs::write(&env_file, "GEMINI_API_KEY=from-file\n").expect("should write .env");

    // SAFETY: serialized with every other test touching the process environment
    unsafe { std::env::set_var(API_KEY_ENV, "from-env") };
    let resolved = resolve_api_key(&env_file);
    // SAFETY: as above
    unsafe { std::env::remove_var(API_KEY_ENV) };

    assert_eq!(resolved.as_deref(), Some("from-env"));
    assert_eq!(resolve_api_key(&env_file).as_deref(), Some("from-file"));
}

#[test]
#[serial]
fn missing_key_is_fatal() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("defaults load");

    // SAFETY: serialized with every other test touching the process environment
    unsafe { std::env::remove_var(API_KEY_ENV) };

    let result = GeminiClient::new(&config);
    match result {
        Err(RagError::Config(message)) => assert!(message.contains(API_KEY_ENV)),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_model_skips_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = GeminiClient::with_api_key(
        &config_for(&server, Some("gemini-1.0-pro")),
        "test-key".to_string(),
    )
    .expect("should create client");
    assert_eq!(client.model(), "gemini-1.0-pro");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn automatic_selection_reads_every_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "test-key"))
        .and(query_param("pageToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{
                "name": "models/gemini-1.5-flash-latest",
                "supportedGenerationMethods": ["generateContent"]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{
                "name": "models/gemini-1.0-pro",
                "displayName": "Gemini 1.0 Pro",
                "supportedGenerationMethods": ["generateContent"]
            }],
            "nextPageToken": "next"
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::with_api_key(&config_for(&server, None), "test-key".to_string())
        .expect("should create client");

    let models = client.list_models().expect("listing succeeds");
    assert_eq!(models.len(), 2);
    assert_eq!(client.model(), "gemini-1.5-flash-latest");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn page_token_is_url_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "test-key"))
        .and(query_param("pageToken", "Ab+c/d=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{
                "name": "models/gemini-1.5-flash",
                "supportedGenerationMethods": ["generateContent"]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("pageToken", "Ab c/d=="))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid page token"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{
                "name": "models/gemini-pro",
                "supportedGenerationMethods": ["generateContent"]
            }],
            "nextPageToken": "Ab+c/d=="
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::with_api_key(
        &config_for(&server, Some("gemini-pro")),
        "test-key".to_string(),
    )
    .expect("should create client");

    let models = client.list_models().expect("listing succeeds");
    let names: Vec<&str> = models.iter().map(GeminiModel::short_name).collect();
    assert_eq!(names, ["gemini-pro", "gemini-1.5-flash"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listing_failure_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let client = GeminiClient::with_api_key(&config_for(&server, None), "bad-key".to_string())
        .expect("construction does not depend on listing");
    assert_eq!(client.model(), FALLBACK_MODEL);

    let result = client.list_models();
    assert!(matches!(result, Err(RagError::Llm(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_joins_text_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(serde_json::json!({
            "contents": [{"parts": [{"text": "Q: why?\nA:"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Because "}, {"text": "of the context."}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .generate("Q: why?\nA:")
        .expect("generation succeeds");
    assert_eq!(text.as_deref(), Some("Because of the context."));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_without_text_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}],
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let text = client_for(&server)
        .generate("anything")
        .expect("generation succeeds");
    assert_eq!(text, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).generate("anything");
    match result {
        Err(RagError::Llm(message)) => {
            assert!(message.contains("503"), "{}", message);
            assert!(message.contains("overloaded"), "{}", message);
            assert!(!message.contains("test-key"), "{}", message);
        }
        other => panic!("expected LLM error, got {:?}", other),
    }
}
