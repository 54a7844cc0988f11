use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> EmbeddingConfig {
    let address = server.address();
    EmbeddingConfig {
        host: address.ip().to_string(),
        port: address.port(),
        model: "test-model".to_string(),
        ..EmbeddingConfig::default()
    }
}

fn fast_client(server: &MockServer, attempts: u32) -> EmbeddingClient {
    EmbeddingClient::new(&config_for(server))
        .expect("Failed to create client")
        .with_retry_policy(RetryPolicy::new(attempts, Duration::from_millis(1)))
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        ..EmbeddingConfig::default()
    };
    let client = EmbeddingClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model(), "test-model");
    assert_eq!(client.endpoint().host_str(), Some("test-host"));
    assert_eq!(client.endpoint().port(), Some(1234));
    assert_eq!(client.endpoint().path(), "/api/embeddings");
    assert_eq!(client.retry, RetryPolicy::default());
    assert_eq!(client.cached_dimension(), None);
}

#[test]
fn client_builder_methods() {
    let client = EmbeddingClient::new(&EmbeddingConfig::default())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_policy(RetryPolicy::new(5, Duration::from_millis(10)));

    assert_eq!(client.retry.max_attempts, 5);
    assert_eq!(client.retry.backoff_unit, Duration::from_millis(10));
}

#[test]
fn parse_valid_response() {
    let embedding =
        parse_embedding(r#"{"embedding": [0.1, 0.2, 0.3]}"#).expect("response should parse");
    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[test]
fn parse_missing_embedding_field() {
    let result = parse_embedding(r#"{"error": "model not loaded"}"#);
    assert!(matches!(result, Err(EmbeddingError::MalformedResponse(_))));
}

#[test]
fn parse_invalid_json() {
    let result = parse_embedding("<html>Bad Gateway</html>");
    assert!(matches!(result, Err(EmbeddingError::MalformedResponse(_))));
}

#[test]
fn parse_empty_embedding() {
    let result = parse_embedding(r#"{"embedding": []}"#);
    assert!(matches!(result, Err(EmbeddingError::MalformedResponse(_))));
}

#[test]
fn unreachable_backend_is_unavailable() {
    // Nothing listens on port 1
    let config = EmbeddingConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..EmbeddingConfig::default()
    };
    let client = EmbeddingClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(2))
        .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(1)));

    assert!(!client.is_available());
    assert!(matches!(
        client.embed("hello"),
        Err(EmbeddingError::Connectivity(_))
    ));
}

#[tokio::test]
async fn embed_sends_model_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({"model": "test-model", "prompt": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.25, -0.5, 1.0]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server, 3);
    let (embedding, dimension) = tokio::task::spawn_blocking(move || {
        let embedding = client.embed("hello");
        (embedding, client.cached_dimension())
    })
    .await
    .expect("blocking task should finish");

    assert_eq!(
        embedding.expect("embedding should succeed"),
        vec![0.25, -0.5, 1.0]
    );
    assert_eq!(dimension, Some(3));
}

#[tokio::test]
async fn missing_field_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"model": "test-model"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server, 3);
    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("blocking task should finish");

    assert!(matches!(result, Err(EmbeddingError::MalformedResponse(_))));
}

#[tokio::test]
async fn server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = fast_client(&server, 3);
    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("blocking task should finish");

    match result {
        Err(EmbeddingError::Connectivity(message)) => assert!(message.contains("503")),
        other => panic!("expected connectivity error, got {:?}", other),
    }
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [1.0, 0.0]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server, 3);
    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("blocking task should finish");

    assert_eq!(result.expect("third attempt should succeed"), vec![1.0, 0.0]);
}

#[tokio::test]
async fn dimension_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({"model": "test-model", "prompt": SENTINEL_TEXT})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2, 0.3, 0.4]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = fast_client(&server, 1);
    let (first, second) = tokio::task::spawn_blocking(move || (client.dimension(), client.dimension()))
        .await
        .expect("blocking task should finish");

    assert_eq!(first.expect("dimension lookup should succeed"), 4);
    assert_eq!(second.expect("cached dimension"), 4);
}

#[tokio::test]
async fn changed_dimension_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2, 0.3]})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2]})))
        .mount(&server)
        .await;

    let client = fast_client(&server, 1);
    let (first, second) = tokio::task::spawn_blocking(move || (client.embed("one"), client.embed("two")))
        .await
        .expect("blocking task should finish");

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn embed_many_preserves_order_and_reports_progress() {
    let server = MockServer::start().await;
    for (prompt, value) in [("first", 1.0), ("second", 2.0), ("third", 3.0)] {
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_json(json!({"model": "test-model", "prompt": prompt})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [value, 0.0]})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = fast_client(&server, 1);
    let (embeddings, progress) = tokio::task::spawn_blocking(move || {
        let texts = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        let mut progress = Vec::new();
        let embeddings =
            client.embed_many_with_progress(&texts, &mut |done, total| progress.push((done, total)));
        (embeddings, progress)
    })
    .await
    .expect("blocking task should finish");

    let embeddings = embeddings.expect("all embeddings should succeed");
    assert_eq!(
        embeddings,
        vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0]]
    );
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
}
