//! Gemini adapter against a local HTTP double.

use std::time::Duration;

use incident_memory::{EmbedOutcome, Embedder, EmbeddingConfig, EmbeddingMode, GeminiEmbedder};
use mockito::Matcher;
use serde_json::json;

const PATH: &str = "/models/embedding-001:embedContent";

fn embedder_for(server: &mockito::ServerGuard, dimension: usize) -> GeminiEmbedder {
    GeminiEmbedder::new(
        EmbeddingConfig::with_api_key("test-key")
            .with_base_url(server.url())
            .with_dimension(dimension)
            .with_request_timeout(Duration::from_secs(2)),
    )
}

#[tokio::test]
async fn sends_document_task_type_and_parses_values() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("x-goog-api-key", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "models/embedding-001",
            "taskType": "RETRIEVAL_DOCUMENT",
            "outputDimensionality": 3,
            "content": { "parts": [{ "text": "I can't login" }] }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } }).to_string())
        .create_async()
        .await;

    let outcome = embedder_for(&server, 3)
        .embed("I can't login", EmbeddingMode::Document)
        .await;

    assert_eq!(outcome, EmbedOutcome::Ready(vec![0.1, 0.2, 0.3]));
    mock.assert_async().await;
}

#[tokio::test]
async fn query_mode_uses_query_task_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({ "taskType": "RETRIEVAL_QUERY" })))
        .with_status(200)
        .with_body(json!({ "embedding": { "values": [1.0, 0.0] } }).to_string())
        .create_async()
        .await;

    let outcome = embedder_for(&server, 2)
        .embed("Logging in does not work", EmbeddingMode::Query)
        .await;

    assert!(outcome.is_ready());
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_and_rate_limits_are_unavailable() {
    for status in [500, 503, 429] {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", PATH)
            .with_status(status)
            .with_body("try later")
            .create_async()
            .await;

        let outcome = embedder_for(&server, 3)
            .embed("anything", EmbeddingMode::Query)
            .await;
        assert_eq!(outcome, EmbedOutcome::Unavailable, "status {status}");
    }
}

#[tokio::test]
async fn client_errors_are_invalid() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(400)
        .with_body(r#"{"error":{"message":"API key not valid"}}"#)
        .create_async()
        .await;

    match embedder_for(&server, 3)
        .embed("anything", EmbeddingMode::Document)
        .await
    {
        EmbedOutcome::Invalid(reason) => assert!(reason.contains("400")),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_invalid() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(r#"{"unexpected":true}"#)
        .create_async()
        .await;

    assert!(matches!(
        embedder_for(&server, 3)
            .embed("anything", EmbeddingMode::Document)
            .await,
        EmbedOutcome::Invalid(_)
    ));
}

#[tokio::test]
async fn wrong_dimension_is_invalid() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(json!({ "embedding": { "values": [0.1, 0.2] } }).to_string())
        .create_async()
        .await;

    assert!(matches!(
        embedder_for(&server, 3)
            .embed("anything", EmbeddingMode::Document)
            .await,
        EmbedOutcome::Invalid(_)
    ));
}

#[tokio::test]
async fn empty_text_never_reaches_the_provider() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", PATH).expect(0).create_async().await;

    assert_eq!(
        embedder_for(&server, 3).embed("", EmbeddingMode::Query).await,
        EmbedOutcome::Unavailable
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_provider_is_unavailable() {
    let embedder = GeminiEmbedder::new(
        EmbeddingConfig::with_api_key("test-key")
            .with_base_url("http://127.0.0.1:9")
            .with_dimension(3)
            .with_request_timeout(Duration::from_millis(500)),
    );

    assert_eq!(
        embedder.embed("anything", EmbeddingMode::Query).await,
        EmbedOutcome::Unavailable
    );
}
