//! Integration tests for the HTTP OCR provider against a mock endpoint.
//!
//! These verify the request shape sent to an Ollama-compatible server and
//! that every failure mode collapses into a deterministic outcome rather
//! than an error the caller has to handle.

use cairn_vision::{HttpOcrProvider, VisionProvider};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_successful_extraction_yields_text_labels() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "stream": false,
            "images": ["aW1nLWJ5dGVz"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "Grocery list:\n- milk\n- bread"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = HttpOcrProvider::new(mock_server.uri(), "test-model".to_string());
    let outcome = provider.analyze(b"img-bytes", "image/png").await;

    assert!(outcome.success, "unexpected failure: {}", outcome.error);
    assert_eq!(outcome.ocr_text, "Grocery list:\n- milk\n- bread");
    assert_eq!(outcome.labels, vec!["document", "text"]);
    assert!(outcome.error.is_empty());
}

#[tokio::test]
async fn test_blank_response_yields_no_labels() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "  \n "})),
        )
        .mount(&mock_server)
        .await;

    let provider = HttpOcrProvider::new(mock_server.uri(), "test-model".to_string());
    let outcome = provider.analyze(b"img", "image/jpeg").await;

    assert!(outcome.success);
    assert!(outcome.ocr_text.is_empty());
    assert!(outcome.labels.is_empty());
}

#[tokio::test]
async fn test_server_error_reports_failure_outcome() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&mock_server)
        .await;

    let provider = HttpOcrProvider::new(mock_server.uri(), "test-model".to_string());
    let outcome = provider.analyze(b"img", "image/png").await;

    assert!(!outcome.success);
    assert!(outcome.ocr_text.is_empty());
    assert!(outcome.labels.is_empty());
    assert!(
        outcome.error.contains("500") && outcome.error.contains("model not loaded"),
        "error should carry status and body: {}",
        outcome.error
    );
}

#[tokio::test]
async fn test_malformed_response_reports_failure_outcome() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let provider = HttpOcrProvider::new(mock_server.uri(), "test-model".to_string());
    let outcome = provider.analyze(b"img", "image/png").await;

    assert!(!outcome.success);
    assert!(
        outcome.error.contains("parse"),
        "error should mention parsing: {}",
        outcome.error
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_reports_failure_outcome() {
    // Port 9 (discard) is almost never listening; the connection is
    // refused immediately rather than timing out.
    let provider =
        HttpOcrProvider::new("http://127.0.0.1:9".to_string(), "test-model".to_string());
    let outcome = provider.analyze(b"img", "image/png").await;

    assert!(!outcome.success);
    assert!(!outcome.error.is_empty());
}

#[tokio::test]
async fn test_health_check_reflects_endpoint_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
        .mount(&mock_server)
        .await;

    let healthy = HttpOcrProvider::new(mock_server.uri(), "test-model".to_string());
    assert!(healthy.health_check().await);

    let unreachable =
        HttpOcrProvider::new("http://127.0.0.1:9".to_string(), "test-model".to_string());
    assert!(!unreachable.health_check().await);
}
