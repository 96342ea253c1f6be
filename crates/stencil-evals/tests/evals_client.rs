//! Integration tests for EvalsClient.
//!
//! Uses wiremock for HTTP mocking. Tests cover the four endpoints, status
//! mapping (401/404/429/5xx) and retry behavior.

use std::io::Write;
use std::time::Duration;

use serde_json::json;
use stencil_core::eval::{Criterion, CriterionKind};
use stencil_core::grading::{RemoteRunStatus, RunRequest, TemplateMessage};
use stencil_core::{GradingClient, GradingError};
use stencil_evals::{EvalsClient, EvalsConfig};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_client(mock_server: &MockServer, max_retries: u32) -> EvalsClient {
    let config = EvalsConfig::default()
        .with_url(mock_server.uri())
        .with_api_key("test-key")
        .with_max_retries(max_retries);
    EvalsClient::new(config).expect("failed to create client")
}

fn run_request() -> RunRequest {
    RunRequest {
        eval_id: "eval_1".into(),
        name: "smoke - v1".into(),
        model: "gpt-4o-mini".into(),
        temperature: Some(0.0),
        max_tokens: None,
        messages: vec![
            TemplateMessage {
                role: "system".into(),
                content: String::new(),
            },
            TemplateMessage {
                role: "user".into(),
                content: "Hello {{ item.name }}".into(),
            },
        ],
        file_id: "file_1".into(),
    }
}

#[tokio::test]
async fn test_create_eval_sends_schema_and_criteria() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/evals"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "name": "Greeting - smoke",
            "data_source_config": { "type": "custom" },
            "testing_criteria": [{ "type": "string_check", "operation": "eq" }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "eval_123"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let criterion = Criterion {
        name: "exact_match".into(),
        kind: CriterionKind::Equals,
    };
    let eval = client
        .create_eval("Greeting - smoke", &json!({"type": "object"}), &[criterion])
        .await
        .expect("create_eval failed");
    assert_eq!(eval.id, "eval_123");
}

#[tokio::test]
async fn test_upload_file_is_multipart() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/files"))
        .and(body_string_contains("evals"))
        .and(body_string_contains("expected_output"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file_9"})))
        .mount(&mock_server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"item": {{"name": "Ann", "expected_output": "Hi"}}}}"#).unwrap();

    let client = create_test_client(&mock_server, 0);
    let uploaded = client.upload_file(file.path()).await.expect("upload failed");
    assert_eq!(uploaded.id, "file_9");
}

#[tokio::test]
async fn test_upload_missing_file() {
    let mock_server = MockServer::start().await;
    let client = create_test_client(&mock_server, 0);
    let result = client
        .upload_file(std::path::Path::new("/nonexistent/data.jsonl"))
        .await;
    assert!(matches!(result, Err(GradingError::File { .. })));
}

#[tokio::test]
async fn test_create_run_returns_report_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/evals/eval_1/runs"))
        .and(body_partial_json(json!({
            "name": "smoke - v1",
            "data_source": {
                "type": "completions",
                "model": "gpt-4o-mini",
                "source": { "type": "file_id", "id": "file_1" },
            },
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "run_1",
            "report_url": "https://platform.example/evals/run_1",
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let run = client.create_run(&run_request()).await.expect("create_run failed");
    assert_eq!(run.id, "run_1");
    assert_eq!(
        run.report_url.as_deref(),
        Some("https://platform.example/evals/run_1")
    );
}

#[tokio::test]
async fn test_get_run_completed_with_counts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/evals/eval_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "run_1",
            "status": "completed",
            "result_counts": { "total": 10, "passed": 8, "failed": 1, "errored": 1 },
            "error": null,
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let report = client.get_run("eval_1", "run_1").await.expect("get_run failed");
    assert_eq!(report.status, RemoteRunStatus::Completed);
    let counts = report.result_counts.unwrap();
    assert_eq!((counts.total, counts.passed, counts.errored), (10, 8, 1));
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_get_run_failed_carries_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/evals/eval_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "error": { "code": "model_error", "message": "model not found" },
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let report = client.get_run("eval_1", "run_1").await.unwrap();
    assert_eq!(report.status, RemoteRunStatus::Failed);
    assert_eq!(report.error.as_deref(), Some("model not found"));
}

#[tokio::test]
async fn test_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/evals/eval_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided" },
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 3);
    let result = client.get_run("eval_1", "run_1").await;
    match result {
        Err(GradingError::Authentication { message }) => {
            assert_eq!(message, "Incorrect API key provided")
        }
        other => panic!("expected Authentication, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_api_key_fails_before_request() {
    let mock_server = MockServer::start().await;
    let client = EvalsClient::new(EvalsConfig::default().with_url(mock_server.uri())).unwrap();
    let result = client.get_run("eval_1", "run_1").await;
    assert!(matches!(result, Err(GradingError::Authentication { .. })));
}

#[tokio::test]
async fn test_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/evals/missing/runs/run_1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let result = client.get_run("missing", "run_1").await;
    assert!(matches!(result, Err(GradingError::NotFound { .. })));
}

#[tokio::test]
async fn test_rate_limited_with_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/evals/eval_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "60"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let result = client.get_run("eval_1", "run_1").await;
    match result {
        Err(GradingError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(60)));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_error_maps_to_api() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/evals"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "item_schema is invalid" },
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 3);
    let result = client.create_eval("x", &json!({}), &[]).await;
    match result {
        Err(GradingError::Api { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "item_schema is invalid");
        }
        other => panic!("expected Api, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_on_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/evals/eval_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/evals/eval_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "in_progress"})))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 2);
    let report = client.get_run("eval_1", "run_1").await.expect("retry should succeed");
    assert_eq!(report.status, RemoteRunStatus::InProgress);
}

#[tokio::test]
async fn test_max_retries_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/evals/eval_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 1);
    let result = client.get_run("eval_1", "run_1").await;
    assert!(matches!(result, Err(GradingError::Api { status: 500, .. })));
}
