//! Integration tests for `AiClient` using wiremock HTTP mocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fitscore_core::StaticSecrets;
use fitscore_engine::{AiClient, EngineError, ModelCatalog};

const CATALOG_YAML: &str = r#"
models:
  - id: chat-solo
    provider: openai
    intelligence_score: 50
    price_per_1k_input_tokens: 0.001
    price_per_1k_output_tokens: 0.002
    max_tokens: 4096
    wire_format: chat
  - id: chat-primary
    provider: openai
    intelligence_score: 50
    price_per_1k_input_tokens: 0.001
    price_per_1k_output_tokens: 0.002
    max_tokens: 4096
    wire_format: chat
    backup_model_id: struct-backup
  - id: struct-backup
    provider: anthropic
    intelligence_score: 60
    price_per_1k_input_tokens: 0.003
    price_per_1k_output_tokens: 0.015
    max_tokens: 4096
    wire_format: structured_response
  - id: chat-big
    provider: openai
    intelligence_score: 50
    price_per_1k_input_tokens: 0.001
    price_per_1k_output_tokens: 0.002
    max_tokens: 16384
    wire_format: chat
    backup_model_id: struct-small
  - id: struct-small
    provider: anthropic
    intelligence_score: 55
    price_per_1k_input_tokens: 0.003
    price_per_1k_output_tokens: 0.015
    max_tokens: 300
    wire_format: structured_response
stage_mappings:
  triage:
    economy: chat-solo
  extraction:
    balanced: chat-solo
  analysis:
    balanced: chat-primary
workflows:
  micro_only:
    - { stage: triage, tier: economy }
    - { stage: analysis, tier: balanced }
  auto:
    - { stage: triage, tier: economy }
    - { stage: extraction, tier: balanced, gate: { data_richness_at_least: 70 } }
    - { stage: analysis, tier: balanced }
  full:
    - { stage: triage, tier: economy }
    - { stage: extraction, tier: balanced }
    - { stage: analysis, tier: balanced }
depth_workflows:
  light: micro_only
  deep: auto
  xray: full
billing:
  base_fees: { light: 0.5, deep: 1.0, xray: 2.0 }
  margin_target: 0.3
  minimum_charge: 0.1
  token_cap: 2200
"#;

fn catalog() -> Arc<ModelCatalog> {
    Arc::new(ModelCatalog::from_yaml(CATALOG_YAML).expect("test catalog should load"))
}

fn secrets() -> Arc<StaticSecrets> {
    Arc::new(StaticSecrets::from_pairs(&[
        ("OPENAI_API_KEY", "sk-openai-test"),
        ("ANTHROPIC_API_KEY", "sk-anthropic-test"),
    ]))
}

fn client(base_url: &str) -> AiClient {
    let base_urls = HashMap::from([
        ("openai".to_string(), base_url.to_string()),
        ("anthropic".to_string(), base_url.to_string()),
    ]);
    AiClient::new(
        catalog(),
        secrets(),
        base_urls,
        "fitscore-test/0.1",
        Duration::from_secs(5),
    )
    .expect("client construction should not fail")
}

fn chat_success(content: &str, prompt_tokens: u64, completion_tokens: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": prompt_tokens, "completion_tokens": completion_tokens }
    }))
}

fn structured_success(text: &str, input_tokens: u64, output_tokens: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": [{ "type": "text", "text": text }],
        "usage": { "input_tokens": input_tokens, "output_tokens": output_tokens }
    }))
}

#[tokio::test]
async fn chat_call_parses_content_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "chat-solo" })))
        .respond_with(chat_success(r#"{"answer":42}"#, 120, 80))
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("chat-solo").unwrap();
    let response = client
        .execute(model, "prompt", 256, None, Duration::from_secs(5))
        .await
        .expect("call should succeed");

    assert_eq!(response.content, r#"{"answer":42}"#);
    assert_eq!(response.tokens_in, 120);
    assert_eq!(response.tokens_out, 80);
    assert_eq!(response.model_used, "chat-solo");
    assert_eq!(response.provider, "openai");
}

#[tokio::test]
async fn structured_call_parses_content_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(serde_json::json!({ "model": "struct-backup" })))
        .and(header_exists("x-api-key"))
        .respond_with(structured_success(r#"{"ok":true}"#, 200, 150))
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("struct-backup").unwrap();
    let response = client
        .execute(model, "prompt", 512, None, Duration::from_secs(5))
        .await
        .expect("call should succeed");

    assert_eq!(response.content, r#"{"ok":true}"#);
    assert_eq!(response.tokens_in, 200);
    assert_eq!(response.tokens_out, 150);
    assert_eq!(response.model_used, "struct-backup");
    assert_eq!(response.provider, "anthropic");
}

#[tokio::test]
async fn primary_failure_falls_back_to_backup_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "chat-primary" })))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(serde_json::json!({ "model": "struct-backup" })))
        .respond_with(structured_success(r#"{"ok":true}"#, 90, 60))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("chat-primary").unwrap();
    let response = client
        .execute(model, "prompt", 256, None, Duration::from_secs(5))
        .await
        .expect("backup should rescue the call");

    assert_eq!(response.model_used, "struct-backup");
    assert_eq!(response.provider, "anthropic");
    assert_eq!(response.tokens_in, 90);
}

#[tokio::test]
async fn both_failures_surface_both_model_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("chat-primary").unwrap();
    let err = client
        .execute(model, "prompt", 256, None, Duration::from_secs(5))
        .await
        .unwrap_err();

    match err {
        EngineError::BackupExhausted {
            ref primary,
            ref backup,
            ..
        } => {
            assert_eq!(primary, "chat-primary");
            assert_eq!(backup, "struct-backup");
        }
        ref other => panic!("expected BackupExhausted, got: {other:?}"),
    }
    // The rendered message must keep the primary failure's detail.
    assert!(
        err.to_string().contains("status 500"),
        "original failure detail missing from: {err}"
    );
}

#[tokio::test]
async fn backup_request_is_capped_to_the_backup_model_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "chat-big" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    // Only matches when max_tokens was re-capped to struct-small's 300.
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(serde_json::json!({
            "model": "struct-small",
            "max_tokens": 300
        })))
        .respond_with(structured_success(r#"{"ok":true}"#, 40, 30))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("chat-big").unwrap();
    let response = client
        .execute(model, "prompt", 2000, None, Duration::from_secs(5))
        .await
        .expect("capped backup request should match the mock");

    assert_eq!(response.model_used, "struct-small");
}

#[tokio::test]
async fn failure_without_backup_propagates_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("chat-solo").unwrap();
    let err = client
        .execute(model, "prompt", 256, None, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(
        matches!(err, EngineError::Provider { status: 429, .. }),
        "expected Provider error, got: {err:?}"
    );
}

#[tokio::test]
async fn missing_secret_is_fatal_and_never_retried() {
    let server = MockServer::start().await;
    // No mocks mounted: a request reaching the server would 404 and show up
    // as a Provider error instead of MissingSecret.

    let base_urls = HashMap::from([
        ("openai".to_string(), server.uri()),
        ("anthropic".to_string(), server.uri()),
    ]);
    let client = AiClient::new(
        catalog(),
        Arc::new(StaticSecrets::default()),
        base_urls,
        "fitscore-test/0.1",
        Duration::from_secs(5),
    )
    .unwrap();

    let cat = catalog();
    let model = cat.lookup_model("chat-primary").unwrap();
    let err = client
        .execute(model, "prompt", 256, None, Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(
        matches!(err, EngineError::MissingSecret(ref name) if name == "OPENAI_API_KEY"),
        "expected MissingSecret, got: {err:?}"
    );
}

#[tokio::test]
async fn timeout_is_a_normal_failure_subject_to_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_success("{}", 1, 1).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(structured_success(r#"{"ok":true}"#, 10, 10))
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("chat-primary").unwrap();
    let response = client
        .execute(model, "prompt", 256, None, Duration::from_millis(100))
        .await
        .expect("backup should rescue the timed-out call");

    assert_eq!(response.model_used, "struct-backup");
}

#[tokio::test]
async fn output_schema_is_forwarded_to_the_provider() {
    let server = MockServer::start().await;
    // Only a request carrying the strict json_schema response format matches.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "response_format": { "type": "json_schema", "json_schema": { "strict": true } }
        })))
        .respond_with(chat_success(r#"{"scored":true}"#, 10, 5))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let cat = catalog();
    let model = cat.lookup_model("chat-solo").unwrap();
    let schema = serde_json::json!({ "type": "object" });
    let response = client
        .execute(model, "prompt", 256, Some(&schema), Duration::from_secs(5))
        .await
        .expect("schema-bearing request should match the mock");

    assert_eq!(response.content, r#"{"scored":true}"#);
}
