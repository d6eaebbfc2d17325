use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_reply(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{chunk}\"}}}}]}}\n\n"
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn test_chat_streams_reply_to_stdout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(
            serde_json::json!({"modelId": "gpt-4o-mini", "stream": true}),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_reply(&["Hello", " there!"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("PALAVER_BACKEND_URL", server.uri())
        .args(["chat", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello there!"));

    // The turn is persisted for the next invocation.
    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("PALAVER_BACKEND_URL", server.uri())
        .args(["sessions", "list"])
        .assert()
        .success();
    let state = std::fs::read_to_string(home.path().join("sessions.json")).unwrap();
    assert!(state.contains("Hello there!"));
}

#[tokio::test]
async fn test_chat_reports_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("PALAVER_BACKEND_URL", server.uri())
        .args(["chat", "hi"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Rate limited, slow down"));
}

#[tokio::test]
async fn test_chat_model_flag_sticks_on_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"modelId": "claude-3-5-sonnet"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_reply(&["ok"]), "text/event-stream"),
        )
        .expect(1..)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("PALAVER_BACKEND_URL", server.uri())
        .args(["chat", "--model", "claude-3-5-sonnet", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));

    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("PALAVER_BACKEND_URL", server.uri())
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("claude-3-5-sonnet"));
}

#[tokio::test]
async fn test_models_lists_catalog_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "gpt-4o", "type": ["llm"]},
            {"name": "text-embedding-3-small", "type": ["embedding"]}
        ])))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("PALAVER_CATALOG_URL", format!("{}/catalog.json", server.uri()))
        .args(["models"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gpt-4o"))
        .stdout(predicate::str::contains("openai"))
        .stdout(predicate::str::contains("text-embedding-3-small").not());
}
