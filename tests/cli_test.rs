//! End-to-end tests driving the `relay` binary over stdin.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::process::{Output, Stdio};

use serde_json::json;
use tokio::{io::AsyncWriteExt, process::Command};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

async fn run_relay(workflows: &str, input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_relay"))
        .current_dir(std::env::temp_dir())
        .env("RELAY_WORKFLOWS", workflows)
        .env("RELAY_SHARED_SECRET", "teehee")
        .env("RELAY_MAX_RETRIES", "0")
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("relay binary should start");

    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(input.as_bytes()).await.unwrap();
    drop(stdin);

    child.wait_with_output().await.unwrap()
}

#[tokio::test]
async fn forwards_each_line_to_every_workflow() {
    let server = MockServer::start().await;
    let event = json!({"type": "track", "userId": "u-1", "event": "Signed Up"});

    Mock::given(matchers::method("POST"))
        .and(matchers::header_exists("X-Signature"))
        .and(matchers::body_json(&event))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let workflows = format!("{0}/a,not a url,{0}/b", server.uri());
    let output = run_relay(&workflows, &format!("{event}\n")).await;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[tokio::test]
async fn exits_non_zero_when_every_workflow_fails() {
    let server = MockServer::start().await;

    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let workflows = format!("{}/track/error", server.uri());
    let output = run_relay(&workflows, "{\"type\":\"identify\"}\n").await;

    assert!(!output.status.success());
}

#[tokio::test]
async fn undecodable_input_fails_the_run() {
    let server = MockServer::start().await;

    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let input = "{\"type\":\"page\"}\n{\"type\":\"bogus\"}\n";
    let output = run_relay(&server.uri(), input).await;

    assert!(!output.status.success());
}
