//! Completion webhooks for asynchronous API runs

mod common;

use autoforge::runtime::RunInput;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use common::{harness, save};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Local receiver that forwards every delivered body to a channel
async fn receiver() -> (String, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route(
            "/hook",
            post(
                |State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>| async move {
                    let _ = tx.send(body);
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .with_state(tx);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/hook", addr), rx)
}

#[tokio::test]
async fn test_async_run_posts_completion() {
    let (url, mut deliveries) = receiver().await;
    let (state, store) = harness(4).await;
    save(
        store.as_ref(),
        json!({
            "id": "hooked", "name": "hooked",
            "api": {"webhook_url": url},
            "nodes": [
                {"id": "start", "type": "trigger"},
                {"id": "pause", "type": "delay", "config": {"duration": 0}},
                {"id": "note", "type": "tool", "toolCode": "record", "config": {"said": "{{external.msg}}"}}
            ],
            "edges": [{"source": "start", "target": "pause"}, {"source": "pause", "target": "note"}]
        }),
    )
    .await;

    let mut params = serde_json::Map::new();
    params.insert("msg".into(), json!("hi"));
    let execution = state
        .invoker
        .run_async("hooked", RunInput { params, ..Default::default() })
        .await
        .unwrap();

    let payload = tokio::time::timeout(Duration::from_secs(5), deliveries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload["execution_id"], execution.id.as_str());
    assert_eq!(payload["workflow_id"], "hooked");
    assert_eq!(payload["status"], "success");
    assert_eq!(payload["error"], "");
    assert_eq!(payload["outputs"]["note"]["said"], "hi");
    assert_eq!(payload["outputs"]["start"]["triggered"], true);
    assert!(payload["end_time"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_failed_async_run_still_notifies() {
    let (url, mut deliveries) = receiver().await;
    let (state, store) = harness(4).await;
    save(
        store.as_ref(),
        json!({
            "id": "broken", "name": "broken",
            "api": {"webhook_url": url},
            "nodes": [{"id": "t", "type": "tool", "toolCode": "nowhere", "config": {"a": 1}}]
        }),
    )
    .await;

    state
        .invoker
        .run_async("broken", RunInput::default())
        .await
        .unwrap();

    let payload = tokio::time::timeout(Duration::from_secs(5), deliveries.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload["status"], "failed");
    assert_eq!(payload["error"], "tool not found: nowhere");
}
