// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cadre_core::SystemClock;
use cadre_dispatch::{Dispatch, Dispatcher, LocalQueue};
use cadre_engine::{AgentRouter, Engine, PlanRegistry};
use cadre_store::MemoryStore;
use cadre_wire::{read_message, write_message};
use serde_json::json;
use std::sync::Arc;

fn test_ctx() -> DaemonCtx {
    let store = Arc::new(MemoryStore::new());
    let (queue, _rx) = LocalQueue::new();
    let dispatcher: Arc<dyn Dispatch> = Arc::new(Dispatcher::new(Arc::new(queue)));
    let engine = Engine::new(
        store.clone(),
        store.clone(),
        dispatcher.clone(),
        AgentRouter::new(),
        PlanRegistry::new(),
        SystemClock,
    );
    DaemonCtx {
        engine,
        jobs: store.clone(),
        queue_jobs: store,
        dispatcher,
    }
}

#[tokio::test]
async fn requests_round_trip_over_the_socket() {
    let dir = tempfile::TempDir::new().unwrap();
    let socket = dir.path().join("cadred.sock");
    let shutdown = CancellationToken::new();
    let listener = Listener::bind(&socket, test_ctx(), shutdown.clone()).unwrap();
    let task = tokio::spawn(listener.run());

    let mut client = UnixStream::connect(&socket).await.unwrap();
    write_message(
        &mut client,
        &Request::GetRun {
            run_id: "run-ghost".to_string(),
        },
    )
    .await
    .unwrap();
    let response: Option<Response> = read_message(&mut client).await.unwrap();
    match response {
        Some(Response::Error { code, .. }) => assert_eq!(code, 404),
        other => panic!("unexpected response: {other:?}"),
    }

    // Connections handle multiple requests in sequence
    write_message(
        &mut client,
        &Request::Signal {
            token: "ghost".to_string(),
            payload: json!({}),
        },
    )
    .await
    .unwrap();
    let response: Option<Response> = read_message(&mut client).await.unwrap();
    assert!(matches!(response, Some(Response::Error { code: 404, .. })));

    shutdown.cancel();
    let _ = task.await;
    assert!(!socket.exists());
}

#[tokio::test]
async fn stale_socket_files_are_replaced() {
    let dir = tempfile::TempDir::new().unwrap();
    let socket = dir.path().join("cadred.sock");
    std::fs::write(&socket, b"stale").unwrap();

    let shutdown = CancellationToken::new();
    let listener = Listener::bind(&socket, test_ctx(), shutdown.clone()).unwrap();
    let task = tokio::spawn(listener.run());

    let client = UnixStream::connect(&socket).await;
    assert!(client.is_ok());

    shutdown.cancel();
    let _ = task.await;
}
