//! End-to-end agent loop against a loopback control plane.

use std::sync::Arc;
use std::time::Duration;

use executor_link_agent::{AgentConfig, NullHandler, run_agent};
use executor_link_core::retry::RetryError;
use executor_link_core::{KeepaliveConfig, RetryConfig};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;

type ServerSocket = WebSocketStream<TcpStream>;

fn test_config(url: String) -> AgentConfig {
    AgentConfig {
        control_plane_url: url,
        executor_id: "exec-test".to_string(),
        private_key_path: None,
        send_executor_id: true,
        keepalive: KeepaliveConfig::default(),
        retry: RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(10),
            reset_period: None,
            use_exponential: false,
        },
    }
}

async fn next_json(socket: &mut ServerSocket) -> Value {
    loop {
        match socket.next().await.expect("peer hung up").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            // Keepalive traffic is not part of the conversation.
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_hello_failure_reply_and_ordered_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();

        let hello = next_json(&mut socket).await;
        assert_eq!(hello["type"], "hello");
        assert_eq!(hello["executor_id"], "exec-test");
        assert!(hello["version"].as_str().is_some_and(|v| !v.is_empty()));

        socket
            .send(Message::Text(
                r#"{"type":"request","id":"r-1","operation":"snapshot"}"#.into(),
            ))
            .await
            .unwrap();

        let failure = next_json(&mut socket).await;
        assert_eq!(failure["type"], "failure");
        assert_eq!(failure["id"], "r-1");
        assert!(
            failure["message"]
                .as_str()
                .is_some_and(|m| m.contains("snapshot"))
        );

        socket
            .send(Message::Text(
                r#"{"type":"shutdown","reason":"rollout"}"#.into(),
            ))
            .await
            .unwrap();

        // The executor answers the shutdown with a normal close frame.
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    });

    let config = test_config(format!("ws://{addr}/executor"));
    let result = run_agent(config, Arc::new(NullHandler), CancellationToken::new()).await;
    assert!(result.is_ok(), "agent should exit cleanly: {result:?}");

    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_control_plane_exhausts_retries() {
    // Bind then drop so the port is very likely unoccupied.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = test_config(format!("ws://{addr}/executor"));
    config.retry.max_attempts = 2;

    let result = run_agent(config, Arc::new(NullHandler), CancellationToken::new()).await;
    match result {
        Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_pre_cancelled_token_stops_without_dialing() {
    let config = test_config("ws://127.0.0.1:1/executor".to_string());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run_agent(config, Arc::new(NullHandler), cancel).await;
    assert!(matches!(result, Err(RetryError::Cancelled)));
}
