//! Connection Flow Tests
//!
//! Tests for the staged connect -> signin -> use flow:
//! - Full success
//! - Failure at each stage, with the connection closed afterwards
//! - Missing configuration

mod common;

use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use surreal_rpc::connection::Outbound;
use surreal_rpc::{Auth, Client, ClientBuilder, FlowStage, Outcome, SelectOutcome};

fn configured(connector: Arc<MockConnector>) -> ClientBuilder {
    Client::builder()
        .host(MOCK_HOST)
        .auth(Auth::root("root", "root"))
        .use_config("test", "app")
        .reconnect_policy(fast_policy())
        .connector(connector)
}

// ============================================================================
// Success
// ============================================================================

#[tokio::test]
async fn test_flow_success() {
    let (connector, mut servers) = MockConnector::accepting();
    let client = configured(connector).build();

    let flow = tokio::spawn({
        let client = client.clone();
        async move { client.start_connection_flow().await }
    });

    let mut server = servers.next().await;
    let signin = server.next_request().await;
    assert_eq!(signin["method"], "signin");
    server.reply(&signin["id"], json!("session-token"));

    let use_request = server.next_request().await;
    assert_eq!(use_request["method"], "use");
    assert_eq!(use_request["params"], json!(["test", "app"]));
    server.reply(&use_request["id"], Value::Null);

    let flow = flow.await.unwrap();
    assert!(flow.did_succeed());
    assert_eq!(flow.failure_stage(), None);
    assert_eq!(flow.stage(), Some(FlowStage::Use));
    assert_eq!(flow.auth().token(), Some("session-token"));
    assert!(flow.select().did_succeed());
    assert!(client.is_connected());
    assert_eq!(client.token().as_deref(), Some("session-token"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_flow_connect_failure() {
    let (connector, _servers) = MockConnector::scripted(vec![], Step::Refuse);
    let client = configured(connector.clone()).build();

    let flow = client.start_connection_flow().await;

    assert!(flow.did_fail());
    assert_eq!(flow.failure_stage(), Some(FlowStage::Connect));
    assert!(flow.error().unwrap().contains("connection refused"));
    assert!(flow.auth().did_fail());
    assert_eq!(flow.auth().error(), None);
    assert!(!client.is_connected());
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn test_flow_signin_failure_skips_use() {
    let (connector, mut servers) = MockConnector::accepting();
    let client = configured(connector).build();

    let flow = tokio::spawn({
        let client = client.clone();
        async move { client.start_connection_flow().await }
    });

    let mut server = servers.next().await;
    let signin = server.next_request().await;
    server.reply_error(&signin["id"], "There was a problem with authentication");

    let flow = flow.await.unwrap();
    assert_eq!(flow.failure_stage(), Some(FlowStage::Signin));
    assert_eq!(
        flow.error(),
        Some("There was a problem with authentication")
    );
    assert!(flow.auth().did_fail());
    assert_eq!(flow.select(), &SelectOutcome::default());

    // The connection is closed rather than left half set up
    assert!(matches!(server.next_frame().await, Outbound::Close { .. }));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_flow_use_failure() {
    let (connector, mut servers) = MockConnector::accepting();
    let client = configured(connector).build();

    let flow = tokio::spawn({
        let client = client.clone();
        async move { client.start_connection_flow().await }
    });

    let mut server = servers.next().await;
    let signin = server.next_request().await;
    server.reply(&signin["id"], json!("session-token"));
    let use_request = server.next_request().await;
    server.reply_error(&use_request["id"], "Database not found");

    let flow = flow.await.unwrap();
    assert_eq!(flow.failure_stage(), Some(FlowStage::Use));
    assert_eq!(flow.error(), Some("Database not found"));
    assert!(flow.auth().did_succeed());
    assert!(flow.select().did_fail());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_flow_reuses_open_connection() {
    let (connector, mut servers) = MockConnector::accepting();
    let client = configured(connector.clone()).build();
    client.connect().await.unwrap();
    let mut server = servers.next().await;

    let flow = tokio::spawn({
        let client = client.clone();
        async move { client.start_connection_flow().await }
    });

    let signin = server.next_request().await;
    server.reply(&signin["id"], json!("token"));
    let use_request = server.next_request().await;
    server.reply(&use_request["id"], Value::Null);

    assert!(flow.await.unwrap().did_succeed());
    assert_eq!(connector.attempts(), 1);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_flow_requires_full_configuration() {
    let (connector, _servers) = MockConnector::accepting();
    let client = Client::builder()
        .host(MOCK_HOST)
        .connector(connector.clone())
        .build();

    let flow = client.start_connection_flow().await;

    assert_eq!(flow.failure_stage(), Some(FlowStage::Connect));
    assert!(flow.error().unwrap().contains("not configured"));
    assert_eq!(connector.attempts(), 0);
}
