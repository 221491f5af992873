//! Integration tests for the REST management API
//!
//! Drives the axum router in-process with a recording channel standing in
//! for the switch connection, or a real write queue where the encoded
//! frames matter.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use flowctl_daemon::session::WRITE_QUEUE_DEPTH;
use flowctl_daemon::translator::{arp_flood_flow_mod, delete_flow_mod, forward_flow_mod};
use flowctl_daemon::{
    router, ApiState, DatapathEvent, DatapathRegistry, DatapathSession, FlowController,
    OfpChannel, RecordingChannel,
};
use flowctl_types::wire::{MsgType, OfpHeader, OFP_VERSION_1_3};
use flowctl_types::{DatapathId, FlowModCommand, PortNo, DEFAULT_RULE_PRIORITY, ETH_TYPE_IPV4};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

struct Harness {
    controller: FlowController,
    app: Router,
}

impl Harness {
    fn new() -> Self {
        let registry = Arc::new(DatapathRegistry::new());
        Self {
            controller: FlowController::new(Arc::clone(&registry)),
            app: router(ApiState::new(registry)),
        }
    }

    fn connect(&self, id: u64) -> Arc<RecordingChannel> {
        let channel = Arc::new(RecordingChannel::new());
        let session = DatapathSession::with_channel(DatapathId::new(id), channel.clone());
        self.controller
            .handle_event(DatapathEvent::Connected(Arc::new(session)));
        channel
    }

    fn connect_failing(&self, id: u64, reason: &str) {
        let channel = Arc::new(RecordingChannel::failing(DatapathId::new(id), reason));
        let session = DatapathSession::with_channel(DatapathId::new(id), channel);
        self.controller
            .handle_event(DatapathEvent::Connected(Arc::new(session)));
    }

    /// Connects a session whose flow-mods are encoded onto a write queue.
    fn connect_wire(&self, id: u64) -> mpsc::Receiver<bytes::Bytes> {
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
        let channel = OfpChannel::new(DatapathId::new(id), tx, 16);
        let session =
            DatapathSession::new(DatapathId::new(id), OFP_VERSION_1_3, 254, Arc::new(channel));
        self.controller
            .handle_event(DatapathEvent::Connected(Arc::new(session)));
        rx
    }

    async fn post(&self, path: &str, body: impl Into<String>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .expect("valid request");
        self.send(request).await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = serde_json::from_slice(&bytes).expect("JSON body");
        (status, value)
    }
}

fn flow_body(dpid: u64, src: &str, dst: &str) -> String {
    json!({"dpid": dpid, "src_ip": src, "dst_ip": dst}).to_string()
}

#[tokio::test]
async fn test_end_to_end_add_then_delete() {
    let harness = Harness::new();
    let channel = harness.connect(1);
    assert_eq!(channel.sent(), vec![arp_flood_flow_mod()]);
    channel.clear();

    let (status, body) = harness
        .post("/flow/add", flow_body(1, "10.0.0.1", "10.0.0.2"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "flow added"}));

    let (status, body) = harness
        .post("/flow/delete", flow_body(1, "10.0.0.1", "10.0.0.2"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "flow deleted"}));

    assert_eq!(
        channel.sent(),
        vec![
            forward_flow_mod("10.0.0.1", "10.0.0.2", DEFAULT_RULE_PRIORITY),
            delete_flow_mod("10.0.0.1", "10.0.0.2"),
        ]
    );

    let (status, _) = harness
        .post("/flow/add", flow_body(99, "10.0.0.1", "10.0.0.2"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_submits_ipv4_match_at_priority_100() {
    let harness = Harness::new();
    let channel = harness.connect(3);
    channel.clear();

    harness
        .post("/flow/add", flow_body(3, "192.168.1.10", "192.168.1.20"))
        .await;

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    let fm = &sent[0];
    assert_eq!(fm.command, FlowModCommand::Add);
    assert_eq!(fm.priority, 100);
    assert_eq!(fm.flow_match.eth_type, Some(ETH_TYPE_IPV4));
    assert_eq!(fm.flow_match.ipv4_src.as_deref(), Some("192.168.1.10"));
    assert_eq!(fm.flow_match.ipv4_dst.as_deref(), Some("192.168.1.20"));
    assert_eq!(fm.out_port, PortNo::ANY);
}

#[tokio::test]
async fn test_unknown_datapath_is_404_on_both_endpoints() {
    let harness = Harness::new();
    let channel = harness.connect(1);
    channel.clear();

    for path in ["/flow/add", "/flow/delete"] {
        let (status, body) = harness
            .post(path, flow_body(42, "10.0.0.1", "10.0.0.2"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Datapath not found"}));
    }
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_non_json_body_is_400_and_submits_nothing() {
    let harness = Harness::new();
    let channel = harness.connect(1);
    channel.clear();

    for path in ["/flow/add", "/flow/delete"] {
        let (status, body) = harness.post(path, "this is not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid JSON"}));
    }
    assert!(channel.sent().is_empty());
}

#[tokio::test]
async fn test_missing_field_is_400() {
    let harness = Harness::new();
    harness.connect(1);

    let (status, body) = harness
        .post("/flow/add", json!({"dpid": 1, "src_ip": "10.0.0.1"}).to_string())
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid JSON"}));
}

#[tokio::test]
async fn test_string_dpid_is_accepted() {
    let harness = Harness::new();
    harness.connect(5);

    let (status, body) = harness
        .post(
            "/flow/add",
            json!({"dpid": "5", "src_ip": "10.0.0.1", "dst_ip": "10.0.0.2"}).to_string(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "flow added"}));
}

#[tokio::test]
async fn test_transport_failure_is_500_with_message() {
    let harness = Harness::new();
    harness.connect_failing(8, "connection writer closed");

    let (status, body) = harness
        .post("/flow/add", flow_body(8, "10.0.0.1", "10.0.0.2"))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "Transport error on datapath 0000000000000008: connection writer closed"})
    );
}

#[tokio::test]
async fn test_disconnected_datapath_is_404() {
    let harness = Harness::new();
    harness.connect(2);
    harness.controller.handle_event(DatapathEvent::Disconnected {
        id: DatapathId::new(2),
        session: None,
    });

    let (status, _) = harness
        .post("/flow/delete", flow_body(2, "10.0.0.1", "10.0.0.2"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_datapaths() {
    let harness = Harness::new();
    harness.connect(3);
    harness.connect(1);

    let (status, body) = harness.get("/flow/datapaths").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"datapaths": [1, 3]}));
}

#[tokio::test]
async fn test_malformed_address_is_500_encoding_error() {
    let harness = Harness::new();
    let mut frames = harness.connect_wire(4);
    let bootstrap = frames.try_recv().expect("bootstrap frame queued");
    assert_eq!(
        OfpHeader::parse(&bootstrap).unwrap().msg_type,
        MsgType::FlowMod
    );

    for path in ["/flow/add", "/flow/delete"] {
        let (status, body) = harness
            .post(path, flow_body(4, "10.0.0.300", "10.0.0.2"))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"error": "Encoding error: invalid IPv4 address: \"10.0.0.300\""})
        );
    }
    assert!(frames.try_recv().is_err());

    let (status, _) = harness
        .post("/flow/add", flow_body(4, "10.0.0.1", "10.0.0.2"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let frame = frames.try_recv().expect("flow-mod queued");
    // Fixed part, three OXM fields padded to 32, one OUTPUT instruction
    assert_eq!(frame.len(), 104);
}

#[tokio::test]
async fn test_delete_transport_failure_is_500() {
    let harness = Harness::new();
    harness.connect_failing(6, "connection writer closed");

    let (status, body) = harness
        .post("/flow/delete", flow_body(6, "10.0.0.1", "10.0.0.2"))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "Transport error on datapath 0000000000000006: connection writer closed"})
    );
}
