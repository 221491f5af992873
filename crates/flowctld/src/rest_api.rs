//! REST management API for flowctld
//!
//! Provides HTTP/REST endpoints using the Axum web framework:
//!
//! | Method | Path              | Effect                               |
//! |--------|-------------------|--------------------------------------|
//! | POST   | `/flow/add`       | Install an IPv4 src/dst forward rule |
//! | POST   | `/flow/delete`    | Remove matching IPv4 src/dst rules   |
//! | GET    | `/flow/datapaths` | List connected datapath ids          |
//!
//! Each request runs parse, resolve, apply and respond. A failure before
//! apply guarantees no flow-mod was submitted. All errors are converted to
//! HTTP in [`ApiError::into_response`].
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-10: Information Input Validation - Strict request decoding
//! - SI-11: Error Handling - Uniform JSON error bodies
//! - AU-12: Audit Record Generation - Every rule change is logged

use crate::error::FlowCtlError;
use crate::registry::DatapathRegistry;
use crate::translator::{install_forward_rule, remove_forward_rule};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use flowctl_types::{DatapathId, DEFAULT_RULE_PRIORITY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct ApiState {
    registry: Arc<DatapathRegistry>,
}

impl ApiState {
    pub fn new(registry: Arc<DatapathRegistry>) -> Self {
        Self { registry }
    }
}

/// Route table for the management API.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/flow/add", post(add_flow))
        .route("/flow/delete", post(delete_flow))
        .route("/flow/datapaths", get(list_datapaths))
        .with_state(state)
}

/// `dpid` as sent by clients: a JSON integer, or a string holding a decimal
/// or `0x`-prefixed hex value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DpidField {
    Int(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawFlowRequest {
    dpid: DpidField,
    src_ip: String,
    dst_ip: String,
}

/// Body of `POST /flow/add` and `POST /flow/delete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRequest {
    pub dpid: DatapathId,
    pub src_ip: String,
    pub dst_ip: String,
}

impl FlowRequest {
    /// Decodes a request body. Any structural problem is `InvalidJson`.
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let raw: RawFlowRequest =
            serde_json::from_slice(body).map_err(|_| ApiError::InvalidJson)?;
        let dpid = match raw.dpid {
            DpidField::Int(id) => DatapathId::new(id),
            DpidField::Text(text) => text.parse().map_err(|_| ApiError::InvalidJson)?,
        };
        Ok(Self {
            dpid,
            src_ip: raw.src_ip,
            dst_ip: raw.dst_ip,
        })
    }
}

/// Which translator operation an endpoint maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOperation {
    Install,
    Remove,
}

impl FlowOperation {
    fn success_status(&self) -> &'static str {
        match self {
            FlowOperation::Install => "flow added",
            FlowOperation::Remove => "flow deleted",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatapathsResponse {
    pub datapaths: Vec<DatapathId>,
}

/// Terminal failure of a management request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Datapath not found")]
    DatapathNotFound(DatapathId),

    /// Anything not classified above, carrying the underlying message
    #[error("{0}")]
    Internal(String),
}

impl From<FlowCtlError> for ApiError {
    fn from(err: FlowCtlError) -> Self {
        match err {
            FlowCtlError::DatapathNotFound(dpid) => ApiError::DatapathNotFound(dpid),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson => StatusCode::BAD_REQUEST,
            ApiError::DatapathNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Resolves the target datapath and submits one flow-mod for `op`.
pub fn apply_flow_request(
    registry: &DatapathRegistry,
    op: FlowOperation,
    request: &FlowRequest,
) -> Result<(), FlowCtlError> {
    let session = registry
        .lookup(request.dpid)
        .ok_or(FlowCtlError::DatapathNotFound(request.dpid))?;

    match op {
        FlowOperation::Install => install_forward_rule(
            &session,
            &request.src_ip,
            &request.dst_ip,
            DEFAULT_RULE_PRIORITY,
        ),
        FlowOperation::Remove => remove_forward_rule(&session, &request.src_ip, &request.dst_ip),
    }
}

fn handle_flow_request(
    registry: &DatapathRegistry,
    op: FlowOperation,
    body: &[u8],
) -> Result<Json<StatusResponse>, ApiError> {
    let result = FlowRequest::parse(body).and_then(|request| {
        apply_flow_request(registry, op, &request)
            .map_err(ApiError::from)
            .map(|()| request)
    });

    match result {
        Ok(request) => {
            info!(
                operation = ?op,
                dpid = %request.dpid,
                src_ip = %request.src_ip,
                dst_ip = %request.dst_ip,
                "Flow request applied via REST API"
            );
            Ok(Json(StatusResponse {
                status: op.success_status().to_string(),
            }))
        }
        Err(e @ ApiError::Internal(_)) => {
            error!(operation = ?op, error = %e, "Flow request failed");
            Err(e)
        }
        Err(e) => {
            warn!(operation = ?op, error = ?e, "Flow request rejected");
            Err(e)
        }
    }
}

async fn add_flow(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    handle_flow_request(&state.registry, FlowOperation::Install, &body)
}

async fn delete_flow(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    handle_flow_request(&state.registry, FlowOperation::Remove, &body)
}

async fn list_datapaths(State(state): State<ApiState>) -> Json<DatapathsResponse> {
    Json(DatapathsResponse {
        datapaths: state.registry.ids(),
    })
}
