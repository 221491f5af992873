//! OpenFlow flow-rule controller
//!
//! This crate provides flowctld, a controller that programs forwarding rules
//! on OpenFlow 1.3 switches and exposes a small REST API for installing and
//! removing IPv4 source/destination rules.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//!
//! This module implements the following security controls:
//!
//! | Control | Description | Implementation |
//! |---------|-------------|----------------|
//! | AU-3 | Content of Audit Records | Structured logging with dpid/src/dst fields |
//! | AU-12 | Audit Record Generation | Every rule change and connect/disconnect logged |
//! | CM-6 | Configuration Settings | Validated CLI/environment configuration |
//! | CM-8 | System Component Inventory | Registry of connected datapaths |
//! | SC-7 | Boundary Protection | Southbound control channel handling |
//! | SI-10 | Input Validation | Strict REST request decoding |
//! | SI-11 | Error Handling | Structured error types, single HTTP error boundary |
//!
//! # Architecture
//!
//! ```text
//! +-----------------+     +------------------------------+     +-----------+
//! |  REST client    |---->|  rest_api (axum)             |     |  Switch   |
//! |  /flow/add      |     |    parse -> resolve -> apply |     |           |
//! |  /flow/delete   |     |              |               |     |           |
//! +-----------------+     |              v               |     |           |
//!                         |  DatapathRegistry (DashMap)  |     |           |
//!                         |              ^               |     |           |
//!                         |  FlowController              |<----| HELLO     |
//!                         |    connect -> bootstrap      |     | FEATURES  |
//!                         |              |               |     |           |
//!                         |  translator -> OfpChannel ---|---->| FLOW_MOD  |
//!                         +------------------------------+     +-----------+
//! ```

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod registry;
pub mod rest_api;
pub mod session;
pub mod southbound;
pub mod translator;

pub use config::{Config, ListenAddrs};
pub use controller::{DatapathEvent, EventOutcome, FlowController};
pub use error::{FlowCtlError, Result};
pub use registry::DatapathRegistry;
pub use rest_api::{router, ApiError, ApiState, FlowOperation, FlowRequest};
pub use session::{DatapathChannel, DatapathSession, OfpChannel, RecordingChannel};
