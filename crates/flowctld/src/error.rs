//! Error types for flowctld
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-11: Error Handling - Structured error types with contextual information
//! - AU-3: Content of Audit Records - Errors include sufficient detail for audit

use flowctl_types::wire::WireError;
use flowctl_types::DatapathId;
use thiserror::Error;

/// Errors that can occur in flowctld
///
/// # NIST Controls
/// - SI-11(a): Generate error messages providing information necessary for corrective actions
#[derive(Debug, Error)]
pub enum FlowCtlError {
    /// Datapath is not connected
    #[error("Datapath not found: {0}")]
    DatapathNotFound(DatapathId),

    /// Flow-mod could not be encoded for the wire (e.g. malformed address)
    /// NIST: SI-10 (Information Input Validation)
    #[error("Encoding error: {0}")]
    Encoding(#[from] WireError),

    /// The session's writer is gone; the connection is closing
    /// NIST: SC-7 (Boundary Protection) - Southbound channel errors
    #[error("Transport error on datapath {dpid}: {reason}")]
    Transport { dpid: DatapathId, reason: String },

    /// Configuration error
    /// NIST: CM-6 (Configuration Settings) - Configuration validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowCtlError {
    /// Creates a transport error for a datapath.
    pub fn transport(dpid: DatapathId, reason: impl Into<String>) -> Self {
        Self::Transport {
            dpid,
            reason: reason.into(),
        }
    }
}

/// Result type alias for flowctld operations
pub type Result<T> = std::result::Result<T, FlowCtlError>;
