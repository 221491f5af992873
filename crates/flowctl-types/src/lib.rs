//! Common OpenFlow types for the flowctl controller.
//!
//! This crate provides type-safe representations of the protocol primitives
//! the controller needs to program switches:
//!
//! - [`DatapathId`]: 64-bit switch identifier
//! - [`FlowMatch`]: match criteria (ethertype, IPv4 source/destination)
//! - [`Action`]: forwarding actions (output to a port)
//! - [`FlowMod`]: a rule install or remove operation
//! - [`wire`]: OpenFlow 1.3 message encoding and decoding

mod datapath;
mod flow;
pub mod wire;

pub use datapath::DatapathId;
pub use flow::{
    Action, FlowMatch, FlowMod, FlowModCommand, GroupId, PortNo, BOOTSTRAP_PRIORITY,
    DEFAULT_RULE_PRIORITY, ETH_TYPE_ARP, ETH_TYPE_IPV4,
};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid datapath id: {0}")]
    InvalidDatapathId(String),
}
