//! Flow rule building blocks: match criteria, actions and flow-mod commands.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ethertype for IPv4 traffic.
pub const ETH_TYPE_IPV4: u16 = 0x0800;

/// Ethertype for address-resolution (ARP) traffic.
pub const ETH_TYPE_ARP: u16 = 0x0806;

/// Priority of the flood rule installed when a switch connects.
pub const BOOTSTRAP_PRIORITY: u16 = 1;

/// Default priority for rules installed through the management API.
///
/// Strictly above [`BOOTSTRAP_PRIORITY`] so explicit rules always win over
/// the flood fallback.
pub const DEFAULT_RULE_PRIORITY: u16 = 100;

/// An OpenFlow port number, including the reserved logical ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNo(pub u32);

impl PortNo {
    /// Hand the packet to the switch's normal L2/L3 pipeline.
    pub const NORMAL: PortNo = PortNo(0xffff_fffa);
    /// All physical ports except the ingress port.
    pub const FLOOD: PortNo = PortNo(0xffff_fffb);
    /// Send to the controller.
    pub const CONTROLLER: PortNo = PortNo(0xffff_fffd);
    /// Wildcard port, used by delete commands.
    pub const ANY: PortNo = PortNo(0xffff_ffff);
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PortNo::NORMAL => write!(f, "NORMAL"),
            PortNo::FLOOD => write!(f, "FLOOD"),
            PortNo::CONTROLLER => write!(f, "CONTROLLER"),
            PortNo::ANY => write!(f, "ANY"),
            PortNo(n) => write!(f, "{}", n),
        }
    }
}

/// An OpenFlow group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Wildcard group, used by delete commands.
    pub const ANY: GroupId = GroupId(0xffff_ffff);
}

/// Match criteria for a flow rule.
///
/// IPv4 addresses are carried verbatim as received; they are only parsed
/// when the rule is encoded for the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMatch {
    /// Ethertype to match, if any
    pub eth_type: Option<u16>,
    /// IPv4 source address
    pub ipv4_src: Option<String>,
    /// IPv4 destination address
    pub ipv4_dst: Option<String>,
}

impl FlowMatch {
    /// Matches address-resolution traffic by ethertype only.
    pub fn arp() -> Self {
        Self {
            eth_type: Some(ETH_TYPE_ARP),
            ipv4_src: None,
            ipv4_dst: None,
        }
    }

    /// Matches IPv4 traffic between a source and a destination.
    ///
    /// The ethertype is always pinned to IPv4.
    pub fn ipv4(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            eth_type: Some(ETH_TYPE_IPV4),
            ipv4_src: Some(src.into()),
            ipv4_dst: Some(dst.into()),
        }
    }
}

/// A forwarding action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Output to a port (physical or reserved)
    Output(PortNo),
}

/// Flow table modification command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowModCommand {
    /// Install a new rule (OFPFC_ADD)
    Add,
    /// Remove all matching rules (OFPFC_DELETE)
    Delete,
}

impl FlowModCommand {
    /// Returns the OFPFC_* wire value.
    pub const fn wire_value(&self) -> u8 {
        match self {
            FlowModCommand::Add => 0,
            FlowModCommand::Delete => 3,
        }
    }
}

/// A rule install or remove operation destined for one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMod {
    pub command: FlowModCommand,
    pub flow_match: FlowMatch,
    /// Applied immediately via an APPLY_ACTIONS instruction (add only)
    pub actions: Vec<Action>,
    /// Ignored by the switch for delete commands
    pub priority: u16,
    pub out_port: PortNo,
    pub out_group: GroupId,
    pub table_id: u8,
    pub cookie: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
}

impl FlowMod {
    /// Builds an OFPFC_ADD operation with no timeouts in table 0.
    pub fn add(flow_match: FlowMatch, actions: Vec<Action>, priority: u16) -> Self {
        Self {
            command: FlowModCommand::Add,
            flow_match,
            actions,
            priority,
            out_port: PortNo::ANY,
            out_group: GroupId::ANY,
            table_id: 0,
            cookie: 0,
            idle_timeout: 0,
            hard_timeout: 0,
        }
    }

    /// Builds an OFPFC_DELETE operation scoped to any output port and any
    /// group, so matching rules are removed whatever their action target.
    pub fn delete(flow_match: FlowMatch) -> Self {
        Self {
            command: FlowModCommand::Delete,
            flow_match,
            actions: Vec::new(),
            priority: 0,
            out_port: PortNo::ANY,
            out_group: GroupId::ANY,
            table_id: 0,
            cookie: 0,
            idle_timeout: 0,
            hard_timeout: 0,
        }
    }
}
