//! Rule translation: management intents to OpenFlow flow-mods.
//!
//! Builders are pure; the `install_*`/`remove_*` functions hand the result
//! to a session and return once it has been queued for transmission.
//! Addresses are passed through unvalidated; malformed ones surface as
//! encoding errors from the session.

use crate::error::Result;
use crate::session::DatapathSession;
use flowctl_types::{Action, FlowMatch, FlowMod, PortNo, BOOTSTRAP_PRIORITY};
use tracing::{info, instrument};

/// IPv4 src/dst rule forwarded through the switch's normal pipeline.
pub fn forward_flow_mod(src: &str, dst: &str, priority: u16) -> FlowMod {
    FlowMod::add(
        FlowMatch::ipv4(src, dst),
        vec![Action::Output(PortNo::NORMAL)],
        priority,
    )
}

/// Removes IPv4 src/dst rules regardless of their output port or group.
pub fn delete_flow_mod(src: &str, dst: &str) -> FlowMod {
    FlowMod::delete(FlowMatch::ipv4(src, dst))
}

/// Floods all ARP traffic at bootstrap priority.
pub fn arp_flood_flow_mod() -> FlowMod {
    FlowMod::add(
        FlowMatch::arp(),
        vec![Action::Output(PortNo::FLOOD)],
        BOOTSTRAP_PRIORITY,
    )
}

#[instrument(skip(session), fields(dpid = %session.id()))]
pub fn install_forward_rule(
    session: &DatapathSession,
    src: &str,
    dst: &str,
    priority: u16,
) -> Result<()> {
    session.send_flow_mod(&forward_flow_mod(src, dst, priority))?;
    info!(src, dst, priority, "Flow added");
    Ok(())
}

#[instrument(skip(session), fields(dpid = %session.id()))]
pub fn remove_forward_rule(session: &DatapathSession, src: &str, dst: &str) -> Result<()> {
    session.send_flow_mod(&delete_flow_mod(src, dst))?;
    info!(src, dst, "Flow deleted");
    Ok(())
}
