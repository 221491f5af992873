//! Baseline policy installed on every new datapath session.
//!
//! A freshly connected switch gets one rule flooding ARP at the lowest
//! priority so address resolution works before any explicit rule exists.
//! Failures are logged and tolerated: the session stays registered and
//! nothing is retried.

use crate::session::DatapathSession;
use crate::translator::arp_flood_flow_mod;
use tracing::{error, info};

/// Installs the ARP flood rule. Returns `false` if submission failed.
pub fn install_bootstrap_flows(session: &DatapathSession) -> bool {
    match session.send_flow_mod(&arp_flood_flow_mod()) {
        Ok(()) => {
            info!(dpid = %session.id(), "ARP flow added");
            true
        }
        Err(e) => {
            error!(
                dpid = %session.id(),
                error = %e,
                "Failed to install ARP flood flow; datapath left without bootstrap rule"
            );
            false
        }
    }
}
