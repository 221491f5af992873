//! FlowController - datapath lifecycle event handling
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CM-8: System Component Inventory - Track connected switches
//! - AU-12: Audit Record Generation - Log connect/disconnect events
//! - SI-4: System Monitoring - Datapath lifecycle monitoring

use crate::bootstrap::install_bootstrap_flows;
use crate::registry::DatapathRegistry;
use crate::session::DatapathSession;
use flowctl_types::DatapathId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notifications delivered by the southbound protocol layer.
#[derive(Debug)]
pub enum DatapathEvent {
    /// Handshake completed; the session is ready to accept flow-mods
    Connected(Arc<DatapathSession>),
    /// Connection closed. `session` identifies which connection ended when
    /// known, so a stale disconnect does not evict a reconnected switch.
    Disconnected {
        id: DatapathId,
        session: Option<Arc<DatapathSession>>,
    },
    /// Packet that matched no installed rule
    PacketIn {
        id: DatapathId,
        buffer_id: u32,
        total_len: u16,
        reason: u8,
        table_id: u8,
    },
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Registered {
        id: DatapathId,
        bootstrap_installed: bool,
    },
    Unregistered {
        id: DatapathId,
        was_present: bool,
    },
    /// Event deliberately not acted upon (packet-in: no learning, no flooding)
    Ignored,
}

/// Applies datapath events to the registry and bootstrap policy.
#[derive(Debug, Clone)]
pub struct FlowController {
    registry: Arc<DatapathRegistry>,
}

impl FlowController {
    pub fn new(registry: Arc<DatapathRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<DatapathRegistry> {
        &self.registry
    }

    /// Handles one event synchronously.
    ///
    /// On connect the session is registered before the bootstrap rule is
    /// submitted. Nothing orders the bootstrap rule against a concurrent
    /// management request for the same switch.
    pub fn handle_event(&self, event: DatapathEvent) -> EventOutcome {
        match event {
            DatapathEvent::Connected(session) => {
                let id = session.id();
                self.registry.register(id, Arc::clone(&session));
                info!(
                    dpid = %id,
                    version = session.version(),
                    n_tables = session.n_tables(),
                    "Switch connected"
                );

                let bootstrap_installed = install_bootstrap_flows(&session);
                EventOutcome::Registered {
                    id,
                    bootstrap_installed,
                }
            }
            DatapathEvent::Disconnected { id, session } => {
                let was_present = match session {
                    Some(session) => self.registry.unregister_session(id, &session),
                    None => self.registry.unregister(id),
                };
                if was_present {
                    info!(dpid = %id, "Switch disconnected");
                } else {
                    warn!(dpid = %id, "Disconnect for datapath not in registry");
                }
                EventOutcome::Unregistered { id, was_present }
            }
            DatapathEvent::PacketIn {
                id,
                buffer_id,
                total_len,
                reason,
                table_id,
            } => {
                debug!(
                    dpid = %id,
                    buffer_id,
                    total_len,
                    reason,
                    table_id,
                    "Ignoring packet-in"
                );
                EventOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RecordingChannel;
    use crate::translator::arp_flood_flow_mod;
    use pretty_assertions::assert_eq;

    fn controller() -> FlowController {
        FlowController::new(Arc::new(DatapathRegistry::new()))
    }

    fn connected(id: u64, channel: &Arc<RecordingChannel>) -> Arc<DatapathSession> {
        Arc::new(DatapathSession::with_channel(
            DatapathId::new(id),
            channel.clone(),
        ))
    }

    #[test]
    fn test_connect_registers_and_bootstraps() {
        let ctl = controller();
        let channel = Arc::new(RecordingChannel::new());

        let outcome = ctl.handle_event(DatapathEvent::Connected(connected(7, &channel)));

        assert_eq!(
            outcome,
            EventOutcome::Registered {
                id: DatapathId::new(7),
                bootstrap_installed: true
            }
        );
        assert!(ctl.registry().lookup(DatapathId::new(7)).is_some());
        assert_eq!(channel.sent(), vec![arp_flood_flow_mod()]);
    }

    #[test]
    fn test_bootstrap_failure_keeps_session_registered() {
        let ctl = controller();
        let channel = Arc::new(RecordingChannel::failing(DatapathId::new(4), "closed"));
        let session = Arc::new(DatapathSession::with_channel(DatapathId::new(4), channel));

        let outcome = ctl.handle_event(DatapathEvent::Connected(session));

        assert_eq!(
            outcome,
            EventOutcome::Registered {
                id: DatapathId::new(4),
                bootstrap_installed: false
            }
        );
        assert!(ctl.registry().lookup(DatapathId::new(4)).is_some());
    }

    #[test]
    fn test_reconnect_bootstraps_again() {
        let ctl = controller();
        let channel = Arc::new(RecordingChannel::new());

        ctl.handle_event(DatapathEvent::Connected(connected(2, &channel)));
        ctl.handle_event(DatapathEvent::Connected(connected(2, &channel)));

        assert_eq!(channel.sent().len(), 2);
        assert_eq!(ctl.registry().len(), 1);
    }

    #[test]
    fn test_disconnect_unregisters() {
        let ctl = controller();
        let channel = Arc::new(RecordingChannel::new());
        let session = connected(1, &channel);
        ctl.handle_event(DatapathEvent::Connected(Arc::clone(&session)));

        let outcome = ctl.handle_event(DatapathEvent::Disconnected {
            id: DatapathId::new(1),
            session: Some(session),
        });

        assert_eq!(
            outcome,
            EventOutcome::Unregistered {
                id: DatapathId::new(1),
                was_present: true
            }
        );
        assert!(ctl.registry().lookup(DatapathId::new(1)).is_none());
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let ctl = controller();
        let outcome = ctl.handle_event(DatapathEvent::Disconnected {
            id: DatapathId::new(9),
            session: None,
        });
        assert_eq!(
            outcome,
            EventOutcome::Unregistered {
                id: DatapathId::new(9),
                was_present: false
            }
        );
    }

    #[test]
    fn test_packet_in_is_ignored() {
        let ctl = controller();
        let channel = Arc::new(RecordingChannel::new());
        ctl.handle_event(DatapathEvent::Connected(connected(1, &channel)));
        channel.clear();

        let outcome = ctl.handle_event(DatapathEvent::PacketIn {
            id: DatapathId::new(1),
            buffer_id: 0xffff_ffff,
            total_len: 60,
            reason: 0,
            table_id: 0,
        });

        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(channel.sent().is_empty());
    }
}
