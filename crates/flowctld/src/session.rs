//! Datapath sessions and the outbound channel used to program them.

use crate::error::{FlowCtlError, Result};
use bytes::Bytes;
use flowctl_types::wire::{encode_flow_mod, OFP_VERSION_1_3};
use flowctl_types::{DatapathId, FlowMod};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

/// Outbound primitive towards one switch.
///
/// Implementations must accept concurrent submissions; the bootstrap policy
/// and the management API may submit to the same session at the same time.
/// Success means the operation was handed off for transmission, not that
/// the switch applied it.
pub trait DatapathChannel: Send + Sync {
    /// Submits a rule install or remove operation.
    fn send_flow_mod(&self, flow_mod: &FlowMod) -> Result<()>;
}

/// Frames a connection may have queued but not yet written.
pub const WRITE_QUEUE_DEPTH: usize = 1024;

/// Channel backed by a connection's writer task.
///
/// Frames are queued on a bounded mpsc channel drained by a single writer,
/// which serializes concurrent submitters. Submitting never waits: a full
/// queue is reported as a transport error.
pub struct OfpChannel {
    dpid: DatapathId,
    next_xid: AtomicU32,
    tx: mpsc::Sender<Bytes>,
}

impl OfpChannel {
    pub fn new(dpid: DatapathId, tx: mpsc::Sender<Bytes>, first_xid: u32) -> Self {
        Self {
            dpid,
            next_xid: AtomicU32::new(first_xid),
            tx,
        }
    }

    fn allocate_xid(&self) -> u32 {
        self.next_xid.fetch_add(1, Ordering::Relaxed)
    }
}

impl DatapathChannel for OfpChannel {
    fn send_flow_mod(&self, flow_mod: &FlowMod) -> Result<()> {
        let xid = self.allocate_xid();
        let frame = encode_flow_mod(flow_mod, xid)?;
        trace!(dpid = %self.dpid, xid, len = frame.len(), "Queueing FLOW_MOD");
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => FlowCtlError::transport(self.dpid, "write queue full"),
            TrySendError::Closed(_) => {
                FlowCtlError::transport(self.dpid, "connection writer closed")
            }
        })
    }
}

/// One live connection to a switch.
///
/// Owned by the registry; the controller only keeps what it needs to send
/// messages and never closes the underlying transport.
pub struct DatapathSession {
    id: DatapathId,
    version: u8,
    n_tables: u8,
    channel: Arc<dyn DatapathChannel>,
}

impl DatapathSession {
    pub fn new(
        id: DatapathId,
        version: u8,
        n_tables: u8,
        channel: Arc<dyn DatapathChannel>,
    ) -> Self {
        Self {
            id,
            version,
            n_tables,
            channel,
        }
    }

    /// Session speaking OpenFlow 1.3 with an unknown table count.
    pub fn with_channel(id: DatapathId, channel: Arc<dyn DatapathChannel>) -> Self {
        Self::new(id, OFP_VERSION_1_3, 0, channel)
    }

    pub fn id(&self) -> DatapathId {
        self.id
    }

    /// Negotiated protocol version byte.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Flow table count from the FEATURES_REPLY.
    pub fn n_tables(&self) -> u8 {
        self.n_tables
    }

    pub fn send_flow_mod(&self, flow_mod: &FlowMod) -> Result<()> {
        self.channel.send_flow_mod(flow_mod)
    }
}

impl fmt::Debug for DatapathSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatapathSession")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("n_tables", &self.n_tables)
            .finish_non_exhaustive()
    }
}

/// Channel that records submitted flow-mods instead of transmitting them.
///
/// Used by tests and dry runs. When built with [`RecordingChannel::failing`]
/// every submission returns a transport error and nothing is recorded.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<FlowMod>>,
    fail_with: Option<(DatapathId, String)>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(dpid: DatapathId, reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some((dpid, reason.into())),
        }
    }

    /// Snapshot of everything submitted so far, in submission order.
    pub fn sent(&self) -> Vec<FlowMod> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl DatapathChannel for RecordingChannel {
    fn send_flow_mod(&self, flow_mod: &FlowMod) -> Result<()> {
        if let Some((dpid, reason)) = &self.fail_with {
            return Err(FlowCtlError::transport(*dpid, reason.clone()));
        }
        self.sent.lock().push(flow_mod.clone());
        Ok(())
    }
}
