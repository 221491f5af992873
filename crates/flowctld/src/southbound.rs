//! Southbound OpenFlow listener
//!
//! Accepts switch connections, performs the OpenFlow 1.3 handshake and
//! turns connection lifecycle into [`DatapathEvent`]s for the controller.
//! Each connection has one writer task draining a bounded mpsc queue, so
//! the bootstrap policy and REST requests can submit concurrently. A failed
//! write ends the connection and unregisters the switch.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SC-7: Boundary Protection - Southbound control channel
//! - SI-4: System Monitoring - Connection lifecycle logging

use crate::controller::{DatapathEvent, FlowController};
use crate::error::{FlowCtlError, Result};
use crate::session::{DatapathSession, OfpChannel, WRITE_QUEUE_DEPTH};
use bytes::{Bytes, BytesMut};
use flowctl_types::wire::{
    encode_echo_reply, encode_features_request, encode_hello, FeaturesReply, MsgType,
    OfpMessage, PacketInHeader, WireError, OFP_HEADER_LEN, OFP_VERSION_1_3,
};
use futures::StreamExt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, info, instrument, trace, warn};

const HELLO_XID: u32 = 1;
const FEATURES_REQUEST_XID: u32 = 2;
/// First xid used for flow-mods on an established session
const FIRST_SESSION_XID: u32 = 16;

/// Splits a byte stream into whole OpenFlow messages using the header's
/// length field.
#[derive(Debug, Default)]
pub struct OfpFrameCodec;

impl Decoder for OfpFrameCodec {
    type Item = OfpMessage;
    type Error = FlowCtlError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<OfpMessage>> {
        if src.len() < OFP_HEADER_LEN {
            return Ok(None);
        }
        let length = usize::from(u16::from_be_bytes([src[2], src[3]]));
        if length < OFP_HEADER_LEN {
            return Err(WireError::Truncated {
                what: "header length field",
                len: length,
            }
            .into());
        }
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }
        let frame = src.split_to(length).freeze();
        Ok(Some(OfpMessage::parse(frame)?))
    }
}

/// Accept loop; one task per connection.
pub async fn serve(listener: TcpListener, controller: FlowController) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let controller = controller.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, controller).await {
                warn!(peer = %peer, error = %e, "Switch connection ended with error");
            }
        });
    }
}

fn queue(tx: &mpsc::Sender<Bytes>, frame: Bytes) -> Result<()> {
    tx.try_send(frame).map_err(|e| {
        let (kind, reason) = match e {
            TrySendError::Full(_) => (io::ErrorKind::WouldBlock, "write queue full"),
            TrySendError::Closed(_) => (io::ErrorKind::BrokenPipe, "connection writer closed"),
        };
        FlowCtlError::Io(io::Error::new(kind, reason))
    })
}

/// Per-connection entry point for accepted sockets.
#[instrument(skip(stream, peer, controller), fields(peer = %peer))]
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    controller: FlowController,
) -> Result<()> {
    info!("Switch connection accepted");
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let result = run_connection(read_half, write_half, controller).await;
    info!("Switch connection closed");
    result
}

/// Handshake, then dispatch until EOF, a read error or a write error.
///
/// Whichever way the connection ends, a registered session is removed
/// before returning.
pub async fn run_connection<R, W>(
    reader: R,
    mut writer: W,
    controller: FlowController,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Bytes>(WRITE_QUEUE_DEPTH);
    let mut writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            writer.write_all(&frame).await?;
        }
        Ok::<(), io::Error>(())
    });

    queue(&tx, encode_hello(HELLO_XID))?;
    queue(&tx, encode_features_request(FEATURES_REQUEST_XID))?;

    let mut connection = Connection {
        controller,
        tx,
        session: None,
    };
    let mut frames = FramedRead::new(reader, OfpFrameCodec);

    let result = loop {
        tokio::select! {
            next = frames.next() => match next {
                Some(Ok(msg)) => {
                    if let Err(e) = connection.handle_message(msg) {
                        break Err(e);
                    }
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            },
            written = &mut writer_task => {
                break match written {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => {
                        debug!(error = %e, "Switch write failed; closing connection");
                        Err(e.into())
                    }
                    Err(e) => Err(FlowCtlError::Io(io::Error::other(e))),
                };
            }
        }
    };

    connection.close();
    writer_task.abort();
    result
}

struct Connection {
    controller: FlowController,
    tx: mpsc::Sender<Bytes>,
    session: Option<Arc<DatapathSession>>,
}

impl Connection {
    fn handle_message(&mut self, msg: OfpMessage) -> Result<()> {
        let header = msg.header;
        trace!(msg_type = ?header.msg_type, xid = header.xid, len = header.length, "Received");

        match header.msg_type {
            MsgType::Hello => {
                if header.version != OFP_VERSION_1_3 {
                    warn!(
                        version = header.version,
                        "Switch offered a different OpenFlow version; continuing with 1.3"
                    );
                }
            }
            MsgType::FeaturesReply => self.on_features_reply(header.version, &msg.body)?,
            MsgType::EchoRequest => {
                queue(&self.tx, encode_echo_reply(header.xid, &msg.body)?)?;
            }
            MsgType::PacketIn => {
                let Some(session) = &self.session else {
                    return Ok(());
                };
                match PacketInHeader::parse(&msg.body) {
                    Ok(packet_in) => {
                        self.controller.handle_event(DatapathEvent::PacketIn {
                            id: session.id(),
                            buffer_id: packet_in.buffer_id,
                            total_len: packet_in.total_len,
                            reason: packet_in.reason,
                            table_id: packet_in.table_id,
                        });
                    }
                    Err(e) => {
                        debug!(dpid = %session.id(), error = %e, "Dropping malformed packet-in");
                    }
                }
            }
            MsgType::Error => {
                let (err_type, err_code) = match &msg.body[..] {
                    [t0, t1, c0, c1, ..] => (
                        u16::from_be_bytes([*t0, *t1]),
                        u16::from_be_bytes([*c0, *c1]),
                    ),
                    _ => (0, 0),
                };
                warn!(
                    dpid = ?self.session.as_ref().map(|s| s.id()),
                    xid = header.xid,
                    err_type,
                    err_code,
                    "Switch reported an error"
                );
            }
            other => {
                debug!(msg_type = ?other, "Ignoring message");
            }
        }
        Ok(())
    }

    fn on_features_reply(&mut self, version: u8, body: &[u8]) -> Result<()> {
        let features = FeaturesReply::parse(body)?;
        if self.session.is_some() {
            debug!(dpid = %features.datapath_id, "Duplicate features reply ignored");
            return Ok(());
        }
        if features.auxiliary_id != 0 {
            info!(
                dpid = %features.datapath_id,
                auxiliary_id = features.auxiliary_id,
                "Auxiliary connection not registered"
            );
            return Ok(());
        }

        let channel = OfpChannel::new(features.datapath_id, self.tx.clone(), FIRST_SESSION_XID);
        let session = Arc::new(DatapathSession::new(
            features.datapath_id,
            version,
            features.n_tables,
            Arc::new(channel),
        ));
        self.session = Some(Arc::clone(&session));
        self.controller
            .handle_event(DatapathEvent::Connected(session));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            self.controller.handle_event(DatapathEvent::Disconnected {
                id: session.id(),
                session: Some(session),
            });
        }
    }
}
