//! OpenFlow 1.3 wire encoding.
//!
//! Only the messages the controller exchanges are covered: the handshake
//! (HELLO, FEATURES_REQUEST/REPLY), keepalive (ECHO), the PACKET_IN header
//! and FLOW_MOD with an OXM match and an APPLY_ACTIONS instruction.
//! All multi-byte fields are big-endian.

use crate::{Action, DatapathId, FlowMatch, FlowMod, FlowModCommand};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Protocol version byte for OpenFlow 1.3.
pub const OFP_VERSION_1_3: u8 = 0x04;

/// Size of the common message header.
pub const OFP_HEADER_LEN: usize = 8;

/// Buffer id meaning "no buffered packet".
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// OFPCML_NO_BUFFER: send the whole packet, do not buffer.
const OFPCML_NO_BUFFER: u16 = 0xffff;

const OFP_FLOW_MOD_FIXED_LEN: usize = 48;
const OFP_FEATURES_REPLY_LEN: usize = 32;
const OFP_PACKET_IN_FIXED_LEN: usize = 24;

const OFPMT_OXM: u16 = 1;
const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;
const OFPXMT_OFB_ETH_TYPE: u8 = 5;
const OFPXMT_OFB_IPV4_SRC: u8 = 11;
const OFPXMT_OFB_IPV4_DST: u8 = 12;

const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPAT_OUTPUT: u16 = 0;
const OFP_ACTION_OUTPUT_LEN: u16 = 16;

/// Errors produced while encoding or decoding OpenFlow messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("invalid IPv4 address: {0:?}")]
    InvalidIpv4Address(String),

    #[error("message too short for {what}: {len} bytes")]
    Truncated { what: &'static str, len: usize },

    #[error("message length {0} exceeds protocol maximum")]
    TooLong(usize),
}

/// OpenFlow message types used by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Hello,
    Error,
    EchoRequest,
    EchoReply,
    FeaturesRequest,
    FeaturesReply,
    PacketIn,
    FlowMod,
    Other(u8),
}

impl MsgType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Hello,
            1 => Self::Error,
            2 => Self::EchoRequest,
            3 => Self::EchoReply,
            5 => Self::FeaturesRequest,
            6 => Self::FeaturesReply,
            10 => Self::PacketIn,
            14 => Self::FlowMod,
            other => Self::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Hello => 0,
            Self::Error => 1,
            Self::EchoRequest => 2,
            Self::EchoReply => 3,
            Self::FeaturesRequest => 5,
            Self::FeaturesReply => 6,
            Self::PacketIn => 10,
            Self::FlowMod => 14,
            Self::Other(other) => *other,
        }
    }
}

/// Common header carried by every OpenFlow message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpHeader {
    pub version: u8,
    pub msg_type: MsgType,
    /// Total message length including the header
    pub length: u16,
    pub xid: u32,
}

impl OfpHeader {
    /// Decodes a header from the first eight bytes of `buf`.
    pub fn parse(mut buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < OFP_HEADER_LEN {
            return Err(WireError::Truncated {
                what: "header",
                len: buf.len(),
            });
        }
        Ok(Self {
            version: buf.get_u8(),
            msg_type: MsgType::from_u8(buf.get_u8()),
            length: buf.get_u16(),
            xid: buf.get_u32(),
        })
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u8(self.version);
        dst.put_u8(self.msg_type.as_u8());
        dst.put_u16(self.length);
        dst.put_u32(self.xid);
    }
}

/// A full message: header plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfpMessage {
    pub header: OfpHeader,
    pub body: Bytes,
}

impl OfpMessage {
    /// Splits a complete frame into header and body.
    pub fn parse(frame: Bytes) -> Result<Self, WireError> {
        let header = OfpHeader::parse(&frame)?;
        let body = frame.slice(OFP_HEADER_LEN..);
        Ok(Self { header, body })
    }
}

fn encode_header_only(msg_type: MsgType, xid: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(OFP_HEADER_LEN);
    OfpHeader {
        version: OFP_VERSION_1_3,
        msg_type,
        length: OFP_HEADER_LEN as u16,
        xid,
    }
    .write(&mut buf);
    buf.freeze()
}

/// Encodes an OFPT_HELLO without version bitmap elements.
pub fn encode_hello(xid: u32) -> Bytes {
    encode_header_only(MsgType::Hello, xid)
}

/// Encodes an OFPT_FEATURES_REQUEST.
pub fn encode_features_request(xid: u32) -> Bytes {
    encode_header_only(MsgType::FeaturesRequest, xid)
}

/// Encodes an OFPT_ECHO_REPLY echoing the request's xid and payload.
pub fn encode_echo_reply(xid: u32, payload: &[u8]) -> Result<Bytes, WireError> {
    let length = OFP_HEADER_LEN + payload.len();
    let length_u16 = u16::try_from(length).map_err(|_| WireError::TooLong(length))?;
    let mut buf = BytesMut::with_capacity(length);
    OfpHeader {
        version: OFP_VERSION_1_3,
        msg_type: MsgType::EchoReply,
        length: length_u16,
        xid,
    }
    .write(&mut buf);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Body of an OFPT_FEATURES_REPLY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturesReply {
    pub datapath_id: DatapathId,
    pub n_buffers: u32,
    pub n_tables: u8,
    pub auxiliary_id: u8,
    pub capabilities: u32,
}

impl FeaturesReply {
    /// Decodes the body that follows the message header.
    pub fn parse(mut body: &[u8]) -> Result<Self, WireError> {
        let needed = OFP_FEATURES_REPLY_LEN - OFP_HEADER_LEN;
        if body.len() < needed {
            return Err(WireError::Truncated {
                what: "features reply",
                len: body.len() + OFP_HEADER_LEN,
            });
        }
        let datapath_id = DatapathId::new(body.get_u64());
        let n_buffers = body.get_u32();
        let n_tables = body.get_u8();
        let auxiliary_id = body.get_u8();
        body.advance(2);
        let capabilities = body.get_u32();
        Ok(Self {
            datapath_id,
            n_buffers,
            n_tables,
            auxiliary_id,
            capabilities,
        })
    }
}

/// Fixed fields of an OFPT_PACKET_IN (the match and frame are not decoded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInHeader {
    pub buffer_id: u32,
    pub total_len: u16,
    pub reason: u8,
    pub table_id: u8,
    pub cookie: u64,
}

impl PacketInHeader {
    pub fn parse(mut body: &[u8]) -> Result<Self, WireError> {
        let needed = OFP_PACKET_IN_FIXED_LEN - OFP_HEADER_LEN;
        if body.len() < needed {
            return Err(WireError::Truncated {
                what: "packet-in",
                len: body.len() + OFP_HEADER_LEN,
            });
        }
        Ok(Self {
            buffer_id: body.get_u32(),
            total_len: body.get_u16(),
            reason: body.get_u8(),
            table_id: body.get_u8(),
            cookie: body.get_u64(),
        })
    }
}

fn parse_ipv4(addr: &str) -> Result<Ipv4Addr, WireError> {
    addr.parse()
        .map_err(|_| WireError::InvalidIpv4Address(addr.to_string()))
}

/// Writes an `ofp_match` with OXM fields, padded to a multiple of 8 bytes.
fn write_match(flow_match: &FlowMatch, dst: &mut BytesMut) -> Result<(), WireError> {
    let mut oxm = BytesMut::new();

    if let Some(eth_type) = flow_match.eth_type {
        put_oxm_header(&mut oxm, OFPXMT_OFB_ETH_TYPE, 2);
        oxm.put_u16(eth_type);
    }
    if let Some(src) = flow_match.ipv4_src.as_deref() {
        let addr = parse_ipv4(src)?;
        put_oxm_header(&mut oxm, OFPXMT_OFB_IPV4_SRC, 4);
        oxm.put_slice(&addr.octets());
    }
    if let Some(dst_addr) = flow_match.ipv4_dst.as_deref() {
        let addr = parse_ipv4(dst_addr)?;
        put_oxm_header(&mut oxm, OFPXMT_OFB_IPV4_DST, 4);
        oxm.put_slice(&addr.octets());
    }

    // Length excludes padding
    let match_len = 4 + oxm.len();
    dst.put_u16(OFPMT_OXM);
    dst.put_u16(match_len as u16);
    dst.put_slice(&oxm);
    dst.put_bytes(0, padding_to_8(match_len));
    Ok(())
}

fn put_oxm_header(dst: &mut BytesMut, field: u8, len: u8) {
    dst.put_u16(OFPXMC_OPENFLOW_BASIC);
    // field in the upper seven bits, hasmask bit clear
    dst.put_u8(field << 1);
    dst.put_u8(len);
}

fn padding_to_8(len: usize) -> usize {
    (8 - len % 8) % 8
}

fn write_apply_actions(actions: &[Action], dst: &mut BytesMut) {
    let len = 8 + actions.len() * OFP_ACTION_OUTPUT_LEN as usize;
    dst.put_u16(OFPIT_APPLY_ACTIONS);
    dst.put_u16(len as u16);
    dst.put_bytes(0, 4);
    for action in actions {
        match action {
            Action::Output(port) => {
                dst.put_u16(OFPAT_OUTPUT);
                dst.put_u16(OFP_ACTION_OUTPUT_LEN);
                dst.put_u32(port.0);
                dst.put_u16(OFPCML_NO_BUFFER);
                dst.put_bytes(0, 6);
            }
        }
    }
}

/// Encodes an OFPT_FLOW_MOD.
///
/// Add commands carry one APPLY_ACTIONS instruction with the rule's
/// actions; delete commands carry no instructions. Malformed IPv4 strings
/// in the match are rejected here.
pub fn encode_flow_mod(flow_mod: &FlowMod, xid: u32) -> Result<Bytes, WireError> {
    let mut body = BytesMut::with_capacity(64);
    write_match(&flow_mod.flow_match, &mut body)?;
    if flow_mod.command == FlowModCommand::Add && !flow_mod.actions.is_empty() {
        write_apply_actions(&flow_mod.actions, &mut body);
    }

    let length = OFP_FLOW_MOD_FIXED_LEN + body.len();
    let length_u16 = u16::try_from(length).map_err(|_| WireError::TooLong(length))?;

    let mut buf = BytesMut::with_capacity(length);
    OfpHeader {
        version: OFP_VERSION_1_3,
        msg_type: MsgType::FlowMod,
        length: length_u16,
        xid,
    }
    .write(&mut buf);
    buf.put_u64(flow_mod.cookie);
    buf.put_u64(0); // cookie_mask
    buf.put_u8(flow_mod.table_id);
    buf.put_u8(flow_mod.command.wire_value());
    buf.put_u16(flow_mod.idle_timeout);
    buf.put_u16(flow_mod.hard_timeout);
    buf.put_u16(flow_mod.priority);
    buf.put_u32(OFP_NO_BUFFER);
    buf.put_u32(flow_mod.out_port.0);
    buf.put_u32(flow_mod.out_group.0);
    buf.put_u16(0); // flags
    buf.put_bytes(0, 2);
    buf.put_slice(&body);
    Ok(buf.freeze())
}
