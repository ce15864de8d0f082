//! Client ↔ world model protocol
//!
//! Clients query the world model three ways, all sharing one request
//! layout and told apart only by the MessageID byte:
//!
//! - **snapshot**: the state of every matching object as of a point in
//!   time. One object per data response, closed by a request-complete.
//! - **range**: every attribute revision created inside a time window, in
//!   creation order. One object/attribute pair per data response, closed
//!   by a request-complete.
//! - **stream**: new values forwarded as they arrive, with `stop_period`
//!   reinterpreted as a minimum update interval in milliseconds. Runs
//!   until the client cancels; the cancel is acknowledged with a
//!   request-complete for the same ticket.
//!
//! Tickets are client-chosen `u32`s correlating responses and
//! cancellations with requests. Attribute and origin names inside data
//! responses are `u32` aliases; the world model announces each alias in an
//! alias message before the first data response that uses it (see
//! [`super::world_model::AliasTable`]).
//!
//! Request payload layout (snapshot/range/stream):
//!
//! ```text
//! u32        ticket
//! sized str  object URI (may be a regular expression)
//! u32        attribute pattern count
//! sized str  × count
//! i64        start
//! i64        stop / period
//! ```
//!
//! Data response payload layout:
//!
//! ```text
//! sized str  object URI
//! u32        ticket
//! u32        attribute count
//! per attribute:
//!   u32        name alias
//!   i64        creation time
//!   i64        expiration time (0 = current)
//!   u32        origin alias
//!   sized blob data
//! ```

use super::world_model::{AliasDef, AliasedAttribute, AliasedWorldData, Uri};
use crate::types::GrailTime;
use crate::wire::{self, WireReader};

/// Identifier sent in this protocol's handshake.
pub const PROTOCOL_ID: &str = "GRAIL client protocol";

/// Message kinds on the client face of the world model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    KeepAlive = 0,
    SnapshotRequest = 1,
    RangeRequest = 2,
    StreamRequest = 3,
    AttributeAlias = 4,
    OriginAlias = 5,
    RequestComplete = 6,
    CancelRequest = 7,
    DataResponse = 8,
    UriSearch = 9,
    UriResponse = 10,
    OriginPreference = 11,
}

impl MessageId {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageId::KeepAlive),
            1 => Some(MessageId::SnapshotRequest),
            2 => Some(MessageId::RangeRequest),
            3 => Some(MessageId::StreamRequest),
            4 => Some(MessageId::AttributeAlias),
            5 => Some(MessageId::OriginAlias),
            6 => Some(MessageId::RequestComplete),
            7 => Some(MessageId::CancelRequest),
            8 => Some(MessageId::DataResponse),
            9 => Some(MessageId::UriSearch),
            10 => Some(MessageId::UriResponse),
            11 => Some(MessageId::OriginPreference),
            _ => None,
        }
    }
}

/// A query against the world model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub object_uri: Uri,
    /// Attribute name patterns to match.
    pub attributes: Vec<Uri>,
    pub start: GrailTime,
    /// Stop time for snapshot and range requests; minimum update interval
    /// in milliseconds for stream requests.
    pub stop_period: GrailTime,
}

/// Build the connection-opening handshake.
pub fn make_handshake_msg() -> Vec<u8> {
    super::make_handshake(PROTOCOL_ID)
}

/// Check a received handshake for this protocol face.
pub fn check_handshake_msg(buf: &[u8]) -> bool {
    super::check_handshake(buf, PROTOCOL_ID)
}

/// Encode a keep-alive probe (ID byte only).
pub fn make_keep_alive() -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let total_length = wire::push_u8(&mut buf, MessageId::KeepAlive as u8);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn make_snapshot_request(request: &Request, ticket: u32) -> Vec<u8> {
    make_request(MessageId::SnapshotRequest, request, ticket)
}

pub fn make_range_request(request: &Request, ticket: u32) -> Vec<u8> {
    make_request(MessageId::RangeRequest, request, ticket)
}

pub fn make_stream_request(request: &Request, ticket: u32) -> Vec<u8> {
    make_request(MessageId::StreamRequest, request, ticket)
}

fn make_request(id: MessageId, request: &Request, ticket: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, id as u8);

    total_length += wire::push_u32(&mut buf, ticket);
    total_length += wire::push_sized_utf16(&mut buf, &request.object_uri);
    total_length += wire::push_u32(&mut buf, request.attributes.len() as u32);
    for attr in &request.attributes {
        total_length += wire::push_sized_utf16(&mut buf, attr);
    }
    total_length += wire::push_i64(&mut buf, request.start);
    total_length += wire::push_i64(&mut buf, request.stop_period);

    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_snapshot_request(buf: &[u8]) -> Option<(Request, u32)> {
    decode_request(MessageId::SnapshotRequest, buf)
}

pub fn decode_range_request(buf: &[u8]) -> Option<(Request, u32)> {
    decode_request(MessageId::RangeRequest, buf)
}

pub fn decode_stream_request(buf: &[u8]) -> Option<(Request, u32)> {
    decode_request(MessageId::StreamRequest, buf)
}

fn decode_request(expected: MessageId, buf: &[u8]) -> Option<(Request, u32)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4 || MessageId::from_u8(reader.read_u8()) != Some(expected) {
        return None;
    }

    let ticket = reader.read_u32();
    let object_uri = reader.read_sized_utf16();
    let num_attributes = reader.read_u32();
    let mut attributes = Vec::new();
    for _ in 0..num_attributes {
        attributes.push(reader.read_sized_utf16());
        if reader.out_of_range() {
            return None;
        }
    }
    let start = reader.read_i64();
    let stop_period = reader.read_i64();

    if reader.out_of_range() {
        return None;
    }
    Some((
        Request {
            object_uri,
            attributes,
            start,
            stop_period,
        },
        ticket,
    ))
}

pub fn make_attribute_alias_msg(aliases: &[AliasDef]) -> Vec<u8> {
    make_alias_msg(MessageId::AttributeAlias, aliases)
}

pub fn make_origin_alias_msg(aliases: &[AliasDef]) -> Vec<u8> {
    make_alias_msg(MessageId::OriginAlias, aliases)
}

fn make_alias_msg(id: MessageId, aliases: &[AliasDef]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, id as u8);

    total_length += wire::push_u32(&mut buf, aliases.len() as u32);
    for alias in aliases {
        total_length += wire::push_u32(&mut buf, alias.alias);
        total_length += wire::push_sized_utf16(&mut buf, &alias.name);
    }

    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_attribute_alias_msg(buf: &[u8]) -> Option<Vec<AliasDef>> {
    decode_alias_msg(MessageId::AttributeAlias, buf)
}

pub fn decode_origin_alias_msg(buf: &[u8]) -> Option<Vec<AliasDef>> {
    decode_alias_msg(MessageId::OriginAlias, buf)
}

fn decode_alias_msg(expected: MessageId, buf: &[u8]) -> Option<Vec<AliasDef>> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4 || MessageId::from_u8(reader.read_u8()) != Some(expected) {
        return None;
    }

    let count = reader.read_u32();
    let mut aliases = Vec::new();
    for _ in 0..count {
        aliases.push(AliasDef {
            alias: reader.read_u32(),
            name: reader.read_sized_utf16(),
        });
        if reader.out_of_range() {
            return None;
        }
    }

    if reader.out_of_range() {
        return None;
    }
    Some(aliases)
}

pub fn make_request_complete(ticket: u32) -> Vec<u8> {
    make_ticket_msg(MessageId::RequestComplete, ticket)
}

pub fn make_cancel_request(ticket: u32) -> Vec<u8> {
    make_ticket_msg(MessageId::CancelRequest, ticket)
}

fn make_ticket_msg(id: MessageId, ticket: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, id as u8);
    total_length += wire::push_u32(&mut buf, ticket);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_request_complete(buf: &[u8]) -> Option<u32> {
    decode_ticket_msg(MessageId::RequestComplete, buf)
}

pub fn decode_cancel_request(buf: &[u8]) -> Option<u32> {
    decode_ticket_msg(MessageId::CancelRequest, buf)
}

fn decode_ticket_msg(expected: MessageId, buf: &[u8]) -> Option<u32> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4 || MessageId::from_u8(reader.read_u8()) != Some(expected) {
        return None;
    }
    let ticket = reader.read_u32();
    if reader.out_of_range() {
        return None;
    }
    Some(ticket)
}

/// Encode one object's attributes for a request, in aliased form.
pub fn make_data_response(data: &AliasedWorldData, ticket: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::DataResponse as u8);

    total_length += wire::push_sized_utf16(&mut buf, &data.object_uri);
    total_length += wire::push_u32(&mut buf, ticket);
    total_length += wire::push_u32(&mut buf, data.attributes.len() as u32);
    for attr in &data.attributes {
        total_length += wire::push_u32(&mut buf, attr.name_alias);
        total_length += wire::push_i64(&mut buf, attr.creation_date);
        total_length += wire::push_i64(&mut buf, attr.expiration_date);
        total_length += wire::push_u32(&mut buf, attr.origin_alias);
        total_length += wire::push_sized_bytes(&mut buf, &attr.data);
    }

    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_data_response(buf: &[u8]) -> Option<(AliasedWorldData, u32)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::DataResponse)
    {
        return None;
    }

    let object_uri = reader.read_sized_utf16();
    let ticket = reader.read_u32();
    let num_attributes = reader.read_u32();
    let mut attributes = Vec::new();
    for _ in 0..num_attributes {
        attributes.push(AliasedAttribute {
            name_alias: reader.read_u32(),
            creation_date: reader.read_i64(),
            expiration_date: reader.read_i64(),
            origin_alias: reader.read_u32(),
            data: reader.read_sized_bytes(),
        });
        if reader.out_of_range() {
            return None;
        }
    }

    if reader.out_of_range() {
        return None;
    }
    Some((
        AliasedWorldData {
            object_uri,
            attributes,
        },
        ticket,
    ))
}

/// Encode a URI search: the query regular expression fills the frame.
pub fn make_uri_search(uri: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::UriSearch as u8);
    total_length += wire::push_utf16(&mut buf, uri);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_uri_search(buf: &[u8]) -> Option<Uri> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::UriSearch)
    {
        return None;
    }
    let uri = reader.read_tail_utf16();
    if reader.out_of_range() {
        return None;
    }
    Some(uri)
}

pub fn make_uri_search_response(uris: &[Uri]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::UriResponse as u8);
    total_length += wire::push_u32(&mut buf, uris.len() as u32);
    for uri in uris {
        total_length += wire::push_sized_utf16(&mut buf, uri);
    }
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_uri_search_response(buf: &[u8]) -> Option<Vec<Uri>> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::UriResponse)
    {
        return None;
    }

    let count = reader.read_u32();
    let mut uris = Vec::new();
    for _ in 0..count {
        uris.push(reader.read_sized_utf16());
        if reader.out_of_range() {
            return None;
        }
    }

    if reader.out_of_range() {
        return None;
    }
    Some(uris)
}

/// Encode origin weights: `{sized origin, i32 weight}` pairs to the end of
/// the frame.
pub fn make_origin_preference(weights: &[(String, i32)]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::OriginPreference as u8);
    for (origin, weight) in weights {
        total_length += wire::push_sized_utf16(&mut buf, origin);
        total_length += wire::push_i32(&mut buf, *weight);
    }
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_origin_preference(buf: &[u8]) -> Option<Vec<(String, i32)>> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::OriginPreference)
    {
        return None;
    }

    let mut weights = Vec::new();
    while reader.remaining() > 0 {
        weights.push((reader.read_sized_utf16(), reader.read_i32()));
        if reader.out_of_range() {
            return None;
        }
    }
    Some(weights)
}

/// Validate a frame's envelope and report its message kind, so a
/// connection loop can dispatch without attempting every decoder.
pub fn decode_message_id(buf: &[u8]) -> Option<MessageId> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    let id = reader.read_u8();
    if reader.out_of_range() || buf.len() != total_length + 4 {
        return None;
    }
    MessageId::from_u8(id)
}
