//! Solver ↔ world model protocol
//!
//! Solvers push derived facts into the world model. Before the first push
//! a solver announces its output types, each with a `u32` alias used in
//! later solution messages and a flag marking on-demand types — types the
//! solver only produces while some client is subscribed. The world model
//! turns on-demand production on and off with start/stop messages naming
//! the type aliases and URI patterns involved.
//!
//! Type announce payload layout:
//!
//! ```text
//! u32  type count
//! per type:
//!   u32        alias
//!   sized str  type name
//!   u8         on-demand flag (1 = on demand)
//! tail str     origin (rest of frame)
//! ```
//!
//! Solution payload layout:
//!
//! ```text
//! u8   create-URIs flag (1 = auto-create missing targets)
//! u32  solution count
//! per solution:
//!   u32        type alias
//!   i64        creation time
//!   sized str  target URI
//!   sized blob data
//! ```
//!
//! The create/expire/delete family all end in a tail origin string;
//! expiration carries a grail-time while deletion removes the URI or
//! attribute for all time.

use super::world_model::Uri;
use crate::types::GrailTime;
use crate::wire::{self, WireReader};

/// Identifier sent in this protocol's handshake.
pub const PROTOCOL_ID: &str = "GRAIL world model protocol";

/// Message kinds on the solver face of the world model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    KeepAlive = 0,
    TypeAnnounce = 1,
    StartOnDemand = 2,
    StopOnDemand = 3,
    SolverData = 4,
    CreateUri = 5,
    ExpireUri = 6,
    DeleteUri = 7,
    ExpireAttribute = 8,
    DeleteAttribute = 9,
}

impl MessageId {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageId::KeepAlive),
            1 => Some(MessageId::TypeAnnounce),
            2 => Some(MessageId::StartOnDemand),
            3 => Some(MessageId::StopOnDemand),
            4 => Some(MessageId::SolverData),
            5 => Some(MessageId::CreateUri),
            6 => Some(MessageId::ExpireUri),
            7 => Some(MessageId::DeleteUri),
            8 => Some(MessageId::ExpireAttribute),
            9 => Some(MessageId::DeleteAttribute),
            _ => None,
        }
    }
}

/// One solver output type: its alias, name, and whether it is produced
/// only while a client is subscribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub alias: u32,
    pub name: String,
    pub on_demand: bool,
}

/// One start/stop entry: a type alias and the URI patterns it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDemandRequest {
    pub type_alias: u32,
    pub uri_patterns: Vec<Uri>,
}

/// One derived fact headed for the world model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Solution {
    pub type_alias: u32,
    pub time: GrailTime,
    pub target_uri: Uri,
    pub data: Vec<u8>,
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

/// Announce the solver's output types and its origin name.
pub fn make_type_announce_msg(types: &[TypeSpec], origin: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::TypeAnnounce as u8);

    total_length += wire::push_u32(&mut buf, types.len() as u32);
    for spec in types {
        total_length += wire::push_u32(&mut buf, spec.alias);
        total_length += wire::push_sized_utf16(&mut buf, &spec.name);
        total_length += wire::push_u8(&mut buf, spec.on_demand as u8);
    }
    total_length += wire::push_utf16(&mut buf, origin);

    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_type_announce_msg(buf: &[u8]) -> Option<(Vec<TypeSpec>, String)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::TypeAnnounce)
    {
        return None;
    }

    let count = reader.read_u32();
    let mut types = Vec::new();
    for _ in 0..count {
        types.push(TypeSpec {
            alias: reader.read_u32(),
            name: reader.read_sized_utf16(),
            on_demand: reader.read_u8() != 0,
        });
        if reader.out_of_range() {
            return None;
        }
    }
    let origin = reader.read_tail_utf16();

    if reader.out_of_range() {
        return None;
    }
    Some((types, origin))
}

/// Ask a solver to begin producing the named on-demand types.
pub fn make_start_on_demand(requests: &[OnDemandRequest]) -> Vec<u8> {
    make_on_demand(MessageId::StartOnDemand, requests)
}

/// Ask a solver to stop producing the named on-demand types.
pub fn make_stop_on_demand(requests: &[OnDemandRequest]) -> Vec<u8> {
    make_on_demand(MessageId::StopOnDemand, requests)
}

fn make_on_demand(id: MessageId, requests: &[OnDemandRequest]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, id as u8);

    total_length += wire::push_u32(&mut buf, requests.len() as u32);
    for request in requests {
        total_length += wire::push_u32(&mut buf, request.type_alias);
        total_length += wire::push_u32(&mut buf, request.uri_patterns.len() as u32);
        for pattern in &request.uri_patterns {
            total_length += wire::push_sized_utf16(&mut buf, pattern);
        }
    }

    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_start_on_demand(buf: &[u8]) -> Option<Vec<OnDemandRequest>> {
    decode_on_demand(MessageId::StartOnDemand, buf)
}

pub fn decode_stop_on_demand(buf: &[u8]) -> Option<Vec<OnDemandRequest>> {
    decode_on_demand(MessageId::StopOnDemand, buf)
}

fn decode_on_demand(expected: MessageId, buf: &[u8]) -> Option<Vec<OnDemandRequest>> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4 || MessageId::from_u8(reader.read_u8()) != Some(expected) {
        return None;
    }

    let count = reader.read_u32();
    let mut requests = Vec::new();
    for _ in 0..count {
        let type_alias = reader.read_u32();
        let num_patterns = reader.read_u32();
        let mut uri_patterns = Vec::new();
        for _ in 0..num_patterns {
            uri_patterns.push(reader.read_sized_utf16());
            if reader.out_of_range() {
                return None;
            }
        }
        requests.push(OnDemandRequest {
            type_alias,
            uri_patterns,
        });
        if reader.out_of_range() {
            return None;
        }
    }

    if reader.out_of_range() {
        return None;
    }
    Some(requests)
}

/// Encode a batch of solutions. `create_uris` asks the world model to
/// create any target URI that does not yet exist.
pub fn make_solver_data_msg(create_uris: bool, solutions: &[Solution]) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::SolverData as u8);

    total_length += wire::push_u8(&mut buf, create_uris as u8);
    total_length += wire::push_u32(&mut buf, solutions.len() as u32);
    for solution in solutions {
        total_length += wire::push_u32(&mut buf, solution.type_alias);
        total_length += wire::push_i64(&mut buf, solution.time);
        total_length += wire::push_sized_utf16(&mut buf, &solution.target_uri);
        total_length += wire::push_sized_bytes(&mut buf, &solution.data);
    }

    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_solver_data_msg(buf: &[u8]) -> Option<(bool, Vec<Solution>)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::SolverData)
    {
        return None;
    }

    let create_uris = reader.read_u8() == 1;
    let count = reader.read_u32();
    let mut solutions = Vec::new();
    for _ in 0..count {
        solutions.push(Solution {
            type_alias: reader.read_u32(),
            time: reader.read_i64(),
            target_uri: reader.read_sized_utf16(),
            data: reader.read_sized_bytes(),
        });
        if reader.out_of_range() {
            return None;
        }
    }

    if reader.out_of_range() {
        return None;
    }
    Some((create_uris, solutions))
}

/// Create a new URI in the world model.
pub fn make_create_uri(uri: &str, created: GrailTime, origin: &str) -> Vec<u8> {
    make_uri_time_msg(MessageId::CreateUri, uri, created, origin)
}

pub fn decode_create_uri(buf: &[u8]) -> Option<(Uri, GrailTime, String)> {
    decode_uri_time_msg(MessageId::CreateUri, buf)
}

/// Expire a URI: it leaves the current world state at `expiration` but
/// stays in history.
pub fn make_expire_uri(uri: &str, expiration: GrailTime, origin: &str) -> Vec<u8> {
    make_uri_time_msg(MessageId::ExpireUri, uri, expiration, origin)
}

pub fn decode_expire_uri(buf: &[u8]) -> Option<(Uri, GrailTime, String)> {
    decode_uri_time_msg(MessageId::ExpireUri, buf)
}

fn make_uri_time_msg(id: MessageId, uri: &str, time: GrailTime, origin: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, id as u8);
    total_length += wire::push_sized_utf16(&mut buf, uri);
    total_length += wire::push_i64(&mut buf, time);
    total_length += wire::push_utf16(&mut buf, origin);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

fn decode_uri_time_msg(expected: MessageId, buf: &[u8]) -> Option<(Uri, GrailTime, String)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4 || MessageId::from_u8(reader.read_u8()) != Some(expected) {
        return None;
    }
    let uri = reader.read_sized_utf16();
    let time = reader.read_i64();
    let origin = reader.read_tail_utf16();
    if reader.out_of_range() {
        return None;
    }
    Some((uri, time, origin))
}

/// Expire one attribute of a URI at the given time.
pub fn make_expire_attribute(
    uri: &str,
    attribute: &str,
    expiration: GrailTime,
    origin: &str,
) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::ExpireAttribute as u8);
    total_length += wire::push_sized_utf16(&mut buf, uri);
    total_length += wire::push_sized_utf16(&mut buf, attribute);
    total_length += wire::push_i64(&mut buf, expiration);
    total_length += wire::push_utf16(&mut buf, origin);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_expire_attribute(buf: &[u8]) -> Option<(Uri, String, GrailTime, String)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::ExpireAttribute)
    {
        return None;
    }
    let uri = reader.read_sized_utf16();
    let attribute = reader.read_sized_utf16();
    let expiration = reader.read_i64();
    let origin = reader.read_tail_utf16();
    if reader.out_of_range() {
        return None;
    }
    Some((uri, attribute, expiration, origin))
}

/// Remove a URI from the world model for all time.
pub fn make_delete_uri(uri: &str, origin: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::DeleteUri as u8);
    total_length += wire::push_sized_utf16(&mut buf, uri);
    total_length += wire::push_utf16(&mut buf, origin);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_delete_uri(buf: &[u8]) -> Option<(Uri, String)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::DeleteUri)
    {
        return None;
    }
    let uri = reader.read_sized_utf16();
    let origin = reader.read_tail_utf16();
    if reader.out_of_range() {
        return None;
    }
    Some((uri, origin))
}

/// Remove one attribute of a URI for all time.
pub fn make_delete_attribute(uri: &str, attribute: &str, origin: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::DeleteAttribute as u8);
    total_length += wire::push_sized_utf16(&mut buf, uri);
    total_length += wire::push_sized_utf16(&mut buf, attribute);
    total_length += wire::push_utf16(&mut buf, origin);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

pub fn decode_delete_attribute(buf: &[u8]) -> Option<(Uri, String, String)> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4
        || MessageId::from_u8(reader.read_u8()) != Some(MessageId::DeleteAttribute)
    {
        return None;
    }
    let uri = reader.read_sized_utf16();
    let attribute = reader.read_sized_utf16();
    let origin = reader.read_tail_utf16();
    if reader.out_of_range() {
        return None;
    }
    Some((uri, attribute, origin))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_identifier() {
        let msg = make_handshake_msg();
        assert!(check_handshake_msg(&msg));
        assert_eq!(&msg[4..30], b"GRAIL world model protocol");
    }

    #[test]
    fn test_type_announce_roundtrip() {
        let types = vec![
            TypeSpec {
                alias: 1,
                name: "location".to_string(),
                on_demand: false,
            },
            TypeSpec {
                alias: 2,
                name: "proximity".to_string(),
                on_demand: true,
            },
        ];
        let msg = make_type_announce_msg(&types, "solver.localizer");
        assert_eq!(msg[4], MessageId::TypeAnnounce as u8);
        let (decoded, origin) = decode_type_announce_msg(&msg).unwrap();
        assert_eq!(decoded, types);
        assert_eq!(origin, "solver.localizer");
    }

    #[test]
    fn test_type_announce_truncation_safety() {
        let types = vec![TypeSpec {
            alias: 1,
            name: "x".to_string(),
            on_demand: true,
        }];
        let msg = make_type_announce_msg(&types, "o");
        for k in 0..msg.len() {
            assert_eq!(decode_type_announce_msg(&msg[..k]), None);
        }
    }

    fn on_demand() -> Vec<OnDemandRequest> {
        vec![
            OnDemandRequest {
                type_alias: 2,
                uri_patterns: vec!["lamp.*".to_string(), "door.*".to_string()],
            },
            OnDemandRequest {
                type_alias: 5,
                uri_patterns: Vec::new(),
            },
        ]
    }

    #[test]
    fn test_on_demand_roundtrip() {
        let requests = on_demand();
        let start = make_start_on_demand(&requests);
        assert_eq!(start[4], MessageId::StartOnDemand as u8);
        assert_eq!(decode_start_on_demand(&start), Some(requests.clone()));
        assert_eq!(decode_stop_on_demand(&start), None);

        let stop = make_stop_on_demand(&requests);
        assert_eq!(stop[4], MessageId::StopOnDemand as u8);
        assert_eq!(decode_stop_on_demand(&stop), Some(requests));
        // Same payload, different ID byte
        assert_eq!(start[5..], stop[5..]);
    }

    #[test]
    fn test_on_demand_truncation_safety() {
        let msg = make_start_on_demand(&on_demand());
        for k in 0..msg.len() {
            assert_eq!(decode_start_on_demand(&msg[..k]), None);
        }
    }

    #[test]
    fn test_solver_data_roundtrip() {
        let solutions = vec![
            Solution {
                type_alias: 1,
                time: 12345,
                target_uri: "robot.kitchen".to_string(),
                data: vec![0x01, 0x02],
            },
            Solution {
                type_alias: 9,
                time: -1,
                target_uri: "robot.hall".to_string(),
                data: vec![0xFF; 32],
            },
        ];
        let msg = make_solver_data_msg(true, &solutions);
        assert_eq!(msg[4], MessageId::SolverData as u8);
        let (create, decoded) = decode_solver_data_msg(&msg).unwrap();
        assert!(create);
        assert_eq!(decoded, solutions);

        let msg = make_solver_data_msg(false, &solutions);
        let (create, decoded) = decode_solver_data_msg(&msg).unwrap();
        assert!(!create);
        assert_eq!(decoded, solutions);
    }

    #[test]
    fn test_solver_data_truncation_safety() {
        let msg = make_solver_data_msg(
            true,
            &[Solution {
                type_alias: 1,
                time: 5,
                target_uri: "a.b".to_string(),
                data: vec![9],
            }],
        );
        for k in 0..msg.len() {
            assert_eq!(decode_solver_data_msg(&msg[..k]), None);
        }
    }

    #[test]
    fn test_create_uri_roundtrip() {
        let msg = make_create_uri("cart.7", 777, "solver.tracker");
        assert_eq!(msg[4], MessageId::CreateUri as u8);
        assert_eq!(
            decode_create_uri(&msg),
            Some(("cart.7".to_string(), 777, "solver.tracker".to_string()))
        );
        assert_eq!(decode_expire_uri(&msg), None);
    }

    #[test]
    fn test_expire_uri_roundtrip() {
        let msg = make_expire_uri("cart.7", i64::MAX, "janitor");
        assert_eq!(msg[4], MessageId::ExpireUri as u8);
        assert_eq!(
            decode_expire_uri(&msg),
            Some(("cart.7".to_string(), i64::MAX, "janitor".to_string()))
        );
    }

    #[test]
    fn test_expire_attribute_roundtrip() {
        let msg = make_expire_attribute("cart.7", "location", 900, "janitor");
        assert_eq!(msg[4], MessageId::ExpireAttribute as u8);
        assert_eq!(
            decode_expire_attribute(&msg),
            Some((
                "cart.7".to_string(),
                "location".to_string(),
                900,
                "janitor".to_string()
            ))
        );
    }

    #[test]
    fn test_delete_uri_roundtrip() {
        let msg = make_delete_uri("cart.7", "janitor");
        assert_eq!(msg[4], MessageId::DeleteUri as u8);
        assert_eq!(
            decode_delete_uri(&msg),
            Some(("cart.7".to_string(), "janitor".to_string()))
        );
    }

    #[test]
    fn test_delete_attribute_roundtrip() {
        let msg = make_delete_attribute("cart.7", "location", "janitor");
        assert_eq!(msg[4], MessageId::DeleteAttribute as u8);
        assert_eq!(
            decode_delete_attribute(&msg),
            Some((
                "cart.7".to_string(),
                "location".to_string(),
                "janitor".to_string()
            ))
        );
    }

    #[test]
    fn test_empty_origin_allowed() {
        let msg = make_delete_uri("cart.7", "");
        assert_eq!(
            decode_delete_uri(&msg),
            Some(("cart.7".to_string(), String::new()))
        );
    }

    #[test]
    fn test_keep_alive_layout() {
        assert_eq!(make_keep_alive(), [0, 0, 0, 1, 0]);
        assert_eq!(decode_message_id(&make_keep_alive()), Some(MessageId::KeepAlive));
    }
}
