//! Aggregator ↔ solver protocol
//!
//! Solvers tell an aggregator which transmitters they care about with
//! subscription rules; the aggregator streams matching samples back.
//!
//! Subscription payload layout (request and response are identical apart
//! from the MessageID byte):
//!
//! ```text
//! u32  rule count
//! per rule:
//!   u8   physical layer
//!   u32  transmitter filter count
//!   per filter:
//!     u128 base id
//!     u128 mask
//!   u64  update interval (ms)
//! ```

use crate::types::{push_sample, read_sample, Sample, Transmitter};
use crate::wire::{self, WireReader};

/// Identifier sent in this protocol's handshake.
pub const PROTOCOL_ID: &str = "GRAIL solver protocol";

/// Message kinds exchanged between aggregators and solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    KeepAlive = 0,
    Certificate = 1,
    AckCertificate = 2,
    SubscriptionRequest = 3,
    SubscriptionResponse = 4,
    DevicePosition = 5,
    ServerSample = 6,
    BufferOverrun = 7,
}

impl MessageId {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageId::KeepAlive),
            1 => Some(MessageId::Certificate),
            2 => Some(MessageId::AckCertificate),
            3 => Some(MessageId::SubscriptionRequest),
            4 => Some(MessageId::SubscriptionResponse),
            5 => Some(MessageId::DevicePosition),
            6 => Some(MessageId::ServerSample),
            7 => Some(MessageId::BufferOverrun),
            _ => None,
        }
    }
}

/// A transmitter range: any id equal to `base_id` under `mask` matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRule {
    pub base_id: u128,
    pub mask: u128,
}

/// One subscription rule: a physical layer, the transmitter ranges of
/// interest, and how often updates are wanted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rule {
    pub physical_layer: u8,
    pub txers: Vec<TxRule>,
    /// Desired update interval in milliseconds.
    pub update_interval: u64,
}

impl Rule {
    /// True if the transmitter falls under this rule: the physical layers
    /// agree and some filter's masked base matches the masked id.
    pub fn matches(&self, t: &Transmitter) -> bool {
        self.physical_layer == t.phy
            && self
                .txers
                .iter()
                .any(|f| t.id & f.mask == f.base_id & f.mask)
    }
}

/// A solver's full set of subscription rules.
pub type Subscription = Vec<Rule>;

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
    make_id_only(MessageId::KeepAlive)
}

/// Encode a buffer-overrun notice, sent when a slow consumer caused
/// sample loss (ID byte only).
pub fn make_buffer_overrun() -> Vec<u8> {
    make_id_only(MessageId::BufferOverrun)
}

fn make_id_only(id: MessageId) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let total_length = wire::push_u8(&mut buf, id as u8);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

/// Encode a subscription request.
pub fn make_subscription_request(rules: &Subscription) -> Vec<u8> {
    make_subscription(MessageId::SubscriptionRequest, rules)
}

/// Encode a subscription response (the aggregator echoes the rules it
/// actually granted).
pub fn make_subscription_response(rules: &Subscription) -> Vec<u8> {
    make_subscription(MessageId::SubscriptionResponse, rules)
}

fn make_subscription(id: MessageId, rules: &Subscription) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, id as u8);

    total_length += wire::push_u32(&mut buf, rules.len() as u32);
    for rule in rules {
        total_length += wire::push_u8(&mut buf, rule.physical_layer);
        total_length += wire::push_u32(&mut buf, rule.txers.len() as u32);
        for txer in &rule.txers {
            total_length += wire::push_u128(&mut buf, txer.base_id);
            total_length += wire::push_u128(&mut buf, txer.mask);
        }
        total_length += wire::push_u64(&mut buf, rule.update_interval);
    }

    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

/// Decode a subscription message. Accepts both the request and response
/// kinds since they share one payload format.
pub fn decode_subscription_msg(buf: &[u8]) -> Option<Subscription> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    let msg_id = MessageId::from_u8(reader.read_u8());
    if buf.len() != total_length + 4
        || !matches!(
            msg_id,
            Some(MessageId::SubscriptionRequest) | Some(MessageId::SubscriptionResponse)
        )
    {
        return None;
    }

    let num_rules = reader.read_u32();
    let mut rules = Vec::new();
    for _ in 0..num_rules {
        let physical_layer = reader.read_u8();
        let num_txers = reader.read_u32();
        let mut txers = Vec::new();
        for _ in 0..num_txers {
            txers.push(TxRule {
                base_id: reader.read_u128(),
                mask: reader.read_u128(),
            });
            if reader.out_of_range() {
                return None;
            }
        }
        rules.push(Rule {
            physical_layer,
            txers,
            update_interval: reader.read_u64(),
        });
        if reader.out_of_range() {
            return None;
        }
    }

    if reader.out_of_range() {
        return None;
    }
    Some(rules)
}

/// Encode a sample forwarded to subscribed solvers.
pub fn make_sample_msg(sample: &Sample) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let mut total_length = wire::push_u8(&mut buf, MessageId::ServerSample as u8);
    total_length += push_sample(&mut buf, sample);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

/// Decode a forwarded sample. Returns `None` if the frame is malformed.
pub fn decode_sample_msg(buf: &[u8]) -> Option<Sample> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    let msg_id = MessageId::from_u8(reader.read_u8());
    if buf.len() != total_length + 4 || msg_id != Some(MessageId::ServerSample) {
        return None;
    }
    let sample = read_sample(&mut reader);
    if reader.out_of_range() {
        return None;
    }
    Some(sample)
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

    fn subscription() -> Subscription {
        vec![
            Rule {
                physical_layer: 1,
                txers: vec![
                    TxRule {
                        base_id: 0x1000,
                        mask: 0xFF00,
                    },
                    TxRule {
                        base_id: (7u128 << 64) | 5,
                        mask: u128::MAX,
                    },
                ],
                update_interval: 250,
            },
            Rule {
                physical_layer: 2,
                txers: Vec::new(),
                update_interval: 0,
            },
        ]
    }

    #[test]
    fn test_subscription_roundtrip() {
        let rules = subscription();
        let req = make_subscription_request(&rules);
        assert_eq!(req[4], MessageId::SubscriptionRequest as u8);
        assert_eq!(decode_subscription_msg(&req), Some(rules.clone()));

        let resp = make_subscription_response(&rules);
        assert_eq!(resp[4], MessageId::SubscriptionResponse as u8);
        assert_eq!(decode_subscription_msg(&resp), Some(rules.clone()));

        // Same payload, different ID byte
        assert_eq!(req[5..], resp[5..]);
    }

    #[test]
    fn test_subscription_rejects_other_ids() {
        let mut msg = make_subscription_request(&subscription());
        msg[4] = MessageId::ServerSample as u8;
        assert_eq!(decode_subscription_msg(&msg), None);
    }

    #[test]
    fn test_subscription_truncation_safety() {
        let msg = make_subscription_request(&subscription());
        for k in 0..msg.len() {
            assert_eq!(decode_subscription_msg(&msg[..k]), None);
        }
    }

    #[test]
    fn test_subscription_bad_count_rejected() {
        let mut msg = make_subscription_request(&subscription());
        // Inflate the rule count past what the frame holds
        msg[5..9].copy_from_slice(&100u32.to_be_bytes());
        assert_eq!(decode_subscription_msg(&msg), None);
    }

    #[test]
    fn test_rule_matching() {
        let rule = Rule {
            physical_layer: 1,
            txers: vec![TxRule {
                base_id: 0x1200,
                mask: 0xFF00,
            }],
            update_interval: 100,
        };
        assert!(rule.matches(&Transmitter { phy: 1, id: 0x1234 }));
        assert!(!rule.matches(&Transmitter { phy: 2, id: 0x1234 }));
        assert!(!rule.matches(&Transmitter { phy: 1, id: 0x1334 }));
    }

    #[test]
    fn test_sample_roundtrip() {
        let s = Sample {
            physical_layer: 3,
            tx_id: 9,
            rx_id: 10,
            rx_timestamp: -5,
            rss: 0.5,
            sense_data: vec![1, 2, 3, 4],
        };
        let msg = make_sample_msg(&s);
        assert_eq!(msg[4], MessageId::ServerSample as u8);
        assert_eq!(decode_sample_msg(&msg), Some(s));
    }

    #[test]
    fn test_sample_truncation_safety() {
        let msg = make_sample_msg(&Sample::default());
        for k in 0..msg.len() {
            assert_eq!(decode_sample_msg(&msg[..k]), None);
        }
    }

    #[test]
    fn test_keep_alive_layout() {
        let msg = make_keep_alive();
        assert_eq!(msg, [0, 0, 0, 1, 0]);
        assert_eq!(decode_message_id(&msg), Some(MessageId::KeepAlive));
    }

    #[test]
    fn test_buffer_overrun_layout() {
        let msg = make_buffer_overrun();
        assert_eq!(msg, [0, 0, 0, 1, 7]);
        assert_eq!(decode_message_id(&msg), Some(MessageId::BufferOverrun));
    }

    #[test]
    fn test_decode_message_id_checks_envelope() {
        let msg = make_keep_alive();
        assert_eq!(decode_message_id(&msg[..4]), None);
        let mut bad = msg.clone();
        bad[4] = 0xEE;
        assert_eq!(decode_message_id(&bad), None);
    }
}
