//! Sensor → aggregator protocol
//!
//! The simplest face of the platform: after the handshake a sensor only
//! ever sends sample messages, so frames carry no MessageID byte.
//!
//! Sample message layout:
//!
//! ```text
//! u32  length (everything after this field)
//! u8   physical layer
//! u128 transmitter id
//! u128 receiver id
//! i64  receive timestamp (ms since epoch)
//! f32  received signal strength
//! ...  sense data, to end of frame (may be empty)
//! ```

use crate::types::{push_sample, read_sample, Sample};
use crate::wire::{self, WireReader};

/// Identifier sent in this protocol's handshake.
pub const PROTOCOL_ID: &str = "GRAIL sensor protocol";

/// Build the connection-opening handshake.
pub fn make_handshake_msg() -> Vec<u8> {
    super::make_handshake(PROTOCOL_ID)
}

/// Check a received handshake for this protocol face.
pub fn check_handshake_msg(buf: &[u8]) -> bool {
    super::check_handshake(buf, PROTOCOL_ID)
}

/// Encode a sample message.
pub fn make_sample_msg(sample: &Sample) -> Vec<u8> {
    let mut buf = vec![0u8; 4];
    let total_length = push_sample(&mut buf, sample);
    wire::put_u32_at(&mut buf, 0, total_length as u32);
    buf
}

/// Decode a sample message. Returns `None` if the frame is malformed.
pub fn decode_sample_msg(buf: &[u8]) -> Option<Sample> {
    let mut reader = WireReader::new(buf);
    let total_length = reader.read_u32() as usize;
    if buf.len() != total_length + 4 {
        return None;
    }
    let sample = read_sample(&mut reader);
    if reader.out_of_range() {
        return None;
    }
    Some(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        Sample {
            physical_layer: 1,
            tx_id: (3u128 << 64) | 0x1122,
            rx_id: 0xCAFE,
            rx_timestamp: 1_300_000_000_123,
            rss: -71.25,
            sense_data: vec![0xDE, 0xAD],
        }
    }

    #[test]
    fn test_handshake_identifier() {
        let msg = make_handshake_msg();
        assert!(check_handshake_msg(&msg));
        assert_eq!(&msg[4..25], b"GRAIL sensor protocol");
    }

    #[test]
    fn test_sample_roundtrip() {
        let s = sample();
        let msg = make_sample_msg(&s);
        // phy + two ids + timestamp + rss + 2 sense bytes
        assert_eq!(msg.len(), 4 + 1 + 16 + 16 + 8 + 4 + 2);
        assert_eq!(decode_sample_msg(&msg), Some(s));
    }

    #[test]
    fn test_sample_empty_sense_data() {
        let s = Sample {
            sense_data: Vec::new(),
            ..sample()
        };
        let msg = make_sample_msg(&s);
        assert_eq!(msg.len(), 4 + 45);
        assert_eq!(decode_sample_msg(&msg), Some(s));
    }

    #[test]
    fn test_sample_length_mismatch() {
        let mut msg = make_sample_msg(&sample());
        msg.push(0);
        assert_eq!(decode_sample_msg(&msg), None);
    }

    #[test]
    fn test_sample_truncation_safety() {
        let msg = make_sample_msg(&sample());
        for k in 0..msg.len() {
            assert_eq!(decode_sample_msg(&msg[..k]), None);
        }
    }
}
