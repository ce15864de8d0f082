//! Core identifier, time, and sample types shared by every protocol face

use crate::wire::{self, WireReader};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, signed.
pub type GrailTime = i64;

/// Sentinel expiration meaning "never expires".
pub const MAX_GRAIL_TIME: GrailTime = i64::MAX;

/// 128-bit transmitter identifier. Travels as two big-endian 64-bit halves,
/// upper half first, which is exactly `u128::to_be_bytes`.
pub type TransmitterId = u128;

/// 128-bit receiver identifier, same representation as [`TransmitterId`].
pub type ReceiverId = u128;

/// Current time in milliseconds since the Unix epoch.
pub fn grail_time_now() -> GrailTime {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as GrailTime)
        .unwrap_or(0)
}

/// Full-width decimal rendering of a 128-bit identifier.
pub fn id_to_string(id: u128) -> String {
    id.to_string()
}

/// Decimal rendering of only the low 64 bits of an identifier.
///
/// Existing deployments format identifiers this way in logs and text
/// configuration, so the truncated form is kept for interoperability with
/// text produced by those peers. New code should use [`id_to_string`].
pub fn id_to_legacy_string(id: u128) -> String {
    (id as u64).to_string()
}

/// A physical layer tag paired with a transmitter identifier.
///
/// Ordering is by physical layer first, then identifier, which the derived
/// implementations provide through field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Transmitter {
    pub phy: u8,
    pub id: TransmitterId,
}

impl Transmitter {
    /// Read the 17-byte wire form: phy, then upper and lower id halves.
    pub fn read_from(reader: &mut WireReader) -> Self {
        let phy = reader.read_u8();
        let id = reader.read_u128();
        Self { phy, id }
    }

    /// Append the 17-byte wire form. Returns the bytes written.
    pub fn push_onto(&self, buf: &mut Vec<u8>) -> usize {
        wire::push_u8(buf, self.phy) + wire::push_u128(buf, self.id)
    }
}

impl fmt::Display for Transmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.phy, self.id)
    }
}

/// One received packet observation: who transmitted, who heard it, when,
/// how strongly, and whatever extra sensed payload came along.
///
/// `sense_data` occupies the rest of its message on the wire (no inner
/// length prefix) and may be empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    pub physical_layer: u8,
    pub tx_id: TransmitterId,
    pub rx_id: ReceiverId,
    pub rx_timestamp: GrailTime,
    pub rss: f32,
    pub sense_data: Vec<u8>,
}

/// Append the sample record fields (everything after the frame header).
pub(crate) fn push_sample(buf: &mut Vec<u8>, sample: &Sample) -> usize {
    wire::push_u8(buf, sample.physical_layer)
        + wire::push_u128(buf, sample.tx_id)
        + wire::push_u128(buf, sample.rx_id)
        + wire::push_i64(buf, sample.rx_timestamp)
        + wire::push_f32(buf, sample.rss)
        + wire::push_bytes(buf, &sample.sense_data)
}

/// Read the sample record fields, consuming the rest of the frame as
/// sense data.
pub(crate) fn read_sample(reader: &mut WireReader) -> Sample {
    Sample {
        physical_layer: reader.read_u8(),
        tx_id: reader.read_u128(),
        rx_id: reader.read_u128(),
        rx_timestamp: reader.read_i64(),
        rss: reader.read_f32(),
        sense_data: reader.read_tail_bytes(),
    }
}
