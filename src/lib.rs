//! grail-wire - wire protocol and framing for the GRAIL location platform
//!
//! The GRAIL platform moves observations from radio sensors through an
//! aggregator, into solvers that derive higher-level facts, and finally
//! into a world model that stores named objects and their attributes.
//! Those peers speak three binary protocols over TCP; this crate owns the
//! bit-exact encoding and decoding of every message, the length-prefixed
//! framing that carves discrete messages out of the byte stream, and the
//! socket plumbing that moves whole messages without truncation.
//!
//! What it deliberately does not do: store or index world model data,
//! match subscriptions inside an aggregator, collect samples on sensor
//! hardware, or load configuration. Those live with the processes that use
//! this crate.

pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use error::{Error, Result};
pub use transport::{Connection, Listener, MessageReceiver};
pub use types::{GrailTime, ReceiverId, Sample, Transmitter, TransmitterId, MAX_GRAIL_TIME};
