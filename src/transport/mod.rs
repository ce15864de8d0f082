//! Stream transport: sockets and message framing
//!
//! [`socket::Connection`] is a thin duplex byte channel over TCP with
//! non-blocking reads and partial-write-safe sends. [`receiver::MessageReceiver`]
//! sits on top of one connection and reassembles whole length-prefixed
//! frames regardless of how the stream was segmented in transit.

pub mod receiver;
pub mod socket;

pub use receiver::MessageReceiver;
pub use socket::{Connection, Listener};
