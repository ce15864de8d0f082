//! Error types for grail-wire
//!
//! # Error Recovery Strategies
//!
//! The crate draws a hard line between decode failures and transport
//! failures:
//!
//! ## Decode Failures (Not Errors)
//!
//! Malformed frames never produce an `Error`. Every message decoder is
//! total: it returns `None` when the declared frame length disagrees with
//! the buffer, when the message-ID byte is wrong, or when an embedded count
//! or string size overruns the frame. Callers drop the frame and continue;
//! the connection remains usable.
//!
//! ## Transport Failures (Terminate the Connection)
//!
//! - **`ConnectionClosed`**: The peer shut down the stream, or a broken
//!   pipe / reset surfaced mid-transfer. The socket has already been shut
//!   down; the owning task should drop the connection.
//! - **`Io`**: Any other hard I/O error. Treat the connection as dead.
//! - **`Resolve`**: Address lookup produced no usable candidates. Retrying
//!   is only useful after the environment changes.
//!
//! ## Transient Failures (Retry)
//!
//! - **`TemporarilyUnavailable`**: The send path waited a full second
//!   without the socket accepting a single byte. The data was not sent in
//!   full; callers may retry the whole message.
//! - **`WouldBlock`**: A non-blocking receive found nothing to read. This
//!   is flow control for the message framer, not a failure.

use thiserror::Error;

/// Errors that can occur in grail-wire
///
/// See module-level documentation for recovery strategies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("resource temporarily unavailable")]
    TemporarilyUnavailable,

    #[error("operation would block")]
    WouldBlock,

    #[error("address resolution failed: {0}")]
    Resolve(String),
}

pub type Result<T> = std::result::Result<T, Error>;
