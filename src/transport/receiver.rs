//! Message framer: whole frames out of an arbitrarily segmented stream
//!
//! Every protocol message begins with a big-endian `u32` length counting
//! the bytes after it, so a frame occupies `length + 4` bytes. TCP is free
//! to split or merge frames in transit; [`MessageReceiver`] buffers
//! whatever has arrived and hands back exactly one complete frame at a
//! time, in arrival order, never a partial one.
//!
//! Blocking calls take a shared interrupt flag and return promptly once it
//! is set, so a shutting-down owner can unwind a reader thread without
//! tearing the socket out from under it.

use crate::error::{Error, Result};
use crate::transport::socket::Connection;
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Receive chunk size; frames larger than this just take several reads.
const RECV_CHUNK: usize = 8192;

/// How long `available` waits for the socket before reporting nothing.
const AVAILABLE_WAIT_MS: u64 = 10;

/// Sleep between receive attempts while blocked in `next`.
const RETRY_SLEEP: Duration = Duration::from_millis(1);

/// Reassembles length-prefixed frames from one owned [`Connection`].
///
/// All state sits behind one mutex, so concurrent calls on a shared
/// receiver serialize; use one connection per thread for parallelism.
pub struct MessageReceiver {
    inner: Mutex<Inner>,
}

struct Inner {
    sock: Connection,
    /// Bytes received but not yet handed out as a whole frame.
    pending: Vec<u8>,
}

impl Inner {
    /// Total on-wire size of the first frame, once enough of it is here to
    /// know, or `None` while the length prefix is still incomplete.
    fn first_frame_size(&self) -> Option<usize> {
        if self.pending.len() < 4 {
            return None;
        }
        let declared = u32::from_be_bytes([
            self.pending[0],
            self.pending[1],
            self.pending[2],
            self.pending[3],
        ]) as usize;
        Some(declared + 4)
    }

    fn has_complete_frame(&self) -> bool {
        self.first_frame_size()
            .is_some_and(|size| self.pending.len() >= size)
    }

    /// One receive attempt; absorbs `WouldBlock`, propagates the rest.
    fn fill(&mut self) -> Result<bool> {
        let mut chunk = [0u8; RECV_CHUNK];
        match self.sock.receive(&mut chunk) {
            Ok(n) => {
                self.pending.extend_from_slice(&chunk[..n]);
                Ok(true)
            }
            Err(Error::WouldBlock) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Split the first complete frame off the front of `pending`.
    fn take_frame(&mut self, size: usize) -> Vec<u8> {
        let rest = self.pending.split_off(size);
        std::mem::replace(&mut self.pending, rest)
    }
}

impl MessageReceiver {
    /// Take ownership of a connection and start with an empty buffer.
    pub fn new(sock: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sock,
                pending: Vec::new(),
            }),
        }
    }

    /// Check whether a whole frame is ready without committing to a
    /// blocking read.
    ///
    /// Buffered data answers immediately. Otherwise this waits up to 10 ms
    /// for the socket and takes one receive, unless `interrupted` is
    /// already set, in which case it touches no I/O and reports false.
    /// A closed peer or hard I/O error is returned as the corresponding
    /// [`Error`].
    pub fn available(&self, interrupted: &AtomicBool) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.has_complete_frame() {
            return Ok(true);
        }
        if interrupted.load(Ordering::Relaxed) {
            return Ok(false);
        }
        if inner.sock.input_ready(AVAILABLE_WAIT_MS)? {
            inner.fill()?;
        }
        Ok(inner.has_complete_frame())
    }

    /// Block until a whole frame is here, then return it.
    ///
    /// Leftover bytes past the frame stay buffered for the next call, so
    /// boundaries survive any segmentation the transport applied. While
    /// the socket has nothing, this sleeps in 1 ms steps and rechecks
    /// `interrupted`; once the flag is set it returns an empty buffer
    /// without touching `pending`.
    pub fn next(&self, interrupted: &AtomicBool) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        loop {
            if interrupted.load(Ordering::Relaxed) {
                return Ok(Vec::new());
            }
            if let Some(size) = inner.first_frame_size() {
                if inner.pending.len() >= size {
                    debug!("Frame complete: {} bytes", size);
                    return Ok(inner.take_frame(size));
                }
            }
            if !inner.fill()? {
                thread::sleep(RETRY_SLEEP);
            }
        }
    }
}
