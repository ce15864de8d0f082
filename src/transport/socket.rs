//! Duplex byte-stream sockets
//!
//! A [`Connection`] owns one TCP stream kept in non-blocking mode. Reads
//! are best-effort and surface `WouldBlock` for the framer to absorb;
//! sends loop until every byte is on the wire, giving up with
//! `TemporarilyUnavailable` only after a full second without progress.
//! A peer close or hard I/O error shuts the socket down immediately and
//! surfaces `ConnectionClosed`.
//!
//! Connections are movable but not copyable; the file descriptor closes
//! when the value drops, after a short read-drain so the peer sees an
//! orderly shutdown rather than a reset.

use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

/// Cap on waiting for a TCP connect to complete.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a send may stall without transferring a single byte.
const SEND_STALL_LIMIT: Duration = Duration::from_secs(1);

/// Sleep between readiness probes.
const POLL_SLEEP: Duration = Duration::from_millis(1);

/// One established duplex byte channel.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    open: bool,
}

impl Connection {
    /// Resolve `host` (IPv4 or IPv6, name or literal) and connect, waiting
    /// at most five seconds per candidate address.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Resolve(format!("{}:{}: {}", host, port, e)))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::Resolve(format!("{}:{}: no addresses", host, port)));
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    info!("Connected to {}", addr);
                    return Self::from_stream(stream, addr);
                }
                Err(e) => {
                    warn!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(match last_err {
            Some(e) => Error::Io(e),
            None => Error::Resolve(format!("{}:{}: no usable address", host, port)),
        })
    }

    /// Wrap an established stream, switching it to this module's modes.
    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Result<Self> {
        stream.set_nonblocking(true)?;
        // Frames are small; waiting to coalesce them costs latency
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            open: true,
        })
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// True until a close or fatal error has been observed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            debug!("Shutting down connection to {}", self.peer);
            let _ = self.stream.shutdown(Shutdown::Both);
            self.open = false;
        }
    }

    /// Wait up to `timeout_ms` for the socket to become readable.
    ///
    /// Returns `Ok(true)` as soon as a read would not block, `Ok(false)` if
    /// the deadline passes quietly, and `ConnectionClosed` if the peer has
    /// shut down or the socket is in an error state.
    pub fn input_ready(&mut self, timeout_ms: u64) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut probe = [0u8; 1];
        loop {
            match self.stream.peek(&mut probe) {
                Ok(0) => {
                    self.close();
                    return Err(Error::ConnectionClosed);
                }
                Ok(_) => return Ok(true),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Ok(false);
                    }
                    thread::sleep(POLL_SLEEP);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Socket error on {}: {}", self.peer, e);
                    self.close();
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }

    /// Best-effort non-blocking read into `buf`.
    ///
    /// Returns the byte count, `WouldBlock` when nothing is pending, and
    /// `ConnectionClosed` once the peer has shut down.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream.read(buf) {
            Ok(0) => {
                self.close();
                Err(Error::ConnectionClosed)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(Error::WouldBlock),
            Err(e) if e.kind() == ErrorKind::Interrupted => Err(Error::WouldBlock),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                ) =>
            {
                self.close();
                Err(Error::ConnectionClosed)
            }
            Err(e) => {
                self.close();
                Err(Error::Io(e))
            }
        }
    }

    /// Write the entire buffer, waiting for the socket between chunks.
    ///
    /// A full second without a single byte accepted fails with
    /// `TemporarilyUnavailable` and leaves the message incomplete; the
    /// caller may retry the whole message. A broken pipe or reset closes
    /// the socket and fails with `ConnectionClosed`.
    pub fn send(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0usize;
        let mut last_progress = Instant::now();
        while written < buf.len() {
            match self.stream.write(&buf[written..]) {
                Ok(0) => {
                    self.close();
                    return Err(Error::ConnectionClosed);
                }
                Ok(n) => {
                    written += n;
                    last_progress = Instant::now();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if last_progress.elapsed() >= SEND_STALL_LIMIT {
                        warn!("Send to {} stalled for {:?}", self.peer, SEND_STALL_LIMIT);
                        return Err(Error::TemporarilyUnavailable);
                    }
                    thread::sleep(POLL_SLEEP);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::BrokenPipe
                            | ErrorKind::ConnectionReset
                            | ErrorKind::ConnectionAborted
                    ) =>
                {
                    debug!("Peer {} closed during send: {}", self.peer, e);
                    self.close();
                    return Err(Error::ConnectionClosed);
                }
                Err(e) => {
                    self.close();
                    return Err(Error::Io(e));
                }
            }
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.open {
            let _ = self.stream.shutdown(Shutdown::Both);
            // Drain whatever the peer had in flight so the close is orderly
            let mut scratch = [0u8; 256];
            for _ in 0..64 {
                match self.stream.read(&mut scratch) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            self.open = false;
        }
    }
}

/// A listening TCP socket handing out [`Connection`]s.
pub struct Listener {
    inner: std::net::TcpListener,
}

impl Listener {
    /// Bind to every interface on `port`. Port 0 picks a free port;
    /// [`Listener::local_port`] reports the result.
    pub fn bind(port: u16) -> Result<Self> {
        let inner = std::net::TcpListener::bind(("0.0.0.0", port))?;
        info!("Listening on {}", inner.local_addr()?);
        Ok(Self { inner })
    }

    pub fn local_port(&self) -> Result<u16> {
        Ok(self.inner.local_addr()?.port())
    }

    /// Block until the next peer connects.
    pub fn accept(&self) -> Result<Connection> {
        let (stream, peer) = self.inner.accept()?;
        info!("Accepted connection from {}", peer);
        Connection::from_stream(stream, peer)
    }
}
