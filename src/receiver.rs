//! Blocking frame receiver.
//!
//! Turns a byte stream whose read boundaries have nothing to do with frame
//! boundaries into a sequence of validated [`Frame`]s. Each call to
//! [`FrameReceiver::receive_frame`] consumes exactly one frame's bytes:
//!
//! 1. Exact-read the 20-byte header
//! 2. Validate magic (and the optional payload limit)
//! 3. Exact-read `data_size` payload bytes
//!
//! A clean EOF anywhere in that sequence is end of stream (`Ok(None)`), not
//! an error. A bad magic number closes the receiver: there is no scan for
//! the next sentinel.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use camwire_client::protocol::{build_frame, FrameHeader};
//! use camwire_client::FrameReceiver;
//!
//! let bytes = build_frame(&FrameHeader::new(2, 2, 0), &[0xAA, 0xBB, 0xCC, 0xDD]);
//! let mut receiver = FrameReceiver::new(Cursor::new(bytes));
//!
//! let frame = receiver.receive_frame().unwrap().unwrap();
//! assert_eq!(frame.payload(), &[0xAA, 0xBB, 0xCC, 0xDD]);
//! assert!(receiver.receive_frame().unwrap().is_none());
//! ```

use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::error::{CamwireError, Result};
use crate::protocol::{Frame, FrameHeader, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use crate::transport::{connect, ConnectOptions, Connection};

/// Largest single read issued against the source (64 KB).
pub const RECV_CHUNK_SIZE: usize = 64 * 1024;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection has been opened yet.
    #[default]
    Disconnected,
    /// Open and readable.
    Connected,
    /// EOF, transport fault, protocol violation, or explicit shutdown.
    /// Terminal.
    Closed,
}

/// Reads frames from a single blocking byte source.
pub struct FrameReceiver<R> {
    reader: R,
    state: ConnectionState,
    max_payload_size: u32,
    frames_received: u64,
    bytes_consumed: u64,
}

impl FrameReceiver<Connection> {
    /// Open a TCP connection to `host:port` and wrap it in a receiver.
    pub fn connect(host: &str, port: u16, options: &ConnectOptions) -> Result<Self> {
        Ok(Self::new(connect(host, port, options)?))
    }

    /// Shut the socket down and mark the receiver closed.
    pub fn shutdown(&mut self) -> Result<()> {
        self.state = ConnectionState::Closed;
        self.reader.shutdown()
    }
}

impl<R: Read> FrameReceiver<R> {
    /// Wrap an already-open source. The receiver starts `Connected`.
    pub fn new(reader: R) -> Self {
        Self::with_max_payload(reader, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Wrap a source and reject headers declaring more than `max_payload_size` bytes.
    pub fn with_max_payload(reader: R, max_payload_size: u32) -> Self {
        Self {
            reader,
            state: ConnectionState::Connected,
            max_payload_size,
            frames_received: 0,
            bytes_consumed: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Frames delivered so far.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Bytes taken from the source so far, including partial frames.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    pub fn max_payload_size(&self) -> u32 {
        self.max_payload_size
    }

    /// Mark the receiver closed without touching the source.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read exactly `n` bytes.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` with `bytes.len() == n`
    /// - `Ok(None)` if the source hit EOF first (connection closed)
    /// - `Err(CamwireError::Transport)` on a read fault
    ///
    /// Either failure closes the receiver. Interrupted reads are retried.
    pub fn read_exact(&mut self, n: usize) -> Result<Option<BytesMut>> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut buf = BytesMut::with_capacity(n.min(RECV_CHUNK_SIZE));
        let mut filled = 0usize;

        while filled < n {
            let want = (n - filled).min(RECV_CHUNK_SIZE);
            buf.resize(filled + want, 0);

            match self.reader.read(&mut buf[filled..filled + want]) {
                Ok(0) => {
                    self.bytes_consumed += filled as u64;
                    self.state = ConnectionState::Closed;
                    debug!(received = filled, expected = n, "Connection closed during read");
                    return Ok(None);
                }
                Ok(read) => {
                    filled += read;
                    buf.truncate(filled);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    buf.truncate(filled);
                }
                Err(e) => {
                    self.bytes_consumed += filled as u64;
                    self.state = ConnectionState::Closed;
                    warn!(received = filled, expected = n, "Read failed: {}", e);
                    return Err(CamwireError::Transport(e));
                }
            }
        }

        self.bytes_consumed += n as u64;
        Ok(Some(buf))
    }

    /// Receive one frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` with `frame.payload.len() == frame.header.data_size`
    /// - `Ok(None)` at end of stream, including a truncated final frame
    /// - `Err(..)` on a transport fault, bad magic, or oversized payload
    pub fn receive_frame(&mut self) -> Result<Option<Frame>> {
        let header_bytes = match self.read_exact(HEADER_SIZE)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&header_bytes);
        let header = FrameHeader::from_bytes(&raw);

        if let Err(e) = header.validate(self.max_payload_size) {
            self.state = ConnectionState::Closed;
            warn!("Dropping connection: {}", e);
            return Err(e);
        }

        trace!(
            width = header.width,
            height = header.height,
            data_size = header.data_size,
            timestamp_ms = header.timestamp_ms,
            "Header received"
        );

        let payload = match self.read_exact(header.data_size as usize)? {
            Some(payload) => payload,
            None => {
                debug!(
                    data_size = header.data_size,
                    "Stream ended inside payload; discarding partial frame"
                );
                return Ok(None);
            }
        };

        self.frames_received += 1;
        Ok(Some(Frame::new(header, payload.freeze())))
    }
}

impl<R: Read> Iterator for FrameReceiver<R> {
    type Item = Result<Frame>;

    /// Yields frames until end of stream. An error is yielded once; the
    /// receiver is closed afterwards so iteration then ends.
    fn next(&mut self) -> Option<Self::Item> {
        self.receive_frame().transpose()
    }
}
