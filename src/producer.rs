//! Sending side of the frame protocol.
//!
//! [`FrameWriter`] encodes header + payload onto any `Write`. The
//! `camwire-testcam` binary and the integration tests use it together with
//! [`TestPattern`] to stand in for the camera board.

use std::io::{self, ErrorKind, Write};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, trace, warn};

use crate::error::{CamwireError, Result};
use crate::protocol::{FrameHeader, HEADER_SIZE};

/// Writes frames back-to-back with no delimiter.
#[derive(Debug)]
pub struct FrameWriter<W> {
    out: W,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frames_written: 0,
            bytes_written: 0,
        }
    }

    /// Write one frame. `data_size` is taken from `pixels.len()`.
    pub fn write_frame(
        &mut self,
        width: u32,
        height: u32,
        timestamp_ms: u32,
        pixels: &[u8],
    ) -> Result<()> {
        let data_size = data_size_for(pixels.len())?;
        let header = FrameHeader::with_data_size(width, height, data_size, timestamp_ms);
        self.write_raw(&header, pixels)
    }

    /// Write a header and payload exactly as given, even if they disagree.
    pub fn write_raw(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<()> {
        self.out.write_all(&header.encode())?;
        self.out.write_all(payload)?;
        self.out.flush()?;

        self.frames_written += 1;
        self.bytes_written += (HEADER_SIZE + payload.len()) as u64;
        trace!(
            width = header.width,
            height = header.height,
            data_size = header.data_size,
            "Frame written"
        );
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `data_size` field for a payload of `len` bytes.
fn data_size_for(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| CamwireError::PayloadLength { len })
}

/// Milliseconds since the Unix epoch, truncated to 32 bits.
///
/// The camera board stamps frames the same way, so the value wraps roughly
/// every 49.7 days and is only meaningful as a difference.
pub fn timestamp_ms() -> u32 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    millis as u32
}

/// Synthetic grayscale source: a diagonal gradient that shifts one step per
/// frame.
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: u32,
    height: u32,
    tick: u32,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Render the next frame's pixels, row-major.
    pub fn next_frame(&mut self) -> Vec<u8> {
        let tick = self.tick;
        self.tick = self.tick.wrapping_add(1);

        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                pixels.push((x.wrapping_add(y).wrapping_add(tick) & 0xFF) as u8);
            }
        }
        pixels
    }
}

/// Pacing for [`stream_test_pattern`].
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Delay between frames. Zero sends as fast as the socket allows.
    pub interval: Duration,
    /// Stop after this many frames. `None` streams until the client leaves.
    pub limit: Option<u64>,
}

impl StreamConfig {
    /// Pace at `fps` frames per second. 0 means unpaced.
    pub fn from_fps(fps: u32, limit: Option<u64>) -> Self {
        let interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / fps
        };
        Self { interval, limit }
    }
}

/// Stream a test pattern until the limit or until the client goes away.
///
/// A write failure means the client disconnected; it ends the stream
/// normally and is not reported as an error. Returns the number of frames
/// sent.
pub fn stream_test_pattern<W: Write>(
    writer: &mut FrameWriter<W>,
    pattern: &mut TestPattern,
    config: StreamConfig,
) -> Result<u64> {
    let mut sent = 0u64;
    let mut next_due = Instant::now();

    while config.limit.map_or(true, |limit| sent < limit) {
        let pixels = pattern.next_frame();
        match writer.write_frame(pattern.width(), pattern.height(), timestamp_ms(), &pixels) {
            Ok(()) => sent += 1,
            Err(CamwireError::Io(e)) if is_disconnect(e.kind()) => {
                info!(sent, "Client disconnected: {}", e);
                return Ok(sent);
            }
            Err(e) => return Err(e),
        }

        if !config.interval.is_zero() {
            next_due += config.interval;
            let now = Instant::now();
            if next_due > now {
                thread::sleep(next_due - now);
            } else {
                next_due = now;
            }
        }
    }

    debug!(sent, "Frame limit reached");
    Ok(sent)
}

/// Pause after this many consecutive accept failures before giving up.
pub const DEFAULT_MAX_ACCEPT_FAILURES: u32 = 10;

/// Delay between failed accepts.
pub const DEFAULT_ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Keeps a failing `accept` loop (out of descriptors, for example) from
/// spinning: sleeps after each failure and gives up after too many in a row.
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    delay: Duration,
    max_failures: u32,
    failures: u32,
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPT_BACKOFF, DEFAULT_MAX_ACCEPT_FAILURES)
    }
}

impl AcceptBackoff {
    pub fn new(delay: Duration, max_failures: u32) -> Self {
        Self {
            delay,
            max_failures: max_failures.max(1),
            failures: 0,
        }
    }

    /// Record a failed accept. Sleeps and returns `Ok` while retries remain;
    /// returns the error once `max_failures` consecutive failures are reached.
    pub fn failed(&mut self, error: io::Error) -> Result<()> {
        self.failures += 1;
        if self.failures >= self.max_failures {
            return Err(error.into());
        }
        warn!(failures = self.failures, "accept failed: {}", error);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(())
    }

    /// Record a successful accept.
    pub fn succeeded(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
            | ErrorKind::WriteZero
    )
}
