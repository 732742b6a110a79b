//! Verbose per-frame diagnostics.

use tracing::{debug, info, warn};

use super::{FrameSink, SinkFlow};
use crate::error::Result;
use crate::protocol::Frame;

/// Frames at the start of a stream logged at `info`.
pub const INFO_LEADING_FRAMES: u64 = 3;

/// After the leading frames, every Nth frame is logged at `info`; the rest
/// go to `debug`.
pub const INFO_EVERY: u64 = 30;

/// Whether frame `index` (1-based) is logged at `info` rather than `debug`.
pub fn is_highlighted(index: u64) -> bool {
    index <= INFO_LEADING_FRAMES || index % INFO_EVERY == 0
}

/// Logs every header field, the gap between producer timestamps and
/// geometry mismatches.
#[derive(Debug, Default)]
pub struct DebugSink {
    last_timestamp: Option<u32>,
    last_gap_ms: Option<u32>,
    inconsistent: u64,
}

impl DebugSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames whose `data_size` differed from `width * height`.
    pub fn inconsistent_frames(&self) -> u64 {
        self.inconsistent
    }

    /// Producer timestamp delta between the last two frames.
    ///
    /// Timestamps are 32-bit and wrap; the delta is computed modulo 2^32.
    pub fn last_gap_ms(&self) -> Option<u32> {
        self.last_gap_ms
    }
}

impl FrameSink for DebugSink {
    fn handle(&mut self, frame: &Frame, index: u64) -> Result<SinkFlow> {
        let header = &frame.header;
        let gap = self
            .last_timestamp
            .map(|previous| header.timestamp_ms.wrapping_sub(previous));

        let magic = format!("0x{:08X}", header.magic);
        if is_highlighted(index) {
            info!(
                index,
                magic = %magic,
                width = header.width,
                height = header.height,
                data_size = header.data_size,
                timestamp_ms = header.timestamp_ms,
                gap_ms = ?gap,
                "Frame received"
            );
        } else {
            debug!(
                index,
                magic = %magic,
                width = header.width,
                height = header.height,
                data_size = header.data_size,
                timestamp_ms = header.timestamp_ms,
                gap_ms = ?gap,
                "Frame received"
            );
        }

        if !header.has_consistent_size() {
            self.inconsistent += 1;
            warn!(
                index,
                width = header.width,
                height = header.height,
                data_size = header.data_size,
                "Payload size does not match geometry"
            );
        }

        self.last_timestamp = Some(header.timestamp_ms);
        self.last_gap_ms = gap;
        Ok(SinkFlow::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        if self.inconsistent > 0 {
            warn!(count = self.inconsistent, "Inconsistent frames seen");
        }
        Ok(())
    }
}
