//! Error types for camwire-client.

use thiserror::Error;

/// Main error type for all camwire operations.
///
/// End of stream is deliberately not an error: the receiver reports it as
/// `Ok(None)` so that an ordinary disconnect never looks like a fault.
#[derive(Debug, Error)]
pub enum CamwireError {
    /// Could not establish the TCP connection (refused, timed out, or the
    /// host did not resolve).
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket-level fault while reading (reset, read timeout, OS error).
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// Header magic did not match the sentinel. Stream alignment is unknown
    /// after this, so the connection is closed.
    #[error("bad magic 0x{observed:08X}, expected 0x{expected:08X}")]
    BadMagic { observed: u32, expected: u32 },

    /// Declared payload exceeds the configured receive limit.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: u32, max: u32 },

    /// Outgoing payload is longer than the 32-bit `data_size` field can carry.
    #[error("payload of {len} bytes does not fit a 32-bit data_size")]
    PayloadLength { len: usize },

    /// Magnified image dimensions do not fit in `u32`.
    #[error("cannot magnify {width}x{height} by {factor}")]
    Scale { width: u32, height: u32, factor: u32 },

    /// Payload length cannot be viewed as a `width`×`height` grayscale image.
    #[error("frame payload of {len} bytes does not match {width}x{height}")]
    FrameGeometry { width: u32, height: u32, len: usize },

    /// Local I/O error (sink directories, terminal output, listener setup).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error from the save sink.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization error (statistics report).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CamwireError {
    /// Whether this error means the stream position is no longer trustworthy.
    ///
    /// Callers logging protocol desync separately from ordinary transport
    /// faults can branch on this.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            CamwireError::BadMagic { .. } | CamwireError::PayloadTooLarge { .. }
        )
    }

    /// Whether this error came from the socket during a read.
    pub fn is_transport(&self) -> bool {
        matches!(self, CamwireError::Transport(_))
    }
}

/// Result type alias using CamwireError.
pub type Result<T> = std::result::Result<T, CamwireError>;
