//! Wire format encoding and decoding.
//!
//! Implements the 20-byte frame header:
//! ```text
//! ┌──────────┬──────────┬──────────┬───────────┬──────────────┐
//! │ Magic    │ Width    │ Height   │ Data size │ Timestamp ms │
//! │ 4 bytes  │ 4 bytes  │ 4 bytes  │ 4 bytes   │ 4 bytes      │
//! │ uint32 LE│ uint32 LE│ uint32 LE│ uint32 LE │ uint32 LE    │
//! └──────────┴──────────┴──────────┴───────────┴──────────────┘
//! ```
//!
//! All multi-byte integers are Little Endian. The header is followed by
//! exactly `data_size` bytes of 8-bit grayscale pixels, row-major.

use crate::error::{CamwireError, Result};

/// Header size in bytes (fixed, exactly 20).
pub const HEADER_SIZE: usize = 20;

/// Sentinel that starts every valid header.
pub const MAGIC_NUMBER: u32 = 0x1234_5678;

/// Default maximum payload size: every declared size is accepted.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = u32::MAX;

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Must equal [`MAGIC_NUMBER`] for the header to be valid.
    pub magic: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Exact length of the payload that follows.
    pub data_size: u32,
    /// Producer-side capture time in milliseconds. Opaque to the receiver.
    pub timestamp_ms: u32,
}

impl FrameHeader {
    /// Create a header for a `width`×`height` grayscale frame.
    ///
    /// `data_size` is set to `width * height` (saturating).
    pub fn new(width: u32, height: u32, timestamp_ms: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            width,
            height,
            data_size: width.saturating_mul(height),
            timestamp_ms,
        }
    }

    /// Create a header with an explicit payload size.
    pub fn with_data_size(width: u32, height: u32, data_size: u32, timestamp_ms: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            width,
            height,
            data_size,
            timestamp_ms,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use camwire_client::protocol::FrameHeader;
    ///
    /// let header = FrameHeader::new(2, 2, 0);
    /// let bytes = header.encode();
    /// assert_eq!(&bytes[..4], &[0x78, 0x56, 0x34, 0x12]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (20 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.width.to_le_bytes());
        buf[8..12].copy_from_slice(&self.height.to_le_bytes());
        buf[12..16].copy_from_slice(&self.data_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.timestamp_ms.to_le_bytes());
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short. The magic number is not
    /// checked here; see [`FrameHeader::validate`].
    ///
    /// # Example
    ///
    /// ```
    /// use camwire_client::protocol::FrameHeader;
    ///
    /// let bytes = [
    ///     0x78, 0x56, 0x34, 0x12, 2, 0, 0, 0, 2, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0,
    /// ];
    /// let header = FrameHeader::decode(&bytes).unwrap();
    /// assert_eq!(header.width, 2);
    /// assert_eq!(header.data_size, 4);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let raw: &[u8; HEADER_SIZE] = buf.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self::from_bytes(raw))
    }

    /// Decode header from an exactly-sized array. Cannot fail.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let field = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        Self {
            magic: field(0),
            width: field(4),
            height: field(8),
            data_size: field(12),
            timestamp_ms: field(16),
        }
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Magic equals [`MAGIC_NUMBER`]
    /// - Payload length doesn't exceed max
    ///
    /// `data_size` is not compared against `width * height`.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if !self.has_valid_magic() {
            return Err(CamwireError::BadMagic {
                observed: self.magic,
                expected: MAGIC_NUMBER,
            });
        }

        if self.data_size > max_payload_size {
            return Err(CamwireError::PayloadTooLarge {
                size: self.data_size,
                max: max_payload_size,
            });
        }

        Ok(())
    }

    /// Check the magic number.
    #[inline]
    pub fn has_valid_magic(&self) -> bool {
        self.magic == MAGIC_NUMBER
    }

    /// Number of pixels a `width`×`height` single-channel frame needs.
    ///
    /// `None` if the product does not fit in `usize`.
    #[inline]
    pub fn pixel_count(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    /// Check whether `data_size` equals `width * height`.
    #[inline]
    pub fn has_consistent_size(&self) -> bool {
        self.pixel_count() == Some(self.data_size as usize)
    }

    /// Total bytes this frame occupies on the wire.
    #[inline]
    pub fn frame_len(&self) -> u64 {
        HEADER_SIZE as u64 + u64::from(self.data_size)
    }
}

/// Encode a header to bytes (standalone function).
#[inline]
pub fn encode_header(header: &FrameHeader) -> [u8; HEADER_SIZE] {
    header.encode()
}

/// Decode a header from bytes (standalone function).
#[inline]
pub fn decode_header(buf: &[u8]) -> Option<FrameHeader> {
    FrameHeader::decode(buf)
}

/// Validate a header for protocol compliance (standalone function).
#[inline]
pub fn validate_header(header: &FrameHeader, max_payload_size: u32) -> Result<()> {
    header.validate(max_payload_size)
}
