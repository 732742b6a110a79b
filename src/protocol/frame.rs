//! Frame struct with typed accessors.
//!
//! Represents one decoded image: header plus pixel payload.
//! Uses `bytes::Bytes` so the payload moves to the caller without copying.
//!
//! # Example
//!
//! ```
//! use camwire_client::protocol::{Frame, FrameHeader};
//! use bytes::Bytes;
//!
//! let header = FrameHeader::new(2, 2, 0);
//! let frame = Frame::new(header, Bytes::from_static(&[0xAA, 0xBB, 0xCC, 0xDD]));
//!
//! assert_eq!(frame.width(), 2);
//! assert_eq!(frame.pixel(1, 1), Some(0xDD));
//! ```

use bytes::Bytes;
use image::GrayImage;

use super::wire_format::{FrameHeader, HEADER_SIZE};
use crate::error::{CamwireError, Result};

/// A complete grayscale frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: FrameHeader,
    /// Pixel bytes, exactly `header.data_size` long when produced by the receiver.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: FrameHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a frame from header and raw bytes (copies data).
    pub fn from_parts(header: FrameHeader, payload: &[u8]) -> Self {
        Self {
            header,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.header.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.header.height
    }

    #[inline]
    pub fn timestamp_ms(&self) -> u32 {
        self.header.timestamp_ms
    }

    /// Get a reference to the pixel bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the pixel bytes.
    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload length equals `width * height`.
    pub fn has_consistent_size(&self) -> bool {
        self.header.pixel_count() == Some(self.payload.len())
    }

    /// Pixel at column `x`, row `y`.
    ///
    /// `None` when out of bounds or when the payload is shorter than the
    /// declared geometry.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.header.width || y >= self.header.height {
            return None;
        }
        let index = (y as usize)
            .checked_mul(self.header.width as usize)?
            .checked_add(x as usize)?;
        self.payload.get(index).copied()
    }

    /// One row of pixels.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.header.height {
            return None;
        }
        let width = self.header.width as usize;
        let start = (y as usize).checked_mul(width)?;
        self.payload.get(start..start.checked_add(width)?)
    }

    /// Copy the payload into an `image::GrayImage`.
    ///
    /// Fails with [`CamwireError::FrameGeometry`] if the payload length is not
    /// exactly `width * height`.
    pub fn to_gray_image(&self) -> Result<GrayImage> {
        if !self.has_consistent_size() {
            return Err(self.geometry_error());
        }
        GrayImage::from_raw(self.header.width, self.header.height, self.payload.to_vec())
            .ok_or_else(|| self.geometry_error())
    }

    fn geometry_error(&self) -> CamwireError {
        CamwireError::FrameGeometry {
            width: self.header.width,
            height: self.header.height,
            len: self.payload.len(),
        }
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes header and appends payload into a contiguous buffer. The header's
/// `data_size` is written as given; callers building malformed streams for
/// tests rely on that.
///
/// # Example
///
/// ```
/// use camwire_client::protocol::{build_frame, FrameHeader, HEADER_SIZE};
///
/// let header = FrameHeader::new(2, 2, 0);
/// let bytes = build_frame(&header, &[1, 2, 3, 4]);
/// assert_eq!(bytes.len(), HEADER_SIZE + 4);
/// ```
pub fn build_frame(header: &FrameHeader, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
