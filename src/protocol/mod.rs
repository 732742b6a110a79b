//! Protocol module - wire format and frame types.
//!
//! This module implements the camera stream's binary protocol:
//! - 20-byte little-endian header encoding/decoding
//! - Frame struct with typed pixel accessors

mod frame;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use wire_format::{
    decode_header, encode_header, validate_header, FrameHeader, DEFAULT_MAX_PAYLOAD_SIZE,
    HEADER_SIZE, MAGIC_NUMBER,
};
