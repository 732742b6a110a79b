//! # camwire-client
//!
//! Blocking TCP client for a camera that streams 8-bit grayscale frames.
//!
//! Each frame on the wire is a 20-byte little-endian header (magic, width,
//! height, data size, timestamp) followed by exactly `data_size` bytes of
//! row-major pixels. Frames repeat back-to-back with no delimiter.
//!
//! ## Architecture
//!
//! - **Receiver**: [`FrameReceiver`] reads exact-length chunks from any
//!   `Read` and yields validated [`Frame`]s
//! - **Sinks**: display, PNG saving, debug logging and rate statistics all
//!   implement [`sink::FrameSink`]
//! - **Session**: [`Session`] connects and drives one sink until the stream
//!   ends
//!
//! ## Example
//!
//! ```no_run
//! use camwire_client::{ConnectOptions, FrameReceiver, DEFAULT_PORT};
//!
//! fn main() -> camwire_client::Result<()> {
//!     let mut receiver =
//!         FrameReceiver::connect("192.168.110.250", DEFAULT_PORT, &ConnectOptions::default())?;
//!
//!     while let Some(frame) = receiver.receive_frame()? {
//!         println!("{}x{} @ {}ms", frame.width(), frame.height(), frame.timestamp_ms());
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod producer;
pub mod protocol;
pub mod receiver;
pub mod report;
pub mod session;
pub mod sink;
pub mod transport;

pub use error::{CamwireError, Result};
pub use protocol::{Frame, FrameHeader, HEADER_SIZE, MAGIC_NUMBER};
pub use receiver::{ConnectionState, FrameReceiver};
pub use session::{RunSummary, Session, SessionConfig, StopHandle, StopReason};
pub use transport::{ConnectOptions, DEFAULT_PORT};
