//! Frame sinks - what happens to a frame after it is received.
//!
//! Every consumer (terminal display, PNG persistence, verbose logging,
//! frame-rate accounting) implements the single [`FrameSink`] capability. A
//! session drives exactly one sink; [`FanOut`] combines several.
//!
//! # Example
//!
//! ```
//! use camwire_client::sink::{from_fn, FanOut, SinkFlow};
//!
//! let mut seen = 0u64;
//! let mut sink = FanOut::new()
//!     .with(from_fn(move |_frame, index| {
//!         seen = index;
//!         Ok(SinkFlow::Continue)
//!     }));
//! assert_eq!(sink.len(), 1);
//! ```

mod debug;
mod display;
mod save;
mod stats;

pub use debug::DebugSink;
pub use display::{magnify, TerminalDisplay, MAX_MAGNIFIED_PIXELS};
pub use save::{SavePolicy, SaveSink, DEFAULT_SAVE_DIR, DEFAULT_SAVE_EVERY};
pub use stats::{RateTracker, StatsSummary, DEFAULT_REPORT_EVERY};

use crate::error::Result;
use crate::protocol::Frame;

/// Whether the receive loop should keep going after a sink has seen a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFlow {
    Continue,
    Stop,
}

/// A consumer of decoded frames.
pub trait FrameSink {
    /// Called once after the connection is established.
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle one frame. `index` is the 1-based count of frames received on
    /// this connection.
    fn handle(&mut self, frame: &Frame, index: u64) -> Result<SinkFlow>;

    /// Called once when the receive loop ends, whatever the reason.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn handle(&mut self, frame: &Frame, index: u64) -> Result<SinkFlow> {
        (**self).handle(frame, index)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Sink backed by a closure. Created with [`from_fn`].
pub struct FnSink<F> {
    f: F,
}

/// Wrap a closure as a sink.
pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(&Frame, u64) -> Result<SinkFlow>,
{
    FnSink { f }
}

impl<F> FrameSink for FnSink<F>
where
    F: FnMut(&Frame, u64) -> Result<SinkFlow>,
{
    fn handle(&mut self, frame: &Frame, index: u64) -> Result<SinkFlow> {
        (self.f)(frame, index)
    }
}

/// Drives several sinks in registration order.
///
/// Every sink sees every frame. The loop stops after a frame if any sink
/// asked to stop. The first error aborts the frame.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn FrameSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink (builder style).
    pub fn with<S: FrameSink + 'static>(mut self, sink: S) -> Self {
        self.push(sink);
        self
    }

    pub fn push<S: FrameSink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl FrameSink for FanOut {
    fn begin(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.begin()?;
        }
        Ok(())
    }

    fn handle(&mut self, frame: &Frame, index: u64) -> Result<SinkFlow> {
        let mut flow = SinkFlow::Continue;
        for sink in &mut self.sinks {
            if sink.handle(frame, index)? == SinkFlow::Stop {
                flow = SinkFlow::Stop;
            }
        }
        Ok(flow)
    }

    /// Finishes every sink even if one fails; reports the first failure.
    fn finish(&mut self) -> Result<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.finish() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
