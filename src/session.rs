//! Receive loop wiring a connection to a sink.
//!
//! A [`Session`] connects, pulls frames with a [`FrameReceiver`] and hands
//! each one to a [`FrameSink`]:
//! 1. Connect (Disconnected → Connected)
//! 2. `sink.begin()`
//! 3. Receive and dispatch until end of stream, a sink stop, the frame limit,
//!    or an error
//! 4. Mark Closed and call `sink.finish()`
//!
//! A [`StopHandle`] ends the loop from another thread (a Ctrl+C handler, for
//! example) by shutting the socket down. The blocked read wakes up and the
//! session ends with [`StopReason::Interrupted`] and its statistics intact.
//!
//! # Example
//!
//! ```ignore
//! use camwire_client::session::{Session, SessionConfig};
//! use camwire_client::sink::DebugSink;
//!
//! let mut session = Session::new(SessionConfig::new("192.168.110.250"));
//! let summary = session.run(&mut DebugSink::new())?;
//! println!("{:?} after {} frames", summary.reason, summary.stats.frames);
//! ```

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::receiver::{ConnectionState, FrameReceiver};
use crate::sink::{FrameSink, RateTracker, SinkFlow, StatsSummary, DEFAULT_REPORT_EVERY};
use crate::transport::{ConnectOptions, Connection, ShutdownHandle, DEFAULT_PORT};

/// Everything needed to run one receive session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub connect: ConnectOptions,
    /// Stop after this many frames. `None` runs until the stream ends.
    pub max_frames: Option<u64>,
    pub max_payload_size: u32,
    /// Frame-rate log interval. 0 disables it.
    pub report_every: u64,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            connect: ConnectOptions::default(),
            max_frames: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            report_every: DEFAULT_REPORT_EVERY,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn max_frames(mut self, limit: u64) -> Self {
        self.max_frames = Some(limit);
        self
    }
}

/// Why the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The peer closed the stream, possibly mid-frame.
    EndOfStream,
    /// A sink returned [`SinkFlow::Stop`].
    SinkStopped,
    /// The configured frame limit was reached.
    FrameLimit,
    /// A [`StopHandle`] was used.
    Interrupted,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub stats: StatsSummary,
}

/// Ends a running session from another thread.
///
/// Cheap to clone; every clone stops the same session.
#[derive(Debug, Clone)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    socket: Arc<ShutdownHandle>,
}

impl StopHandle {
    /// Mark the stop as requested, then shut the socket down so a pending
    /// read returns. Safe to call more than once.
    pub fn stop(&self) -> Result<()> {
        self.requested.store(true, Ordering::SeqCst);
        self.socket.shutdown()
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// One connection's worth of receiving.
pub struct Session {
    config: SessionConfig,
    state: ConnectionState,
    stop_requested: Arc<AtomicBool>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Open the configured connection.
    pub fn connect(&mut self) -> Result<FrameReceiver<Connection>> {
        let connection = crate::transport::connect(
            &self.config.host,
            self.config.port,
            &self.config.connect,
        )?;
        self.state = ConnectionState::Connected;
        Ok(FrameReceiver::with_max_payload(
            connection,
            self.config.max_payload_size,
        ))
    }

    /// Handle that interrupts [`Session::drive`] on `receiver`.
    pub fn stop_handle(&self, receiver: &FrameReceiver<Connection>) -> Result<StopHandle> {
        Ok(StopHandle {
            requested: Arc::clone(&self.stop_requested),
            socket: Arc::new(receiver.get_ref().shutdown_handle()?),
        })
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Connect and drive `sink` until the stream ends.
    pub fn run<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<RunSummary> {
        let mut receiver = self.connect()?;
        let result = self.drive(&mut receiver, sink);
        if let Err(e) = receiver.shutdown() {
            debug!("Socket shutdown failed: {}", e);
        }
        result
    }

    /// Drive `sink` from an already-open receiver.
    ///
    /// `sink.finish()` is called exactly once whatever the outcome. A loop
    /// error takes precedence over a finish error.
    pub fn drive<R: Read, S: FrameSink + ?Sized>(
        &mut self,
        receiver: &mut FrameReceiver<R>,
        sink: &mut S,
    ) -> Result<RunSummary> {
        self.state = ConnectionState::Connected;

        let mut tracker = RateTracker::new(self.config.report_every);
        let outcome = match sink.begin().and_then(|()| tracker.begin()) {
            Ok(()) => self.receive_loop(receiver, sink, &mut tracker),
            Err(e) => Err(e),
        };

        self.state = ConnectionState::Closed;
        receiver.close();

        let finished = sink.finish().and_then(|()| tracker.finish());
        let reason = outcome?;
        finished?;

        let stats = tracker.summary();
        info!(?reason, frames = stats.frames, "Session ended");
        Ok(RunSummary { reason, stats })
    }

    fn receive_loop<R: Read, S: FrameSink + ?Sized>(
        &mut self,
        receiver: &mut FrameReceiver<R>,
        sink: &mut S,
        tracker: &mut RateTracker,
    ) -> Result<StopReason> {
        let mut index = 0u64;
        loop {
            if self.stop_requested() {
                info!(frames = index, "Stop requested");
                return Ok(StopReason::Interrupted);
            }
            if let Some(limit) = self.config.max_frames {
                if index >= limit {
                    return Ok(StopReason::FrameLimit);
                }
            }

            let frame = match receiver.receive_frame() {
                Ok(Some(frame)) => frame,
                // A shutdown from a stop handle shows up as EOF or a read fault.
                Ok(None) | Err(_) if self.stop_requested() => {
                    info!(frames = index, "Stop requested");
                    return Ok(StopReason::Interrupted);
                }
                Ok(None) => {
                    info!(frames = index, "Stream ended");
                    return Ok(StopReason::EndOfStream);
                }
                Err(e) => {
                    warn!(frames = index, "Receive failed: {}", e);
                    return Err(e);
                }
            };

            index += 1;
            tracker.handle(&frame, index)?;
            if sink.handle(&frame, index)? == SinkFlow::Stop {
                debug!(index, "Sink requested stop");
                return Ok(StopReason::SinkStopped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CamwireError;
    use crate::protocol::{build_frame, Frame, FrameHeader};
    use crate::sink::from_fn;
    use std::io::Cursor;

    fn stream(count: u32) -> Vec<u8> {
        (0..count)
            .flat_map(|i| build_frame(&FrameHeader::new(2, 2, i), &[i as u8; 4]))
            .collect()
    }

    struct Recording {
        began: u32,
        indices: Vec<u64>,
        finished: u32,
        stop_at: Option<u64>,
    }

    impl Recording {
        fn new() -> Self {
            Self {
                began: 0,
                indices: Vec::new(),
                finished: 0,
                stop_at: None,
            }
        }
    }

    impl FrameSink for Recording {
        fn begin(&mut self) -> Result<()> {
            self.began += 1;
            Ok(())
        }

        fn handle(&mut self, _frame: &Frame, index: u64) -> Result<SinkFlow> {
            self.indices.push(index);
            if self.stop_at == Some(index) {
                return Ok(SinkFlow::Stop);
            }
            Ok(SinkFlow::Continue)
        }

        fn finish(&mut self) -> Result<()> {
            self.finished += 1;
            Ok(())
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::new("camera");
        assert_eq!(config.host, "camera");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_frames, None);
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(config.report_every, DEFAULT_REPORT_EVERY);
    }

    #[test]
    fn test_drive_until_end_of_stream() {
        let mut session = Session::new(SessionConfig::new("unused"));
        assert_eq!(session.state(), ConnectionState::Disconnected);

        let mut receiver = FrameReceiver::new(Cursor::new(stream(5)));
        let mut sink = Recording::new();
        let summary = session.drive(&mut receiver, &mut sink).unwrap();

        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(summary.stats.frames, 5);
        assert_eq!(summary.stats.bytes, 20);
        assert_eq!(sink.indices, vec![1, 2, 3, 4, 5]);
        assert_eq!((sink.began, sink.finished), (1, 1));
        assert_eq!(session.state(), ConnectionState::Closed);
        assert!(receiver.is_closed());
    }

    #[test]
    fn test_frame_limit() {
        let mut session = Session::new(SessionConfig::new("unused").max_frames(3));
        let mut receiver = FrameReceiver::new(Cursor::new(stream(10)));
        let mut sink = Recording::new();

        let summary = session.drive(&mut receiver, &mut sink).unwrap();
        assert_eq!(summary.reason, StopReason::FrameLimit);
        assert_eq!(sink.indices, vec![1, 2, 3]);
        // Nothing past the third frame was read.
        assert_eq!(receiver.bytes_consumed(), 3 * 24);
    }

    #[test]
    fn test_zero_frame_limit_reads_nothing() {
        let mut session = Session::new(SessionConfig::new("unused").max_frames(0));
        let mut receiver = FrameReceiver::new(Cursor::new(stream(2)));
        let mut sink = Recording::new();

        let summary = session.drive(&mut receiver, &mut sink).unwrap();
        assert_eq!(summary.reason, StopReason::FrameLimit);
        assert!(sink.indices.is_empty());
        assert_eq!(sink.finished, 1);
    }

    #[test]
    fn test_sink_stop() {
        let mut session = Session::new(SessionConfig::new("unused"));
        let mut receiver = FrameReceiver::new(Cursor::new(stream(10)));
        let mut sink = Recording::new();
        sink.stop_at = Some(2);

        let summary = session.drive(&mut receiver, &mut sink).unwrap();
        assert_eq!(summary.reason, StopReason::SinkStopped);
        assert_eq!(summary.stats.frames, 2);
    }

    #[test]
    fn test_bad_magic_propagates_and_finishes() {
        let mut bytes = stream(2);
        bytes[24] = 0x00;

        let mut session = Session::new(SessionConfig::new("unused"));
        let mut receiver = FrameReceiver::new(Cursor::new(bytes));
        let mut sink = Recording::new();

        let err = session.drive(&mut receiver, &mut sink).unwrap_err();
        assert!(matches!(err, CamwireError::BadMagic { .. }));
        assert_eq!(sink.indices, vec![1]);
        assert_eq!(sink.finished, 1);
        assert_eq!(session.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_sink_error_propagates() {
        let mut session = Session::new(SessionConfig::new("unused"));
        let mut receiver = FrameReceiver::new(Cursor::new(stream(3)));
        let mut sink = from_fn(|_: &Frame, _| {
            Err(CamwireError::FrameGeometry {
                width: 0,
                height: 0,
                len: 0,
            })
        });

        let err = session.drive(&mut receiver, &mut sink).unwrap_err();
        assert!(matches!(err, CamwireError::FrameGeometry { width: 0, .. }));
    }

    #[test]
    fn test_summary_serializes_reason_snake_case() {
        let mut session = Session::new(SessionConfig::new("unused"));
        let mut receiver = FrameReceiver::new(Cursor::new(Vec::new()));
        let summary = session.drive(&mut receiver, &mut Recording::new()).unwrap();

        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["reason"], "end_of_stream");
        assert_eq!(json["stats"]["frames"], 0);
    }

    #[test]
    fn test_stop_handle_interrupts_blocked_read() {
        use std::io::Write;
        use std::net::TcpListener;
        use std::thread;
        use std::time::Duration;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&stream(3)).unwrap();
            // Stay silent until the client hangs up.
            let mut buf = [0u8; 1];
            let _ = socket.read(&mut buf);
        });

        let mut session = Session::new(SessionConfig::new("127.0.0.1").port(port));
        let mut receiver = session.connect().unwrap();
        let stop = session.stop_handle(&receiver).unwrap();
        assert!(!stop.is_requested());

        let stopper = {
            let stop = stop.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                stop.stop().unwrap();
            })
        };

        let mut sink = Recording::new();
        let summary = session.drive(&mut receiver, &mut sink).unwrap();

        assert_eq!(summary.reason, StopReason::Interrupted);
        assert_eq!(summary.stats.frames, 3);
        assert_eq!(sink.indices, vec![1, 2, 3]);
        assert_eq!(sink.finished, 1);
        assert!(stop.is_requested());
        // A second stop is harmless.
        stop.stop().unwrap();

        stopper.join().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_run_connect_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut session = Session::new(SessionConfig::new("127.0.0.1").port(port));
        let err = session.run(&mut Recording::new()).unwrap_err();
        assert!(matches!(err, CamwireError::Connect { .. }));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
