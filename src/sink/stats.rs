//! Frame-rate accounting.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use super::{FrameSink, SinkFlow};
use crate::error::Result;
use crate::protocol::Frame;

/// Log the running rate every this many frames.
pub const DEFAULT_REPORT_EVERY: u64 = 30;

/// Totals for one receive session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSummary {
    pub frames: u64,
    /// Payload bytes only; headers are not counted.
    pub bytes: u64,
    pub elapsed_secs: f64,
    pub average_fps: f64,
}

/// Counts frames and bytes and periodically logs the frame rate.
#[derive(Debug)]
pub struct RateTracker {
    report_every: u64,
    started: Option<Instant>,
    window_start: Option<Instant>,
    window_frames: u64,
    frames: u64,
    bytes: u64,
    last_fps: Option<f64>,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_EVERY)
    }
}

impl RateTracker {
    /// `report_every` of 0 disables the periodic log.
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every,
            started: None,
            window_start: None,
            window_frames: 0,
            frames: 0,
            bytes: 0,
            last_fps: None,
        }
    }

    /// Start the clock. Called by [`FrameSink::begin`]; recording without it
    /// starts the clock at the first frame.
    pub fn start_at(&mut self, now: Instant) {
        self.started = Some(now);
        self.window_start = Some(now);
        self.window_frames = 0;
    }

    pub fn record(&mut self, payload_len: usize) {
        self.record_at(payload_len, Instant::now());
    }

    pub fn record_at(&mut self, payload_len: usize, now: Instant) {
        if self.started.is_none() {
            self.start_at(now);
        }
        self.frames += 1;
        self.bytes += payload_len as u64;
        self.window_frames += 1;

        if self.report_every == 0 || self.window_frames < self.report_every {
            return;
        }

        let window_start = self.window_start.unwrap_or(now);
        let fps = rate(self.window_frames, now.saturating_duration_since(window_start));
        if let Some(fps) = fps {
            info!(frames = self.frames, fps = %format!("{:.1}", fps), "Frame rate");
            self.last_fps = Some(fps);
        }
        self.window_start = Some(now);
        self.window_frames = 0;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Rate measured over the most recent complete reporting window.
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }

    pub fn summary(&self) -> StatsSummary {
        self.summary_at(Instant::now())
    }

    pub fn summary_at(&self, now: Instant) -> StatsSummary {
        let elapsed = self
            .started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        StatsSummary {
            frames: self.frames,
            bytes: self.bytes,
            elapsed_secs: elapsed.as_secs_f64(),
            average_fps: rate(self.frames, elapsed).unwrap_or(0.0),
        }
    }
}

fn rate(frames: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| frames as f64 / secs)
}

impl FrameSink for RateTracker {
    fn begin(&mut self) -> Result<()> {
        self.start_at(Instant::now());
        Ok(())
    }

    fn handle(&mut self, frame: &Frame, _index: u64) -> Result<SinkFlow> {
        self.record(frame.payload_len());
        Ok(SinkFlow::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        let summary = self.summary();
        info!(
            frames = summary.frames,
            bytes = summary.bytes,
            elapsed_secs = %format!("{:.2}", summary.elapsed_secs),
            average_fps = %format!("{:.1}", summary.average_fps),
            "Receive statistics"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rate() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(30);
        tracker.start_at(t0);

        for i in 1..=30u64 {
            tracker.record_at(100, t0 + Duration::from_millis(i * 100 / 3));
        }

        let fps = tracker.last_fps().unwrap();
        assert!((fps - 30.0).abs() < 0.01, "fps was {}", fps);
        assert_eq!(tracker.frames(), 30);
        assert_eq!(tracker.bytes(), 3000);
    }

    #[test]
    fn test_no_rate_before_window_fills() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(30);
        tracker.start_at(t0);
        for i in 1..30u64 {
            tracker.record_at(1, t0 + Duration::from_millis(i));
        }
        assert_eq!(tracker.last_fps(), None);
    }

    #[test]
    fn test_summary() {
        let t0 = Instant::now();
        let mut tracker = RateTracker::new(0);
        tracker.start_at(t0);
        for _ in 0..50 {
            tracker.record_at(4, t0 + Duration::from_millis(500));
        }

        let summary = tracker.summary_at(t0 + Duration::from_secs(2));
        assert_eq!(summary.frames, 50);
        assert_eq!(summary.bytes, 200);
        assert!((summary.elapsed_secs - 2.0).abs() < 1e-9);
        assert!((summary.average_fps - 25.0).abs() < 1e-9);
        assert_eq!(tracker.last_fps(), None);
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let tracker = RateTracker::default();
        let summary = tracker.summary();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.average_fps, 0.0);
        assert_eq!(summary.elapsed_secs, 0.0);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = StatsSummary {
            frames: 3,
            bytes: 12,
            elapsed_secs: 1.5,
            average_fps: 2.0,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["frames"], 3);
        assert_eq!(json["average_fps"], 2.0);
    }
}
