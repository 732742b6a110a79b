//! Periodic PNG persistence.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::display::magnify;
use super::{FrameSink, SinkFlow};
use crate::error::Result;
use crate::protocol::Frame;

/// Directory frames are written to unless configured otherwise.
pub const DEFAULT_SAVE_DIR: &str = "captured_frames";

/// Save every Nth frame by default.
pub const DEFAULT_SAVE_EVERY: u64 = 10;

/// Where and how often to save.
#[derive(Debug, Clone)]
pub struct SavePolicy {
    /// Output directory, created if missing.
    pub dir: PathBuf,
    /// Save frames whose 1-based index is a multiple of this. 0 is treated as 1.
    pub every: u64,
    /// Integer magnification applied before encoding. 0 and 1 mean none.
    pub scale: u32,
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_SAVE_DIR),
            every: DEFAULT_SAVE_EVERY,
            scale: 1,
        }
    }
}

/// Writes sampled frames as `frame_NNNN.png`.
pub struct SaveSink {
    policy: SavePolicy,
    saved: u64,
    last_path: Option<PathBuf>,
}

impl SaveSink {
    /// Create the sink, creating the output directory if needed.
    pub fn new(mut policy: SavePolicy) -> Result<Self> {
        policy.every = policy.every.max(1);
        if !policy.dir.exists() {
            std::fs::create_dir_all(&policy.dir)?;
            info!(dir = %policy.dir.display(), "Created save directory");
        }
        Ok(Self {
            policy,
            saved: 0,
            last_path: None,
        })
    }

    /// Whether the frame with this index is sampled.
    pub fn should_save(&self, index: u64) -> bool {
        index % self.policy.every == 0
    }

    /// File path a frame with this index is written to.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.policy.dir.join(format!("frame_{:04}.png", index))
    }

    /// Number of files written so far.
    pub fn saved(&self) -> u64 {
        self.saved
    }

    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    pub fn dir(&self) -> &Path {
        &self.policy.dir
    }
}

impl FrameSink for SaveSink {
    fn handle(&mut self, frame: &Frame, index: u64) -> Result<SinkFlow> {
        if !self.should_save(index) {
            return Ok(SinkFlow::Continue);
        }

        let image = magnify(&frame.to_gray_image()?, self.policy.scale)?;
        let path = self.path_for(index);
        image.save(&path)?;

        debug!(index, width = image.width(), height = image.height(), "Frame encoded");
        info!(path = %path.display(), "Saved frame");

        self.saved += 1;
        self.last_path = Some(path);
        Ok(SinkFlow::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        info!(
            saved = self.saved,
            dir = %self.policy.dir.display(),
            "Save sink finished"
        );
        Ok(())
    }
}
