//! Live terminal rendering.
//!
//! Frames are drawn with 24-bit ANSI colour using the upper half block, so
//! each character cell carries two grayscale pixel rows.

use std::io::{self, Stdout, Write};

use image::GrayImage;
use tracing::debug;

use super::{FrameSink, SinkFlow};
use crate::error::{CamwireError, Result};
use crate::protocol::Frame;

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";
const RESET: &str = "\x1b[0m";
const UPPER_HALF: char = '\u{2580}';

/// Largest image [`magnify`] will allocate (256 Mi pixels).
pub const MAX_MAGNIFIED_PIXELS: usize = 1 << 28;

/// Nearest-neighbour magnification by an integer factor. 0 and 1 return a copy.
///
/// Fails with [`CamwireError::Scale`] if the magnified size overflows `u32`
/// or exceeds [`MAX_MAGNIFIED_PIXELS`].
pub fn magnify(image: &GrayImage, factor: u32) -> Result<GrayImage> {
    if factor <= 1 {
        return Ok(image.clone());
    }
    let (width, height) = image.dimensions();
    let overflow = || CamwireError::Scale {
        width,
        height,
        factor,
    };
    let scaled_width = width.checked_mul(factor).ok_or_else(overflow)?;
    let scaled_height = height.checked_mul(factor).ok_or_else(overflow)?;
    (scaled_width as usize)
        .checked_mul(scaled_height as usize)
        .filter(|&pixels| pixels <= MAX_MAGNIFIED_PIXELS)
        .ok_or_else(overflow)?;

    Ok(GrayImage::from_fn(scaled_width, scaled_height, |x, y| {
        *image.get_pixel(x / factor, y / factor)
    }))
}

/// Renders every frame to a terminal-like writer.
pub struct TerminalDisplay<W: Write> {
    out: W,
    scale: u32,
    line: String,
}

impl TerminalDisplay<Stdout> {
    pub fn stdout(scale: u32) -> Self {
        Self::new(io::stdout(), scale)
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, scale: u32) -> Self {
        Self {
            out,
            scale: scale.max(1),
            line: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Draw one image at the cursor home position.
    pub fn render(&mut self, image: &GrayImage) -> Result<()> {
        let image = magnify(image, self.scale)?;
        let (width, height) = image.dimensions();

        self.out.write_all(CURSOR_HOME.as_bytes())?;
        for y in (0..height).step_by(2) {
            self.line.clear();
            for x in 0..width {
                let upper = image.get_pixel(x, y).0[0];
                // Odd heights leave the last lower half black.
                let lower = if y + 1 < height {
                    image.get_pixel(x, y + 1).0[0]
                } else {
                    0
                };
                self.line.push_str(&format!(
                    "\x1b[38;2;{u};{u};{u}m\x1b[48;2;{l};{l};{l}m",
                    u = upper,
                    l = lower
                ));
                self.line.push(UPPER_HALF);
            }
            self.line.push_str(RESET);
            self.line.push('\n');
            self.out.write_all(self.line.as_bytes())?;
        }
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> FrameSink for TerminalDisplay<W> {
    fn begin(&mut self) -> Result<()> {
        self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn handle(&mut self, frame: &Frame, index: u64) -> Result<SinkFlow> {
        let image = frame.to_gray_image()?;
        self.render(&image)?;
        debug!(index, width = frame.width(), height = frame.height(), "Frame rendered");
        Ok(SinkFlow::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.write_all(RESET.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
