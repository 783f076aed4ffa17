//! Frame buffer.
//!
//! A [`Frame`] is one full image at display resolution: `width × height`
//! RGB triples stored row-major in a flat byte buffer. Frames are produced
//! by workers and handed to the orchestrator by value (copy-on-send), so
//! nothing here is shared or interior-mutable.
//!
//! ```text
//! (0,0) ─────────────► x (width)
//!   │  r g b r g b ...
//!   │  r g b r g b ...
//!   ▼
//!   y (height)
//! ```
//!
//! # Example
//!
//! ```
//! use mxos_types::{Dimensions, Frame, Rgb};
//!
//! let mut frame = Frame::blank(Dimensions::new(8, 4));
//! frame.set_pixel(2, 1, Rgb::WHITE);
//! assert_eq!(frame.pixel(2, 1), Some(Rgb::WHITE));
//! assert_eq!(frame.pixel(8, 0), None);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One pixel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scales every channel by `percent` (clamped to 0..=100).
    #[must_use]
    pub fn scaled(self, percent: u8) -> Self {
        let p = u16::from(percent.min(100));
        let scale = |c: u8| ((u16::from(c) * p) / 100) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

/// Display resolution.
///
/// Fixed for the lifetime of a run; frames of any other size are rejected
/// by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels.
    #[must_use]
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Dimensions {
    /// A single 64×32 panel.
    fn default() -> Self {
        Self::new(64, 32)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A full-resolution RGB image.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    dimensions: Dimensions,
    data: Vec<u8>,
}

impl Frame {
    /// Creates an all-black frame.
    #[must_use]
    pub fn blank(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            data: vec![0; dimensions.area() * 3],
        }
    }

    /// Creates a frame from raw row-major RGB bytes.
    ///
    /// Returns `None` if `data` does not hold exactly `area × 3` bytes.
    #[must_use]
    pub fn from_raw(dimensions: Dimensions, data: Vec<u8>) -> Option<Self> {
        (data.len() == dimensions.area() * 3).then_some(Self { dimensions, data })
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Raw row-major RGB bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns `true` if this frame has the given resolution and a buffer
    /// of the matching length.
    #[must_use]
    pub fn matches(&self, dimensions: Dimensions) -> bool {
        self.dimensions == dimensions && self.data.len() == dimensions.area() * 3
    }

    /// Returns `true` if every pixel is black.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return None;
        }
        Some((y as usize * self.width() as usize + x as usize) * 3)
    }

    /// Reads one pixel, `None` when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let at = self.offset(i64::from(x), i64::from(y))?;
        Some(Rgb::new(self.data[at], self.data[at + 1], self.data[at + 2]))
    }

    /// Writes one pixel. Out-of-bounds coordinates are ignored so drawing
    /// code can clip for free.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Rgb) {
        if let Some(at) = self.offset(x, y) {
            self.data[at] = color.r;
            self.data[at + 1] = color.g;
            self.data[at + 2] = color.b;
        }
    }

    /// Fills the whole frame with one color.
    pub fn fill(&mut self, color: Rgb) {
        for px in self.data.chunks_exact_mut(3) {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
        }
    }

    /// Resets to black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Fills an axis-aligned rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgb) {
        for dy in 0..i64::from(h) {
            for dx in 0..i64::from(w) {
                self.set_pixel(x + dx, y + dy, color);
            }
        }
    }

    /// Draws a line with Bresenham's algorithm, clipped to the frame.
    pub fn draw_line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgb) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);
            if x == to.0 && y == to.1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Iterates rows as slices of RGB bytes.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact((self.width() as usize * 3).max(1))
    }
}

impl fmt::Debug for Frame {
    // Pixel data omitted: a 64x32 frame is 6 KiB of bytes.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("dimensions", &self.dimensions)
            .field("blank", &self.is_blank())
            .finish()
    }
}
