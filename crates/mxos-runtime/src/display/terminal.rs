//! ANSI terminal emulation of the LED panel.
//!
//! Two panel rows share one character cell: the upper pixel is the
//! foreground of `▀`, the lower one its background. Needs a terminal with
//! 24-bit color.

use super::{DisplayError, DisplaySink};
use mxos_types::{Frame, Rgb};
use std::fmt::Write as _;
use std::io::Write;

const HOME: &str = "\x1b[H";
const CLEAR: &str = "\x1b[2J";
const RESET: &str = "\x1b[0m";
const UPPER_HALF: char = '▀';

/// Draws frames to any writer, usually stdout.
#[derive(Debug)]
pub struct TerminalSink<W: Write + Send> {
    out: W,
    brightness: u8,
    cleared: bool,
    buf: String,
}

impl<W: Write + Send> TerminalSink<W> {
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out,
            brightness: 100,
            cleared: false,
            buf: String::new(),
        }
    }

    /// Brightness in percent, clamped to 0..=100.
    #[must_use]
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.set_brightness(brightness);
        self
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness.min(100);
    }

    #[must_use]
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn compose(&mut self, frame: &Frame) {
        self.buf.clear();
        if !self.cleared {
            self.buf.push_str(CLEAR);
        }
        self.buf.push_str(HOME);

        let bright = self.brightness;
        let at = |x: u32, y: u32| frame.pixel(x, y).unwrap_or(Rgb::BLACK).scaled(bright);
        for y in (0..frame.height()).step_by(2) {
            for x in 0..frame.width() {
                let top = at(x, y);
                let bottom = if y + 1 < frame.height() {
                    at(x, y + 1)
                } else {
                    Rgb::BLACK
                };
                let _ = write!(
                    self.buf,
                    "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m{UPPER_HALF}",
                    top.r, top.g, top.b, bottom.r, bottom.g, bottom.b
                );
            }
            self.buf.push_str(RESET);
            self.buf.push('\n');
        }
    }
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn name(&self) -> &str {
        "terminal"
    }

    fn present(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.compose(frame);
        self.out.write_all(self.buf.as_bytes())?;
        self.out.flush()?;
        self.cleared = true;
        Ok(())
    }
}
