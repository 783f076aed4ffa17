//! Binary clock.
//!
//! Six columns (hour, minute and second digits in pairs), four rows of
//! bits with the most significant on top.

use chrono::{Local, NaiveTime, Timelike};
use mxos_app::{App, AppContext, AppError, Capability, Manifest};
use mxos_types::{Dimensions, Frame, Rgb};

const ON: [Rgb; 3] = [
    Rgb::new(255, 90, 60),
    Rgb::new(60, 200, 255),
    Rgb::new(120, 255, 120),
];
const OFF: Rgb = Rgb::new(24, 24, 24);

pub(crate) fn manifest() -> Manifest {
    Manifest::new("binary_clock")
        .with_version("1.0.0")
        .with_description("Local time as a binary clock")
        .with_frame_rate(1)
        .with_capabilities(Capability::SYSTEM_INFO)
}

pub(crate) fn create(ctx: &AppContext) -> Box<dyn App> {
    Box::new(BinaryClock::new(ctx.dimensions))
}

/// Cell geometry for a display size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grid {
    cell: u32,
    gap: u32,
    left: i64,
    top: i64,
}

impl Grid {
    fn fit(d: Dimensions) -> Self {
        let pitch = (d.width / 6).min(d.height / 4).max(1);
        let gap = u32::from(pitch >= 3);
        let cell = pitch - gap;
        let left = (i64::from(d.width) - i64::from(pitch * 6)) / 2;
        let top = (i64::from(d.height) - i64::from(pitch * 4)) / 2;
        Self { cell, gap, left, top }
    }

    fn origin(&self, column: u32, row: u32) -> (i64, i64) {
        let pitch = i64::from(self.cell + self.gap);
        (
            self.left + i64::from(column) * pitch,
            self.top + i64::from(row) * pitch,
        )
    }
}

#[derive(Debug)]
pub struct BinaryClock {
    manifest: Manifest,
    grid: Grid,
    /// Pinned time for tests; `None` reads the local clock.
    fixed: Option<NaiveTime>,
    now: NaiveTime,
}

impl BinaryClock {
    #[must_use]
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            manifest: manifest(),
            grid: Grid::fit(dimensions),
            fixed: None,
            now: NaiveTime::MIN,
        }
    }

    /// Always shows `time`.
    #[must_use]
    pub fn fixed(dimensions: Dimensions, time: NaiveTime) -> Self {
        Self {
            fixed: Some(time),
            ..Self::new(dimensions)
        }
    }

    /// The six decimal digits shown, `HHMMSS`.
    #[must_use]
    pub fn digits(&self) -> [u32; 6] {
        let (h, m, s) = (self.now.hour(), self.now.minute(), self.now.second());
        [h / 10, h % 10, m / 10, m % 10, s / 10, s % 10]
    }
}

impl App for BinaryClock {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn update(&mut self) -> Result<(), AppError> {
        self.now = self.fixed.unwrap_or_else(|| Local::now().time());
        Ok(())
    }

    fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
        canvas.clear();
        for (column, digit) in (0_u32..).zip(self.digits()) {
            let on = ON[(column / 2) as usize];
            for row in 0..4_u32 {
                let bit = 3 - row;
                let color = if digit & (1 << bit) != 0 { on } else { OFF };
                let (x, y) = self.grid.origin(column, row);
                canvas.fill_rect(x, y, self.grid.cell, self.grid.cell, color);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxos_app::testing::AppTestHarness;

    #[test]
    fn grid_fits_default_display() {
        let grid = Grid::fit(Dimensions::new(64, 32));
        assert_eq!(grid, Grid { cell: 7, gap: 1, left: 8, top: 0 });
        let tiny = Grid::fit(Dimensions::new(6, 4));
        assert_eq!(tiny.cell, 1);
        assert_eq!(tiny.gap, 0);
    }

    #[test]
    fn shows_fixed_time_in_bcd() {
        let d = Dimensions::new(64, 32);
        let time = NaiveTime::from_hms_opt(13, 47, 9).expect("valid time");
        let mut harness = AppTestHarness::new(BinaryClock::fixed(d, time), d);
        harness.start().expect("start");
        let frame = harness.step().expect("step").clone();
        assert_eq!(harness.app().digits(), [1, 3, 4, 7, 0, 9]);

        let grid = Grid::fit(d);
        let lit = |column: u32, row: u32| {
            let (x, y) = grid.origin(column, row);
            frame.pixel(x as u32, y as u32) != Some(OFF)
        };
        // Hour units 3 = 0011.
        assert!(!lit(1, 0));
        assert!(!lit(1, 1));
        assert!(lit(1, 2));
        assert!(lit(1, 3));
        // Second units 9 = 1001.
        assert!(lit(5, 0));
        assert!(!lit(5, 1));
        assert!(!lit(5, 2));
        assert!(lit(5, 3));
    }

    #[test]
    fn reads_the_local_clock() {
        let d = Dimensions::new(24, 16);
        let mut harness = AppTestHarness::new(BinaryClock::new(d), d);
        harness.start().expect("start");
        harness.step().expect("step");
        assert!(harness.app().digits()[0] <= 2);
    }
}
