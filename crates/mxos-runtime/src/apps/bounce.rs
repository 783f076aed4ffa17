//! Bouncing logo, the classic DVD screensaver.

use mxos_app::{App, AppContext, AppError, Capability, Manifest};
use mxos_types::{Frame, Rgb};

const LOGO: [&str; 9] = [
    "######...#####.",
    "..##.#...#...##",
    "#..#.##.##.#..#",
    "#.##..#.#..#.##",
    "###...###..###.",
    ".......#.......",
    "..###########..",
    "#####.....#####",
    "..###########..",
];

/// Colors cycled on every wall hit.
const PALETTE: [Rgb; 6] = [
    Rgb::new(255, 80, 80),
    Rgb::new(80, 255, 80),
    Rgb::new(80, 160, 255),
    Rgb::new(255, 220, 60),
    Rgb::new(220, 90, 255),
    Rgb::new(60, 240, 230),
];

pub(crate) fn manifest() -> Manifest {
    Manifest::new("bounce")
        .with_version("1.0.0")
        .with_description("Bouncing logo")
        .with_frame_rate(10)
        .with_capabilities(Capability::empty())
}

pub(crate) fn create(ctx: &AppContext) -> Box<dyn App> {
    Box::new(Bounce::new(ctx))
}

/// One axis of motion: position, direction and the largest position.
#[derive(Debug, Clone, Copy)]
struct Axis {
    pos: i64,
    forward: bool,
    bound: i64,
}

impl Axis {
    fn new(extent: u32, size: usize) -> Self {
        Self {
            pos: 0,
            forward: true,
            bound: (i64::from(extent) - size as i64).max(0),
        }
    }

    /// Moves one pixel. Returns `true` on a wall hit.
    fn step(&mut self) -> bool {
        if self.bound == 0 {
            return false;
        }
        let at_wall = if self.forward {
            self.pos >= self.bound
        } else {
            self.pos <= 0
        };
        if at_wall {
            self.forward = !self.forward;
        }
        self.pos += if self.forward { 1 } else { -1 };
        at_wall
    }
}

#[derive(Debug)]
pub struct Bounce {
    manifest: Manifest,
    x: Axis,
    y: Axis,
    color: usize,
}

impl Bounce {
    #[must_use]
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            manifest: manifest(),
            x: Axis::new(ctx.dimensions.width, LOGO[0].len()),
            y: Axis::new(ctx.dimensions.height, LOGO.len()),
            color: 0,
        }
    }

    #[must_use]
    pub fn position(&self) -> (i64, i64) {
        (self.x.pos, self.y.pos)
    }
}

impl App for Bounce {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn update(&mut self) -> Result<(), AppError> {
        let hit_x = self.x.step();
        let hit_y = self.y.step();
        if hit_x || hit_y {
            self.color = (self.color + 1) % PALETTE.len();
        }
        Ok(())
    }

    fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
        canvas.clear();
        let color = PALETTE[self.color];
        for (dy, row) in LOGO.iter().enumerate() {
            for (dx, cell) in row.bytes().enumerate() {
                if cell == b'#' {
                    canvas.set_pixel(self.x.pos + dx as i64, self.y.pos + dy as i64, color);
                }
            }
        }
        Ok(())
    }
}
