//! System load bars read from `/proc/loadavg`.
//!
//! Declares `filesystem`, so it always runs in its own process.

use mxos_app::{App, AppContext, AppError, Capability, Manifest};
use mxos_types::{Dimensions, Frame, Rgb};
use std::path::PathBuf;
use tracing::debug;

const LOADAVG: &str = "/proc/loadavg";
const TRACK: Rgb = Rgb::new(20, 20, 20);

pub(crate) fn manifest() -> Manifest {
    Manifest::new("loadmeter")
        .with_version("1.0.0")
        .with_description("1, 5 and 15 minute load averages")
        .with_frame_rate(2)
        .with_capabilities(Capability::FILESYSTEM)
}

pub(crate) fn create(ctx: &AppContext) -> Box<dyn App> {
    Box::new(LoadMeter::new(ctx.dimensions))
}

/// Parses the three load averages at the start of a `loadavg` line.
fn parse_loadavg(text: &str) -> Option<[f32; 3]> {
    let mut fields = text.split_whitespace().map(str::parse::<f32>);
    let one = fields.next()?.ok()?;
    let five = fields.next()?.ok()?;
    let fifteen = fields.next()?.ok()?;
    Some([one, five, fifteen])
}

/// Green below 50% of the cores, yellow below 100%, red above.
fn color_for(ratio: f32) -> Rgb {
    if ratio < 0.5 {
        Rgb::new(40, 220, 60)
    } else if ratio < 1.0 {
        Rgb::new(240, 200, 40)
    } else {
        Rgb::new(240, 50, 40)
    }
}

#[derive(Debug)]
pub struct LoadMeter {
    manifest: Manifest,
    dimensions: Dimensions,
    source: PathBuf,
    cores: f32,
    loads: [f32; 3],
}

impl LoadMeter {
    #[must_use]
    pub fn new(dimensions: Dimensions) -> Self {
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            manifest: manifest(),
            dimensions,
            source: PathBuf::from(LOADAVG),
            cores: cores as f32,
            loads: [0.0; 3],
        }
    }

    /// Reads from `path` instead of `/proc/loadavg`, as if on `cores` CPUs.
    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>, cores: usize) -> Self {
        self.source = path.into();
        self.cores = cores.max(1) as f32;
        self
    }

    #[must_use]
    pub fn loads(&self) -> [f32; 3] {
        self.loads
    }

    fn read(&self) -> Result<[f32; 3], String> {
        let text = std::fs::read_to_string(&self.source)
            .map_err(|e| format!("{}: {e}", self.source.display()))?;
        parse_loadavg(&text).ok_or_else(|| format!("{}: unexpected format", self.source.display()))
    }
}

impl App for LoadMeter {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn on_start(&mut self, _ctx: &AppContext) -> Result<(), AppError> {
        self.loads = self.read().map_err(AppError::StartFailed)?;
        debug!(loads = ?self.loads, cores = self.cores, "load meter started");
        Ok(())
    }

    fn update(&mut self) -> Result<(), AppError> {
        self.loads = self.read().map_err(AppError::UpdateFailed)?;
        Ok(())
    }

    fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
        canvas.clear();
        let width = self.dimensions.width;
        let band = (self.dimensions.height / 3).max(1);
        let thickness = band.saturating_sub(1).max(1);

        for (row, load) in (0_u32..).zip(self.loads) {
            let ratio = load / self.cores;
            let len = ((ratio.clamp(0.0, 1.0) * width as f32).round() as u32).min(width);
            let y = i64::from(row * band);
            canvas.fill_rect(0, y, width, thickness, TRACK);
            canvas.fill_rect(0, y, len, thickness, color_for(ratio));
        }
        Ok(())
    }
}
