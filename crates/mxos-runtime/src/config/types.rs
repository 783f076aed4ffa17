//! Configuration types.
//!
//! Every section has a [`Default`] and `#[serde(default)]`, so a config
//! file only needs the keys it changes. Durations are plain integers with
//! the unit in the key name.

use crate::bus::BusConfig;
use crate::kernel::{ErrorPolicy, KernelConfig};
use crate::sandbox::{IsolationPolicy, SandboxConfig, WorkerCommand};
use mxos_types::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Unified configuration after all layers are merged.
///
/// ```
/// use mxos_runtime::config::MxosConfig;
///
/// let config = MxosConfig::from_toml("[display]\nwidth = 32").unwrap();
/// assert_eq!(config.display.width, 32);
/// assert_eq!(config.display.height, 32);
/// assert_eq!(config.kernel.fps, 60);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MxosConfig {
    pub display: DisplaySection,
    pub kernel: KernelSection,
    pub sandbox: SandboxSection,
    pub bus: BusSection,
    pub scheduler: SchedulerSection,
    /// Rotation, in order. Empty means every builtin app.
    pub apps: Vec<AppEntry>,
}

impl MxosConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// # Errors
    ///
    /// Returns the TOML syntax or type error.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Overrides values in `self` with the values of `other` that differ
    /// from the defaults.
    pub fn merge(&mut self, other: &Self) {
        self.display.merge(&other.display);
        self.kernel.merge(&other.kernel);
        self.sandbox.merge(&other.sandbox);
        self.bus.merge(&other.bus);
        self.scheduler.merge(&other.scheduler);
        if !other.apps.is_empty() {
            self.apps = other.apps.clone();
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.display.width, self.display.height)
    }

    /// Slot length of an app entry, falling back to the scheduler default.
    #[must_use]
    pub fn duration_of(&self, entry: &AppEntry) -> Duration {
        Duration::from_secs(entry.duration_secs.unwrap_or(self.scheduler.default_duration_secs))
    }

    #[must_use]
    pub fn kernel_config(&self) -> KernelConfig {
        KernelConfig {
            target_fps: self.kernel.fps,
            sink_budget: Duration::from_millis(self.kernel.sink_budget_ms),
            sink_retries: self.kernel.sink_retries,
            error_policy: self.kernel.error_policy,
            shutdown_grace: Duration::from_millis(self.kernel.shutdown_grace_ms),
        }
    }

    #[must_use]
    pub fn sandbox_config(&self) -> SandboxConfig {
        let worker_command = self.sandbox.worker_program.as_ref().map(|program| {
            self.sandbox
                .worker_args
                .iter()
                .fold(WorkerCommand::new(program.clone()), |cmd, arg| cmd.arg(arg.clone()))
        });
        SandboxConfig {
            start_timeout: Duration::from_millis(self.sandbox.start_timeout_ms),
            stop_grace: Duration::from_millis(self.sandbox.stop_grace_ms),
            kill_grace: Duration::from_millis(self.sandbox.kill_grace_ms),
            unresponsive_timeout: Duration::from_millis(self.sandbox.unresponsive_timeout_ms),
            isolation: self.sandbox.isolation,
            worker_command,
        }
    }

    #[must_use]
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            frame_slots: self.bus.frame_slots,
            control_slots: self.bus.control_slots,
            control_timeout: Duration::from_millis(self.bus.control_timeout_ms),
            max_batch: self.bus.max_batch,
            max_batch_per_worker: self.bus.max_batch_per_worker,
        }
    }
}

/// Which display sink `mxos run` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Null,
    #[default]
    Terminal,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Terminal => "terminal",
        })
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(Self::Null),
            "terminal" => Ok(Self::Terminal),
            other => Err(format!("unknown sink '{other}' (expected null or terminal)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    pub width: u32,
    pub height: u32,
    /// Percent, 0..=100.
    pub brightness: u8,
    /// No device at all: frames are discarded whatever `sink` says.
    pub simulate: bool,
    pub sink: SinkKind,
}

impl Default for DisplaySection {
    fn default() -> Self {
        let d = Dimensions::default();
        Self {
            width: d.width,
            height: d.height,
            brightness: 100,
            simulate: false,
            sink: SinkKind::Terminal,
        }
    }
}

impl DisplaySection {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.width != default.width {
            self.width = other.width;
        }
        if other.height != default.height {
            self.height = other.height;
        }
        if other.brightness != default.brightness {
            self.brightness = other.brightness;
        }
        if other.simulate != default.simulate {
            self.simulate = other.simulate;
        }
        if other.sink != default.sink {
            self.sink = other.sink;
        }
    }

    /// The sink that will actually be used.
    #[must_use]
    pub fn effective_sink(&self) -> SinkKind {
        if self.simulate {
            SinkKind::Null
        } else {
            self.sink
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSection {
    pub fps: u32,
    pub sink_budget_ms: u64,
    pub sink_retries: u32,
    pub error_policy: ErrorPolicy,
    pub shutdown_grace_ms: u64,
}

impl Default for KernelSection {
    fn default() -> Self {
        let k = KernelConfig::default();
        Self {
            fps: k.target_fps,
            sink_budget_ms: millis(k.sink_budget),
            sink_retries: k.sink_retries,
            error_policy: k.error_policy,
            shutdown_grace_ms: millis(k.shutdown_grace),
        }
    }
}

impl KernelSection {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.fps != default.fps {
            self.fps = other.fps;
        }
        if other.sink_budget_ms != default.sink_budget_ms {
            self.sink_budget_ms = other.sink_budget_ms;
        }
        if other.sink_retries != default.sink_retries {
            self.sink_retries = other.sink_retries;
        }
        if other.error_policy != default.error_policy {
            self.error_policy = other.error_policy;
        }
        if other.shutdown_grace_ms != default.shutdown_grace_ms {
            self.shutdown_grace_ms = other.shutdown_grace_ms;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub isolation: IsolationPolicy,
    pub start_timeout_ms: u64,
    pub stop_grace_ms: u64,
    pub kill_grace_ms: u64,
    pub unresponsive_timeout_ms: u64,
    /// Program for PROCESS workers. Defaults to the running `mxos` binary.
    pub worker_program: Option<PathBuf>,
    /// Leading arguments placed before the worker arguments.
    pub worker_args: Vec<String>,
}

impl Default for SandboxSection {
    fn default() -> Self {
        let s = SandboxConfig::default();
        Self {
            isolation: s.isolation,
            start_timeout_ms: millis(s.start_timeout),
            stop_grace_ms: millis(s.stop_grace),
            kill_grace_ms: millis(s.kill_grace),
            unresponsive_timeout_ms: millis(s.unresponsive_timeout),
            worker_program: None,
            worker_args: Vec::new(),
        }
    }
}

impl SandboxSection {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.isolation != default.isolation {
            self.isolation = other.isolation;
        }
        if other.start_timeout_ms != default.start_timeout_ms {
            self.start_timeout_ms = other.start_timeout_ms;
        }
        if other.stop_grace_ms != default.stop_grace_ms {
            self.stop_grace_ms = other.stop_grace_ms;
        }
        if other.kill_grace_ms != default.kill_grace_ms {
            self.kill_grace_ms = other.kill_grace_ms;
        }
        if other.unresponsive_timeout_ms != default.unresponsive_timeout_ms {
            self.unresponsive_timeout_ms = other.unresponsive_timeout_ms;
        }
        if other.worker_program.is_some() {
            self.worker_program.clone_from(&other.worker_program);
            self.worker_args.clone_from(&other.worker_args);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    pub frame_slots: usize,
    pub control_slots: usize,
    pub control_timeout_ms: u64,
    pub max_batch: usize,
    pub max_batch_per_worker: usize,
}

impl Default for BusSection {
    fn default() -> Self {
        let b = BusConfig::default();
        Self {
            frame_slots: b.frame_slots,
            control_slots: b.control_slots,
            control_timeout_ms: millis(b.control_timeout),
            max_batch: b.max_batch,
            max_batch_per_worker: b.max_batch_per_worker,
        }
    }
}

impl BusSection {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.frame_slots != default.frame_slots {
            self.frame_slots = other.frame_slots;
        }
        if other.control_slots != default.control_slots {
            self.control_slots = other.control_slots;
        }
        if other.control_timeout_ms != default.control_timeout_ms {
            self.control_timeout_ms = other.control_timeout_ms;
        }
        if other.max_batch != default.max_batch {
            self.max_batch = other.max_batch;
        }
        if other.max_batch_per_worker != default.max_batch_per_worker {
            self.max_batch_per_worker = other.max_batch_per_worker;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Slot length for apps listed without a duration.
    pub default_duration_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            default_duration_secs: 15,
        }
    }
}

impl SchedulerSection {
    fn merge(&mut self, other: &Self) {
        if other.default_duration_secs != Self::default().default_duration_secs {
            self.default_duration_secs = other.default_duration_secs;
        }
    }
}

/// One rotation entry: `{ kind = "bounce", duration_secs = 20 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
}

impl AppEntry {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            duration_secs: None,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

impl FromStr for AppEntry {
    type Err = String;

    /// Parses `KIND` or `KIND:SECS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, secs) = match s.split_once(':') {
            Some((kind, secs)) => (kind, Some(secs)),
            None => (s, None),
        };
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(format!("missing app kind in '{s}'"));
        }
        let mut entry = Self::new(kind);
        if let Some(secs) = secs {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| format!("invalid duration in '{s}'"))?;
            if secs == 0 {
                return Err(format!("duration must be positive in '{s}'"));
            }
            entry = entry.with_duration(secs);
        }
        Ok(entry)
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runtime_defaults() {
        let config = MxosConfig::default();
        assert_eq!(config.kernel_config(), KernelConfig::default());
        assert_eq!(config.sandbox_config(), SandboxConfig::default());
        assert_eq!(config.bus_config(), BusConfig::default());
        assert_eq!(config.dimensions(), Dimensions::new(64, 32));
    }

    #[test]
    fn toml_roundtrip_keeps_apps() {
        let mut config = MxosConfig::default();
        config.apps = vec![AppEntry::new("bounce").with_duration(20), AppEntry::new("binary_clock")];
        config.sandbox.isolation = IsolationPolicy::AlwaysProcess;
        let text = config.to_toml().expect("serialize");
        assert!(text.contains("isolation = \"process\""));
        assert_eq!(MxosConfig::from_toml(&text).expect("parse"), config);
    }

    #[test]
    fn merge_only_overrides_non_defaults() {
        let mut base = MxosConfig::default();
        base.display.width = 32;
        base.kernel.fps = 30;

        let mut layer = MxosConfig::default();
        layer.kernel.error_policy = ErrorPolicy::Skip;
        layer.apps = vec![AppEntry::new("loadmeter")];

        base.merge(&layer);
        assert_eq!(base.display.width, 32);
        assert_eq!(base.kernel.fps, 30);
        assert_eq!(base.kernel.error_policy, ErrorPolicy::Skip);
        assert_eq!(base.apps.len(), 1);
    }

    #[test]
    fn worker_command_from_program_and_args() {
        let config = MxosConfig::from_toml(
            r#"
[sandbox]
worker_program = "/bin/sh"
worker_args = ["/tmp/worker.sh"]
"#,
        )
        .expect("parse");
        let command = config.sandbox_config().worker_command.expect("command");
        assert_eq!(command, WorkerCommand::new("/bin/sh").arg("/tmp/worker.sh"));
    }

    #[test]
    fn app_entry_parsing() {
        assert_eq!("bounce".parse::<AppEntry>(), Ok(AppEntry::new("bounce")));
        assert_eq!(
            "bounce:20".parse::<AppEntry>(),
            Ok(AppEntry::new("bounce").with_duration(20))
        );
        assert!("bounce:0".parse::<AppEntry>().is_err());
        assert!(":5".parse::<AppEntry>().is_err());
        assert!("bounce:soon".parse::<AppEntry>().is_err());

        let config = MxosConfig::default();
        assert_eq!(config.duration_of(&AppEntry::new("x")), Duration::from_secs(15));
    }

    #[test]
    fn simulate_forces_null_sink() {
        let mut display = DisplaySection::default();
        assert_eq!(display.effective_sink(), SinkKind::Terminal);
        display.simulate = true;
        assert_eq!(display.effective_sink(), SinkKind::Null);
    }
}
