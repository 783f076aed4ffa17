use super::{Kernel, KernelConfig, KernelError, KernelState, KernelStats, RunContext, ShutdownHandle};
use crate::bus::{BusConfig, MessageBus};
use crate::clock::{Clock, SystemClock};
use crate::display::{BoundedSink, DisplaySink, FrameObserver, NullSink};
use crate::sandbox::{Sandbox, SandboxConfig};
use crate::scheduler::Scheduler;
use mxos_app::AppRegistry;
use mxos_types::Dimensions;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Assembles a [`Kernel`].
///
/// Everything has a default: a 64x32 display, a [`NullSink`], the system
/// clock and an empty registry.
///
/// ```no_run
/// use mxos_runtime::display::TerminalSink;
/// use mxos_runtime::kernel::KernelBuilder;
/// use mxos_runtime::apps::builtin_registry;
///
/// let mut kernel = KernelBuilder::new()
///     .with_registry(builtin_registry())
///     .with_sink(Box::new(TerminalSink::new(std::io::stdout())))
///     .build()?;
/// kernel.register_kind("bounce", std::time::Duration::from_secs(15))?;
/// # Ok::<(), mxos_runtime::kernel::KernelError>(())
/// ```
#[must_use]
pub struct KernelBuilder {
    dimensions: Dimensions,
    config: KernelConfig,
    bus: BusConfig,
    sandbox: SandboxConfig,
    sink: Option<Box<dyn DisplaySink>>,
    clock: Option<Arc<dyn Clock>>,
    registry: AppRegistry,
    observer: Option<FrameObserver>,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            dimensions: Dimensions::default(),
            config: KernelConfig::default(),
            bus: BusConfig::default(),
            sandbox: SandboxConfig::default(),
            sink: None,
            clock: None,
            registry: AppRegistry::new(),
            observer: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bus_config(mut self, bus: BusConfig) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_sandbox_config(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn DisplaySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Application kinds available to [`Kernel::register_kind`].
    pub fn with_registry(mut self, registry: AppRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Publishes presented frames to an existing observer instead of a
    /// fresh one.
    pub fn with_observer(mut self, observer: FrameObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validates the configuration and starts the sink thread.
    ///
    /// # Errors
    ///
    /// - [`KernelError::InvalidConfig`] for empty dimensions, a zero frame
    ///   rate or a zero sink budget
    /// - [`KernelError::SinkSpawn`] if the sink thread cannot be created
    pub fn build(self) -> Result<Kernel, KernelError> {
        if self.dimensions.is_empty() {
            return Err(KernelError::InvalidConfig(format!(
                "display dimensions must be non-zero, got {}",
                self.dimensions
            )));
        }
        if self.config.target_fps == 0 {
            return Err(KernelError::InvalidConfig("target_fps must be positive".into()));
        }
        if self.config.sink_budget.is_zero() {
            return Err(KernelError::InvalidConfig("sink_budget must be positive".into()));
        }

        let sink = self.sink.unwrap_or_else(|| Box::new(NullSink::new()));
        let sink = BoundedSink::spawn(sink, self.config.sink_budget)
            .map_err(|e| KernelError::SinkSpawn(e.to_string()))?;
        let ctx = RunContext::new(self.dimensions);

        info!(
            run_id = %ctx.run_id,
            dimensions = %ctx.dimensions,
            fps = self.config.target_fps,
            sink = sink.name(),
            isolation = %self.sandbox.isolation,
            policy = %self.config.error_policy,
            "kernel built"
        );

        Ok(Kernel {
            ctx,
            config: self.config,
            state: KernelState::Ready,
            bus: MessageBus::new(self.bus),
            sandbox: Sandbox::new(self.sandbox),
            scheduler: Scheduler::new(),
            sink,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            registry: self.registry,
            observer: self.observer.unwrap_or_default(),
            shutdown: ShutdownHandle::new(),
            previous: None,
            unregistering: BTreeSet::new(),
            stats: KernelStats::default(),
        })
    }
}
