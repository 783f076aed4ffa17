//! Integration tests for the render loop and the rotation.
//!
//! Time is driven by a [`ManualClock`]; workers are real threads, so
//! assertions that need a worker to have done something poll with short
//! real sleeps.

use mxos_app::{App, AppContext, AppError, AppImpl, Manifest, WorkerState};
use mxos_runtime::display::MemorySink;
use mxos_runtime::kernel::{FrameSource, TickReport};
use mxos_runtime::{Clock, ErrorPolicy, Fault, Kernel, KernelBuilder, KernelConfig, ManualClock, SandboxConfig};
use mxos_types::{Dimensions, Frame, RegistrationId, Rgb};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// =============================================================================
// Test Fixtures
// =============================================================================

const DIMS: Dimensions = Dimensions::new(8, 4);

struct Solid {
    manifest: Manifest,
    color: Rgb,
}

impl App for Solid {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn update(&mut self) -> Result<(), AppError> {
        Ok(())
    }

    fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
        canvas.fill(self.color);
        Ok(())
    }
}

/// Fails on its first update.
struct Broken {
    manifest: Manifest,
}

impl App for Broken {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn update(&mut self) -> Result<(), AppError> {
        Err(AppError::UpdateFailed("sensor unplugged".into()))
    }

    fn render(&mut self, _canvas: &mut Frame) -> Result<(), AppError> {
        Ok(())
    }
}

/// Spends longer in `on_start` than [`impatient_kernel`] waits for.
struct SlowStart {
    manifest: Manifest,
}

impl App for SlowStart {
    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn on_start(&mut self, _ctx: &AppContext) -> Result<(), AppError> {
        thread::sleep(Duration::from_millis(600));
        Ok(())
    }

    fn update(&mut self) -> Result<(), AppError> {
        Ok(())
    }

    fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
        canvas.fill(Rgb::RED);
        Ok(())
    }
}

fn solid_manifest() -> Manifest {
    Manifest::new("solid").with_frame_rate(50)
}

fn red(_: &AppContext) -> Box<dyn App> {
    Box::new(Solid {
        manifest: solid_manifest(),
        color: Rgb::RED,
    })
}

fn green(_: &AppContext) -> Box<dyn App> {
    Box::new(Solid {
        manifest: solid_manifest(),
        color: Rgb::GREEN,
    })
}

fn blue(_: &AppContext) -> Box<dyn App> {
    Box::new(Solid {
        manifest: solid_manifest(),
        color: Rgb::BLUE,
    })
}

fn white(_: &AppContext) -> Box<dyn App> {
    Box::new(Solid {
        manifest: solid_manifest(),
        color: Rgb::WHITE,
    })
}

fn broken(_: &AppContext) -> Box<dyn App> {
    Box::new(Broken {
        manifest: Manifest::new("broken").with_frame_rate(50),
    })
}

fn slow(_: &AppContext) -> Box<dyn App> {
    Box::new(SlowStart {
        manifest: Manifest::new("slow").with_frame_rate(50),
    })
}

fn kernel(clock: &ManualClock, policy: ErrorPolicy) -> Kernel {
    KernelBuilder::new()
        .with_dimensions(DIMS)
        .with_clock(Arc::new(clock.clone()))
        .with_sink(Box::new(MemorySink::new()))
        .with_config(KernelConfig {
            sink_budget: Duration::from_millis(500),
            error_policy: policy,
            ..KernelConfig::default()
        })
        .build()
        .expect("build kernel")
}

/// Gives workers 100ms to report `APP_READY`.
fn impatient_kernel(clock: &ManualClock, policy: ErrorPolicy) -> Kernel {
    KernelBuilder::new()
        .with_dimensions(DIMS)
        .with_clock(Arc::new(clock.clone()))
        .with_sink(Box::new(MemorySink::new()))
        .with_config(KernelConfig {
            sink_budget: Duration::from_millis(500),
            error_policy: policy,
            ..KernelConfig::default()
        })
        .with_sandbox_config(SandboxConfig {
            start_timeout: Duration::from_millis(100),
            ..SandboxConfig::default()
        })
        .build()
        .expect("build kernel")
}

fn add(kernel: &mut Kernel, kind: &str, factory: mxos_app::AppFactory, secs: u64) -> RegistrationId {
    kernel
        .register(
            AppImpl::new(kind, factory),
            solid_manifest(),
            Duration::from_secs(secs),
        )
        .expect("register")
}

/// Ticks with real sleeps, without advancing the manual clock.
fn tick_until(kernel: &mut Kernel, mut cond: impl FnMut(&Kernel, &TickReport) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let report = kernel.tick().expect("tick");
        if cond(kernel, &report) {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached: {kernel:?}");
}

fn assert_single_running(kernel: &Kernel) {
    let running: Vec<_> = kernel
        .sandbox()
        .handles()
        .filter(|h| h.state() == WorkerState::Running)
        .map(|h| h.id())
        .collect();
    assert!(running.len() <= 1, "several running: {running:?}");
    if let Some(id) = running.first() {
        assert_eq!(Some(*id), kernel.active());
    }
}

// =============================================================================
// Rotation
// =============================================================================

#[test]
fn four_apps_get_equal_slots() {
    let clock = ManualClock::new();
    let start = clock.now();
    let mut kernel = kernel(&clock, ErrorPolicy::Retry);
    let ids = [
        add(&mut kernel, "red", red, 15),
        add(&mut kernel, "green", green, 15),
        add(&mut kernel, "blue", blue, 15),
        add(&mut kernel, "white", white, 15),
    ];

    let step = Duration::from_millis(100);
    let mut activations = Vec::new();
    // One full cycle plus the return to the first app.
    while clock.elapsed_since(start) <= Duration::from_secs(61) {
        let report = kernel.tick().expect("tick");
        if let Some(id) = report.transition.as_ref().and_then(|t| t.activate) {
            activations.push((clock.elapsed_since(start), id));
        }
        if let FrameSource::Worker(id) = report.source {
            assert_eq!(Some(id), kernel.active(), "inactive worker's frame shown");
        }
        assert_single_running(&kernel);
        clock.advance(step);
        thread::sleep(Duration::from_millis(1));
    }

    let order: Vec<_> = activations.iter().map(|(_, id)| *id).collect();
    assert_eq!(order, vec![ids[0], ids[1], ids[2], ids[3], ids[0]]);

    let slots: Vec<_> = activations
        .windows(2)
        .map(|w| w[1].0 - w[0].0)
        .collect();
    assert_eq!(slots.len(), 4);
    for slot in slots {
        assert!(
            slot >= Duration::from_secs(15) && slot < Duration::from_secs(15) + step,
            "slot was {slot:?}"
        );
    }

    let report = kernel.shutdown().expect("shutdown");
    assert!(report.is_clean(), "{report:?}");
}

#[test]
fn outgoing_worker_is_paused_not_stopped() {
    let clock = ManualClock::new();
    let mut kernel = kernel(&clock, ErrorPolicy::Retry);
    let first = add(&mut kernel, "red", red, 5);
    let second = add(&mut kernel, "green", green, 5);

    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(first));
    clock.advance(Duration::from_secs(5));
    let report = kernel.tick().expect("tick");
    let transition = report.transition.expect("switch");
    assert_eq!(transition.deactivate, Some(first));
    assert_eq!(transition.activate, Some(second));

    let handle = kernel.sandbox().handle(first).expect("handle");
    assert_eq!(handle.state(), WorkerState::Paused);
    // The last red frame stays up until green has one.
    assert_eq!(report.source, FrameSource::Previous);

    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(second));
    let seen = kernel.observer().latest().expect("published");
    assert_eq!(seen.frame.pixel(0, 0), Some(Rgb::GREEN));

    // Back to the first: resumed, not restarted.
    clock.advance(Duration::from_secs(5));
    kernel.tick().expect("tick");
    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(first));
    assert_eq!(kernel.sandbox().handle(first).expect("handle").starts(), 1);
    assert_eq!(kernel.stats().restarts, 0);
}

#[test]
fn operator_switch_cuts_the_slot_short() {
    let clock = ManualClock::new();
    let mut kernel = kernel(&clock, ErrorPolicy::Retry);
    let first = add(&mut kernel, "red", red, 60);
    let second = add(&mut kernel, "blue", blue, 60);

    kernel.tick().expect("tick");
    assert_eq!(kernel.active(), Some(first));
    assert!(kernel.switch_to(second).expect("switch"));
    assert_eq!(kernel.active(), Some(second));
    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(second));

    assert!(!kernel.switch_to(RegistrationId::new(99)).expect("switch"));
}

#[test]
fn unregistering_the_active_app_waits_for_the_boundary() {
    let clock = ManualClock::new();
    let mut kernel = kernel(&clock, ErrorPolicy::Retry);
    let first = add(&mut kernel, "red", red, 10);
    let second = add(&mut kernel, "green", green, 10);
    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(first));

    kernel.unregister(first).expect("unregister");
    kernel.tick().expect("tick");
    assert_eq!(kernel.active(), Some(first));
    assert!(kernel.sandbox().contains(first));

    clock.advance(Duration::from_secs(10));
    let report = kernel.tick().expect("tick");
    let transition = report.transition.expect("switch");
    assert_eq!(transition.retired, vec![first]);
    assert_eq!(transition.activate, Some(second));
    assert!(!kernel.sandbox().contains(first));
    assert_eq!(kernel.scheduler().ids().collect::<Vec<_>>(), vec![second]);
}

// =============================================================================
// Worker errors
// =============================================================================

#[test]
fn skip_policy_drops_a_failing_app() {
    let clock = ManualClock::new();
    let mut kernel = kernel(&clock, ErrorPolicy::Skip);
    let bad = add(&mut kernel, "broken", broken, 10);
    let good = add(&mut kernel, "green", green, 10);

    tick_until(&mut kernel, |k, _| k.stats().worker_errors == 1);
    assert_eq!(
        kernel.sandbox().handle(bad).expect("handle").state(),
        WorkerState::Errored
    );

    clock.advance(Duration::from_secs(10));
    let report = kernel.tick().expect("tick");
    let transition = report.transition.expect("switch");
    assert_eq!(transition.retired, vec![bad]);
    assert_eq!(transition.activate, Some(good));
    assert_eq!(kernel.scheduler().ids().collect::<Vec<_>>(), vec![good]);

    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(good));
    assert_eq!(kernel.stats().restarts, 0);
}

#[test]
fn retry_policy_restarts_on_next_activation() {
    let clock = ManualClock::new();
    let mut kernel = kernel(&clock, ErrorPolicy::Retry);
    let bad = add(&mut kernel, "broken", broken, 1);
    let good = add(&mut kernel, "green", green, 1);

    tick_until(&mut kernel, |k, _| k.stats().worker_errors == 1);
    assert_eq!(kernel.stats().restarts, 0);

    clock.advance(Duration::from_secs(1));
    kernel.tick().expect("tick");
    assert_eq!(kernel.active(), Some(good));

    clock.advance(Duration::from_secs(1));
    kernel.tick().expect("tick");
    assert_eq!(kernel.active(), Some(bad));
    assert_eq!(kernel.stats().restarts, 1);
    assert_eq!(kernel.sandbox().handle(bad).expect("handle").starts(), 2);
}

#[test]
fn retry_policy_restarts_a_lone_app_at_its_slot_boundary() {
    let clock = ManualClock::new();
    let mut kernel = kernel(&clock, ErrorPolicy::Retry);
    let bad = add(&mut kernel, "broken", broken, 2);

    tick_until(&mut kernel, |k, _| k.stats().worker_errors == 1);
    assert_eq!(kernel.stats().restarts, 0);

    clock.advance(Duration::from_secs(2));
    let report = kernel.tick().expect("tick");
    assert!(report.transition.is_none());
    assert_eq!(kernel.active(), Some(bad));
    assert_eq!(kernel.stats().restarts, 1);
    assert_eq!(kernel.sandbox().handle(bad).expect("handle").starts(), 2);
}

#[test]
fn skip_policy_drops_an_app_that_never_becomes_ready() {
    let clock = ManualClock::new();
    let mut kernel = impatient_kernel(&clock, ErrorPolicy::Skip);
    let late = add(&mut kernel, "slow", slow, 5);
    let good = add(&mut kernel, "green", green, 5);

    tick_until(&mut kernel, |k, _| k.stats().worker_errors == 1);
    assert_eq!(
        kernel.sandbox().handle(late).expect("handle").state(),
        WorkerState::Errored
    );
    assert!(kernel.stats().worker_faults >= 1);

    clock.advance(Duration::from_secs(5));
    let report = kernel.tick().expect("tick");
    let transition = report.transition.expect("switch");
    assert_eq!(transition.retired, vec![late]);
    assert_eq!(transition.activate, Some(good));
    assert_eq!(kernel.scheduler().ids().collect::<Vec<_>>(), vec![good]);

    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(good));
    assert_eq!(kernel.stats().worker_errors, 1);
}

#[test]
fn start_timeout_does_not_hold_up_the_render_loop() {
    let clock = ManualClock::new();
    let mut kernel = impatient_kernel(&clock, ErrorPolicy::Retry);
    let late = add(&mut kernel, "slow", slow, 5);
    let good = add(&mut kernel, "green", green, 5);

    // Headroom over one frame interval for a loaded test machine.
    let budget = kernel.config().frame_interval() * 3;
    let mut longest = Duration::ZERO;
    let mut timed_out = false;
    let deadline = Instant::now() + Duration::from_secs(5);
    while !timed_out && Instant::now() < deadline {
        let began = Instant::now();
        let report = kernel.tick().expect("tick");
        longest = longest.max(began.elapsed());
        timed_out = report
            .faults
            .iter()
            .any(|f| matches!(f, Fault::WorkerStartTimeout { id, .. } if *id == late));
        thread::sleep(Duration::from_millis(5));
    }
    assert!(timed_out, "no start timeout: {kernel:?}");
    assert!(longest < budget, "a tick took {longest:?}");
    assert_eq!(
        kernel.sandbox().handle(late).expect("handle").state(),
        WorkerState::Errored
    );
    assert_eq!(kernel.active(), Some(late));

    clock.advance(Duration::from_secs(5));
    let report = kernel.tick().expect("tick");
    let transition = report.transition.expect("switch");
    assert_eq!(transition.activate, Some(good));
    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(good));
    assert!(kernel.scheduler().contains(late));
}

#[test]
fn failing_app_leaves_the_previous_frame_up() {
    let clock = ManualClock::new();
    let mut kernel = kernel(&clock, ErrorPolicy::Retry);
    let good = add(&mut kernel, "red", red, 1);
    add(&mut kernel, "broken", broken, 30);

    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(good));
    clock.advance(Duration::from_secs(1));
    kernel.tick().expect("tick");

    tick_until(&mut kernel, |k, _| k.stats().worker_errors == 1);
    let report = kernel.tick().expect("tick");
    assert_eq!(report.source, FrameSource::Previous);
    let seen = kernel.observer().latest().expect("published");
    assert_eq!(seen.frame.pixel(7, 3), Some(Rgb::RED));
}

// =============================================================================
// Shutdown
// =============================================================================

#[test]
fn shutdown_stops_every_worker_and_blanks_the_display() {
    let clock = ManualClock::new();
    let sink = MemorySink::new();
    let frames = sink.handle();
    let mut kernel = KernelBuilder::new()
        .with_dimensions(DIMS)
        .with_clock(Arc::new(clock.clone()))
        .with_sink(Box::new(sink))
        .with_config(KernelConfig {
            sink_budget: Duration::from_millis(500),
            ..KernelConfig::default()
        })
        .build()
        .expect("build");
    let id = add(&mut kernel, "red", red, 10);
    tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(id));

    let report = kernel.shutdown().expect("shutdown");
    assert_eq!(report.stopped, vec![id]);
    assert!(report.is_clean());
    assert!(report.elapsed < KernelConfig::default().shutdown_grace);
    assert_eq!(kernel.sandbox().running_count(), 0);
    assert!(frames.last().expect("cleared").is_blank());
}
