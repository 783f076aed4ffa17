//! MXOS CLI - display orchestrator
//!
//! # Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `mxos run` | Rotate applications on the display until Ctrl-C (or `--ticks`) |
//! | `mxos apps` | List builtin applications and how they would be isolated |
//! | `mxos worker` | Child-process worker entry; spawned by `run`, not by hand |
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`MXOS_*`)
//! 3. Explicit file (`--config PATH`)
//! 4. Project config (`.mxos/config.toml` in the project directory)
//! 5. Global config (`~/.mxos/config.toml`)
//! 6. Default values (lowest priority)
//!
//! # Output
//!
//! Logs go to stderr (and optionally `--log-file`). stdout carries the
//! terminal display and the final `stats:` line of `run`, or the JSON line
//! protocol of `worker`.

mod tracing_writer;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mxos_app::AppContext;
use mxos_runtime::config::{AppEntry, ConfigLoader, ConfigResolver, MxosConfig, SinkKind};
use mxos_runtime::display::{DisplaySink, NullSink, TerminalSink};
use mxos_runtime::sandbox::IsolationPolicy;
use mxos_runtime::worker::stdio::serve_stdio;
use mxos_runtime::{builtin_registry, KernelBuilder, RunSummary};
use mxos_types::{Dimensions, RegistrationId, RunId};
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// MXOS - rotate small applications on an LED matrix
#[derive(Parser, Debug)]
#[command(name = "mxos")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the render loop
    Run(RunArgs),
    /// List builtin applications
    Apps(ConfigArgs),
    /// Serve one application over stdin/stdout (spawned by `run`)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Project root directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Config file applied on top of global and project config
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Application to rotate, optionally with its slot length in seconds
    /// (repeatable; replaces the configured rotation)
    #[arg(long = "app", value_name = "KIND[:SECS]")]
    apps: Vec<AppEntry>,

    /// Stop after this many iterations
    #[arg(long)]
    ticks: Option<u64>,

    /// Target frame rate of the render loop
    #[arg(long)]
    fps: Option<u32>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// `hybrid` (by capability) or `process` (always)
    #[arg(long)]
    isolation: Option<IsolationPolicy>,

    /// `terminal` or `null`
    #[arg(long)]
    sink: Option<SinkKind>,
}

#[derive(Args, Debug, Clone)]
struct WorkerArgs {
    /// Application kind from the builtin registry
    #[arg(long)]
    app: String,

    #[arg(long)]
    registration: RegistrationId,

    #[arg(long)]
    width: u32,

    #[arg(long)]
    height: u32,

    #[arg(long)]
    run_id: Option<RunId>,
}

/// Applies `run` flags as the highest-priority configuration layer.
///
/// Only flags that were given override anything.
struct CliConfigResolver {
    apps: Vec<AppEntry>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    isolation: Option<IsolationPolicy>,
    sink: Option<SinkKind>,
}

impl CliConfigResolver {
    fn from_args(args: &RunArgs) -> Self {
        Self {
            apps: args.apps.clone(),
            fps: args.fps,
            width: args.width,
            height: args.height,
            isolation: args.isolation,
            sink: args.sink,
        }
    }
}

impl ConfigResolver for CliConfigResolver {
    fn apply(&self, config: &mut MxosConfig) {
        if !self.apps.is_empty() {
            config.apps.clone_from(&self.apps);
        }
        if let Some(fps) = self.fps {
            config.kernel.fps = fps;
        }
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if let Some(isolation) = self.isolation {
            config.sandbox.isolation = isolation;
        }
        if let Some(sink) = self.sink {
            config.display.sink = sink;
            config.display.simulate = sink == SinkKind::Null;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Apps(args) => list_apps(&args),
        Command::Worker(args) => {
            let code = tokio::task::spawn_blocking(move || worker(&args))
                .await
                .context("worker task panicked")??;
            std::process::exit(code);
        }
    }
}

/// Terminal filter: `--debug` > `--verbose` > `RUST_LOG` > `warn`.
fn init_tracing(cli: &Cli) {
    let terminal_filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let terminal_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(terminal_filter);

    let file = cli.log_file.as_deref().and_then(|path| match tracing_writer::LogFile::open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", path.display());
            None
        }
    });

    if let Some(file) = file {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(file)
            .with_filter(EnvFilter::new("debug"));
        tracing_subscriber::registry()
            .with(terminal_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(terminal_layer).init();
    }
}

fn load_config(args: &ConfigArgs, resolver: &dyn ConfigResolver) -> Result<MxosConfig> {
    let project_root = match &args.project {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let mut loader = ConfigLoader::new().with_project_root(&project_root);
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    let mut config = loader.load().context("config error")?;
    resolver.apply(&mut config);
    info!(path = %project_root.display(), "project root");
    Ok(config)
}

fn open_sink(config: &MxosConfig) -> Box<dyn DisplaySink> {
    match config.display.effective_sink() {
        SinkKind::Null => Box::new(NullSink::new()),
        SinkKind::Terminal => {
            Box::new(TerminalSink::new(io::stdout()).with_brightness(config.display.brightness))
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let resolver = CliConfigResolver::from_args(&args);
    let config = load_config(&args.config, &resolver)?;
    let registry = builtin_registry();

    let entries: Vec<AppEntry> = if config.apps.is_empty() {
        registry.kinds().map(AppEntry::new).collect()
    } else {
        config.apps.clone()
    };

    let mut kernel = KernelBuilder::new()
        .with_dimensions(config.dimensions())
        .with_config(config.kernel_config())
        .with_bus_config(config.bus_config())
        .with_sandbox_config(config.sandbox_config())
        .with_sink(open_sink(&config))
        .with_registry(registry)
        .build()
        .context("cannot build kernel")?;

    for entry in &entries {
        let duration = config.duration_of(entry);
        let id = kernel
            .register_kind(&entry.kind, duration)
            .with_context(|| format!("cannot register '{}'", entry.kind))?;
        info!(%id, kind = %entry.kind, ?duration, "scheduled");
    }

    let shutdown = kernel.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.request();
        }
    });

    let ticks = args.ticks;
    let summary: RunSummary = tokio::task::spawn_blocking(move || kernel.run_for(ticks))
        .await
        .context("render loop panicked")??;

    if !summary.shutdown.is_clean() {
        warn!(
            forced = ?summary.shutdown.forced,
            abandoned = ?summary.shutdown.abandoned,
            "unclean shutdown"
        );
    }
    println!("stats: {}", summary.stats);
    Ok(())
}

fn list_apps(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args, &mxos_runtime::NoOpResolver)?;
    let registry = builtin_registry();
    for kind in registry.kinds() {
        let Some(manifest) = registry.manifest(kind) else {
            continue;
        };
        let isolation = config.sandbox.isolation.isolation_for(manifest.capabilities);
        let capabilities = if manifest.capabilities.is_empty() {
            "-".to_string()
        } else {
            manifest.capabilities.to_string()
        };
        println!(
            "{kind:<14} {:<7} {:>3} fps  {isolation:<8} {capabilities:<20} {}",
            manifest.version, manifest.frame_rate, manifest.description
        );
    }
    Ok(())
}

/// Returns the process exit code.
fn worker(args: &WorkerArgs) -> Result<i32> {
    let registry = builtin_registry();
    let (implementation, _manifest) = registry
        .resolve(&args.app)
        .with_context(|| format!("worker cannot run '{}'", args.app))?;
    let dimensions = Dimensions::new(args.width, args.height);
    if dimensions.is_empty() {
        anyhow::bail!("worker display size {dimensions} is empty");
    }
    let ctx = AppContext::new(dimensions, args.registration);
    info!(
        id = %args.registration,
        kind = %args.app,
        run_id = ?args.run_id,
        pid = std::process::id(),
        "worker process started"
    );

    let exit = serve_stdio(&implementation, &ctx, BufReader::new(io::stdin()), io::stdout());
    info!(id = %args.registration, ?exit, "worker process exiting");
    Ok(exit.exit_code())
}
