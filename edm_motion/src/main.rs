//! # EDM Motion Core
//!
//! Loads the motion configuration, builds the HAL backend and runs the
//! cyclic thread controller on a dedicated RT thread until Ctrl-C.
//!
//! With `--demo` a scripted job is submitted once EtherCAT is ready:
//! a rapid move to the start point followed by a servo feed with jumps
//! along a short polyline, with every motion signal logged as it arrives.

use clap::Parser;
use edm_common::axis::AxisVec;
use edm_common::consts::DEFAULT_CONFIG_PATH;
use edm_common::motion::command::{CommandOutcome, MotionCommand, Waypoints};
use edm_common::motion::config::MotionConfig;
use edm_common::motion::plan::JumpParam;
use edm_common::motion::status::{EcatState, MainMode};
use edm_hal::create_backend;
use edm_motion::config::load_config;
use edm_motion::{ControllerHandle, CyclicThreadController, spawn_signal_pump};
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Wait for EtherCAT Ready before giving up on the demo job.
const DEMO_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome wait per submitted command.
const COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

/// EDM Motion Core - real-time motion controller
#[derive(Parser, Debug)]
#[command(name = "edm_motion")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Deterministic RT motion core for EDM machines")]
struct Args {
    /// Path to the motion configuration TOML. Falls back to the system
    /// config when present, built-in defaults otherwise.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the CPU core of the RT thread.
    #[arg(long)]
    cpu_core: Option<usize>,

    /// Override the SCHED_FIFO priority of the RT thread.
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Submit a scripted rapid + servo-feed job once EtherCAT is ready.
    #[arg(long)]
    demo: bool,

    /// Shut down after this many cycles.
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let path = args
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()));
    let config = match path {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("FATAL: {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => MotionConfig::default(),
    };
    if args.print_config {
        match toml::to_string_pretty(&config) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("FATAL: cannot serialise config: {e}");
                process::exit(1);
            }
        }
        return;
    }
    setup_tracing(&args, &config);

    info!("EDM Motion Core v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("EDM Motion Core shutdown complete");
}

fn run(args: &Args, mut config: MotionConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(core) = args.cpu_core {
        config.rt.cpu_core = core;
    }
    if let Some(priority) = args.rt_priority {
        config.rt.priority = priority;
    }
    info!(
        cycle_time_us = config.cycle_time_us,
        axes = config.axis_count,
        cpu_core = config.rt.cpu_core,
        priority = config.rt.priority,
        "config OK"
    );

    let (net, mut io) = create_backend(&config);
    if args.demo {
        io.set_feed_rate(2.0);
    }

    let controller = CyclicThreadController::new(&config, net, io);
    let (handle, rt_thread) = controller.spawn(&config.rt)?;

    let h = handle.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        h.request_shutdown();
    })?;

    let json = args.json;
    let pump = spawn_signal_pump(handle.clone(), Duration::from_millis(10), move |signal| {
        if json {
            match serde_json::to_string(&signal) {
                Ok(payload) => info!(signal = %payload, "motion signal"),
                Err(e) => warn!(error = %e, "cannot serialise signal"),
            }
            return;
        }
        info!(
            kind = ?signal.kind,
            cycle = signal.status.cycle,
            mode = ?signal.status.main_mode,
            state = ?signal.status.auto_state,
            "motion signal"
        );
    })?;

    if args.demo {
        if let Err(e) = run_demo(&handle, &config) {
            warn!("demo aborted: {e}");
        }
    }
    if let Some(cycles) = args.cycles {
        while handle.status().cycle < cycles && !handle.is_exited() {
            thread::sleep(Duration::from_millis(10));
        }
        info!(cycles, "cycle limit reached");
        handle.request_shutdown();
    }

    let result = match rt_thread.join() {
        Ok(result) => result.map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(_) => Err("RT thread panicked".into()),
    };
    if pump.join().is_err() {
        warn!("signal pump panicked");
    }

    let status = handle.status();
    info!(
        cycles = status.timing.cycle_count,
        overruns = status.timing.overruns,
        max_cycle_ns = status.timing.max_cycle_ns,
        dropped_signals = handle.signals_dropped(),
        "final status"
    );
    result
}

/// Connect if needed, rapid to the start point, then servo-feed with jumps
/// along an L-shaped path.
fn run_demo(handle: &ControllerHandle, config: &MotionConfig) -> Result<(), String> {
    if !config.ethercat.auto_connect {
        submit(handle, MotionCommand::ConnectEthercat)?;
    }
    let deadline = Instant::now() + DEMO_READY_TIMEOUT;
    while handle.status().ecat_state != EcatState::Ready {
        if handle.is_exited() || Instant::now() > deadline {
            return Err("EtherCAT not ready".into());
        }
        thread::sleep(Duration::from_millis(20));
    }

    let blu = config.blu_per_mm;
    if !config.jump.is_enabled() {
        let jump = JumpParam {
            retract_height: 0.5 * blu,
            dwell_ms: 5,
            buffer_distance: 0.1 * blu,
            plan: config.jump.plan,
        };
        submit(handle, MotionCommand::SetJumpParam(jump))?;
    }
    let start = AxisVec::from_mm(&[5.0, 5.0, 0.0], blu);
    let mut waypoints = Waypoints::new();
    for mm in [[5.0, 5.0, -2.0], [8.0, 5.0, -2.0]] {
        waypoints
            .push(AxisVec::from_mm(&mm, blu))
            .map_err(|_| "too many waypoints".to_string())?;
    }

    let accepted_at = submit(
        handle,
        MotionCommand::StartRapidMove { target: start, plan: config.rapid, touch_detect: false },
    )?;
    wait_idle(handle, accepted_at)?;
    let accepted_at = submit(handle, MotionCommand::StartServoFeed { waypoints })?;
    wait_idle(handle, accepted_at)?;
    info!("demo job finished");
    Ok(())
}

/// Submit and wait for the outcome. Returns the status cycle seen right
/// after acceptance.
fn submit(handle: &ControllerHandle, command: MotionCommand) -> Result<u64, String> {
    let name = command.name();
    let ticket = handle.submit(command);
    match handle.wait_outcome(&ticket, COMMAND_TIMEOUT) {
        CommandOutcome::Accepted => Ok(handle.status().cycle),
        outcome => Err(format!("{name}: {outcome:?}")),
    }
}

/// Block until a status newer than `after` shows the dispatcher back in
/// Idle, or the controller exits.
fn wait_idle(handle: &ControllerHandle, after: u64) -> Result<(), String> {
    loop {
        let status = handle.status();
        if status.cycle > after && status.main_mode == MainMode::Idle {
            return Ok(());
        }
        if handle.is_exited() {
            return Err("controller exited".into());
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, config: &MotionConfig) {
    let level = if args.verbose { "debug" } else { config.log_level.as_directive() };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
