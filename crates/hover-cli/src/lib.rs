//! Hover CLI - batch front end for the drone simulator.
//!
//! Runs a mission plan or a setpoint sweep and exports the trajectory.

pub mod plan;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use hover_core::{
    Drone, DroneConfig, DroneError, DroneState, FrameRecorder, NullSink, TelemetryError,
    TelemetrySink, TracingSink, Transition,
};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use plan::MissionStep;

/// Log filter used when `RUST_LOG` is unset. Telemetry samples are `debug`
/// events on `hover::telemetry`, so that target is raised to stay visible.
pub const DEFAULT_LOG_FILTER: &str = "info,hover::telemetry=debug";

/// Public function that can be called from the main binary
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let args = Args::parse_from(args);
    main_inner(args)
}

#[derive(Parser, Debug)]
#[command(name = "hover-cli")]
#[command(about = "Fuzzy altitude-control drone simulator")]
#[command(version)]
pub struct Args {
    /// Output directory
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Output file format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Drone configuration as JSON (replaces the drone flags below)
    #[arg(long)]
    config: Option<PathBuf>,

    // ── Drone parameters ──────────────────────────────────────
    #[arg(long, default_value_t = 3.0)]
    max_speed: f64,

    /// FA
    #[arg(long, default_value_t = 1.0)]
    adjustment_factor: f64,

    /// Umax
    #[arg(long, default_value_t = 3.0)]
    u_max: f64,

    #[arg(long, default_value_t = 100.0)]
    initial_battery: f64,

    // ── Mission ───────────────────────────────────────────────
    /// Steps to run in order: `descend:<m>`, `rth`, `emergency`
    #[arg(long, value_delimiter = ' ', default_values = ["descend:50", "rth"])]
    plan: Vec<MissionStep>,

    /// Where per-step telemetry goes (`log` prints on the `hover::telemetry` target)
    #[arg(long, value_enum, default_value = "log")]
    telemetry: TelemetryMode,

    // ── Sweep options ─────────────────────────────────────────
    /// Descend to a range of setpoints instead of running the plan
    #[arg(long, conflicts_with_all = ["plan", "telemetry"])]
    sweep: bool,

    #[arg(long, default_value_t = 0.0)]
    sweep_from: f64,

    #[arg(long, default_value_t = 90.0)]
    sweep_to: f64,

    #[arg(long, default_value_t = 10)]
    sweep_steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TelemetryMode {
    /// Emit samples as debug-level log events
    Log,
    /// Record packed frames to telemetry.bin
    Frames,
    None,
}

/// Sink picked at runtime from `--telemetry`.
enum CliSink {
    Log(TracingSink),
    Frames(FrameRecorder),
    Silent(NullSink),
}

impl CliSink {
    fn new(mode: TelemetryMode) -> Self {
        match mode {
            TelemetryMode::Log => Self::Log(TracingSink),
            TelemetryMode::Frames => Self::Frames(FrameRecorder::new()),
            TelemetryMode::None => Self::Silent(NullSink),
        }
    }
}

impl TelemetrySink for CliSink {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), TelemetryError> {
        match self {
            Self::Log(sink) => sink.publish(topic, value),
            Self::Frames(sink) => sink.publish(topic, value),
            Self::Silent(sink) => sink.publish(topic, value),
        }
    }
}

pub fn main_inner(args: Args) -> Result<()> {
    println!("Hover Drone Simulator (fuzzy altitude control)");
    println!("==============================================\n");

    if args.sweep {
        run_sweep(&args)?;
    } else {
        run_plan(&args)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Plan Run
// ---------------------------------------------------------------------------

/// Everything exported for a plan run.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    config: &'a DroneConfig,
    state: &'a DroneState,
    transitions: &'a [Transition],
    failure: Option<String>,
}

fn run_plan(args: &Args) -> Result<()> {
    let config = build_drone_config(args)?;
    let mut drone = Drone::new(config, CliSink::new(args.telemetry))?;
    info!(steps = args.plan.len(), "running plan");

    let mut transitions = Vec::with_capacity(args.plan.len());
    let mut failure: Option<(MissionStep, DroneError)> = None;

    for &step in &args.plan {
        let result = match step {
            MissionStep::Descend(setpoint) => drone.move_to_setpoint(setpoint),
            MissionStep::ReturnToHome => drone.return_to_home(),
            MissionStep::Emergency => Ok(drone.emergency_landing()),
        };

        match result {
            Ok(t) => {
                println!(
                    "{:<14} {:>5} steps -> altitude {:>7.2} m, battery {:>6.2} %{}",
                    step.to_string(),
                    t.steps,
                    t.altitude,
                    t.battery,
                    if t.interrupted { " (interrupted)" } else { "" }
                );
                transitions.push(t);
            }
            Err(err) => {
                warn!(%step, %err, "plan stopped");
                println!("{:<14} failed: {}", step.to_string(), err);
                failure = Some((step, err));
                break;
            }
        }
    }

    print_run_stats(drone.state());

    let summary = RunSummary {
        config: drone.config(),
        state: drone.state(),
        transitions: &transitions,
        failure: failure.as_ref().map(|(step, err)| format!("{step}: {err}")),
    };
    write_output(args, &summary)?;

    if let CliSink::Frames(recorder) = drone.into_sink() {
        write_frames(&args.output_dir, &recorder)?;
    }

    if let Some((step, err)) = failure {
        bail!("plan stopped at `{step}`: {err}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sweep Run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct SweepRow {
    setpoint: f64,
    steps: usize,
    battery_used: f64,
    final_altitude: f64,
    status: String,
}

fn sweep_setpoints(from: f64, to: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![from],
        n => (0..n)
            .map(|i| from + (to - from) * (i as f64 / (n - 1) as f64))
            .collect(),
    }
}

fn sweep_one(config: DroneConfig, setpoint: f64) -> Result<SweepRow> {
    let mut drone = Drone::new(config, NullSink)?;
    let (steps, status) = match drone.move_to_setpoint(setpoint) {
        Ok(t) => (t.steps, "ok".to_string()),
        Err(err) => (drone.history().len() - 1, err.to_string()),
    };
    Ok(SweepRow {
        setpoint,
        steps,
        battery_used: config.initial_battery - drone.battery(),
        final_altitude: drone.altitude(),
        status,
    })
}

fn run_sweep(args: &Args) -> Result<()> {
    if args.sweep_steps == 0 {
        bail!("--sweep-steps must be at least 1");
    }
    let config = build_drone_config(args)?;
    let setpoints = sweep_setpoints(args.sweep_from, args.sweep_to, args.sweep_steps);
    println!(
        "Sweeping setpoint {:.1} m -> {:.1} m in {} runs",
        args.sweep_from, args.sweep_to, args.sweep_steps
    );

    let mut rows = Vec::with_capacity(setpoints.len());
    for (i, &setpoint) in setpoints.iter().enumerate() {
        let row = sweep_one(config, setpoint)?;
        println!(
            "Run {}/{} | Setpoint: {:.1} m -> {} steps, battery used {:.2} % ({})",
            i + 1,
            setpoints.len(),
            row.setpoint,
            row.steps,
            row.battery_used,
            row.status
        );
        rows.push(row);
    }

    std::fs::create_dir_all(&args.output_dir)?;
    let path = args.output_dir.join("sweep_summary.csv");
    let mut wtr = csv::Writer::from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record(["setpoint", "steps", "battery_used", "final_altitude", "status"])?;
    for row in &rows {
        wtr.write_record([
            format!("{:.2}", row.setpoint),
            row.steps.to_string(),
            format!("{:.4}", row.battery_used),
            format!("{:.4}", row.final_altitude),
            row.status.clone(),
        ])?;
    }
    wtr.flush()?;

    println!("\nSweep complete. Summary at {:?}", path);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_drone_config(args: &Args) -> Result<DroneConfig> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => DroneConfig {
            max_speed: args.max_speed,
            adjustment_factor: args.adjustment_factor,
            u_max: args.u_max,
            initial_battery: args.initial_battery,
            ..DroneConfig::default()
        },
    };
    config.validate()?;
    Ok(config)
}

/// Read a [`DroneConfig`] from JSON. Missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<DroneConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn print_run_stats(state: &DroneState) {
    println!("\nRun Stats:");
    println!("  Samples:  {}", state.history().len());
    println!("  Altitude: {:.2} m", state.altitude());
    println!("  Battery:  {:.2} %", state.battery());
    println!("  Mode:     {}", state.mode().label());
    println!("-----------------------------");
}

fn write_output(args: &Args, summary: &RunSummary<'_>) -> Result<()> {
    std::fs::create_dir_all(&args.output_dir)?;

    let path = match args.format {
        OutputFormat::Csv => {
            let path = args.output_dir.join("history.csv");
            let mut wtr = csv::Writer::from_path(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            wtr.write_record(["step", "altitude"])?;
            for (i, altitude) in summary.state.history().iter().enumerate() {
                wtr.write_record([i.to_string(), format!("{:.4}", altitude)])?;
            }
            wtr.flush()?;
            path
        }
        OutputFormat::Json => {
            let path = args.output_dir.join("run.json");
            std::fs::write(&path, serde_json::to_string_pretty(summary)?)
                .with_context(|| format!("writing {}", path.display()))?;
            path
        }
    };

    println!("Data written to {:?}", path);
    Ok(())
}

fn write_frames(dir: &Path, recorder: &FrameRecorder) -> Result<()> {
    let path = dir.join("telemetry.bin");
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    recorder.write_to(BufWriter::new(file))?;
    println!("{} telemetry frames written to {:?}", recorder.frames().len(), path);
    Ok(())
}
