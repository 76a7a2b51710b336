//! Hover - fuzzy altitude-control drone simulator

mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hover_core::{Drone, DroneConfig, TracingSink};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "hover")]
#[command(about = "Drone altitude simulator with a fuzzy-logic controller")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CLI batch/sweep mode
    Cli {
        /// Pass remaining arguments to hover-cli
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Interactive control panel on stdin/stdout
    Shell {
        /// Drone configuration as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The shell prints its own status lines, batch runs log progress
    let default_filter = match cli.command {
        Some(Commands::Cli { .. }) => hover_cli::DEFAULT_LOG_FILTER,
        _ => "warn",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Some(Commands::Cli { args }) => {
            // Pass through to hover-cli
            let cli_args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
            run_cli(&cli_args)
        }
        Some(Commands::Shell { config }) => run_shell(config),
        None => {
            // Default to the interactive panel
            run_shell(None)
        }
    }
}

fn run_cli(args: &[&str]) -> anyhow::Result<()> {
    let mut full_args = vec!["hover-cli"];
    full_args.extend(args);

    match hover_cli::run_cli_main(&full_args) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("CLI error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run_shell(config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => hover_cli::load_config(&path)?,
        None => DroneConfig::default(),
    };
    let mut drone = Drone::new(config, TracingSink)?;
    tracing::info!(altitude = drone.altitude(), battery = drone.battery(), "shell started");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    shell::run(&mut drone, stdin.lock(), &mut stdout)
}
