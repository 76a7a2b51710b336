//! Line-oriented control panel.
//!
//! Mirrors the three buttons of a flight panel (move to setpoint, return to
//! home, emergency) plus status and trajectory readouts. Core failures are
//! shown to the user and the session keeps going with the post-failure state.

use std::io::{BufRead, Write};

use hover_core::params::{self, ParamSpec};
use hover_core::{Drone, TelemetrySink};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Setpoint(f64),
    ReturnToHome,
    Emergency,
    Status,
    History,
    /// One parameter by key, or all of them.
    Params(Option<ParamSpec>),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let cmd = match head {
            "setpoint" | "sp" | "move" => {
                let value = words
                    .next()
                    .ok_or_else(|| "usage: setpoint <meters>".to_string())?;
                let setpoint = value
                    .parse::<f64>()
                    .map_err(|_| "please enter a valid numeric value".to_string())?;
                Self::Setpoint(setpoint)
            }
            "rth" | "home" => Self::ReturnToHome,
            "emergency" | "land" => Self::Emergency,
            "status" => Self::Status,
            "history" | "trajectory" => Self::History,
            "params" => match words.next() {
                Some(key) => {
                    let spec = params::param_spec(key)
                        .ok_or_else(|| format!("unknown parameter `{key}`; try `params`"))?;
                    Self::Params(Some(spec))
                }
                None => Self::Params(None),
            },
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command `{other}`; try `help`")),
        };
        Ok(Some(cmd))
    }
}

const HELP: &str = "\
commands:
  setpoint <m>   descend to <m> meters under fuzzy control
  rth            return to the origin altitude
  emergency      land immediately (cannot be undone)
  status         altitude, battery and mode
  history        altitude trajectory
  params [key]   configuration, bounds and resolution
  quit";

pub fn run<S, R, W>(drone: &mut Drone<S>, input: R, out: &mut W) -> anyhow::Result<()>
where
    S: TelemetrySink,
    R: BufRead,
    W: Write,
{
    writeln!(out, "Fuzzy drone control. Type `help` for commands.")?;
    print_status(drone, out)?;

    for line in input.lines() {
        let line = line?;
        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                writeln!(out, "Error: {msg}")?;
                continue;
            }
        };

        match cmd {
            Command::Setpoint(setpoint) => match drone.move_to_setpoint(setpoint) {
                Ok(t) if t.interrupted => {
                    writeln!(out, "Descent halted by emergency mode at {:.2} m.", t.altitude)?
                }
                Ok(t) if t.altitude == setpoint => writeln!(out, "Setpoint {setpoint} m reached!")?,
                Ok(t) => writeln!(
                    out,
                    "Already below the setpoint; holding at {:.2} m.",
                    t.altitude
                )?,
                Err(err) => {
                    warn!(%err, "descent failed");
                    writeln!(out, "Error: {err}")?;
                }
            },
            Command::ReturnToHome => match drone.return_to_home() {
                Ok(t) if t.interrupted => {
                    writeln!(out, "Return halted by emergency mode at {:.2} m.", t.altitude)?
                }
                Ok(_) => writeln!(out, "Drone returned to the origin altitude.")?,
                Err(err) => {
                    warn!(%err, "return to home failed");
                    writeln!(out, "Error: {err}")?;
                }
            },
            Command::Emergency => {
                drone.emergency_landing();
                writeln!(out, "Emergency mode active! Recharge the drone.")?;
            }
            Command::Status => {}
            Command::History => print_history(drone, out)?,
            Command::Params(spec) => print_params(drone, spec, out)?,
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => break,
        }

        if matches!(
            cmd,
            Command::Setpoint(_) | Command::ReturnToHome | Command::Emergency | Command::Status
        ) {
            print_status(drone, out)?;
        }
    }

    info!(samples = drone.history().len(), "shell closed");
    Ok(())
}

fn print_status<S: TelemetrySink, W: Write>(drone: &Drone<S>, out: &mut W) -> anyhow::Result<()> {
    let state = drone.state();
    writeln!(
        out,
        "Altitude: {:.2} m | Battery: {:.2}% | Mode: {}",
        state.altitude(),
        state.battery(),
        state.mode().label()
    )?;
    Ok(())
}

fn print_history<S: TelemetrySink, W: Write>(drone: &Drone<S>, out: &mut W) -> anyhow::Result<()> {
    let origin = drone.state().origin();
    writeln!(out, "iteration  altitude (m)   [origin {origin:.0} m, ground 0 m]")?;
    for (i, altitude) in drone.history().iter().enumerate() {
        writeln!(out, "{i:>9}  {altitude:>12.2}")?;
    }
    Ok(())
}

fn print_params<S: TelemetrySink, W: Write>(
    drone: &Drone<S>,
    only: Option<ParamSpec>,
    out: &mut W,
) -> anyhow::Result<()> {
    let specs = match only {
        Some(spec) => vec![spec],
        None => params::ALL.to_vec(),
    };
    for spec in specs {
        let Some(value) = drone.config().get(spec.name) else {
            continue;
        };
        writeln!(
            out,
            "{:<24} {:>8.2}   [{} .. {}, step {}]",
            spec.label, value, spec.min, spec.max, spec.step
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hover_core::{DroneConfig, RecordingSink};
    use std::io::Cursor;

    fn session(script: &str, config: DroneConfig) -> (Drone<RecordingSink>, String) {
        let mut drone = Drone::new(config, RecordingSink::new()).unwrap();
        let mut out = Vec::new();
        run(&mut drone, Cursor::new(script), &mut out).unwrap();
        (drone, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("setpoint 40"), Ok(Some(Command::Setpoint(40.0))));
        assert_eq!(Command::parse("  rth "), Ok(Some(Command::ReturnToHome)));
        assert_eq!(Command::parse(""), Ok(None));
        assert!(Command::parse("setpoint").is_err());
        assert!(Command::parse("fly").is_err());
        assert_eq!(Command::parse("params"), Ok(Some(Command::Params(None))));
        assert_eq!(
            Command::parse("params u_max"),
            Ok(Some(Command::Params(Some(params::drone::U_MAX))))
        );
        assert!(Command::parse("params thrust").is_err());
    }

    #[test]
    fn test_non_numeric_setpoint_is_shell_error() {
        let (drone, out) = session("setpoint abc\n", DroneConfig::default());
        assert!(out.contains("Error: please enter a valid numeric value"));
        assert_eq!(drone.history().len(), 1);
    }

    #[test]
    fn test_mission_session() {
        let (drone, out) = session(
            "setpoint 40\nrth\nemergency\nsetpoint 10\nhistory\nquit\nsetpoint 5\n",
            DroneConfig::default(),
        );
        assert!(out.contains("Setpoint 40 m reached!"));
        assert!(out.contains("Drone returned to the origin altitude."));
        assert!(out.contains("Emergency mode active!"));
        assert!(out.contains("Mode: Emergency"));
        assert!(out.contains("Already below the setpoint; holding at 0.00 m."));
        assert!(out.contains("iteration  altitude (m)"));
        assert_eq!(drone.altitude(), 0.0);
        assert!(drone.emergency_active());
        // `setpoint 5` after quit never ran
        assert!(!out.contains("Setpoint 5 m"));
    }

    #[test]
    fn test_core_errors_are_reported() {
        let config = DroneConfig {
            initial_battery: 0.0,
            ..DroneConfig::default()
        };
        let (drone, out) = session("setpoint -5\nrth\nemergency\n", config);
        assert!(out.contains("Error: battery depleted"));
        assert_eq!(drone.altitude(), 0.0);
    }

    #[test]
    fn test_params_listing() {
        let (_, out) = session("params\n", DroneConfig::default());
        assert!(out.contains("Umax (m/s)"));
        assert!(out.contains("Initial Battery (%)"));
        assert!(out.contains("[0.1 .. 20, step 0.1]"));
    }

    #[test]
    fn test_single_param_by_key() {
        let config = DroneConfig {
            u_max: 4.5,
            ..DroneConfig::default()
        };
        let (_, out) = session("params u_max
params initial_altitude
params thrust
", config);
        assert!(out.contains("Umax (m/s)                   4.50   [0.1 .. 20, step 0.1]"));
        assert!(out.contains("Initial Altitude (m)       100.00   [1 .. 500, step 1]"));
        assert!(!out.contains("Adjustment Factor"));
        assert!(out.contains("Error: unknown parameter `thrust`"));
    }
}
