use core::fmt;

use crate::drone::Maneuver;

/// Where in a maneuver the battery ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepletionPoint {
    /// Battery was already empty when the maneuver was requested.
    BeforeStart,
    /// Battery emptied mid-maneuver; steps taken so far stay recorded.
    InFlight,
}

impl fmt::Display for DepletionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeStart => f.write_str("before start"),
            Self::InFlight => f.write_str("in flight"),
        }
    }
}

/// Failures raised by the drone transitions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DroneError {
    #[error("battery depleted {point} of {maneuver}; activate emergency landing")]
    BatteryDepleted {
        maneuver: Maneuver,
        point: DepletionPoint,
    },
    #[error("invalid setpoint {0} m; enter a value of 0 or above")]
    InvalidSetpoint(f64),
    #[error("{param} = {value} is outside [{min}, {max}]")]
    InvalidConfig {
        param: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl DroneError {
    pub fn is_battery_depleted(&self) -> bool {
        matches!(self, Self::BatteryDepleted { .. })
    }
}

pub type Result<T> = std::result::Result<T, DroneError>;

/// Failures reported by a telemetry sink. The drone logs and drops these.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("telemetry channel closed")]
    Closed,
    #[error("unknown telemetry topic `{0}`")]
    UnknownTopic(String),
    #[error("telemetry I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
