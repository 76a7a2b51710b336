//! Parameter bounds for drone configuration.

use crate::error::{DroneError, Result};

/// Parameter specification with bounds and step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Configuration key.
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Resolution the value is shown and entered at.
    pub step: f64,
}

impl ParamSpec {
    /// Create a new parameter specification.
    pub const fn new(
        name: &'static str,
        label: &'static str,
        min: f64,
        max: f64,
        step: f64,
    ) -> Self {
        Self {
            name,
            label,
            min,
            max,
            step,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Returns `value` unchanged when in bounds. NaN is never in bounds.
    pub fn check(&self, value: f64) -> Result<f64> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(DroneError::InvalidConfig {
                param: self.name,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Airframe and controller constants.
pub mod drone {
    use super::ParamSpec;

    pub const MAX_SPEED: ParamSpec = ParamSpec::new("max_speed", "Max Speed (m/s)", 0.1, 20.0, 0.1);
    pub const ADJUSTMENT_FACTOR: ParamSpec =
        ParamSpec::new("adjustment_factor", "Adjustment Factor (FA)", 0.1, 5.0, 0.1);
    pub const U_MAX: ParamSpec = ParamSpec::new("u_max", "Umax (m/s)", 0.1, 20.0, 0.1);
}

/// Initial conditions.
pub mod initial {
    use super::ParamSpec;

    pub const ALTITUDE: ParamSpec =
        ParamSpec::new("initial_altitude", "Initial Altitude (m)", 1.0, 500.0, 1.0);
    pub const BATTERY: ParamSpec =
        ParamSpec::new("initial_battery", "Initial Battery (%)", 0.0, 100.0, 1.0);
}

/// Every bounded parameter, in display order.
pub const ALL: [ParamSpec; 5] = [
    drone::MAX_SPEED,
    drone::ADJUSTMENT_FACTOR,
    drone::U_MAX,
    initial::ALTITUDE,
    initial::BATTERY,
];

/// Look up a parameter specification by configuration key.
pub fn param_spec(name: &str) -> Option<ParamSpec> {
    ALL.iter().find(|spec| spec.name == name).copied()
}
