use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{DepletionPoint, DroneError, Result};
use crate::fuzzy::FuzzyController;
use crate::params;
use crate::telemetry::{TelemetrySink, ALTITUDE_TOPIC, BATTERY_TOPIC};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Meters descended per unit of fuzzy motor power, per step.
pub const DESCENT_GAIN: f64 = 0.05;
/// Battery percent per meter descended.
pub const DESCENT_COST: f64 = 0.5;
/// Battery percent per meter climbed.
pub const ASCENT_COST: f64 = 1.0;
/// Climb per step is `ASCENT_RATE * u_max * adjustment_factor`.
pub const ASCENT_RATE: f64 = 0.1;
/// Meters dropped per emergency step.
pub const EMERGENCY_STEP: f64 = 2.0;

// ---------------------------------------------------------------------------
// Enums & Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Maneuver {
    Descend,
    ReturnToHome,
    EmergencyLanding,
}

impl Maneuver {
    pub fn label(self) -> &'static str {
        match self {
            Self::Descend => "descent",
            Self::ReturnToHome => "return to home",
            Self::EmergencyLanding => "emergency landing",
        }
    }
}

impl fmt::Display for Maneuver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse flight mode, derived from the state on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlightMode {
    /// Emergency latched; only emergency landing still moves the drone.
    Emergency,
    Grounded,
    Home,
    Holding,
}

impl FlightMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Emergency => "Emergency",
            Self::Grounded => "Grounded",
            Self::Home => "Home",
            Self::Holding => "Holding",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DroneConfig {
    /// Airframe speed limit. Reported, not used by any transition.
    pub max_speed: f64,
    /// FA, scales the return-to-home climb.
    pub adjustment_factor: f64,
    /// Umax, scales the return-to-home climb.
    pub u_max: f64,
    /// Starting altitude, which is also the home altitude.
    pub initial_altitude: f64,
    pub initial_battery: f64,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            max_speed: 3.0,
            adjustment_factor: 1.0,
            u_max: 3.0,
            initial_altitude: 100.0,
            initial_battery: 100.0,
        }
    }
}

impl DroneConfig {
    pub fn new(max_speed: f64, adjustment_factor: f64, u_max: f64) -> Self {
        Self {
            max_speed,
            adjustment_factor,
            u_max,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for spec in &params::ALL {
            if let Some(value) = self.get(spec.name) {
                spec.check(value)?;
            }
        }
        Ok(())
    }

    /// Value of a field by its configuration key.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "max_speed" => Some(self.max_speed),
            "adjustment_factor" => Some(self.adjustment_factor),
            "u_max" => Some(self.u_max),
            "initial_altitude" => Some(self.initial_altitude),
            "initial_battery" => Some(self.initial_battery),
            _ => None,
        }
    }

    /// Meters climbed per return-to-home step.
    pub fn climb_step(&self) -> f64 {
        ASCENT_RATE * self.u_max * self.adjustment_factor
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Altitude, battery and trajectory of one simulation session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroneState {
    altitude: f64,
    origin: f64,
    /// Every altitude the drone has held, starting with the initial one.
    history: Vec<f64>,
    battery: f64,
    emergency_active: bool,
}

impl DroneState {
    pub(crate) fn new(initial_altitude: f64, battery: f64) -> Self {
        Self {
            altitude: initial_altitude,
            origin: initial_altitude,
            history: vec![initial_altitude],
            battery,
            emergency_active: false,
        }
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn battery(&self) -> f64 {
        self.battery
    }

    pub fn emergency_active(&self) -> bool {
        self.emergency_active
    }

    pub fn mode(&self) -> FlightMode {
        if self.emergency_active {
            FlightMode::Emergency
        } else if self.altitude <= 0.0 {
            FlightMode::Grounded
        } else if self.altitude == self.origin {
            FlightMode::Home
        } else {
            FlightMode::Holding
        }
    }

    /// Change between the last two history samples, 0 with fewer than two.
    fn last_delta(&self) -> f64 {
        match self.history.as_slice() {
            [.., prev, last] => last - prev,
            _ => 0.0,
        }
    }

    fn record(&mut self, altitude: f64) {
        self.altitude = altitude;
        self.history.push(altitude);
    }
}

/// Outcome of a transition that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub maneuver: Maneuver,
    /// Loop iterations executed, equal to history entries appended.
    pub steps: usize,
    pub altitude: f64,
    pub battery: f64,
    /// The emergency flag stopped the loop before its target.
    pub interrupted: bool,
}

// ---------------------------------------------------------------------------
// Drone
// ---------------------------------------------------------------------------

/// Simulation context: state, controller and the injected telemetry sink.
///
/// Transitions take `&mut self` and run to completion before returning.
/// Sharing a drone across threads needs a mutex around the whole value.
pub struct Drone<S> {
    config: DroneConfig,
    state: DroneState,
    controller: FuzzyController,
    sink: S,
}

impl<S: TelemetrySink> Drone<S> {
    pub fn new(config: DroneConfig, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: DroneState::new(config.initial_altitude, config.initial_battery),
            controller: FuzzyController::new(),
            config,
            sink,
        })
    }

    pub fn config(&self) -> &DroneConfig {
        &self.config
    }

    pub fn state(&self) -> &DroneState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn altitude(&self) -> f64 {
        self.state.altitude
    }

    pub fn battery(&self) -> f64 {
        self.state.battery
    }

    pub fn history(&self) -> &[f64] {
        &self.state.history
    }

    pub fn emergency_active(&self) -> bool {
        self.state.emergency_active
    }

    /// Descend under fuzzy control until `setpoint` is reached.
    ///
    /// On in-flight depletion the steps already taken stay in the history
    /// and the battery is left at 0.
    pub fn move_to_setpoint(&mut self, setpoint: f64) -> Result<Transition> {
        let maneuver = Maneuver::Descend;
        self.ensure_battery(maneuver)?;
        if setpoint.is_nan() || setpoint < 0.0 {
            return Err(DroneError::InvalidSetpoint(setpoint));
        }

        let mut steps = 0;
        while self.state.altitude > setpoint && !self.state.emergency_active {
            let prev = self.state.altitude;
            let error = prev - self.state.origin;
            let delta_error = self.state.last_delta();

            let inference = self.controller.evaluate(error, delta_error);
            let power = inference
                .centroid
                .unwrap_or(self.controller.fallback_power());
            trace!(
                error,
                delta_error,
                power,
                fallback = inference.centroid.is_none(),
                "descent step"
            );

            let next = (prev - power * DESCENT_GAIN).max(0.0).max(setpoint);
            self.state.record(next);
            steps += 1;

            self.debit(DESCENT_COST * (prev - next), maneuver)?;
            self.publish_status();
        }

        Ok(self.finish(maneuver, steps, self.state.altitude > setpoint))
    }

    /// Climb at the fixed proportional rate back to the origin altitude.
    pub fn return_to_home(&mut self) -> Result<Transition> {
        let maneuver = Maneuver::ReturnToHome;
        self.ensure_battery(maneuver)?;

        let climb = self.config.climb_step();
        let origin = self.state.origin;

        let mut steps = 0;
        while self.state.altitude < origin && !self.state.emergency_active {
            let prev = self.state.altitude;
            let next = (prev + climb).min(origin);
            self.state.record(next);
            steps += 1;

            self.debit(ASCENT_COST * (next - prev), maneuver)?;
            self.publish_status();
        }

        Ok(self.finish(maneuver, steps, self.state.altitude < origin))
    }

    /// Latch the emergency flag and drop to the ground.
    ///
    /// Ignores the battery entirely and cannot fail. There is no way to clear
    /// the flag afterwards; descend and return-to-home become no-ops.
    pub fn emergency_landing(&mut self) -> Transition {
        let maneuver = Maneuver::EmergencyLanding;
        if !self.state.emergency_active {
            warn!(
                altitude = self.state.altitude,
                battery = self.state.battery,
                "emergency mode activated"
            );
        }
        self.state.emergency_active = true;

        let mut steps = 0;
        while self.state.altitude > 0.0 {
            let next = (self.state.altitude - EMERGENCY_STEP).max(0.0);
            self.state.record(next);
            steps += 1;
            self.publish_status();
        }

        self.finish(maneuver, steps, false)
    }

    fn ensure_battery(&self, maneuver: Maneuver) -> Result<()> {
        if self.state.battery <= 0.0 {
            return Err(DroneError::BatteryDepleted {
                maneuver,
                point: DepletionPoint::BeforeStart,
            });
        }
        Ok(())
    }

    fn debit(&mut self, amount: f64, maneuver: Maneuver) -> Result<()> {
        self.state.battery -= amount;
        if self.state.battery <= 0.0 {
            self.state.battery = 0.0;
            warn!(
                altitude = self.state.altitude,
                %maneuver,
                "battery depleted in flight"
            );
            return Err(DroneError::BatteryDepleted {
                maneuver,
                point: DepletionPoint::InFlight,
            });
        }
        Ok(())
    }

    fn publish_status(&mut self) {
        let samples = [
            (ALTITUDE_TOPIC, self.state.altitude),
            (BATTERY_TOPIC, self.state.battery),
        ];
        for (topic, value) in samples {
            if let Err(err) = self.sink.publish(topic, value) {
                warn!(topic, %err, "telemetry publish failed");
            }
        }
    }

    fn finish(&self, maneuver: Maneuver, steps: usize, short_of_target: bool) -> Transition {
        let transition = Transition {
            maneuver,
            steps,
            altitude: self.state.altitude,
            battery: self.state.battery,
            interrupted: short_of_target && self.state.emergency_active,
        };
        debug!(
            %maneuver,
            steps,
            altitude = transition.altitude,
            battery = transition.battery,
            interrupted = transition.interrupted,
            "transition complete"
        );
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelemetryError;
    use crate::telemetry::RecordingSink;

    const TOL: f64 = 1e-9;

    fn drone() -> Drone<RecordingSink> {
        Drone::new(DroneConfig::new(3.0, 1.0, 3.0), RecordingSink::new()).unwrap()
    }

    fn drone_with_battery(battery: f64) -> Drone<RecordingSink> {
        let config = DroneConfig {
            initial_battery: battery,
            ..DroneConfig::default()
        };
        Drone::new(config, RecordingSink::new()).unwrap()
    }

    struct BrokenSink;

    impl TelemetrySink for BrokenSink {
        fn publish(
            &mut self,
            _topic: &str,
            _value: f64,
        ) -> std::result::Result<(), TelemetryError> {
            Err(TelemetryError::Closed)
        }
    }

    #[test]
    fn test_initial_state() {
        let d = drone();
        assert_eq!(d.altitude(), 100.0);
        assert_eq!(d.state().origin(), 100.0);
        assert_eq!(d.history(), &[100.0]);
        assert_eq!(d.battery(), 100.0);
        assert!(!d.emergency_active());
        assert_eq!(d.state().mode(), FlightMode::Home);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DroneConfig {
            u_max: 0.0,
            ..DroneConfig::default()
        };
        let err = Drone::new(config, RecordingSink::new()).err().unwrap();
        assert!(matches!(err, DroneError::InvalidConfig { param: "u_max", .. }));
    }

    #[test]
    fn test_config_keys_cover_params() {
        let config = DroneConfig::new(4.0, 2.0, 6.0);
        for spec in &params::ALL {
            assert!(config.get(spec.name).is_some(), "{}", spec.name);
        }
        assert_eq!(config.get("u_max"), Some(6.0));
        assert_eq!(config.get("adjustment_factor"), Some(2.0));
        assert_eq!(config.get("thrust"), None);

        let config = DroneConfig {
            initial_altitude: 0.0,
            ..DroneConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DroneError::InvalidConfig { param: "initial_altitude", .. })
        ));
    }

    #[test]
    fn test_descend_reaches_setpoint() {
        for setpoint in [0.0, 12.5, 40.0, 50.0, 75.0, 99.0] {
            let mut d = drone();
            let t = d.move_to_setpoint(setpoint).unwrap();
            assert_eq!(d.altitude(), setpoint);
            assert!(d.battery() < 100.0);
            assert!(!t.interrupted);
            assert_eq!(t.steps, d.history().len() - 1);
            assert!(d.history().windows(2).all(|w| w[1] < w[0]), "descent must be monotonic");
        }
    }

    #[test]
    fn test_descend_battery_cost() {
        let mut d = drone();
        d.move_to_setpoint(40.0).unwrap();
        // 0.5 % per meter over 60 m
        assert!((d.battery() - 70.0).abs() < 1e-6);
    }

    #[test]
    fn test_first_descent_step_uses_medium_power() {
        let mut d = drone();
        d.move_to_setpoint(0.0).unwrap();
        // error 0 at the origin -> centroid 50 -> 2.5 m
        assert!((d.history()[1] - 97.5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_setpoint_rejected_without_mutation() {
        let mut d = drone();
        let before = d.state().clone();
        let err = d.move_to_setpoint(-5.0).unwrap_err();
        assert_eq!(err, DroneError::InvalidSetpoint(-5.0));
        assert_eq!(d.state(), &before);
        assert!(d.sink().samples().is_empty());

        assert!(matches!(
            d.move_to_setpoint(f64::NAN),
            Err(DroneError::InvalidSetpoint(_))
        ));
    }

    #[test]
    fn test_empty_battery_rejected_without_mutation() {
        let mut d = drone_with_battery(0.0);
        let before = d.state().clone();
        for _ in 0..3 {
            let err = d.move_to_setpoint(50.0).unwrap_err();
            assert_eq!(
                err,
                DroneError::BatteryDepleted {
                    maneuver: Maneuver::Descend,
                    point: DepletionPoint::BeforeStart,
                }
            );
            assert!(d.return_to_home().unwrap_err().is_battery_depleted());
        }
        assert_eq!(d.state(), &before);
    }

    #[test]
    fn test_battery_checked_before_setpoint() {
        let mut d = drone_with_battery(0.0);
        assert!(d.move_to_setpoint(-1.0).unwrap_err().is_battery_depleted());
    }

    #[test]
    fn test_in_flight_depletion_keeps_progress() {
        let mut d = drone_with_battery(5.0);
        let err = d.move_to_setpoint(0.0).unwrap_err();
        assert_eq!(
            err,
            DroneError::BatteryDepleted {
                maneuver: Maneuver::Descend,
                point: DepletionPoint::InFlight,
            }
        );
        assert_eq!(d.battery(), 0.0);
        assert!(d.altitude() > 0.0 && d.altitude() < 100.0);
        assert_eq!(*d.history().last().unwrap(), d.altitude());
        // The failing step is recorded but not published
        let published = d.sink().values(ALTITUDE_TOPIC);
        assert_eq!(published.len(), d.history().len() - 2);
    }

    #[test]
    fn test_descend_to_current_altitude_is_noop() {
        let mut d = drone();
        d.move_to_setpoint(60.0).unwrap();
        let before = d.state().clone();
        let samples = d.sink().samples().len();

        let t = d.move_to_setpoint(60.0).unwrap();
        assert_eq!(t.steps, 0);
        assert_eq!(d.state(), &before);
        assert_eq!(d.sink().samples().len(), samples);

        // Setpoints above the current altitude are no-ops as well
        assert_eq!(d.move_to_setpoint(80.0).unwrap().steps, 0);
        assert_eq!(d.state(), &before);
    }

    #[test]
    fn test_return_to_home_fixed_climb() {
        let mut d = drone();
        d.move_to_setpoint(50.0).unwrap();
        assert_eq!(d.altitude(), 50.0);

        let start = d.history().len();
        let battery_before = d.battery();
        let t = d.return_to_home().unwrap();

        let climb = &d.history()[start - 1..];
        let n = climb.len();
        assert_eq!(n - 1, t.steps);
        for w in climb[..n - 1].windows(2) {
            assert!((w[1] - w[0] - 0.3).abs() < TOL, "step {} -> {}", w[0], w[1]);
        }
        let last_step = climb[n - 1] - climb[n - 2];
        assert!(last_step > 0.0 && last_step <= 0.3 + TOL);

        assert_eq!(d.altitude(), 100.0);
        assert_eq!(t.steps, 167);
        assert!((battery_before - d.battery() - 50.0).abs() < 1e-6);
        assert_eq!(d.state().mode(), FlightMode::Home);
    }

    #[test]
    fn test_return_to_home_at_origin_is_noop() {
        let mut d = drone();
        let t = d.return_to_home().unwrap();
        assert_eq!(t.steps, 0);
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn test_return_to_home_depletes() {
        // 25 % to descend 50 m, leaving 35 % for a 50 m climb
        let mut d = drone_with_battery(60.0);
        d.move_to_setpoint(50.0).unwrap();
        let err = d.return_to_home().unwrap_err();
        assert_eq!(
            err,
            DroneError::BatteryDepleted {
                maneuver: Maneuver::ReturnToHome,
                point: DepletionPoint::InFlight,
            }
        );
        assert_eq!(d.battery(), 0.0);
        assert!(d.altitude() > 84.0 && d.altitude() < 86.0, "{}", d.altitude());
        assert_eq!(d.state().mode(), FlightMode::Holding);
        assert!(d.return_to_home().unwrap_err().is_battery_depleted());
    }

    #[test]
    fn test_emergency_landing_steps() {
        let mut d = drone();
        d.move_to_setpoint(61.0).unwrap();
        let start_alt = d.altitude();
        let start_len = d.history().len();

        let t = d.emergency_landing();
        let expected = (start_alt / EMERGENCY_STEP).ceil() as usize;
        assert_eq!(t.steps, expected);
        assert_eq!(d.history().len(), start_len + expected);
        assert_eq!(d.altitude(), 0.0);
        assert!(d.emergency_active());
        assert_eq!(d.state().mode(), FlightMode::Emergency);
    }

    #[test]
    fn test_emergency_landing_ignores_battery() {
        let mut d = drone_with_battery(5.0);
        assert!(d.move_to_setpoint(0.0).is_err());
        assert_eq!(d.battery(), 0.0);

        let t = d.emergency_landing();
        assert!(t.steps > 0);
        assert_eq!(d.altitude(), 0.0);
        assert_eq!(d.battery(), 0.0);
    }

    #[test]
    fn test_emergency_is_idempotent() {
        let mut d = drone();
        assert_eq!(d.emergency_landing().steps, 50);
        let len = d.history().len();
        let t = d.emergency_landing();
        assert_eq!(t.steps, 0);
        assert_eq!(d.history().len(), len);
        assert!(d.emergency_active());
    }

    #[test]
    fn test_emergency_has_no_reset() {
        // Deliberate: once latched, nothing clears the flag and the other
        // transitions stop doing anything.
        let mut d = drone();
        d.emergency_landing();

        let t = d.return_to_home().unwrap();
        assert_eq!(t.steps, 0);
        assert!(t.interrupted);
        assert_eq!(d.altitude(), 0.0);

        let t = d.move_to_setpoint(0.0).unwrap();
        assert_eq!(t.steps, 0);
        assert!(!t.interrupted);
        assert!(d.emergency_active());
    }

    #[test]
    fn test_telemetry_per_step() {
        let mut d = drone();
        let t = d.move_to_setpoint(90.0).unwrap();
        let sink = d.sink();
        assert_eq!(sink.samples().len(), 2 * t.steps);
        assert_eq!(sink.samples()[0].topic, ALTITUDE_TOPIC);
        assert_eq!(sink.samples()[1].topic, BATTERY_TOPIC);
        assert_eq!(sink.values(ALTITUDE_TOPIC), d.history()[1..].to_vec());
        assert_eq!(*sink.values(BATTERY_TOPIC).last().unwrap(), d.battery());

        let mut d = drone();
        d.emergency_landing();
        assert_eq!(d.sink().values(ALTITUDE_TOPIC).len(), 50);
        assert_eq!(*d.sink().values(ALTITUDE_TOPIC).last().unwrap(), 0.0);
    }

    #[test]
    fn test_telemetry_failure_does_not_abort() {
        let mut d = Drone::new(DroneConfig::default(), BrokenSink).unwrap();
        let t = d.move_to_setpoint(80.0).unwrap();
        assert!(t.steps > 0);
        assert_eq!(d.altitude(), 80.0);
        d.return_to_home().unwrap();
        assert_eq!(d.altitude(), 100.0);
        d.emergency_landing();
        assert_eq!(d.altitude(), 0.0);
    }

    #[test]
    fn test_history_only_grows() {
        let mut d = drone();
        let mut snapshot = d.history().to_vec();
        let ops: [fn(&mut Drone<RecordingSink>) -> usize; 4] = [
            |d| d.move_to_setpoint(70.0).unwrap().steps,
            |d| d.return_to_home().unwrap().steps,
            |d| d.move_to_setpoint(30.0).unwrap().steps,
            |d| d.emergency_landing().steps,
        ];
        for op in ops {
            let steps = op(&mut d);
            assert_eq!(d.history().len(), snapshot.len() + steps);
            assert_eq!(&d.history()[..snapshot.len()], snapshot.as_slice());
            snapshot = d.history().to_vec();
        }
        assert_eq!(d.history()[0], 100.0);
    }
}
