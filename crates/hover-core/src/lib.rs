//! # Hover Core
//!
//! Vertical-axis drone simulation driven by a two-input fuzzy controller.
//! This crate holds everything with real logic in it:
//! - Mamdani fuzzy inference (triangular sets, min/max, centroid)
//! - Drone state model with descend, return-to-home and emergency transitions
//! - Battery depletion rules and their failure paths
//! - Telemetry sinks and the packed telemetry frame
//!
//! Front ends (batch CLI, interactive shell) live in sibling crates and only
//! read state or call the three transitions.

pub mod drone;
pub mod error;
pub mod fuzzy;
pub mod params;
pub mod quantize;
pub mod telemetry;

// Re-export core types
pub use drone::{Drone, DroneConfig, DroneState, FlightMode, Maneuver, Transition};
pub use error::{DepletionPoint, DroneError, Result, TelemetryError};
pub use fuzzy::{FuzzyController, Inference, InputTerm, PowerTerm};
pub use quantize::{TelemetryFrame, FRAME_LEN};
pub use telemetry::{
    FrameRecorder, NullSink, RecordingSink, TelemetrySink, TracingSink, ALTITUDE_TOPIC,
    BATTERY_TOPIC,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
