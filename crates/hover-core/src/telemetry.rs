//! Outbound telemetry.
//!
//! The drone publishes its altitude and battery after every simulation step.
//! Delivery is best-effort: a sink may fail, and the drone only logs it.

use std::io::Write;

use crate::error::TelemetryError;
use crate::quantize::TelemetryFrame;

pub const ALTITUDE_TOPIC: &str = "drone/altitude";
pub const BATTERY_TOPIC: &str = "drone/battery";

pub trait TelemetrySink {
    /// Fire-and-forget publish. Must not block or retry.
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), TelemetryError>;
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for &mut S {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), TelemetryError> {
        (**self).publish(topic, value)
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), TelemetryError> {
        (**self).publish(topic, value)
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&mut self, _topic: &str, _value: f64) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Emits each sample as a `tracing` event on the `hover::telemetry` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), TelemetryError> {
        tracing::debug!(target: "hover::telemetry", topic, value, "publish");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub topic: String,
    pub value: f64,
}

/// Keeps every published sample in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    samples: Vec<Sample>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Values published on one topic, in order.
    pub fn values(&self, topic: &str) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| s.value)
            .collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl TelemetrySink for RecordingSink {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), TelemetryError> {
        self.samples.push(Sample {
            topic: topic.to_owned(),
            value,
        });
        Ok(())
    }
}

/// Pairs altitude and battery samples into packed [`TelemetryFrame`]s.
///
/// An altitude sample opens a frame, the next battery sample closes it. A
/// battery sample with no open frame is dropped.
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    frames: Vec<TelemetryFrame>,
    pending_altitude: Option<f64>,
    seq: u16,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[TelemetryFrame] {
        &self.frames
    }

    /// All frames back to back.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.frames
            .iter()
            .flat_map(|f| f.encode().iter().copied())
            .collect()
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), TelemetryError> {
        for frame in &self.frames {
            writer.write_all(frame.encode())?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl TelemetrySink for FrameRecorder {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), TelemetryError> {
        match topic {
            ALTITUDE_TOPIC => {
                self.pending_altitude = Some(value);
            }
            BATTERY_TOPIC => {
                if let Some(altitude) = self.pending_altitude.take() {
                    self.frames.push(TelemetryFrame::new(self.seq, altitude, value));
                    self.seq = self.seq.wrapping_add(1);
                }
            }
            other => return Err(TelemetryError::UnknownTopic(other.to_owned())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink() {
        let mut sink = RecordingSink::new();
        sink.publish(ALTITUDE_TOPIC, 97.5).unwrap();
        sink.publish(BATTERY_TOPIC, 98.75).unwrap();
        sink.publish(ALTITUDE_TOPIC, 95.0).unwrap();

        assert_eq!(sink.samples().len(), 3);
        assert_eq!(sink.values(ALTITUDE_TOPIC), vec![97.5, 95.0]);
        assert_eq!(sink.values(BATTERY_TOPIC), vec![98.75]);

        sink.clear();
        assert!(sink.samples().is_empty());
    }

    #[test]
    fn test_borrowed_sink_forwards() {
        fn publish_battery<S: TelemetrySink>(mut sink: S, value: f64) {
            sink.publish(BATTERY_TOPIC, value).unwrap();
        }

        let mut inner = RecordingSink::new();
        publish_battery(&mut inner, 10.0);
        publish_battery(Box::new(NullSink) as Box<dyn TelemetrySink>, 1.0);
        assert_eq!(inner.values(BATTERY_TOPIC), vec![10.0]);
    }

    #[test]
    fn test_frame_recorder_pairs_samples() {
        let mut rec = FrameRecorder::new();
        rec.publish(BATTERY_TOPIC, 99.0).unwrap(); // no open frame, dropped
        rec.publish(ALTITUDE_TOPIC, 97.5).unwrap();
        rec.publish(BATTERY_TOPIC, 98.75).unwrap();
        rec.publish(ALTITUDE_TOPIC, 95.0).unwrap();
        rec.publish(BATTERY_TOPIC, 97.5).unwrap();

        let frames = rec.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].seq(), 0);
        assert_eq!(frames[1].seq(), 1);
        assert!((frames[1].altitude_m() - 95.0).abs() < 1e-9);

        let bytes = rec.to_bytes();
        assert_eq!(TelemetryFrame::decode_stream(&bytes), frames);

        let mut out = Vec::new();
        rec.write_to(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_frame_recorder_rejects_unknown_topic() {
        let mut rec = FrameRecorder::new();
        let err = rec.publish("drone/speed", 1.0).unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownTopic(t) if t == "drone/speed"));
    }
}
