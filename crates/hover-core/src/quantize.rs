use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

// ---------------------------------------------------------------------------
// 1. Quantization Helpers
// ---------------------------------------------------------------------------

/// Meters to centimeters, saturating at the `u32` range.
#[inline]
pub fn m_to_cm(m: f64) -> u32 {
    (m * 100.0).round().clamp(0.0, u32::MAX as f64) as u32
}

#[inline]
pub fn cm_to_m(cm: u32) -> f64 {
    cm as f64 / 100.0
}

/// Percent to hundredths of a percent. 0..100 % maps to 0..10000.
#[inline]
pub fn pct_to_cpct(pct: f64) -> u16 {
    (pct * 100.0).round().clamp(0.0, 10_000.0) as u16
}

#[inline]
pub fn cpct_to_pct(cpct: u16) -> f64 {
    cpct as f64 / 100.0
}

// ---------------------------------------------------------------------------
// 2. Packet Struct (Zero-Copy)
// ---------------------------------------------------------------------------

/// Size of one encoded frame in bytes.
pub const FRAME_LEN: usize = 8;

/// One telemetry sample (8 bytes, little-endian, unaligned).
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryFrame {
    pub seq: U16,          // Wraps at u16::MAX
    pub altitude_cm: U32,  // Altitude (cm)
    pub battery_cpct: U16, // Battery (0.01 %)
}

impl TelemetryFrame {
    pub fn new(seq: u16, altitude_m: f64, battery_pct: f64) -> Self {
        Self {
            seq: U16::new(seq),
            altitude_cm: U32::new(m_to_cm(altitude_m)),
            battery_cpct: U16::new(pct_to_cpct(battery_pct)),
        }
    }

    pub fn seq(&self) -> u16 {
        self.seq.get()
    }

    pub fn altitude_m(&self) -> f64 {
        cm_to_m(self.altitude_cm.get())
    }

    pub fn battery_pct(&self) -> f64 {
        cpct_to_pct(self.battery_cpct.get())
    }

    /// Decode a single frame; `None` unless `bytes` is exactly `FRAME_LEN` long.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        Self::read_from_bytes(bytes).ok()
    }

    /// Decode a back-to-back stream, ignoring a trailing partial frame.
    pub fn decode_stream(bytes: &[u8]) -> Vec<Self> {
        bytes.chunks_exact(FRAME_LEN).filter_map(Self::decode).collect()
    }

    pub fn encode(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size() {
        assert_eq!(core::mem::size_of::<TelemetryFrame>(), FRAME_LEN);
        assert_eq!(TelemetryFrame::new(0, 0.0, 0.0).encode().len(), FRAME_LEN);
    }

    #[test]
    fn test_quantization_resolution() {
        assert_eq!(m_to_cm(97.456), 9746);
        assert_eq!(m_to_cm(-3.0), 0);
        assert_eq!(pct_to_cpct(100.0), 10_000);
        assert_eq!(pct_to_cpct(250.0), 10_000);
        assert!((cm_to_m(9746) - 97.46).abs() < 1e-9);
        assert!((cpct_to_pct(7525) - 75.25).abs() < 1e-9);
    }

    #[test]
    fn test_little_endian_layout() {
        let f = TelemetryFrame::new(0x0102, 1.0, 0.5);
        // seq, altitude = 100 cm, battery = 50 cpct
        assert_eq!(f.encode(), &[0x02, 0x01, 100, 0, 0, 0, 50, 0]);
    }

    #[test]
    fn test_decode_stream() {
        let frames = [
            TelemetryFrame::new(0, 100.0, 100.0),
            TelemetryFrame::new(1, 97.5, 98.75),
        ];
        let mut bytes: Vec<u8> = frames.iter().flat_map(|f| f.encode().to_vec()).collect();
        bytes.push(0xff); // partial trailer

        let decoded = TelemetryFrame::decode_stream(&bytes);
        assert_eq!(decoded, frames);
        assert_eq!(decoded[1].seq(), 1);
        assert!((decoded[1].altitude_m() - 97.5).abs() < 1e-9);
        assert!((decoded[1].battery_pct() - 98.75).abs() < 1e-9);
        assert!(TelemetryFrame::decode(&bytes[..5]).is_none());
    }
}
