//! Xsens/Movella DOT "short payload" notifications.
//!
//! Layout (little-endian): `u32` device time in µs at offset 0, then three
//! `f32` values at offsets 4, 8 and 12. Anything after byte 16 is ignored.

use crate::error::{FusionError, Result};
use crate::types::TimedSample;

pub const SHORT_PAYLOAD_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XsensSample {
    pub device_time_us: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn le_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_bits(le_u32(bytes, offset))
}

pub fn decode_short_payload(payload: &[u8]) -> Result<XsensSample> {
    if payload.len() < SHORT_PAYLOAD_LEN {
        return Err(FusionError::Payload(format!(
            "short payload needs {} bytes, got {}",
            SHORT_PAYLOAD_LEN,
            payload.len()
        )));
    }
    Ok(XsensSample {
        device_time_us: le_u32(payload, 0),
        x: le_f32(payload, 4) as f64,
        y: le_f32(payload, 8) as f64,
        z: le_f32(payload, 12) as f64,
    })
}

/// Extends the wrapping 32-bit device clock (about 71.6 minutes per wrap)
/// into a monotonic microsecond timeline.
#[derive(Clone, Debug, Default)]
pub struct XsensClock {
    last_raw: Option<u32>,
    wraps: i64,
}

impl XsensClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, raw: u32) -> i64 {
        if let Some(last) = self.last_raw {
            if raw < last {
                self.wraps += 1;
            }
        }
        self.last_raw = Some(raw);
        (self.wraps << 32) + raw as i64
    }

    /// Sample stamped on the unwrapped timeline, for a `TimeUnit::Micros` pipeline.
    pub fn stamp(&mut self, sample: &XsensSample) -> TimedSample {
        TimedSample::new(self.advance(sample.device_time_us), sample.x, sample.y, sample.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(t: u32, x: f32, y: f32, z: f32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&t.to_le_bytes());
        bytes.extend_from_slice(&x.to_le_bytes());
        bytes.extend_from_slice(&y.to_le_bytes());
        bytes.extend_from_slice(&z.to_le_bytes());
        bytes
    }

    #[test]
    fn test_decode() {
        let sample = decode_short_payload(&payload(123_456, 0.5, -1.25, 9.75)).unwrap();
        assert_eq!(sample.device_time_us, 123_456);
        assert_eq!(sample.x, 0.5);
        assert_eq!(sample.y, -1.25);
        assert_eq!(sample.z, 9.75);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = payload(1, 1.0, 2.0, 3.0);
        bytes.extend_from_slice(&[0xff; 4]);
        assert_eq!(decode_short_payload(&bytes).unwrap().z, 3.0);
    }

    #[test]
    fn test_short_payload_rejected() {
        let bytes = payload(1, 1.0, 2.0, 3.0);
        let err = decode_short_payload(&bytes[..15]).unwrap_err();
        assert!(matches!(err, FusionError::Payload(_)));
        assert!(decode_short_payload(&[]).is_err());
    }

    #[test]
    fn test_clock_rollover() {
        let mut clock = XsensClock::new();
        assert_eq!(clock.advance(u32::MAX - 10), (u32::MAX - 10) as i64);
        assert_eq!(clock.advance(5), (1i64 << 32) + 5);
        assert_eq!(clock.advance(20), (1i64 << 32) + 20);
    }

    #[test]
    fn test_stamp() {
        let mut clock = XsensClock::new();
        let sample = decode_short_payload(&payload(16_000, 0.0, 0.0, 9.75)).unwrap();
        let timed = clock.stamp(&sample);
        assert_eq!(timed.t, 16_000);
        assert_eq!(timed.z, 9.75);
    }
}
