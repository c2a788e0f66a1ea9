use serde::{Deserialize, Serialize};
use std::fmt;

/// Output gain in [0.0, 1.0] with a step of 0.1
///
/// Stored as whole tenths so that repeated slider updates never drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct GainLevel(u8);

impl GainLevel {
    pub const MIN: GainLevel = GainLevel(0);
    pub const MAX: GainLevel = GainLevel(10);
    pub const STEP: f32 = 0.1;

    /// Clamp to [0, 1] and snap to the nearest step; NaN becomes 0
    pub fn new(level: f32) -> Self {
        if level.is_nan() {
            return Self::MIN;
        }
        let tenths = (level.clamp(0.0, 1.0) * 10.0).round() as u8;
        GainLevel(tenths.min(Self::MAX.0))
    }

    pub fn from_tenths(tenths: u8) -> Self {
        GainLevel(tenths.min(Self::MAX.0))
    }

    pub fn tenths(self) -> u8 {
        self.0
    }

    pub fn value(self) -> f32 {
        self.0 as f32 / 10.0
    }

    /// Pitch value derived from the gain: `factor × gain`
    pub fn pitch(self, factor: f32) -> f32 {
        self.0 as f32 * factor / 10.0
    }
}

impl From<f32> for GainLevel {
    fn from(level: f32) -> Self {
        GainLevel::new(level)
    }
}

impl From<GainLevel> for f32 {
    fn from(gain: GainLevel) -> Self {
        gain.value()
    }
}

impl fmt::Display for GainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snaps_to_steps() {
        assert_eq!(GainLevel::new(0.7).tenths(), 7);
        assert_eq!(GainLevel::new(0.74).tenths(), 7);
        assert_eq!(GainLevel::new(0.75).tenths(), 8);
        assert_eq!(GainLevel::new(0.04).tenths(), 0);
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(GainLevel::new(-3.0), GainLevel::MIN);
        assert_eq!(GainLevel::new(1.6), GainLevel::MAX);
        assert_eq!(GainLevel::new(f32::NAN), GainLevel::MIN);
        assert_eq!(GainLevel::new(f32::INFINITY), GainLevel::MAX);
        assert_eq!(GainLevel::from_tenths(42), GainLevel::MAX);
    }

    #[test]
    fn test_pitch_follows_gain() {
        assert_eq!(GainLevel::new(0.7).pitch(1000.0), 700.0);
        assert_eq!(GainLevel::new(0.0).pitch(1000.0), 0.0);
        assert_eq!(GainLevel::MAX.pitch(1000.0), 1000.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(GainLevel::new(0.3).to_string(), "0.3");
        assert_eq!(GainLevel::MAX.to_string(), "1.0");
    }

    #[test]
    fn test_serde_as_plain_number() {
        let json = serde_json::to_string(&GainLevel::new(0.5)).unwrap();
        assert_eq!(json, "0.5");

        let parsed: GainLevel = serde_json::from_str("0.66").unwrap();
        assert_eq!(parsed.tenths(), 7);
    }
}
