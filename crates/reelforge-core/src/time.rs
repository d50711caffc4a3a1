use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-negative span of reel time, stored as fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Duration {
    seconds: f64,
}

impl Duration {
    /// Create a duration from seconds. Negative input clamps to zero.
    pub fn from_seconds(s: f64) -> Self {
        Self {
            seconds: s.max(0.0),
        }
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }

    /// Frames needed to cover this duration at `fps`, rounding up.
    pub fn frame_count(&self, fps: f64) -> u64 {
        (self.seconds * fps).ceil() as u64
    }

    /// Relative deviation of `other` from `self` (`|other - self| / self`).
    /// A zero duration deviates infinitely from anything non-zero.
    pub fn relative_deviation(&self, other: Duration) -> f64 {
        if self.seconds == 0.0 {
            return if other.seconds == 0.0 { 0.0 } else { f64::INFINITY };
        }
        (other.seconds - self.seconds).abs() / self.seconds
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds < 1.0 {
            write!(f, "{:.0}ms", self.seconds * 1000.0)
        } else {
            write!(f, "{:.2}s", self.seconds)
        }
    }
}

/// A point on the reel timeline, used for subtitle cues.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    seconds: f64,
}

impl Timestamp {
    pub fn from_seconds(s: f64) -> Self {
        Self {
            seconds: s.max(0.0),
        }
    }

    /// Format as a SubRip timestamp (`HH:MM:SS,mmm`), rounded to the nearest millisecond.
    pub fn to_srt(&self) -> String {
        let total_ms = (self.seconds * 1000.0).round() as u64;
        format!(
            "{:02}:{:02}:{:02},{:03}",
            total_ms / 3_600_000,
            (total_ms % 3_600_000) / 60_000,
            (total_ms % 60_000) / 1_000,
            total_ms % 1_000
        )
    }
}
