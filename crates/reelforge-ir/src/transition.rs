use serde::{Deserialize, Serialize};

use reelforge_core::Duration;

/// Pan/zoom motion applied to a segment's still images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    ZoomIn,
    ZoomOut,
}

impl Motion {
    /// Motions alternate by segment index parity: even zooms in, odd zooms out.
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Motion::ZoomIn
        } else {
            Motion::ZoomOut
        }
    }
}

/// Defines the visual effect used to transition into a segment from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    /// A smooth crossfade from the previous segment to the current one.
    Crossfade,
}

/// A segment transition definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub effect: TransitionType,
    pub duration: Duration,
}

impl Transition {
    pub fn crossfade(seconds: f64) -> Self {
        Self {
            effect: TransitionType::Crossfade,
            duration: Duration::from_seconds(seconds),
        }
    }
}

/// What happens after the last segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TerminalDirective {
    /// Fade the final frames to black over `duration`.
    FadeOut { duration: Duration },
    /// End on the last frame with no effect.
    Hold,
}
