use serde::{Deserialize, Serialize};
use std::path::Path;

use reelforge_core::ReelResult;

/// Role of a segment within the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// The attention-grabbing opener. Exactly one per script, always first.
    Hook,
    Narration,
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentKind::Hook => write!(f, "hook"),
            SegmentKind::Narration => write!(f, "narration"),
        }
    }
}

/// One narration + visual unit of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Spoken text.
    pub narration: String,
    /// Requested duration in seconds. `None` means "estimate from the narration".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Free-text description that drives image acquisition.
    #[serde(default)]
    pub visual: String,
    /// On-screen caption text. Falls back to the narration when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Segment {
    pub fn new(kind: SegmentKind, narration: impl Into<String>) -> Self {
        Self {
            kind,
            narration: narration.into(),
            duration: None,
            visual: String::new(),
            caption: None,
        }
    }

    pub fn hook(narration: impl Into<String>) -> Self {
        Self::new(SegmentKind::Hook, narration)
    }

    pub fn narration(narration: impl Into<String>) -> Self {
        Self::new(SegmentKind::Narration, narration)
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_visual(mut self, visual: impl Into<String>) -> Self {
        self.visual = visual.into();
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn is_hook(&self) -> bool {
        self.kind == SegmentKind::Hook
    }

    /// Text shown on screen for this segment.
    pub fn caption_text(&self) -> &str {
        match &self.caption {
            Some(c) if !c.trim().is_empty() => c,
            _ => &self.narration,
        }
    }

    /// Description used to query or prompt image backends, falling back to the narration.
    pub fn visual_description(&self) -> &str {
        if self.visual.trim().is_empty() {
            &self.narration
        } else {
            &self.visual
        }
    }
}

/// An ordered narration script. Insertion order is playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Desired total length of the reel, in seconds.
    pub target_duration: f64,
    pub segments: Vec<Segment>,
    /// Optional human-readable title carried through from the input document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Script {
    pub fn new(target_duration: f64) -> Self {
        Self {
            target_duration,
            segments: Vec::new(),
            title: None,
        }
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn hook(&self) -> Option<&Segment> {
        self.segments.iter().find(|s| s.is_hook())
    }

    /// Sum of the explicitly requested durations (estimated segments count as zero).
    pub fn requested_duration(&self) -> f64 {
        self.segments.iter().filter_map(|s| s.duration).sum()
    }

    pub fn from_json(raw: &str) -> ReelResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> ReelResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json_pretty(&self) -> ReelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_defaults_to_narration() {
        let seg = Segment::narration("This changes everything");
        assert_eq!(seg.caption_text(), "This changes everything");
        let seg = seg.with_caption("   ");
        assert_eq!(seg.caption_text(), "This changes everything");
        let seg = seg.with_caption("BIG CHANGE");
        assert_eq!(seg.caption_text(), "BIG CHANGE");
    }

    #[test]
    fn test_visual_falls_back_to_narration() {
        let seg = Segment::hook("Wait for it");
        assert_eq!(seg.visual_description(), "Wait for it");
        let seg = seg.with_visual("city skyline at dawn");
        assert_eq!(seg.visual_description(), "city skyline at dawn");
    }

    #[test]
    fn test_script_json_shape() {
        let mut script = Script::new(6.0);
        script.add_segment(Segment::hook("Wait for it").with_duration(2.0));
        script.add_segment(Segment::narration("This changes everything"));
        let json = script.to_json_pretty().unwrap();
        assert!(json.contains("\"kind\": \"hook\""));
        let back = Script::from_json(&json).unwrap();
        assert_eq!(back.segments[1].duration, None);
        assert!((back.requested_duration() - 2.0).abs() < 1e-9);
        assert!(back.hook().is_some());
    }
}
