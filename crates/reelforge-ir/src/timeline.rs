//! Timing Engine: compiles a script into contiguous, gap-free intervals.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use reelforge_core::{Duration, ReelError, ReelResult, TimingConfig};

use crate::script::{Script, SegmentKind};
use crate::validate::{join_errors, validate_script};

/// Duration estimation and reconciliation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingPolicy {
    pub words_per_second: f64,
    pub min_segment_seconds: f64,
    pub max_segment_seconds: f64,
    pub realized_tolerance: f64,
    pub long_factor: f64,
    pub short_factor: f64,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for TimingPolicy {
    fn from(config: &TimingConfig) -> Self {
        Self {
            words_per_second: config.words_per_second,
            min_segment_seconds: config.min_segment_seconds,
            max_segment_seconds: config.max_segment_seconds,
            realized_tolerance: config.realized_tolerance,
            long_factor: config.long_factor,
            short_factor: config.short_factor,
        }
    }
}

impl TimingPolicy {
    /// Same bounds as a loaded `[timing]` table.
    pub fn validate(&self) -> ReelResult<()> {
        TimingConfig {
            words_per_second: self.words_per_second,
            min_segment_seconds: self.min_segment_seconds,
            max_segment_seconds: self.max_segment_seconds,
            realized_tolerance: self.realized_tolerance,
            long_factor: self.long_factor,
            short_factor: self.short_factor,
        }
        .validate()
        .map_err(|e| ReelError::config(e, "[timing]"))
    }

    /// Estimate how long `text` takes to speak, clamped to the per-segment bounds.
    pub fn estimate(&self, text: &str) -> f64 {
        let words = text.split_whitespace().count() as f64;
        let raw = if self.words_per_second > 0.0 {
            words / self.words_per_second
        } else {
            self.max_segment_seconds
        };
        // max/min instead of clamp: never panics on inverted bounds.
        raw.max(self.min_segment_seconds).min(self.max_segment_seconds)
    }
}

/// A segment's half-open interval `[start, end)` on the reel timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub index: usize,
    pub kind: SegmentKind,
    pub start: f64,
    pub end: f64,
}

impl TimelineEntry {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationKind {
    Long,
    Short,
}

/// The realized total strays outside the accepted band around the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationDeviation {
    pub kind: DeviationKind,
    pub total: f64,
    pub target: f64,
}

impl std::fmt::Display for DurationDeviation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self.kind {
            DeviationKind::Long => "longer",
            DeviationKind::Short => "shorter",
        };
        write!(
            f,
            "total {} is much {} than target {}",
            Duration::from_seconds(self.total),
            word,
            Duration::from_seconds(self.target)
        )
    }
}

/// A segment whose interval changed in the second timing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetimedSegment {
    pub index: usize,
    pub planned: f64,
    pub realized: f64,
}

/// Read-only view of a script as contiguous intervals.
///
/// Invariants: the first interval starts at 0, `end[i] == start[i + 1]`,
/// and the last end equals the sum of durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    target_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deviation: Option<DurationDeviation>,
}

impl Timeline {
    /// Compute a timeline with the default timing policy.
    pub fn compute(script: &Script) -> ReelResult<Self> {
        Self::compute_with(script, &TimingPolicy::default())
    }

    /// Compute a timeline. Missing durations are estimated from the narration.
    ///
    /// The total is never truncated to the target: a large deviation is logged
    /// and recorded on the timeline instead.
    pub fn compute_with(script: &Script, policy: &TimingPolicy) -> ReelResult<Self> {
        policy.validate()?;
        validate_script(script).map_err(join_errors)?;

        let durations: Vec<(SegmentKind, f64)> = script
            .segments
            .iter()
            .map(|s| {
                let d = match s.duration {
                    Some(d) => d,
                    None => {
                        let estimated = policy.estimate(&s.narration);
                        debug!(duration = estimated, "estimated segment duration");
                        estimated
                    }
                };
                (s.kind, d)
            })
            .collect();

        Ok(Self::from_durations(&durations, script.target_duration, policy))
    }

    fn from_durations(durations: &[(SegmentKind, f64)], target: f64, policy: &TimingPolicy) -> Self {
        let mut entries = Vec::with_capacity(durations.len());
        let mut cursor = 0.0;
        for (index, (kind, duration)) in durations.iter().enumerate() {
            let start = cursor;
            let end = start + duration;
            entries.push(TimelineEntry {
                index,
                kind: *kind,
                start,
                end,
            });
            cursor = end;
        }

        let deviation = if cursor > target * policy.long_factor {
            Some(DeviationKind::Long)
        } else if cursor < target * policy.short_factor {
            Some(DeviationKind::Short)
        } else {
            None
        }
        .map(|kind| DurationDeviation {
            kind,
            total: cursor,
            target,
        });
        if let Some(d) = &deviation {
            warn!("timeline deviation: {}", d);
        }

        Self {
            entries,
            target_duration: target,
            deviation,
        }
    }

    /// Second timing pass against realized audio durations.
    ///
    /// Segments whose realized duration deviates from the planned one by more
    /// than the policy tolerance adopt the realized duration. When nothing
    /// deviates the timeline is returned unchanged.
    pub fn retime(
        &self,
        realized: &[f64],
        policy: &TimingPolicy,
    ) -> ReelResult<(Timeline, Vec<RetimedSegment>)> {
        if realized.len() != self.entries.len() {
            return Err(ReelError::PlanInconsistency(format!(
                "retime expects {} realized durations, got {}",
                self.entries.len(),
                realized.len()
            )));
        }

        let mut retimed = Vec::new();
        let durations: Vec<(SegmentKind, f64)> = self
            .entries
            .iter()
            .zip(realized)
            .map(|(entry, &actual)| {
                let planned = entry.duration();
                let deviation = Duration::from_seconds(planned)
                    .relative_deviation(Duration::from_seconds(actual));
                if actual.is_finite() && actual > 0.0 && deviation > policy.realized_tolerance {
                    warn!(
                        segment = entry.index,
                        planned, actual, "realized audio deviates from plan, retiming"
                    );
                    retimed.push(RetimedSegment {
                        index: entry.index,
                        planned,
                        realized: actual,
                    });
                    (entry.kind, actual)
                } else {
                    (entry.kind, planned)
                }
            })
            .collect();

        if retimed.is_empty() {
            return Ok((self.clone(), retimed));
        }
        Ok((
            Self::from_durations(&durations, self.target_duration, policy),
            retimed,
        ))
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End of the last interval.
    pub fn total(&self) -> f64 {
        self.entries.last().map(|e| e.end).unwrap_or(0.0)
    }

    pub fn target_duration(&self) -> f64 {
        self.target_duration
    }

    pub fn deviation(&self) -> Option<&DurationDeviation> {
        self.deviation.as_ref()
    }

    /// Segment active at time `t`, if any.
    pub fn segment_at(&self, t: f64) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.contains(t))
    }
}
