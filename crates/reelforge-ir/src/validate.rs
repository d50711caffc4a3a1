use std::collections::HashSet;

use reelforge_core::ReelError;

use crate::asset::{AssetSet, AssetType};
use crate::caption::CaptionTrack;
use crate::script::Script;
use crate::timeline::Timeline;

/// Slack allowed when comparing interval bounds produced by float arithmetic.
pub const INTERVAL_EPSILON: f64 = 1e-9;

/// Validate a Script for structural correctness before timing.
///
/// Every violation is reported, not just the first.
pub fn validate_script(script: &Script) -> Result<(), Vec<ReelError>> {
    let mut errors = Vec::new();

    if !(script.target_duration.is_finite() && script.target_duration > 0.0) {
        errors.push(ReelError::InvalidScript(format!(
            "target duration must be positive, got {}",
            script.target_duration
        )));
    }

    if script.segments.is_empty() {
        errors.push(ReelError::InvalidScript(
            "script must have at least one segment".into(),
        ));
        return Err(errors);
    }

    let hooks: Vec<usize> = script
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_hook())
        .map(|(i, _)| i)
        .collect();
    match hooks.as_slice() {
        [0] => {}
        [] => errors.push(ReelError::InvalidScript(
            "script must start with a hook segment".into(),
        )),
        [i] => errors.push(ReelError::InvalidScript(format!(
            "hook segment must be first, found at index {}",
            i
        ))),
        many => errors.push(ReelError::InvalidScript(format!(
            "script must have exactly one hook, found {}",
            many.len()
        ))),
    }

    for (i, segment) in script.segments.iter().enumerate() {
        if segment.narration.trim().is_empty() {
            errors.push(ReelError::InvalidScript(format!(
                "segment {} has empty narration text",
                i
            )));
        }
        if let Some(d) = segment.duration {
            if !(d.is_finite() && d > 0.0) {
                errors.push(ReelError::InvalidScript(format!(
                    "segment {} has non-positive duration {}",
                    i, d
                )));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check that timeline, assets and captions agree before a plan is emitted.
///
/// Any violation is an internal defect, reported as `PlanInconsistency`.
pub fn validate_plan_inputs(
    timeline: &Timeline,
    assets: &AssetSet,
    captions: &CaptionTrack,
) -> Result<(), Vec<ReelError>> {
    let mut errors = Vec::new();
    let count = timeline.len();

    if count == 0 {
        errors.push(ReelError::PlanInconsistency("timeline is empty".into()));
    }

    let mut ids = HashSet::new();
    for asset in assets.iter() {
        if asset.segment_index >= count {
            errors.push(ReelError::PlanInconsistency(format!(
                "asset '{}' references unknown segment {}",
                asset.id, asset.segment_index
            )));
        }
        if !ids.insert(&asset.id) {
            errors.push(ReelError::PlanInconsistency(format!(
                "duplicate asset id '{}'",
                asset.id
            )));
        }
    }

    for entry in timeline.entries() {
        let audio = assets.count_for(entry.index, AssetType::Audio);
        if audio != 1 {
            errors.push(ReelError::PlanInconsistency(format!(
                "segment {} has {} audio assets, expected exactly one",
                entry.index, audio
            )));
        }
        if assets.count_for(entry.index, AssetType::Image) == 0 {
            errors.push(ReelError::PlanInconsistency(format!(
                "segment {} has no image asset",
                entry.index
            )));
        }
    }

    for caption in captions.iter() {
        let Some(entry) = timeline.get(caption.segment_index) else {
            errors.push(ReelError::PlanInconsistency(format!(
                "caption '{}' references unknown segment {}",
                caption.text, caption.segment_index
            )));
            continue;
        };
        if caption.start > caption.end
            || caption.start < entry.start - INTERVAL_EPSILON
            || caption.end > entry.end + INTERVAL_EPSILON
        {
            errors.push(ReelError::PlanInconsistency(format!(
                "caption '{}' [{:.3}, {:.3}) exceeds segment {} [{:.3}, {:.3})",
                caption.text, caption.start, caption.end, entry.index, entry.start, entry.end
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Collapse a list of validation errors into one error of the first error's kind.
pub fn join_errors(errors: Vec<ReelError>) -> ReelError {
    let message = errors
        .iter()
        .map(|e| match e {
            ReelError::InvalidScript(m) | ReelError::PlanInconsistency(m) => m.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    match errors.first() {
        Some(ReelError::PlanInconsistency(_)) => ReelError::PlanInconsistency(message),
        _ => ReelError::InvalidScript(message),
    }
}
