//! Composition Planner: joins timeline, assets and captions into the ordered
//! instruction set consumed by a renderer.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use reelforge_core::{Duration, ReelConfig, ReelError, ReelResult};

use crate::asset::{AssetId, AssetSet};
use crate::caption::{Caption, CaptionTrack};
use crate::script::SegmentKind;
use crate::timeline::Timeline;
use crate::transition::{Motion, TerminalDirective, Transition};
use crate::validate::{join_errors, validate_plan_inputs};

/// Output format and cosmetic parameters of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
    pub crossfade_seconds: f64,
    pub terminal_fade_seconds: f64,
    pub zoom_factor: f64,
}

impl PlanSettings {
    /// 1080x1920 at 30fps, the standard vertical reel.
    pub fn vertical_30() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30.0,
            crossfade_seconds: 0.3,
            terminal_fade_seconds: 0.5,
            zoom_factor: 1.15,
        }
    }

    pub fn from_config(config: &ReelConfig) -> Self {
        Self {
            width: config.output.width,
            height: config.output.height,
            fps: f64::from(config.output.fps),
            crossfade_seconds: config.composition.crossfade_seconds,
            terminal_fade_seconds: config.composition.terminal_fade_seconds,
            zoom_factor: config.composition.zoom_factor,
        }
    }
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self::vertical_30()
    }
}

/// Everything the renderer needs for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInstruction {
    pub segment_index: usize,
    pub kind: SegmentKind,
    pub start: f64,
    pub end: f64,
    pub audio: AssetId,
    /// At least one image, shown in order with equal share of the interval.
    pub images: Vec<AssetId>,
    pub motion: Motion,
    /// Transition bridging the previous segment into this one. `None` for the first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_in: Option<Transition>,
    pub captions: Vec<Caption>,
}

impl RenderInstruction {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// The sole artifact handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionPlan {
    pub id: String,
    pub settings: PlanSettings,
    pub instructions: Vec<RenderInstruction>,
    pub terminal: TerminalDirective,
    pub total_duration: f64,
}

impl CompositionPlan {
    /// Build a plan. Fails with `PlanInconsistency` when the inputs disagree.
    ///
    /// Instructions follow timeline order regardless of the order assets were
    /// registered in.
    pub fn build(
        timeline: &Timeline,
        assets: &AssetSet,
        captions: &CaptionTrack,
        settings: &PlanSettings,
    ) -> ReelResult<Self> {
        validate_plan_inputs(timeline, assets, captions).map_err(join_errors)?;

        let entries = timeline.entries();
        let mut instructions = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let audio = assets
                .audio_for(entry.index)
                .map(|a| a.id.clone())
                .ok_or_else(|| {
                    ReelError::PlanInconsistency(format!("segment {} has no audio", entry.index))
                })?;
            let images = assets
                .images_for(entry.index)
                .into_iter()
                .map(|a| a.id.clone())
                .collect();

            let transition_in = (i > 0).then(|| {
                let shorter = entries[i - 1].duration().min(entry.duration());
                Transition::crossfade(settings.crossfade_seconds.min(shorter / 2.0))
            });

            instructions.push(RenderInstruction {
                segment_index: entry.index,
                kind: entry.kind,
                start: entry.start,
                end: entry.end,
                audio,
                images,
                motion: Motion::for_index(entry.index),
                transition_in,
                captions: captions.for_segment(entry.index).cloned().collect(),
            });
        }

        let total_duration = timeline.total();
        let terminal = if settings.terminal_fade_seconds > 0.0 {
            TerminalDirective::FadeOut {
                duration: Duration::from_seconds(
                    settings.terminal_fade_seconds.min(total_duration / 2.0),
                ),
            }
        } else {
            TerminalDirective::Hold
        };

        debug!(
            segments = instructions.len(),
            total = total_duration,
            "composition plan built"
        );

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            settings: settings.clone(),
            instructions,
            terminal,
            total_duration,
        })
    }

    pub fn to_json_pretty(&self) -> ReelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of frames in the rendered reel.
    pub fn total_frames(&self) -> u64 {
        Duration::from_seconds(self.total_duration).frame_count(self.settings.fps)
    }
}
