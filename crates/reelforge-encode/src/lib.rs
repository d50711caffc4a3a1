//! # reelforge-encode
//!
//! Encoding module: turns a [`CompositionPlan`](reelforge_ir::CompositionPlan)
//! and its resolved assets into a vertical MP4 by shelling out to FFmpeg.
//! Also produces the placeholder media used when every backend of a fallback
//! chain has failed.

pub mod ffmpeg;
pub mod placeholder;
pub mod wav;

pub use ffmpeg::{CaptionOverlay, FfmpegRenderer};

use std::path::Path;

use reelforge_core::ReelResult;
use reelforge_ir::{AssetSet, CompositionPlan};

/// Something that can turn a composition plan into a video file.
///
/// Implementations must either produce a complete file at `output` or leave
/// nothing there.
pub trait Renderer: Send + Sync {
    /// Short name used in logs and the run report.
    fn name(&self) -> &str;

    fn render(&self, plan: &CompositionPlan, assets: &AssetSet, output: &Path) -> ReelResult<()>;
}
