//! # reelforge-ir
//!
//! The ReelForge Intermediate Representation: a narration script compiled
//! into a frame-accurate timeline, the assets bound to each segment, the
//! captions derived from the timeline, and the composition plan handed to
//! the renderer.
//!
//! Every stage is derived once from the previous one and never mutated.

pub mod asset;
pub mod builder;
pub mod caption;
pub mod plan;
pub mod script;
pub mod timeline;
pub mod transition;
pub mod validate;

pub use asset::{Asset, AssetId, AssetSet, AssetType, SourceKind};
pub use caption::{Caption, CaptionStyle, CaptionTrack, OverlayDirective};
pub use plan::{CompositionPlan, PlanSettings, RenderInstruction};
pub use script::{Script, Segment, SegmentKind};
pub use timeline::{DurationDeviation, Timeline, TimelineEntry, TimingPolicy};
pub use transition::{Motion, TerminalDirective, Transition, TransitionType};
