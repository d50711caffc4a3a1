//! # reelforge-pipeline
//!
//! Supervises a reel run through the state machine
//! `Idle → Scripting → Timing → Resolving → Captioning → Planning → Rendering → Done`.
//! Failures in scripting, safety, timing, planning and rendering end the run;
//! asset failures are absorbed by the fallback chains and reported as warnings.

pub mod input;
pub mod narration;
pub mod orchestrator;
pub mod persist;
pub mod report;
pub mod research;
pub mod safety;
pub mod state;

pub use input::InputDocument;
pub use narration::{narrator_from_config, LlmNarrator, NarrationSource, TemplateNarrator};
pub use orchestrator::{Orchestrator, RunInput};
pub use report::{RunReport, RunWarning};
pub use research::{Research, ResearchNarrator, ResearchSource, WebResearcher};
pub use safety::SafetyChecker;
pub use state::{FailureReason, RunState};
