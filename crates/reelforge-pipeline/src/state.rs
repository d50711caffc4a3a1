//! Run state machine.

use serde::{Deserialize, Serialize};

use reelforge_core::ReelError;

/// Why a run ended in [`RunState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Stable error kind name (`invalid_script`, `safety_rejection`, `render`, ...).
    pub kind: String,
    pub message: String,
    /// Words that tripped the safety check, for `safety_rejection` only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged: Vec<String>,
}

impl From<&ReelError> for FailureReason {
    fn from(err: &ReelError) -> Self {
        let flagged = match err {
            ReelError::SafetyRejection { flagged } => flagged.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            flagged,
        }
    }
}

/// `Idle → Scripting → Timing → Resolving → Captioning → Planning → Rendering → Done`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Scripting,
    Timing,
    Resolving,
    Captioning,
    Planning,
    Rendering,
    Done,
    Failed(FailureReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed(_))
    }

    /// The state that follows this one on the success path.
    pub fn next(&self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Scripting),
            RunState::Scripting => Some(RunState::Timing),
            RunState::Timing => Some(RunState::Resolving),
            RunState::Resolving => Some(RunState::Captioning),
            RunState::Captioning => Some(RunState::Planning),
            RunState::Planning => Some(RunState::Rendering),
            RunState::Rendering => Some(RunState::Done),
            RunState::Done | RunState::Failed(_) => None,
        }
    }

    pub fn can_transition_to(&self, to: &RunState) -> bool {
        match to {
            RunState::Failed(_) => !self.is_terminal(),
            _ => self.next().as_ref() == Some(to),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Scripting => "scripting",
            RunState::Timing => "timing",
            RunState::Resolving => "resolving",
            RunState::Captioning => "captioning",
            RunState::Planning => "planning",
            RunState::Rendering => "rendering",
            RunState::Done => "done",
            RunState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Failed(reason) => write!(f, "failed ({})", reason.kind),
            other => write!(f, "{}", other.name()),
        }
    }
}
