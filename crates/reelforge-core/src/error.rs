/// Core error types for the ReelForge pipeline.
use std::path::PathBuf;

/// A specialized Result type for ReelForge operations.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error type encompassing every stage of a reel run.
///
/// Generator-side kinds (`Generation`, `Synthesis`, `Fetch`) are normally
/// absorbed by the asset fallback chain and only surface as warnings. The
/// remaining kinds stop the run.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("invalid script: {0}")]
    InvalidScript(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("plan inconsistency: {0}")]
    PlanInconsistency(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("content rejected by safety check: flagged {}", flagged.join(", "))]
    SafetyRejection { flagged: Vec<String> },

    #[error("run cancelled: {0}")]
    Cancelled(String),

    #[error("config error: {message} ({path:?})")]
    Config { message: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReelError {
    /// Create a config error bound to a file path.
    pub fn config(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        ReelError::Config {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Whether this error kind terminates a run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ReelError::Generation(_) | ReelError::Synthesis(_) | ReelError::Fetch(_)
        )
    }

    /// Stable lowercase name of the error kind, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ReelError::InvalidScript(_) => "invalid_script",
            ReelError::Generation(_) => "generation",
            ReelError::Synthesis(_) => "synthesis",
            ReelError::Fetch(_) => "fetch",
            ReelError::PlanInconsistency(_) => "plan_inconsistency",
            ReelError::Render(_) => "render",
            ReelError::SafetyRejection { .. } => "safety_rejection",
            ReelError::Cancelled(_) => "cancelled",
            ReelError::Config { .. } => "config",
            ReelError::Io(_) => "io",
            ReelError::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_script_display() {
        let err = ReelError::InvalidScript("segment 2 has empty narration".into());
        assert_eq!(
            err.to_string(),
            "invalid script: segment 2 has empty narration"
        );
    }

    #[test]
    fn test_safety_rejection_lists_words() {
        let err = ReelError::SafetyRejection {
            flagged: vec!["bomb".into(), "hack".into()],
        };
        assert!(err.to_string().contains("bomb, hack"));
        assert_eq!(err.kind(), "safety_rejection");
    }

    #[test]
    fn test_generator_errors_are_not_fatal() {
        assert!(!ReelError::Fetch("timeout".into()).is_fatal());
        assert!(!ReelError::Synthesis("no voice".into()).is_fatal());
        assert!(ReelError::Render("ffmpeg exited 1".into()).is_fatal());
        assert!(ReelError::PlanInconsistency("x".into()).is_fatal());
    }
}
