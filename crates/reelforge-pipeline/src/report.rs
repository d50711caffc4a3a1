//! The run report: final state, output, deviation and every absorbed failure.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use reelforge_assets::AssetWarning;
use reelforge_core::{ReelError, ReelResult};
use reelforge_ir::timeline::{DurationDeviation, RetimedSegment};

use crate::state::RunState;

/// A non-fatal problem recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunWarning {
    /// A backend failed or an asset was degraded to a placeholder.
    Asset(AssetWarning),
    /// The second timing pass adopted a realized audio duration.
    Retimed(RetimedSegment),
    /// The total duration is far from the target.
    Deviation(DurationDeviation),
    /// The script touches a sensitive topic.
    Safety { message: String },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunWarning::Asset(w) => write!(f, "{}", w),
            RunWarning::Retimed(r) => write!(
                f,
                "segment {} retimed from {:.2}s to {:.2}s",
                r.index, r.planned, r.realized
            ),
            RunWarning::Deviation(d) => write!(f, "{}", d),
            RunWarning::Safety { message } => write!(f, "{}", message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub state: RunState,
    /// States entered, in order.
    pub stages: Vec<String>,
    pub output: Option<PathBuf>,
    pub total_duration: Option<f64>,
    pub target_duration: Option<f64>,
    pub placeholder_assets: usize,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::Idle,
            stages: vec![RunState::Idle.name().to_string()],
            output: None,
            total_duration: None,
            target_duration: None,
            placeholder_assets: 0,
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    pub fn reached(&self, state: &RunState) -> bool {
        self.stages.iter().any(|s| s == state.name())
    }

    pub fn warn(&mut self, warning: RunWarning) {
        self.warnings.push(warning);
    }

    /// `Ok(output)` for a finished run; the failure reason as an error otherwise.
    pub fn outcome(&self) -> Result<&Path, String> {
        match (&self.state, &self.output) {
            (RunState::Done, Some(path)) => Ok(path),
            (RunState::Failed(reason), _) => Err(reason.message.clone()),
            (state, _) => Err(format!("run ended in state {}", state)),
        }
    }

    pub fn to_json_pretty(&self) -> ReelResult<String> {
        serde_json::to_string_pretty(self).map_err(ReelError::from)
    }

    pub fn save(&self, path: &Path) -> ReelResult<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FailureReason;
    use reelforge_ir::timeline::DeviationKind;

    #[test]
    fn test_new_report_is_idle() {
        let report = RunReport::new();
        assert_eq!(report.state, RunState::Idle);
        assert!(report.reached(&RunState::Idle));
        assert!(!report.reached(&RunState::Timing));
        assert!(!report.is_success());
    }

    #[test]
    fn test_outcome_for_failed_run() {
        let mut report = RunReport::new();
        report.state = RunState::Failed(FailureReason::from(&ReelError::Render(
            "ffmpeg exited with 1".into(),
        )));
        assert_eq!(
            report.outcome().unwrap_err(),
            "render error: ffmpeg exited with 1"
        );
    }

    #[test]
    fn test_json_shape() {
        let mut report = RunReport::new();
        report.state = RunState::Done;
        report.output = Some(PathBuf::from("out.mp4"));
        report.warn(RunWarning::Retimed(RetimedSegment {
            index: 1,
            planned: 4.0,
            realized: 5.0,
        }));
        report.warn(RunWarning::Deviation(DurationDeviation {
            kind: DeviationKind::Long,
            total: 80.0,
            target: 45.0,
        }));

        let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["state"], "done");
        assert_eq!(json["output"], "out.mp4");
        assert_eq!(json["warnings"][0]["type"], "retimed");
        assert_eq!(json["warnings"][0]["realized"], 5.0);
        assert_eq!(json["warnings"][1]["type"], "deviation");
        assert!(json["run_id"].as_str().unwrap().len() == 36);
        assert_eq!(report.outcome().unwrap(), Path::new("out.mp4"));
    }

    #[test]
    fn test_warning_display() {
        let w = RunWarning::Retimed(RetimedSegment {
            index: 2,
            planned: 3.0,
            realized: 4.25,
        });
        assert_eq!(w.to_string(), "segment 2 retimed from 3.00s to 4.25s");
    }
}
