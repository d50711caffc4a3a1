//! Intermediate artifacts written to a run's work directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use reelforge_core::ReelResult;
use reelforge_ir::{CaptionTrack, CompositionPlan, Script, Timeline};

pub const SCRIPT_FILE: &str = "script.json";
pub const TIMELINE_FILE: &str = "timeline.json";
pub const PLAN_FILE: &str = "plan.json";
pub const CAPTIONS_FILE: &str = "captions.srt";

/// A run's scratch directory.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Create `<base>/<run_id>`.
    pub fn create(base: &Path, run_id: &str) -> ReelResult<Self> {
        let root = base.join(run_id);
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn write_script(&self, script: &Script) -> ReelResult<PathBuf> {
        self.write(SCRIPT_FILE, script.to_json_pretty()?.as_bytes())
    }

    pub fn write_timeline(&self, timeline: &Timeline) -> ReelResult<PathBuf> {
        self.write(
            TIMELINE_FILE,
            serde_json::to_string_pretty(timeline)?.as_bytes(),
        )
    }

    pub fn write_plan(&self, plan: &CompositionPlan) -> ReelResult<PathBuf> {
        self.write(PLAN_FILE, plan.to_json_pretty()?.as_bytes())
    }

    pub fn write_captions(&self, captions: &CaptionTrack) -> ReelResult<PathBuf> {
        self.write(CAPTIONS_FILE, captions.to_srt().as_bytes())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> ReelResult<PathBuf> {
        let path = self.root.join(name);
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), "wrote intermediate artifact");
        Ok(path)
    }

    /// Remove the directory. Failures are logged, never fatal.
    pub fn dispose(self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), "failed to remove work dir: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_ir::Segment;

    #[test]
    fn test_write_and_dispose() {
        let base = tempfile::tempdir().unwrap();
        let work = WorkDir::create(base.path(), "run-1").unwrap();

        let mut script = Script::new(6.0);
        script.add_segment(Segment::hook("Wait for it").with_duration(2.0));
        script.add_segment(Segment::narration("This changes everything").with_duration(4.0));
        let timeline = Timeline::compute(&script).unwrap();
        let captions = CaptionTrack::compile(&script, &timeline, 40);

        let script_path = work.write_script(&script).unwrap();
        let timeline_path = work.write_timeline(&timeline).unwrap();
        let srt_path = work.write_captions(&captions).unwrap();

        let reloaded = Script::load(&script_path).unwrap();
        assert_eq!(reloaded, script);
        let raw = std::fs::read_to_string(&timeline_path).unwrap();
        assert!(raw.contains("\"start\""));
        assert!(std::fs::read_to_string(&srt_path)
            .unwrap()
            .contains("00:00:02,000 --> 00:00:06,000"));

        let root = work.path().to_path_buf();
        work.dispose();
        assert!(!root.exists());
    }
}
