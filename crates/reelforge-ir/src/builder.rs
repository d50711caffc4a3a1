use reelforge_core::ReelResult;

use crate::script::{Script, Segment};
use crate::validate::{join_errors, validate_script};

/// A builder for constructing a [`Script`] programmatically.
/// Used by the narration sources and by tests.
pub struct ScriptBuilder {
    script: Script,
}

impl ScriptBuilder {
    pub fn new(target_duration: f64) -> Self {
        Self {
            script: Script::new(target_duration),
        }
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.script.title = Some(title.into());
        self
    }

    /// Add the hook. It is moved to the front when the script is built.
    pub fn hook(&mut self, narration: impl Into<String>, visual: impl Into<String>) -> &mut Self {
        self.script
            .add_segment(Segment::hook(narration).with_visual(visual));
        self
    }

    pub fn narration(
        &mut self,
        narration: impl Into<String>,
        visual: impl Into<String>,
    ) -> &mut Self {
        self.script
            .add_segment(Segment::narration(narration).with_visual(visual));
        self
    }

    /// Add an already-constructed segment as-is.
    pub fn segment(&mut self, segment: Segment) -> &mut Self {
        self.script.add_segment(segment);
        self
    }

    /// Mutable access to the most recently added segment.
    pub fn last_mut(&mut self) -> Option<&mut Segment> {
        self.script.segments.last_mut()
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    /// Validate and return the script.
    pub fn build(mut self) -> ReelResult<Script> {
        // Stable: narration order is preserved, a single hook floats to the front.
        self.script.segments.sort_by_key(|s| !s.is_hook());
        validate_script(&self.script).map_err(join_errors)?;
        Ok(self.script)
    }

    /// Return the script without validation.
    pub fn build_unchecked(self) -> Script {
        self.script
    }
}
