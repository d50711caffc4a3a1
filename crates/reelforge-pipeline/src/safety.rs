//! Keyword-based content safety check, run on the script before timing.

use regex::Regex;
use tracing::{info, warn};

use reelforge_core::{ReelError, ReelResult};
use reelforge_ir::Script;

const EXPLICIT_KEYWORDS: &[&str] = &[
    // violence
    "kill", "murder", "assault", "attack", "weapon", "gun", "bomb", "terror", "violence", "blood",
    "gore", "death", "suicide",
    // sexual content
    "sex", "porn", "nude", "naked", "explicit", "nsfw",
    // hate
    "hate", "racist", "discrimination", "slur",
    // illegal activity
    "drug", "illegal", "crime", "steal", "hack", "fraud",
    // self-harm
    "self-harm", "cutting", "anorexia", "bulimia",
];

const WARNING_KEYWORDS: &[&str] = &[
    "controversial",
    "sensitive",
    "political",
    "religion",
    "conspiracy",
    "unverified",
    "misinformation",
];

/// Terms that make an explicit keyword acceptable within the same section.
const ALLOWED_CONTEXTS: &[&str] = &[
    "medical",
    "educational",
    "healthcare",
    "science",
    "history",
    "documentary",
    "awareness",
    "prevention",
    "news",
    "report",
    "military",
    "operation",
    "president",
    "government",
    "official",
    "announced",
    "capture",
    "arrest",
];

/// Outcome of checking one section of text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextVerdict {
    pub flagged: Vec<String>,
    pub warnings: Vec<String>,
}

impl TextVerdict {
    pub fn is_safe(&self) -> bool {
        self.flagged.is_empty()
    }
}

pub struct SafetyChecker {
    strict: bool,
    explicit: Vec<(&'static str, Regex)>,
    warning: Vec<(&'static str, Regex)>,
}

impl SafetyChecker {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            explicit: compile(EXPLICIT_KEYWORDS),
            warning: compile(WARNING_KEYWORDS),
        }
    }

    pub fn check_text(&self, text: &str) -> TextVerdict {
        let lower = text.to_lowercase();
        let allowed = ALLOWED_CONTEXTS.iter().any(|term| lower.contains(term));

        let flagged: Vec<String> = if allowed {
            Vec::new()
        } else {
            matching(&self.explicit, &lower)
        };
        // Sensitive topics are only reported for otherwise clean text in strict mode.
        let warnings = if flagged.is_empty() && self.strict {
            matching(&self.warning, &lower)
        } else {
            Vec::new()
        };
        TextVerdict { flagged, warnings }
    }

    /// Check every section (narration plus caption) of `script`.
    ///
    /// Returns the sensitive-topic warnings when the script passes, and a
    /// `SafetyRejection` naming every flagged word otherwise.
    pub fn check_script(&self, script: &Script) -> ReelResult<Vec<String>> {
        let mut flagged: Vec<String> = Vec::new();
        let mut warnings = Vec::new();

        for (index, segment) in script.segments.iter().enumerate() {
            let section = match &segment.caption {
                Some(caption) if !segment.is_hook() => format!("{} {}", segment.narration, caption),
                _ => segment.narration.clone(),
            };
            let verdict = self.check_text(&section);
            if !verdict.is_safe() {
                warn!(segment = index, flagged = ?verdict.flagged, "segment failed safety check");
            }
            for word in verdict.flagged {
                if !flagged.contains(&word) {
                    flagged.push(word);
                }
            }
            for word in verdict.warnings {
                warnings.push(format!("segment {} touches a sensitive topic: {}", index, word));
            }
        }

        if !flagged.is_empty() {
            return Err(ReelError::SafetyRejection { flagged });
        }
        info!(warnings = warnings.len(), "script passed safety check");
        Ok(warnings)
    }
}

impl Default for SafetyChecker {
    fn default() -> Self {
        Self::new(true)
    }
}

fn compile(words: &[&'static str]) -> Vec<(&'static str, Regex)> {
    words
        .iter()
        .filter_map(|&word| {
            Regex::new(&format!(r"\b{}\b", regex::escape(word)))
                .ok()
                .map(|re| (word, re))
        })
        .collect()
}

fn matching(patterns: &[(&'static str, Regex)], text: &str) -> Vec<String> {
    patterns
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(word, _)| word.to_string())
        .collect()
}
