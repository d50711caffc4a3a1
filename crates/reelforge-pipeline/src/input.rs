//! Raw input → structured document handed to the narration source.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use reelforge_core::{ReelError, ReelResult};

const MAX_KEY_POINTS: usize = 8;
const MAX_TITLE_CHARS: usize = 100;
const MIN_POINT_CHARS: usize = 20;

/// Title, key points and free context extracted from the user's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    pub title: String,
    pub key_points: Vec<String>,
    pub context: String,
    pub target_seconds: f64,
}

impl InputDocument {
    /// Parse literal text, a topic, or a path to a `.txt`/`.md` file.
    pub fn parse(input: &str, target_seconds: f64) -> ReelResult<Self> {
        if !(target_seconds > 0.0) {
            return Err(ReelError::InvalidScript(format!(
                "target duration must be positive, got {}",
                target_seconds
            )));
        }

        let path = Path::new(input);
        let doc = if path.is_file() {
            let content = std::fs::read_to_string(path)?;
            let is_markdown = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "md" | "markdown"))
                .unwrap_or(false);
            debug!(path = %path.display(), markdown = is_markdown, "reading input file");
            if is_markdown {
                Self::from_markdown(&content, target_seconds)
            } else {
                Self::from_text(&content, target_seconds)
            }
        } else {
            Self::from_text(input, target_seconds)
        };

        if doc.title.trim().is_empty() && doc.context.trim().is_empty() {
            return Err(ReelError::InvalidScript("input is empty".into()));
        }
        Ok(doc)
    }

    pub fn from_text(text: &str, target_seconds: f64) -> Self {
        Self {
            title: title_from_text(text),
            key_points: key_points_from_text(text),
            context: text.to_string(),
            target_seconds,
        }
    }

    /// Headings become the title, list items the key points.
    pub fn from_markdown(content: &str, target_seconds: f64) -> Self {
        let mut title = None;
        let mut items = Vec::new();
        let mut subheadings = Vec::new();
        let mut context = Vec::new();

        for line in content.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if let Some((level, text)) = heading(line) {
                if title.is_none() && level <= 2 {
                    title = Some(text.to_string());
                }
                if (2..=3).contains(&level) {
                    subheadings.push(text.to_string());
                }
                context.push(text.to_string());
            } else if let Some(item) = list_item(line) {
                items.push(item.to_string());
                context.push(item.to_string());
            } else {
                context.push(line.to_string());
            }
        }

        let mut key_points = if items.is_empty() { subheadings } else { items };
        key_points.truncate(MAX_KEY_POINTS);

        Self {
            title: title.unwrap_or_else(|| title_from_text(content)),
            key_points,
            context: context.join("\n"),
            target_seconds,
        }
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &line[level..];
    rest.starts_with(' ').then(|| (level, rest.trim()))
}

fn list_item(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return Some(rest.trim());
        }
    }
    None
}

fn title_from_text(text: &str) -> String {
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cleaned = line.trim_start_matches(['#', '-', '*']).trim_start();
        return cleaned.chars().take(MAX_TITLE_CHARS).collect();
    }
    text.split_whitespace().take(8).collect::<Vec<_>>().join(" ")
}

/// Sentences longer than 20 characters, falling back to paragraphs when
/// fewer than three qualify.
fn key_points_from_text(text: &str) -> Vec<String> {
    let sentences: Vec<String> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_POINT_CHARS)
        .take(MAX_KEY_POINTS)
        .map(str::to_string)
        .collect();
    if sentences.len() >= 3 {
        return sentences;
    }
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .take(MAX_KEY_POINTS)
        .map(str::to_string)
        .collect()
}
