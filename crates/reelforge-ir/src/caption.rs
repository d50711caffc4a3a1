//! Caption Compiler: splits segment caption text into readable fragments and
//! distributes each segment's interval across them by character count.
//!
//! Splitting works in three passes. Sentences (ending in `.`, `!` or `?`) are
//! never merged with each other. A sentence longer than the character cap is
//! split on clause punctuation (`,` `;` `:`), and consecutive clauses are packed
//! back together greedily while they fit under the cap. A clause still over the
//! cap is word-wrapped greedily; a single word longer than the cap stays whole.

use serde::{Deserialize, Serialize};

use reelforge_core::Timestamp;

use crate::script::{Script, Segment};
use crate::timeline::{Timeline, TimelineEntry};

const SENTENCE_ENDS: &[char] = &['.', '!', '?'];
const CLAUSE_ENDS: &[char] = &[',', ';', ':'];

/// Visual style requested from the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionStyle {
    Hook,
    Normal,
}

impl std::fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionStyle::Hook => write!(f, "hook"),
            CaptionStyle::Normal => write!(f, "normal"),
        }
    }
}

/// A caption fragment with its own `[start, end)` interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub segment_index: usize,
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Set on hook captions; the renderer styles them differently.
    pub emphasis: bool,
}

impl Caption {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn style(&self) -> CaptionStyle {
        if self.emphasis {
            CaptionStyle::Hook
        } else {
            CaptionStyle::Normal
        }
    }
}

/// Caption as handed to a burn-in overlay renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayDirective {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub style: CaptionStyle,
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split normalized text into pieces after words ending in one of `ends`.
fn split_after<'a>(text: &'a str, ends: &[char]) -> Vec<Vec<&'a str>> {
    let mut pieces = Vec::new();
    let mut current = Vec::new();
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        current.push(word);
        if word.ends_with(ends) {
            pieces.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Greedy word wrap. Never breaks inside a word.
fn wrap_words(words: &[&str], max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in words {
        if line.is_empty() {
            line.push_str(word);
        } else if char_len(&line) + 1 + char_len(word) <= max_chars {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Split caption text into fragments no longer than `max_chars` where possible.
///
/// Joining the fragments with single spaces yields the whitespace-normalized text.
pub fn split_caption_text(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = normalize_text(text);
    let max_chars = max_chars.max(1);
    let mut fragments = Vec::new();

    for sentence in split_after(&normalized, SENTENCE_ENDS) {
        let joined = sentence.join(" ");
        if char_len(&joined) <= max_chars {
            fragments.push(joined);
            continue;
        }

        let mut packed = String::new();
        for clause in split_after(&joined, CLAUSE_ENDS) {
            let clause_text = clause.join(" ");
            if char_len(&clause_text) > max_chars {
                if !packed.is_empty() {
                    fragments.push(std::mem::take(&mut packed));
                }
                fragments.extend(wrap_words(&clause, max_chars));
            } else if packed.is_empty() {
                packed = clause_text;
            } else if char_len(&packed) + 1 + char_len(&clause_text) <= max_chars {
                packed.push(' ');
                packed.push_str(&clause_text);
            } else {
                fragments.push(std::mem::replace(&mut packed, clause_text));
            }
        }
        if !packed.is_empty() {
            fragments.push(packed);
        }
    }

    fragments
}

/// Compile one segment's captions over its timeline interval.
///
/// Fragment durations are proportional to character counts; the fragments are
/// contiguous and exactly cover `[entry.start, entry.end)`.
pub fn compile_captions(segment: &Segment, entry: &TimelineEntry, max_chars: usize) -> Vec<Caption> {
    let fragments = split_caption_text(segment.caption_text(), max_chars);
    let weights: Vec<usize> = fragments.iter().map(|f| char_len(f)).collect();
    let total: usize = weights.iter().sum();
    let span = entry.end - entry.start;
    let emphasis = segment.is_hook();

    let mut captions = Vec::with_capacity(fragments.len());
    let mut cumulative = 0usize;
    let mut start = entry.start;
    let last = fragments.len().saturating_sub(1);
    for (i, (text, weight)) in fragments.into_iter().zip(weights).enumerate() {
        cumulative += weight;
        let end = if i == last {
            entry.end
        } else {
            (entry.start + span * cumulative as f64 / total as f64).min(entry.end)
        };
        captions.push(Caption {
            segment_index: entry.index,
            text,
            start,
            end,
            emphasis,
        });
        start = end;
    }
    captions
}

/// Ordered captions for a whole reel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    captions: Vec<Caption>,
}

impl CaptionTrack {
    /// Compile captions for every segment of `script` against `timeline`.
    pub fn compile(script: &Script, timeline: &Timeline, max_chars: usize) -> Self {
        let captions = script
            .segments
            .iter()
            .zip(timeline.entries())
            .flat_map(|(segment, entry)| compile_captions(segment, entry, max_chars))
            .collect();
        Self { captions }
    }

    pub fn from_captions(captions: Vec<Caption>) -> Self {
        Self { captions }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Caption> {
        self.captions.iter()
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    pub fn for_segment(&self, segment_index: usize) -> impl Iterator<Item = &Caption> {
        self.captions
            .iter()
            .filter(move |c| c.segment_index == segment_index)
    }

    /// SubRip rendering: sequential index, `HH:MM:SS,mmm --> HH:MM:SS,mmm`, text.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, caption) in self.captions.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                Timestamp::from_seconds(caption.start).to_srt(),
                Timestamp::from_seconds(caption.end).to_srt(),
                caption.text
            ));
        }
        out
    }

    /// Overlay rendering for burn-in, derived from the same caption list as the SRT.
    pub fn overlay_directives(&self) -> Vec<OverlayDirective> {
        self.captions
            .iter()
            .map(|c| OverlayDirective {
                text: c.text.clone(),
                start: c.start,
                end: c.end,
                style: c.style(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::SegmentKind;

    fn entry(index: usize, start: f64, end: f64) -> TimelineEntry {
        TimelineEntry {
            index,
            kind: SegmentKind::Narration,
            start,
            end,
        }
    }

    #[test]
    fn test_short_text_is_one_fragment() {
        assert_eq!(split_caption_text("Wait for it", 40), vec!["Wait for it"]);
    }

    #[test]
    fn test_sentences_are_not_merged() {
        let parts = split_caption_text("Stop. Look. Listen.", 40);
        assert_eq!(parts, vec!["Stop.", "Look.", "Listen."]);
    }

    #[test]
    fn test_long_sentence_splits_on_clauses_then_packs() {
        let text = "First, the models got bigger, then they got cheaper, and now they run on your phone";
        let parts = split_caption_text(text, 40);
        assert!(parts.iter().all(|p| p.chars().count() <= 40));
        assert_eq!(parts[0], "First, the models got bigger,");
        assert_eq!(parts.join(" "), text);
    }

    #[test]
    fn test_word_wrap_never_breaks_words() {
        let text = "supercalifragilisticexpialidocious is a long word indeed";
        let parts = split_caption_text(text, 10);
        assert_eq!(parts[0], "supercalifragilisticexpialidocious");
        for part in &parts[1..] {
            assert!(part.chars().count() <= 10);
        }
        assert_eq!(parts.join(" "), text);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let parts = split_caption_text("  Wait \n for   it ", 40);
        assert_eq!(parts, vec!["Wait for it"]);
    }

    #[test]
    fn test_intervals_partition_segment() {
        let segment = Segment::narration("One. Two two. Three three three.");
        let captions = compile_captions(&segment, &entry(1, 2.0, 6.0), 40);
        assert_eq!(captions.len(), 3);
        assert_eq!(captions[0].start, 2.0);
        assert_eq!(captions.last().unwrap().end, 6.0);
        for pair in captions.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        // "One." is 4 of 4 + 8 + 18 = 30 characters.
        assert!((captions[0].duration() - 4.0 * 4.0 / 30.0).abs() < 1e-9);
        assert!(captions.iter().all(|c| !c.emphasis));
    }

    #[test]
    fn test_hook_captions_are_emphasized() {
        let segment = Segment::hook("Wait for it");
        let captions = compile_captions(&segment, &entry(0, 0.0, 2.0), 40);
        assert_eq!(captions.len(), 1);
        assert!(captions[0].emphasis);
        assert_eq!(captions[0].style(), CaptionStyle::Hook);
    }

    #[test]
    fn test_srt_and_overlay_agree() {
        let track = CaptionTrack::from_captions(vec![
            Caption {
                segment_index: 0,
                text: "Wait for it".into(),
                start: 0.0,
                end: 2.0,
                emphasis: true,
            },
            Caption {
                segment_index: 1,
                text: "This changes everything".into(),
                start: 2.0,
                end: 6.0,
                emphasis: false,
            },
        ]);
        let srt = track.to_srt();
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:02,000\nWait for it\n\n2\n00:00:02,000 --> 00:00:06,000\nThis changes everything\n\n"
        );
        let overlays = track.overlay_directives();
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].style, CaptionStyle::Hook);
        assert_eq!(overlays[1].start, 2.0);
    }
}
