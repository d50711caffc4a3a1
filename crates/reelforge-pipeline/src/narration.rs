//! Narration sources: turn an [`InputDocument`] into a draft [`Script`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use reelforge_assets::backends::http_client;
use reelforge_core::{
    NarrationConfig, NarrationProvider, NarrationStyle, ReelConfig, ReelError, ReelResult,
};
use reelforge_ir::{Script, Segment};

use crate::input::InputDocument;
use crate::research::{ResearchNarrator, WebResearcher};

/// Drafts the narration script for a run.
#[async_trait]
pub trait NarrationSource: Send + Sync {
    fn name(&self) -> &str;

    /// Whether drafting runs a local model and must hold the heavy-step permit.
    fn is_heavy(&self) -> bool {
        false
    }

    async fn draft_script(&self, doc: &InputDocument, target_seconds: f64) -> ReelResult<Script>;
}

/// Build the narration source selected by `[narration].provider`, wrapped in
/// a [`ResearchNarrator`] when `[narration.research].enabled` is set.
pub fn narrator_from_config(config: &ReelConfig) -> ReelResult<Arc<dyn NarrationSource>> {
    let narration = &config.narration;
    let llm = match narration.provider {
        NarrationProvider::Template => None,
        NarrationProvider::Llm => Some(LlmNarrator::new(
            http_client(config.assets.request_timeout_seconds.max(120))?,
            narration.clone(),
        )),
    };

    if narration.research.enabled {
        let researcher = WebResearcher::new(
            http_client(config.assets.request_timeout_seconds)?,
            narration.research.clone(),
        )?;
        return Ok(Arc::new(ResearchNarrator::new(researcher, llm, narration.style)));
    }

    Ok(match llm {
        Some(llm) => Arc::new(llm),
        None => Arc::new(TemplateNarrator::new(narration.style)),
    })
}

/// Opening hook line and its caption for a style.
pub(crate) fn style_hook(style: NarrationStyle, title: &str) -> (String, &'static str) {
    match style {
        NarrationStyle::Informational => (format!("Wait... did you know about {}?", title), "WAIT!"),
        NarrationStyle::Explainer => (format!("Here's how {} actually works.", title), "HOW IT WORKS"),
        NarrationStyle::News => (format!("Breaking: what's happening with {}.", title), "BREAKING"),
        NarrationStyle::Reaction => (format!("I can't believe this about {}...", title), "NO WAY"),
    }
}

/// Closing call to action and its caption for a style.
pub(crate) fn style_closing(style: NarrationStyle, title: &str) -> (String, &'static str) {
    match style {
        NarrationStyle::Informational => ("Follow for more insights!".to_string(), "FOLLOW FOR MORE!"),
        NarrationStyle::Explainer => (
            "Now you know. Share this with someone curious!".to_string(),
            "SHARE THIS!",
        ),
        NarrationStyle::News => (
            format!("Follow for more updates on {}!", title),
            "FOLLOW FOR UPDATES",
        ),
        NarrationStyle::Reaction => (
            "What do you think? Tell me in the comments!".to_string(),
            "COMMENT BELOW",
        ),
    }
}

/// Tone instruction given to the model for a style.
pub(crate) fn style_guidance(style: NarrationStyle) -> &'static str {
    match style {
        NarrationStyle::Informational => "Clear and factual, one idea per scene.",
        NarrationStyle::Explainer => {
            "Walk through how it works step by step, using simple analogies."
        }
        NarrationStyle::News => {
            "Lead with the newest development, then give context. Neutral tone, names and dates up front."
        }
        NarrationStyle::Reaction => {
            "First-person and opinionated, react to each point with surprise or humor."
        }
    }
}

/// Number of scenes to ask for: roughly one per five seconds, between 5 and 8.
pub fn scene_count(target_seconds: f64) -> usize {
    ((target_seconds / 5.0).floor() as usize).clamp(5, 8)
}

// ── Template ─────────────────────────────────────────────────────────

/// Deterministic offline script built straight from the key points.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator {
    style: NarrationStyle,
}

impl TemplateNarrator {
    pub fn new(style: NarrationStyle) -> Self {
        Self { style }
    }
}

#[async_trait]
impl NarrationSource for TemplateNarrator {
    fn name(&self) -> &str {
        "template"
    }

    async fn draft_script(&self, doc: &InputDocument, target_seconds: f64) -> ReelResult<Script> {
        Ok(template_script(doc, target_seconds, self.style))
    }
}

pub(crate) fn template_script(
    doc: &InputDocument,
    target_seconds: f64,
    style: NarrationStyle,
) -> Script {
    let mut script = Script::new(target_seconds);
    script.title = Some(doc.title.clone());
    let (hook, hook_caption) = style_hook(style, &doc.title);
    script.add_segment(
        Segment::hook(hook)
            .with_duration(2.0)
            .with_visual(format!(
                "Eye-catching visual related to {}, vibrant colors, high contrast",
                doc.title
            ))
            .with_caption(hook_caption),
    );

    let per_scene = ((target_seconds - 2.0) / doc.key_points.len().max(5) as f64)
        .floor()
        .max(4.0);
    for point in doc.key_points.iter().take(6) {
        script.add_segment(
            Segment::narration(truncate_chars(point, 80))
                .with_duration(per_scene)
                .with_visual(format!("Visual representation of: {}, cinematic, vibrant", point))
                .with_caption(truncate_chars(point, 50)),
        );
    }

    if script.len() - 1 < 5 {
        let (closing, closing_caption) = style_closing(style, &doc.title);
        script.add_segment(
            Segment::narration(closing)
                .with_duration(3.0)
                .with_visual("Call to action visual, engaging, colorful")
                .with_caption(closing_caption),
        );
    }
    script
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ── LLM ──────────────────────────────────────────────────────────────

/// OpenAI-compatible chat completion endpoint (hosted API or a local server).
pub struct LlmNarrator {
    client: reqwest::Client,
    config: NarrationConfig,
}

impl LlmNarrator {
    pub fn new(client: reqwest::Client, config: NarrationConfig) -> Self {
        Self { client, config }
    }

    fn prompt(doc: &InputDocument, target_seconds: f64, style: NarrationStyle) -> String {
        let scenes = scene_count(target_seconds);
        let points: Vec<String> = doc
            .key_points
            .iter()
            .take(6)
            .map(|p| format!("- {}", p))
            .collect();
        format!(
            concat!(
                "Create a short vertical video script about: \"{title}\"\n\n",
                "Target duration: {target} seconds\n",
                "Number of scenes: {scenes}\n",
                "Style: {style}. {guidance}\n\n",
                "Key points to cover:\n{points}\n\n",
                "Requirements:\n",
                "1. Start with a strong hook of 1-2 seconds.\n",
                "2. Break the content into {scenes} fast-paced scenes.\n",
                "3. Each scene needs punchy narration (max 10 words), a visual description and a caption.\n",
                "4. End with a call to action.\n\n",
                "Return JSON only:\n",
                "{{\"hook\": {{\"text\": \"...\", \"duration\": 2.0, \"visual_prompt\": \"...\", \"text_overlay\": \"...\"}},\n",
                " \"scenes\": [{{\"narration\": \"...\", \"duration\": 5.0, \"visual_prompt\": \"...\", \"text_overlay\": \"...\"}}]}}"
            ),
            title = doc.title,
            target = target_seconds,
            scenes = scenes,
            style = style,
            guidance = style_guidance(style),
            points = points.join("\n"),
        )
    }

    /// Send one user prompt and return the model's reply text.
    pub(crate) async fn complete(&self, prompt: &str) -> ReelResult<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": "You write scripts for short vertical videos. Reply with JSON only."},
                {"role": "user", "content": prompt},
            ],
        });

        info!(model = %self.config.model, url = %url, "drafting script");
        let mut request = self.client.post(&url).json(&body);
        // Local servers usually run without a key.
        if let Ok(key) = std::env::var(&self.config.api_key_env) {
            request = request.bearer_auth(key);
        }
        let res = request
            .send()
            .await
            .map_err(|e| ReelError::Generation(format!("chat completion request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ReelError::Generation(format!(
                "chat completion failed: {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let raw: serde_json::Value = res
            .json()
            .await
            .map_err(|e| ReelError::Generation(format!("invalid chat completion JSON: {}", e)))?;
        let content = raw
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                ReelError::Generation(
                    "unexpected chat completion shape (missing choices[0].message.content)".into(),
                )
            })?;
        debug!(chars = content.len(), "received script draft");
        Ok(content.to_string())
    }
}

#[async_trait]
impl NarrationSource for LlmNarrator {
    fn name(&self) -> &str {
        "llm"
    }

    fn is_heavy(&self) -> bool {
        self.config.heavy
    }

    async fn draft_script(&self, doc: &InputDocument, target_seconds: f64) -> ReelResult<Script> {
        let prompt = Self::prompt(doc, target_seconds, self.config.style);
        let content = self.complete(&prompt).await?;
        let mut script = parse_script_response(&content, target_seconds)?;
        script.title = Some(doc.title.clone());
        Ok(script)
    }
}

#[derive(Debug, Deserialize)]
struct DraftHook {
    text: String,
    duration: Option<f64>,
    #[serde(default)]
    visual_prompt: String,
    text_overlay: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftScene {
    narration: String,
    duration: Option<f64>,
    #[serde(default)]
    visual_prompt: String,
    text_overlay: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Draft {
    hook: DraftHook,
    #[serde(default)]
    scenes: Vec<DraftScene>,
}

/// Parse a model reply: the span from the first `{` to the last `}` must be
/// a `{hook, scenes}` object. Missing durations are left to the timing engine.
pub fn parse_script_response(response: &str, target_seconds: f64) -> ReelResult<Script> {
    let (start, end) = match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if e > s => (s, e),
        _ => {
            return Err(ReelError::Generation(
                "model reply contains no JSON object".into(),
            ))
        }
    };
    let draft: Draft = serde_json::from_str(&response[start..=end])
        .map_err(|e| ReelError::Generation(format!("model reply is not a valid script: {}", e)))?;

    let mut script = Script::new(target_seconds);
    script.add_segment(draft_segment(
        Segment::hook(draft.hook.text),
        draft.hook.duration,
        draft.hook.visual_prompt,
        draft.hook.text_overlay,
    ));
    for scene in draft.scenes {
        script.add_segment(draft_segment(
            Segment::narration(scene.narration),
            scene.duration,
            scene.visual_prompt,
            scene.text_overlay,
        ));
    }
    Ok(script)
}

fn draft_segment(
    mut segment: Segment,
    duration: Option<f64>,
    visual: String,
    overlay: Option<String>,
) -> Segment {
    if let Some(seconds) = duration {
        segment = segment.with_duration(seconds);
    }
    if !visual.trim().is_empty() {
        segment = segment.with_visual(visual);
    }
    match overlay {
        Some(text) if !text.trim().is_empty() => segment.with_caption(text),
        _ => segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_ir::SegmentKind;

    fn doc(points: &[&str]) -> InputDocument {
        InputDocument {
            title: "Octopuses".into(),
            key_points: points.iter().map(|p| p.to_string()).collect(),
            context: String::new(),
            target_seconds: 30.0,
        }
    }

    #[test]
    fn test_scene_count_bounds() {
        assert_eq!(scene_count(10.0), 5);
        assert_eq!(scene_count(35.0), 7);
        assert_eq!(scene_count(120.0), 8);
    }

    #[tokio::test]
    async fn test_template_script_shape() {
        let script = TemplateNarrator::default()
            .draft_script(&doc(&["Three hearts pump blue blood", "Arms can taste"]), 30.0)
            .await
            .unwrap();

        assert_eq!(script.len(), 4);
        assert_eq!(script.segments[0].kind, SegmentKind::Hook);
        assert_eq!(script.segments[0].narration, "Wait... did you know about Octopuses?");
        assert_eq!(script.segments[0].caption.as_deref(), Some("WAIT!"));
        // (30 - 2) / max(2, 5) = 5.6, floored.
        assert_eq!(script.segments[1].duration, Some(5.0));
        assert_eq!(script.segments[3].narration, "Follow for more insights!");
        assert_eq!(script.segments[3].duration, Some(3.0));
        assert_eq!(script.title.as_deref(), Some("Octopuses"));
    }

    #[tokio::test]
    async fn test_template_caps_points_and_text() {
        let long = "x".repeat(120);
        let points: Vec<&str> = std::iter::repeat(long.as_str()).take(9).collect();
        let script = TemplateNarrator::default()
            .draft_script(&doc(&points), 60.0)
            .await
            .unwrap();

        // Hook plus six scenes; no closing segment once five scenes exist.
        assert_eq!(script.len(), 7);
        assert_eq!(script.segments[1].narration.len(), 80);
        assert_eq!(script.segments[1].caption.as_ref().unwrap().len(), 50);
        assert_eq!(script.segments[1].duration, Some(6.0));
    }

    #[test]
    fn test_parse_response_with_surrounding_prose() {
        let reply = r#"Sure! Here is your script:
{"hook": {"text": "Wait for it", "duration": 2.0, "visual_prompt": "clock", "text_overlay": "WAIT"},
 "scenes": [{"narration": "This changes everything", "visual_prompt": "sunrise", "text_overlay": ""}]}
Enjoy."#;
        let script = parse_script_response(reply, 6.0).unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.segments[0].duration, Some(2.0));
        assert_eq!(script.segments[0].caption.as_deref(), Some("WAIT"));
        assert_eq!(script.segments[1].duration, None);
        assert_eq!(script.segments[1].caption, None);
        assert_eq!(script.segments[1].visual_description(), "sunrise");
    }

    #[test]
    fn test_parse_response_failures_are_generation_errors() {
        assert!(matches!(
            parse_script_response("no json here", 6.0),
            Err(ReelError::Generation(_))
        ));
        assert!(matches!(
            parse_script_response(r#"{"scenes": []}"#, 6.0),
            Err(ReelError::Generation(_))
        ));
    }

    #[test]
    fn test_prompt_mentions_scene_count_and_points() {
        let prompt = LlmNarrator::prompt(&doc(&["Three hearts"]), 30.0, NarrationStyle::default());
        assert!(prompt.contains("Number of scenes: 6"));
        assert!(prompt.contains("- Three hearts"));
        assert!(prompt.contains("Style: informational."));
    }

    #[test]
    fn test_prompt_carries_style_guidance() {
        let prompt = LlmNarrator::prompt(&doc(&["Three hearts"]), 30.0, NarrationStyle::Explainer);
        assert!(prompt.contains("Style: explainer. Walk through how it works"));
    }

    #[tokio::test]
    async fn test_template_style_changes_hook_and_closing() {
        let script = TemplateNarrator::new(NarrationStyle::News)
            .draft_script(&doc(&["Three hearts pump blue blood"]), 30.0)
            .await
            .unwrap();
        assert_eq!(
            script.segments[0].narration,
            "Breaking: what's happening with Octopuses."
        );
        assert_eq!(script.segments[0].caption.as_deref(), Some("BREAKING"));
        let closing = script.segments.last().unwrap();
        assert_eq!(closing.narration, "Follow for more updates on Octopuses!");
        assert_eq!(closing.caption.as_deref(), Some("FOLLOW FOR UPDATES"));

        let reaction = TemplateNarrator::new(NarrationStyle::Reaction)
            .draft_script(&doc(&["Three hearts pump blue blood"]), 30.0)
            .await
            .unwrap();
        assert_eq!(reaction.segments[0].caption.as_deref(), Some("NO WAY"));
    }
}
