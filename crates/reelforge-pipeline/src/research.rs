//! Web research ahead of drafting: search, read the top articles and pull
//! out citable facts the script is then built from.

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, warn};

use reelforge_core::{NarrationStyle, ReelError, ReelResult, ResearchConfig};
use reelforge_ir::{Script, Segment};

use crate::input::InputDocument;
use crate::narration::{
    parse_script_response, style_closing, style_guidance, template_script, truncate_chars,
    LlmNarrator, NarrationSource,
};

const MAX_ARTICLE_CHARS: usize = 5000;
const MAX_FACTS: usize = 15;
const MAX_IMAGE_KEYWORDS: usize = 15;
const MAX_SUMMARY_CHARS: usize = 500;
const HOOK_SECONDS: f64 = 3.0;
const CLOSING_SECONDS: f64 = 3.0;

const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "politics",
        &[
            "president", "government", "election", "congress", "senate", "minister",
            "diplomatic", "policy", "legislation", "vote",
        ],
    ),
    (
        "economy",
        &[
            "economy", "market", "stock", "gdp", "inflation", "trade", "tariff", "financial",
            "investment", "dollar", "currency",
        ],
    ),
    (
        "technology",
        &[
            "ai", "artificial intelligence", "tech", "software", "app", "startup", "innovation",
            "digital", "data", "algorithm",
        ],
    ),
    (
        "human_rights",
        &[
            "human rights", "refugee", "asylum", "immigration", "detention", "humanitarian",
            "abuse", "freedom", "justice",
        ],
    ),
    (
        "international",
        &[
            "international", "foreign", "relations", "treaty", "alliance", "nato", "un",
            "sanctions", "diplomacy",
        ],
    ),
    (
        "military",
        &[
            "military", "army", "navy", "defense", "war", "troops", "weapons", "attack",
            "conflict", "security",
        ],
    ),
    (
        "health",
        &[
            "health", "medical", "vaccine", "disease", "hospital", "treatment", "pandemic",
            "healthcare",
        ],
    ),
    (
        "environment",
        &[
            "climate", "environment", "pollution", "carbon", "renewable", "sustainability",
            "emissions",
        ],
    ),
];

/// Search-friendly subjects per category, appended to the image keywords.
fn category_subjects(category: &str) -> &'static [&'static str] {
    match category {
        "politics" => &["government building", "press conference", "podium speech", "capitol"],
        "economy" => &["stock market", "money", "financial chart", "business"],
        "technology" => &["technology", "digital", "computer", "innovation"],
        "military" => &["military", "soldiers", "defense", "security"],
        "human_rights" => &["protest", "people", "crowd", "justice"],
        "international" => &["world map", "diplomacy", "flags", "summit"],
        "health" => &["hospital", "medical", "healthcare", "doctor"],
        "environment" => &["nature", "climate", "earth", "green"],
        _ => &[],
    }
}

/// Backdrop used in a fact scene's visual description.
fn category_backdrop(category: &str) -> &'static str {
    match category {
        "politics" => "government building, official setting, press conference",
        "economy" => "financial charts, money, business meeting",
        "military" => "military personnel, defense equipment, security",
        "human_rights" => "people gathering, protest, community",
        "international" => "world map, diplomatic meeting, flags",
        "technology" => "modern technology, digital interface, innovation",
        _ => "news broadcast, professional",
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchSource {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub domain: String,
}

/// What research produced for a topic.
#[derive(Debug, Clone, Serialize)]
pub struct Research {
    pub topic: String,
    pub category: &'static str,
    pub sources: Vec<ResearchSource>,
    /// Fact-like sentences, most topic-relevant first.
    pub key_facts: Vec<String>,
    pub summary: String,
    pub image_keywords: Vec<String>,
}

struct Patterns {
    result_link: Regex,
    result_snippet: Regex,
    href: Regex,
    article: Regex,
    main: Regex,
    noise: Regex,
    tag: Regex,
    whitespace: Regex,
    sentence_end: Regex,
    fact: Regex,
    proper_noun: Regex,
    percent: Regex,
    money: Regex,
    year: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            result_link: Regex::new(r#"(?s)<a([^>]*class="result__a"[^>]*)>(.*?)</a>"#)?,
            result_snippet: Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#)?,
            href: Regex::new(r#"href="([^"]*)""#)?,
            article: Regex::new(r"(?is)<article\b[^>]*>(.*)</article>")?,
            main: Regex::new(r"(?is)<main\b[^>]*>(.*)</main>")?,
            noise: Regex::new(concat!(
                r"(?is)<script\b.*?</script>|<style\b.*?</style>|<nav\b.*?</nav>",
                r"|<header\b.*?</header>|<footer\b.*?</footer>|<aside\b.*?</aside>",
                r"|<!--.*?-->"
            ))?,
            tag: Regex::new(r"<[^>]*>")?,
            whitespace: Regex::new(r"\s+")?,
            sentence_end: Regex::new(r"[.!?]+")?,
            fact: Regex::new(concat!(
                r"(?i)\d{4}|\d+%|\$\d+|\d+ (?:million|billion|thousand)",
                r"|\b(?:said|announced|reported|according to|confirmed|stated|declared)\b"
            ))?,
            proper_noun: Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b")?,
            percent: Regex::new(r"\d+%")?,
            money: Regex::new(r"(?i)\$[\d,]+(?:\s*(?:million|billion))?")?,
            year: Regex::new(r"\b20\d{2}\b")?,
        })
    }

    /// Plain text of an HTML fragment.
    fn text_of(&self, html: &str) -> String {
        let without_tags = self.tag.replace_all(html, " ");
        let decoded = decode_entities(&without_tags);
        self.whitespace.replace_all(&decoded, " ").trim().to_string()
    }

    /// Readable article text: `<article>` or `<main>` when present, chrome
    /// removed, capped at [`MAX_ARTICLE_CHARS`].
    fn article_text(&self, html: &str) -> String {
        let cleaned = self.noise.replace_all(html, " ");
        let body = self
            .article
            .captures(&cleaned)
            .or_else(|| self.main.captures(&cleaned))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(&cleaned);
        truncate_chars(&self.text_of(body), MAX_ARTICLE_CHARS)
    }

    /// Hits from a DuckDuckGo HTML results page, in page order.
    fn search_results(&self, html: &str) -> Vec<ResearchSource> {
        let links: Vec<_> = self.result_link.captures_iter(html).collect();
        let mut results = Vec::new();
        for (i, caps) in links.iter().enumerate() {
            let (Some(whole), Some(attrs), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let region_end = links
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(html.len());
            let snippet = self
                .result_snippet
                .captures(&html[whole.end()..region_end])
                .and_then(|c| c.get(1))
                .map(|m| self.text_of(m.as_str()))
                .unwrap_or_default();

            let Some(url) = self
                .href
                .captures(attrs.as_str())
                .and_then(|c| c.get(1))
                .and_then(|m| resolve_result_link(m.as_str()))
            else {
                continue;
            };
            let title = self.text_of(inner.as_str());
            if title.is_empty() {
                continue;
            }
            results.push(ResearchSource {
                title,
                domain: domain_of(&url),
                url,
                snippet,
            });
        }
        results
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Target of a result link. DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<target>`;
/// links that stay on DuckDuckGo (ads, internal pages) are dropped.
fn resolve_result_link(href: &str) -> Option<String> {
    let href = decode_entities(href);
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href
    };
    let url = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }
    match url.host_str() {
        Some(host) if host.ends_with("duckduckgo.com") => None,
        Some(_) => Some(absolute),
        None => None,
    }
}

fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

/// Highest-scoring category by keyword hits across topic and article text, or
/// `general` when nothing matches. Single words match whole words only.
fn categorize(topic: &str, texts: &[String]) -> &'static str {
    let mut haystack = topic.to_lowercase();
    for text in texts {
        haystack.push(' ');
        haystack.push_str(&text.to_lowercase());
    }
    let words: HashSet<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = ("general", 0);
    for (category, keywords) in CATEGORIES {
        let score = keywords
            .iter()
            .filter(|kw| {
                if kw.contains(' ') {
                    haystack.contains(**kw)
                } else {
                    words.contains(*kw)
                }
            })
            .count();
        if score > best.1 {
            best = (*category, score);
        }
    }
    best.0
}

/// Sentences of 41 to 299 characters carrying a number, a year, an amount or
/// an attribution verb. Deduplicated, ordered by how many topic words they
/// mention, at most [`MAX_FACTS`].
fn extract_facts(patterns: &Patterns, texts: &[String], topic: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut facts = Vec::new();
    for text in texts {
        for sentence in patterns.sentence_end.split(text) {
            let sentence = patterns.whitespace.replace_all(sentence.trim(), " ");
            let len = sentence.chars().count();
            if len <= 40 || len >= 300 || !patterns.fact.is_match(&sentence) {
                continue;
            }
            let key: String = sentence.to_lowercase().chars().take(100).collect();
            if seen.insert(key) {
                facts.push(sentence.into_owned());
            }
        }
    }

    let topic_words: HashSet<String> = topic.split_whitespace().map(str::to_lowercase).collect();
    let relevance = |fact: &String| {
        let lower = fact.to_lowercase();
        topic_words.iter().filter(|w| lower.contains(w.as_str())).count()
    };
    // Stable: equally relevant facts keep page order.
    facts.sort_by_key(|f| std::cmp::Reverse(relevance(f)));
    facts.truncate(MAX_FACTS);
    facts
}

fn summarize(topic: &str, facts: &[String]) -> String {
    if facts.is_empty() {
        return format!("Research on: {}", topic);
    }
    let summary = facts.iter().take(3).cloned().collect::<Vec<_>>().join(" ");
    if summary.chars().count() > MAX_SUMMARY_CHARS {
        format!("{}...", truncate_chars(&summary, MAX_SUMMARY_CHARS - 3))
    } else {
        summary
    }
}

fn image_keywords(
    patterns: &Patterns,
    topic: &str,
    facts: &[String],
    category: &str,
) -> Vec<String> {
    let mut candidates: Vec<String> = topic
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect();
    candidates.extend(category_subjects(category).iter().map(|s| s.to_string()));
    for fact in facts.iter().take(5) {
        candidates.extend(
            patterns
                .proper_noun
                .find_iter(fact)
                .take(2)
                .map(|m| m.as_str().to_string()),
        );
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|k| k.chars().count() > 2 && seen.insert(k.to_lowercase()))
        .take(MAX_IMAGE_KEYWORDS)
        .collect()
}

fn analyze(
    patterns: &Patterns,
    topic: &str,
    sources: Vec<ResearchSource>,
    texts: &[String],
) -> Research {
    let category = categorize(topic, texts);
    let key_facts = extract_facts(patterns, texts, topic);
    let summary = summarize(topic, &key_facts);
    let image_keywords = image_keywords(patterns, topic, &key_facts, category);
    Research {
        topic: topic.to_string(),
        category,
        sources,
        key_facts,
        summary,
        image_keywords,
    }
}

// ── Researcher ───────────────────────────────────────────────────────

/// Keyless web research over DuckDuckGo's HTML endpoint.
pub struct WebResearcher {
    client: reqwest::Client,
    config: ResearchConfig,
    patterns: Patterns,
}

impl WebResearcher {
    pub fn new(client: reqwest::Client, config: ResearchConfig) -> ReelResult<Self> {
        let patterns = Patterns::new()
            .map_err(|e| ReelError::Generation(format!("invalid research pattern: {}", e)))?;
        Ok(Self {
            client,
            config,
            patterns,
        })
    }

    /// Search the topic (plus a news-site search), read the top articles and
    /// analyse them. Fails only when no search returns anything.
    pub async fn research(&self, topic: &str) -> ReelResult<Research> {
        let max_sources = self.config.max_sources;
        info!(topic = %topic, "researching topic");

        let mut sources = match self.search(topic).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "web search failed");
                Vec::new()
            }
        };
        sources.truncate(max_sources);

        if !self.config.news_sites.is_empty() {
            let sites: Vec<String> = self
                .config
                .news_sites
                .iter()
                .map(|s| format!("site:{}", s))
                .collect();
            let query = format!("{} {}", topic, sites.join(" OR "));
            match self.search(&query).await {
                Ok(mut news) => {
                    news.truncate(max_sources / 2);
                    sources.extend(news);
                }
                Err(e) => debug!(error = %e, "news search failed"),
            }
        }

        let mut seen = HashSet::new();
        sources.retain(|s| seen.insert(s.url.clone()));
        sources.truncate(max_sources);
        if sources.is_empty() {
            return Err(ReelError::Fetch(format!(
                "web search returned no results for '{}'",
                topic
            )));
        }

        let mut texts = Vec::new();
        for source in sources.iter().take(self.config.max_articles) {
            texts.push(self.read_article(source).await);
        }

        let research = analyze(&self.patterns, topic, sources, &texts);
        info!(
            category = research.category,
            sources = research.sources.len(),
            facts = research.key_facts.len(),
            "research complete"
        );
        Ok(research)
    }

    async fn search(&self, query: &str) -> ReelResult<Vec<ResearchSource>> {
        let res = self
            .client
            .post(&self.config.search_url)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| ReelError::Fetch(format!("search request failed: {}", e)))?;
        if !res.status().is_success() {
            return Err(ReelError::Fetch(format!("search failed: {}", res.status())));
        }
        let html = res
            .text()
            .await
            .map_err(|e| ReelError::Fetch(format!("unreadable search page: {}", e)))?;
        let results = self.patterns.search_results(&html);
        debug!(query = %query, results = results.len(), "search results");
        Ok(results)
    }

    /// Article text, or the search snippet when the page can't be read.
    async fn read_article(&self, source: &ResearchSource) -> String {
        let page = match self.client.get(&source.url).send().await {
            Ok(res) if res.status().is_success() => res.text().await.ok(),
            Ok(res) => {
                debug!(url = %source.url, status = %res.status(), "article unavailable");
                None
            }
            Err(e) => {
                debug!(url = %source.url, error = %e, "article fetch failed");
                None
            }
        };
        match page.map(|html| self.patterns.article_text(&html)) {
            Some(text) if !text.is_empty() => text,
            _ => source.snippet.clone(),
        }
    }
}

// ── Narration ────────────────────────────────────────────────────────

/// Drafts from researched facts instead of the input's key points.
///
/// With a model configured the facts go into its prompt; without one, or
/// when its reply is unusable, the script is assembled from the facts
/// directly. When research finds nothing the input is drafted as usual.
pub struct ResearchNarrator {
    researcher: WebResearcher,
    llm: Option<LlmNarrator>,
    style: NarrationStyle,
}

impl ResearchNarrator {
    pub fn new(researcher: WebResearcher, llm: Option<LlmNarrator>, style: NarrationStyle) -> Self {
        Self {
            researcher,
            llm,
            style,
        }
    }

    async fn draft_without_research(
        &self,
        doc: &InputDocument,
        target_seconds: f64,
    ) -> ReelResult<Script> {
        match &self.llm {
            Some(llm) => llm.draft_script(doc, target_seconds).await,
            None => Ok(template_script(doc, target_seconds, self.style)),
        }
    }
}

#[async_trait]
impl NarrationSource for ResearchNarrator {
    fn name(&self) -> &str {
        "research"
    }

    fn is_heavy(&self) -> bool {
        self.llm.as_ref().is_some_and(|llm| llm.is_heavy())
    }

    async fn draft_script(&self, doc: &InputDocument, target_seconds: f64) -> ReelResult<Script> {
        let research = match self.researcher.research(&doc.title).await {
            Ok(research) if !research.key_facts.is_empty() => research,
            Ok(_) => {
                warn!("research found no usable facts, drafting from the input");
                return self.draft_without_research(doc, target_seconds).await;
            }
            Err(e) => {
                warn!(error = %e, "research failed, drafting from the input");
                return self.draft_without_research(doc, target_seconds).await;
            }
        };
        for source in research.sources.iter().take(3) {
            info!(domain = %source.domain, title = %source.title, "source");
        }

        if let Some(llm) = &self.llm {
            let prompt = research_prompt(&research, target_seconds, self.style);
            match llm
                .complete(&prompt)
                .await
                .and_then(|reply| parse_script_response(&reply, target_seconds))
            {
                // Hook plus at least three scenes.
                Ok(mut script) if script.len() > 3 => {
                    script.title = Some(doc.title.clone());
                    return Ok(script);
                }
                Ok(script) => warn!(
                    segments = script.len(),
                    "model draft too short, building the script from research"
                ),
                Err(e) => warn!(error = %e, "model draft failed, building the script from research"),
            }
        }

        let mut script =
            research_script(&self.researcher.patterns, &research, target_seconds, self.style);
        script.title = Some(doc.title.clone());
        Ok(script)
    }
}

/// Fact scenes to ask for: one per six seconds, between 5 and 10.
fn research_scene_count(target_seconds: f64) -> usize {
    ((target_seconds / 6.0).floor() as usize).clamp(5, 10)
}

fn research_prompt(research: &Research, target_seconds: f64, style: NarrationStyle) -> String {
    let facts: Vec<String> = research
        .key_facts
        .iter()
        .take(10)
        .map(|f| format!("- {}", f))
        .collect();
    format!(
        concat!(
            "Create a short vertical video script about: \"{topic}\"\n\n",
            "Researched facts (use only these, do not invent information):\n{facts}\n\n",
            "Topic category: {category}\n",
            "Style: {style}. {guidance}\n",
            "Target duration: {target} seconds\n",
            "Number of scenes: {scenes}\n\n",
            "Rules:\n",
            "1. Open with a hook of 2-3 seconds built on the most striking fact.\n",
            "2. Each scene needs narration (max 20 words), a searchable stock photo description and a caption.\n",
            "3. Include the numbers, dates and names from the facts.\n",
            "4. End with a question or call to action.\n\n",
            "Return JSON only:\n",
            "{{\"hook\": {{\"text\": \"...\", \"duration\": 3.0, \"visual_prompt\": \"...\", \"text_overlay\": \"...\"}},\n",
            " \"scenes\": [{{\"narration\": \"...\", \"duration\": 5.0, \"visual_prompt\": \"...\", \"text_overlay\": \"...\"}}]}}"
        ),
        topic = research.topic,
        facts = facts.join("\n"),
        category = research.category,
        style = style,
        guidance = style_guidance(style),
        target = target_seconds,
        scenes = research_scene_count(target_seconds),
    )
}

/// Build the script straight from the facts: a hook on the most striking
/// fact, one scene per fact, then the style's closing line.
fn research_script(
    patterns: &Patterns,
    research: &Research,
    target_seconds: f64,
    style: NarrationStyle,
) -> Script {
    let first_word = research
        .topic
        .split_whitespace()
        .next()
        .unwrap_or(research.topic.as_str());
    let mut script = Script::new(target_seconds);

    let hook = match research.key_facts.iter().take(5).find(|f| is_striking(f)) {
        Some(fact) => hook_line(fact, first_word),
        None => match research.key_facts.first() {
            Some(fact) => hook_line(fact, first_word),
            None => format!("What's really happening with {}?", research.topic),
        },
    };
    let lead_visual = research
        .image_keywords
        .first()
        .map(String::as_str)
        .unwrap_or(research.topic.as_str());
    script.add_segment(
        Segment::hook(hook.clone())
            .with_duration(HOOK_SECONDS)
            .with_visual(format!(
                "Breaking news style, {}, dramatic lighting, news graphic",
                lead_visual
            ))
            .with_caption(truncate_chars(&hook, 30).to_uppercase()),
    );

    let scenes = research_scene_count(target_seconds);
    let per_scene = ((target_seconds - HOOK_SECONDS) / scenes as f64).max(1.0);
    for (i, fact) in research.key_facts.iter().take(scenes - 1).enumerate() {
        let mut visual = fact_visual(patterns, fact, research);
        if let Some(keyword) = research.image_keywords.get(i) {
            if !visual.to_lowercase().contains(&keyword.to_lowercase()) {
                visual = format!("{}, {}", keyword, visual);
            }
        }
        script.add_segment(
            Segment::narration(fact_narration(fact))
                .with_duration(per_scene)
                .with_visual(visual)
                .with_caption(fact_caption(patterns, fact)),
        );
    }

    let (closing, closing_caption) = style_closing(style, first_word);
    script.add_segment(
        Segment::narration(closing)
            .with_duration(CLOSING_SECONDS)
            .with_visual("Social media engagement, follow button, notification bell, colorful")
            .with_caption(closing_caption),
    );
    script
}

fn is_striking(fact: &str) -> bool {
    let lower = fact.to_lowercase();
    ["%", "$", "million", "billion", "first", "breaking"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Shortest of a few hook phrasings around a fact.
fn hook_line(fact: &str, first_word: &str) -> String {
    let fact = if fact.chars().count() > 100 {
        format!("{}...", truncate_chars(fact, 97))
    } else {
        fact.to_string()
    };
    let plain = if fact.chars().count() < 60 {
        fact.clone()
    } else {
        format!("{}...", truncate_chars(&fact, 57))
    };
    [
        format!("Breaking: {}", truncate_chars(&fact, 60)),
        format!("You won't believe this about {}...", first_word),
        format!("This changes everything: {}", truncate_chars(&fact, 50)),
        plain,
    ]
    .into_iter()
    .min_by_key(|line| line.chars().count())
    .unwrap_or(fact)
}

/// A fact without its attribution tail, cut near 80 characters when long.
fn fact_narration(fact: &str) -> String {
    let mut text = fact;
    for tail in [" according to", " reported", " said "] {
        if let Some(idx) = text.find(tail) {
            text = &text[..idx];
        }
    }
    if text.chars().count() <= 100 {
        return text.trim().to_string();
    }

    let head = truncate_chars(text, 80);
    for punct in ['.', ',', ';', '-'] {
        if let Some(idx) = head.rfind(punct) {
            if idx > 40 {
                return head[..idx].trim().to_string();
            }
        }
    }
    format!("{}...", truncate_chars(text, 97).trim())
}

fn fact_visual(patterns: &Patterns, fact: &str, research: &Research) -> String {
    let backdrop = category_backdrop(research.category);
    if let Some(entity) = patterns.proper_noun.find(fact) {
        return format!("{} related imagery, {}, high quality photo", entity.as_str(), backdrop);
    }
    match research.image_keywords.first() {
        Some(keyword) => format!("{}, {}, professional photo", keyword, backdrop),
        None => format!("{}, news style, high quality", backdrop),
    }
}

/// A percentage, an amount or a year from the fact, else its first four words.
fn fact_caption(patterns: &Patterns, fact: &str) -> String {
    for pattern in [&patterns.percent, &patterns.money, &patterns.year] {
        if let Some(m) = pattern.find(fact) {
            return m.as_str().to_string();
        }
    }
    fact.split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_ir::SegmentKind;

    const RESULTS_PAGE: &str = r#"
<div class="result results_links web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.reuters.com%2Fworld%2Fvolcano&amp;rut=abc">Volcano <b>erupts</b> in Iceland</a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Lava reached the town &amp; roads on Monday.</a>
</div>
<div class="result result--ad">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_domain=example.com">Buy volcano tours</a>
  </h2>
</div>
<div class="result results_links web-result">
  <h2 class="result__title">
    <a class="result__a" rel="nofollow" href="https://apnews.com/article/iceland">Iceland evacuates Grindavik</a>
  </h2>
</div>
"#;

    fn patterns() -> Patterns {
        Patterns::new().unwrap()
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_search_results_decode_redirects_and_skip_ads() {
        let results = patterns().search_results(RESULTS_PAGE);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].url, "https://www.reuters.com/world/volcano");
        assert_eq!(results[0].domain, "reuters.com");
        assert_eq!(results[0].title, "Volcano erupts in Iceland");
        assert_eq!(results[0].snippet, "Lava reached the town & roads on Monday.");

        assert_eq!(results[1].url, "https://apnews.com/article/iceland");
        assert_eq!(results[1].snippet, "");
    }

    #[test]
    fn test_article_text_prefers_article_and_drops_chrome() {
        let html = r#"<html><head><style>p { color: red }</style></head>
<body><nav>Home | World</nav>
<article><h1>Eruption</h1><script>track()</script><p>Lava   flowed
for 3 km.</p></article><footer>(c) 2024</footer></body></html>"#;
        assert_eq!(patterns().article_text(html), "Eruption Lava flowed for 3 km.");

        let long = format!("<p>{}</p>", "word ".repeat(2000));
        assert_eq!(patterns().article_text(&long).chars().count(), MAX_ARTICLE_CHARS);
    }

    #[test]
    fn test_categorize_counts_whole_words() {
        assert_eq!(
            categorize("Senate vote", &texts(&["The president addressed the election."])),
            "politics"
        );
        // "un" must not match inside "under" or "fun".
        assert_eq!(categorize("Fun under the sun", &[]), "general");
        assert_eq!(
            categorize("Reef", &texts(&["Carbon emissions and climate change"])),
            "environment"
        );
    }

    #[test]
    fn test_extract_facts_filters_dedupes_and_ranks() {
        let page = texts(&[concat!(
            "Short one in 2024. ",
            "The volcano near Grindavik erupted again in 2024, officials confirmed on Monday. ",
            "Scientists said the magma flow was slowing down across the whole peninsula. ",
            "The volcano near Grindavik erupted again in 2024, officials confirmed on Monday! ",
            "This sentence is long enough but carries no indicator of any kind at all."
        )]);
        let facts = extract_facts(&patterns(), &page, "Grindavik volcano");
        assert_eq!(facts.len(), 2);
        assert!(facts[0].starts_with("The volcano near Grindavik"));
        assert!(facts[1].starts_with("Scientists said"));
    }

    #[test]
    fn test_summary_is_capped() {
        assert_eq!(summarize("Volcanoes", &[]), "Research on: Volcanoes");
        let facts = vec!["a".repeat(300), "b".repeat(300)];
        let summary = summarize("Volcanoes", &facts);
        assert_eq!(summary.chars().count(), MAX_SUMMARY_CHARS);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_image_keywords_mix_topic_category_and_names() {
        let facts = texts(&["Prime Minister Katrin Jakobsdottir visited Grindavik on Monday."]);
        let keywords = image_keywords(&patterns(), "Iceland volcano now", &facts, "environment");
        assert_eq!(&keywords[..2], &["Iceland".to_string(), "volcano".to_string()]);
        assert!(keywords.contains(&"nature".to_string()));
        assert!(keywords.contains(&"Prime Minister Katrin Jakobsdottir".to_string()));
        assert!(!keywords.contains(&"now".to_string()));
    }

    #[test]
    fn test_fact_narration_drops_attribution() {
        assert_eq!(
            fact_narration("Lava crossed the main road on Monday, according to police"),
            "Lava crossed the main road on Monday,"
        );
        let long = format!("{}, {}", "a".repeat(60), "b".repeat(60));
        assert_eq!(fact_narration(&long), "a".repeat(60));
    }

    #[test]
    fn test_fact_caption_prefers_numbers() {
        let p = patterns();
        assert_eq!(fact_caption(&p, "Prices rose 12% in 2024"), "12%");
        assert_eq!(fact_caption(&p, "It cost $4,500 million in total"), "$4,500 million");
        assert_eq!(fact_caption(&p, "The eruption began in 2023 near town"), "2023");
        assert_eq!(
            fact_caption(&p, "Officials confirmed the evacuation today"),
            "OFFICIALS CONFIRMED THE EVACUATION"
        );
    }

    #[test]
    fn test_research_script_shape() {
        let p = patterns();
        let facts = texts(&[
            "Officials confirmed the eruption began late on Sunday evening near the town",
            "About 4,000 residents were evacuated, which is 100% of the town, police said",
            "The Blue Lagoon spa was closed for the third time in 2024 as a precaution",
        ]);
        let research = analyze(&p, "Grindavik eruption", Vec::new(), &facts);
        let script = research_script(&p, &research, 60.0, NarrationStyle::News);

        // Hook, one scene per fact, closing.
        assert_eq!(script.len(), 5);
        assert_eq!(script.segments[0].kind, SegmentKind::Hook);
        assert_eq!(script.segments[0].duration, Some(HOOK_SECONDS));
        assert_eq!(
            script.segments[0].narration,
            "You won't believe this about Grindavik..."
        );
        assert_eq!(script.segments[2].caption.as_deref(), Some("100%"));
        assert_eq!(script.segments[3].caption.as_deref(), Some("2024"));
        // (60 - 3) / 10 scenes.
        assert_eq!(script.segments[1].duration, Some(5.7));
        let closing = script.segments.last().unwrap();
        assert_eq!(closing.narration, "Follow for more updates on Grindavik!");
        assert_eq!(closing.duration, Some(CLOSING_SECONDS));
    }

    #[test]
    fn test_research_prompt_lists_facts_and_style() {
        let p = patterns();
        let facts = texts(&["Officials confirmed the eruption began late on Sunday evening"]);
        let research = analyze(&p, "Grindavik eruption", Vec::new(), &facts);
        let prompt = research_prompt(&research, 30.0, NarrationStyle::Reaction);
        assert!(prompt.contains("- Officials confirmed the eruption"));
        assert!(prompt.contains("Style: reaction."));
        assert!(prompt.contains("Number of scenes: 5"));
    }

    #[tokio::test]
    async fn test_unreachable_search_falls_back_to_input() {
        let config = ResearchConfig {
            enabled: true,
            search_url: "http://127.0.0.1:9/html/".to_string(),
            ..ResearchConfig::default()
        };
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let narrator = ResearchNarrator::new(
            WebResearcher::new(client, config).unwrap(),
            None,
            NarrationStyle::Explainer,
        );
        let doc = InputDocument {
            title: "Tides".into(),
            key_points: vec!["The moon pulls the oceans into two bulges".into()],
            context: String::new(),
            target_seconds: 30.0,
        };
        let script = narrator.draft_script(&doc, 30.0).await.unwrap();
        assert_eq!(script.segments[0].narration, "Here's how Tides actually works.");
        assert_eq!(script.segments[1].narration, "The moon pulls the oceans into two bulges");
        assert!(!narrator.is_heavy());
    }
}
