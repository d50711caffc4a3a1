/// Phrases that help a diffusion prompt but only confuse a stock search.
const PROMPT_ENHANCERS: &[&str] = &[
    "vibrant colors",
    "high contrast",
    "professional photography",
    "trending on instagram",
    "vertical composition",
    "dramatic lighting",
    "sharp focus",
    "8k uhd",
    "ultra detailed",
    "photorealistic",
];

const MAX_QUERY_WORDS: usize = 5;

/// Turn a free-text visual description into a short stock-search query.
pub fn search_query(visual: &str) -> String {
    let mut query = visual.to_lowercase();
    for phrase in PROMPT_ENHANCERS {
        query = query.replace(phrase, "");
    }
    query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c == ',' || c == '.'))
        .filter(|w| !w.is_empty())
        .take(MAX_QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}
