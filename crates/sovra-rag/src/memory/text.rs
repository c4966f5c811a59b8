//! Token-level text helpers used for keyword relevance and tagging

use std::collections::{HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "between", "both", "could",
    "does", "doing", "during", "each", "from", "further", "have", "having", "here", "into",
    "just", "more", "most", "once", "only", "other", "over", "same", "should", "some", "such",
    "than", "that", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "under", "until", "very", "were", "what", "when", "where", "which", "while",
    "will", "with", "would", "your",
];

/// Minimum length of an extracted keyword
const MIN_KEYWORD_LEN: usize = 4;

/// Lower-cased alphanumeric tokens, in order of appearance
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Distinct tokens of `text`
pub fn token_set(text: &str) -> HashSet<String> {
    tokens(text).collect()
}

/// Jaccard similarity of two token sets; 0 when both are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Most frequent content words of `text`, ties broken by first appearance
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, token) in tokens(text).enumerate() {
        if token.chars().count() < MIN_KEYWORD_LEN
            || STOP_WORDS.contains(&token.as_str())
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (ca, pa)), (_, (cb, pb))| cb.cmp(ca).then(pa.cmp(pb)));
    ranked.into_iter().take(max).map(|(word, _)| word).collect()
}
