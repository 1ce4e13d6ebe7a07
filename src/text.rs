//! Text normalization applied before vectorization.
//!
//! The same function runs over corpus documents and over search queries, so
//! both sides of a similarity comparison see identically cleaned text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("valid url pattern"));

static HTML_TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid html tag pattern"));

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid character class"));

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
        "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
        "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
        "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
        "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself",
        "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on",
        "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
        "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
        "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
        "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
        "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours",
        "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Cleans raw article or query text.
///
/// Lowercases, strips URLs and HTML tags, replaces punctuation with spaces,
/// drops English stop words and collapses whitespace. Pure and deterministic.
pub fn clean_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_urls = URL_PATTERN.replace_all(&lowered, " ");
    let without_tags = HTML_TAG_PATTERN.replace_all(&without_urls, " ");
    let alphanumeric = NON_ALPHANUMERIC.replace_all(&without_tags, " ");

    alphanumeric
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(*word))
        .collect::<Vec<_>>()
        .join(" ")
}
