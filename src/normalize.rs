//! Display-name cleanup: noisy profile text to a usable first name.
//!
//! Profile display names carry emoji decoration, branding after a
//! separator ("Jane | Fitness Coach") and odd Unicode forms. `normalize`
//! makes a best-effort guess at the first name and falls back to a
//! caller-supplied value (usually the handle) when nothing usable is left.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Title/handle separators. Only the text before the first match is kept.
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[|•·▫◽/]\s*|\s+[-—]\s+").unwrap());

/// Decorations left dangling at the end of a name.
const TRAILING_DECORATION: &[char] = &['.', ',', '!', '?', '♡', '✨', '✺', '★', '☆', ' '];

/// Pictographic code points removed before any splitting.
fn is_pictographic(ch: char) -> bool {
    matches!(
        ch,
        '\u{1F1E0}'..='\u{1F1FF}'   // regional indicators (flags)
            | '\u{1F300}'..='\u{1F9FF}' // emoticons, misc symbols
            | '\u{2600}'..='\u{27BF}'   // misc symbols, dingbats
            | '\u{25A0}'..='\u{25FF}'   // geometric shapes
            | '\u{FE0F}'
            | '\u{200D}'
    )
}

/// Extract a capitalized first name from `raw`, or return `fallback`.
///
/// Never fails. An empty `fallback` can produce an empty result.
pub fn normalize(raw: &str, fallback: &str) -> String {
    if raw.trim().is_empty() {
        return fallback.to_string();
    }

    let stripped: String = raw.chars().filter(|c| !is_pictographic(*c)).collect();
    let stripped = stripped.trim();

    let head = SEPARATOR.split(stripped).next().unwrap_or_default().trim();
    let head = head.trim_end_matches(TRAILING_DECORATION);

    match head.split_whitespace().next() {
        Some(first) => capitalize(&first.nfkc().collect::<String>()),
        None => fallback.to_string(),
    }
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
