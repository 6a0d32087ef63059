//! Sentence tokenization for the tagger request.

use std::sync::LazyLock;

use regex::Regex;

/// Split a sentence into words and standalone punctuation marks.
///
/// Hyphenated and apostrophized words stay whole (`Familien-Service`, `geht's`).
pub fn tokenize(sentence: &str) -> Vec<String> {
    static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\w+(?:['’\-]\w+)*|[^\w\s]").expect("valid regex")
    });

    TOKEN_RE
        .find_iter(sentence)
        .map(|m| m.as_str().to_string())
        .collect()
}
