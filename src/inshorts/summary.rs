//! Extractive summaries and article identity.
//!
//! The summary is the leading sentences of the page text, trimmed to a word
//! budget. Navigation noise is dropped first: short lines, "Skip to ..."
//! links and all-caps banners.

use sha2::{Digest, Sha256};

pub const NO_CONTENT: &str = "No content available for summarization.";

const MIN_LINE_CHARS: usize = 30;
const MIN_SENTENCE_CHARS: usize = 10;

/// Condense `text` to at most `max_words` words.
///
/// Whole sentences are kept while they fit; the first sentence that doesn't
/// fit is cut and ends with `...`.
pub fn generate_summary(text: &str, max_words: usize) -> String {
    let cleaned = text
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.chars().count() > MIN_LINE_CHARS && !line.starts_with("Skip to") && !is_shouting(line)
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut summary = String::new();
    let mut word_count = 0usize;
    for sentence in split_sentences(&cleaned) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if word_count + words.len() <= max_words {
            summary.push_str(&sentence);
            summary.push(' ');
            word_count += words.len();
        } else {
            let remaining = max_words - word_count;
            if remaining > 0 {
                summary.push_str(&words[..remaining].join(" "));
                summary.push_str("...");
            }
            break;
        }
    }

    if summary.trim().is_empty() {
        if cleaned.is_empty() {
            return NO_CONTENT.to_string();
        }
        let words: Vec<&str> = cleaned.split_whitespace().collect();
        if words.len() <= max_words {
            return cleaned;
        }
        return format!("{}...", words[..max_words].join(" "));
    }

    summary.trim().to_string()
}

/// All cased characters uppercase, and at least one of them.
fn is_shouting(line: &str) -> bool {
    line.chars().any(char::is_uppercase) && !line.chars().any(char::is_lowercase)
}

/// Split on `.`, `!` and `?`, but only once the running sentence is longer
/// than a few characters so abbreviations like "U.S." stay attached.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && current.trim().chars().count() > MIN_SENTENCE_CHARS {
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences
}

/// Stable identity of an article: hex SHA-256 of `url|title|source`.
///
/// Used as the upsert key remotely and for de-duplication within a file.
pub fn article_id(url: &str, title: &str, source: &str) -> String {
    let digest = Sha256::digest(format!("{url}|{title}|{source}").as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "Skip to main content\n\
        WORLD NEWS AND MORE HEADLINES TODAY\n\
        Menu\n\
        The council approved the new transit plan on Monday evening.\n\
        Construction is expected to begin next spring and last two years!\n\
        Critics say the budget is far too optimistic for a project this size.";

    #[test]
    fn test_keeps_whole_sentences_within_budget() {
        let s = generate_summary(PAGE, 60);
        assert_eq!(
            s,
            "The council approved the new transit plan on Monday evening. \
             Construction is expected to begin next spring and last two years! \
             Critics say the budget is far too optimistic for a project this size."
        );
    }

    #[test]
    fn test_cuts_partial_sentence() {
        // first sentence is 10 words, then 3 of the next
        let s = generate_summary(PAGE, 13);
        assert_eq!(
            s,
            "The council approved the new transit plan on Monday evening. Construction is expected..."
        );
        assert!(s.split_whitespace().count() <= 13);
    }

    #[test]
    fn test_first_sentence_longer_than_budget() {
        let s = generate_summary(PAGE, 4);
        assert_eq!(s, "The council approved the...");
    }

    #[test]
    fn test_noise_only_text() {
        assert_eq!(generate_summary("Menu\nHome\nSkip to content", 60), NO_CONTENT);
        assert_eq!(generate_summary("", 60), NO_CONTENT);
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let sentences = split_sentences("U.S. officials met today. Then they left.");
        assert_eq!(sentences, vec!["U.S. officials met today.", "Then they left."]);
    }

    #[test]
    fn test_is_shouting() {
        assert!(is_shouting("BREAKING: MARKETS FALL 5%"));
        assert!(!is_shouting("Breaking news"));
        assert!(!is_shouting("12345 --- 678"));
    }

    #[test]
    fn test_article_id_is_stable() {
        let a = article_id("https://x.test/1", "Title", "Wire");
        assert_eq!(a, article_id("https://x.test/1", "Title", "Wire"));
        assert_ne!(a, article_id("https://x.test/2", "Title", "Wire"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
