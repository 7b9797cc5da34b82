// transcription/text_cleaner.rs
//
// Transcript text cleaning: strips model annotations, collapses
// repetitions, and filters meaningless output before attribution.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Bracketed or parenthesized model annotations, e.g. "[BLANK_AUDIO]",
/// "(music)", "[inaudible]".
static ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("annotation pattern is valid"));

/// Clean one transcript span. Returns an empty string when nothing usable
/// remains, in which case the caller drops the span.
pub fn clean_transcript_text(text: &str) -> String {
    let stripped = ANNOTATION_RE.replace_all(text, " ");
    let trimmed = stripped.trim();

    if trimmed.is_empty() || is_meaningless_output(trimmed) {
        return String::new();
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() < 3 {
        return words.join(" ");
    }

    let cleaned = remove_word_repetitions(&words);
    let cleaned = remove_phrase_repetitions(&cleaned);
    cleaned.join(" ")
}

/// Check for hallucination patterns whisper emits over silence.
fn is_meaningless_output(text: &str) -> bool {
    let text_lower = text.to_lowercase();

    let meaningless_patterns = [
        "thank you for watching",
        "thanks for watching",
        "like and subscribe",
        "um um um",
        "uh uh uh",
    ];

    for pattern in &meaningless_patterns {
        if text_lower.contains(pattern) {
            return true;
        }
    }

    // Mostly one repeated character is noise, not speech
    let unique_chars: HashSet<char> = text.chars().collect();
    unique_chars.len() <= 3 && text.len() > 10
}

/// Collapse consecutive repetitions of the same word.
fn remove_word_repetitions<'a>(words: &[&'a str]) -> Vec<&'a str> {
    let mut cleaned = Vec::with_capacity(words.len());
    let mut i = 0;

    while i < words.len() {
        let current = words[i];
        let mut repeat_count = 1;
        while i + repeat_count < words.len() && words[i + repeat_count] == current {
            repeat_count += 1;
        }
        cleaned.push(current);
        i += repeat_count;
    }

    cleaned
}

/// Collapse immediately repeated 2..=5 word phrases.
fn remove_phrase_repetitions<'a>(words: &[&'a str]) -> Vec<&'a str> {
    if words.len() < 4 {
        return words.to_vec();
    }

    let mut cleaned = Vec::with_capacity(words.len());
    let mut i = 0;

    while i < words.len() {
        let mut phrase_found = false;

        for phrase_len in 2..=std::cmp::min(5, (words.len() - i) / 2) {
            let phrase = &words[i..i + phrase_len];
            let next = &words[i + phrase_len..i + phrase_len * 2];

            if phrase == next {
                cleaned.extend_from_slice(phrase);
                i += phrase_len * 2;
                phrase_found = true;
                break;
            }
        }

        if !phrase_found {
            cleaned.push(words[i]);
            i += 1;
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_stripped() {
        assert_eq!(clean_transcript_text("[BLANK_AUDIO]"), "");
        assert_eq!(clean_transcript_text("(music) hello there"), "hello there");
        assert_eq!(
            clean_transcript_text("so [inaudible] we agreed on the date"),
            "so we agreed on the date"
        );
    }

    #[test]
    fn test_word_repetitions_collapse() {
        assert_eq!(
            clean_transcript_text("the the the meeting starts now"),
            "the meeting starts now"
        );
    }

    #[test]
    fn test_phrase_repetitions_collapse() {
        assert_eq!(
            clean_transcript_text("we should go we should go to the office"),
            "we should go to the office"
        );
    }

    #[test]
    fn test_meaningless_output_dropped() {
        assert_eq!(clean_transcript_text("Thanks for watching!"), "");
        assert_eq!(clean_transcript_text("aaaaaaaaaaaaaa"), "");
    }

    #[test]
    fn test_short_text_preserved() {
        assert_eq!(clean_transcript_text("okay"), "okay");
        assert_eq!(clean_transcript_text("  yes please "), "yes please");
    }
}
