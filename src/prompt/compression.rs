// src/prompt/compression.rs
// Deterministic extractive summarization and PII redaction (spec §4.5).
// No NLP crate appears anywhere in the pack for this, so sentence scoring
// is done the same way the fallback enrichment scores sentences: term
// frequency against the rest of the text, no external call.

use crate::types::Observation;
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// An observation's effective body for prompt inclusion: highlight plus a
/// compressed note (spec §4.5 compression rule).
pub fn effective_body(obs: &Observation) -> String {
    format!("{}: {}", obs.highlight, summarize(&obs.note, 400))
}

/// Picks the up-to-3 highest-scoring sentences (by term frequency against
/// the full text), in original order, then truncates to `max_chars`.
pub fn summarize(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }

    let sentences = split_sentences(text);
    if sentences.len() <= 1 {
        return truncate_chars(text, max_chars);
    }

    let mut term_freq: HashMap<String, u32> = HashMap::new();
    for word in text.split_whitespace() {
        *term_freq.entry(word.to_lowercase()).or_insert(0) += 1;
    }

    let mut scored: Vec<(usize, f32, &str)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let score: u32 = s
                .split_whitespace()
                .map(|w| *term_freq.get(&w.to_lowercase()).unwrap_or(&0))
                .sum();
            (i, score as f32, *s)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    scored.truncate(3);
    scored.sort_by_key(|(i, _, _)| *i);

    let joined = scored
        .into_iter()
        .map(|(_, _, s)| s.trim())
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&joined, max_chars)
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split_terminator(|c| c == '.' || c == '!' || c == '?')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut cut = max_chars.min(text.len());
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap())
}

fn long_digit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{9,}").unwrap())
}

/// Safety filter (spec §4.5): replaces email addresses and long digit runs
/// (card numbers, SSNs) with placeholder tokens before a prompt can leave
/// the process boundary.
pub fn redact_pii(text: &str) -> String {
    let redacted = email_pattern().replace_all(text, "[REDACTED_EMAIL]");
    long_digit_pattern().replace_all(&redacted, "[REDACTED_NUMBER]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_returned_unchanged() {
        assert_eq!(summarize("hello", 400), "hello");
    }

    #[test]
    fn long_text_is_compressed_and_bounded() {
        let text = "Vectors are dense. HNSW builds a graph index. It is fast for ANN search. \
                    Cooking pasta takes ten minutes. The weather today is mild.";
        let out = summarize(text, 40);
        assert!(out.len() <= 40);
    }

    #[test]
    fn redacts_emails_and_long_digit_runs() {
        let text = "Contact me at jane.doe@example.com or call 5551234567890";
        let redacted = redact_pii(text);
        assert!(!redacted.contains("jane.doe@example.com"));
        assert!(!redacted.contains("5551234567890"));
        assert!(redacted.contains("[REDACTED_EMAIL]"));
        assert!(redacted.contains("[REDACTED_NUMBER]"));
    }
}
