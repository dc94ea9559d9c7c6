// src/enrichment/fallback.rs
// Default, dependency-free enrichment capability. Deterministic given the
// same input (spec §4.6 determinism contract), so it's safe both as a
// timeout fallback and as a standalone default when no local model is
// configured ("smallModelMode" feature flag, spec §6).

use super::capability::{EnrichRequest, EnrichResult, EnrichmentCapability};
use crate::types::{Complexity, Sentiment};
use crate::vecmath::fallback_embedding;
use async_trait::async_trait;

pub const FALLBACK_MODEL_VERSION: &str = "fallback-hash-v1";
const EMBEDDING_DIMS: usize = 64;

const POSITIVE_WORDS: &[&str] = &["great", "good", "love", "excellent", "helpful", "nice"];
const NEGATIVE_WORDS: &[&str] = &["bad", "hate", "terrible", "broken", "frustrating", "fail"];

pub struct DeterministicFallbackEnrichment;

#[async_trait]
impl EnrichmentCapability for DeterministicFallbackEnrichment {
    async fn enrich(&self, req: EnrichRequest<'_>) -> anyhow::Result<EnrichResult> {
        let combined = format!("{} {}", req.highlight, req.note);
        let lower = combined.to_lowercase();

        let sentiment = classify_sentiment(&lower);
        let complexity = classify_complexity(&combined);
        let embedding = fallback_embedding(&combined, EMBEDDING_DIMS);

        Ok(EnrichResult {
            tags: req.tags.to_vec(),
            top_sentences: vec![req.highlight.to_string()],
            topics: extract_topics(&lower),
            sentiment,
            complexity,
            embedding,
            model_version: FALLBACK_MODEL_VERSION.to_string(),
        })
    }
}

fn classify_sentiment(lower: &str) -> Sentiment {
    let pos = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let neg = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    if pos > neg {
        Sentiment::Positive
    } else if neg > pos {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn classify_complexity(text: &str) -> Complexity {
    let words = text.split_whitespace().count();
    if words < 20 {
        Complexity::Low
    } else if words < 80 {
        Complexity::Medium
    } else {
        Complexity::High
    }
}

fn extract_topics(lower: &str) -> Vec<String> {
    let mut topics: Vec<String> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 4)
        .map(|w| w.to_string())
        .collect();
    topics.sort();
    topics.dedup();
    topics.truncate(5);
    topics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_is_deterministic() {
        let cap = DeterministicFallbackEnrichment;
        let req = EnrichRequest {
            highlight: "vector databases",
            note: "HNSW is a great ANN index",
            tags: &["db".to_string()],
        };
        let a = cap.enrich(req.clone()).await.unwrap();
        let b = cap.enrich(req).await.unwrap();
        assert_eq!(a.embedding, b.embedding);
        assert_eq!(a.model_version, FALLBACK_MODEL_VERSION);
    }

    #[tokio::test]
    async fn detects_positive_sentiment() {
        let cap = DeterministicFallbackEnrichment;
        let req = EnrichRequest {
            highlight: "great tool",
            note: "this is excellent and helpful",
            tags: &[],
        };
        let result = cap.enrich(req).await.unwrap();
        assert_eq!(result.sentiment, Sentiment::Positive);
    }
}
