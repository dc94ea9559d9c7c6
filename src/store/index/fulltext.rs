// src/store/index/fulltext.rs
// Full-text index (spec §4.3): token index over highlight/note/enhancedTags
// with a BM25-style ranking. A simple in-memory inverted index — language
// "awareness" here is lowercasing plus a small English stopword list, kept
// dependency-free since no full-text search crate appears anywhere in the
// pack.

use crate::types::Observation;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "and", "or", "of", "to", "in", "on", "for", "with", "this",
    "that", "it", "was", "be", "as", "at",
];

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

#[derive(Clone)]
struct DocEntry {
    user_id: String,
    term_counts: HashMap<String, u32>,
    length: usize,
}

#[derive(Debug, Clone)]
pub struct TextMatch {
    pub observation_id: String,
    pub score: f32,
}

pub trait FullTextIndex: Send + Sync {
    fn index(&self, obs: &Observation);
    fn remove(&self, observation_id: &str);
    fn search(&self, user_id: &str, query: &str, limit: usize) -> Vec<TextMatch>;
}

#[derive(Default)]
pub struct InMemoryFullTextIndex {
    docs: RwLock<HashMap<String, DocEntry>>,
}

impl InMemoryFullTextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn avg_doc_len(docs: &HashMap<String, DocEntry>) -> f32 {
        if docs.is_empty() {
            return 0.0;
        }
        docs.values().map(|d| d.length as f32).sum::<f32>() / docs.len() as f32
    }
}

impl FullTextIndex for InMemoryFullTextIndex {
    fn index(&self, obs: &Observation) {
        let combined = format!(
            "{} {} {}",
            obs.highlight,
            obs.note,
            obs.enhanced_tags.join(" ")
        );
        let tokens = tokenize(&combined);
        let mut term_counts = HashMap::new();
        for t in &tokens {
            *term_counts.entry(t.clone()).or_insert(0u32) += 1;
        }
        let mut docs = self.docs.write();
        docs.insert(
            obs.id.clone(),
            DocEntry {
                user_id: obs.user_id.clone(),
                term_counts,
                length: tokens.len(),
            },
        );
    }

    fn remove(&self, observation_id: &str) {
        self.docs.write().remove(observation_id);
    }

    fn search(&self, user_id: &str, query: &str, limit: usize) -> Vec<TextMatch> {
        const K1: f32 = 1.2;
        const B: f32 = 0.75;

        let docs = self.docs.read();
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let user_docs: Vec<(&String, &DocEntry)> =
            docs.iter().filter(|(_, d)| d.user_id == user_id).collect();
        let n = user_docs.len() as f32;
        let avg_len = Self::avg_doc_len(&docs);

        let mut idf: HashMap<&str, f32> = HashMap::new();
        for term in &query_terms {
            let df = user_docs
                .iter()
                .filter(|(_, d)| d.term_counts.contains_key(term))
                .count() as f32;
            idf.insert(term, ((n - df + 0.5) / (df + 0.5) + 1.0).ln());
        }

        let mut scored: Vec<TextMatch> = user_docs
            .iter()
            .filter_map(|(id, doc)| {
                let mut score = 0.0f32;
                for term in &query_terms {
                    let tf = *doc.term_counts.get(term).unwrap_or(&0) as f32;
                    if tf == 0.0 {
                        continue;
                    }
                    let term_idf = idf[term.as_str()];
                    let denom = tf + K1 * (1.0 - B + B * doc.length as f32 / avg_len.max(1.0));
                    score += term_idf * (tf * (K1 + 1.0)) / denom;
                }
                if score > 0.0 {
                    Some(TextMatch {
                        observation_id: (*id).clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then(a.observation_id.cmp(&b.observation_id)));
        scored.truncate(limit);
        scored
    }
}
