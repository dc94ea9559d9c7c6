// src/attention/scorer.rs
// AttentionScorer (spec §4.2): computes attentionWeight and attentionMetrics
// from a user's recent observation history. The AttentionScorer reads a
// snapshot of history rather than the live profile (spec §9: break the
// ProfileEngine/ObservationPipeline cycle), so it takes a plain slice.

use crate::types::{AttentionMetrics, InteractionDepth, Observation};
use crate::vecmath::cosine;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct ScoredAttention {
    pub weight: f32,
    pub metrics: AttentionMetrics,
}

pub struct AttentionScorer {
    window_days: i64,
}

impl AttentionScorer {
    pub fn new(window_days: i64) -> Self {
        Self { window_days }
    }

    /// `history` must already be scoped to the candidate's `userId` and
    /// limited to the configured window; callers (ObservationPipeline) are
    /// responsible for fetching that slice from the TieredStore.
    pub fn score(
        &self,
        candidate_highlight: &str,
        candidate_address: &str,
        candidate_embedding: Option<&[f32]>,
        candidate_tags: &[String],
        note_len: usize,
        history: &[Observation],
        now: DateTime<Utc>,
    ) -> ScoredAttention {
        let history_in_window: Vec<&Observation> = history
            .iter()
            .filter(|o| (now - o.timestamp).num_days() <= self.window_days)
            .collect();

        let highlight_frequency = history_in_window
            .iter()
            .filter(|o| highlight_similar(candidate_highlight, candidate_embedding, o))
            .count() as u32;

        let note_count = history_in_window
            .iter()
            .filter(|o| o.address == candidate_address && !o.note.trim().is_empty())
            .count() as u32;

        let address_revisit = history_in_window
            .iter()
            .filter(|o| o.address == candidate_address)
            .count() as u32;

        let time_investment_secs = history_in_window
            .iter()
            .filter(|o| topical_overlap(candidate_embedding, o) >= 0.3)
            .map(|o| estimate_seconds(o))
            .sum();

        let related_count = history_in_window
            .iter()
            .filter(|o| topical_overlap(candidate_embedding, o) >= 0.3)
            .count();

        let span_days = history_in_window
            .iter()
            .map(|o| (now - o.timestamp).num_days())
            .max()
            .unwrap_or(0);

        let depth_flags = [
            note_len > 200,
            candidate_tags.len() > 3,
            related_count > 5,
            span_days > 7,
        ];
        let depth_score: u32 = depth_flags.iter().filter(|f| **f).count() as u32;
        let interaction_depth = match depth_score {
            0 | 1 => InteractionDepth::Low,
            2 | 3 => InteractionDepth::Medium,
            _ => InteractionDepth::High,
        };

        let hl = step(highlight_frequency as f32, &[(1.0, 0.1), (3.0, 0.4), (5.0, 0.7)], 1.0);
        let note = step(note_count as f32, &[(1.0, 0.2), (3.0, 0.6), (5.0, 0.8)], 1.0);
        let revisit = step(address_revisit as f32, &[(1.0, 0.1), (3.0, 0.5), (6.0, 0.8)], 1.0);
        let time = step(time_investment_secs as f32, &[(30.0, 0.1), (120.0, 0.4), (300.0, 0.7)], 1.0);

        let base = 0.30 * hl + 0.25 * note + 0.30 * revisit + 0.15 * time;
        let weight = (base * interaction_depth.multiplier()).clamp(0.0, 1.0);

        ScoredAttention {
            weight,
            metrics: AttentionMetrics {
                highlight_frequency,
                note_count,
                address_revisit,
                time_investment_secs,
                interaction_depth,
            },
        }
    }
}

/// Piecewise-constant factor function: `thresholds` are `(threshold, value)`
/// pairs in ascending order; `count >= threshold` selects that value; values
/// below the first threshold give 0, above the last threshold give `above`.
fn step(count: f32, thresholds: &[(f32, f32)], above: f32) -> f32 {
    let mut result = 0.0;
    for &(threshold, value) in thresholds {
        if count >= threshold {
            result = value;
        }
    }
    if let Some(&(last_threshold, _)) = thresholds.last() {
        if count > last_threshold {
            result = above;
        }
    }
    result
}

fn highlight_similar(candidate: &str, candidate_embedding: Option<&[f32]>, o: &Observation) -> bool {
    if let (Some(ce), oe) = (candidate_embedding, o.embedding.as_slice()) {
        if !oe.is_empty() {
            return cosine(ce, oe) >= 0.8;
        }
    }
    jaccard(candidate, &o.highlight) >= 0.8
}

fn topical_overlap(candidate_embedding: Option<&[f32]>, o: &Observation) -> f32 {
    match candidate_embedding {
        Some(ce) if !o.embedding.is_empty() => cosine(ce, &o.embedding).max(0.0),
        _ => 0.0,
    }
}

fn jaccard(a: &str, b: &str) -> f32 {
    let sa: HashSet<&str> = a.split_whitespace().collect();
    let sb: HashSet<&str> = b.split_whitespace().collect();
    if sa.is_empty() && sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count() as f32;
    let union = sa.union(&sb).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Estimated seconds on a topically overlapping historical observation:
/// proportional to note length, capped, since no explicit dwell-time signal
/// exists in the data model.
fn estimate_seconds(o: &Observation) -> u32 {
    (o.note.len() as u32 / 5).min(600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessLevel, RawObservation};

    fn make(id: &str, address: &str, note: &str, days_ago: i64, now: DateTime<Utc>) -> Observation {
        Observation::from_raw(
            RawObservation {
                id: id.into(),
                user_id: "u".into(),
                app_id: "a".into(),
                timestamp: now - chrono::Duration::days(days_ago),
                source: "notes".into(),
                highlight: "vector search".into(),
                note: note.into(),
                address: address.into(),
                tags: vec![],
                access: AccessLevel::Private,
            },
            format!("hash-{id}"),
        )
    }

    #[test]
    fn no_history_gives_low_weight() {
        let scorer = AttentionScorer::new(30);
        let scored = scorer.score("vector databases", "n://1", None, &["db".into()], 20, &[], Utc::now());
        assert!(scored.weight <= 0.12);
    }

    #[test]
    fn revisits_raise_weight() {
        let now = Utc::now();
        let history: Vec<Observation> = (0..7)
            .map(|i| make(&format!("h{i}"), "n://1", "some note text", i, now))
            .collect();
        let scorer = AttentionScorer::new(30);
        let scored = scorer.score("vector search", "n://1", None, &["db".into()], 250, &history, now);
        assert!(scored.weight > 0.5);
        assert_eq!(scored.metrics.address_revisit, 7);
    }

    #[test]
    fn weight_is_always_clamped() {
        let now = Utc::now();
        let history: Vec<Observation> = (0..20)
            .map(|i| make(&format!("h{i}"), "n://1", &"x".repeat(600), i % 5, now))
            .collect();
        let scorer = AttentionScorer::new(30);
        let scored = scorer.score("vector search", "n://1", None, &vec!["a".into(); 10], 900, &history, now);
        assert!(scored.weight <= 1.0);
    }
}
