// src/prompt/mod.rs
// PromptComposer (spec §4.5): assembles a token-bounded, layered prompt
// from a user's profile components and recent/relevant observations.
// No tokenizer crate appears anywhere in the pack, so token count is
// approximated the way the fallback enrichment approximates semantics:
// deterministically and without an external call (chars/4, a common rough
// estimate for English text).

pub mod compression;

use crate::retriever::{QueryFilters, Retriever};
use crate::store::TieredStore;
use crate::types::{Observation, Priority, ProfileComponent, Tier};
use crate::vecmath::cosine;
use chrono::{DateTime, Utc};
use compression::summarize;
use std::sync::Arc;

pub struct PromptComposerConfig {
    pub token_budget: usize,
    pub core_memory_share: f32,
    pub working_memory_share: f32,
    pub context_memory_share: f32,
    pub buffer_memory_share: f32,
    pub context_top_m: usize,
    pub buffer_window_minutes: i64,
    pub working_memory_recent_hours: i64,
    pub min_influence_for_context: f32,
}

impl From<&crate::config::prompt::PromptConfig> for PromptComposerConfig {
    fn from(c: &crate::config::prompt::PromptConfig) -> Self {
        Self {
            token_budget: c.default_token_budget,
            core_memory_share: c.core_memory_share,
            working_memory_share: c.working_memory_share,
            context_memory_share: c.context_memory_share,
            buffer_memory_share: c.buffer_memory_share,
            context_top_m: c.context_top_m,
            buffer_window_minutes: c.buffer_window_minutes,
            working_memory_recent_hours: c.working_memory_recent_hours,
            min_influence_for_context: c.min_influence_for_context,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub text: String,
    pub token_count: usize,
    pub truncated: bool,
}

pub struct PromptComposer {
    store: Arc<TieredStore>,
    retriever: Arc<Retriever>,
}

impl PromptComposer {
    pub fn new(store: Arc<TieredStore>, retriever: Arc<Retriever>) -> Self {
        Self { store, retriever }
    }

    pub async fn compose(
        &self,
        user_id: &str,
        query_text: &str,
        query_embedding: &[f32],
        components: &[ProfileComponent],
        cfg: &PromptComposerConfig,
        budget_override: Option<usize>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ComposedPrompt> {
        let budget = budget_override.unwrap_or(cfg.token_budget);
        let core_budget = (budget as f32 * cfg.core_memory_share) as usize;
        let working_budget = (budget as f32 * cfg.working_memory_share) as usize;
        let context_budget = (budget as f32 * cfg.context_memory_share) as usize;
        let buffer_budget = (budget as f32 * cfg.buffer_memory_share) as usize;

        let mut truncated = false;

        // CoreMemory: high-priority components only, ranked by score.
        let mut high_priority: Vec<&ProfileComponent> =
            components.iter().filter(|c| c.priority == Priority::High).collect();
        high_priority.sort_by(|a, b| {
            score_component(b, query_embedding, now)
                .partial_cmp(&score_component(a, query_embedding, now))
                .unwrap()
        });
        let mut used_ids = std::collections::HashSet::new();
        let (core_lines, core_used) = pack_lines(
            high_priority.iter().map(|c| c.as_rule_string()),
            core_budget,
        );
        truncated |= core_used < high_priority.len();
        for c in high_priority.iter().take(core_lines.len()) {
            used_ids.insert(c.id.clone());
        }

        // WorkingMemory: remaining high/medium components plus recent
        // highly-weighted observations (last 24h), ranked by score.
        let mut working_components: Vec<&ProfileComponent> = components
            .iter()
            .filter(|c| {
                !used_ids.contains(&c.id) && matches!(c.priority, Priority::High | Priority::Medium)
            })
            .collect();
        working_components.sort_by(|a, b| {
            score_component(b, query_embedding, now)
                .partial_cmp(&score_component(a, query_embedding, now))
                .unwrap()
        });

        let recent_since = now - chrono::Duration::hours(cfg.working_memory_recent_hours);
        let mut recent_observations = self.store.recent_for_user(user_id, recent_since, 200).await?;
        recent_observations.retain(|o| {
            o.influence_weight >= cfg.min_influence_for_context
                && o.access != crate::types::AccessLevel::Restricted
        });
        recent_observations.sort_by(|a, b| {
            score_observation(b, query_embedding, now)
                .partial_cmp(&score_observation(a, query_embedding, now))
                .unwrap()
        });

        let mut working_candidates: Vec<String> = working_components
            .iter()
            .map(|c| c.as_rule_string())
            .collect();
        working_candidates.extend(recent_observations.iter().map(|o| compression::effective_body(o)));
        let (working_lines, working_used) = pack_lines(working_candidates.into_iter(), working_budget);
        truncated |= working_used < working_components.len() + recent_observations.len();

        // ContextMemory: top-M relevant observations via the Retriever.
        let filters = QueryFilters {
            min_influence_weight: Some(cfg.min_influence_for_context),
            ..Default::default()
        };
        let mut context_observations = self
            .retriever
            .query(user_id, query_text, query_embedding, &filters, cfg.context_top_m)
            .await?;
        context_observations.retain(|o| o.access != crate::types::AccessLevel::Restricted);
        context_observations.sort_by(|a, b| {
            score_observation(b, query_embedding, now)
                .partial_cmp(&score_observation(a, query_embedding, now))
                .unwrap()
        });
        let context_candidates: Vec<String> =
            context_observations.iter().map(|o| compression::effective_body(o)).collect();
        let (context_lines, context_used) = pack_lines(context_candidates.into_iter(), context_budget);
        truncated |= context_used < context_observations.len();

        // BufferMemory: most recent N observations (last 10 minutes), raw.
        let buffer_since = now - chrono::Duration::minutes(cfg.buffer_window_minutes);
        let mut buffer_observations = self.store.recent_for_user(user_id, buffer_since, 50).await?;
        buffer_observations.retain(|o| o.access != crate::types::AccessLevel::Restricted);
        buffer_observations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let buffer_candidates: Vec<String> = buffer_observations
            .iter()
            .map(|o| format!("{}: {}", o.highlight, o.note))
            .collect();
        let (buffer_lines, buffer_used) = pack_lines(buffer_candidates.into_iter(), buffer_budget);
        truncated |= buffer_used < buffer_observations.len();

        let mut text = String::new();
        append_section(&mut text, "CorePersonalRules", &core_lines);
        append_section(&mut text, "CurrentFocus", &working_lines);
        append_section(&mut text, "RelevantContext", &context_lines);
        append_section(&mut text, "RecentActivity", &buffer_lines);

        let text = compression::redact_pii(&text);
        let (text, truncated) = enforce_budget(text, budget, truncated);
        let token_count = estimate_tokens(&text);

        Ok(ComposedPrompt { text, token_count, truncated })
    }
}

fn score_component(c: &ProfileComponent, query_embedding: &[f32], now: DateTime<Utc>) -> f32 {
    let importance = c.confidence;
    let relevance = cosine(&c.embedding, query_embedding);
    let freshness = 0.95f32.powf((now - c.last_updated).num_days() as f32);
    let frequency = 0.0; // components have no discrete access-count signal
    0.30 * importance + 0.35 * relevance + 0.20 * freshness + 0.15 * frequency
}

fn score_observation(o: &Observation, query_embedding: &[f32], now: DateTime<Utc>) -> f32 {
    let importance = o.influence_weight;
    let relevance = cosine(&o.embedding, query_embedding);
    let freshness = 0.95f32.powf(o.age_days(now) as f32);
    let frequency = if o.tier == Tier::Hot { 1.0 } else { 0.0 };
    0.30 * importance + 0.35 * relevance + 0.20 * freshness + 0.15 * frequency
}

/// Greedily packs `candidates` (already ranked) into `budget` tokens,
/// summarizing items that don't fit whole before discarding them.
/// Returns the packed lines and how many input candidates were consumed
/// (including summarized-but-kept ones) so callers can detect truncation.
fn pack_lines(candidates: impl Iterator<Item = String>, budget: usize) -> (Vec<String>, usize) {
    let mut lines = Vec::new();
    let mut used_tokens = 0usize;
    let mut consumed = 0usize;
    for candidate in candidates {
        consumed += 1;
        let tokens = estimate_tokens(&candidate);
        if used_tokens + tokens <= budget {
            used_tokens += tokens;
            lines.push(candidate);
            continue;
        }
        let remaining = budget.saturating_sub(used_tokens);
        if remaining == 0 {
            break;
        }
        let shortened = summarize(&candidate, remaining * 4);
        let shortened_tokens = estimate_tokens(&shortened);
        if shortened_tokens > 0 && used_tokens + shortened_tokens <= budget {
            used_tokens += shortened_tokens;
            lines.push(shortened);
        } else {
            break;
        }
    }
    (lines, consumed)
}

fn append_section(out: &mut String, name: &str, lines: &[String]) {
    out.push_str(&format!("## {name}\n"));
    for line in lines {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
}

/// Deterministic token estimate: roughly 4 characters per token for
/// English text, the same rule of thumb used to size the hot-tier budget
/// in bytes-per-entry elsewhere in this crate.
fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

fn enforce_budget(mut text: String, budget: usize, already_truncated: bool) -> (String, bool) {
    if estimate_tokens(&text) <= budget {
        return (text, already_truncated);
    }
    let max_chars = budget * 4;
    let mut truncate_at = max_chars.min(text.len());
    while !text.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    text.truncate(truncate_at);
    (text, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_is_roughly_chars_over_four() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn pack_lines_stops_at_budget() {
        let candidates = vec!["a".repeat(40), "b".repeat(40), "c".repeat(40)];
        let (lines, consumed) = pack_lines(candidates.into_iter(), 10);
        assert!(lines.len() <= 1);
        assert!(consumed >= 1);
    }

    #[test]
    fn enforce_budget_truncates_oversized_text() {
        let text = "x".repeat(10_000);
        let (out, truncated) = enforce_budget(text, 100, false);
        assert!(truncated);
        assert!(estimate_tokens(&out) <= 100);
    }
}
