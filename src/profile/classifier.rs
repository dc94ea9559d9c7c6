// src/profile/classifier.rs
// Lightweight intent classifier (spec §4.4 step 2): buckets an observation
// into one of the seven componentType tags by keyword overlap with its
// enriched tags/topics. No model call — deterministic and fast, consistent
// with the fallback enrichment's dependency-free approach.

use crate::types::{ComponentType, Observation};

const KEYWORDS: &[(ComponentType, &[&str])] = &[
    (
        ComponentType::CommunicationStyle,
        &["tone", "voice", "style", "phrasing", "wording", "communication"],
    ),
    (
        ComponentType::PriorityFocus,
        &["priority", "urgent", "deadline", "goal", "focus", "milestone"],
    ),
    (
        ComponentType::CognitivePattern,
        &["reasoning", "logic", "pattern", "analysis", "thinking", "heuristic"],
    ),
    (
        ComponentType::ValueSystem,
        &["value", "ethics", "belief", "principle", "tradeoff"],
    ),
    (
        ComponentType::ContextPreference,
        &["context", "environment", "setting", "preference", "workflow"],
    ),
    (
        ComponentType::LearningPattern,
        &["learn", "tutorial", "course", "study", "practice", "exercise"],
    ),
];

/// Classifies `obs` by scanning its enhanced tags, topics and raw tags for
/// keyword overlap with each non-default component type. Falls back to
/// `DomainExpertise`, the general bucket for topical/technical content.
pub fn classify(obs: &Observation) -> ComponentType {
    let haystack: Vec<String> = obs
        .enhanced_tags
        .iter()
        .chain(obs.tags.iter())
        .chain(obs.semantic_analysis.topics.iter())
        .map(|s| s.to_lowercase())
        .collect();

    let mut best = ComponentType::DomainExpertise;
    let mut best_score = 0usize;
    for (component_type, keywords) in KEYWORDS {
        let score = haystack
            .iter()
            .filter(|h| keywords.iter().any(|k| h.contains(k)))
            .count();
        if score > best_score {
            best_score = score;
            best = *component_type;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessLevel, RawObservation};
    use chrono::Utc;

    fn obs_with_tags(tags: Vec<String>) -> Observation {
        let mut o = Observation::from_raw(
            RawObservation {
                id: "o1".into(),
                user_id: "u".into(),
                app_id: "a".into(),
                timestamp: Utc::now(),
                source: "notes".into(),
                highlight: "h".into(),
                note: "n".into(),
                address: "addr".into(),
                tags: vec![],
                access: AccessLevel::Private,
            },
            "hash".into(),
        );
        o.enhanced_tags = tags;
        o
    }

    #[test]
    fn defaults_to_domain_expertise_with_no_keyword_match() {
        let obs = obs_with_tags(vec!["vector".into(), "database".into()]);
        assert_eq!(classify(&obs), ComponentType::DomainExpertise);
    }

    #[test]
    fn matches_learning_pattern_keywords() {
        let obs = obs_with_tags(vec!["tutorial".into(), "practice".into()]);
        assert_eq!(classify(&obs), ComponentType::LearningPattern);
    }
}
