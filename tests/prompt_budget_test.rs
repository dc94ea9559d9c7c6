// tests/prompt_budget_test.rs
// Prompt composition under budget: a user with many components and
// observations must get a prompt that fits the token budget, includes
// content from every populated layer, and is deterministic for the same
// inputs.

use chrono::Utc;
use hinata_core::prompt::PromptComposerConfig;
use hinata_core::types::{
    AccessLevel, ComponentType, EvidenceEntry, Priority, ProfileComponent, RawObservation,
};
use hinata_core::runtime::CoreRuntime;
use hinata_core::vecmath::fallback_embedding;

fn component(id: &str, priority: Priority, confidence: f32) -> ProfileComponent {
    let now = Utc::now();
    ProfileComponent {
        id: id.to_string(),
        user_id: "u".to_string(),
        component_type: ComponentType::DomainExpertise,
        description: format!("component {id} about distributed systems"),
        embedding: fallback_embedding(&format!("component {id}"), 64),
        confidence,
        total_attention_weight: confidence,
        normalized_weight: confidence,
        priority,
        activation_threshold: 0.3,
        supporting_evidence: vec![EvidenceEntry {
            observation_id: format!("ev-{id}"),
            attention_weight: confidence,
            timestamp: now,
            summary: "evidence".to_string(),
        }],
        created_at: now,
        last_updated: now,
        last_activated: now,
    }
}

fn observation(id: &str) -> hinata_core::types::Observation {
    let raw = RawObservation {
        id: id.to_string(),
        user_id: "u".to_string(),
        app_id: "a".to_string(),
        timestamp: Utc::now(),
        source: "notes".to_string(),
        highlight: format!("recent note {id}"),
        note: format!("some recent activity worth remembering, item {id}"),
        address: format!("n://{id}"),
        tags: vec![],
        access: AccessLevel::Private,
    };
    let mut obs = hinata_core::types::Observation::from_raw(raw, format!("hash-{id}"));
    let embedding_text = format!("{} {}", obs.highlight, obs.note);
    obs.embedding = fallback_embedding(&embedding_text, 64);
    obs.influence_weight = 0.6;
    obs.quality_score = 0.6;
    obs
}

#[tokio::test]
async fn composed_prompt_respects_budget_and_is_deterministic() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    let mut components = Vec::new();
    for i in 0..5 {
        components.push(component(&format!("high-{i}"), Priority::High, 0.9));
    }
    for i in 0..3 {
        components.push(component(&format!("medium-{i}"), Priority::Medium, 0.5));
    }
    for i in 0..2 {
        components.push(component(&format!("low-{i}"), Priority::Low, 0.1));
    }

    for i in 0..3 {
        let obs = observation(&format!("recent-{i}"));
        runtime.store.put(&obs).await.unwrap();
    }

    let cfg = PromptComposerConfig {
        token_budget: 2_000,
        ..PromptComposerConfig::from(&runtime.config.prompt)
    };
    let query_embedding = fallback_embedding("distributed systems", 64);
    let now = Utc::now();

    let first = runtime
        .prompt_composer
        .compose("u", "distributed systems", &query_embedding, &components, &cfg, None, now)
        .await
        .unwrap();
    let second = runtime
        .prompt_composer
        .compose("u", "distributed systems", &query_embedding, &components, &cfg, None, now)
        .await
        .unwrap();

    assert!(first.token_count <= 2_000, "token_count {} exceeds budget", first.token_count);
    assert_eq!(first.text, second.text, "composition must be deterministic given identical inputs");

    assert!(first.text.contains("CorePersonalRules"));
    assert!(first.text.contains("CurrentFocus"));
    assert!(first.text.contains("RecentActivity"));

    let core_section_end = first.text.find("## CurrentFocus").unwrap_or(first.text.len());
    let core_section = &first.text[..core_section_end];
    for i in 0..2 {
        assert!(
            !core_section.contains(&format!("component low-{i}")),
            "low-priority component leaked into CorePersonalRules"
        );
    }
    for i in 0..5 {
        assert!(
            core_section.contains(&format!("component high-{i}")),
            "high-priority component high-{i} missing from CorePersonalRules"
        );
    }
}
