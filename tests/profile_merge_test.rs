// tests/profile_merge_test.rs
// Five observations about the same topic, submitted in sequence, must merge
// into a single profile component whose total attention weight is the sum
// of the individual weights and whose supporting evidence records all five.

use chrono::Utc;
use hinata_core::runtime::CoreRuntime;
use hinata_core::types::{AccessLevel, ComponentType, Priority, RawObservation};
use hinata_core::vecmath::fallback_embedding;

fn vector_search_observation(id: &str, attention_weight: f32) -> hinata_core::types::Observation {
    let raw = RawObservation {
        id: id.to_string(),
        user_id: "u".to_string(),
        app_id: "a".to_string(),
        timestamp: Utc::now(),
        source: "notes".to_string(),
        highlight: "vector search".to_string(),
        note: format!("notes on vector search, revision {id}"),
        address: "n://vector-search".to_string(),
        tags: vec!["db".to_string()],
        access: AccessLevel::Private,
    };
    let mut obs = hinata_core::types::Observation::from_raw(raw, format!("hash-{id}"));
    // Same embedding for every item in this topic cluster so the merge
    // similarity score is unambiguously above the merge threshold.
    obs.embedding = fallback_embedding("vector search topic cluster", 64);
    obs.attention_weight = attention_weight;
    obs.quality_score = 0.8;
    obs.influence_weight = (obs.quality_score * obs.attention_weight).clamp(0.0, 1.0);
    obs
}

#[tokio::test]
async fn repeated_topic_observations_merge_into_one_component() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    let weights = [0.2, 0.35, 0.5, 0.7, 0.9];
    for (i, w) in weights.iter().enumerate() {
        let obs = vector_search_observation(&format!("o{i}"), *w);
        runtime.store.put(&obs).await.unwrap();
        runtime.profile_engine.on_observation("u", &obs.id).await.unwrap();
    }

    let components = runtime.profile_engine.load_profile("u").await.unwrap();
    assert_eq!(components.len(), 1, "expected a single merged component, got {components:?}");

    let component = &components[0];
    assert_eq!(component.component_type, ComponentType::DomainExpertise);
    let expected_total: f32 = weights.iter().sum();
    assert!((component.total_attention_weight - expected_total).abs() < 1e-4);
    assert!((component.normalized_weight - 1.0).abs() < 1e-5);
    assert_eq!(component.priority, Priority::High);
    assert_eq!(component.supporting_evidence.len(), 5);
}
