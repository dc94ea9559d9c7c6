// tests/retrieval_fusion_test.rs
// Retrieval fusion: an observation that matches both the vector and
// full-text modalities outranks one that matches only one modality, and an
// observation matching neither ranks behind everything that matches at
// least one, for any positive reciprocal-rank-fusion weighting.

use chrono::{Duration, Utc};
use hinata_core::retriever::QueryFilters;
use hinata_core::runtime::CoreRuntime;
use hinata_core::types::{AccessLevel, RawObservation};
use hinata_core::vecmath::{fallback_embedding, normalized};

const QUERY_TEXT: &str = "vector index";

fn put(runtime: &CoreRuntime, id: &str, embedding: Vec<f32>, note: &str, weight: f32) -> impl std::future::Future<Output = ()> + '_ {
    let raw = RawObservation {
        id: id.to_string(),
        user_id: "u".to_string(),
        app_id: "a".to_string(),
        timestamp: Utc::now() - Duration::seconds(1),
        source: "notes".to_string(),
        highlight: "h".to_string(),
        note: note.to_string(),
        address: format!("n://{id}"),
        tags: vec![],
        access: AccessLevel::Private,
    };
    let mut obs = hinata_core::types::Observation::from_raw(raw, format!("hash-{id}"));
    obs.embedding = embedding;
    obs.influence_weight = weight;
    obs.quality_score = weight;
    async move {
        runtime.store.put(&obs).await.unwrap();
    }
}

#[tokio::test]
async fn item_matching_both_modalities_ranks_first_and_unrelated_items_rank_last() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    let query_embedding = normalized(vec![1.0, 0.0]);
    let orthogonal_embedding = normalized(vec![0.0, 1.0]);

    // Matches both vector (identical embedding) and text (shares the query term).
    put(&runtime, "both", query_embedding.clone(), "notes about a vector index for search", 0.9).await;
    // Matches vector only: identical embedding, unrelated text.
    put(&runtime, "vector_only", query_embedding.clone(), "a recipe for soup", 0.9).await;
    // Matches text only: shares the query term, orthogonal embedding.
    put(&runtime, "text_only", orthogonal_embedding.clone(), "a vector index explained simply", 0.1).await;
    // Matches neither modality.
    put(&runtime, "unrelated_one", orthogonal_embedding.clone(), "a recipe for soup", 0.1).await;
    put(&runtime, "unrelated_two", orthogonal_embedding.clone(), "weather report for today", 0.1).await;

    let results = runtime
        .retriever
        .query("u", QUERY_TEXT, &query_embedding, &QueryFilters::default(), 3)
        .await
        .unwrap();

    assert_eq!(results.len(), 3, "expected the three related items, got {results:?}");
    assert_eq!(results[0].id, "both", "item matching both modalities must rank first");

    let top_ids: Vec<&str> = results.iter().map(|o| o.id.as_str()).collect();
    assert!(!top_ids.contains(&"unrelated_one"));
    assert!(!top_ids.contains(&"unrelated_two"));
    assert!(top_ids.contains(&"vector_only"));
    assert!(top_ids.contains(&"text_only"));
}

#[tokio::test]
async fn repeated_query_hits_the_cache_without_changing_results() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    let embedding = fallback_embedding("vector index", 64);
    put(&runtime, "o1", embedding.clone(), "a vector index explained simply", 0.8).await;

    let filters = QueryFilters::default();
    let first = runtime.retriever.query("u", QUERY_TEXT, &embedding, &filters, 5).await.unwrap();
    let second = runtime.retriever.query("u", QUERY_TEXT, &embedding, &filters, 5).await.unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].id, second[0].id);
}
