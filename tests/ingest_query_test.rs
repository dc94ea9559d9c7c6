// tests/ingest_query_test.rs
// Single ingest, single query: submit one observation and confirm it comes
// back enriched, scored and retrievable by a related text query.

use chrono::Utc;
use hinata_core::pipeline::{BatchOptions, ItemOutcome, SubmitBatchRequest};
use hinata_core::retriever::QueryFilters;
use hinata_core::runtime::CoreRuntime;
use hinata_core::types::{AccessLevel, RawObservation};

fn vector_databases_note() -> RawObservation {
    RawObservation {
        id: "o1".to_string(),
        user_id: "u".to_string(),
        app_id: "a".to_string(),
        timestamp: Utc::now(),
        source: "notes".to_string(),
        highlight: "vector databases".to_string(),
        note: "HNSW is an ANN index".to_string(),
        address: "n://1".to_string(),
        tags: vec!["db".to_string()],
        access: AccessLevel::Private,
    }
}

#[tokio::test]
async fn single_ingest_is_accepted_scored_and_stored() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    let summary = runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![vector_databases_note()],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    assert_eq!(summary.per_item.len(), 1);
    let influence_weight = match &summary.per_item[0].outcome {
        ItemOutcome::Accepted { influence_weight } => *influence_weight,
        other => panic!("expected acceptance, got {other:?}"),
    };
    assert_eq!(summary.per_item[0].id, "o1");

    let stored = runtime.store.get("u", "o1").await.unwrap().expect("observation persisted");
    assert!(!stored.embedding.is_empty());
    assert!(stored.quality_score >= 0.4);
    // No prior history for this user, so attentionWeight stays near its floor.
    assert!(stored.attention_weight <= 0.15);
    assert!((influence_weight - stored.quality_score * stored.attention_weight).abs() < 1e-5);
}

#[tokio::test]
async fn query_after_ingest_returns_the_observation() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![vector_databases_note()],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    let query_embedding = hinata_core::vecmath::fallback_embedding("ANN", 64);
    let results = runtime
        .retriever
        .query("u", "ANN", &query_embedding, &QueryFilters::default(), 5)
        .await
        .unwrap();

    assert!(results.iter().any(|o| o.id == "o1"), "expected o1 among top results, got {results:?}");
}
