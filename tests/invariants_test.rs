// tests/invariants_test.rs
// Quantified invariants and boundary behaviors from the testable-properties
// list that aren't already exercised by an end-to-end scenario test.

use chrono::Utc;
use hinata_core::pipeline::{BatchOptions, ItemOutcome, SubmitBatchRequest};
use hinata_core::runtime::CoreRuntime;
use hinata_core::types::{AccessKind, AccessLevel, AccessResult, DataKind, RawObservation};
use hinata_core::vecmath::is_l2_normalized;

fn raw(id: &str, note_len: usize) -> RawObservation {
    RawObservation {
        id: id.to_string(),
        user_id: "u".to_string(),
        app_id: "a".to_string(),
        timestamp: Utc::now(),
        source: "notes".to_string(),
        highlight: format!("note {id}"),
        note: "n".repeat(note_len),
        address: format!("n://{id}"),
        tags: vec![],
        access: AccessLevel::Private,
    }
}

#[tokio::test]
async fn embedding_is_l2_normalized_after_ingest() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![raw("o1", 20)],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    let stored = runtime.store.get("u", "o1").await.unwrap().unwrap();
    assert!(is_l2_normalized(&stored.embedding, 1e-3), "embedding not L2-normalized: {:?}", stored.embedding);
}

#[tokio::test]
async fn influence_weight_never_exceeds_quality_times_attention() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![raw("o1", 20)],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    let stored = runtime.store.get("u", "o1").await.unwrap().unwrap();
    assert!(stored.influence_weight >= 0.0 && stored.influence_weight <= 1.0);
    assert!(stored.influence_weight <= stored.quality_score * stored.attention_weight + 1e-5);
}

#[tokio::test]
async fn per_item_results_line_up_one_to_one_with_the_batch() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    let batch = vec![raw("o1", 20), raw("o2", 20), raw("o3", 20)];
    let summary = runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: batch.clone(),
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    assert_eq!(summary.per_item.len(), batch.len());
    for (item, result) in batch.iter().zip(summary.per_item.iter()) {
        assert_eq!(&item.id, &result.id);
    }
}

#[tokio::test]
async fn empty_batch_is_accepted_with_an_empty_per_item_list() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    let summary = runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    assert_eq!(summary.per_item.len(), 0);
    assert_eq!(summary.processed_count, 0);
}

#[tokio::test]
async fn oversized_item_is_rejected_and_the_rest_of_the_batch_still_proceeds() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    let oversized = raw("too-big", 100_000);
    let normal = raw("fine", 20);

    let summary = runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![oversized, normal],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    assert_eq!(summary.per_item.len(), 2);
    match &summary.per_item[0].outcome {
        ItemOutcome::Rejected { .. } => {}
        other => panic!("expected the oversized item to be rejected, got {other:?}"),
    }
    match &summary.per_item[1].outcome {
        ItemOutcome::Accepted { .. } => {}
        other => panic!("expected the well-formed item to be accepted, got {other:?}"),
    }
    assert!(runtime.store.get("u", "fine").await.unwrap().is_some());
}

#[tokio::test]
async fn ingesting_an_observation_produces_exactly_one_audit_record() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![raw("o1", 20)],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    let records = runtime.audit.for_user("u", 10).await.unwrap();
    assert_eq!(records.len(), 1, "expected exactly one audit record for the write, got {records:?}");
    assert_eq!(records[0].data_id, "o1");
    assert_eq!(records[0].data_kind, DataKind::Observation);
    assert_eq!(records[0].access_kind, AccessKind::Write);
    assert_eq!(records[0].result, AccessResult::Allowed);
}

#[tokio::test]
async fn duplicate_submission_still_audits_each_distinct_access() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    // Two distinct submissions of the same content each access the
    // observation once, even though the second resolves to the already
    // stored record instead of writing a new one.
    for _ in 0..2 {
        runtime
            .pipeline
            .submit_batch(SubmitBatchRequest {
                app_id: "a".to_string(),
                user_id: "u".to_string(),
                batch: vec![raw("o1", 20)],
                options: BatchOptions::default(),
            })
            .await
            .unwrap();
    }

    let records = runtime.audit.for_user("u", 10).await.unwrap();
    assert_eq!(records.len(), 2, "expected one audit record per submission, got {records:?}");
    assert_eq!(records[0].access_kind, AccessKind::Read, "the duplicate hit is a read of the existing record");
    assert_eq!(records[1].access_kind, AccessKind::Write, "the first submission is the write that created it");
}

#[tokio::test]
async fn loading_a_profile_produces_an_audit_record() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    runtime.profile_engine.load_profile("u").await.unwrap();

    let records = runtime.audit.for_user("u", 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].data_kind, DataKind::Profile);
    assert_eq!(records[0].access_kind, AccessKind::Read);
}

#[tokio::test]
async fn querying_produces_one_audit_record_per_returned_observation() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    runtime
        .pipeline
        .submit_batch(SubmitBatchRequest {
            app_id: "a".to_string(),
            user_id: "u".to_string(),
            batch: vec![raw("o1", 20)],
            options: BatchOptions::default(),
        })
        .await
        .unwrap();

    let embedding = hinata_core::vecmath::fallback_embedding("note o1", 64);
    let results = runtime
        .retriever
        .query("u", "note", &embedding, &hinata_core::retriever::QueryFilters::default(), 5)
        .await
        .unwrap();

    assert!(!results.is_empty(), "expected the ingested observation to come back from the query");

    let records = runtime.audit.for_user("u", 50).await.unwrap();
    let observation_reads = records
        .iter()
        .filter(|r| r.data_kind == DataKind::Observation && r.access_kind == AccessKind::Read)
        .count();
    assert_eq!(observation_reads, results.len(), "expected one read record per observation returned by the query");
}
