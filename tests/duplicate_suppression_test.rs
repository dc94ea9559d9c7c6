// tests/duplicate_suppression_test.rs
// Submitting the same raw observation twice within the dedup window must
// yield the same observation id both times and exactly one stored record.

use chrono::Utc;
use hinata_core::pipeline::{BatchOptions, ItemOutcome, SubmitBatchRequest};
use hinata_core::runtime::CoreRuntime;
use hinata_core::types::{AccessLevel, RawObservation};

fn raw() -> RawObservation {
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
async fn duplicate_submission_within_window_collapses_to_one_record() {
    let runtime = CoreRuntime::for_tests().await.unwrap();

    let submit = |obs: RawObservation| {
        let pipeline = runtime.pipeline.clone();
        async move {
            pipeline
                .submit_batch(SubmitBatchRequest {
                    app_id: "a".to_string(),
                    user_id: "u".to_string(),
                    batch: vec![obs],
                    options: BatchOptions::default(),
                })
                .await
                .unwrap()
        }
    };

    let first = submit(raw()).await;
    let mut second_raw = raw();
    second_raw.id = "o2-different-id-same-content".to_string();
    let second = submit(second_raw).await;

    let first_id = match &first.per_item[0].outcome {
        ItemOutcome::Accepted { .. } => first.per_item[0].id.clone(),
        other => panic!("expected acceptance, got {other:?}"),
    };
    let second_id = match &second.per_item[0].outcome {
        ItemOutcome::Accepted { .. } => second.per_item[0].id.clone(),
        other => panic!("expected acceptance, got {other:?}"),
    };
    assert_eq!(first_id, second_id, "duplicate content must resolve to the same observation id");

    let since = Utc::now() - chrono::Duration::days(1);
    let stored = runtime.store.recent_for_user("u", since, 100).await.unwrap();
    assert_eq!(stored.len(), 1, "exactly one record should be stored for duplicate content");
}
