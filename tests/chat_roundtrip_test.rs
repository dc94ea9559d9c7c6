// tests/chat_roundtrip_test.rs
// External-model roundtrip: chat() must answer, record non-zero usage,
// report a routing decision, and leave behind an observation that becomes
// queryable for a related follow-up search.

use hinata_core::context::{AuthContext, RequestContext};
use hinata_core::gateway::ChatRequest;
use hinata_core::retriever::QueryFilters;
use hinata_core::runtime::CoreRuntime;

fn chat_ctx() -> RequestContext {
    RequestContext::new(AuthContext {
        app_id: "a".to_string(),
        subject_user_id: Some("u".to_string()),
        capabilities: vec!["chat:invoke".to_string()],
    })
}

#[tokio::test]
async fn chat_answers_records_usage_and_becomes_queryable() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    let ctx = chat_ctx();

    let response = runtime
        .gateway
        .chat(
            &ctx,
            ChatRequest {
                user_id: "u".to_string(),
                app_id: "a".to_string(),
                question: "recommend an index for 2M vectors".to_string(),
                model_preference: None,
                user_provided_key: None,
            },
            &[],
        )
        .await
        .unwrap();

    assert!(!response.answer.is_empty());
    assert!(!response.routing_decision.is_empty());
    let total_tokens = response.usage.prompt_tokens + response.usage.completion_tokens;
    assert!(total_tokens > 0, "expected non-zero usage, got {:?}", response.usage);

    let stored = runtime
        .store
        .get("u", &response.observation_id)
        .await
        .unwrap()
        .expect("chat roundtrip observation persisted");
    assert_eq!(stored.source, "__chat");
    assert_eq!(stored.highlight, "recommend an index for 2M vectors");
    assert_eq!(stored.note, response.answer);

    let query_embedding = hinata_core::vecmath::fallback_embedding("vector index", 64);
    let results = runtime
        .retriever
        .query("u", "vector index", &query_embedding, &QueryFilters::default(), 5)
        .await
        .unwrap();
    assert!(
        results.iter().any(|o| o.id == response.observation_id),
        "expected the chat observation among top results, got {results:?}"
    );
}

#[tokio::test]
async fn chat_without_capability_is_rejected() {
    let runtime = CoreRuntime::for_tests().await.unwrap();
    let ctx = RequestContext::new(AuthContext {
        app_id: "a".to_string(),
        subject_user_id: Some("u".to_string()),
        capabilities: vec![],
    });

    let result = runtime
        .gateway
        .chat(
            &ctx,
            ChatRequest {
                user_id: "u".to_string(),
                app_id: "a".to_string(),
                question: "anything".to_string(),
                model_preference: None,
                user_provided_key: None,
            },
            &[],
        )
        .await;

    assert!(result.is_err(), "chat without chat:invoke capability must be rejected");
}
