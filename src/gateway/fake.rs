// src/gateway/fake.rs
// Deterministic external-model fake for tests and for CoreRuntime::for_tests,
// mirroring DeterministicFallbackEnrichment's dependency-free approach.

use super::capability::{ExternalModelCapability, InvokeParams, InvokeResult};
use async_trait::async_trait;

pub struct EchoModelCapability;

#[async_trait]
impl ExternalModelCapability for EchoModelCapability {
    async fn invoke(
        &self,
        _provider: &str,
        _model: &str,
        prompt_profile: &str,
        _params: &InvokeParams,
    ) -> anyhow::Result<InvokeResult> {
        let answer = format!("[fake-answer based on {} chars of context]", prompt_profile.len());
        Ok(InvokeResult {
            prompt_tokens: (prompt_profile.len() / 4) as u64,
            completion_tokens: (answer.len() / 4) as u64,
            latency_ms: 1,
            text: answer,
        })
    }

    fn cost_per_token(&self, _provider: &str, _model: &str) -> (f64, f64) {
        (0.000003, 0.000015)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_is_deterministic_given_same_prompt() {
        let cap = EchoModelCapability;
        let params = InvokeParams { max_tokens: None, temperature: None };
        let a = cap.invoke("p", "m", "hello world", &params).await.unwrap();
        let b = cap.invoke("p", "m", "hello world", &params).await.unwrap();
        assert_eq!(a.text, b.text);
    }
}
