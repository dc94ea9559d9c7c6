// src/gateway/capability.rs
// External-model capability contract (spec §6), mirroring the enrichment
// capability's trait seam so a provider (or a test fake) can be swapped in
// without touching ExternalModelGateway.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct InvokeParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct InvokeResult {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub latency_ms: u64,
}

#[async_trait]
pub trait ExternalModelCapability: Send + Sync {
    async fn invoke(
        &self,
        provider: &str,
        model: &str,
        prompt_profile: &str,
        params: &InvokeParams,
    ) -> anyhow::Result<InvokeResult>;

    /// USD cost per (prompt, completion) token pair for `provider`/`model`,
    /// used by the routing policy. A fixed table is sufficient here; a real
    /// deployment would refresh this from the provider's pricing API.
    fn cost_per_token(&self, provider: &str, model: &str) -> (f64, f64);
}

/// A named provider/model pair the auto-router can choose between.
#[derive(Debug, Clone)]
pub struct ProviderOption {
    pub provider: String,
    pub model: String,
    /// Relative quality score in [0,1]; higher is better. Used to break
    /// ties among providers within the cost baseline.
    pub quality: f32,
}
