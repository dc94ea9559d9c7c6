// src/enrichment/capability.rs
// Enrichment capability contract (spec §6): a narrow external collaborator
// invoked by EnrichmentWorker. Pluggable so tests and deployments without a
// local model can substitute a deterministic fake, following the teacher's
// `MemoryStore` trait seam (backend/src/memory/core/traits.rs).

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct EnrichRequest<'a> {
    pub highlight: &'a str,
    pub note: &'a str,
    pub tags: &'a [String],
}

#[derive(Debug, Clone)]
pub struct EnrichResult {
    pub tags: Vec<String>,
    pub top_sentences: Vec<String>,
    pub topics: Vec<String>,
    pub sentiment: crate::types::Sentiment,
    pub complexity: crate::types::Complexity,
    pub embedding: Vec<f32>,
    pub model_version: String,
}

#[async_trait]
pub trait EnrichmentCapability: Send + Sync {
    async fn enrich(&self, req: EnrichRequest<'_>) -> anyhow::Result<EnrichResult>;
}
