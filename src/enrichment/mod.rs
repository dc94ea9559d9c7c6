// src/enrichment/mod.rs
// EnrichmentWorker component (spec §4.6).

pub mod capability;
pub mod fallback;
pub mod worker;

pub use capability::{EnrichRequest, EnrichResult, EnrichmentCapability};
pub use fallback::DeterministicFallbackEnrichment;
pub use worker::EnrichmentWorker;
