// src/metrics.rs
// Prometheus metrics, grounded in the teacher's metrics module
// (backend/src/metrics/mod.rs): same init-a-global-recorder-once shape and
// counter!/gauge!/histogram! call sites, renamed to this crate's domain
// (ingestion, enrichment, chat, tiered storage) instead of Mira's
// LLM/tool-execution metrics. No axum dependency here, so rendering the
// Prometheus text exposition format is left to whatever HTTP layer a
// deployment wraps this crate in; `render()` returns the text directly.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the process-wide Prometheus recorder. Idempotent: a second call
/// is a no-op rather than a panic, since tests may construct more than one
/// `CoreRuntime` in the same process.
pub fn init_metrics() {
    if PROMETHEUS_HANDLE.get().is_some() {
        return;
    }
    if let Ok(handle) = PrometheusBuilder::new().install_recorder() {
        let _ = PROMETHEUS_HANDLE.set(handle);
    }
}

/// Renders the current metrics snapshot in Prometheus text exposition
/// format, or `None` if [`init_metrics`] was never called.
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_batch_submitted(accepted: usize, rejected: usize, degraded: bool) {
    counter!("hinata_observations_accepted_total").increment(accepted as u64);
    counter!("hinata_observations_rejected_total").increment(rejected as u64);
    if degraded {
        counter!("hinata_batches_degraded_total").increment(1);
    }
}

pub fn record_enrichment(degraded: bool, duration_seconds: f64) {
    let status = if degraded { "degraded" } else { "ok" };
    counter!("hinata_enrichment_total", "status" => status).increment(1);
    histogram!("hinata_enrichment_duration_seconds").record(duration_seconds);
}

pub fn record_storage_write(tier: &str, success: bool) {
    let status = if success { "ok" } else { "error" };
    counter!("hinata_storage_writes_total", "tier" => tier.to_string(), "status" => status)
        .increment(1);
}

pub fn record_tier_migration(migrated: usize) {
    counter!("hinata_tier_migrations_total").increment(migrated as u64);
}

pub fn record_profile_update(components_after: usize) {
    counter!("hinata_profile_updates_total").increment(1);
    gauge!("hinata_profile_components_last").set(components_after as f64);
}

pub fn record_retriever_query(cache_hit: bool, duration_seconds: f64) {
    let result = if cache_hit { "hit" } else { "miss" };
    counter!("hinata_retriever_queries_total", "cache" => result).increment(1);
    histogram!("hinata_retriever_query_duration_seconds").record(duration_seconds);
}

pub fn record_chat(provider: &str, success: bool, cost_usd: f64) {
    let status = if success { "ok" } else { "error" };
    counter!("hinata_chat_calls_total", "provider" => provider.to_string(), "status" => status)
        .increment(1);
    counter!("hinata_chat_cost_usd_total", "provider" => provider.to_string())
        .increment((cost_usd * 1_000_000.0).round() as u64);
}

pub fn set_queue_depth(name: &str, depth: usize) {
    gauge!("hinata_queue_depth", "queue" => name.to_string()).set(depth as f64);
}
