// src/gateway/mod.rs
// ExternalModelGateway (spec §4.8): the "ask a question" entry point.
// Composes a prompt, invokes an external-model capability with the shared
// retry combinator, records usage, and feeds the Q/A pair back into
// ObservationPipeline as a normal observation.

pub mod capability;
pub mod fake;

use crate::audit::AuditLog;
use crate::context::RequestContext;
use crate::error::CoreError;
use crate::pipeline::{BatchOptions, ObservationPipeline, SubmitBatchRequest};
use crate::privacy::PrivacyStore;
use crate::prompt::{PromptComposer, PromptComposerConfig};
use crate::ratelimit::AppRateLimiter;
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{
    AccessKind, AccessLevel, AccessResult, AccessorKind, AuditRecord, DataKind, ProfileComponent, RawObservation,
    UsageRecord,
};
use crate::usage::UsageRecorder;
use capability::{ExternalModelCapability, InvokeParams, ProviderOption};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct ChatRequest {
    pub user_id: String,
    pub app_id: String,
    pub question: String,
    pub model_preference: Option<String>,
    pub user_provided_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Billing {
    pub cost_usd: f64,
    /// `None` when no baseline comparison applies (pinned / user-key
    /// routing); see spec §9 open question on the undefined "savings"
    /// baseline — this crate reports the percent relative to the configured
    /// baseline provider only when auto-routing actually selects a cheaper
    /// option, and omits it otherwise rather than inventing a number.
    pub savings_percent: Option<f32>,
}

pub struct ChatResponse {
    pub answer: String,
    pub usage: UsageRecord,
    pub billing: Billing,
    pub routing_decision: String,
    pub prompt_profile_used: String,
    pub observation_id: String,
}

pub struct ExternalModelGateway {
    prompt_composer: Arc<PromptComposer>,
    prompt_cfg: PromptComposerConfig,
    capability: Arc<dyn ExternalModelCapability>,
    usage: Arc<UsageRecorder>,
    pipeline: Arc<ObservationPipeline>,
    providers: Vec<ProviderOption>,
    baseline_provider_index: usize,
    privacy: Arc<PrivacyStore>,
    rate_limiter: Arc<AppRateLimiter>,
    app_rate_limit_per_minute: u32,
    audit: Arc<AuditLog>,
}

impl ExternalModelGateway {
    pub fn new(
        prompt_composer: Arc<PromptComposer>,
        prompt_cfg: PromptComposerConfig,
        capability: Arc<dyn ExternalModelCapability>,
        usage: Arc<UsageRecorder>,
        pipeline: Arc<ObservationPipeline>,
        providers: Vec<ProviderOption>,
        privacy: Arc<PrivacyStore>,
        rate_limiter: Arc<AppRateLimiter>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            prompt_composer,
            prompt_cfg,
            capability,
            usage,
            pipeline,
            providers,
            baseline_provider_index: 0,
            privacy,
            rate_limiter,
            app_rate_limit_per_minute: 60,
            audit,
        }
    }

    /// Overrides the default per-app chat rate limit (spec §6
    /// `registerApp.rateLimitPerMinute`); callers that track per-app limits
    /// in `AppRegistry` should look the value up per request instead when
    /// precision matters more than this gateway-wide default.
    pub fn with_app_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.app_rate_limit_per_minute = requests_per_minute;
        self
    }

    pub async fn chat(
        &self,
        ctx: &RequestContext,
        req: ChatRequest,
        components: &[ProfileComponent],
    ) -> Result<ChatResponse, CoreError> {
        if !ctx.auth.has("chat:invoke") {
            return Err(CoreError::Authz { capability: "chat:invoke".to_string() });
        }

        self.rate_limiter.check(&req.app_id, self.app_rate_limit_per_minute)?;

        let privacy = self.privacy.load(&req.user_id).await?;
        if !privacy.permits_app(&req.app_id) {
            return Err(CoreError::Authz { capability: format!("app:{}", req.app_id) });
        }

        let query_embedding = crate::vecmath::fallback_embedding(&req.question, 64);
        let composed = self
            .prompt_composer
            .compose(
                &req.user_id,
                &req.question,
                &query_embedding,
                components,
                &self.prompt_cfg,
                None,
                Utc::now(),
            )
            .await?;

        self.audit
            .record(&AuditRecord {
                user_id: req.user_id.clone(),
                accessor_id: req.app_id.clone(),
                accessor_kind: AccessorKind::App,
                data_kind: DataKind::Profile,
                data_id: req.user_id.clone(),
                access_kind: AccessKind::Read,
                timestamp: Utc::now(),
                ip: None,
                purpose: Some("chat".to_string()),
                result: AccessResult::Allowed,
            })
            .await?;

        let (provider, model, routing_decision, chargeable) = self.route(&req);

        let invoke_result = with_retry(RetryPolicy::EXTERNAL_MODEL, || {
            let capability = self.capability.clone();
            let provider = provider.clone();
            let model = model.clone();
            let prompt = composed.text.clone();
            async move {
                capability
                    .invoke(&provider, &model, &prompt, &InvokeParams { max_tokens: None, temperature: None })
                    .await
                    .map_err(|e| CoreError::ExternalModel(e.to_string()))
            }
        })
        .await;

        let day = Utc::now().date_naive();

        let invoke_result = match invoke_result {
            Ok(r) => r,
            Err(e) => {
                let failed_record = UsageRecord {
                    user_id: req.user_id.clone(),
                    app_id: req.app_id.clone(),
                    day,
                    provider,
                    model,
                    prompt_tokens: 0,
                    completion_tokens: 0,
                    cost_usd: 0.0,
                    cache_hit: false,
                    routing_decision,
                    failed: true,
                    timestamp: Utc::now(),
                };
                self.usage.record(&failed_record).await?;
                crate::metrics::record_chat(&failed_record.provider, false, 0.0);
                return Err(e);
            }
        };

        let (cost_usd, savings_percent) = if chargeable {
            self.cost_for(&provider, &model, invoke_result.prompt_tokens, invoke_result.completion_tokens)
        } else {
            (0.0, None)
        };

        let usage_record = UsageRecord {
            user_id: req.user_id.clone(),
            app_id: req.app_id.clone(),
            day,
            provider: provider.clone(),
            model: model.clone(),
            prompt_tokens: invoke_result.prompt_tokens,
            completion_tokens: invoke_result.completion_tokens,
            cost_usd,
            cache_hit: false,
            routing_decision: routing_decision.clone(),
            failed: false,
            timestamp: Utc::now(),
        };
        self.usage.record(&usage_record).await?;
        crate::metrics::record_chat(&usage_record.provider, true, usage_record.cost_usd);

        let observation_id = Uuid::new_v4().to_string();
        let raw = RawObservation {
            id: observation_id.clone(),
            user_id: req.user_id.clone(),
            app_id: req.app_id.clone(),
            timestamp: Utc::now(),
            source: "__chat".to_string(),
            highlight: req.question.clone(),
            note: invoke_result.text.clone(),
            address: format!("chat://{observation_id}"),
            tags: vec!["qa".to_string()],
            access: AccessLevel::Private,
        };
        self.pipeline
            .submit_batch(SubmitBatchRequest {
                app_id: req.app_id.clone(),
                user_id: req.user_id.clone(),
                batch: vec![raw],
                options: BatchOptions::default(),
            })
            .await?;

        Ok(ChatResponse {
            answer: invoke_result.text,
            usage: usage_record,
            billing: Billing { cost_usd, savings_percent },
            routing_decision,
            prompt_profile_used: composed.text,
            observation_id,
        })
    }

    /// Routing decision (spec §4.8 step 3): a pinned user-provided key wins
    /// outright and is never charged; otherwise auto-select the cheapest
    /// registered provider and charge for it only if it beats the
    /// configured baseline provider's cost.
    fn route(&self, req: &ChatRequest) -> (String, String, String, bool) {
        if let (Some(_key), Some(model)) = (&req.user_provided_key, &req.model_preference) {
            return ("user".to_string(), model.clone(), format!("pinned:user/{model}"), false);
        }

        if self.providers.is_empty() {
            return ("fallback".to_string(), "fallback".to_string(), "fallback:none-registered".to_string(), false);
        }

        let baseline = &self.providers[self.baseline_provider_index.min(self.providers.len() - 1)];
        let (baseline_prompt_cost, baseline_completion_cost) =
            self.capability.cost_per_token(&baseline.provider, &baseline.model);
        let baseline_cost = baseline_prompt_cost + baseline_completion_cost;

        let cheapest = self
            .providers
            .iter()
            .min_by(|a, b| {
                let (ap, ac) = self.capability.cost_per_token(&a.provider, &a.model);
                let (bp, bc) = self.capability.cost_per_token(&b.provider, &b.model);
                (ap + ac).partial_cmp(&(bp + bc)).unwrap()
            })
            .unwrap();

        let (cp, cc) = self.capability.cost_per_token(&cheapest.provider, &cheapest.model);
        let cheapest_cost = cp + cc;
        let chargeable = cheapest_cost < baseline_cost;
        let decision = format!("auto:{}/{}", cheapest.provider, cheapest.model);
        (cheapest.provider.clone(), cheapest.model.clone(), decision, chargeable)
    }

    fn cost_for(&self, provider: &str, model: &str, prompt_tokens: u64, completion_tokens: u64) -> (f64, Option<f32>) {
        let (prompt_rate, completion_rate) = self.capability.cost_per_token(provider, model);
        let cost = prompt_rate * prompt_tokens as f64 + completion_rate * completion_tokens as f64;

        if self.providers.is_empty() {
            return (cost, None);
        }
        let baseline = &self.providers[self.baseline_provider_index.min(self.providers.len() - 1)];
        let (bp, bc) = self.capability.cost_per_token(&baseline.provider, &baseline.model);
        let baseline_cost = (bp + bc) * (prompt_tokens + completion_tokens) as f64;
        if baseline_cost <= 0.0 || baseline_cost <= cost {
            return (cost, None);
        }
        let savings = ((baseline_cost - cost) / baseline_cost * 100.0) as f32;
        (cost, Some(savings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AuthContext;

    #[test]
    fn missing_capability_blocks_chat() {
        let ctx = RequestContext::new(AuthContext {
            app_id: "a".into(),
            subject_user_id: Some("u".into()),
            capabilities: vec!["observation:read".into()],
        });
        assert!(!ctx.auth.has("chat:invoke"));
    }
}
