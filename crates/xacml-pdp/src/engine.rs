// engine.rs - The policy decision point.
//
// A Pdp owns one immutable policy tree and answers any number of requests
// against it, concurrently if the caller wishes. Each call:
//
// 1. Creates a fresh EvaluationContext (own request id, caches, clock).
// 2. Evaluates the root policy or policy set.
// 3. Drops the applicable-policy list unless the request asked for it.
//
// Evaluation never fails: every error ends up in the result's Status.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::PdpConfig;
use crate::context::{AttributeProvider, EvaluationContext, Request, XPathEvaluator};
use crate::decision::DecisionResult;
use crate::policy::PolicyElement;
use crate::registry::Registry;

#[derive(Clone)]
pub struct Pdp {
    root: PolicyElement,
    registry: Arc<Registry>,
    config: PdpConfig,
    provider: Option<Arc<dyn AttributeProvider>>,
    xpath: Option<Arc<dyn XPathEvaluator>>,
}

impl Pdp {
    /// `registry` must be the one the policy tree was built with; the PDP
    /// uses its datatypes to read request and provider values.
    pub fn new(root: impl Into<PolicyElement>, registry: Arc<Registry>, config: PdpConfig) -> Self {
        let root = root.into();
        tracing::info!(
            "PDP ready with root {} (xpath {})",
            root.identifier(),
            if config.enable_xpath { "enabled" } else { "disabled" }
        );
        Self {
            root,
            registry,
            config,
            provider: None,
            xpath: None,
        }
    }

    /// Consult `provider` for attributes the request does not carry.
    pub fn with_attribute_provider(mut self, provider: Arc<dyn AttributeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// XPath capability for AttributeSelectors; only used when
    /// `enable_xpath` is set.
    pub fn with_xpath_evaluator(mut self, xpath: Arc<dyn XPathEvaluator>) -> Self {
        self.xpath = Some(xpath);
        self
    }

    pub fn root(&self) -> &PolicyElement {
        &self.root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &PdpConfig {
        &self.config
    }

    pub fn evaluate(&self, request: &Request) -> DecisionResult {
        self.evaluate_at(request, Utc::now())
    }

    /// Evaluate with the PDP clock frozen at `now`.
    pub fn evaluate_at(&self, request: &Request, now: DateTime<Utc>) -> DecisionResult {
        let mut ctx = EvaluationContext::new(request, &self.config, self.registry.datatypes()).at(now);
        if let Some(provider) = &self.provider {
            ctx = ctx.with_attribute_provider(provider.as_ref());
        }
        if let Some(xpath) = &self.xpath {
            ctx = ctx.with_xpath_evaluator(xpath.as_ref());
        }

        let span = tracing::info_span!("pdp_evaluate", request_id = %ctx.request_id());
        let _guard = span.enter();

        let mut result = self.root.evaluate(&mut ctx);
        if !request.return_policy_id_list() {
            result.clear_applicable_policies();
        }

        if result.is_indeterminate() {
            tracing::warn!(
                "decision {}: {}",
                result,
                result.status().message.as_deref().unwrap_or("no status message")
            );
        } else {
            tracing::debug!("decision {}", result);
        }
        result
    }
}

impl std::fmt::Debug for Pdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdp")
            .field("root", &self.root.identifier())
            .field("config", &self.config)
            .field("attribute_provider", &self.provider.is_some())
            .field("xpath_evaluator", &self.xpath.is_some())
            .finish()
    }
}
