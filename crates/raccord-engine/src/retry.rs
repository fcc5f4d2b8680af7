use std::time::Duration;

use anyhow::{Context, Result};
use raccord_contracts::defects::{Classification, DecisionResult, DopError, RetryAction};
use raccord_contracts::events::{emit_best_effort, EventLog};
use raccord_contracts::verdict::parse_retry_verdict;
use raccord_contracts::vocabulary::Vocabulary;
use serde_json::json;

use crate::classifier::ErrorClassifier;
use crate::images::{ImageNormalizer, ImageSource};
use crate::map_object;
use crate::prompts::{offline_correction, retry_context, RETRY_INSTRUCTION};
use crate::vision::{
    error_chain_text, resolve_model, Credentials, RequestPart, VisionClient, VisionReply,
    VisionRequest,
};

pub const DECISION_MODEL_ENV: &str = "RACCORD_DECISION_MODEL";
pub const SKIP_CONFIDENCE: f64 = 0.9;
pub const OFFLINE_CONFIDENCE: f64 = 0.7;
const DECISION_TIMEOUT: Duration = Duration::from_secs(90);
const DECISION_MAX_OUTPUT_TOKENS: u64 = 1024;

/// Decides whether a shot that failed validation is worth regenerating.
///
/// The offline classification always runs first. Identity-level defects end
/// the decision there; otherwise the model is consulted when credentials and
/// both images are available, and any failure falls back to the offline
/// verdict.
pub struct RetryDecisionAgent<'a> {
    client: &'a dyn VisionClient,
    vocabulary: &'a Vocabulary,
    normalizer: ImageNormalizer,
    model: Option<String>,
    events: Option<&'a EventLog>,
    scene_id: Option<String>,
}

impl<'a> RetryDecisionAgent<'a> {
    pub fn new(client: &'a dyn VisionClient, vocabulary: &'a Vocabulary) -> Self {
        Self {
            client,
            vocabulary,
            normalizer: ImageNormalizer::default(),
            model: None,
            events: None,
            scene_id: None,
        }
    }

    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_events(mut self, events: Option<&'a EventLog>) -> Self {
        self.events = events;
        self
    }

    /// Tags emitted events with the scene being regenerated.
    pub fn for_scene(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = Some(scene_id.into());
        self
    }

    pub fn decide(
        &self,
        failed_image: Option<&ImageSource>,
        reference_image: Option<&ImageSource>,
        original_prompt: &str,
        errors: &[DopError],
        credentials: Option<&Credentials>,
    ) -> DecisionResult {
        let classifier = ErrorClassifier::new(self.vocabulary);
        let classification = classifier.classify(errors);
        let tally = DefectTally {
            classification: &classification,
            assumed_fixable: classifier.assumed_fixable(&classification.fixable),
        };
        if classification.decision == RetryAction::Skip {
            let decision = skip_decision(&classification);
            self.record(&decision, "rules", None, &tally);
            return decision;
        }

        if let (Some(credentials), Some(failed), Some(reference)) =
            (credentials, failed_image, reference_image)
        {
            let model = resolve_model(
                self.model.as_deref(),
                &[DECISION_MODEL_ENV],
                credentials.provider.default_decision_model(),
            );
            match self.escalate(failed, reference, original_prompt, errors, credentials, &model) {
                Ok((decision, reply)) => {
                    self.record(&decision, "model", Some(&reply), &tally);
                    return decision;
                }
                Err(err) => {
                    emit_best_effort(
                        self.events,
                        "retry_escalation_failed",
                        self.scene_id.as_deref(),
                        map_object(json!({
                            "provider": credentials.provider.as_str(),
                            "model": model,
                            "error": error_chain_text(&err, 512),
                        })),
                    );
                }
            }
        }

        let decision = offline_decision(&classification);
        self.record(&decision, "offline", None, &tally);
        decision
    }

    fn escalate(
        &self,
        failed: &ImageSource,
        reference: &ImageSource,
        original_prompt: &str,
        errors: &[DopError],
        credentials: &Credentials,
        model: &str,
    ) -> Result<(DecisionResult, VisionReply)> {
        let failed = self
            .normalizer
            .normalize(failed)
            .with_context(|| format!("failed image unavailable ({})", failed.label()))?;
        let reference = self
            .normalizer
            .normalize(reference)
            .with_context(|| format!("reference image unavailable ({})", reference.label()))?;
        let request = VisionRequest {
            model: model.to_string(),
            parts: vec![
                RequestPart::Text(retry_context(original_prompt, errors)),
                RequestPart::Text("Failed generation:".to_string()),
                RequestPart::Image(failed),
                RequestPart::Text("Continuity reference:".to_string()),
                RequestPart::Image(reference),
                RequestPart::Text(RETRY_INSTRUCTION.to_string()),
            ],
            max_output_tokens: DECISION_MAX_OUTPUT_TOKENS,
            timeout: DECISION_TIMEOUT,
        };
        let reply = self.client.complete(credentials, &request)?;
        let decision = parse_retry_verdict(&reply.text)?;
        Ok((decision, reply))
    }

    fn record(
        &self,
        decision: &DecisionResult,
        source: &str,
        reply: Option<&VisionReply>,
        tally: &DefectTally<'_>,
    ) {
        emit_best_effort(
            self.events,
            "retry_decided",
            self.scene_id.as_deref(),
            map_object(json!({
                "source": source,
                "action": decision.action(),
                "confidence": decision.confidence(),
                "reason": decision.reason(),
                "has_enhanced_prompt": decision.enhanced_prompt().is_some(),
                "fixable_count": tally.classification.fixable.len(),
                "assumed_fixable_count": tally.assumed_fixable,
                "unfixable_count": tally.classification.unfixable.len(),
                "model": reply.map(|reply| reply.model.clone()),
                "input_tokens": reply.and_then(|reply| reply.input_tokens),
                "output_tokens": reply.and_then(|reply| reply.output_tokens),
            })),
        );
    }
}

struct DefectTally<'c> {
    classification: &'c Classification,
    assumed_fixable: usize,
}

fn skip_decision(classification: &Classification) -> DecisionResult {
    let reason = if classification.unfixable.is_empty() {
        "No continuity errors to correct.".to_string()
    } else {
        let defects: Vec<&str> = classification
            .unfixable
            .iter()
            .map(|error| error.description.trim())
            .collect();
        format!(
            "Unfixable defects, regeneration will not help: {}.",
            defects.join("; ")
        )
    };
    DecisionResult::new(RetryAction::Skip, reason, SKIP_CONFIDENCE, None)
}

/// Classification verdict without model help.
pub fn offline_decision(classification: &Classification) -> DecisionResult {
    let reason = format!(
        "Offline decision: {} fixable and {} unfixable defect(s).",
        classification.fixable.len(),
        classification.unfixable.len()
    );
    let enhanced_prompt = match classification.decision {
        RetryAction::Retry => offline_correction(&classification.fixable),
        _ => None,
    };
    DecisionResult::new(
        classification.decision,
        reason,
        OFFLINE_CONFIDENCE,
        enhanced_prompt,
    )
}
