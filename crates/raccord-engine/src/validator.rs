use std::time::Duration;

use anyhow::{Context, Result};
use raccord_contracts::defects::ValidationResult;
use raccord_contracts::events::{emit_best_effort, EventLog};
use raccord_contracts::project::ProjectSnapshot;
use raccord_contracts::verdict::parse_vision_verdict;
use serde_json::json;

use crate::images::{ImageNormalizer, ImageSource, NormalizedImage};
use crate::map_object;
use crate::prompts::{shot_pair_context, VALIDATION_INSTRUCTION};
use crate::vision::{
    error_chain_text, resolve_model, Credentials, RequestPart, VisionClient, VisionReply,
    VisionRequest,
};

pub const VISION_MODEL_ENV: &str = "RACCORD_VISION_MODEL";
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(60);
const VALIDATION_MAX_OUTPUT_TOKENS: u64 = 1024;

/// Two consecutive shots to compare, by scene id, with their renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotPair {
    pub current: String,
    pub previous: String,
    pub current_image: Option<ImageSource>,
    pub previous_image: Option<ImageSource>,
}

impl ShotPair {
    pub fn new(current: impl Into<String>, previous: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            previous: previous.into(),
            current_image: None,
            previous_image: None,
        }
    }

    pub fn with_images(
        mut self,
        previous_image: Option<ImageSource>,
        current_image: Option<ImageSource>,
    ) -> Self {
        self.previous_image = previous_image;
        self.current_image = current_image;
        self
    }

    /// `scene_id` and its predecessor, with images taken from each scene's
    /// `generatedImage`.
    pub fn from_project(project: &ProjectSnapshot, scene_id: &str) -> Option<Self> {
        let current = project.scene(scene_id)?;
        let previous = project.predecessor(scene_id)?;
        Some(Self::new(&current.id, &previous.id).with_images(
            previous.generated_image().and_then(ImageSource::parse),
            current.generated_image().and_then(ImageSource::parse),
        ))
    }
}

struct VisionVerdict {
    result: ValidationResult,
    reply: VisionReply,
    previous_sha256: String,
    current_sha256: String,
}

/// Compares two rendered shots with a vision model. Never fails: every
/// problem degrades to a passing verdict and an event.
pub struct ContinuityValidator<'a> {
    client: &'a dyn VisionClient,
    normalizer: ImageNormalizer,
    model: Option<String>,
    events: Option<&'a EventLog>,
}

impl<'a> ContinuityValidator<'a> {
    pub fn new(client: &'a dyn VisionClient) -> Self {
        Self {
            client,
            normalizer: ImageNormalizer::default(),
            model: None,
            events: None,
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

    pub fn validate(
        &self,
        project: &ProjectSnapshot,
        pair: &ShotPair,
        credentials: Option<&Credentials>,
    ) -> ValidationResult {
        let Some(credentials) = credentials else {
            return self.skip(pair, "no_credentials");
        };
        let (Some(previous_image), Some(current_image)) =
            (pair.previous_image.as_ref(), pair.current_image.as_ref())
        else {
            return self.skip(pair, "missing_image");
        };

        let model = resolve_model(
            self.model.as_deref(),
            &[VISION_MODEL_ENV],
            credentials.provider.default_validation_model(),
        );
        match self.request_verdict(
            project,
            pair,
            previous_image,
            current_image,
            credentials,
            &model,
        ) {
            Ok(verdict) => {
                emit_best_effort(
                    self.events,
                    "vision_validation_completed",
                    Some(&pair.current),
                    map_object(json!({
                        "previous_scene_id": pair.previous,
                        "provider": credentials.provider.as_str(),
                        "model": verdict.reply.model,
                        "is_valid": verdict.result.is_valid,
                        "error_count": verdict.result.errors.len(),
                        "errors": verdict.result.errors,
                        "previous_image_sha256": verdict.previous_sha256,
                        "current_image_sha256": verdict.current_sha256,
                        "input_tokens": verdict.reply.input_tokens,
                        "output_tokens": verdict.reply.output_tokens,
                    })),
                );
                verdict.result
            }
            Err(err) => {
                emit_best_effort(
                    self.events,
                    "vision_validation_failed",
                    Some(&pair.current),
                    map_object(json!({
                        "previous_scene_id": pair.previous,
                        "provider": credentials.provider.as_str(),
                        "model": model,
                        "error": error_chain_text(&err, 512),
                    })),
                );
                ValidationResult::passed()
            }
        }
    }

    fn request_verdict(
        &self,
        project: &ProjectSnapshot,
        pair: &ShotPair,
        previous_image: &ImageSource,
        current_image: &ImageSource,
        credentials: &Credentials,
        model: &str,
    ) -> Result<VisionVerdict> {
        let previous = project
            .scene(&pair.previous)
            .with_context(|| format!("unknown scene {}", pair.previous))?;
        let current = project
            .scene(&pair.current)
            .with_context(|| format!("unknown scene {}", pair.current))?;
        let previous_image = self
            .normalize(previous_image)
            .context("previous shot image unavailable")?;
        let current_image = self
            .normalize(current_image)
            .context("current shot image unavailable")?;
        let previous_sha256 = previous_image.sha256_hex();
        let current_sha256 = current_image.sha256_hex();

        let request = VisionRequest {
            model: model.to_string(),
            parts: vec![
                RequestPart::Text(shot_pair_context(project, previous, current)),
                RequestPart::Text("Previous shot:".to_string()),
                RequestPart::Image(previous_image),
                RequestPart::Text("Current shot:".to_string()),
                RequestPart::Image(current_image),
                RequestPart::Text(VALIDATION_INSTRUCTION.to_string()),
            ],
            max_output_tokens: VALIDATION_MAX_OUTPUT_TOKENS,
            timeout: VALIDATION_TIMEOUT,
        };
        let reply = self.client.complete(credentials, &request)?;
        let result = parse_vision_verdict(&reply.text)?;
        Ok(VisionVerdict {
            result,
            reply,
            previous_sha256,
            current_sha256,
        })
    }

    fn normalize(&self, source: &ImageSource) -> Result<NormalizedImage> {
        self.normalizer
            .normalize(source)
            .with_context(|| format!("image normalization failed ({})", source.label()))
    }

    fn skip(&self, pair: &ShotPair, reason: &str) -> ValidationResult {
        emit_best_effort(
            self.events,
            "vision_validation_skipped",
            Some(&pair.current),
            map_object(json!({
                "previous_scene_id": pair.previous,
                "reason": reason,
            })),
        );
        ValidationResult::passed()
    }
}
