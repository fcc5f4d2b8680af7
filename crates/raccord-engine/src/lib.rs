pub mod advisor;
pub mod analyzer;
pub mod classifier;
pub mod images;
pub mod prompts;
pub mod retry;
pub mod validator;
pub mod vision;

#[cfg(test)]
mod testing;

use raccord_contracts::defects::{Classification, DecisionResult, DopError, ValidationResult};
use raccord_contracts::events::{emit_best_effort, EventLog};
use raccord_contracts::insights::RaccordInsight;
use raccord_contracts::project::ProjectSnapshot;
use raccord_contracts::shots::ShotSuggestion;
use raccord_contracts::vocabulary::Vocabulary;
use rand::Rng;
use serde_json::{json, Map, Value};

pub use advisor::NextShotAdvisor;
pub use analyzer::RaccordAnalyzer;
pub use classifier::{classify, ErrorClassifier};
pub use images::{ImageNormalizer, ImageSource, NormalizedImage};
pub use retry::RetryDecisionAgent;
pub use validator::{ContinuityValidator, ShotPair};
pub use vision::{Credentials, HttpVisionClient, Provider, VisionClient};

/// One project's continuity checks behind a single handle: metadata
/// analysis, shot advice, vision validation and retry decisions.
pub struct ContinuityEngine {
    project: ProjectSnapshot,
    vocabulary: Vocabulary,
    client: Box<dyn VisionClient>,
    credentials: Option<Credentials>,
    normalizer: ImageNormalizer,
    events: Option<EventLog>,
    vision_model: Option<String>,
    decision_model: Option<String>,
}

impl ContinuityEngine {
    /// Engine with the HTTP vision client and credentials from the
    /// environment.
    pub fn new(project: ProjectSnapshot) -> Self {
        Self {
            project,
            vocabulary: Vocabulary::default(),
            client: Box::new(HttpVisionClient::new()),
            credentials: Credentials::from_env(),
            normalizer: ImageNormalizer::default(),
            events: None,
            vision_model: None,
            decision_model: None,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_client(mut self, client: Box<dyn VisionClient>) -> Self {
        self.client = client;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_events(mut self, events: Option<EventLog>) -> Self {
        self.events = events;
        self
    }

    pub fn with_vision_model(mut self, model: Option<String>) -> Self {
        self.vision_model = model;
        self
    }

    pub fn with_decision_model(mut self, model: Option<String>) -> Self {
        self.decision_model = model;
        self
    }

    pub fn project(&self) -> &ProjectSnapshot {
        &self.project
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn events(&self) -> Option<&EventLog> {
        self.events.as_ref()
    }

    pub fn analyze(&self, scene_id: &str) -> Vec<RaccordInsight> {
        let insights = RaccordAnalyzer::new(&self.project, &self.vocabulary).analyze(scene_id);
        emit_best_effort(
            self.events.as_ref(),
            "raccord_analyzed",
            Some(scene_id),
            map_object(json!({
                "previous_scene_id": self.project.predecessor(scene_id).map(|scene| scene.id.clone()),
                "insight_count": insights.len(),
                "insights": insights,
            })),
        );
        insights
    }

    pub fn suggest(&self, last_scene_id: &str) -> Option<ShotSuggestion> {
        NextShotAdvisor::new(&self.project).suggest(last_scene_id)
    }

    pub fn suggest_with<R: Rng>(&self, last_scene_id: &str, rng: &mut R) -> Option<ShotSuggestion> {
        NextShotAdvisor::new(&self.project).suggest_with(last_scene_id, rng)
    }

    pub fn classify(&self, errors: &[DopError]) -> Classification {
        ErrorClassifier::new(&self.vocabulary).classify(errors)
    }

    pub fn validate(&self, pair: &ShotPair) -> ValidationResult {
        ContinuityValidator::new(self.client.as_ref())
            .with_normalizer(self.normalizer.clone())
            .with_model(self.vision_model.clone())
            .with_events(self.events.as_ref())
            .validate(&self.project, pair, self.credentials.as_ref())
    }

    /// Validates `scene_id` against its predecessor using both scenes'
    /// generated images. First-in-sequence and unknown scenes pass.
    pub fn validate_scene(&self, scene_id: &str) -> ValidationResult {
        match ShotPair::from_project(&self.project, scene_id) {
            Some(pair) => self.validate(&pair),
            None => ValidationResult::passed(),
        }
    }

    pub fn decide(
        &self,
        failed_image: Option<&ImageSource>,
        reference_image: Option<&ImageSource>,
        original_prompt: &str,
        errors: &[DopError],
    ) -> DecisionResult {
        RetryDecisionAgent::new(self.client.as_ref(), &self.vocabulary)
            .with_normalizer(self.normalizer.clone())
            .with_model(self.decision_model.clone())
            .with_events(self.events.as_ref())
            .decide(
                failed_image,
                reference_image,
                original_prompt,
                errors,
                self.credentials.as_ref(),
            )
    }

    /// Retry decision for `scene_id`, with its predecessor's render as the
    /// continuity reference.
    pub fn decide_for_scene(
        &self,
        scene_id: &str,
        original_prompt: &str,
        errors: &[DopError],
    ) -> DecisionResult {
        let pair = ShotPair::from_project(&self.project, scene_id);
        let failed = pair.as_ref().and_then(|pair| pair.current_image.as_ref());
        let reference = pair.as_ref().and_then(|pair| pair.previous_image.as_ref());
        RetryDecisionAgent::new(self.client.as_ref(), &self.vocabulary)
            .with_normalizer(self.normalizer.clone())
            .with_model(self.decision_model.clone())
            .with_events(self.events.as_ref())
            .for_scene(scene_id)
            .decide(
                failed,
                reference,
                original_prompt,
                errors,
                self.credentials.as_ref(),
            )
    }
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use raccord_contracts::defects::{DopError, RetryAction};
    use raccord_contracts::events::EventLog;
    use raccord_contracts::insights::{InsightType, Severity};
    use raccord_contracts::project::{Product, ProjectSnapshot, Scene};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::Value;

    use super::{ContinuityEngine, Credentials};
    use crate::testing::RecordingClient;

    fn knife_project() -> ProjectSnapshot {
        let mut s1 = Scene::new("s1", 1, "deck");
        s1.product_ids = vec!["knife-id".to_string()];
        s1.camera_angle = "establishing".to_string();
        let mut s2 = Scene::new("s2", 2, "deck");
        s2.context_description = "she drops the knife on the table".to_string();
        ProjectSnapshot {
            scenes: vec![s1, s2],
            products: vec![Product {
                id: "knife-id".to_string(),
                name: "knife".to_string(),
            }],
            ..ProjectSnapshot::default()
        }
    }

    fn offline_engine(project: ProjectSnapshot) -> ContinuityEngine {
        ContinuityEngine::new(project)
            .with_client(Box::new(RecordingClient::failing("offline")))
            .with_credentials(None)
    }

    #[test]
    fn analyze_logs_insights() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = EventLog::new(temp.path().join("events.jsonl"), "session");
        let engine = offline_engine(knife_project()).with_events(Some(events.clone()));

        let insights = engine.analyze("s2");
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].kind, InsightType::Environment);
        assert_eq!(insights[1].kind, InsightType::Prop);
        assert_eq!(insights[1].severity, Severity::Warning);
        assert!(insights[1].message.contains("knife"));

        let line = fs::read_to_string(events.path())?;
        let event: Value = serde_json::from_str(line.trim())?;
        assert_eq!(event["type"], "raccord_analyzed");
        assert_eq!(event["scene_id"], "s2");
        assert_eq!(event["previous_scene_id"], "s1");
        assert_eq!(event["insight_count"], 2);
        assert_eq!(event["insights"][1]["affectedIds"][0], "knife-id");
        Ok(())
    }

    #[test]
    fn suggest_follows_wide_shot_rule() {
        let engine = offline_engine(knife_project());
        let suggestion = engine
            .suggest_with("s1", &mut StdRng::seed_from_u64(5))
            .expect("suggestion");
        assert!(matches!(
            suggestion.kind,
            raccord_contracts::shots::ShotKind::CloseUp | raccord_contracts::shots::ShotKind::Pov
        ));
        assert!(engine.suggest("missing").is_none());
    }

    #[test]
    fn validate_scene_without_credentials_passes() {
        let engine = offline_engine(knife_project());
        assert!(engine.validate_scene("s2").is_valid);
        assert!(engine.validate_scene("s1").is_valid);
    }

    #[test]
    fn decide_for_scene_without_images_stays_offline() {
        let engine = offline_engine(knife_project())
            .with_credentials(Some(Credentials::openai("sk-test")));
        let decision =
            engine.decide_for_scene("s2", "A sailor", &[DopError::new("prop", "knife missing")]);
        assert_eq!(decision.action(), RetryAction::Retry);
        assert_eq!(decision.confidence(), 0.7);
    }

    #[test]
    fn classify_uses_engine_vocabulary() {
        let engine = offline_engine(knife_project())
            .with_vocabulary(raccord_contracts::vocabulary::Vocabulary::english());
        let result = engine.classify(&[DopError::new("character", "visage méconnaissable")]);
        assert_eq!(result.decision, RetryAction::Retry);
    }
}
