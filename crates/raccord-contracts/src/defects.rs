use std::fmt;

use serde::{Deserialize, Serialize};

/// A continuity defect, either reported by the vision model or supplied by
/// the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DopError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    pub description: String,
}

impl DopError {
    pub fn new(error_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryAction {
    Retry,
    Skip,
    TryOnce,
}

impl RetryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Skip => "skip",
            Self::TryOnce => "try_once",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "retry" => Some(Self::Retry),
            "skip" => Some(Self::Skip),
            "try_once" => Some(Self::TryOnce),
            _ => None,
        }
    }
}

impl fmt::Display for RetryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub fixable: Vec<DopError>,
    pub unfixable: Vec<DopError>,
    pub decision: RetryAction,
}

/// Final retry verdict handed back to the generation pipeline.
///
/// Fields are private so the two wire invariants always hold:
/// `confidence` lies in `[0, 1]` and `enhancedPrompt` only accompanies
/// `retry`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResult {
    action: RetryAction,
    reason: String,
    confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    enhanced_prompt: Option<String>,
}

impl DecisionResult {
    pub fn new(
        action: RetryAction,
        reason: impl Into<String>,
        confidence: f64,
        enhanced_prompt: Option<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        let enhanced_prompt = enhanced_prompt
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty() && action == RetryAction::Retry);
        Self {
            action,
            reason: reason.into(),
            confidence,
            enhanced_prompt,
        }
    }

    pub fn action(&self) -> RetryAction {
        self.action
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn enhanced_prompt(&self) -> Option<&str> {
        self.enhanced_prompt.as_deref()
    }

    /// Prompt for the next generation attempt: the original prompt with the
    /// correction addendum appended when one is present.
    pub fn apply_to_prompt(&self, original_prompt: &str) -> String {
        let base = original_prompt.trim();
        match self.enhanced_prompt() {
            Some(addendum) if base.is_empty() => addendum.to_string(),
            Some(addendum) => format!("{base}\n\n{addendum}"),
            None => base.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<DopError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction_prompt: Option<String>,
}

impl ValidationResult {
    /// The fail-open verdict: nothing detected.
    pub fn passed() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            correction_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DecisionResult, DopError, RetryAction, ValidationResult};

    #[test]
    fn decision_drops_prompt_unless_retry() {
        for action in [RetryAction::Skip, RetryAction::TryOnce] {
            let result = DecisionResult::new(action, "r", 0.5, Some("keep the hat".to_string()));
            assert!(result.enhanced_prompt().is_none());
        }
        let result = DecisionResult::new(
            RetryAction::Retry,
            "r",
            0.5,
            Some("keep the hat".to_string()),
        );
        assert_eq!(result.enhanced_prompt(), Some("keep the hat"));

        let blank = DecisionResult::new(RetryAction::Retry, "r", 0.5, Some("  ".to_string()));
        assert!(blank.enhanced_prompt().is_none());
    }

    #[test]
    fn decision_clamps_confidence() {
        assert_eq!(
            DecisionResult::new(RetryAction::Skip, "r", 1.7, None).confidence(),
            1.0
        );
        assert_eq!(
            DecisionResult::new(RetryAction::Skip, "r", -0.2, None).confidence(),
            0.0
        );
        assert_eq!(
            DecisionResult::new(RetryAction::Skip, "r", f64::NAN, None).confidence(),
            0.0
        );
    }

    #[test]
    fn decision_serializes_with_wire_names() -> anyhow::Result<()> {
        let result = DecisionResult::new(
            RetryAction::TryOnce,
            "mixed defects",
            0.7,
            Some("ignored".to_string()),
        );
        assert_eq!(
            serde_json::to_value(&result)?,
            json!({"action": "try_once", "reason": "mixed defects", "confidence": 0.7})
        );
        Ok(())
    }

    #[test]
    fn apply_to_prompt_appends_addendum() {
        let retry = DecisionResult::new(
            RetryAction::Retry,
            "r",
            0.8,
            Some("Keep the red scarf.".to_string()),
        );
        assert_eq!(
            retry.apply_to_prompt("A sailor on deck "),
            "A sailor on deck\n\nKeep the red scarf."
        );
        assert_eq!(retry.apply_to_prompt(""), "Keep the red scarf.");

        let skip = DecisionResult::new(RetryAction::Skip, "r", 0.9, None);
        assert_eq!(skip.apply_to_prompt("A sailor"), "A sailor");
    }

    #[test]
    fn retry_action_parses_loose_spellings() {
        assert_eq!(RetryAction::parse(" Try-Once "), Some(RetryAction::TryOnce));
        assert_eq!(RetryAction::parse("RETRY"), Some(RetryAction::Retry));
        assert_eq!(RetryAction::parse("abandon"), None);
    }

    #[test]
    fn dop_error_reads_type_field() -> anyhow::Result<()> {
        let error: DopError =
            serde_json::from_value(json!({"type": "prop", "description": "missing hat"}))?;
        assert_eq!(error, DopError::new("prop", "missing hat"));
        let untyped: DopError = serde_json::from_value(json!({"description": "odd"}))?;
        assert_eq!(untyped.error_type, "");
        Ok(())
    }

    #[test]
    fn passed_validation_is_empty() {
        let passed = ValidationResult::passed();
        assert!(passed.is_valid);
        assert!(passed.errors.is_empty());
        assert!(passed.correction_prompt.is_none());
    }
}
