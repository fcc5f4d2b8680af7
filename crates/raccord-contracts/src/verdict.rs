//! Strict parsing of model replies.
//!
//! Models are asked for JSON but routinely wrap it in prose or code fences.
//! The first balanced top-level object is cut out with a bracket-depth scan
//! and validated against a fixed schema; anything else is an error the
//! caller turns into its fail-open default.

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

use crate::defects::{DecisionResult, DopError, RetryAction, ValidationResult};

/// Error types the vision verdict may report.
pub const VISION_ERROR_TYPES: &[&str] = &["prop", "character", "lighting", "spatial"];

const DEFAULT_ESCALATION_CONFIDENCE: f64 = 0.5;

/// Returns the first balanced `{...}` span in `text`.
///
/// Braces inside JSON strings are ignored. An object that never closes
/// yields `None`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionVerdictWire {
    #[serde(alias = "is_valid")]
    is_valid: bool,
    #[serde(default)]
    errors: Vec<VisionErrorWire>,
    #[serde(default, alias = "correction_prompt")]
    correction_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VisionErrorWire {
    #[serde(rename = "type")]
    error_type: String,
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetryVerdictWire {
    action: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "enhanced_prompt")]
    enhanced_prompt: Option<String>,
}

fn object_from_reply(text: &str) -> anyhow::Result<&str> {
    extract_json_object(text).ok_or_else(|| anyhow!("model reply contains no JSON object"))
}

/// Parses a continuity verdict. A verdict claiming validity while listing
/// errors is read as invalid.
pub fn parse_vision_verdict(text: &str) -> anyhow::Result<ValidationResult> {
    let raw = object_from_reply(text)?;
    let wire: VisionVerdictWire =
        serde_json::from_str(raw).context("vision verdict does not match schema")?;
    let mut errors = Vec::with_capacity(wire.errors.len());
    for row in wire.errors {
        let error_type = row.error_type.trim().to_ascii_lowercase();
        if !VISION_ERROR_TYPES.contains(&error_type.as_str()) {
            bail!("vision verdict has unknown error type '{}'", row.error_type);
        }
        let description = row.description.trim();
        if description.is_empty() {
            bail!("vision verdict has an error without description");
        }
        errors.push(DopError::new(error_type, description));
    }
    Ok(ValidationResult {
        is_valid: wire.is_valid && errors.is_empty(),
        errors,
        correction_prompt: wire
            .correction_prompt
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
    })
}

/// Parses an escalated retry decision. Missing `reason` and `confidence`
/// get defaults; an unknown action is an error.
pub fn parse_retry_verdict(text: &str) -> anyhow::Result<DecisionResult> {
    let raw = object_from_reply(text)?;
    let wire: RetryVerdictWire =
        serde_json::from_str(raw).context("retry verdict does not match schema")?;
    let action = RetryAction::parse(&wire.action)
        .ok_or_else(|| anyhow!("retry verdict has unknown action '{}'", wire.action))?;
    let reason = wire
        .reason
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| format!("Model recommended {action}."));
    Ok(DecisionResult::new(
        action,
        reason,
        wire.confidence.unwrap_or(DEFAULT_ESCALATION_CONFIDENCE),
        wire.enhanced_prompt,
    ))
}
