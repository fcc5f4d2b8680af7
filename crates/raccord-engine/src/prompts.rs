use raccord_contracts::defects::DopError;
use raccord_contracts::project::{ProjectSnapshot, Scene};

pub const VALIDATION_INSTRUCTION: &str = "You are a director of photography checking continuity (raccord) \
between two consecutive shots of the same film. The first image is the previous shot, the second \
image is the current shot. Compare them against the context above and report only visible \
continuity breaks: props that appear, vanish or jump between hands (type \"prop\"), characters whose \
identity, face, costume or hair changed (type \"character\"), light direction, color temperature or \
time of day that drifted without a story reason (type \"lighting\"), and inconsistent positions or \
screen direction (type \"spatial\"). Intentional changes described in the context are not errors.\n\
Reply with strict JSON only, no prose, no markdown:\n\
{\"isValid\": true|false, \"errors\": [{\"type\": \"prop\"|\"character\"|\"lighting\"|\"spatial\", \
\"description\": \"...\"}], \"correctionPrompt\": \"optional prompt addendum that would fix the \
current shot\"}\n\
Use an empty errors list and isValid true when continuity holds.";

pub const RETRY_INSTRUCTION: &str = "You decide whether an image generation that failed its \
continuity check should be regenerated. The first image is the failed generation, the second image \
is the continuity reference. Regenerating with a better prompt can fix props, lighting and \
positions; it rarely fixes a character whose identity or face drifted.\n\
Choose one action: \"retry\" (regenerate with an improved prompt), \"try_once\" (one last attempt, \
then accept) or \"skip\" (keep the current image).\n\
Reply with strict JSON only, no prose, no markdown:\n\
{\"action\": \"retry\"|\"try_once\"|\"skip\", \"reason\": \"...\", \"confidence\": 0.0-1.0, \
\"enhancedPrompt\": \"text appended to the original prompt, only when action is retry\"}";

/// Textual context for a shot pair: descriptions, rosters and whether the
/// two shots share a location.
pub fn shot_pair_context(project: &ProjectSnapshot, previous: &Scene, current: &Scene) -> String {
    let same_location = previous.group_id == current.group_id;
    let mut lines = vec![
        format!(
            "Same location: {}",
            if same_location { "yes" } else { "no" }
        ),
        String::new(),
    ];
    lines.extend(scene_block(project, "Previous shot", previous));
    lines.push(String::new());
    lines.extend(scene_block(project, "Current shot", current));
    if same_location {
        lines.push(String::new());
        lines.push(
            "Both shots share a location: background, set dressing and lighting must match."
                .to_string(),
        );
    }
    lines.join("\n")
}

fn scene_block(project: &ProjectSnapshot, label: &str, scene: &Scene) -> Vec<String> {
    vec![
        format!("{label} ({}):", scene.id),
        format!("- location: {}", project.group_name(&scene.group_id)),
        format!("- description: {}", or_none(scene.context_description.trim())),
        format!("- camera: {}", or_none(scene.camera_angle.trim())),
        format!(
            "- characters: {}",
            roster(project.character_names(&scene.character_ids))
        ),
        format!("- props: {}", roster(project.product_names(&scene.product_ids))),
    ]
}

/// Prompt text for the retry decision: original prompt and itemized defects.
pub fn retry_context(original_prompt: &str, errors: &[DopError]) -> String {
    let mut lines = vec![
        "Original prompt:".to_string(),
        or_none(original_prompt.trim()).to_string(),
        String::new(),
        "Continuity errors:".to_string(),
    ];
    if errors.is_empty() {
        lines.push("- (none)".to_string());
    }
    for (index, error) in errors.iter().enumerate() {
        let kind = error.error_type.trim();
        lines.push(format!(
            "{}. [{}] {}",
            index + 1,
            if kind.is_empty() { "unknown" } else { kind },
            error.description.trim()
        ));
    }
    lines.join("\n")
}

/// Offline prompt addendum built from fixable defect descriptions.
pub fn offline_correction(fixable: &[DopError]) -> Option<String> {
    let items: Vec<String> = fixable
        .iter()
        .map(|error| error.description.trim())
        .filter(|description| !description.is_empty())
        .map(|description| format!("- {description}"))
        .collect();
    if items.is_empty() {
        return None;
    }
    Some(format!(
        "Keep continuity with the previous shot. Correct the following:\n{}",
        items.join("\n")
    ))
}

fn roster(names: Vec<String>) -> String {
    if names.is_empty() {
        return "none".to_string();
    }
    names.join(", ")
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}
