use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotKind {
    CloseUp,
    WideShot,
    Pov,
    OverTheShoulder,
    Reaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShotSuggestion {
    pub kind: ShotKind,
    pub title: String,
    pub action: String,
    pub recommendation: String,
}

impl ShotKind {
    pub const ALL: [ShotKind; 5] = [
        ShotKind::CloseUp,
        ShotKind::WideShot,
        ShotKind::Pov,
        ShotKind::OverTheShoulder,
        ShotKind::Reaction,
    ];

    pub fn suggestion(self) -> ShotSuggestion {
        let (title, action, recommendation) = match self {
            Self::CloseUp => (
                "Close-up",
                "Move in on the main character's face",
                "After a wide frame, a close-up anchors the emotion of the beat.",
            ),
            Self::WideShot => (
                "Wide shot",
                "Pull back to show the whole set",
                "Re-establish the geography so the viewer keeps their bearings.",
            ),
            Self::Pov => (
                "POV shot",
                "Show what the character sees",
                "Let the audience discover the prop or detail through the character's eyes.",
            ),
            Self::OverTheShoulder => (
                "Over-the-shoulder",
                "Frame past one character toward another",
                "Stage the exchange between characters while keeping both in play.",
            ),
            Self::Reaction => (
                "Reaction shot",
                "Cut to a character reacting",
                "Give the previous beat its payoff with a reaction.",
            ),
        };
        ShotSuggestion {
            kind: self,
            title: title.to_string(),
            action: action.to_string(),
            recommendation: recommendation.to_string(),
        }
    }
}

/// Known camera angle ids and the framing they stand for.
const CAMERA_ANGLES: &[(&str, &str)] = &[
    ("establishing", "extreme wide shot"),
    ("ews", "extreme wide shot"),
    ("extreme_wide", "extreme wide shot"),
    ("ws", "wide shot"),
    ("wide", "wide shot"),
    ("long_shot", "wide shot"),
    ("full", "full shot"),
    ("ms", "medium shot"),
    ("medium", "medium shot"),
    ("cu", "close-up"),
    ("close_up", "close-up"),
    ("ecu", "extreme close-up"),
    ("ots", "over-the-shoulder"),
    ("pov", "point of view"),
    ("plan_large", "wide shot"),
    ("plan_d_ensemble", "wide shot"),
    ("plan_moyen", "medium shot"),
    ("gros_plan", "close-up"),
    ("tres_gros_plan", "extreme close-up"),
];

/// Resolves an angle id to its framing label; free text is kept lowercased.
pub fn resolve_camera_angle(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let key: String = lowered
        .chars()
        .map(|ch| if ch == ' ' || ch == '-' || ch == '\'' { '_' } else { ch })
        .collect();
    CAMERA_ANGLES
        .iter()
        .find(|(id, _)| *id == key)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or(lowered)
}
