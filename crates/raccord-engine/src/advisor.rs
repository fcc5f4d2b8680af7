use raccord_contracts::project::{ProjectSnapshot, Scene};
use raccord_contracts::shots::{resolve_camera_angle, ShotKind, ShotSuggestion};
use rand::Rng;

const AFTER_WIDE: &[ShotKind] = &[ShotKind::CloseUp, ShotKind::Pov];
const WITH_PROPS: &[ShotKind] = &[ShotKind::Pov];
const FALLBACK: &[ShotKind] = &[
    ShotKind::WideShot,
    ShotKind::OverTheShoulder,
    ShotKind::Reaction,
];

/// Suggests a camera angle for the shot after `scene`. Purely advisory.
pub struct NextShotAdvisor<'a> {
    project: &'a ProjectSnapshot,
}

impl<'a> NextShotAdvisor<'a> {
    pub fn new(project: &'a ProjectSnapshot) -> Self {
        Self { project }
    }

    pub fn suggest(&self, last_scene_id: &str) -> Option<ShotSuggestion> {
        self.suggest_with(last_scene_id, &mut rand::rng())
    }

    /// Same as [`suggest`](Self::suggest) with a caller-supplied random
    /// source, so picks are reproducible under a seeded RNG.
    pub fn suggest_with<R: Rng>(
        &self,
        last_scene_id: &str,
        rng: &mut R,
    ) -> Option<ShotSuggestion> {
        let scene = self.project.scene(last_scene_id)?;
        let candidates = candidate_shots(scene);
        let kind = candidates[rng.random_range(0..candidates.len())];
        Some(kind.suggestion())
    }
}

/// Shots the advisor may pick after `scene`, by rule priority.
pub fn candidate_shots(scene: &Scene) -> &'static [ShotKind] {
    if resolve_camera_angle(&scene.camera_angle).contains("wide") {
        return AFTER_WIDE;
    }
    if !scene.product_ids.is_empty() {
        return WITH_PROPS;
    }
    FALLBACK
}
