use raccord_contracts::insights::{InsightType, RaccordInsight, Severity};
use raccord_contracts::project::{ProjectSnapshot, Scene};
use raccord_contracts::vocabulary::{TermMatcher, TokenMatcher, Vocabulary};

/// Metadata-only continuity heuristics between a shot and its predecessor.
pub struct RaccordAnalyzer<'a> {
    project: &'a ProjectSnapshot,
    vocabulary: &'a Vocabulary,
    matcher: &'a dyn TermMatcher,
}

impl<'a> RaccordAnalyzer<'a> {
    pub fn new(project: &'a ProjectSnapshot, vocabulary: &'a Vocabulary) -> Self {
        Self {
            project,
            vocabulary,
            matcher: &TokenMatcher,
        }
    }

    pub fn with_matcher(mut self, matcher: &'a dyn TermMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Insights for `scene_id`, in rule order. Unknown and first-in-sequence
    /// scenes have none.
    pub fn analyze(&self, scene_id: &str) -> Vec<RaccordInsight> {
        let Some(current) = self.project.scene(scene_id) else {
            return Vec::new();
        };
        let Some(previous) = self.project.predecessor(scene_id) else {
            return Vec::new();
        };

        let mut insights = vec![self.location(previous, current)];
        insights.extend(self.disappeared_props(previous, current));
        insights.extend(self.prop_jump(previous, current));
        insights.extend(self.departed_characters(previous, current));
        insights.extend(self.state_transition(previous, current));
        insights
    }

    fn location(&self, previous: &Scene, current: &Scene) -> RaccordInsight {
        if previous.group_id == current.group_id {
            let name = self.project.group_name(&current.group_id);
            return RaccordInsight::new(
                InsightType::Environment,
                Severity::Info,
                format!("Same location as the previous shot ({name}): keep the background fixed."),
            )
            .with_suggestion("Reuse the previous shot as the background reference.");
        }
        let from = self.project.group_name(&previous.group_id);
        let to = self.project.group_name(&current.group_id);
        RaccordInsight::new(
            InsightType::Environment,
            Severity::Info,
            format!("Location transition: {from} -> {to}."),
        )
        .with_suggestion(format!(
            "Establish {to} clearly so the change of set reads as intentional."
        ))
    }

    fn disappeared_props(&self, previous: &Scene, current: &Scene) -> Option<RaccordInsight> {
        let removed: Vec<String> = previous
            .product_ids
            .iter()
            .filter(|id| !current.has_product(id))
            .cloned()
            .collect();
        if removed.is_empty() {
            return None;
        }
        let names = self.project.product_names(&removed).join(", ");
        Some(
            RaccordInsight::new(
                InsightType::Prop,
                Severity::Warning,
                format!("Disappearing prop: {names} was in the previous shot but is missing here."),
            )
            .with_suggestion(format!(
                "If {names} is still held or in view, add it back to this scene."
            ))
            .with_affected_ids(removed),
        )
    }

    fn prop_jump(&self, previous: &Scene, current: &Scene) -> Option<RaccordInsight> {
        let added: Vec<String> = current
            .product_ids
            .iter()
            .filter(|id| !previous.has_product(id))
            .cloned()
            .collect();
        if added.is_empty() {
            return None;
        }
        if self
            .vocabulary
            .pickup_verb(self.matcher, &previous.context_description)
            .is_some()
        {
            return None;
        }
        let names = self.project.product_names(&added).join(", ");
        Some(
            RaccordInsight::new(
                InsightType::Prop,
                Severity::Critical,
                format!(
                    "Prop jump: {names} appears in hand without being picked up in the previous shot."
                ),
            )
            .with_suggestion(format!(
                "Show {names} being picked up in the previous shot, or introduce it on screen here."
            ))
            .with_affected_ids(added),
        )
    }

    fn departed_characters(&self, previous: &Scene, current: &Scene) -> Option<RaccordInsight> {
        let departed: Vec<String> = previous
            .character_ids
            .iter()
            .filter(|id| !current.has_character(id))
            .cloned()
            .collect();
        if departed.is_empty() {
            return None;
        }
        let names = self.project.character_names(&departed).join(", ");
        Some(
            RaccordInsight::new(
                InsightType::Character,
                Severity::Info,
                format!("{names} left the frame since the previous shot."),
            )
            .with_affected_ids(departed),
        )
    }

    fn state_transition(&self, previous: &Scene, current: &Scene) -> Option<RaccordInsight> {
        let before = self
            .vocabulary
            .body_state(self.matcher, &previous.context_description)?;
        let after = self
            .vocabulary
            .body_state(self.matcher, &current.context_description)?;
        if before == after {
            return None;
        }
        Some(
            RaccordInsight::new(
                InsightType::Flow,
                Severity::Info,
                format!("Physical state changes from {before} to {after} between shots."),
            )
            .with_suggestion(format!(
                "Describe the transition from {before} to {after} explicitly in this scene."
            )),
        )
    }
}
