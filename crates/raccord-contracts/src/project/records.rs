use serde::{Deserialize, Serialize};

/// One shot of the storyboard as the project store hands it over.
///
/// Scenes are only ever mutated by generation/retry in the pipeline; the
/// continuity engine treats them as read-only snapshots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scene {
    pub id: String,
    pub order: i64,
    pub group_id: String,
    pub character_ids: Vec<String>,
    pub product_ids: Vec<String>,
    pub context_description: String,
    pub camera_angle: String,
    pub generated_image: Option<String>,
    pub error: Option<String>,
}

impl Scene {
    pub fn new(id: impl Into<String>, order: i64, group_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order,
            group_id: group_id.into(),
            ..Self::default()
        }
    }

    pub fn has_product(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|id| id == product_id)
    }

    pub fn has_character(&self, character_id: &str) -> bool {
        self.character_ids.iter().any(|id| id == character_id)
    }

    pub fn generated_image(&self) -> Option<&str> {
        self.generated_image
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
}

/// A shared location; scenes in the same group should share a background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneGroup {
    pub id: String,
    pub name: String,
}
