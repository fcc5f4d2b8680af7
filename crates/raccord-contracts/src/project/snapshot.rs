use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::records::{Character, Product, Scene, SceneGroup};

/// Read-only view over the project collections the continuity engine reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSnapshot {
    pub scenes: Vec<Scene>,
    pub characters: Vec<Character>,
    pub products: Vec<Product>,
    pub groups: Vec<SceneGroup>,
}

impl ProjectSnapshot {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("project file not readable ({})", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid project file ({})", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id == scene_id)
    }

    /// Scenes sorted by ordinal; ties keep their list position.
    pub fn ordered_scenes(&self) -> Vec<&Scene> {
        let mut rows: Vec<&Scene> = self.scenes.iter().collect();
        rows.sort_by_key(|scene| scene.order);
        rows
    }

    pub fn predecessor(&self, scene_id: &str) -> Option<&Scene> {
        let ordered = self.ordered_scenes();
        let position = ordered.iter().position(|scene| scene.id == scene_id)?;
        position.checked_sub(1).map(|idx| ordered[idx])
    }

    pub fn group(&self, group_id: &str) -> Option<&SceneGroup> {
        self.groups.iter().find(|group| group.id == group_id)
    }

    pub fn character(&self, character_id: &str) -> Option<&Character> {
        self.characters
            .iter()
            .find(|character| character.id == character_id)
    }

    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.id == product_id)
    }

    pub fn group_name(&self, group_id: &str) -> String {
        self.group(group_id)
            .map(|group| group.name.clone())
            .unwrap_or_else(|| group_id.to_string())
    }

    pub fn character_names(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.character(id)
                    .map(|character| character.name.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    }

    pub fn product_names(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.product(id)
                    .map(|product| product.name.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    }
}
