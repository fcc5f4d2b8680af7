mod records;
mod snapshot;

pub use records::{Character, Product, Scene, SceneGroup};
pub use snapshot::ProjectSnapshot;
