use std::path::Path;

use anyhow::Context;
use cgmath::Vector3;
use serde::Deserialize;

use crate::data_structures::{entity::EntityId, scene_graph::Registry};

/// Class every tilemap entry is instantiated as.
pub const TILE_CLASS: &str = "tile";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TileSpec {
    #[serde(alias = "subclass")]
    pub obj_subclass: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub z: i32,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Tilemap {
    #[serde(default)]
    pub tiles: Vec<TileSpec>,
}

impl Tilemap {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading tilemap {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parsing tilemap {}", path.display()))
    }

    /// Create one `tile` entity per entry at `base` plus its grid position.
    /// Entries whose subclass cannot be instantiated are skipped.
    pub fn instantiate(&self, registry: &mut Registry, base: Vector3<f32>) -> Vec<EntityId> {
        self.tiles
            .iter()
            .filter_map(|tile| {
                let position = base + Vector3::new(tile.x as f32, tile.y as f32, tile.z as f32);
                registry.instantiate(TILE_CLASS, &tile.obj_subclass, "", position)
            })
            .collect()
    }
}
