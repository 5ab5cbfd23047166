//! Engine configuration.
//!
//! The configuration is a flat JSON object. Every key is optional; missing
//! keys take the defaults below, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!     "window_title": "town",
//!     "virt_sx": 840,
//!     "virt_sy": 480,
//!     "tile_width": 64,
//!     "tile_height": 64,
//!     "object_files": ["objects/core.json", "objects/town.json"],
//!     "sprite_classes": ["house", "tree"]
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{atlas::DEFAULT_ATLAS_SIZE, prototype::PrototypeTable},
    layers::gui::DEFAULT_FONT_SIZE,
    render::Screen,
    resources::asset_path,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window_title: String,
    /// Virtual screen width in pixels. Everything is laid out against it.
    pub virt_sx: u32,
    pub virt_sy: u32,
    pub fullscreen: bool,
    pub tile_width: f32,
    pub tile_height: f32,
    /// Edge length of each layer's square atlas.
    pub atlas_size: u32,
    pub asset_root: PathBuf,
    pub scene_folder: PathBuf,
    /// Prototype files, relative to `asset_root`.
    pub object_files: Vec<String>,
    /// Font file relative to `asset_root`. Empty picks whatever the
    /// rasterizer treats as its default.
    pub font: String,
    pub font_size: u32,
    /// Extra classes that instantiate as plain sprites.
    pub sprite_classes: Vec<String>,
    pub clear_colour: [f64; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_title: "iso-ngin".to_string(),
            virt_sx: 840,
            virt_sy: 480,
            fullscreen: false,
            tile_width: 64.0,
            tile_height: 64.0,
            atlas_size: DEFAULT_ATLAS_SIZE,
            asset_root: PathBuf::from("assets"),
            scene_folder: PathBuf::from("assets/scenes"),
            object_files: Vec::new(),
            font: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            sprite_classes: Vec::new(),
            clear_colour: [0.1, 0.1, 0.12, 1.0],
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        anyhow::ensure!(
            config.virt_sx > 0 && config.virt_sy > 0,
            "virtual screen must not be empty, got {}x{}",
            config.virt_sx,
            config.virt_sy
        );
        anyhow::ensure!(config.atlas_size > 0, "atlas_size must be positive");
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Like [`from_file`](Self::from_file) but never fails: problems are
    /// logged and the defaults are used instead.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default engine config: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn screen(&self) -> Screen {
        Screen::new(self.virt_sx as f32, self.virt_sy as f32)
    }

    /// Load every prototype file listed in `object_files`. Files that cannot
    /// be read are skipped with a warning.
    pub fn load_prototypes(&self) -> PrototypeTable {
        let paths: Vec<PathBuf> = self
            .object_files
            .iter()
            .map(|file| asset_path(&self.asset_root, file))
            .collect();
        let mut table = PrototypeTable::new();
        let loaded = table.load_files(&paths);
        log::info!(
            "Loaded {} prototypes from {} object files",
            loaded,
            paths.len()
        );
        table
    }
}
