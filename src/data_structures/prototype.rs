//! Prototype definitions loaded from object description files.
//!
//! A prototype binds a `class`/`subclass` pair to a set of texture slots and
//! a block of default properties. Files look like
//!
//! ```json
//! { "objects": [
//!     { "obj_class": "tile", "obj_subclass": "grass",
//!       "textures": { "default": "tiles/grass.png", "dry": "tiles/dry.png" },
//!       "properties": { "vx": 0.0 } }
//! ] }
//! ```
//!
//! `textures` may also be a single path string. Engine-managed keys in the
//! property block are dropped when the prototype enters the table.

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::data_structures::entity::DEFAULT_TEXREF;

/// Property keys owned by the engine that prototypes may not set.
pub const RESERVED_KEYS: [&str; 5] = ["x", "y", "z", "texref", "invis"];

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TextureSource {
    Single(String),
    Slots(HashMap<String, String>),
}

impl Default for TextureSource {
    fn default() -> Self {
        Self::Slots(HashMap::new())
    }
}

impl TextureSource {
    /// Slot lookup: the named slot first, then `"default"`. A single path is
    /// returned for any slot.
    pub fn resolve(&self, texref: &str) -> Option<&str> {
        match self {
            TextureSource::Single(path) => Some(path.as_str()),
            TextureSource::Slots(slots) => slots
                .get(texref)
                .filter(|_| !texref.is_empty())
                .or_else(|| slots.get(DEFAULT_TEXREF))
                .map(String::as_str),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Prototype {
    #[serde(alias = "obj_class")]
    pub class: String,
    #[serde(default, alias = "obj_subclass")]
    pub subclass: String,
    #[serde(default)]
    pub textures: TextureSource,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Prototype {
    /// Remove engine-managed keys. Returns the keys that were dropped.
    fn strip_reserved(&mut self) -> Vec<&'static str> {
        RESERVED_KEYS
            .iter()
            .copied()
            .filter(|key| self.properties.remove(*key).is_some())
            .collect()
    }
}

#[derive(Deserialize)]
struct PrototypeFile {
    #[serde(default)]
    objects: Vec<Prototype>,
}

/// All known prototypes keyed by exact `(class, subclass)`.
#[derive(Clone, Debug, Default)]
pub struct PrototypeTable {
    entries: HashMap<(String, String), Prototype>,
}

impl PrototypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a prototype. Reserved property keys are stripped here,
    /// once, with a single warning per prototype.
    pub fn insert(&mut self, mut prototype: Prototype) {
        let dropped = prototype.strip_reserved();
        if !dropped.is_empty() {
            log::warn!(
                "Prototype {}:{} tried to set engine-managed fields {:?}; they were ignored",
                prototype.class,
                prototype.subclass,
                dropped
            );
        }
        self.entries.insert(
            (prototype.class.clone(), prototype.subclass.clone()),
            prototype,
        );
    }

    pub fn get(&self, class: &str, subclass: &str) -> Option<&Prototype> {
        self.entries
            .get(&(class.to_string(), subclass.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a prototype document and merge it in. Returns how many
    /// prototypes it contained.
    pub fn load_str(&mut self, json: &str) -> anyhow::Result<usize> {
        let file: PrototypeFile = serde_json::from_str(json)?;
        let count = file.objects.len();
        file.objects.into_iter().for_each(|p| self.insert(p));
        Ok(count)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading prototype file {}", path.display()))?;
        self.load_str(&json)
            .with_context(|| format!("parsing prototype file {}", path.display()))
    }

    /// Load every file, skipping the ones that fail with a warning.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> usize {
        paths
            .iter()
            .filter_map(|path| match self.load_file(path) {
                Ok(count) => Some(count),
                Err(e) => {
                    log::warn!("Skipping prototype file: {:#}", e);
                    None
                }
            })
            .sum()
    }
}
