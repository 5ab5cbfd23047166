//! Engine data structures: entities, their classes and the images they draw.
//!
//! - `entity` is a single scene node and its placement
//! - `behaviour` holds the per-class runtime behaviours and their lookup table
//! - `prototype` holds the per-class defaults and texture slots read from JSON
//! - `scene_graph` is the registry owning every entity
//! - `bitmap` is a decoded RGBA image
//! - `atlas` packs bitmaps into one texture per layer
//! - `texture` wraps the GPU side of an atlas (feature `window`)

pub mod atlas;
pub mod behaviour;
pub mod bitmap;
pub mod entity;
pub mod prototype;
pub mod scene_graph;
#[cfg(feature = "window")]
pub mod texture;
