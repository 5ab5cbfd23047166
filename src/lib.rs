//! iso-ngin
//!
//! The runtime core of a small 2D isometric game engine. Entities live in a
//! scene graph registry, get their textures packed into per-layer atlases and
//! are drawn back to front by an isometric world layer with a screen-space GUI
//! layer on top. Scenes are plain text files that can be loaded, unloaded and
//! saved at runtime.
//!
//! High-level modules
//! - `config`: engine settings read from JSON
//! - `data_structures`: entities, prototypes, behaviours, the registry and atlases
//! - `engine`: ties registry, scenes and layers into one update/render loop
//! - `layers`: the isometric world layer and the GUI layer
//! - `render`: the layer stack and the backend-facing `Gpu` trait
//! - `resources`: image decoding and glyph rasterization from the asset folder
//! - `scene`: scene file parsing, loading and saving
//! - `context`, `flow`, `pipelines`: the wgpu/winit backend (feature `window`)
//!

pub mod config;
pub mod data_structures;
pub mod engine;
pub mod layers;
pub mod render;
pub mod resources;
pub mod scene;

#[cfg(feature = "window")]
pub mod context;
#[cfg(feature = "window")]
pub mod flow;
#[cfg(feature = "window")]
pub mod pipelines;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use config::EngineConfig;
pub use engine::Engine;
#[cfg(feature = "window")]
pub use winit::event::WindowEvent;
