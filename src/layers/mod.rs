//! Built-in render layers.
//!
//! - `iso`: the world layer with the isometric projector and culler
//! - `gui`: the screen-space image and text layer

pub mod gui;
pub mod iso;

pub use gui::{GuiLayer, TextEntry};
pub use iso::{IsoProjector, IsometricLayer};
