//! Render pipelines of the wgpu backend.
//!
//! Every layer draws textured quads from its atlas, so there is a single
//! shader with two pipeline variants: one depth tested for the world and one
//! overlay variant for screen-space UI.

pub mod atlas;

pub use atlas::AtlasPipelines;
