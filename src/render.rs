//! Layered frame composition.
//!
//! A frame is drawn by a [`LayerStack`]: the backend is cleared once, every
//! [`RenderLayer`] gets a `prepare` and a `render` call in registration order,
//! and the result is presented once. Layers talk to the graphics backend only
//! through the [`Gpu`] trait, which keeps them testable without a device.
//!
//! # Key types
//!
//! - [`Vertex`] is the shared 8-float vertex (position, normal, uv)
//! - [`Gpu`] is the upload/draw/present surface a backend implements
//! - [`Frame`] bundles what a layer may read or call during one frame
//! - [`LayerStack`] owns the layers and runs them in order
//!

use std::any::Any;

use crate::{
    data_structures::{atlas::SubTexture, scene_graph::Registry},
    resources::BitmapDecoder,
};

/// Handle of a texture owned by the backend.
pub type TextureId = u32;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

    pub fn new(x: f32, y: f32, depth: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y, depth],
            normal: Self::NORMAL,
            tex_coords: [u, v],
        }
    }
}

/// What a layer needs from the graphics backend.
pub trait Gpu {
    /// Start a new frame.
    fn clear(&mut self);
    /// Upload a packed RGBA atlas. The texture samples nearest and clamps.
    fn upload_atlas(&mut self, width: u32, height: u32, rgba: &[u8]) -> anyhow::Result<TextureId>;
    fn release_texture(&mut self, texture: TextureId);
    fn set_depth_test(&mut self, enabled: bool);
    /// Draw a triangle list sampling `texture`.
    fn draw(&mut self, vertices: &[Vertex], texture: TextureId);
    /// Finish the frame.
    fn present(&mut self);
}

/// Virtual screen size in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Screen {
    pub width: f32,
    pub height: f32,
}

impl Screen {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel coordinates (origin top left, y down) to normalized device
    /// coordinates (origin centre, y up).
    pub fn to_ndc(&self, sx: f32, sy: f32) -> (f32, f32) {
        (sx / self.width * 2.0 - 1.0, 1.0 - sy / self.height * 2.0)
    }

    pub fn from_ndc(&self, ndc_x: f32, ndc_y: f32) -> (f32, f32) {
        (
            (ndc_x + 1.0) * 0.5 * self.width,
            (1.0 - ndc_y) * 0.5 * self.height,
        )
    }
}

/// Append two triangles covering the screen rectangle `(x0, y0)..(x1, y1)`.
pub fn push_quad(
    out: &mut Vec<Vertex>,
    screen: &Screen,
    (x0, y0): (f32, f32),
    (x1, y1): (f32, f32),
    depth: f32,
    uv: SubTexture,
) {
    let (nx0, ny0) = screen.to_ndc(x0, y0);
    let (nx1, ny1) = screen.to_ndc(x1, y1);
    out.extend_from_slice(&[
        Vertex::new(nx0, ny0, depth, uv.u0, uv.v0),
        Vertex::new(nx1, ny0, depth, uv.u1, uv.v0),
        Vertex::new(nx1, ny1, depth, uv.u1, uv.v1),
        Vertex::new(nx1, ny1, depth, uv.u1, uv.v1),
        Vertex::new(nx0, ny1, depth, uv.u0, uv.v1),
        Vertex::new(nx0, ny0, depth, uv.u0, uv.v0),
    ]);
}

/// Everything a layer may use while drawing one frame.
pub struct Frame<'a> {
    pub registry: &'a Registry,
    pub gpu: &'a mut dyn Gpu,
    pub decoder: &'a dyn BitmapDecoder,
    pub screen: Screen,
}

pub trait RenderLayer {
    /// Load assets and make the atlas current.
    fn prepare(&mut self, frame: &mut Frame<'_>);
    /// Emit draw calls.
    fn render(&mut self, frame: &mut Frame<'_>);

    fn name(&self) -> &str;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Ordered list of layers; earlier layers are drawn first.
#[derive(Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn RenderLayer>>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: Box<dyn RenderLayer>) {
        log::debug!("Adding render layer '{}'", layer.name());
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// First layer of type `T`.
    pub fn layer_mut<T: RenderLayer + 'static>(&mut self) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find_map(|layer| layer.as_any_mut().downcast_mut::<T>())
    }

    pub fn render_frame(
        &mut self,
        registry: &Registry,
        gpu: &mut dyn Gpu,
        decoder: &dyn BitmapDecoder,
        screen: Screen,
    ) {
        let mut frame = Frame {
            registry,
            gpu,
            decoder,
            screen,
        };
        frame.gpu.clear();
        for layer in self.layers.iter_mut() {
            layer.prepare(&mut frame);
            layer.render(&mut frame);
        }
        frame.gpu.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndc_maps_corners_and_centre() {
        let screen = Screen::new(800.0, 600.0);
        assert_eq!(screen.to_ndc(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(screen.to_ndc(800.0, 600.0), (1.0, -1.0));
        assert_eq!(screen.to_ndc(400.0, 300.0), (0.0, 0.0));
        assert_eq!(screen.from_ndc(-1.0, 1.0), (0.0, 0.0));
        assert_eq!(screen.from_ndc(0.5, -0.5), (600.0, 450.0));
    }

    #[test]
    fn quad_is_two_triangles_with_matching_uvs() {
        let screen = Screen::new(100.0, 100.0);
        let uv = SubTexture {
            u0: 0.25,
            v0: 0.5,
            u1: 0.75,
            v1: 1.0,
        };
        let mut out = Vec::new();
        push_quad(&mut out, &screen, (0.0, 0.0), (50.0, 100.0), -0.5, uv);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], Vertex::new(-1.0, 1.0, -0.5, 0.25, 0.5));
        assert_eq!(out[2], Vertex::new(0.0, -1.0, -0.5, 0.75, 1.0));
        assert_eq!(out[0], out[5]);
        assert_eq!(out[2], out[3]);
        assert!(out.iter().all(|v| v.normal == Vertex::NORMAL));
    }
}
