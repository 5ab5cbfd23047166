//! World layer: isometric projection, depth ordering and culling.
//!
//! Everything visible that is not a UI element is drawn here as one tile-sized
//! quad per entity, back to front, in a single draw call.

use std::{any::Any, cmp::Ordering};

use cgmath::{Vector2, Vector3};

use crate::{
    data_structures::{
        atlas::{LayerAtlas, SubTexture},
        entity::{Entity, ROOT_ID},
    },
    render::{Frame, RenderLayer, Screen, Vertex, push_quad},
};

/// Depth step between consecutive world quads.
pub const DEPTH_STEP: f32 = 0.000001;

/// Maps camera-relative world coordinates to screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IsoProjector {
    pub tile_width: f32,
    pub tile_height: f32,
    pub screen: Screen,
}

impl IsoProjector {
    pub fn new(tile_width: f32, tile_height: f32, screen: Screen) -> Self {
        Self {
            tile_width,
            tile_height,
            screen,
        }
    }

    /// Top-left corner of the tile quad for a world position. Culling and
    /// vertex emission both go through here.
    pub fn project(&self, world: Vector3<f32>) -> Vector2<f32> {
        let sx = (world.x - world.y) * (self.tile_width / 2.0) + self.screen.width / 2.0;
        let sy = (world.x + world.y) * (self.tile_width / 6.4)
            - world.z * (self.tile_height * 0.66)
            + self.screen.height / 2.0;
        Vector2::new(sx, sy)
    }

    /// A quad at `corner` is visible unless it lies entirely outside the
    /// viewport. Touching the edge counts as visible.
    pub fn is_on_screen(&self, corner: Vector2<f32>) -> bool {
        let right = corner.x + self.tile_width;
        let bottom = corner.y + self.tile_height;
        !(right < 0.0
            || corner.x > self.screen.width
            || bottom < 0.0
            || corner.y > self.screen.height)
    }
}

/// Back to front: z, then y, then x, then id.
pub fn depth_order(a: &Entity, b: &Entity) -> Ordering {
    a.position
        .z
        .total_cmp(&b.position.z)
        .then_with(|| a.position.y.total_cmp(&b.position.y))
        .then_with(|| a.position.x.total_cmp(&b.position.x))
        .then_with(|| a.id().cmp(&b.id()))
}

/// Entities the world layer draws.
pub fn is_world_drawable(entity: &Entity) -> bool {
    entity.id() != ROOT_ID && !entity.invis && entity.class != "ui"
}

pub struct IsometricLayer {
    atlas: LayerAtlas,
    tile_width: f32,
    tile_height: f32,
    last_drawn: usize,
    last_culled: usize,
}

impl IsometricLayer {
    pub fn new(atlas_size: u32, tile_width: f32, tile_height: f32) -> Self {
        Self {
            atlas: LayerAtlas::new(atlas_size),
            tile_width,
            tile_height,
            last_drawn: 0,
            last_culled: 0,
        }
    }

    pub fn atlas(&self) -> &LayerAtlas {
        &self.atlas
    }

    /// Quads emitted in the last frame.
    pub fn last_drawn(&self) -> usize {
        self.last_drawn
    }

    /// Entities dropped by culling in the last frame.
    pub fn last_culled(&self) -> usize {
        self.last_culled
    }

    /// Sort, cull and turn the drawable entities into vertices.
    pub fn build_vertices(&self, frame: &Frame<'_>) -> Vec<Vertex> {
        let projector = IsoProjector::new(self.tile_width, self.tile_height, frame.screen);
        let camera = frame.registry.camera_offset();

        let mut sorted: Vec<&Entity> = frame
            .registry
            .iter()
            .filter(|e| is_world_drawable(e))
            .collect();
        sorted.sort_by(|a, b| depth_order(a, b));

        let mut vertices = Vec::with_capacity(sorted.len() * 6);
        let mut index = 0usize;
        for entity in sorted {
            let corner = projector.project(entity.position - camera);
            if !projector.is_on_screen(corner) {
                continue;
            }
            let uv = self.atlas.uv(entity.texture()).unwrap_or(SubTexture::FULL);
            let depth = -DEPTH_STEP * index as f32;
            index += 1;
            push_quad(
                &mut vertices,
                &frame.screen,
                (corner.x, corner.y),
                (corner.x + self.tile_width, corner.y + self.tile_height),
                depth,
                uv,
            );
        }
        vertices
    }
}

impl RenderLayer for IsometricLayer {
    fn prepare(&mut self, frame: &mut Frame<'_>) {
        for entity in frame.registry.iter().filter(|e| is_world_drawable(e)) {
            self.atlas.ensure_image_loaded(entity.texture(), frame.decoder);
        }
        self.atlas.ensure_current(frame.gpu);
    }

    fn render(&mut self, frame: &mut Frame<'_>) {
        let vertices = self.build_vertices(frame);
        let drawable = frame
            .registry
            .iter()
            .filter(|e| is_world_drawable(e))
            .count();
        self.last_drawn = vertices.len() / 6;
        self.last_culled = drawable - self.last_drawn;
        if vertices.is_empty() {
            return;
        }
        let Some(texture) = self.atlas.texture() else {
            log::warn!("World layer has no atlas texture, skipping draw");
            return;
        };
        frame.gpu.set_depth_test(true);
        frame.gpu.draw(&vertices, texture);
    }

    fn name(&self) -> &str {
        "world"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
