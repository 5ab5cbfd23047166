//! Texture atlas packing.
//!
//! [`Atlas::pack`] places bitmaps left to right on shelves, starting a new
//! shelf when the current one is full. Every packed image gets a normalized
//! [`SubTexture`]; images that do not fit are listed in [`Atlas::skipped`].
//!
//! [`LayerAtlas`] is the per-layer wrapper: it caches the source bitmaps in
//! insertion order, knows when the packed result is stale and owns the GPU
//! texture the result was uploaded to.

use std::collections::HashMap;

use crate::{
    data_structures::bitmap::RawImage,
    render::{Gpu, TextureId},
    resources::BitmapDecoder,
};

/// Gap in pixels kept between packed images to avoid sampling bleed.
pub const ATLAS_PADDING: u32 = 1;

/// Default side length of a layer atlas.
pub const DEFAULT_ATLAS_SIZE: u32 = 2048;

/// Normalized sub-rectangle of an atlas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubTexture {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl SubTexture {
    /// The whole atlas.
    pub const FULL: SubTexture = SubTexture {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };
}

/// A packed square RGBA buffer and the rectangles of everything inside it.
#[derive(Clone, Debug)]
pub struct Atlas {
    size: u32,
    pixels: Vec<u8>,
    uvs: HashMap<String, SubTexture>,
    skipped: Vec<String>,
}

impl Atlas {
    /// Shelf-pack `sources` in iteration order into a `size`x`size` atlas.
    pub fn pack<'a, I>(size: u32, sources: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a RawImage)>,
    {
        let side = size as usize;
        let mut pixels = vec![0u8; side * side * 4];
        let mut uvs = HashMap::new();
        let mut skipped = Vec::new();

        let (mut cur_x, mut cur_y, mut row_h) = (0u32, 0u32, 0u32);
        for (key, image) in sources {
            let (w, h) = (image.width, image.height);
            if image.is_empty() || image.pixels.len() < w as usize * h as usize * 4 {
                log::warn!("Atlas: invalid bitmap '{}' ({}x{}), skipped", key, w, h);
                skipped.push(key.to_string());
                continue;
            }
            if w + ATLAS_PADDING > size || h + ATLAS_PADDING > size {
                log::warn!(
                    "Atlas: '{}' ({}x{}) can never fit a {}px atlas, skipped",
                    key,
                    w,
                    h,
                    size
                );
                skipped.push(key.to_string());
                continue;
            }
            if cur_x + w + ATLAS_PADDING > size {
                cur_x = 0;
                cur_y += row_h + ATLAS_PADDING;
                row_h = 0;
            }
            if cur_y + h + ATLAS_PADDING > size {
                log::warn!("Atlas: overflow while placing '{}', skipped", key);
                skipped.push(key.to_string());
                continue;
            }

            let row_bytes = w as usize * 4;
            for row in 0..h as usize {
                let dst = ((cur_y as usize + row) * side + cur_x as usize) * 4;
                let src = row * row_bytes;
                pixels[dst..dst + row_bytes].copy_from_slice(&image.pixels[src..src + row_bytes]);
            }

            let s = size as f32;
            uvs.insert(
                key.to_string(),
                SubTexture {
                    u0: cur_x as f32 / s,
                    v0: cur_y as f32 / s,
                    u1: (cur_x + w) as f32 / s,
                    v1: (cur_y + h) as f32 / s,
                },
            );
            cur_x += w + ATLAS_PADDING;
            row_h = row_h.max(h + ATLAS_PADDING);
        }

        log::debug!("Atlas: packed {} entries, skipped {}", uvs.len(), skipped.len());
        Self {
            size,
            pixels,
            uvs,
            skipped,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn uv(&self, key: &str) -> Option<SubTexture> {
        self.uvs.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.uvs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uvs.is_empty()
    }

    /// Keys that were not packed (invalid size or no room left).
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

/// Source cache, packed atlas and GPU texture of one render layer.
#[derive(Debug)]
pub struct LayerAtlas {
    size: u32,
    order: Vec<String>,
    sources: HashMap<String, RawImage>,
    packed: Option<Atlas>,
    texture: Option<TextureId>,
    dirty: bool,
}

impl LayerAtlas {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            order: Vec::new(),
            sources: HashMap::new(),
            packed: None,
            texture: None,
            dirty: true,
        }
    }

    /// Make sure a bitmap for `path` is cached. An empty path caches a white
    /// pixel, a path that fails to decode caches a magenta one.
    pub fn ensure_image_loaded(&mut self, path: &str, decoder: &dyn BitmapDecoder) {
        if self.sources.contains_key(path) {
            return;
        }
        let image = if path.is_empty() {
            RawImage::blank()
        } else {
            match decoder.decode(path) {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("Failed to load image '{}', using placeholder: {:#}", path, e);
                    RawImage::missing()
                }
            }
        };
        self.insert_raw(path, image);
    }

    /// Cache a bitmap under `key`, replacing any previous one.
    pub fn insert_raw(&mut self, key: &str, image: RawImage) {
        if self.sources.insert(key.to_string(), image).is_none() {
            self.order.push(key.to_string());
        }
        self.dirty = true;
    }

    /// Drop the bitmap cached under `key`. The atlas is rebuilt without it
    /// on the next [`ensure_current`](Self::ensure_current).
    pub fn remove(&mut self, key: &str) -> bool {
        if self.sources.remove(key).is_none() {
            return false;
        }
        self.order.retain(|k| k != key);
        self.dirty = true;
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sources.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&RawImage> {
        self.sources.get(key)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Build the atlas if it was never built or sources changed since.
    pub fn ensure_current(&mut self, gpu: &mut dyn Gpu) {
        if self.dirty || self.packed.is_none() {
            self.rebuild(gpu);
        }
    }

    /// Discard the GPU texture and UV map and pack every cached source again.
    pub fn rebuild(&mut self, gpu: &mut dyn Gpu) {
        if let Some(texture) = self.texture.take() {
            gpu.release_texture(texture);
        }
        let sources = self
            .order
            .iter()
            .filter_map(|key| self.sources.get(key).map(|image| (key.as_str(), image)));
        let atlas = Atlas::pack(self.size, sources);
        match gpu.upload_atlas(atlas.size(), atlas.size(), atlas.pixels()) {
            Ok(texture) => self.texture = Some(texture),
            Err(e) => log::error!("Atlas upload failed: {:#}", e),
        }
        self.packed = Some(atlas);
        self.dirty = false;
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn atlas(&self) -> Option<&Atlas> {
        self.packed.as_ref()
    }

    pub fn uv(&self, key: &str) -> Option<SubTexture> {
        self.packed.as_ref().and_then(|a| a.uv(key))
    }
}
