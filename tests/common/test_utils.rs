use std::{cell::RefCell, collections::HashMap, path::Path, rc::Rc};

use iso_ngin::{
    data_structures::{
        behaviour::BehaviourTable, bitmap::RawImage, prototype::PrototypeTable,
        scene_graph::Registry,
    },
    render::{Gpu, TextureId, Vertex},
    resources::{BitmapDecoder, GlyphBitmap, GlyphRasterizer},
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Everything a [`RecordingGpu`] was asked to do, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    Clear,
    Upload { texture: TextureId, width: u32, height: u32 },
    Release(TextureId),
    DepthTest(bool),
    Draw { texture: TextureId, vertices: usize },
    Present,
}

/// A [`Gpu`] that keeps uploads and draws in memory.
#[derive(Default)]
pub struct RecordingGpu {
    pub calls: Vec<GpuCall>,
    pub atlases: HashMap<TextureId, Vec<u8>>,
    pub draws: Vec<(TextureId, Vec<Vertex>)>,
    next: TextureId,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self {
            next: 1,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::Upload { .. }))
            .count()
    }

    pub fn draw_calls(&self) -> Vec<&GpuCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::Draw { .. }))
            .collect()
    }

    pub fn reset(&mut self) {
        self.calls.clear();
        self.draws.clear();
    }
}

impl Gpu for RecordingGpu {
    fn clear(&mut self) {
        self.calls.push(GpuCall::Clear);
    }

    fn upload_atlas(&mut self, width: u32, height: u32, rgba: &[u8]) -> anyhow::Result<TextureId> {
        let texture = self.next.max(1);
        self.next = texture + 1;
        self.atlases.insert(texture, rgba.to_vec());
        self.calls.push(GpuCall::Upload {
            texture,
            width,
            height,
        });
        Ok(texture)
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.atlases.remove(&texture);
        self.calls.push(GpuCall::Release(texture));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.calls.push(GpuCall::DepthTest(enabled));
    }

    fn draw(&mut self, vertices: &[Vertex], texture: TextureId) {
        self.calls.push(GpuCall::Draw {
            texture,
            vertices: vertices.len(),
        });
        self.draws.push((texture, vertices.to_vec()));
    }

    fn present(&mut self) {
        self.calls.push(GpuCall::Present);
    }
}

/// Serves bitmaps registered up front; any other path fails to decode.
#[derive(Default)]
pub struct MemoryDecoder {
    images: HashMap<String, RawImage>,
    pub requests: RefCell<Vec<String>>,
}

impl MemoryDecoder {
    pub fn with(mut self, path: &str, image: RawImage) -> Self {
        self.images.insert(path.to_string(), image);
        self
    }
}

impl BitmapDecoder for MemoryDecoder {
    fn decode(&self, path: &str) -> anyhow::Result<RawImage> {
        self.requests.borrow_mut().push(path.to_string());
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no image registered for {}", path))
    }
}

/// Every glyph is a `size / 2` by `size` block advancing by `size / 2`.
/// Rasterized characters are counted through a shared handle.
#[derive(Clone, Default)]
pub struct FakeRasterizer {
    pub rasterized: Rc<RefCell<Vec<(String, char, u32)>>>,
}

impl GlyphRasterizer for FakeRasterizer {
    fn rasterize(&self, font: &str, ch: char, size: u32) -> anyhow::Result<GlyphBitmap> {
        self.rasterized
            .borrow_mut()
            .push((font.to_string(), ch, size));
        if font == "broken.ttf" {
            anyhow::bail!("cannot open {}", font);
        }
        let (width, height) = if ch == ' ' { (0, 0) } else { (size / 2, size) };
        Ok(GlyphBitmap {
            width,
            height,
            bearing_x: 0,
            bearing_y: size as i32,
            advance: (size / 2) as f32,
            pixels: vec![255; (width * height * 4) as usize],
        })
    }
}

pub const PROTOTYPES: &str = r#"{
    "objects": [
        { "obj_class": "tile", "obj_subclass": "grass", "textures": "tiles/grass.png" },
        { "obj_class": "tile", "obj_subclass": "water", "textures": { "default": "tiles/water.png", "frozen": "tiles/ice.png" } },
        { "obj_class": "prop", "textures": "props/crate.png", "properties": { "vx": 0 } },
        { "obj_class": "prop", "obj_subclass": "lid", "textures": "props/lid.png" },
        { "obj_class": "ui", "obj_subclass": "text", "properties": { "text": "hello", "sx": 10, "sy": 20 } }
    ]
}"#;

/// Registry with the test prototypes loaded and `prop` instantiating as a sprite.
pub fn registry() -> Registry {
    let mut prototypes = PrototypeTable::new();
    prototypes
        .load_str(PROTOTYPES)
        .expect("test prototypes parse");
    let mut behaviours = BehaviourTable::core();
    behaviours.register("prop", iso_ngin::data_structures::behaviour::BehaviourKind::Sprite);
    Registry::new(prototypes, behaviours)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create test dir");
    }
    std::fs::write(path, contents).expect("write test file");
}

pub fn solid(w: u32, h: u32) -> RawImage {
    RawImage::solid(w, h, [10, 20, 30, 255])
}
