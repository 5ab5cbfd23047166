//! Screen-space UI layer: images and text.
//!
//! UI entities (class `ui`) are placed in virtual screen pixels and drawn on
//! top of the world with depth testing off. Text comes from `ui.text`
//! entities and from programmatic entries added through [`GuiLayer::add_text`].
//! Glyphs are rasterized on first use and packed into the layer's atlas under
//! keys of the form `font:size:codepoint`.

use std::{any::Any, collections::HashMap};

use cgmath::Vector3;

use crate::{
    data_structures::{
        atlas::LayerAtlas,
        behaviour::{Behaviour, UiImage},
        bitmap::RawImage,
        entity::Entity,
        scene_graph::Registry,
    },
    render::{Frame, RenderLayer, Screen, Vertex, push_quad},
    resources::GlyphRasterizer,
};

const IMAGE_DEPTH: f32 = -0.00002;
const TEXT_DEPTH: f32 = -0.00001;

pub const DEFAULT_FONT_SIZE: u32 = 24;

pub fn glyph_key(font: &str, size: u32, ch: char) -> String {
    format!("{}:{}:{}", font, size, ch as u32)
}

/// A programmatic text run in screen pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct TextEntry {
    pub text: String,
    pub x: f32,
    pub y: f32,
    /// Empty means the layer font.
    pub font: String,
    pub size: u32,
    /// Persistent entries survive the frame they were drawn in.
    pub persistent: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct GlyphMetrics {
    width: u32,
    height: u32,
    bearing_x: i32,
    bearing_y: i32,
    advance: f32,
}

impl GlyphMetrics {
    fn pen_advance(&self) -> f32 {
        if self.advance > 0.0 {
            self.advance
        } else {
            self.width as f32 + 2.0
        }
    }
}

/// Screen anchor of a UI element: normalized coordinates win when both are
/// non-negative, then pixel coordinates when either is set, then the
/// entity's local offset.
pub fn ui_anchor(
    nx: f32,
    ny: f32,
    sx: f32,
    sy: f32,
    local: Vector3<f32>,
    screen: &Screen,
) -> (f32, f32) {
    if nx >= 0.0 && ny >= 0.0 {
        ((nx * screen.width).trunc(), (ny * screen.height).trunc())
    } else if sx != 0.0 || sy != 0.0 {
        (sx.trunc(), sy.trunc())
    } else {
        (local.x.trunc(), local.y.trunc())
    }
}

pub struct GuiLayer {
    atlas: LayerAtlas,
    rasterizer: Box<dyn GlyphRasterizer>,
    font: String,
    font_size: u32,
    glyphs: HashMap<String, GlyphMetrics>,
    entries: Vec<TextEntry>,
    screen: Screen,
}

impl GuiLayer {
    pub fn new(
        atlas_size: u32,
        rasterizer: Box<dyn GlyphRasterizer>,
        font: &str,
        font_size: u32,
        screen: Screen,
    ) -> Self {
        Self {
            atlas: LayerAtlas::new(atlas_size),
            rasterizer,
            font: font.to_string(),
            font_size,
            glyphs: HashMap::new(),
            entries: Vec::new(),
            screen,
        }
    }

    pub fn atlas(&self) -> &LayerAtlas {
        &self.atlas
    }

    pub fn font(&self) -> (&str, u32) {
        (&self.font, self.font_size)
    }

    /// Switch the default font. Cached glyphs and their bitmaps are dropped
    /// and rasterized again on demand.
    pub fn set_font(&mut self, path: &str, size: u32) {
        self.font = path.to_string();
        self.font_size = size;
        for (key, _) in self.glyphs.drain() {
            self.atlas.remove(&key);
        }
    }

    /// Queue text at pixel coordinates. `None` picks the layer font or size.
    pub fn add_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font: Option<&str>,
        size: Option<u32>,
        persistent: bool,
    ) {
        self.entries.push(TextEntry {
            text: text.to_string(),
            x,
            y,
            font: font.unwrap_or_default().to_string(),
            size: size.unwrap_or(self.font_size),
            persistent,
        });
    }

    /// Queue text at normalized device coordinates (-1..1, y up).
    pub fn add_text_at_ndc(
        &mut self,
        text: &str,
        ndc_x: f32,
        ndc_y: f32,
        font: Option<&str>,
        size: Option<u32>,
        persistent: bool,
    ) {
        let (x, y) = self.screen.from_ndc(ndc_x, ndc_y);
        self.add_text(text, x.trunc(), y.trunc(), font, size, persistent);
    }

    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    fn resolve_font<'a>(&'a self, font: &'a str) -> &'a str {
        if font.is_empty() { self.font.as_str() } else { font }
    }

    /// Rasterize the glyphs of `text` that are not cached yet. Returns whether
    /// a bitmap was added to the atlas sources.
    fn ensure_glyphs(&mut self, font: &str, size: u32, text: &str) -> bool {
        let mut added = false;
        for ch in text.chars() {
            let key = glyph_key(font, size, ch);
            if self.glyphs.contains_key(&key) {
                continue;
            }
            let metrics = match self.rasterizer.rasterize(font, ch, size) {
                Ok(glyph) => {
                    let metrics = GlyphMetrics {
                        width: glyph.width,
                        height: glyph.height,
                        bearing_x: glyph.bearing_x,
                        bearing_y: glyph.bearing_y,
                        advance: glyph.advance,
                    };
                    if glyph.width > 0 && glyph.height > 0 {
                        match RawImage::from_rgba(glyph.width, glyph.height, glyph.pixels) {
                            Ok(image) => {
                                self.atlas.insert_raw(&key, image);
                                added = true;
                            }
                            Err(e) => log::warn!("Glyph {} has a bad bitmap: {}", key, e),
                        }
                    }
                    metrics
                }
                Err(e) => {
                    log::warn!("Cannot rasterize {:?} from '{}': {:#}", ch, font, e);
                    GlyphMetrics::default()
                }
            };
            self.glyphs.insert(key, metrics);
        }
        added
    }

    fn ui_entities(registry: &Registry) -> impl Iterator<Item = &Entity> {
        registry.iter().filter(|e| e.class == "ui" && !e.invis)
    }

    fn push_image(&self, out: &mut Vec<Vertex>, entity: &Entity, ui: &UiImage) {
        let texture = entity.texture();
        if texture.is_empty() {
            return;
        }
        let (Some(uv), Some(raw)) = (self.atlas.uv(texture), self.atlas.raw(texture)) else {
            log::debug!("UI image '{}' has no atlas entry", texture);
            return;
        };
        let (x, y) = ui_anchor(ui.nx, ui.ny, ui.sx, ui.sy, entity.local, &self.screen);
        let w = if ui.w > 0.0 { ui.w.trunc() } else { raw.width as f32 };
        let h = if ui.h > 0.0 { ui.h.trunc() } else { raw.height as f32 };
        push_quad(out, &self.screen, (x, y), (x + w, y + h), IMAGE_DEPTH, uv);
    }

    fn push_text(
        &self,
        out: &mut Vec<Vertex>,
        font: &str,
        size: u32,
        text: &str,
        (x, y): (f32, f32),
    ) {
        let mut pen = x;
        let baseline = y + size as f32;
        for ch in text.chars() {
            let key = glyph_key(font, size, ch);
            let Some(metrics) = self.glyphs.get(&key) else {
                continue;
            };
            if metrics.width > 0 && metrics.height > 0 {
                if let Some(uv) = self.atlas.uv(&key) {
                    let x0 = pen + metrics.bearing_x as f32;
                    let y0 = baseline - metrics.bearing_y as f32;
                    push_quad(
                        out,
                        &self.screen,
                        (x0, y0),
                        (x0 + metrics.width as f32, y0 + metrics.height as f32),
                        TEXT_DEPTH,
                        uv,
                    );
                }
            }
            pen += metrics.pen_advance();
        }
    }

    /// Vertices for every UI image, UI text entity and queued entry.
    pub fn build_vertices(&self, frame: &Frame<'_>) -> Vec<Vertex> {
        let mut vertices = Vec::new();
        let mut texts = Vec::new();
        for entity in Self::ui_entities(frame.registry) {
            match &entity.behaviour {
                Behaviour::UiText(t) => texts.push((entity, t)),
                Behaviour::UiImage(ui) => self.push_image(&mut vertices, entity, ui),
                _ => self.push_image(&mut vertices, entity, &UiImage::default()),
            }
        }
        for (entity, t) in texts {
            let anchor = ui_anchor(t.nx, t.ny, t.sx, t.sy, entity.local, &self.screen);
            self.push_text(&mut vertices, self.resolve_font(&t.font), t.size, &t.text, anchor);
        }
        for entry in &self.entries {
            self.push_text(
                &mut vertices,
                self.resolve_font(&entry.font),
                entry.size,
                &entry.text,
                (entry.x, entry.y),
            );
        }
        vertices
    }
}

impl RenderLayer for GuiLayer {
    fn prepare(&mut self, frame: &mut Frame<'_>) {
        self.screen = frame.screen;
        let registry = frame.registry;

        for entity in Self::ui_entities(registry) {
            if !matches!(entity.behaviour, Behaviour::UiText(_)) && !entity.texture().is_empty() {
                self.atlas.ensure_image_loaded(entity.texture(), frame.decoder);
            }
        }

        let mut runs: Vec<(String, u32, String)> = self
            .entries
            .iter()
            .map(|e| (self.resolve_font(&e.font).to_string(), e.size, e.text.clone()))
            .collect();
        for entity in Self::ui_entities(registry) {
            if let Behaviour::UiText(t) = &entity.behaviour {
                runs.push((self.resolve_font(&t.font).to_string(), t.size, t.text.clone()));
            }
        }
        let mut added = false;
        for (font, size, text) in runs {
            added |= self.ensure_glyphs(&font, size, &text);
        }

        if added {
            log::debug!("GUI layer rasterized new glyphs, rebuilding atlas");
            self.atlas.rebuild(frame.gpu);
        } else {
            self.atlas.ensure_current(frame.gpu);
        }
    }

    fn render(&mut self, frame: &mut Frame<'_>) {
        let vertices = self.build_vertices(frame);
        if !vertices.is_empty() {
            match self.atlas.texture() {
                Some(texture) => {
                    frame.gpu.set_depth_test(false);
                    frame.gpu.draw(&vertices, texture);
                    frame.gpu.set_depth_test(true);
                }
                None => log::warn!("GUI layer has no atlas texture, skipping draw"),
            }
        }
        self.entries.retain(|e| e.persistent);
    }

    fn name(&self) -> &str {
        "gui"
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
