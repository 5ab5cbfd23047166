//! Glyph rasterization for the text layer.
//!
//! The GUI layer asks a [`GlyphRasterizer`] for one character at a time and
//! packs the result into its atlas. [`FontdueRasterizer`] is the default
//! implementation and keeps every font it has parsed.

use std::{
    cell::RefCell,
    collections::HashMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use fontdue::{Font, FontSettings};

use crate::resources::load_binary;

/// One rasterized glyph in RGBA8 plus its placement metrics.
///
/// `bearing_x` is the offset from the pen to the left edge, `bearing_y` the
/// distance from the baseline up to the top edge and `advance` the horizontal
/// pen movement in pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    pub bearing_x: i32,
    pub bearing_y: i32,
    pub advance: f32,
    pub pixels: Vec<u8>,
}

pub trait GlyphRasterizer {
    fn rasterize(&self, font: &str, ch: char, size: u32) -> anyhow::Result<GlyphBitmap>;
}

/// Rasterizer backed by `fontdue`. Glyphs come out white with the coverage
/// in the alpha channel.
pub struct FontdueRasterizer {
    root: PathBuf,
    fonts: RefCell<HashMap<String, Rc<Font>>>,
}

impl FontdueRasterizer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fonts: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn font(&self, name: &str) -> anyhow::Result<Rc<Font>> {
        if let Some(font) = self.fonts.borrow().get(name) {
            return Ok(font.clone());
        }
        let data = load_binary(&self.root, name)?;
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("fontdue error in {}: {}", name, e))?;
        log::info!("Loaded font {}", name);
        let font = Rc::new(font);
        self.fonts
            .borrow_mut()
            .insert(name.to_string(), font.clone());
        Ok(font)
    }
}

impl GlyphRasterizer for FontdueRasterizer {
    fn rasterize(&self, font: &str, ch: char, size: u32) -> anyhow::Result<GlyphBitmap> {
        let font = self.font(font)?;
        let (metrics, coverage) = font.rasterize(ch, size as f32);
        let pixels = coverage
            .iter()
            .flat_map(|&alpha| [255, 255, 255, alpha])
            .collect();
        Ok(GlyphBitmap {
            width: metrics.width as u32,
            height: metrics.height as u32,
            bearing_x: metrics.xmin,
            // fontdue measures ymin from the baseline to the bottom edge
            bearing_y: metrics.ymin + metrics.height as i32,
            advance: metrics.advance_width,
            pixels,
        })
    }
}
