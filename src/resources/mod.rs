/**
 * This module contains all logic for loading bitmaps and fonts from the asset folder.
 */
pub mod glyph;

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::data_structures::bitmap::RawImage;

pub use glyph::{FontdueRasterizer, GlyphBitmap, GlyphRasterizer};

/// Turns an image path into RGBA8 pixels.
pub trait BitmapDecoder {
    fn decode(&self, path: &str) -> anyhow::Result<RawImage>;
}

/// Resolve `file_name` against `root` unless it is already absolute.
pub fn asset_path(root: &Path, file_name: &str) -> PathBuf {
    let path = Path::new(file_name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub fn load_binary(root: &Path, file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = asset_path(root, file_name);
    std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
}

/// [`BitmapDecoder`] backed by the `image` crate, reading below an asset root.
#[derive(Clone, Debug)]
pub struct ImageDecoder {
    root: PathBuf,
}

impl ImageDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode encoded image bytes (PNG, JPEG, ...) into RGBA8.
    pub fn decode_bytes(bytes: &[u8]) -> anyhow::Result<RawImage> {
        let img = image::load_from_memory(bytes)?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        RawImage::from_rgba(width, height, rgba.into_raw())
    }
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl BitmapDecoder for ImageDecoder {
    fn decode(&self, path: &str) -> anyhow::Result<RawImage> {
        let data = load_binary(&self.root, path)?;
        Self::decode_bytes(&data).with_context(|| format!("decoding {}", path))
    }
}
