/// A decoded RGBA8 bitmap, rows top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RawImage {
    pub const MAGENTA: [u8; 4] = [255, 0, 255, 255];
    pub const WHITE: [u8; 4] = [255, 255, 255, 255];

    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * 4;
        anyhow::ensure!(
            pixels.len() == expected,
            "bitmap of {}x{} needs {} bytes, got {}",
            width,
            height,
            expected,
            pixels.len()
        );
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn solid(width: u32, height: u32, colour: [u8; 4]) -> Self {
        let pixels = colour
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Stand-in for a bitmap that could not be found or decoded.
    pub fn missing() -> Self {
        Self::solid(1, 1, Self::MAGENTA)
    }

    /// Stand-in for an entity without a texture path.
    pub fn blank() -> Self {
        Self::solid(1, 1, Self::WHITE)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}
