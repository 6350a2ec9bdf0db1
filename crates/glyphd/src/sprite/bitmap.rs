use std::fmt;

/// A single RGBA pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const GREEN: Rgba = Rgba::new(0, 255, 0, 255);
    pub const GRAY: Rgba = Rgba::new(136, 136, 136, 255);
    pub const RED: Rgba = Rgba::new(255, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// White with the given alpha; descriptor pixels are always white.
    pub const fn white(alpha: u8) -> Self {
        Self::new(255, 255, 255, alpha)
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

/// A fixed-size bitmap, stored row-major.
///
/// Sprites are built once and never mutated afterwards; recoloring produces a
/// new sprite.
#[derive(Clone, PartialEq, Eq)]
pub struct Sprite {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Sprite {
    /// Create a fully transparent sprite.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at (`row`, `col`), or `None` when out of bounds.
    pub fn pixel(&self, row: usize, col: usize) -> Option<Rgba> {
        if row < self.height && col < self.width {
            Some(self.pixels[row * self.width + col])
        } else {
            None
        }
    }

    /// Set a pixel. Writes outside the bitmap are dropped.
    pub(crate) fn set(&mut self, row: usize, col: usize, color: Rgba) {
        if row < self.height && col < self.width {
            self.pixels[row * self.width + col] = color;
        }
    }

    /// Iterate over rows of pixels.
    pub fn rows(&self) -> impl Iterator<Item = &[Rgba]> {
        // chunks(0) panics, and a zero-width sprite has no rows anyway
        self.pixels.chunks(self.width.max(1)).take(self.height)
    }

    /// Number of pixels that are not fully transparent.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|p| !p.is_transparent()).count()
    }

    /// Copy of this sprite with every lit pixel tinted, keeping its alpha.
    pub fn recolor(&self, tint: Rgba) -> Sprite {
        let pixels = self
            .pixels
            .iter()
            .map(|p| {
                if p.is_transparent() {
                    *p
                } else {
                    Rgba::new(tint.r, tint.g, tint.b, p.a)
                }
            })
            .collect();
        Sprite {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

impl fmt::Debug for Sprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lit", &self.lit_count())
            .finish_non_exhaustive()
    }
}
