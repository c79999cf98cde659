//! Drawing/measurement seam used by the text compositor.

use image::RgbaImage;

/// Which face of the configured font family to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    /// Names and subtitle.
    Primary,
    /// The ampersand between the two names.
    Accent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub face: FontFace,
    /// Pixel height.
    pub size: f32,
}

impl FontSpec {
    pub fn primary(size: f32) -> Self {
        Self {
            face: FontFace::Primary,
            size,
        }
    }

    pub fn accent(size: f32) -> Self {
        Self {
            face: FontFace::Accent,
            size,
        }
    }
}

/// A raster surface that can measure and draw text.
///
/// `fill_text` positions text by its left edge and the vertical middle of
/// the line box.
pub trait TextCanvas {
    fn width(&self) -> f32;

    fn height(&self) -> f32;

    /// Advance width of `text` in pixels.
    fn measure(&self, text: &str, font: FontSpec) -> f32;

    fn fill_text(&mut self, text: &str, x: f32, y_middle: f32, font: FontSpec, color: [u8; 4]);
}

/// Hands out canvases over an image for a given font family.
pub trait CanvasProvider: Send + Sync {
    fn canvas<'a>(&'a self, image: &'a mut RgbaImage, family: &str) -> Box<dyn TextCanvas + 'a>;
}
