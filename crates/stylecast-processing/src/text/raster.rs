//! Font-backed canvas over an RGBA image.

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use std::collections::HashMap;
use std::path::Path;
use stylecast_core::AppError;

use super::canvas::{CanvasProvider, FontFace, FontSpec, TextCanvas};

/// Primary and accent faces of one family.
#[derive(Clone)]
pub struct FontPair {
    pub primary: FontArc,
    pub accent: FontArc,
}

impl FontPair {
    fn face(&self, face: FontFace) -> &FontArc {
        match face {
            FontFace::Primary => &self.primary,
            FontFace::Accent => &self.accent,
        }
    }
}

/// Loaded fonts keyed by family name. Unknown families fall back to the
/// default pair.
#[derive(Clone)]
pub struct FontBook {
    default: FontPair,
    families: HashMap<String, FontPair>,
}

impl FontBook {
    pub fn new(default: FontPair) -> Self {
        Self {
            default,
            families: HashMap::new(),
        }
    }

    /// Loads the default family from disk. Without an accent path the
    /// primary face is used for the ampersand too.
    pub fn from_paths(primary: &Path, accent: Option<&Path>) -> Result<Self, AppError> {
        let primary = load_font(primary)?;
        let accent = match accent {
            Some(path) => load_font(path)?,
            None => primary.clone(),
        };
        tracing::info!("Font book loaded");
        Ok(Self::new(FontPair { primary, accent }))
    }

    pub fn register_family(&mut self, name: impl Into<String>, pair: FontPair) {
        self.families.insert(name.into(), pair);
    }

    pub fn family(&self, name: &str) -> &FontPair {
        self.families.get(name).unwrap_or(&self.default)
    }
}

pub fn load_font(path: &Path) -> Result<FontArc, AppError> {
    let data = std::fs::read(path)
        .map_err(|e| AppError::Font(format!("Failed to read {}: {}", path.display(), e)))?;
    FontArc::try_from_vec(data)
        .map_err(|e| AppError::Font(format!("Invalid font {}: {}", path.display(), e)))
}

impl CanvasProvider for FontBook {
    fn canvas<'a>(&'a self, image: &'a mut RgbaImage, family: &str) -> Box<dyn TextCanvas + 'a> {
        Box::new(RasterCanvas {
            image,
            fonts: self.family(family),
        })
    }
}

pub struct RasterCanvas<'a> {
    image: &'a mut RgbaImage,
    fonts: &'a FontPair,
}

impl<'a> RasterCanvas<'a> {
    pub fn new(image: &'a mut RgbaImage, fonts: &'a FontPair) -> Self {
        Self { image, fonts }
    }
}

impl TextCanvas for RasterCanvas<'_> {
    fn width(&self) -> f32 {
        self.image.width() as f32
    }

    fn height(&self) -> f32 {
        self.image.height() as f32
    }

    fn measure(&self, text: &str, font: FontSpec) -> f32 {
        let face = self.fonts.face(font.face);
        let scaled = face.as_scaled(PxScale::from(font.size));
        let mut width = 0.0f32;
        let mut prev = None;
        for ch in text.chars() {
            let id = face.glyph_id(ch);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    fn fill_text(&mut self, text: &str, x: f32, y_middle: f32, font: FontSpec, color: [u8; 4]) {
        let face = self.fonts.face(font.face);
        let scale = PxScale::from(font.size);
        let line_height = face.as_scaled(scale).height();
        let top = y_middle - line_height / 2.0;
        draw_text_mut(
            self.image,
            Rgba(color),
            x.round() as i32,
            top.round() as i32,
            scale,
            face,
            text,
        );
    }
}
