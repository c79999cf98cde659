//! Test helpers for text rendering
//!
//! A monospace canvas where every character is `advance * size` pixels wide,
//! so layout results can be checked by hand.

use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

use crate::text::{CanvasProvider, FontSpec, TextCanvas};

pub const DEFAULT_ADVANCE: f32 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font: FontSpec,
    pub color: [u8; 4],
}

fn mono_width(text: &str, font: FontSpec, advance: f32) -> f32 {
    text.chars().count() as f32 * advance * font.size
}

/// Free-standing canvas that only records draw calls.
#[derive(Debug, Clone)]
pub struct MonoCanvas {
    pub width: f32,
    pub height: f32,
    pub advance: f32,
    pub draws: Vec<DrawCall>,
}

impl MonoCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            advance: DEFAULT_ADVANCE,
            draws: Vec::new(),
        }
    }
}

impl TextCanvas for MonoCanvas {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn measure(&self, text: &str, font: FontSpec) -> f32 {
        mono_width(text, font, self.advance)
    }

    fn fill_text(&mut self, text: &str, x: f32, y_middle: f32, font: FontSpec, color: [u8; 4]) {
        self.draws.push(DrawCall {
            text: text.to_string(),
            x,
            y: y_middle,
            font,
            color,
        });
    }
}

/// Provider whose canvases record draw calls into a shared log and mark the
/// pixel at each text origin so tests can see that the image was touched.
#[derive(Debug, Clone, Default)]
pub struct MonoCanvasProvider {
    pub draws: Arc<Mutex<Vec<DrawCall>>>,
}

impl MonoCanvasProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<DrawCall> {
        self.draws.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

struct RecordingCanvas<'a> {
    image: &'a mut RgbaImage,
    log: &'a Mutex<Vec<DrawCall>>,
}

impl TextCanvas for RecordingCanvas<'_> {
    fn width(&self) -> f32 {
        self.image.width() as f32
    }

    fn height(&self) -> f32 {
        self.image.height() as f32
    }

    fn measure(&self, text: &str, font: FontSpec) -> f32 {
        mono_width(text, font, DEFAULT_ADVANCE)
    }

    fn fill_text(&mut self, text: &str, x: f32, y_middle: f32, font: FontSpec, color: [u8; 4]) {
        let px = (x.max(0.0) as u32).min(self.image.width().saturating_sub(1));
        let py = (y_middle.max(0.0) as u32).min(self.image.height().saturating_sub(1));
        if self.image.width() > 0 && self.image.height() > 0 {
            self.image.put_pixel(px, py, Rgba(color));
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(DrawCall {
                text: text.to_string(),
                x,
                y: y_middle,
                font,
                color,
            });
        }
    }
}

impl CanvasProvider for MonoCanvasProvider {
    fn canvas<'a>(&'a self, image: &'a mut RgbaImage, _family: &str) -> Box<dyn TextCanvas + 'a> {
        Box::new(RecordingCanvas {
            image,
            log: &self.draws,
        })
    }
}
