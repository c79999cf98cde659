//! Text overlay: auto-fit layout and drawing.

pub mod canvas;
pub mod layout;
pub mod raster;

pub use canvas::{CanvasProvider, FontFace, FontSpec, TextCanvas};
pub use layout::{
    fit_font_size, format_names, letter_spacing, MainLine, PlacedGlyph, RenderMode,
    SubtitleLine, TextCompositor, TextLayout,
};
pub use raster::{load_font, FontBook, FontPair, RasterCanvas};
