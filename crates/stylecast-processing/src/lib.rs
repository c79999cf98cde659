//! Local image processing for stylecast
//!
//! - **geometry**: pure aspect-ratio fitting and coordinate rescaling
//! - **crop**: the interactive crop engine producing a [`CropSpec`](stylecast_core::CropSpec)
//! - **text**: auto-fit text layout and drawing through a [`TextCanvas`](text::TextCanvas)
//! - **composite**: the final merge of crop and text onto the base image
//! - **codec**: decode/encode helpers

pub mod codec;
pub mod composite;
pub mod crop;
pub mod geometry;
pub mod text;

#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

pub use composite::{CompositeInputs, FinalCompositor};
pub use crop::{default_crop, CropEngine, OffsetBounds};
pub use geometry::{Axis, Rect, Size};
pub use text::{
    CanvasProvider, FontBook, FontFace, FontSpec, RenderMode, TextCanvas, TextCompositor,
    TextLayout,
};
