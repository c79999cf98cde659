//! Final composite: crop the base image and draw the text overlay.

use chrono::Utc;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use stylecast_core::{
    AppError, CompositeBase, CompositeResult, CropSpec, OutputFormat, SessionId, TextSpec,
};

use crate::codec;
use crate::crop::rescale_crop;
use crate::text::{CanvasProvider, RenderMode, TextCompositor};

/// Everything the merge needs, handed out once per session.
#[derive(Clone)]
pub struct CompositeInputs {
    pub session_id: SessionId,
    pub original: Arc<DynamicImage>,
    pub crop: CropSpec,
    /// `None` means no overlay.
    pub text: Option<TextSpec>,
    pub base: CompositeBase,
}

impl std::fmt::Debug for CompositeInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeInputs")
            .field("session_id", &self.session_id)
            .field("original", &self.original.dimensions())
            .field("crop", &self.crop)
            .field("text", &self.text)
            .field("base", &self.base)
            .finish()
    }
}

pub struct FinalCompositor {
    canvases: Arc<dyn CanvasProvider>,
    text: TextCompositor,
    output_format: OutputFormat,
    jpeg_quality: u8,
}

impl FinalCompositor {
    pub fn new(canvases: Arc<dyn CanvasProvider>, output_format: OutputFormat, jpeg_quality: u8) -> Self {
        Self {
            canvases,
            text: TextCompositor::new(),
            output_format,
            jpeg_quality,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Crops `stylized` (or the original photo when it is `None`) to the
    /// user's crop, draws the text and encodes the result.
    ///
    /// The crop was made on the original photo, so it is rescaled onto the
    /// base image first.
    pub fn compose(
        &self,
        inputs: &CompositeInputs,
        stylized: Option<&DynamicImage>,
    ) -> Result<CompositeResult, AppError> {
        let (base_image, base) = match (stylized, &inputs.base) {
            (Some(image), base @ CompositeBase::Stylized { .. }) => (image, base.clone()),
            (None, CompositeBase::Stylized { .. }) => (
                inputs.original.as_ref(),
                CompositeBase::Original {
                    reason: "stylized image unavailable".to_string(),
                },
            ),
            (_, base @ CompositeBase::Original { .. }) => (inputs.original.as_ref(), base.clone()),
        };

        let (base_w, base_h) = base_image.dimensions();
        let (x, y, w, h) = rescale_crop(&inputs.crop, base_w, base_h).to_pixels(base_w, base_h);
        let mut canvas = base_image.crop_imm(x, y, w, h).to_rgba8();

        if let Some(text) = &inputs.text {
            let mut surface = self.canvases.canvas(&mut canvas, &text.font_family);
            self.text.draw(surface.as_mut(), text, RenderMode::Final)?;
        }

        let (width, height) = canvas.dimensions();
        let data = codec::encode(
            &DynamicImage::ImageRgba8(canvas),
            self.output_format,
            self.jpeg_quality,
        )?;

        tracing::info!(
            session_id = %inputs.session_id,
            stylized = base.is_stylized(),
            width = width,
            height = height,
            size_bytes = data.len(),
            "Composite rendered"
        );

        Ok(CompositeResult {
            session_id: inputs.session_id,
            data,
            width,
            height,
            format: self.output_format,
            base,
            created_at: Utc::now(),
        })
    }

    /// Cropped original with the preview overlay, shown during text entry.
    pub fn preview(
        &self,
        original: &DynamicImage,
        crop: &CropSpec,
        text: &TextSpec,
    ) -> Result<image::RgbaImage, AppError> {
        let (w, h) = original.dimensions();
        let (x, y, cw, ch) = rescale_crop(crop, w, h).to_pixels(w, h);
        let mut canvas = original.crop_imm(x, y, cw, ch).to_rgba8();
        {
            let mut surface = self.canvases.canvas(&mut canvas, &text.font_family);
            self.text.draw(surface.as_mut(), text, RenderMode::Preview)?;
        }
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::default_crop;
    use crate::test_helpers::MonoCanvasProvider;
    use image::{Rgba, RgbaImage};
    use stylecast_core::AspectRatio;

    fn photo(width: u32, height: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([40, 80, 120, 255]),
        )))
    }

    fn inputs(base: CompositeBase, text: Option<TextSpec>) -> CompositeInputs {
        CompositeInputs {
            session_id: SessionId::new(),
            original: photo(1600, 1200),
            crop: default_crop(1600, 1200, AspectRatio::ThreeByFour),
            text,
            base,
        }
    }

    #[test]
    fn test_composes_over_original_with_crop_dimensions() {
        let provider = Arc::new(MonoCanvasProvider::new());
        let compositor = FinalCompositor::new(provider.clone(), OutputFormat::Png, 90);
        let inputs = inputs(
            CompositeBase::Original {
                reason: "job failed".into(),
            },
            Some(TextSpec::new("Ana", "Jon")),
        );

        let result = compositor.compose(&inputs, None).unwrap();
        assert_eq!((result.width, result.height), (900, 1200));
        assert!(!result.base.is_stylized());
        assert_eq!(result.content_type(), "image/png");
        assert_eq!(provider.recorded().len(), 7);

        let decoded = codec::decode(&result.data).unwrap();
        assert_eq!(decoded.dimensions(), (900, 1200));
    }

    #[test]
    fn test_rescales_crop_onto_stylized_result() {
        let provider = Arc::new(MonoCanvasProvider::new());
        let compositor = FinalCompositor::new(provider, OutputFormat::Jpeg, 85);
        let inputs = inputs(
            CompositeBase::Stylized {
                result_url: "https://cdn.example.com/r.png".into(),
            },
            None,
        );
        // Remote result at half resolution
        let stylized = DynamicImage::ImageRgba8(RgbaImage::new(800, 600));

        let result = compositor.compose(&inputs, Some(&stylized)).unwrap();
        assert!(result.base.is_stylized());
        assert_eq!((result.width, result.height), (450, 600));
        assert_eq!(&result.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_missing_stylized_image_falls_back_to_original() {
        let compositor =
            FinalCompositor::new(Arc::new(MonoCanvasProvider::new()), OutputFormat::Png, 90);
        let inputs = inputs(
            CompositeBase::Stylized {
                result_url: "https://cdn.example.com/r.png".into(),
            },
            None,
        );
        let result = compositor.compose(&inputs, None).unwrap();
        assert!(matches!(result.base, CompositeBase::Original { .. }));
    }

    #[test]
    fn test_no_text_draws_nothing() {
        let provider = Arc::new(MonoCanvasProvider::new());
        let compositor = FinalCompositor::new(provider.clone(), OutputFormat::Png, 90);
        let inputs = inputs(
            CompositeBase::Original {
                reason: "test".into(),
            },
            None,
        );
        compositor.compose(&inputs, None).unwrap();
        assert!(provider.recorded().is_empty());
    }

    #[test]
    fn test_preview_uses_placeholder_for_empty_names() {
        let provider = Arc::new(MonoCanvasProvider::new());
        let compositor = FinalCompositor::new(provider.clone(), OutputFormat::Png, 90);
        let original = photo(1600, 1200);
        let crop = default_crop(1600, 1200, AspectRatio::FiveBySeven);
        let preview = compositor
            .preview(&original, &crop, &TextSpec::new("", ""))
            .unwrap();
        assert_eq!(preview.height(), 1200);
        assert!(!provider.recorded().is_empty());
    }
}
