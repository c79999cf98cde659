//! Decode and encode helpers

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use stylecast_core::{AppError, OutputFormat};

/// Decodes image bytes, guessing the format from the content.
pub fn decode(data: &[u8]) -> Result<DynamicImage, AppError> {
    if data.is_empty() {
        return Err(AppError::ImageDecode("empty image data".to_string()));
    }
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| AppError::ImageDecode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(AppError::ImageDecode("unrecognized image format".to_string()));
    }
    let img = reader.decode()?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(AppError::ImageDecode(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }
    Ok(img)
}

/// Encodes to the requested output format. JPEG drops the alpha channel.
pub fn encode(img: &DynamicImage, format: OutputFormat, jpeg_quality: u8) -> Result<Bytes, AppError> {
    let mut buffer = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        }
    }
    Ok(Bytes::from(buffer))
}

/// Downscales so the longest side is at most `max_dimension`, then encodes
/// as JPEG for upload to the stylization service.
pub fn prepare_upload(img: &DynamicImage, max_dimension: u32, jpeg_quality: u8) -> Result<Bytes, AppError> {
    let (width, height) = img.dimensions();
    if width.max(height) > max_dimension {
        let resized = img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Lanczos3,
        );
        encode(&resized, OutputFormat::Jpeg, jpeg_quality)
    } else {
        encode(img, OutputFormat::Jpeg, jpeg_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 255])))
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b""), Err(AppError::ImageDecode(_))));
        assert!(matches!(
            decode(b"definitely not an image"),
            Err(AppError::ImageDecode(_))
        ));
    }

    #[test]
    fn test_png_encode_then_decode() {
        let bytes = encode(&sample(12, 8), OutputFormat::Png, 90).unwrap();
        let img = decode(&bytes).unwrap();
        assert_eq!(img.dimensions(), (12, 8));
    }

    #[test]
    fn test_jpeg_encode_is_decodable() {
        let bytes = encode(&sample(16, 16), OutputFormat::Jpeg, 80).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(decode(&bytes).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn test_prepare_upload_downscales_longest_side() {
        let bytes = prepare_upload(&sample(400, 100), 200, 85).unwrap();
        let img = decode(&bytes).unwrap();
        assert_eq!(img.dimensions(), (200, 50));
    }
}
