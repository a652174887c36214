//! Image decoding and tensor conversion helpers.
//!
//! Decoding honours a declared format (extension or MIME type) when one
//! is given and sniffs the payload otherwise. The tensor helpers are used
//! by the bundled preprocess handlers.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use ocrkit_plugin::HandlerError;
use ocrkit_types::Tensor;

use crate::error::PipelineError;

/// Map a declared format (`"png"`, `".jpg"`, `"image/jpeg"`) to an
/// [`ImageFormat`].
pub fn parse_format(declared: &str) -> Option<ImageFormat> {
    let declared = declared.trim().to_ascii_lowercase();
    if declared.contains('/') {
        let mime = declared.split(';').next().unwrap_or_default().trim();
        return ImageFormat::from_mime_type(mime);
    }
    ImageFormat::from_extension(declared.trim_start_matches('.'))
}

/// Decode `bytes` into an image.
///
/// An empty payload, an unrecognised declared format, or bytes that do
/// not decode all fail with [`PipelineError::ImageDecode`].
pub fn decode(bytes: &[u8], declared: Option<&str>) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::ImageDecode("image payload is empty".into()));
    }
    let declared = declared.map(str::trim).filter(|d| !d.is_empty());
    let result = match declared {
        Some(name) => {
            let format = parse_format(name).ok_or_else(|| {
                PipelineError::ImageDecode(format!("unsupported image format '{name}'"))
            })?;
            image::load_from_memory_with_format(bytes, format)
        }
        None => image::load_from_memory(bytes),
    };
    result.map_err(|e| PipelineError::ImageDecode(e.to_string()))
}

/// Grayscale, resize to exactly `width` x `height`, and scale pixels to
/// `[0, 1]`. The tensor has shape `[height, width]`.
///
/// Empty source images and zero target sizes fail with
/// [`HandlerError::InvalidInput`].
pub fn grayscale_tensor(
    image: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<Tensor, HandlerError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(HandlerError::InvalidInput("image has no pixels".into()));
    }
    if width == 0 || height == 0 {
        return Err(HandlerError::InvalidInput(format!(
            "target size {width}x{height} has no pixels"
        )));
    }
    let gray = image
        .resize_exact(width, height, FilterType::Triangle)
        .to_luma8();
    let values: Vec<f32> = gray.as_raw().iter().map(|p| f32::from(*p) / 255.0).collect();
    ndarray::Array2::from_shape_vec((height as usize, width as usize), values)
        .map(|a| a.into_dyn())
        .map_err(|e| HandlerError::InvalidInput(format!("tensor shape {height}x{width}: {e}")))
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 10, 10]),
        ));
        encode_png(&img).unwrap()
    }

    #[test]
    fn parse_format_variants() {
        assert_eq!(parse_format("png"), Some(ImageFormat::Png));
        assert_eq!(parse_format(".PNG"), Some(ImageFormat::Png));
        assert_eq!(parse_format("image/png"), Some(ImageFormat::Png));
        assert_eq!(parse_format("jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(parse_format("tiff-ish"), None);
    }

    #[test]
    fn decode_sniffs_without_format() {
        let img = decode(&png(160, 60), None).unwrap();
        assert_eq!((img.width(), img.height()), (160, 60));
    }

    #[test]
    fn decode_with_declared_format() {
        let img = decode(&png(10, 5), Some("image/png")).unwrap();
        assert_eq!(img.width(), 10);
    }

    #[test]
    fn decode_empty_fails() {
        let err = decode(&[], None).unwrap_err();
        assert!(matches!(err, PipelineError::ImageDecode(_)));
    }

    #[test]
    fn decode_truncated_fails() {
        let bytes = png(160, 60);
        let err = decode(&bytes[..bytes.len() / 2], Some("png")).unwrap_err();
        assert_eq!(err.code(), "IMAGE_DECODE_ERROR");
    }

    #[test]
    fn decode_unknown_format_fails() {
        let err = decode(&png(4, 4), Some("xyz")).unwrap_err();
        assert!(err.to_string().contains("unsupported image format"));
    }

    #[test]
    fn grayscale_tensor_shape_and_range() {
        let img = decode(&png(160, 60), None).unwrap();
        let t = grayscale_tensor(&img, 32, 16).unwrap();
        assert_eq!(t.shape(), &[16, 32]);
        assert!(t.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn grayscale_tensor_rejects_empty_sizes() {
        let img = decode(&png(8, 8), None).unwrap();
        let err = grayscale_tensor(&img, 0, 16).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidInput(_)));
        assert!(err.to_string().contains("0x16"));

        let empty = DynamicImage::new_luma8(0, 0);
        assert!(matches!(
            grayscale_tensor(&empty, 32, 16),
            Err(HandlerError::InvalidInput(_))
        ));
    }
}
