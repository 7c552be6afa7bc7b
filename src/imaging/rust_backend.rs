//! Pure Rust codec backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory` (format sniffed from content) |
//! | Flatten to RGB | `DynamicImage::to_rgb8` (drops PNG alpha) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};

/// MIME types whose decoders are compiled in.
const DECODABLE: &[(&str, ImageFormat)] = &[
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
];

/// Sniff the MIME type of raw bytes, if it is one we can decode.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    DECODABLE
        .iter()
        .find(|(_, f)| *f == format)
        .map(|(mime, _)| *mime)
}

/// Backend using the `image` crate ecosystem.
///
/// Decoding converts to 8-bit RGB once, so every quality step re-encodes
/// the same buffer without re-converting it.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    type Raster = RgbImage;

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, BackendError> {
        let img = image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(img.to_rgb8())
    }

    fn dimensions(&self, raster: &RgbImage) -> Dimensions {
        Dimensions {
            width: raster.width(),
            height: raster.height(),
        }
    }

    fn encode_jpeg(&self, raster: &RgbImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality.jpeg_value())
            .write_image(
                raster.as_raw(),
                raster.width(),
                raster.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, _| Rgba([x as u8, 0, 0, 200]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn encode_then_decode_preserves_dimensions() {
        let backend = RustBackend::new();
        let jpeg = backend
            .encode_jpeg(&gradient(200, 150), Quality::new(0.9))
            .unwrap();
        let raster = backend.decode(&jpeg).unwrap();
        assert_eq!(
            backend.dimensions(&raster),
            Dimensions {
                width: 200,
                height: 150
            }
        );
    }

    #[test]
    fn lower_quality_is_smaller() {
        let backend = RustBackend::new();
        let raster = gradient(256, 256);
        let high = backend.encode_jpeg(&raster, Quality::new(0.9)).unwrap();
        let low = backend.encode_jpeg(&raster, Quality::new(0.1)).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn png_with_alpha_decodes_to_rgb() {
        let backend = RustBackend::new();
        let raster = backend.decode(&png_bytes(40, 30)).unwrap();
        assert_eq!(raster.dimensions(), (40, 30));
        assert!(backend.encode_jpeg(&raster, Quality::default()).is_ok());
    }

    #[test]
    fn garbage_fails_to_decode() {
        let backend = RustBackend::new();
        assert!(matches!(
            backend.decode(b"definitely not an image"),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn sniff_recognizes_jpeg_and_png() {
        let backend = RustBackend::new();
        let jpeg = backend
            .encode_jpeg(&gradient(8, 8), Quality::default())
            .unwrap();
        assert_eq!(sniff_mime_type(&jpeg), Some("image/jpeg"));
        assert_eq!(sniff_mime_type(&png_bytes(8, 8)), Some("image/png"));
        assert_eq!(sniff_mime_type(b"GIF89a......"), None);
    }
}
