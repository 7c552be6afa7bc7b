//! Adaptive compression: re-encode at decreasing quality until the image fits.
//!
//! The search is linear over the [`QualitySchedule`]: the first quality whose
//! JPEG encoding is at most `max_size_bytes` wins. If the schedule runs out
//! (the next quality would be ≤ 0) without a fit, compression fails with
//! [`CompressError::EncodingBudgetExceeded`], reporting the smallest size
//! reached so the caller can say how far off the budget was.

use super::backend::{BackendError, ImageBackend};
use super::params::CompressionParams;
use crate::types::{CompressedImage, OUTPUT_MIME_TYPE, PendingImage};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("{name}: smallest encoding is {smallest} bytes, budget is {max} bytes")]
    EncodingBudgetExceeded { name: String, smallest: u64, max: u64 },
    #[error("Invalid compression parameters: {0}")]
    InvalidParams(String),
}

/// Decode `image` and compress it under the budget.
///
/// Does not touch `image`; the returned [`CompressedImage`] owns new bytes.
pub fn compress<B: ImageBackend>(
    backend: &B,
    image: &PendingImage,
    params: &CompressionParams,
) -> Result<CompressedImage, CompressError> {
    let raster = backend.decode(&image.source_bytes)?;
    compress_raster(backend, &raster, &image.assigned_name, params)
}

/// Compress an already-decoded raster under the budget.
pub fn compress_raster<B: ImageBackend>(
    backend: &B,
    raster: &B::Raster,
    assigned_name: &str,
    params: &CompressionParams,
) -> Result<CompressedImage, CompressError> {
    let mut smallest: Option<u64> = None;

    for quality in params.schedule.qualities() {
        let bytes = backend.encode_jpeg(raster, quality)?;
        let size = bytes.len() as u64;
        debug!(
            name = assigned_name,
            quality = quality.jpeg_value(),
            size,
            budget = params.max_size_bytes,
            "encoded attempt"
        );
        if size <= params.max_size_bytes {
            return Ok(CompressedImage {
                bytes,
                mime_type: OUTPUT_MIME_TYPE.to_string(),
                assigned_name: assigned_name.to_string(),
                size_bytes: size,
                quality,
            });
        }
        smallest = Some(smallest.map_or(size, |s| s.min(size)));
    }

    Err(CompressError::EncodingBudgetExceeded {
        name: assigned_name.to_string(),
        smallest: smallest.unwrap_or(0),
        max: params.max_size_bytes,
    })
}
