//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the compressor
//! needs: decode raw file bytes into a raster, and encode a raster as JPEG at
//! a given quality. Decoding happens once per image; encoding happens once
//! per quality step.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::Quality;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Pixel dimensions of a decoded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codec backends.
///
/// `Sync` so one backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Decoded pixel buffer at native resolution.
    type Raster: Send + Sync;

    /// Decode raw file bytes (JPEG or PNG) into a raster.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Raster, BackendError>;

    /// Dimensions of a decoded raster.
    fn dimensions(&self, raster: &Self::Raster) -> Dimensions;

    /// Encode a raster as JPEG at the given quality.
    fn encode_jpeg(&self, raster: &Self::Raster, quality: Quality)
    -> Result<Vec<u8>, BackendError>;
}
