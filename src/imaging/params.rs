//! Parameter types for the compressor.
//!
//! These structs describe *what* to try, not *how* to encode it. The
//! [`compress`](super::compress) loop walks a [`QualitySchedule`] and asks the
//! [`backend`](super::backend) for one encoding per step.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality as a fraction in (0, 1].
//! - [`QualitySchedule`]: Start quality + fixed step; yields decreasing qualities until ≤ 0.
//! - [`CompressionParams`]: Byte budget plus schedule, validated on construction.

use super::compress::CompressError;

/// Qualities at or below this are treated as zero, absorbing float drift
/// from repeated subtraction.
const QUALITY_EPSILON: f32 = 1e-4;

/// Quality setting for lossy image encoding, as a fraction of the best quality.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// The 1–100 scale JPEG encoders take.
    pub fn jpeg_value(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.9)
    }
}

/// Decreasing sequence of qualities: `start`, `start - step`, `start - 2·step`, …
/// while the value stays above zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySchedule {
    start: f32,
    step: f32,
}

impl QualitySchedule {
    /// `start` must lie in (0, 1] and `step` in (0, 1).
    pub fn new(start: f32, step: f32) -> Result<Self, CompressError> {
        if !(start > 0.0 && start <= 1.0) {
            return Err(CompressError::InvalidParams(format!(
                "start quality {start} is outside (0, 1]"
            )));
        }
        if !(step > 0.0 && step < 1.0) {
            return Err(CompressError::InvalidParams(format!(
                "quality step {step} is outside (0, 1)"
            )));
        }
        Ok(Self { start, step })
    }

    /// Every quality the compressor may try, highest first.
    ///
    /// Each value is computed as `start - k·step` rather than by repeated
    /// subtraction so error does not accumulate. Steps that land on the same
    /// JPEG quality as the previous one are skipped, so there are at most 100
    /// attempts whatever the step.
    pub fn qualities(&self) -> impl Iterator<Item = Quality> + '_ {
        let mut last_jpeg = None;
        (0u32..)
            .map(|k| self.start - k as f32 * self.step)
            .take_while(|q| *q > QUALITY_EPSILON)
            .map(Quality::new)
            .filter(move |q| {
                let jpeg = Some(q.jpeg_value());
                let fresh = jpeg != last_jpeg;
                last_jpeg = jpeg;
                fresh
            })
    }
}

/// Everything the compressor needs besides the image itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionParams {
    pub max_size_bytes: u64,
    pub schedule: QualitySchedule,
}

impl CompressionParams {
    pub fn new(max_size_bytes: u64, start: f32, step: f32) -> Result<Self, CompressError> {
        if max_size_bytes == 0 {
            return Err(CompressError::InvalidParams(
                "size budget must be non-zero".into(),
            ));
        }
        Ok(Self {
            max_size_bytes,
            schedule: QualitySchedule::new(start, step)?,
        })
    }

    /// Build from the `[compression]` config section.
    pub fn from_config(config: &crate::config::CompressionConfig) -> Result<Self, CompressError> {
        Self::new(
            config.max_size_bytes,
            config.start_quality,
            config.quality_step,
        )
    }
}
