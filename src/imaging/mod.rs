//! Image compression in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` → RGB8 |
//! | **Encode** | `JpegEncoder::new_with_quality` |
//! | **Compress** | linear quality search, [`compress`] |
//!
//! The module is split into:
//! - **Parameters**: quality, schedule, and budget types
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Compress**: the budget loop on top of any backend

pub mod backend;
pub mod compress;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use compress::{CompressError, compress, compress_raster};
pub use params::{CompressionParams, Quality, QualitySchedule};
pub use rust_backend::{RustBackend, sniff_mime_type};
