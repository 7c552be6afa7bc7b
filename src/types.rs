//! Shared types passed between selection, compression, and upload.
//!
//! An image moves through three shapes: [`CandidateFile`] (what the user
//! picked), [`PendingImage`] (accepted and named by the selection gate), and
//! [`CompressedImage`] (re-encoded under the size budget). A successful
//! upload produces an [`UploadResult`].

use crate::imaging::Quality;
use serde::Serialize;

/// MIME type of every compressed image.
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

/// A file offered for selection, with its declared type and size.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Original filename, for display only.
    pub file_name: String,
    pub mime_type: String,
    /// Declared size in bytes; the size cap is checked against this.
    pub size_bytes: u64,
    pub bytes: Vec<u8>,
}

impl CandidateFile {
    /// Candidate whose declared size is the length of `bytes`.
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            bytes,
        }
    }
}

/// An accepted image awaiting compression.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    pub source_bytes: Vec<u8>,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Positional name, e.g. `image-3.jpeg`.
    pub assigned_name: String,
}

/// An image re-encoded as JPEG.
///
/// `size_bytes <= max_size_bytes` of the parameters it was compressed with.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub assigned_name: String,
    pub size_bytes: u64,
    /// Quality of the encoding that fit the budget.
    pub quality: Quality,
}

/// A stored image and its public URL.
///
/// Batches complete out of order; correlate by `assigned_name`, not position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub assigned_name: String,
    pub key: String,
    pub url: String,
}
