//! Assigned-name convention for selected images.
//!
//! Accepted images are named positionally, 1-based, continuing after the
//! images already in storage: with `E` existing images, the batch is named
//! `image-(E+1).jpeg` … `image-(E+N).jpeg`. The extension is always `.jpeg`
//! because every image is re-encoded as JPEG.
//!
//! Names are not checked against storage. With a stale existing count two
//! batches can produce the same name; the filesystem store refuses the second
//! write rather than overwrite.

/// Extension carried by every assigned name.
pub const EXTENSION: &str = "jpeg";

/// Stem shared by every assigned name.
const STEM: &str = "image";

/// Name for the image at 1-based `position`.
///
/// - `assigned_name(1)` → `"image-1.jpeg"`
/// - `assigned_name(10)` → `"image-10.jpeg"`
pub fn assigned_name(position: usize) -> String {
    format!("{STEM}-{position}.{EXTENSION}")
}

/// Names for a batch of `count` images after `existing` stored ones.
pub fn batch_names(existing: usize, count: usize) -> Vec<String> {
    (0..count).map(|i| assigned_name(existing + i + 1)).collect()
}

/// Position encoded in an assigned name or a key ending in one.
///
/// - `"image-3.jpeg"` → `Some(3)`
/// - `"images/image-12.jpeg"` → `Some(12)`
/// - `"cover.jpeg"` → `None`
pub fn parse_position(name: &str) -> Option<usize> {
    let file = name.rsplit('/').next().unwrap_or(name);
    let rest = file.strip_prefix(STEM)?.strip_prefix('-')?;
    let digits = rest.strip_suffix(EXTENSION)?.strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
