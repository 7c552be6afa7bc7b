//! Selection gate: filter candidate files, enforce the capacity ceiling, and
//! assign names.
//!
//! ## Rules
//!
//! 1. **Filter**: a candidate is kept only if its declared size is at most
//!    `max_file_bytes` and its declared MIME type is accepted. Filtering looks
//!    at each file on its own, so the outcome does not depend on order.
//! 2. **Ceiling**: if `existing + kept > max_images`, the whole selection is
//!    refused with [`SelectionError::CapacityExceeded`]. Nothing is partially
//!    accepted.
//! 3. **Naming**: kept files are named `image-(existing+1).jpeg` onward in the
//!    order they were offered (see [`naming`](crate::naming)).
//!
//! `existing` is whatever count the caller last read from storage; the gate
//! never looks at storage itself.
//!
//! [`load_candidate`] builds candidates from files on disk. It reads a file's
//! content only once the filter has admitted it.

use crate::config::SelectionConfig;
use crate::imaging::sniff_mime_type;
use crate::naming;
use crate::types::{CandidateFile, PendingImage};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Declared type for files whose content is not a decodable image.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Leading bytes that identify every accepted format.
const SNIFF_LEN: u64 = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error(
        "{existing} existing + {requested} selected images exceeds the limit of {limit}"
    )]
    CapacityExceeded {
        existing: usize,
        requested: usize,
        limit: usize,
    },
}

/// Outcome of a selection attempt that fit under the ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Accepted images in submission order, already named.
    pub accepted: Vec<PendingImage>,
    /// Candidates dropped by the size/type filter.
    pub rejected_count: usize,
}

impl Selection {
    pub fn names(&self) -> Vec<&str> {
        self.accepted
            .iter()
            .map(|img| img.assigned_name.as_str())
            .collect()
    }
}

/// Limits the gate enforces.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    pub max_images: usize,
    pub max_file_bytes: u64,
    pub accepted_types: Vec<String>,
}

impl SelectionPolicy {
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            max_images: config.max_images,
            max_file_bytes: config.max_file_bytes,
            accepted_types: config.accepted_types.clone(),
        }
    }

    /// Whether a single candidate passes the size and type filter.
    pub fn admits(&self, candidate: &CandidateFile) -> bool {
        candidate.size_bytes <= self.max_file_bytes
            && self
                .accepted_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&candidate.mime_type))
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default())
    }
}

/// Run the gate over `candidates`, given `existing` stored images.
pub fn select(
    candidates: Vec<CandidateFile>,
    existing: usize,
    policy: &SelectionPolicy,
) -> Result<Selection, SelectionError> {
    let total = candidates.len();
    let valid: Vec<CandidateFile> = candidates
        .into_iter()
        .filter(|c| policy.admits(c))
        .collect();
    let rejected_count = total - valid.len();

    if existing + valid.len() > policy.max_images {
        return Err(SelectionError::CapacityExceeded {
            existing,
            requested: valid.len(),
            limit: policy.max_images,
        });
    }

    let names = naming::batch_names(existing, valid.len());
    let accepted = valid
        .into_iter()
        .zip(names)
        .map(|(file, assigned_name)| PendingImage {
            source_bytes: file.bytes,
            mime_type: file.mime_type,
            size_bytes: file.size_bytes,
            assigned_name,
        })
        .collect();

    Ok(Selection {
        accepted,
        rejected_count,
    })
}

/// Build a candidate from a file on disk.
///
/// The type is sniffed from the file's first bytes and the size comes from
/// its metadata. The rest is read only if `policy` admits the file, so a
/// skipped file never has to fit in memory. A file that cannot be read
/// becomes a candidate the filter rejects.
pub fn load_candidate(path: &Path, policy: &SelectionPolicy) -> CandidateFile {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match read_candidate(path, file_name.clone(), policy) {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable file skipped");
            CandidateFile {
                file_name,
                mime_type: UNKNOWN_MIME_TYPE.to_string(),
                size_bytes: 0,
                bytes: Vec::new(),
            }
        }
    }
}

fn read_candidate(
    path: &Path,
    file_name: String,
    policy: &SelectionPolicy,
) -> io::Result<CandidateFile> {
    let mut file = File::open(path)?;
    let size_bytes = file.metadata()?.len();
    let mut bytes = Vec::new();
    (&mut file).take(SNIFF_LEN).read_to_end(&mut bytes)?;
    let mime_type = sniff_mime_type(&bytes).unwrap_or(UNKNOWN_MIME_TYPE);

    let mut candidate = CandidateFile {
        file_name,
        mime_type: mime_type.to_string(),
        size_bytes,
        bytes,
    };
    if policy.admits(&candidate) {
        file.read_to_end(&mut candidate.bytes)?;
    } else {
        candidate.bytes.clear();
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_BYTES: u64 = 31_457_280;

    fn file(name: &str, mime: &str, size: u64) -> CandidateFile {
        CandidateFile {
            file_name: name.to_string(),
            mime_type: mime.to_string(),
            size_bytes: size,
            bytes: name.as_bytes().to_vec(),
        }
    }

    fn jpegs(n: usize) -> Vec<CandidateFile> {
        (0..n)
            .map(|i| file(&format!("photo{i}.jpg"), "image/jpeg", 1000))
            .collect()
    }

    #[test]
    fn accepts_jpeg_and_png() {
        let candidates = vec![
            file("a.jpg", "image/jpeg", 10),
            file("b.png", "image/png", 10),
        ];
        let selection = select(candidates, 0, &SelectionPolicy::default()).unwrap();
        assert_eq!(selection.accepted.len(), 2);
        assert_eq!(selection.rejected_count, 0);
    }

    #[test]
    fn filters_other_types() {
        let candidates = vec![
            file("a.gif", "image/gif", 10),
            file("b.webp", "image/webp", 10),
            file("c.jpg", "image/jpeg", 10),
            file("d.pdf", "application/pdf", 10),
        ];
        let selection = select(candidates, 0, &SelectionPolicy::default()).unwrap();
        assert_eq!(selection.names(), vec!["image-1.jpeg"]);
        assert_eq!(selection.rejected_count, 3);
    }

    #[test]
    fn size_cap_is_inclusive() {
        let candidates = vec![
            file("exact.jpg", "image/jpeg", MAX_BYTES),
            file("over.jpg", "image/jpeg", MAX_BYTES + 1),
        ];
        let selection = select(candidates, 0, &SelectionPolicy::default()).unwrap();
        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.accepted[0].source_bytes, b"exact.jpg");
        assert_eq!(selection.rejected_count, 1);
    }

    #[test]
    fn filter_is_independent_of_order() {
        let mut candidates = vec![
            file("a.jpg", "image/jpeg", 10),
            file("big.jpg", "image/jpeg", MAX_BYTES + 1),
            file("b.png", "image/png", 10),
            file("c.gif", "image/gif", 10),
        ];
        let forward = select(candidates.clone(), 0, &SelectionPolicy::default()).unwrap();
        candidates.reverse();
        let backward = select(candidates, 0, &SelectionPolicy::default()).unwrap();

        let mut fwd: Vec<_> = forward.accepted.iter().map(|i| &i.source_bytes).collect();
        let mut bwd: Vec<_> = backward.accepted.iter().map(|i| &i.source_bytes).collect();
        fwd.sort();
        bwd.sort();
        assert_eq!(fwd, bwd);
        assert_eq!(forward.rejected_count, backward.rejected_count);
    }

    #[test]
    fn names_continue_after_existing() {
        let selection = select(jpegs(3), 4, &SelectionPolicy::default()).unwrap();
        assert_eq!(
            selection.names(),
            vec!["image-5.jpeg", "image-6.jpeg", "image-7.jpeg"]
        );
    }

    #[test]
    fn names_follow_submission_order() {
        let candidates = vec![
            file("first.jpg", "image/jpeg", 10),
            file("skip.gif", "image/gif", 10),
            file("second.png", "image/png", 10),
        ];
        let selection = select(candidates, 0, &SelectionPolicy::default()).unwrap();
        assert_eq!(selection.accepted[0].source_bytes, b"first.jpg");
        assert_eq!(selection.accepted[0].assigned_name, "image-1.jpeg");
        assert_eq!(selection.accepted[1].source_bytes, b"second.png");
        assert_eq!(selection.accepted[1].assigned_name, "image-2.jpeg");
    }

    #[test]
    fn over_capacity_rejects_everything() {
        let err = select(jpegs(3), 8, &SelectionPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            SelectionError::CapacityExceeded {
                existing: 8,
                requested: 3,
                limit: 10
            }
        );
    }

    #[test]
    fn exactly_at_capacity_is_accepted() {
        let selection = select(jpegs(2), 8, &SelectionPolicy::default()).unwrap();
        assert_eq!(selection.names(), vec!["image-9.jpeg", "image-10.jpeg"]);
    }

    #[test]
    fn filtered_files_do_not_count_toward_capacity() {
        let mut candidates = jpegs(2);
        candidates.push(file("huge.jpg", "image/jpeg", MAX_BYTES + 1));
        let selection = select(candidates, 8, &SelectionPolicy::default()).unwrap();
        assert_eq!(selection.accepted.len(), 2);
        assert_eq!(selection.rejected_count, 1);
    }

    #[test]
    fn capacity_holds_for_every_split() {
        let policy = SelectionPolicy::default();
        for existing in 0..=10 {
            for n in 0..=10 {
                let result = select(jpegs(n), existing, &policy);
                if existing + n > 10 {
                    assert!(result.is_err(), "{existing}+{n} should be refused");
                } else {
                    assert_eq!(result.unwrap().accepted.len(), n);
                }
            }
        }
    }

    #[test]
    fn mime_match_ignores_case() {
        let selection = select(
            vec![file("a.jpg", "IMAGE/JPEG", 10)],
            0,
            &SelectionPolicy::default(),
        )
        .unwrap();
        assert_eq!(selection.accepted.len(), 1);
    }

    const JPEG_HEAD: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn admitted_file_is_read_whole() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut content = JPEG_HEAD.to_vec();
        content.extend(std::iter::repeat_n(7u8, 100));
        let path = write(tmp.path(), "photo.jpg", &content);

        let candidate = load_candidate(&path, &SelectionPolicy::default());

        assert_eq!(candidate.file_name, "photo.jpg");
        assert_eq!(candidate.mime_type, "image/jpeg");
        assert_eq!(candidate.size_bytes, content.len() as u64);
        assert_eq!(candidate.bytes, content);
    }

    #[test]
    fn oversize_file_is_sized_but_not_read() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut content = JPEG_HEAD.to_vec();
        content.extend(std::iter::repeat_n(7u8, 100));
        let path = write(tmp.path(), "raw.jpg", &content);
        let policy = SelectionPolicy {
            max_file_bytes: 50,
            ..SelectionPolicy::default()
        };

        let candidate = load_candidate(&path, &policy);

        assert_eq!(candidate.mime_type, "image/jpeg");
        assert_eq!(candidate.size_bytes, content.len() as u64);
        assert!(candidate.bytes.is_empty());
        assert!(!policy.admits(&candidate));
    }

    #[test]
    fn text_file_is_not_an_image() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write(tmp.path(), "notes.txt", b"just some words, nothing more");

        let candidate = load_candidate(&path, &SelectionPolicy::default());

        assert_eq!(candidate.mime_type, UNKNOWN_MIME_TYPE);
        assert!(candidate.bytes.is_empty());
        assert!(!SelectionPolicy::default().admits(&candidate));
    }

    #[test]
    fn missing_file_is_rejected_not_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("gone.jpg");

        let candidate = load_candidate(&path, &SelectionPolicy::default());

        assert_eq!(candidate.file_name, "gone.jpg");
        assert_eq!(candidate.size_bytes, 0);
        let selection = select(vec![candidate], 0, &SelectionPolicy::default()).unwrap();
        assert!(selection.accepted.is_empty());
        assert_eq!(selection.rejected_count, 1);
    }
}
