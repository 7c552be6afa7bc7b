//! CLI output formatting for every command.
//!
//! # Output Format
//!
//! ## Count
//!
//! ```text
//! fichiers existants:
//!     2 image(s) sauvegardées.
//! ```
//!
//! ## Upload
//!
//! ```text
//! fichier selectionné:
//!     image-3.jpeg
//!     image-4.jpeg
//!     (1 file skipped: not JPEG/PNG or larger than 30.0 MB)
//! Compressing 2 image(s)
//!     image-3.jpeg: decoded 4000x3000
//!     image-3.jpeg: 812.4 KB at quality 70
//!     [##############------] 70%
//! Uploaded
//!     image-3.jpeg → https://…/images/image-3.jpeg
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` (or a `String`) and is pure
//! for testability; `print_*` wrappers write to stdout. [`user_message`]
//! maps any [`IntakeError`] to the single line shown to the user.

use crate::selection::SelectionError;
use crate::session::IntakeError;
use crate::types::UploadResult;
use crate::upload::{IntakeEvent, ItemOutcome, UploadError};

/// Width of the progress bar in characters.
const BAR_WIDTH: u32 = 20;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte size: `512 B`, `812.4 KB`, `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

// ============================================================================
// User-visible messages
// ============================================================================

/// The one line shown to the user for a failure.
pub fn user_message(err: &IntakeError) -> String {
    match err {
        IntakeError::Selection(SelectionError::CapacityExceeded { limit, .. }) => format!(
            "You can only have up to {limit} JPEG or PNG images in total, including already uploaded images."
        ),
        IntakeError::Compress(_) => "Error compressing images. Please try again later.".to_string(),
        IntakeError::Upload(e) => upload_message(e).to_string(),
    }
}

/// Message for a storage failure.
pub fn upload_message(err: &UploadError) -> &'static str {
    match err {
        UploadError::List(_) => "Error fetching existing images. Please try again later.",
        UploadError::Put { .. } | UploadError::Url { .. } => {
            "Error uploading images. Please try again later."
        }
    }
}

// ============================================================================
// Existing images and selection
// ============================================================================

/// Existing-image summary; nothing when there are none.
pub fn format_existing_count(count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    vec![
        "fichiers existants:".to_string(),
        format!("{}{} image(s) sauvegardées.", indent(1), count),
    ]
}

pub fn print_existing_count(count: usize) {
    for line in format_existing_count(count) {
        println!("{}", line);
    }
}

/// Names assigned to the current selection, plus how many files were skipped.
pub fn format_selection(names: &[String], rejected: usize, max_file_bytes: u64) -> Vec<String> {
    let mut lines = Vec::new();
    if !names.is_empty() {
        lines.push("fichier selectionné:".to_string());
        for name in names {
            lines.push(format!("{}{}", indent(1), name));
        }
    }
    if rejected > 0 {
        let noun = if rejected == 1 { "file" } else { "files" };
        lines.push(format!(
            "{}({} {} skipped: not JPEG/PNG or larger than {})",
            indent(1),
            rejected,
            noun,
            format_size(max_file_bytes)
        ));
    }
    lines
}

// ============================================================================
// Progress events
// ============================================================================

/// Progress bar for a percentage; `None` when no bar should be shown.
pub fn format_progress(percent: u32) -> Option<String> {
    if percent == 0 || percent >= 100 {
        return None;
    }
    let filled = (percent * BAR_WIDTH / 100) as usize;
    Some(format!(
        "{}[{}{}] {}%",
        indent(1),
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH as usize - filled),
        percent
    ))
}

/// Lines for one progress event.
pub fn format_event(event: &IntakeEvent) -> Vec<String> {
    match event {
        IntakeEvent::Selected {
            names,
            rejected,
            max_file_bytes,
        } => format_selection(names, *rejected, *max_file_bytes),
        IntakeEvent::BatchStarted { count } => vec![format!("Compressing {} image(s)", count)],
        IntakeEvent::Decoded {
            name,
            width,
            height,
        } => vec![format!("{}{}: decoded {}x{}", indent(1), name, width, height)],
        IntakeEvent::Compressed {
            name,
            quality,
            size_bytes,
        } => vec![format!(
            "{}{}: {} at quality {}",
            indent(1),
            name,
            format_size(*size_bytes),
            quality
        )],
        IntakeEvent::BatchCompressed { count } => vec![format!("Compressed {} image(s)", count)],
        IntakeEvent::Uploaded { name, url } => {
            vec![format!("{}{} → {}", indent(1), name, url)]
        }
        IntakeEvent::UploadFailed { name, reason } => {
            vec![format!("{}{}: upload failed ({})", indent(1), name, reason)]
        }
    }
}

// ============================================================================
// Upload results
// ============================================================================

/// Uploaded images ordered by name, since completion order is arbitrary.
pub fn format_upload_results(results: &[UploadResult]) -> Vec<String> {
    if results.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<&UploadResult> = results.iter().collect();
    sorted.sort_by(|a, b| natural_key(&a.assigned_name).cmp(&natural_key(&b.assigned_name)));

    let mut lines = vec!["Uploaded".to_string()];
    for r in sorted {
        lines.push(format!("{}{} → {}", indent(1), r.assigned_name, r.url));
    }
    lines
}

/// Per-image outcomes, successes first.
pub fn format_outcomes(outcomes: &[ItemOutcome]) -> Vec<String> {
    let uploaded: Vec<UploadResult> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().cloned())
        .collect();
    let mut lines = format_upload_results(&uploaded);

    let failed: Vec<&ItemOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    if !failed.is_empty() {
        lines.push("Failed".to_string());
        for o in failed {
            if let Err(e) = &o.result {
                lines.push(format!("{}{}: {}", indent(1), o.assigned_name, e));
            }
        }
    }
    lines
}

/// Sort key putting `image-2.jpeg` before `image-10.jpeg`.
fn natural_key(name: &str) -> (Option<usize>, &str) {
    (crate::naming::parse_position(name), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{BackendError, CompressError};
    use crate::store::StoreError;

    #[test]
    fn size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(31_457_280), "30.0 MB");
    }

    #[test]
    fn no_existing_images_prints_nothing() {
        assert!(format_existing_count(0).is_empty());
    }

    #[test]
    fn existing_images_summary() {
        assert_eq!(
            format_existing_count(3),
            vec!["fichiers existants:", "    3 image(s) sauvegardées."]
        );
    }

    #[test]
    fn selection_lists_names_and_skips() {
        let names = vec!["image-3.jpeg".to_string(), "image-4.jpeg".to_string()];
        assert_eq!(
            format_selection(&names, 1, 31_457_280),
            vec![
                "fichier selectionné:",
                "    image-3.jpeg",
                "    image-4.jpeg",
                "    (1 file skipped: not JPEG/PNG or larger than 30.0 MB)",
            ]
        );
    }

    #[test]
    fn selected_event_prints_the_selection() {
        let lines = format_event(&IntakeEvent::Selected {
            names: Vec::new(),
            rejected: 2,
            max_file_bytes: 31_457_280,
        });
        assert_eq!(
            lines,
            vec!["    (2 files skipped: not JPEG/PNG or larger than 30.0 MB)"]
        );
    }

    #[test]
    fn progress_bar_hidden_at_bounds() {
        assert_eq!(format_progress(0), None);
        assert_eq!(format_progress(100), None);
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(
            format_progress(30).unwrap(),
            "    [######--------------] 30%"
        );
    }

    #[test]
    fn compressed_event_line() {
        let lines = format_event(&IntakeEvent::Compressed {
            name: "image-1.jpeg".into(),
            quality: 70,
            size_bytes: 2048,
        });
        assert_eq!(lines, vec!["    image-1.jpeg: 2.0 KB at quality 70"]);
    }

    #[test]
    fn upload_results_sorted_naturally() {
        let results = vec![
            UploadResult {
                assigned_name: "image-10.jpeg".into(),
                key: "images/image-10.jpeg".into(),
                url: "u10".into(),
            },
            UploadResult {
                assigned_name: "image-9.jpeg".into(),
                key: "images/image-9.jpeg".into(),
                url: "u9".into(),
            },
        ];
        assert_eq!(
            format_upload_results(&results),
            vec!["Uploaded", "    image-9.jpeg → u9", "    image-10.jpeg → u10"]
        );
    }

    #[test]
    fn outcomes_list_failures() {
        let outcomes = vec![
            ItemOutcome {
                assigned_name: "image-1.jpeg".into(),
                result: Ok(UploadResult {
                    assigned_name: "image-1.jpeg".into(),
                    key: "images/image-1.jpeg".into(),
                    url: "u1".into(),
                }),
            },
            ItemOutcome {
                assigned_name: "image-2.jpeg".into(),
                result: Err(UploadError::Put {
                    name: "image-2.jpeg".into(),
                    source: StoreError::AlreadyExists("images/image-2.jpeg".into()),
                }),
            },
        ];
        let lines = format_outcomes(&outcomes);
        assert_eq!(lines[0], "Uploaded");
        assert_eq!(lines[1], "    image-1.jpeg → u1");
        assert_eq!(lines[2], "Failed");
        assert!(lines[3].starts_with("    image-2.jpeg: Failed to store image-2.jpeg"));
    }

    #[test]
    fn capacity_message_names_limit() {
        let err = IntakeError::Selection(SelectionError::CapacityExceeded {
            existing: 8,
            requested: 3,
            limit: 10,
        });
        assert_eq!(
            user_message(&err),
            "You can only have up to 10 JPEG or PNG images in total, including already uploaded images."
        );
    }

    #[test]
    fn compression_and_upload_messages() {
        let compress = IntakeError::Compress(CompressError::Backend(BackendError::Decode(
            "x".into(),
        )));
        assert_eq!(
            user_message(&compress),
            "Error compressing images. Please try again later."
        );
        let list = IntakeError::Upload(UploadError::List(StoreError::Unavailable("x".into())));
        assert_eq!(
            user_message(&list),
            "Error fetching existing images. Please try again later."
        );
        let put = IntakeError::Upload(UploadError::Put {
            name: "image-1.jpeg".into(),
            source: StoreError::Unavailable("x".into()),
        });
        assert_eq!(
            user_message(&put),
            "Error uploading images. Please try again later."
        );
    }
}
