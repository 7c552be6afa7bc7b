//! # Listing Intake
//!
//! Image and contact-detail intake for a holiday-rental listing. A host picks
//! up to ten photos, which are re-encoded as JPEG under a size budget and
//! stored under positional names, then fills in a contact form that is saved
//! as one document.
//!
//! # Architecture: Gate, Compress, Upload
//!
//! ```text
//! 1. Gate      candidates  →  pending images   (filter, capacity, naming)
//! 2. Compress  pending     →  compressed JPEG  (quality steps until it fits)
//! 3. Upload    compressed  →  keys + URLs      (parallel, all or nothing)
//! ```
//!
//! Each stage is a plain function over owned data. Storage sits behind the
//! [`store::ObjectStore`] and [`store::DocumentStore`] traits and image codecs
//! behind [`imaging::ImageBackend`], so the stages are tested with in-memory
//! stand-ins and no real encoding.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`selection`] | Size/type filter, ten-image ceiling, name assignment |
//! | [`imaging`] | Decode and JPEG re-encode behind a backend trait; the compression loop |
//! | [`upload`] | Parallel compression and upload batches, progress events |
//! | [`session`] | One intake session tying the stages together, with user-facing status |
//! | [`form`] | Contact form validation, submission and reset |
//! | [`store`] | Object and document store traits with filesystem implementations |
//! | [`naming`] | `image-N.jpeg` names and parsing them back |
//! | [`config`] | `intake.toml` loading, stock defaults, validation |
//! | [`types`] | Image shapes passed between stages |
//! | [`output`] | CLI output formatting and user-facing messages |
//!
//! # Design Decisions
//!
//! ## JPEG-Only Output
//!
//! Every stored image is JPEG whatever was selected. PNG re-encoding ignores a
//! quality setting, so a PNG could never be brought under the budget by
//! lowering quality.
//!
//! ## Positional Names
//!
//! New images are named from the stored count: with two stored, the next two
//! are `image-3.jpeg` and `image-4.jpeg`. The count is a point-in-time read, so
//! two concurrent sessions can pick the same names. The filesystem store
//! refuses to overwrite an existing key, and `key_strategy = "content"` derives
//! keys from the compressed bytes instead.
//!
//! ## Bounded Compression
//!
//! Quality steps down from the start value by a fixed step and stops at the
//! first encoding under the budget. If none fits, compression fails and
//! reports the smallest size reached rather than looping forever.

pub mod config;
pub mod form;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod selection;
pub mod session;
pub mod store;
pub mod types;
pub mod upload;
