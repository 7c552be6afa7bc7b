//! One image-intake session: existing count, current selection, compressed
//! images, upload results and the status line shown to the user.
//!
//! ## Flow
//!
//! ```text
//! mount ──► choose_files ──► upload
//!   ▲            │              │
//!   └── reset_selection ◄───────┘
//! ```
//!
//! - [`IntakeSession::mount`] reads how many images are already stored.
//! - [`IntakeSession::choose_files`] runs the selection gate against that
//!   count and compresses what it admits. A new choice replaces the previous
//!   one.
//! - [`IntakeSession::upload`] stores the compressed images, all or nothing.
//!
//! Every failure is returned as an [`IntakeError`] and also recorded as the
//! session's [`status`](IntakeSession::status) message. The session never
//! panics on a bad file or an unavailable store.

use crate::config::IntakeConfig;
use crate::imaging::{CompressError, CompressionParams, ImageBackend};
use crate::output;
use crate::selection::{self, SelectionError, SelectionPolicy};
use crate::store::ObjectStore;
use crate::types::{CandidateFile, CompressedImage, UploadResult};
use crate::upload::{self, IntakeEvent, ItemOutcome, UploadError, Uploader};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Compress(#[from] CompressError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

pub struct IntakeSession<'a, B: ImageBackend, S: ObjectStore> {
    backend: &'a B,
    uploader: Uploader<'a, S>,
    policy: SelectionPolicy,
    params: CompressionParams,
    events: Option<Sender<IntakeEvent>>,
    existing_count: usize,
    file_names: Vec<String>,
    rejected_count: usize,
    images: Vec<CompressedImage>,
    results: Vec<UploadResult>,
    status: Option<String>,
}

impl<'a, B: ImageBackend, S: ObjectStore> IntakeSession<'a, B, S> {
    pub fn new(backend: &'a B, store: &'a S, config: &IntakeConfig) -> Result<Self, CompressError> {
        Ok(Self {
            backend,
            uploader: Uploader::from_config(store, &config.storage),
            policy: SelectionPolicy::from_config(&config.selection),
            params: CompressionParams::from_config(&config.compression)?,
            events: None,
            existing_count: 0,
            file_names: Vec::new(),
            rejected_count: 0,
            images: Vec::new(),
            results: Vec::new(),
            status: None,
        })
    }

    /// Send progress events to `events` from now on.
    pub fn with_events(mut self, events: Sender<IntakeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn existing_count(&self) -> usize {
        self.existing_count
    }

    /// Names assigned to the current selection, in submission order.
    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    /// Candidates the last choice dropped for size or type.
    pub fn rejected_count(&self) -> usize {
        self.rejected_count
    }

    pub fn images(&self) -> &[CompressedImage] {
        &self.images
    }

    pub fn results(&self) -> &[UploadResult] {
        &self.results
    }

    /// Message for the last failure, if the last operation failed.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    fn fail(&mut self, err: impl Into<IntakeError>) -> IntakeError {
        let err = err.into();
        self.status = Some(output::user_message(&err));
        err
    }

    /// Read the existing-image count from storage.
    ///
    /// On failure the previous count is kept.
    pub fn mount(&mut self) -> Result<usize, IntakeError> {
        match self.uploader.refresh_existing_count() {
            Ok(count) => {
                self.existing_count = count;
                self.status = None;
                debug!(count, "existing images");
                Ok(count)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Forget the current selection and results, then re-read the count.
    pub fn reset_selection(&mut self) -> Result<usize, IntakeError> {
        self.file_names.clear();
        self.rejected_count = 0;
        self.images.clear();
        self.results.clear();
        self.status = None;
        self.mount()
    }

    /// Gate `candidates` against the current count and compress the ones
    /// admitted.
    ///
    /// Returns the number of compressed images ready to upload. When the gate
    /// refuses the selection nothing is compressed and the previous selection
    /// is cleared. When compression fails the assigned names are kept but no
    /// images are ready.
    pub fn choose_files(&mut self, candidates: Vec<CandidateFile>) -> Result<usize, IntakeError> {
        self.file_names.clear();
        self.rejected_count = 0;
        self.images.clear();
        self.results.clear();
        self.status = None;

        let selection = match selection::select(candidates, self.existing_count, &self.policy) {
            Ok(selection) => selection,
            Err(e) => return Err(self.fail(e)),
        };
        self.rejected_count = selection.rejected_count;
        self.file_names = selection
            .accepted
            .iter()
            .map(|img| img.assigned_name.clone())
            .collect();
        upload::emit(
            self.events.as_ref(),
            IntakeEvent::Selected {
                names: self.file_names.clone(),
                rejected: self.rejected_count,
                max_file_bytes: self.policy.max_file_bytes,
            },
        );
        if selection.accepted.is_empty() {
            return Ok(0);
        }

        match upload::compress_batch(
            self.backend,
            &selection.accepted,
            &self.params,
            self.events.as_ref(),
        ) {
            Ok(images) => {
                info!(count = images.len(), "selection compressed");
                self.images = images;
                Ok(self.images.len())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Upload every compressed image; all must succeed.
    ///
    /// With nothing selected this does nothing. After a successful upload the
    /// stored count is re-read.
    pub fn upload(&mut self) -> Result<&[UploadResult], IntakeError> {
        if self.images.is_empty() {
            return Ok(&self.results);
        }
        self.status = None;
        match self.uploader.upload(&self.images, self.events.as_ref()) {
            Ok(results) => {
                self.results = results;
                self.refresh_after_upload();
                Ok(&self.results)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Upload every compressed image, keeping the ones that succeed.
    pub fn upload_each(&mut self) -> Vec<ItemOutcome> {
        if self.images.is_empty() {
            return Vec::new();
        }
        self.status = None;
        let outcomes = self.uploader.upload_each(&self.images, self.events.as_ref());
        self.results = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect();
        if let Some(err) = outcomes.iter().find_map(|o| o.result.as_ref().err()) {
            self.status = Some(output::upload_message(err).to_string());
        }
        self.refresh_after_upload();
        outcomes
    }

    /// Re-read the stored count. If listing fails, count what this session
    /// just stored so the next choice does not reuse those names.
    fn refresh_after_upload(&mut self) {
        match self.uploader.refresh_existing_count() {
            Ok(count) => self.existing_count = count,
            Err(e) => {
                warn!(error = %e, "recount after upload failed");
                self.existing_count += self.results.len();
            }
        }
    }
}
