//! Upload orchestration: compress a selection in parallel, store it, and
//! resolve public URLs.
//!
//! ## Batches
//!
//! Both compression and upload run one independent job per image on the
//! rayon pool. Each job writes only its own result slot; the slots are
//! combined after every job has finished, so no state is shared between jobs.
//! Slots are in submission order, but callers should still match results to
//! images by `assigned_name`.
//!
//! ## Failure semantics
//!
//! - [`compress_batch`] and [`Uploader::upload`] are all-or-nothing: one
//!   failing image fails the batch and the first error (in submission order)
//!   is returned. Other jobs are not cancelled, and images already stored are
//!   not deleted.
//! - [`Uploader::upload_each`] reports an outcome per image instead, for
//!   callers that want to keep the images that did upload.
//!
//! Nothing is retried.
//!
//! ## Progress
//!
//! Jobs report [`IntakeEvent`]s over an optional channel. [`ProgressTracker`]
//! folds them into a percentage for display.

use crate::config::{KeyStrategy, StorageConfig};
use crate::imaging::{CompressError, CompressionParams, ImageBackend, compress_raster};
use crate::naming;
use crate::store::{ObjectStore, StoreError, StoredObject};
use crate::types::{CompressedImage, PendingImage, UploadResult};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to store {name}: {source}")]
    Put { name: String, source: StoreError },
    #[error("Stored {name} but could not resolve its URL: {source}")]
    Url { name: String, source: StoreError },
    #[error("Failed to list existing images: {0}")]
    List(#[source] StoreError),
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeEvent {
    /// The selection gate assigned `names` and skipped `rejected` files.
    Selected {
        names: Vec<String>,
        rejected: usize,
        max_file_bytes: u64,
    },
    /// A compression batch of `count` images started.
    BatchStarted { count: usize },
    /// An image was decoded.
    Decoded {
        name: String,
        width: u32,
        height: u32,
    },
    /// An image fit the budget at `quality` (1–100).
    Compressed {
        name: String,
        quality: u8,
        size_bytes: u64,
    },
    /// Every image of the batch has been compressed.
    BatchCompressed { count: usize },
    /// An image was stored and its URL resolved.
    Uploaded { name: String, url: String },
    /// Storing an image or resolving its URL failed.
    UploadFailed { name: String, reason: String },
}

pub(crate) fn emit(events: Option<&Sender<IntakeEvent>>, event: IntakeEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching.
        let _ = tx.send(event);
    }
}

/// Compress every image of a selection under the budget, in parallel.
///
/// Returns compressed images in the same order as `images`, or the first
/// failure.
pub fn compress_batch<B: ImageBackend>(
    backend: &B,
    images: &[PendingImage],
    params: &CompressionParams,
    events: Option<&Sender<IntakeEvent>>,
) -> Result<Vec<CompressedImage>, CompressError> {
    emit(
        events,
        IntakeEvent::BatchStarted {
            count: images.len(),
        },
    );

    let compressed = images
        .par_iter()
        .map(|image| -> Result<CompressedImage, CompressError> {
            let raster = backend.decode(&image.source_bytes)?;
            let dims = backend.dimensions(&raster);
            emit(
                events,
                IntakeEvent::Decoded {
                    name: image.assigned_name.clone(),
                    width: dims.width,
                    height: dims.height,
                },
            );
            let out = compress_raster(backend, &raster, &image.assigned_name, params)?;
            emit(
                events,
                IntakeEvent::Compressed {
                    name: out.assigned_name.clone(),
                    quality: out.quality.jpeg_value(),
                    size_bytes: out.size_bytes,
                },
            );
            Ok(out)
        })
        .collect::<Result<Vec<_>, _>>()?;

    emit(
        events,
        IntakeEvent::BatchCompressed {
            count: compressed.len(),
        },
    );
    Ok(compressed)
}

/// Outcome of uploading one image with [`Uploader::upload_each`].
#[derive(Debug)]
pub struct ItemOutcome {
    pub assigned_name: String,
    pub result: Result<UploadResult, UploadError>,
}

/// Stores compressed images under a key prefix.
///
/// The prefix names a directory of the store and always ends in `/`, so
/// `images` and `images/` both give keys like `images/image-1.jpeg`.
pub struct Uploader<'a, S: ObjectStore> {
    store: &'a S,
    prefix: String,
    key_strategy: KeyStrategy,
}

impl<'a, S: ObjectStore> Uploader<'a, S> {
    pub fn new(store: &'a S, prefix: impl Into<String>, key_strategy: KeyStrategy) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            store,
            prefix,
            key_strategy,
        }
    }

    pub fn from_config(store: &'a S, config: &StorageConfig) -> Self {
        Self::new(store, config.image_prefix.clone(), config.key_strategy)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object key for an image.
    ///
    /// - positional: `images/image-3.jpeg`
    /// - content: `images/<first 16 hex chars of sha256(bytes)>.jpeg`
    pub fn key_for(&self, image: &CompressedImage) -> String {
        match self.key_strategy {
            KeyStrategy::Positional => format!("{}{}", self.prefix, image.assigned_name),
            KeyStrategy::Content => {
                let digest = format!("{:x}", Sha256::digest(&image.bytes));
                format!("{}{}.{}", self.prefix, &digest[..16], naming::EXTENSION)
            }
        }
    }

    /// Count the images currently stored under the prefix.
    ///
    /// A point-in-time read: another session may upload right after it.
    pub fn refresh_existing_count(&self) -> Result<usize, UploadError> {
        let keys = self.store.list_keys(&self.prefix).map_err(UploadError::List)?;
        let count = keys.len();
        let highest = keys.iter().filter_map(|k| naming::parse_position(k)).max();
        if let Some(highest) = highest
            && highest > count
        {
            warn!(
                count,
                highest, "stored positions have gaps; new positional names may collide"
            );
        }
        Ok(count)
    }

    /// Store one image. A content key that already exists holds these exact
    /// bytes, so it counts as stored.
    fn put(&self, key: &str, image: &CompressedImage) -> Result<StoredObject, StoreError> {
        match self.store.put(key, &image.bytes, &image.mime_type) {
            Err(StoreError::AlreadyExists(_)) if self.key_strategy == KeyStrategy::Content => {
                debug!(name = %image.assigned_name, %key, "identical image already stored");
                Ok(StoredObject {
                    key: key.to_string(),
                    size_bytes: image.size_bytes,
                    content_type: image.mime_type.clone(),
                })
            }
            other => other,
        }
    }

    fn upload_one(
        &self,
        image: &CompressedImage,
        events: Option<&Sender<IntakeEvent>>,
    ) -> Result<UploadResult, UploadError> {
        let key = self.key_for(image);
        let result = self
            .put(&key, image)
            .map_err(|source| UploadError::Put {
                name: image.assigned_name.clone(),
                source,
            })
            .and_then(|object| {
                self.store
                    .url_for(&object)
                    .map_err(|source| UploadError::Url {
                        name: image.assigned_name.clone(),
                        source,
                    })
            });

        match result {
            Ok(url) => {
                info!(name = %image.assigned_name, %key, "uploaded");
                emit(
                    events,
                    IntakeEvent::Uploaded {
                        name: image.assigned_name.clone(),
                        url: url.clone(),
                    },
                );
                Ok(UploadResult {
                    assigned_name: image.assigned_name.clone(),
                    key,
                    url,
                })
            }
            Err(e) => {
                warn!(name = %image.assigned_name, %key, error = %e, "upload failed");
                emit(
                    events,
                    IntakeEvent::UploadFailed {
                        name: image.assigned_name.clone(),
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Upload every image in parallel, reporting each outcome separately.
    pub fn upload_each(
        &self,
        images: &[CompressedImage],
        events: Option<&Sender<IntakeEvent>>,
    ) -> Vec<ItemOutcome> {
        images
            .par_iter()
            .map(|image| ItemOutcome {
                assigned_name: image.assigned_name.clone(),
                result: self.upload_one(image, events),
            })
            .collect()
    }

    /// Upload every image in parallel; all must succeed.
    ///
    /// On failure the first error (in submission order) is returned. Images
    /// that did upload stay in the store.
    pub fn upload(
        &self,
        images: &[CompressedImage],
        events: Option<&Sender<IntakeEvent>>,
    ) -> Result<Vec<UploadResult>, UploadError> {
        self.upload_each(images, events)
            .into_iter()
            .map(|outcome| outcome.result)
            .collect()
    }
}

/// Folds [`IntakeEvent`]s into a 0–100 progress value.
///
/// A batch starts at 10, each decode adds 20, each compression adds 40,
/// capped at 100; the end of compression resets to 0 (no bar shown).
#[derive(Debug, Default)]
pub struct ProgressTracker {
    percent: u32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u32 {
        self.percent
    }

    /// Update from one event and return the new value.
    pub fn observe(&mut self, event: &IntakeEvent) -> u32 {
        self.percent = match event {
            IntakeEvent::BatchStarted { count } if *count > 0 => 10,
            IntakeEvent::Decoded { .. } => (self.percent + 20).min(100),
            IntakeEvent::Compressed { .. } => (self.percent + 40).min(100),
            IntakeEvent::BatchCompressed { .. } => 0,
            _ => self.percent,
        };
        self.percent
    }

    /// Whether a progress bar should be visible.
    pub fn is_active(&self) -> bool {
        self.percent > 0 && self.percent < 100
    }
}
