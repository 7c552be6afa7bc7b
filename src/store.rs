//! Storage collaborators: an object store for images and a document store for
//! the contact form.
//!
//! The rest of the crate only sees the [`ObjectStore`] and [`DocumentStore`]
//! traits. The filesystem implementations here back the CLI and the
//! integration tests; a hosted service would implement the same traits.
//!
//! ## Layout on disk
//!
//! ```text
//! <root>/
//! ├── images/
//! │   ├── image-1.jpeg           # object key "images/image-1.jpeg"
//! │   └── image-2.jpeg
//! └── collections/
//!     └── user_details.jsonl     # one JSON document per line
//! ```
//!
//! ## Guarantees
//!
//! - `put` never overwrites: writing an existing key fails with
//!   [`StoreError::AlreadyExists`]. Two sessions racing on the same positional
//!   name cannot silently clobber each other.
//! - `put` and `url_for` are separate steps; the object stays stored even if
//!   resolving its URL later fails.
//! - `list_keys` lists the objects directly under a prefix directory, not
//!   nested ones.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Object already exists: {0}")]
    AlreadyExists(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid key or collection name: {0:?}")]
    InvalidName(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Handle to a stored object, returned by [`ObjectStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: u64,
    pub content_type: String,
}

/// A form document: field name → value.
pub type Document = BTreeMap<String, String>;

/// Blob storage addressed by string keys.
pub trait ObjectStore: Sync {
    /// Store `bytes` under `key`.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject, StoreError>;

    /// Public URL of a stored object.
    fn url_for(&self, object: &StoredObject) -> Result<String, StoreError>;

    /// Keys of the objects directly under `prefix`, sorted.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Append-only document collections.
pub trait DocumentStore {
    /// Append `document` to `collection`, returning the new document's id.
    fn append(&self, collection: &str, document: &Document) -> Result<String, StoreError>;
}

/// Reject keys that could escape the store root.
fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "..");
    if bad {
        return Err(StoreError::InvalidName(key.to_string()));
    }
    Ok(())
}

// =============================================================================
// Filesystem object store
// =============================================================================

/// Object store backed by a directory tree.
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsObjectStore {
    /// Objects live under `root`. URLs are `{public_base_url}/{key}` when a
    /// base URL is given, `file://` URLs otherwise.
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.filter(|u| !u.is_empty()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |p, part| p.join(part))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject, StoreError> {
        check_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(StoredObject {
            key: key.to_string(),
            size_bytes: bytes.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    fn url_for(&self, object: &StoredObject) -> Result<String, StoreError> {
        check_key(&object.key)?;
        let path = self.path_for(&object.key);
        if !path.is_file() {
            return Err(StoreError::NotFound(object.key.clone()));
        }
        match &self.public_base_url {
            Some(base) => Ok(format!("{}/{}", base.trim_end_matches('/'), object.key)),
            None => {
                let absolute = fs::canonicalize(&path)?;
                Ok(format!("file://{}", absolute.display()))
            }
        }
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir_key = prefix.trim_end_matches('/');
        check_key(dir_key)?;
        let dir = self.path_for(dir_key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            keys.push(format!("{dir_key}/{name}"));
        }
        Ok(keys)
    }
}

// =============================================================================
// Filesystem document store
// =============================================================================

/// A document as persisted, with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Document,
}

/// Length of generated document ids (hex characters).
const DOCUMENT_ID_LEN: usize = 20;

/// Document store writing one JSON line per document to
/// `<root>/collections/<collection>.jsonl`.
pub struct FsDocumentStore {
    root: PathBuf,
    /// Serializes appends from this process so lines never interleave.
    write_lock: Mutex<()>,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, StoreError> {
        if collection.is_empty() || collection.contains(['/', '\\', '.']) {
            return Err(StoreError::InvalidName(collection.to_string()));
        }
        Ok(self
            .root
            .join("collections")
            .join(format!("{collection}.jsonl")))
    }

    /// All documents of a collection in append order. Missing collection = empty.
    pub fn read_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let path = self.collection_path(collection)?;
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut docs = Vec::new();
        for line in io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            docs.push(serde_json::from_str(&line)?);
        }
        Ok(docs)
    }
}

/// Document id: SHA-256 over collection, time, and content, truncated.
fn document_id(collection: &str, line: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update(b"\0");
    hasher.update(nanos.to_le_bytes());
    hasher.update(line.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..DOCUMENT_ID_LEN].to_string()
}

impl DocumentStore for FsDocumentStore {
    fn append(&self, collection: &str, document: &Document) -> Result<String, StoreError> {
        let path = self.collection_path(collection)?;
        let fields_json = serde_json::to_string(document)?;
        let stored = StoredDocument {
            id: document_id(collection, &fields_json),
            fields: document.clone(),
        };
        let line = serde_json::to_string(&stored)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("document store lock poisoned".into()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;
        Ok(stored.id)
    }
}
