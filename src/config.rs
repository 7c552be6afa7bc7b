//! Intake configuration module.
//!
//! Handles loading, validating, and merging `intake.toml`. Stock defaults are
//! the base layer; a user file overrides only the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [selection]
//! max_images = 10                  # Total images allowed, existing + new
//! max_file_bytes = 31457280        # Raw size cap per file (30 MiB)
//! accepted_types = ["image/jpeg", "image/png"]
//!
//! [compression]
//! max_size_bytes = 1048576         # Size budget per compressed image (1 MiB)
//! start_quality = 0.9              # First JPEG quality tried (0, 1]
//! quality_step = 0.1               # Decrement between attempts (0, 1)
//!
//! [storage]
//! root = ".listing-intake"         # Directory backing the object and document stores
//! image_prefix = "images/"         # Key prefix for uploaded images
//! public_base_url = ""             # Empty = file:// URLs
//! key_strategy = "positional"      # "positional" (image-N.jpeg) or "content" (sha256)
//!
//! [documents]
//! collection = "user_details"
//!
//! [form]
//! default_mobile = "+33766797364"
//!
//! [processing]
//! max_processes = 4                # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Intake configuration loaded from `intake.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    /// Selection gate limits (capacity ceiling, raw size cap, accepted types).
    pub selection: SelectionConfig,
    /// Adaptive JPEG compression settings.
    pub compression: CompressionConfig,
    /// Object store location and key layout.
    pub storage: StorageConfig,
    /// Document store settings.
    pub documents: DocumentsConfig,
    /// Contact form defaults.
    pub form: FormConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl IntakeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.selection.max_images == 0 {
            return Err(ConfigError::Validation(
                "selection.max_images must be at least 1".into(),
            ));
        }
        if self.selection.max_file_bytes == 0 {
            return Err(ConfigError::Validation(
                "selection.max_file_bytes must be non-zero".into(),
            ));
        }
        if self.selection.accepted_types.is_empty() {
            return Err(ConfigError::Validation(
                "selection.accepted_types must not be empty".into(),
            ));
        }
        if self.compression.max_size_bytes == 0 {
            return Err(ConfigError::Validation(
                "compression.max_size_bytes must be non-zero".into(),
            ));
        }
        let start = self.compression.start_quality;
        if !(start > 0.0 && start <= 1.0) {
            return Err(ConfigError::Validation(
                "compression.start_quality must be in (0, 1]".into(),
            ));
        }
        let step = self.compression.quality_step;
        if !(step > 0.0 && step < 1.0) {
            return Err(ConfigError::Validation(
                "compression.quality_step must be in (0, 1)".into(),
            ));
        }
        if self.storage.image_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "storage.image_prefix must not be empty".into(),
            ));
        }
        if self.documents.collection.is_empty() {
            return Err(ConfigError::Validation(
                "documents.collection must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Selection gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// Capacity ceiling: existing plus newly selected images.
    pub max_images: usize,
    /// Raw size cap per candidate file, in bytes.
    pub max_file_bytes: u64,
    /// Declared MIME types a candidate may carry.
    pub accepted_types: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_images: 10,
            max_file_bytes: 31_457_280,
            accepted_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        }
    }
}

/// Adaptive compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Maximum size of one compressed image, in bytes.
    pub max_size_bytes: u64,
    /// First quality tried, as a fraction in (0, 1].
    pub start_quality: f32,
    /// Amount subtracted from the quality after each over-budget attempt.
    pub quality_step: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 1024 * 1024,
            start_quality: 0.9,
            quality_step: 0.1,
        }
    }
}

/// How object keys are derived for uploaded images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// `{prefix}{assigned_name}`, e.g. `images/image-3.jpeg`.
    #[default]
    Positional,
    /// `{prefix}{sha256 prefix}.jpeg`, derived from the compressed bytes.
    Content,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root directory of the filesystem-backed stores.
    pub root: String,
    /// Key prefix under which images are stored and counted. A missing
    /// trailing `/` is added.
    pub image_prefix: String,
    /// Base URL prepended to keys. Empty means `file://` URLs.
    pub public_base_url: String,
    pub key_strategy: KeyStrategy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: ".listing-intake".to_string(),
            image_prefix: "images/".to_string(),
            public_base_url: String::new(),
            key_strategy: KeyStrategy::default(),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentsConfig {
    /// Collection the contact form is appended to.
    pub collection: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            collection: "user_details".to_string(),
        }
    }
}

/// Contact form settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormConfig {
    /// Fixed value of the read-only mobile field.
    pub default_mobile: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            default_mobile: "+33766797364".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression/upload workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, never below 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(IntakeConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<IntakeConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: IntakeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file yields the stock defaults; a present file is merged on top
/// of them, with unknown keys rejected.
pub fn load_config(path: &Path) -> Result<IntakeConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// File read when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "intake.toml";

/// Returns a fully-commented stock `intake.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Listing Intake Configuration
# ============================
# Read from intake.toml in the working directory unless --config names
# another file. All settings are optional. Remove or comment out any you
# don't need. Values shown below are the defaults. Unknown keys will cause
# an error.

# ---------------------------------------------------------------------------
# Image selection
# ---------------------------------------------------------------------------
[selection]
# Maximum number of images, counting those already uploaded.
max_images = 10

# Files larger than this (in bytes) are skipped at selection time.
max_file_bytes = 31457280

# Declared MIME types that are accepted.
accepted_types = ["image/jpeg", "image/png"]

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Each image is re-encoded as JPEG until it fits under this many bytes.
max_size_bytes = 1048576

# First JPEG quality tried, as a fraction (0 < q <= 1).
start_quality = 0.9

# Quality is lowered by this amount after every attempt that is too large.
quality_step = 0.1

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory holding uploaded objects and appended documents.
root = ".listing-intake"

# Prefix for image keys. The existing-image count is taken under it.
image_prefix = "images/"

# Base URL for uploaded images. Leave empty for file:// URLs.
public_base_url = ""

# "positional" stores image-N.jpeg; "content" stores <sha256>.jpeg so two
# sessions can never write the same key.
key_strategy = "positional"

# ---------------------------------------------------------------------------
# Documents
# ---------------------------------------------------------------------------
[documents]
collection = "user_details"

# ---------------------------------------------------------------------------
# Contact form
# ---------------------------------------------------------------------------
[form]
# Value of the read-only mobile field.
default_mobile = "+33766797364"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel compression/upload workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
