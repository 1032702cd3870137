//! Error types for the invex-core library.

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// Object storage error (listing, fetching, uploading).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Structured extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Output serialization error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Inference error from the inference layer.
    #[error("inference error: {0}")]
    Inference(#[from] invex_inference::InferenceError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to blob storage.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Listing objects under a prefix failed. Fatal for a batch.
    #[error("failed to list {bucket}/{prefix}: {reason}")]
    List {
        bucket: String,
        prefix: String,
        reason: String,
    },

    /// Fetching a single object failed.
    #[error("failed to fetch {key}: {reason}")]
    Fetch { key: String, reason: String },

    /// An object is not a decodable image.
    #[error("failed to decode image {key}: {reason}")]
    ImageDecode { key: String, reason: String },

    /// Uploading the output failed. Fatal for a batch.
    #[error("failed to upload {key} to {bucket}: {reason}")]
    Upload {
        bucket: String,
        key: String,
        reason: String,
    },

    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to recovering records from model output.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A completion did not contain a parsable JSON object.
    #[error("invalid JSON in completion {index}: {reason}")]
    JsonParse { index: usize, reason: String },

    /// Records and identifiers cannot be paired by position.
    #[error("cannot link {records} records to {ids} identifiers")]
    LengthMismatch { records: usize, ids: usize },
}

/// Errors related to writing the output dataset.
#[derive(Error, Debug)]
pub enum SinkError {
    /// A record could not be serialized.
    #[error("failed to serialize record {index}: {reason}")]
    Serialize { index: usize, reason: String },

    /// Writing the staged file failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("cannot access config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for the config schema.
    #[error("invalid config file: {0}")]
    Parse(String),

    /// An environment variable holds an unparsable value.
    #[error("invalid value for {name}: {value}")]
    Env { name: String, value: String },

    /// A setting is outside its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    /// A required setting is missing.
    #[error("missing required setting: {0}")]
    Missing(String),
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
