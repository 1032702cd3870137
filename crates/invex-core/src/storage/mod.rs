//! Blob storage access.
//!
//! The pipeline reads source images from and writes its output to a
//! `BlobStore`. Two backends exist: S3 (and S3-compatible stores) for batch
//! runs, and a local directory for offline runs and tests.

mod images;
mod local;
#[cfg(feature = "s3")]
mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageError;

pub use images::{
    IMAGE_EXTENSIONS, ImageBatch, SkippedObject, SourceImage, is_image_key, load_images,
};
pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait abstracting over blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List object keys under `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Fetch the full contents of an object.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Upload a local file to `key`.
    async fn put_file(&self, key: &str, path: &Path) -> Result<()>;

    /// Human-readable location (bucket or directory) for logs.
    fn location(&self) -> String;
}
