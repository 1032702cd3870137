//! Loading source images from a blob store.

use invex_inference::ImageInput;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::StorageError;

use super::{BlobStore, Result};

/// Extensions accepted as invoice images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

/// Whether a key names an image file rather than a directory marker or
/// another file type.
pub fn is_image_key(key: &str) -> bool {
    if key.ends_with('/') {
        return false;
    }
    let lower = key.to_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// One decoded-and-verified source image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Storage key, used as the record identifier.
    pub id: String,

    /// Original encoded bytes.
    pub bytes: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Detected container format, e.g. `Png`.
    pub format: Option<String>,
}

/// An object left out of the batch, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedObject {
    pub key: String,
    pub reason: String,
}

/// Ordered images of one batch.
#[derive(Debug, Clone, Default)]
pub struct ImageBatch {
    /// Images in listing order.
    pub images: Vec<SourceImage>,

    /// Number of keys returned by the listing.
    pub listed: usize,

    /// Keys that were not loaded.
    pub skipped: Vec<SkippedObject>,
}

impl ImageBatch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Identifiers in batch order.
    pub fn ids(&self) -> Vec<String> {
        self.images.iter().map(|img| img.id.clone()).collect()
    }

    /// Split into identifiers and inference inputs, positions aligned.
    pub fn into_parts(self) -> (Vec<String>, Vec<ImageInput>) {
        self.images
            .into_iter()
            .map(|img| (img.id, ImageInput::new(img.bytes)))
            .unzip()
    }
}

/// Decode `bytes` fully to make sure they hold a valid image.
fn verify_image(key: &str, bytes: Vec<u8>) -> std::result::Result<SourceImage, StorageError> {
    let format = image::guess_format(&bytes).ok().map(|f| format!("{:?}", f));
    let decoded = image::load_from_memory(&bytes).map_err(|e| StorageError::ImageDecode {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    Ok(SourceImage {
        id: key.to_string(),
        width: decoded.width(),
        height: decoded.height(),
        format,
        bytes,
    })
}

/// List `prefix` and load every image under it, in listing order.
///
/// Only a failing listing is an error. Directory markers, non-image keys,
/// objects that cannot be fetched and bytes that do not decode are logged
/// and skipped.
pub async fn load_images(store: &dyn BlobStore, prefix: &str) -> Result<ImageBatch> {
    let keys = store.list(prefix).await.inspect_err(|e| {
        error!("Issue when listing images from {}: {}", store.location(), e);
    })?;

    if keys.is_empty() {
        warn!("No objects found in {} with prefix {}", store.location(), prefix);
    }

    let mut batch = ImageBatch {
        listed: keys.len(),
        ..ImageBatch::default()
    };

    for key in keys {
        if !is_image_key(&key) {
            info!("Skipping non-image file: {}", key);
            batch.skipped.push(SkippedObject {
                key,
                reason: "not an image file".to_string(),
            });
            continue;
        }

        info!("Attempting to load image: {}", key);
        let loaded = match store.get(&key).await {
            Ok(bytes) => verify_image(&key, bytes),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(image) => {
                info!(
                    "Loaded image: {}, size: {}x{}, format: {}",
                    key,
                    image.width,
                    image.height,
                    image.format.as_deref().unwrap_or("unknown")
                );
                batch.images.push(image);
            }
            Err(e) => {
                error!("Failed to load image {}: {}", key, e);
                batch.skipped.push(SkippedObject {
                    key,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Loaded {} images out of {} files",
        batch.images.len(),
        batch.listed
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_is_image_key() {
        assert!(is_image_key("images/invoice.JPG"));
        assert!(is_image_key("images/scan.tiff"));
        assert!(is_image_key("a.jpeg"));
        assert!(!is_image_key("images/"));
        assert!(!is_image_key("images/notes.txt"));
        assert!(!is_image_key("images/scan.tif"));
        assert!(!is_image_key("images/png"));
    }

    #[tokio::test]
    async fn test_load_images_skips_bad_objects() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("a.png"), png_bytes()).unwrap();
        std::fs::write(images.join("b.jpg"), b"not really a jpeg").unwrap();
        std::fs::write(images.join("c.txt"), b"notes").unwrap();
        std::fs::write(images.join("d.PNG"), png_bytes()).unwrap();

        let store = LocalStore::new(dir.path());
        let batch = load_images(&store, "images/").await.unwrap();

        assert_eq!(batch.listed, 4);
        assert_eq!(batch.ids(), vec!["images/a.png", "images/d.PNG"]);
        assert_eq!(batch.images[0].width, 4);
        assert_eq!(batch.images[0].height, 3);
        assert_eq!(batch.images[0].format.as_deref(), Some("Png"));

        let skipped: Vec<&str> = batch.skipped.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(skipped, vec!["images/b.jpg", "images/c.txt"]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("missing"));
        assert!(matches!(
            load_images(&store, "").await,
            Err(StorageError::List { .. })
        ));
    }

    #[tokio::test]
    async fn test_into_parts_keeps_alignment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.png"), png_bytes()).unwrap();
        std::fs::write(dir.path().join("y.png"), png_bytes()).unwrap();

        let batch = load_images(&LocalStore::new(dir.path()), "").await.unwrap();
        let (ids, inputs) = batch.into_parts();
        assert_eq!(ids, vec!["x.png", "y.png"]);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].bytes(), png_bytes().as_slice());
    }
}
