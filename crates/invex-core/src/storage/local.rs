//! Filesystem-backed blob store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

use super::{BlobStore, Result};

/// Blob store rooted at a local directory. Keys are `/`-separated paths
/// relative to the root.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root, rejecting keys that escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let list_error = |e: std::io::Error| StorageError::List {
            bucket: self.root.display().to_string(),
            prefix: prefix.to_string(),
            reason: e.to_string(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(list_error)?;
            while let Some(entry) = entries.next_entry().await.map_err(list_error)? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(list_error)?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        debug!("Listed {} objects under {}", keys.len(), prefix);
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Fetch {
                key: key.to_string(),
                reason: e.to_string(),
            },
        })
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        let upload_error = |reason: String| StorageError::Upload {
            bucket: self.root.display().to_string(),
            key: key.to_string(),
            reason,
        };

        let target = self.path_for(key).map_err(|e| upload_error(e.to_string()))?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_error(e.to_string()))?;
        }
        tokio::fs::copy(path, &target)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        debug!("Copied {} to {}", path.display(), target.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images/sub")).unwrap();
        std::fs::write(dir.path().join("images/b.png"), b"b").unwrap();
        std::fs::write(dir.path().join("images/a.png"), b"a").unwrap();
        std::fs::write(dir.path().join("images/sub/c.jpg"), b"c").unwrap();
        std::fs::write(dir.path().join("other.txt"), b"x").unwrap();

        let store = LocalStore::new(dir.path());
        let keys = store.list("images/").await.unwrap();

        assert_eq!(keys, vec!["images/a.png", "images/b.png", "images/sub/c.jpg"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("missing"));
        assert!(matches!(
            store.list("").await,
            Err(StorageError::List { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_and_put() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let staged = dir.path().join("staged.jsonl");
        std::fs::write(&staged, b"{}\n").unwrap();
        store.put_file("out/data.jsonl", &staged).await.unwrap();

        assert_eq!(store.get("out/data.jsonl").await.unwrap(), b"{}\n");
        assert!(matches!(
            store.get("out/missing.jsonl").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.get("../etc/passwd").await.is_err());

        let staged = dir.path().join("staged.jsonl");
        std::fs::write(&staged, b"{}\n").unwrap();
        assert!(matches!(
            store.put_file("/abs/data.jsonl", &staged).await,
            Err(StorageError::Upload { .. })
        ));
    }
}
