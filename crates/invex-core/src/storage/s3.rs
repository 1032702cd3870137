//! S3 blob store (AWS S3, MinIO and other compatible services).

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use crate::error::StorageError;
use crate::models::config::StorageConfig;

use super::{BlobStore, Result};

/// Blob store backed by one S3 bucket.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a client from the AWS environment (credentials chain,
    /// `AWS_REGION`, profiles), with optional region and endpoint overrides.
    pub async fn new(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            // Path-style addressing is required by MinIO.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::List {
                bucket: self.bucket.clone(),
                prefix: prefix.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );
        }

        debug!("Listed {} objects in s3://{}/{}", keys.len(), self.bucket, prefix);
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let reason = DisplayErrorContext(&e).to_string();
                if reason.contains("NoSuchKey") {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Fetch {
                        key: key.to_string(),
                        reason,
                    }
                }
            })?;

        let body = response.body.collect().await.map_err(|e| StorageError::Fetch {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        Ok(body.into_bytes().to_vec())
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        let upload_error = |reason: String| StorageError::Upload {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            reason,
        };

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| upload_error(DisplayErrorContext(&e).to_string()))?;

        debug!("Uploaded {} to s3://{}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
