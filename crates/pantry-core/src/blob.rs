//! Blob upload gateway
//!
//! Item images live in an object store under `<prefix><item name>`. Uploading
//! again for the same name replaces the object.

use crate::error::{PantryError, RemoteError};
use crate::remote::RemoteGuard;
use crate::types::{ImageBlob, ItemName};
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// Remote object store keyed by path
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes at a path, replacing any existing object
    async fn put(&self, path: &str, blob: ImageBlob) -> Result<(), PantryError>;

    /// Retrievable URL for a stored object
    async fn url(&self, path: &str) -> Result<String, PantryError>;
}

/// In-process blob store
#[derive(Debug, Clone)]
pub struct MemoryBlobStore {
    bucket: String,
    objects: Arc<DashMap<String, ImageBlob>>,
}

impl MemoryBlobStore {
    /// Create empty store for a bucket name
    #[inline]
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(DashMap::new()),
        }
    }

    /// Stored object, if any
    #[must_use]
    pub fn object(&self, path: &str) -> Option<ImageBlob> {
        self.objects.get(path).map(|entry| entry.value().clone())
    }

    /// Number of stored objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("pantry")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, blob: ImageBlob) -> Result<(), PantryError> {
        self.objects.insert(path.to_string(), blob);
        Ok(())
    }

    async fn url(&self, path: &str) -> Result<String, PantryError> {
        if self.objects.contains_key(path) {
            Ok(format!("memory://{}/{path}", self.bucket))
        } else {
            Err(RemoteError::new(format!("url {path}"), "object not found")
                .with_status(404)
                .into())
        }
    }
}

/// Uploads item images and resolves their URLs
#[derive(Clone)]
pub struct ImageUploader {
    blobs: Arc<dyn BlobStore>,
    prefix: String,
    guard: RemoteGuard,
}

impl fmt::Debug for ImageUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUploader")
            .field("prefix", &self.prefix)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl ImageUploader {
    /// Create uploader writing under `prefix`
    #[inline]
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, prefix: impl Into<String>) -> Self {
        Self {
            blobs,
            prefix: prefix.into(),
            guard: RemoteGuard::default(),
        }
    }

    /// With remote guard
    #[inline]
    #[must_use]
    pub fn with_guard(mut self, guard: RemoteGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Object path for an item's image
    #[inline]
    #[must_use]
    pub fn path_for(&self, name: &ItemName) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Upload an item's image and return its URL
    ///
    /// # Errors
    /// - remote, timeout and cancellation errors from the backend
    #[instrument(skip(self, blob), fields(bytes = blob.len(), content_type = %blob.content_type))]
    pub async fn upload(&self, name: &ItemName, blob: ImageBlob) -> Result<String, PantryError> {
        let path = self.path_for(name);
        self.guard
            .run(&format!("upload {path}"), self.blobs.put(&path, blob))
            .await?;
        let url = self
            .guard
            .run(&format!("resolve {path}"), self.blobs.url(&path))
            .await?;
        info!(%path, "image uploaded");
        Ok(url)
    }
}
