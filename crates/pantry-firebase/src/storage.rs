//! Firebase Storage REST blob store

use crate::error::FirebaseError;
use crate::{endpoint, read_json, send};
use async_trait::async_trait;
use pantry_core::{BlobStore, FirebaseConfig, ImageBlob, PantryError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{instrument, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

/// [`BlobStore`] backed by the Firebase Storage REST API
#[derive(Debug, Clone)]
pub struct FirebaseStorage {
    client: Client,
    base: Url,
    bucket: String,
}

impl FirebaseStorage {
    /// Create store for the configured bucket
    ///
    /// # Errors
    /// - `FirebaseError::Endpoint` if the storage base URL does not parse
    pub fn new(client: Client, config: &FirebaseConfig) -> Result<Self, FirebaseError> {
        Ok(Self {
            client,
            base: endpoint(&config.storage_url)?,
            bucket: config.storage_bucket.clone(),
        })
    }

    /// Bucket objects endpoint, or one object when `path` is given
    ///
    /// The object path is a single URL segment, so its slashes are escaped.
    ///
    /// # Errors
    /// - `FirebaseError::Endpoint` if the base URL cannot carry a path
    pub fn object_url(&self, path: Option<&str>) -> Result<Url, FirebaseError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| FirebaseError::Endpoint(format!("{} cannot be a base", self.base)))?;
            segments
                .pop_if_empty()
                .extend(["b", self.bucket.as_str(), "o"]);
            if let Some(path) = path {
                segments.push(path);
            }
        }
        Ok(url)
    }

    /// Public download URL for an object
    ///
    /// # Errors
    /// - `FirebaseError::Endpoint` if the base URL cannot carry a path
    pub fn download_url(&self, path: &str, token: Option<&str>) -> Result<Url, FirebaseError> {
        let mut url = self.object_url(Some(path))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for FirebaseStorage {
    #[instrument(skip(self, blob), fields(bytes = blob.len()))]
    async fn put(&self, path: &str, blob: ImageBlob) -> Result<(), PantryError> {
        let op = format!("upload {path}");
        let mut url = self.object_url(None)?;
        url.query_pairs_mut().append_pair("name", path);

        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, blob.content_type.as_str())
            .body(blob.bytes);
        let resp = send(&op, request).await?;
        let meta: ObjectMetadata = read_json(&op, resp).await?;
        if meta.name != path {
            return Err(FirebaseError::response(
                &op,
                format!("stored as {:?}, expected {path:?}", meta.name),
            )
            .into());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn url(&self, path: &str) -> Result<String, PantryError> {
        let op = format!("resolve {path}");
        let resp = send(&op, self.client.get(self.object_url(Some(path))?)).await?;
        let meta: ObjectMetadata = read_json(&op, resp).await?;

        let token = meta
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()));
        if token.is_none() {
            warn!(%path, "object has no download token, URL needs public read access");
        }
        Ok(self.download_url(path, token)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> FirebaseStorage {
        let config = FirebaseConfig {
            storage_bucket: "head-starter.appspot.com".to_string(),
            ..FirebaseConfig::default()
        };
        FirebaseStorage::new(Client::new(), &config).unwrap()
    }

    #[test]
    fn object_path_is_one_segment() {
        let url = storage().object_url(Some("images/Milk")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/head-starter.appspot.com/o/images%2FMilk"
        );
    }

    #[test]
    fn download_url_carries_token() {
        let url = storage().download_url("images/Milk", Some("abc-123")).unwrap();
        assert_eq!(url.query(), Some("alt=media&token=abc-123"));
    }
}
