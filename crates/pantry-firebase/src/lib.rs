//! Pantry Firebase - hosted backends for the pantry gateways
//!
//! - [`FirestoreDocumentStore`]: Firestore REST v1 behind
//!   [`pantry_core::DocumentStore`]
//! - [`FirebaseStorage`]: Firebase Storage REST v0 behind
//!   [`pantry_core::BlobStore`]
//!
//! Deadlines and cancellation are applied by the core's remote guard; the HTTP
//! client here only bounds connection setup.

#![warn(unreachable_pub)]

pub mod error;
pub mod firestore;
pub mod storage;
pub mod value;

pub use error::FirebaseError;
pub use firestore::FirestoreDocumentStore;
pub use storage::FirebaseStorage;

use pantry_core::PantryConfig;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Connection setup limit for the shared HTTP client
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Both hosted backends, sharing one HTTP client
#[derive(Debug, Clone)]
pub struct FirebaseBackend {
    /// Document store
    pub documents: Arc<FirestoreDocumentStore>,
    /// Blob store
    pub blobs: Arc<FirebaseStorage>,
}

impl FirebaseBackend {
    /// Build backends from validated configuration
    ///
    /// # Errors
    /// - `FirebaseError::Endpoint` if a base URL is invalid or the HTTP
    ///   client cannot be built
    pub fn connect(config: &PantryConfig) -> Result<Self, FirebaseError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("pantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FirebaseError::Endpoint(format!("http client: {e}")))?;

        let documents = FirestoreDocumentStore::new(client.clone(), &config.firebase)?;
        let blobs = FirebaseStorage::new(client, &config.firebase)?;
        info!(
            project = %config.firebase.project_id,
            bucket = %config.firebase.storage_bucket,
            "firebase backends ready"
        );
        Ok(Self {
            documents: Arc::new(documents),
            blobs: Arc::new(blobs),
        })
    }
}

pub(crate) fn endpoint(raw: &str) -> Result<Url, FirebaseError> {
    let url = Url::parse(raw).map_err(|e| FirebaseError::Endpoint(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(FirebaseError::Endpoint(format!("{raw} cannot be a base")));
    }
    Ok(url)
}

pub(crate) async fn send(operation: &str, request: RequestBuilder) -> Result<Response, FirebaseError> {
    let resp = request
        .send()
        .await
        .map_err(|e| FirebaseError::transport(operation, e))?;
    debug!(operation, status = resp.status().as_u16(), "response");
    Ok(resp)
}

/// Decode a success body, or turn an error status into `FirebaseError::Status`
pub(crate) async fn read_json<T: DeserializeOwned>(
    operation: &str,
    resp: Response,
) -> Result<T, FirebaseError> {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| FirebaseError::transport(operation, e))?;

    if !status.is_success() {
        return Err(FirebaseError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).trim().to_string(),
        });
    }
    serde_json::from_slice(&body).map_err(|e| FirebaseError::response(operation, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_with_defaults() {
        let backend = FirebaseBackend::connect(&PantryConfig::default()).unwrap();
        assert!(backend
            .documents
            .document_url("inventory", None)
            .unwrap()
            .as_str()
            .starts_with("https://firestore.googleapis.com/v1/projects/"));
    }

    #[test]
    fn rejects_non_base_endpoint() {
        assert!(matches!(
            endpoint("mailto:pantry@example.com"),
            Err(FirebaseError::Endpoint(_))
        ));
        assert!(endpoint("not a url").is_err());
    }
}
