//! Firestore REST document store

use crate::error::FirebaseError;
use crate::value::{decode_fields, encode_fields};
use crate::{endpoint, read_json, send};
use async_trait::async_trait;
use pantry_core::{DocumentStore, Fields, FirebaseConfig, PantryError};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

/// Documents requested per listing page
pub const PAGE_SIZE: u32 = 300;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

/// [`DocumentStore`] backed by the Firestore REST API
#[derive(Debug, Clone)]
pub struct FirestoreDocumentStore {
    client: Client,
    base: Url,
    project_id: String,
    api_key: String,
}

impl FirestoreDocumentStore {
    /// Create store for the configured project
    ///
    /// # Errors
    /// - `FirebaseError::Endpoint` if the Firestore base URL does not parse
    pub fn new(client: Client, config: &FirebaseConfig) -> Result<Self, FirebaseError> {
        Ok(Self {
            client,
            base: endpoint(&config.firestore_url)?,
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// URL of a collection, or of one document when `key` is given
    ///
    /// # Errors
    /// - `FirebaseError::Endpoint` if the base URL cannot carry a path
    pub fn document_url(&self, collection: &str, key: Option<&str>) -> Result<Url, FirebaseError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| FirebaseError::Endpoint(format!("{} cannot be a base", self.base)))?;
            segments.pop_if_empty().extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                collection,
            ]);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        if !self.api_key.is_empty() {
            url.query_pairs_mut().append_pair("key", &self.api_key);
        }
        Ok(url)
    }

    async fn list_page(
        &self,
        collection: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, FirebaseError> {
        let op = format!("list {collection}");
        let mut url = self.document_url(collection, None)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &PAGE_SIZE.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        let resp = send(&op, self.client.get(url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(ListPage::default());
        }
        read_json(&op, resp).await
    }
}

/// Document ID: the last segment of the full resource name
fn document_key(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    #[instrument(skip(self))]
    async fn list(&self, collection: &str) -> Result<Vec<(String, Fields)>, PantryError> {
        let mut docs = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(collection, token.as_deref()).await?;
            debug!(count = page.documents.len(), "fetched page");
            for doc in page.documents {
                let key = document_key(&doc.name);
                match decode_fields(&doc.fields) {
                    Ok(fields) => docs.push((key.to_string(), fields)),
                    Err(e) => warn!(key, error = %e, "skipping undecodable document"),
                }
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(docs)
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>, PantryError> {
        let op = format!("get {collection}/{key}");
        let url = self.document_url(collection, Some(key))?;
        let resp = send(&op, self.client.get(url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: Document = read_json(&op, resp).await?;
        Ok(Some(decode_fields(&doc.fields)?))
    }

    #[instrument(skip(self, fields))]
    async fn set(&self, collection: &str, key: &str, fields: Fields) -> Result<(), PantryError> {
        let op = format!("set {collection}/{key}");
        let url = self.document_url(collection, Some(key))?;
        let body = json!({ "fields": encode_fields(&fields) });
        let resp = send(&op, self.client.patch(url).json(&body)).await?;
        let _: Document = read_json(&op, resp).await?;
        Ok(())
    }

    #[instrument(skip(self, fields))]
    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Fields,
    ) -> Result<(), PantryError> {
        let op = format!("update {collection}/{key}");
        let mut url = self.document_url(collection, Some(key))?;
        {
            let mut query = url.query_pairs_mut();
            for field in fields.keys() {
                query.append_pair("updateMask.fieldPaths", field);
            }
            query.append_pair("currentDocument.exists", "true");
        }
        let body = json!({ "fields": encode_fields(&fields) });
        let resp = send(&op, self.client.patch(url).json(&body)).await?;
        let _: Document = read_json(&op, resp).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, key: &str) -> Result<(), PantryError> {
        let op = format!("delete {collection}/{key}");
        let url = self.document_url(collection, Some(key))?;
        let resp = send(&op, self.client.delete(url)).await?;
        let _: Value = read_json(&op, resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(api_key: &str) -> FirestoreDocumentStore {
        let config = FirebaseConfig {
            project_id: "head-starter".to_string(),
            api_key: api_key.to_string(),
            ..FirebaseConfig::default()
        };
        FirestoreDocumentStore::new(Client::new(), &config).unwrap()
    }

    #[test]
    fn document_url_layout() {
        let url = store("k3y").document_url("inventory", Some("Milk")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/head-starter/databases/(default)/documents/inventory/Milk?key=k3y"
        );
    }

    #[test]
    fn document_keys_are_escaped() {
        let url = store("").document_url("inventory", Some("Meat & Poultry?")).unwrap();
        assert!(url.path().ends_with("/inventory/Meat%20&%20Poultry%3F"));
        assert_eq!(url.query(), None);
    }

    #[test]
    fn key_from_resource_name() {
        assert_eq!(
            document_key("projects/p/databases/(default)/documents/inventory/Milk"),
            "Milk"
        );
    }
}
