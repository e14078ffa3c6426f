//! Inventory store gateway
//!
//! [`DocumentStore`] is the narrow view of a remote keyed collection; any
//! backend that can list, get, set, partially update and delete JSON objects
//! by key will do. [`InventoryStore`] maps pantry items onto it, one document
//! per item name.

use crate::error::{PantryError, RemoteError};
use crate::remote::RemoteGuard;
use crate::types::{InventoryItem, ItemDocument, ItemName, Quantity};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Document body
pub type Fields = Map<String, Value>;

/// Remote keyed collection of JSON documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in the collection, in server order
    async fn list(&self, collection: &str) -> Result<Vec<(String, Fields)>, PantryError>;

    /// One document, `None` when absent
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>, PantryError>;

    /// Create or fully overwrite a document
    async fn set(&self, collection: &str, key: &str, fields: Fields) -> Result<(), PantryError>;

    /// Overwrite only the given fields of an existing document
    async fn update(&self, collection: &str, key: &str, fields: Fields)
        -> Result<(), PantryError>;

    /// Delete a document
    async fn delete(&self, collection: &str, key: &str) -> Result<(), PantryError>;
}

/// In-process document store
///
/// Documents are kept in key order, matching how the hosted store orders a
/// collection listing. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<BTreeMap<String, BTreeMap<String, Fields>>>>,
}

impl MemoryDocumentStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Whether a collection has no documents
    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Raw document, bypassing the async interface
    #[must_use]
    pub fn snapshot(&self, collection: &str, key: &str) -> Option<Fields> {
        self.collections
            .read()
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<(String, Fields)>, PantryError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>, PantryError> {
        Ok(self.snapshot(collection, key))
    }

    async fn set(&self, collection: &str, key: &str, fields: Fields) -> Result<(), PantryError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), fields);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Fields,
    ) -> Result<(), PantryError> {
        let mut guard = self.collections.write();
        let doc = guard
            .get_mut(collection)
            .and_then(|c| c.get_mut(key))
            .ok_or_else(|| {
                RemoteError::new(format!("update {collection}/{key}"), "no document to update")
                    .with_status(404)
            })?;
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), PantryError> {
        if let Some(c) = self.collections.write().get_mut(collection) {
            c.remove(key);
        }
        Ok(())
    }
}

/// Result of [`InventoryStore::adjust_quantity`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuantityChange {
    /// Quantity written back
    Updated(Quantity),
    /// Quantity reached zero or below; item deleted
    Removed,
    /// No such item; nothing written
    Missing,
}

/// Pantry items over a document collection
#[derive(Clone)]
pub struct InventoryStore {
    docs: Arc<dyn DocumentStore>,
    collection: String,
    guard: RemoteGuard,
}

impl fmt::Debug for InventoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryStore")
            .field("collection", &self.collection)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl InventoryStore {
    /// Create gateway over a collection
    #[inline]
    #[must_use]
    pub fn new(docs: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            docs,
            collection: collection.into(),
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

    /// Full snapshot of the collection
    ///
    /// Documents that fail to decode are skipped with a warning.
    ///
    /// # Errors
    /// - remote, timeout and cancellation errors from the backend
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn list(&self) -> Result<Vec<InventoryItem>, PantryError> {
        let op = format!("list {}", self.collection);
        let raw = self.guard.run(&op, self.docs.list(&self.collection)).await?;

        let mut items = Vec::with_capacity(raw.len());
        for (key, fields) in raw {
            match decode(&key, fields) {
                Ok(item) => items.push(item),
                Err(e) => warn!(key = %key, error = %e, "skipping undecodable document"),
            }
        }
        debug!(count = items.len(), "listed inventory");
        Ok(items)
    }

    /// One item by name
    ///
    /// # Errors
    /// - `PantryError::Decode` if the stored document is malformed
    /// - remote, timeout and cancellation errors from the backend
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn get(&self, name: &ItemName) -> Result<Option<InventoryItem>, PantryError> {
        match self.fetch(name).await? {
            Some(fields) => decode(name.as_str(), fields).map(Some),
            None => Ok(None),
        }
    }

    /// Create or fully overwrite an item
    ///
    /// # Errors
    /// - remote, timeout and cancellation errors from the backend
    #[instrument(skip(self, item), fields(collection = %self.collection, item = %item.name))]
    pub async fn put(&self, item: &InventoryItem) -> Result<(), PantryError> {
        let fields = encode(&item.to_document())?;
        let op = format!("set {}/{}", self.collection, item.name);
        self.guard
            .run(&op, self.docs.set(&self.collection, item.name.as_str(), fields))
            .await?;
        info!(quantity = %item.quantity, "item written");
        Ok(())
    }

    /// Read-modify-write of an item's quantity
    ///
    /// Deletes the item when the new quantity is zero or below, otherwise
    /// writes back the quantity field only. Concurrent adjustments of the same
    /// item can lose updates.
    ///
    /// # Errors
    /// - `PantryError::Decode` if the stored document is malformed
    /// - remote, timeout and cancellation errors from the backend
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn adjust_quantity(
        &self,
        name: &ItemName,
        delta: f64,
    ) -> Result<QuantityChange, PantryError> {
        let Some(fields) = self.fetch(name).await? else {
            debug!("no such item, nothing to adjust");
            return Ok(QuantityChange::Missing);
        };
        let doc = decode_document(name.as_str(), fields)?;

        let updated = doc.quantity + delta;
        match Quantity::new(updated) {
            Some(quantity) => {
                let mut fields = Fields::new();
                fields.insert("quantity".to_string(), number(quantity.value())?);
                let op = format!("update {}/{name}", self.collection);
                self.guard
                    .run(&op, self.docs.update(&self.collection, name.as_str(), fields))
                    .await?;
                info!(%quantity, "quantity adjusted");
                Ok(QuantityChange::Updated(quantity))
            }
            None => {
                self.remove(name).await?;
                info!(updated, "quantity exhausted, item removed");
                Ok(QuantityChange::Removed)
            }
        }
    }

    /// Delete an item
    ///
    /// # Errors
    /// - remote, timeout and cancellation errors from the backend
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn remove(&self, name: &ItemName) -> Result<(), PantryError> {
        let op = format!("delete {}/{name}", self.collection);
        self.guard
            .run(&op, self.docs.delete(&self.collection, name.as_str()))
            .await?;
        info!("item deleted");
        Ok(())
    }

    async fn fetch(&self, name: &ItemName) -> Result<Option<Fields>, PantryError> {
        let op = format!("get {}/{name}", self.collection);
        self.guard
            .run(&op, self.docs.get(&self.collection, name.as_str()))
            .await
    }
}

fn decode_document(key: &str, fields: Fields) -> Result<ItemDocument, PantryError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| PantryError::Decode(format!("{key}: {e}")))
}

fn decode(key: &str, fields: Fields) -> Result<InventoryItem, PantryError> {
    InventoryItem::from_document(key, decode_document(key, fields)?)
}

fn encode(doc: &ItemDocument) -> Result<Fields, PantryError> {
    match serde_json::to_value(doc) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(PantryError::Decode(format!("item encoded as {other}"))),
        Err(e) => Err(PantryError::Decode(e.to_string())),
    }
}

fn number(value: f64) -> Result<Value, PantryError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| PantryError::Decode(format!("quantity {value} is not representable")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, Unit};
    use serde_json::json;

    fn name(s: &str) -> ItemName {
        ItemName::parse(s).unwrap()
    }

    fn item(n: &str, q: f64) -> InventoryItem {
        InventoryItem::new(name(n), Quantity::new(q).unwrap())
    }

    fn store() -> (MemoryDocumentStore, InventoryStore) {
        let docs = MemoryDocumentStore::new();
        let inventory = InventoryStore::new(Arc::new(docs.clone()), "inventory");
        (docs, inventory)
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_, inventory) = store();
        let milk = item("Milk", 2.0).with_unit(Unit::Liters).with_category(Category::Produce);

        inventory.put(&milk).await.unwrap();
        assert_eq!(inventory.get(&name("Milk")).await.unwrap(), Some(milk));
        assert_eq!(inventory.get(&name("Eggs")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn stored_document_shape() {
        let (docs, inventory) = store();
        inventory.put(&item("Salt", 1.0)).await.unwrap();

        let raw = docs.snapshot("inventory", "Salt").unwrap();
        assert_eq!(
            Value::Object(raw),
            json!({
                "quantity": 1.0,
                "unit": "kilograms",
                "expiryDate": "",
                "category": "",
                "imageUrl": ""
            })
        );
    }

    #[tokio::test]
    async fn list_is_key_ordered_and_skips_bad_documents() {
        let (docs, inventory) = store();
        inventory.put(&item("Rice", 1.0)).await.unwrap();
        inventory.put(&item("Apples", 3.0)).await.unwrap();
        let mut bad = Fields::new();
        bad.insert("quantity".to_string(), json!("lots"));
        docs.set("inventory", "Broken", bad).await.unwrap();

        let names: Vec<String> = inventory
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name.to_string())
            .collect();
        assert_eq!(names, vec!["Apples", "Rice"]);
    }

    #[tokio::test]
    async fn adjust_updates_quantity_only() {
        let (docs, inventory) = store();
        inventory
            .put(&item("Oil", 2.0).with_unit(Unit::Liters).with_image_url("u"))
            .await
            .unwrap();

        let change = inventory.adjust_quantity(&name("Oil"), 1.0).await.unwrap();
        assert_eq!(change, QuantityChange::Updated(Quantity::new(3.0).unwrap()));

        let raw = docs.snapshot("inventory", "Oil").unwrap();
        assert_eq!(raw["quantity"], json!(3.0));
        assert_eq!(raw["unit"], json!("liters"));
        assert_eq!(raw["imageUrl"], json!("u"));
    }

    #[tokio::test]
    async fn adjust_to_zero_removes() {
        let (docs, inventory) = store();
        inventory.put(&item("Eggs", 1.0)).await.unwrap();

        let change = inventory.adjust_quantity(&name("Eggs"), -1.0).await.unwrap();
        assert_eq!(change, QuantityChange::Removed);
        assert!(docs.is_empty("inventory"));
    }

    #[tokio::test]
    async fn adjust_below_zero_removes() {
        let (docs, inventory) = store();
        inventory.put(&item("Eggs", 1.0)).await.unwrap();

        let change = inventory.adjust_quantity(&name("Eggs"), -5.0).await.unwrap();
        assert_eq!(change, QuantityChange::Removed);
        assert_eq!(docs.snapshot("inventory", "Eggs"), None);
    }

    #[tokio::test]
    async fn adjust_missing_is_noop() {
        let (docs, inventory) = store();
        let change = inventory.adjust_quantity(&name("Ghost"), 1.0).await.unwrap();
        assert_eq!(change, QuantityChange::Missing);
        assert!(docs.is_empty("inventory"));
    }

    #[tokio::test]
    async fn remove_is_unconditional() {
        let (_, inventory) = store();
        inventory.remove(&name("Ghost")).await.unwrap();
    }

    #[tokio::test]
    async fn memory_update_requires_existing_document() {
        let docs = MemoryDocumentStore::new();
        let err = docs.update("inventory", "Ghost", Fields::new()).await.unwrap_err();
        match err {
            PantryError::Remote(e) => assert_eq!(e.status, Some(404)),
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let mut mock = MockDocumentStore::new();
        mock.expect_list()
            .returning(|_| Err(RemoteError::new("list inventory", "unavailable").with_status(503).into()));

        let inventory = InventoryStore::new(Arc::new(mock), "inventory");
        let err = inventory.list().await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
