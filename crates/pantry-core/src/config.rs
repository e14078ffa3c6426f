//! Pantry configuration
//!
//! Connection parameters for the remote stores are never compiled in. They are
//! read from an optional TOML file and then overridden by `PANTRY_*`
//! environment variables.

use crate::error::PantryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable for the Firebase project id
pub const ENV_PROJECT_ID: &str = "PANTRY_PROJECT_ID";
/// Environment variable for the Firebase API key
pub const ENV_API_KEY: &str = "PANTRY_API_KEY";
/// Environment variable for the storage bucket
pub const ENV_STORAGE_BUCKET: &str = "PANTRY_STORAGE_BUCKET";
/// Environment variable overriding the Firestore base URL
pub const ENV_FIRESTORE_URL: &str = "PANTRY_FIRESTORE_URL";
/// Environment variable overriding the Storage base URL
pub const ENV_STORAGE_URL: &str = "PANTRY_STORAGE_URL";
/// Environment variable for the inventory collection name
pub const ENV_COLLECTION: &str = "PANTRY_COLLECTION";
/// Environment variable for the remote call deadline
pub const ENV_REMOTE_TIMEOUT_MS: &str = "PANTRY_REMOTE_TIMEOUT_MS";

/// Pantry configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PantryConfig {
    /// Remote store connection
    pub firebase: FirebaseConfig,
    /// Inventory layout and submission rules
    pub inventory: InventoryConfig,
    /// Remote call policy
    pub remote: RemotePolicy,
}

impl PantryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from an optional TOML file, then apply environment overrides
    ///
    /// # Errors
    /// - `PantryError::Config` if the file cannot be read or parsed, or an
    ///   override has an invalid value
    pub fn load(path: Option<&Path>) -> Result<Self, PantryError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file
    ///
    /// # Errors
    /// - `PantryError::Config` if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, PantryError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PantryError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
            .map_err(|e| PantryError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// - `PantryError::Config` on malformed TOML or unknown enum values
    pub fn from_toml(text: &str) -> Result<Self, PantryError> {
        toml::from_str(text).map_err(|e| PantryError::Config(e.to_string()))
    }

    /// Apply overrides from a variable lookup
    ///
    /// # Errors
    /// - `PantryError::Config` if a numeric override does not parse
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), PantryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str, slot: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                debug!("{key} set from environment");
                *slot = value.trim().to_string();
            }
        };

        set(ENV_PROJECT_ID, &mut self.firebase.project_id);
        set(ENV_API_KEY, &mut self.firebase.api_key);
        set(ENV_STORAGE_BUCKET, &mut self.firebase.storage_bucket);
        set(ENV_FIRESTORE_URL, &mut self.firebase.firestore_url);
        set(ENV_STORAGE_URL, &mut self.firebase.storage_url);
        set(ENV_COLLECTION, &mut self.inventory.collection);

        if let Some(raw) = lookup(ENV_REMOTE_TIMEOUT_MS) {
            self.remote.timeout_ms = raw.trim().parse().map_err(|e| {
                warn!("Invalid {ENV_REMOTE_TIMEOUT_MS} value: {e}");
                PantryError::Config(format!("{ENV_REMOTE_TIMEOUT_MS}={raw:?}: {e}"))
            })?;
        }

        Ok(())
    }

    /// Check that the remote backend can be reached with this configuration
    ///
    /// The API key may be empty, for emulators and authenticating proxies.
    ///
    /// # Errors
    /// - `PantryError::Config` naming every missing field
    pub fn validate(&self) -> Result<(), PantryError> {
        let mut missing = Vec::new();
        if self.firebase.project_id.is_empty() {
            missing.push(ENV_PROJECT_ID);
        }
        if self.firebase.storage_bucket.is_empty() {
            missing.push(ENV_STORAGE_BUCKET);
        }
        if !missing.is_empty() {
            return Err(PantryError::Config(format!(
                "missing settings: {}",
                missing.join(", ")
            )));
        }
        if self.inventory.collection.is_empty() || self.inventory.collection.contains('/') {
            return Err(PantryError::Config(format!(
                "invalid collection name: {:?}",
                self.inventory.collection
            )));
        }
        if self.remote.timeout_ms == 0 {
            return Err(PantryError::Config("remote.timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// With duplicate policy
    #[inline]
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.inventory.duplicate_policy = policy;
        self
    }
}

/// Firebase project connection
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Project identifier
    pub project_id: String,
    /// Web API key
    pub api_key: String,
    /// Storage bucket, e.g. `my-project.appspot.com`
    pub storage_bucket: String,
    /// Firestore REST base URL
    pub firestore_url: String,
    /// Storage REST base URL
    pub storage_url: String,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: String::new(),
            storage_bucket: String::new(),
            firestore_url: "https://firestore.googleapis.com/v1".to_string(),
            storage_url: "https://firebasestorage.googleapis.com/v0".to_string(),
        }
    }
}

impl fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("storage_bucket", &self.storage_bucket)
            .field("firestore_url", &self.firestore_url)
            .field("storage_url", &self.storage_url)
            .finish()
    }
}

/// Inventory layout and submission rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Document collection holding items
    pub collection: String,
    /// Blob path prefix for item images
    pub image_prefix: String,
    /// Duplicate submission rule
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            collection: "inventory".to_string(),
            image_prefix: "images/".to_string(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

/// How repeat submissions for an existing item are screened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Reject when the raw input equals the stored quantity's text
    #[default]
    RawInputMatch,
    /// Always merge
    Disabled,
}

/// Deadline applied to every remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemotePolicy {
    /// Deadline in milliseconds
    pub timeout_ms: u64,
}

impl RemotePolicy {
    /// Deadline as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RemotePolicy {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}
