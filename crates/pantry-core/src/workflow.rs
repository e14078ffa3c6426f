//! Upsert workflow
//!
//! Turns a submitted add-item form into a stored item:
//! 1. Validate name and quantity
//! 2. Read the existing document, if any
//! 3. Screen duplicate submissions
//! 4. Merge the quantity
//! 5. Upload the attached image and write the full document

use crate::blob::ImageUploader;
use crate::config::DuplicatePolicy;
use crate::error::PantryError;
use crate::store::InventoryStore;
use crate::types::{InventoryItem, ItemName, ItemSubmission, Quantity};
use tracing::{debug, info, instrument, warn};

/// What a successful submission did
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    /// Item as written
    pub item: InventoryItem,
    /// Whether the quantity was merged into an existing item
    pub merged: bool,
    /// Whether an image was uploaded
    pub image_uploaded: bool,
}

/// Validation, merge and write of add-item submissions
#[derive(Debug, Clone)]
pub struct UpsertWorkflow {
    store: InventoryStore,
    images: ImageUploader,
    duplicate_policy: DuplicatePolicy,
}

impl UpsertWorkflow {
    /// Create workflow
    #[inline]
    #[must_use]
    pub fn new(store: InventoryStore, images: ImageUploader) -> Self {
        Self {
            store,
            images,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }

    /// With duplicate policy
    #[inline]
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Store gateway used by this workflow
    #[inline]
    #[must_use]
    pub fn store(&self) -> &InventoryStore {
        &self.store
    }

    /// Validate, merge and write a submission
    ///
    /// A repeat submission for an existing name adds its quantity to the
    /// stored one and replaces unit, expiry and category. The stored image URL
    /// is kept unless a new image is attached.
    ///
    /// # Errors
    /// - `PantryError::Validation` if name or quantity is missing or malformed;
    ///   nothing is read or written
    /// - `PantryError::DuplicateSubmission` if the raw quantity input equals
    ///   the stored quantity; nothing is written
    /// - remote, timeout and cancellation errors from the gateways
    #[instrument(skip(self, submission), fields(item = %submission.name.trim()))]
    pub async fn submit(&self, submission: ItemSubmission) -> Result<SubmitOutcome, PantryError> {
        let ItemSubmission {
            name,
            quantity_input,
            unit,
            expiry_date,
            category,
            image,
        } = submission;

        if name.trim().is_empty() || quantity_input.trim().is_empty() {
            warn!("submission missing name or quantity");
            return Err(PantryError::Validation(
                "Name and Quantity are required!".to_string(),
            ));
        }
        let name = ItemName::parse(&name)?;
        let delta = Quantity::parse_input(&quantity_input)?;

        let existing = self.store.get(&name).await?;
        if let Some(current) = &existing {
            self.screen_duplicate(&name, current.quantity, &quantity_input)?;
        }

        let (quantity, merged, prior_url) = match existing {
            Some(current) => {
                let total = current.quantity.checked_add(delta.value()).ok_or_else(|| {
                    PantryError::Validation(format!("quantity for {name} out of range"))
                })?;
                (total, true, current.image_url)
            }
            None => (delta, false, None),
        };

        let uploaded_url = match image {
            Some(source) => {
                debug!(source = ?source, "uploading attached image");
                Some(self.images.upload(&name, source.into_blob()).await?)
            }
            None => None,
        };
        let image_uploaded = uploaded_url.is_some();

        let item = InventoryItem {
            name,
            quantity,
            unit,
            expiry_date: expiry_date.filter(|d| !d.trim().is_empty()),
            category,
            image_url: uploaded_url.or(prior_url),
        };
        self.store.put(&item).await?;

        info!(quantity = %item.quantity, merged, image_uploaded, "item submitted");
        Ok(SubmitOutcome {
            item,
            merged,
            image_uploaded,
        })
    }

    fn screen_duplicate(
        &self,
        name: &ItemName,
        stored: Quantity,
        raw_input: &str,
    ) -> Result<(), PantryError> {
        match self.duplicate_policy {
            DuplicatePolicy::Disabled => Ok(()),
            DuplicatePolicy::RawInputMatch => {
                let rendered = stored.to_string();
                if rendered == raw_input.trim() {
                    warn!(stored = %rendered, "duplicate quantity submission rejected");
                    Err(PantryError::DuplicateSubmission {
                        name: name.to_string(),
                        quantity: rendered,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}
