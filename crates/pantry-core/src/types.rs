//! Core types for the pantry
//!
//! Defines the fundamental domain types:
//! - Item names and quantities (validated newtypes)
//! - Units and categories
//! - Inventory items and their stored document shape
//! - Image blobs and submissions from the add-item form

use crate::error::PantryError;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Item name, also the document key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemName(String);

impl ItemName {
    /// Parse a raw form value into a name
    ///
    /// Surrounding whitespace is dropped. Empty names and names containing `/`
    /// (which would address a nested document) are rejected.
    ///
    /// # Errors
    /// - `PantryError::Validation` if the name is empty or contains `/`
    pub fn parse(raw: &str) -> Result<Self, PantryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PantryError::Validation(
                "Name and Quantity are required!".to_string(),
            ));
        }
        if trimmed.contains('/') {
            return Err(PantryError::Validation(format!(
                "item name must not contain '/': {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ItemName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strictly positive, finite quantity
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Quantity(f64);

impl Quantity {
    /// Create quantity, `None` unless finite and > 0
    #[inline]
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    /// Parse the raw quantity field of the add-item form
    ///
    /// # Errors
    /// - `PantryError::Validation` if the input is empty, not a number, or not positive
    pub fn parse_input(raw: &str) -> Result<Self, PantryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PantryError::Validation(
                "Name and Quantity are required!".to_string(),
            ));
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| PantryError::Validation(format!("quantity is not a number: {trimmed}")))?;
        Self::new(value)
            .ok_or_else(|| PantryError::Validation(format!("quantity must be positive: {trimmed}")))
    }

    /// Numeric value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Add a delta; `None` when the result is no longer positive
    #[inline]
    #[must_use]
    pub fn checked_add(self, delta: f64) -> Option<Self> {
        Self::new(self.0 + delta)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unit of measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Kilograms
    #[default]
    Kilograms,
    /// Pounds
    Pounds,
    /// Liters
    Liters,
    /// Dozen
    Dozen,
}

impl Unit {
    /// All units in form order
    pub const ALL: [Unit; 4] = [Unit::Kilograms, Unit::Pounds, Unit::Liters, Unit::Dozen];

    /// Stored value
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kilograms => "kilograms",
            Unit::Pounds => "pounds",
            Unit::Liters => "liters",
            Unit::Dozen => "dozen",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = PantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .into_iter()
            .find(|u| u.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PantryError::Validation(format!("unknown unit: {s}")))
    }
}

/// Item category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Fresh produce
    Produce,
    /// Condiments
    Condiments,
    /// Pharmacy items
    Pharma,
    /// Meat and poultry
    #[serde(rename = "Meat & Poultry")]
    MeatAndPoultry,
}

impl Category {
    /// All categories in quick-filter order
    pub const ALL: [Category; 4] = [
        Category::Produce,
        Category::MeatAndPoultry,
        Category::Condiments,
        Category::Pharma,
    ];

    /// Stored value and display label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Category::Produce => "Produce",
            Category::Condiments => "Condiments",
            Category::Pharma => "Pharma",
            Category::MeatAndPoultry => "Meat & Poultry",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = PantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| {
                c.label().eq_ignore_ascii_case(wanted)
                    || c.label().replace(" & ", "-and-").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| PantryError::Validation(format!("unknown category: {s}")))
    }
}

/// One pantry item
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    /// Item name (document key)
    pub name: ItemName,
    /// Current quantity
    pub quantity: Quantity,
    /// Unit of measure
    pub unit: Unit,
    /// Expiry date as entered, unvalidated
    pub expiry_date: Option<String>,
    /// Category
    pub category: Option<Category>,
    /// URL into the blob store
    pub image_url: Option<String>,
}

impl InventoryItem {
    /// Create item with default unit and no optional fields
    #[inline]
    #[must_use]
    pub fn new(name: ItemName, quantity: Quantity) -> Self {
        Self {
            name,
            quantity,
            unit: Unit::default(),
            expiry_date: None,
            category: None,
            image_url: None,
        }
    }

    /// With unit
    #[inline]
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// With expiry date
    #[inline]
    #[must_use]
    pub fn with_expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry_date = Some(expiry.into());
        self
    }

    /// With image URL
    #[inline]
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Category label, empty when uncategorised
    #[inline]
    #[must_use]
    pub fn category_label(&self) -> &str {
        self.category.as_ref().map_or("", Category::label)
    }

    /// Whether the expiry date lies before `today`
    ///
    /// Dates that are not ISO `YYYY-MM-DD` never count as expired.
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            .is_some_and(|d| d < today)
    }

    /// Stored document shape
    #[must_use]
    pub fn to_document(&self) -> ItemDocument {
        ItemDocument {
            quantity: self.quantity.value(),
            unit: self.unit.as_str().to_string(),
            expiry_date: self.expiry_date.clone().unwrap_or_default(),
            category: self.category_label().to_string(),
            image_url: self.image_url.clone().unwrap_or_default(),
        }
    }

    /// Rebuild an item from its key and stored document
    ///
    /// # Errors
    /// - `PantryError::Decode` if the key is not a valid name or the stored
    ///   quantity is not positive
    pub fn from_document(key: &str, doc: ItemDocument) -> Result<Self, PantryError> {
        let name = ItemName::parse(key)
            .map_err(|e| PantryError::Decode(format!("document key {key:?}: {e}")))?;
        let quantity = Quantity::new(doc.quantity).ok_or_else(|| {
            PantryError::Decode(format!("{key}: stored quantity {} is not positive", doc.quantity))
        })?;

        let unit = if doc.unit.is_empty() {
            Unit::default()
        } else {
            doc.unit.parse().unwrap_or_else(|_| {
                tracing::warn!(item = key, unit = %doc.unit, "unknown unit, using default");
                Unit::default()
            })
        };

        let category = if doc.category.is_empty() {
            None
        } else {
            match doc.category.parse() {
                Ok(c) => Some(c),
                Err(_) => {
                    tracing::warn!(item = key, category = %doc.category, "unknown category, dropping");
                    None
                }
            }
        };

        Ok(Self {
            name,
            quantity,
            unit,
            expiry_date: non_empty(doc.expiry_date),
            category,
            image_url: non_empty(doc.image_url),
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Document stored under an item's key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDocument {
    /// Quantity; numeric strings are accepted on read
    #[serde(deserialize_with = "quantity_from_number_or_string")]
    pub quantity: f64,
    /// Unit value
    #[serde(default)]
    pub unit: String,
    /// Expiry date, empty when absent
    #[serde(default)]
    pub expiry_date: String,
    /// Category label, empty when absent
    #[serde(default)]
    pub category: String,
    /// Image URL, empty when absent
    #[serde(default)]
    pub image_url: String,
}

fn quantity_from_number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("quantity is not numeric: {s:?}"))),
    }
}

/// Encoded image ready for upload
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// MIME type
    pub content_type: String,
}

impl ImageBlob {
    /// Create blob
    #[inline]
    #[must_use]
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// JPEG blob, as produced by frame capture
    #[inline]
    #[must_use]
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/jpeg")
    }

    /// Read an image file, guessing the MIME type from the extension
    ///
    /// # Errors
    /// - `PantryError::Validation` if the file cannot be read
    pub fn from_path(path: &Path) -> Result<Self, PantryError> {
        let bytes = std::fs::read(path).map_err(|e| {
            PantryError::Validation(format!("cannot read image {}: {e}", path.display()))
        })?;
        Ok(Self::new(bytes, content_type_for(path)))
    }

    /// Size in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Where an attached image came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Picked from the file system
    Uploaded(ImageBlob),
    /// Snapshotted from the camera
    Captured(ImageBlob),
}

impl ImageSource {
    /// Choose the image to attach; an uploaded file wins over a capture
    #[inline]
    #[must_use]
    pub fn pick(uploaded: Option<ImageBlob>, captured: Option<ImageBlob>) -> Option<Self> {
        uploaded
            .map(ImageSource::Uploaded)
            .or_else(|| captured.map(ImageSource::Captured))
    }

    /// Consume into the blob
    #[inline]
    #[must_use]
    pub fn into_blob(self) -> ImageBlob {
        match self {
            ImageSource::Uploaded(b) | ImageSource::Captured(b) => b,
        }
    }
}

/// Raw values from the add-item form
#[derive(Debug, Clone, Default)]
pub struct ItemSubmission {
    /// Name as typed
    pub name: String,
    /// Quantity as typed
    pub quantity_input: String,
    /// Selected unit
    pub unit: Unit,
    /// Expiry date as typed
    pub expiry_date: Option<String>,
    /// Selected category
    pub category: Option<Category>,
    /// Attached image
    pub image: Option<ImageSource>,
}

impl ItemSubmission {
    /// Create submission
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, quantity_input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity_input: quantity_input.into(),
            ..Self::default()
        }
    }

    /// With unit
    #[inline]
    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    /// With expiry date
    #[inline]
    #[must_use]
    pub fn with_expiry(mut self, expiry: impl Into<String>) -> Self {
        self.expiry_date = Some(expiry.into());
        self
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// With image
    #[inline]
    #[must_use]
    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = Some(image);
        self
    }
}
