//! Inventory view model
//!
//! [`ViewState`] is a plain snapshot of everything the inventory screen shows.
//! It only changes through [`ViewState::apply`], one [`ViewEvent`] at a time,
//! so every transition can be tested without a device or a backend.

use crate::error::Notice;
use crate::types::{Category, ImageBlob, ImageSource, InventoryItem, ItemName, ItemSubmission, Unit};

/// Add-item form contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddForm {
    /// Name field
    pub name: String,
    /// Quantity field, as typed
    pub quantity: String,
    /// Unit selector
    pub unit: Unit,
    /// Expiry date field
    pub expiry_date: String,
    /// Category selector
    pub category: Option<Category>,
    /// File picked from disk
    pub uploaded: Option<ImageBlob>,
    /// Still taken with the camera
    pub captured: Option<ImageBlob>,
}

impl AddForm {
    /// Submission for the upsert workflow
    #[must_use]
    pub fn to_submission(&self) -> ItemSubmission {
        ItemSubmission {
            name: self.name.clone(),
            quantity_input: self.quantity.clone(),
            unit: self.unit,
            expiry_date: (!self.expiry_date.trim().is_empty()).then(|| self.expiry_date.clone()),
            category: self.category,
            image: ImageSource::pick(self.uploaded.clone(), self.captured.clone()),
        }
    }
}

/// Single field change in the add-item form
#[derive(Debug, Clone, PartialEq)]
pub enum FormEdit {
    /// Name typed
    Name(String),
    /// Quantity typed
    Quantity(String),
    /// Unit selected
    Unit(Unit),
    /// Expiry typed
    ExpiryDate(String),
    /// Category selected or cleared
    Category(Option<Category>),
}

/// Discrete change to the view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// Fresh collection snapshot arrived
    InventoryLoaded(Vec<InventoryItem>),
    /// Search box changed
    SearchChanged(String),
    /// Category chip clicked
    QuickFilter(Category),
    /// Search box cleared
    SearchCleared,
    /// Add-item form opened
    AddFormOpened,
    /// Add-item form closed without submitting
    AddFormClosed,
    /// Form field changed
    FormEdited(FormEdit),
    /// Image file attached
    FileAttached(ImageBlob),
    /// Live preview running
    CameraStarted,
    /// Live preview stopped
    CameraStopped,
    /// Camera still taken; the preview is already released
    FrameCaptured(ImageBlob),
    /// Submission in flight
    SubmitStarted {
        /// Whether an image upload is part of it
        uploading: bool,
    },
    /// Submission written
    SubmitSucceeded,
    /// Submission ended without a write and without a notice
    SubmitAbandoned,
    /// Item awaiting delete confirmation
    DeleteRequested(ItemName),
    /// Delete confirmed or cancelled
    DeleteResolved,
    /// Something went wrong that the user should see
    Failed(Notice),
    /// Notice acknowledged
    NoticeDismissed,
}

/// Inventory screen state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// Last collection snapshot, server order
    pub inventory: Vec<InventoryItem>,
    /// Search box contents
    pub search_term: String,
    /// Open add-item form
    pub add_form: Option<AddForm>,
    /// Item awaiting delete confirmation
    pub pending_delete: Option<ItemName>,
    /// Image upload in flight
    pub uploading: bool,
    /// Live preview showing
    pub camera_open: bool,
    /// Visible notice
    pub notice: Option<Notice>,
}

impl ViewState {
    /// Create empty state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state
    #[must_use]
    pub fn apply(mut self, event: ViewEvent) -> Self {
        match event {
            ViewEvent::InventoryLoaded(items) => self.inventory = items,
            ViewEvent::SearchChanged(term) => self.search_term = term,
            ViewEvent::QuickFilter(category) => self.search_term = category.label().to_string(),
            ViewEvent::SearchCleared => self.search_term.clear(),
            ViewEvent::AddFormOpened => {
                self.add_form.get_or_insert_with(AddForm::default);
            }
            ViewEvent::AddFormClosed | ViewEvent::SubmitSucceeded => {
                self.add_form = None;
                self.camera_open = false;
                self.uploading = false;
            }
            ViewEvent::FormEdited(edit) => {
                if let Some(form) = self.add_form.as_mut() {
                    match edit {
                        FormEdit::Name(v) => form.name = v,
                        FormEdit::Quantity(v) => form.quantity = v,
                        FormEdit::Unit(v) => form.unit = v,
                        FormEdit::ExpiryDate(v) => form.expiry_date = v,
                        FormEdit::Category(v) => form.category = v,
                    }
                }
            }
            ViewEvent::FileAttached(blob) => {
                if let Some(form) = self.add_form.as_mut() {
                    form.uploaded = Some(blob);
                }
            }
            ViewEvent::CameraStarted => self.camera_open = true,
            ViewEvent::CameraStopped => self.camera_open = false,
            ViewEvent::FrameCaptured(blob) => {
                self.camera_open = false;
                if let Some(form) = self.add_form.as_mut() {
                    form.captured = Some(blob);
                }
            }
            ViewEvent::SubmitStarted { uploading } => self.uploading = uploading,
            ViewEvent::SubmitAbandoned => self.uploading = false,
            ViewEvent::DeleteRequested(name) => self.pending_delete = Some(name),
            ViewEvent::DeleteResolved => self.pending_delete = None,
            ViewEvent::Failed(notice) => {
                self.uploading = false;
                self.notice = Some(notice);
            }
            ViewEvent::NoticeDismissed => self.notice = None,
        }
        self
    }

    /// Items matching the search term
    #[must_use]
    pub fn visible_items(&self) -> Vec<&InventoryItem> {
        filter_items(&self.inventory, &self.search_term)
    }
}

/// Case-insensitive substring match on name or category label
#[must_use]
pub fn matches_search(item: &InventoryItem, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    item.name.as_str().to_lowercase().contains(&needle)
        || item.category_label().to_lowercase().contains(&needle)
}

/// Items matching `term`, in their original order
#[must_use]
pub fn filter_items<'a>(items: &'a [InventoryItem], term: &str) -> Vec<&'a InventoryItem> {
    items.iter().filter(|item| matches_search(item, term)).collect()
}
