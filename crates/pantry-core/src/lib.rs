//! Pantry Core - inventory tracking with camera capture
//!
//! The pieces, leaf first:
//! - [`capture`]: camera lifecycle and still capture
//! - [`store`]: pantry items over a remote keyed document collection
//! - [`blob`]: image upload and URL resolution
//! - [`workflow`]: validation, duplicate screening and quantity merge
//! - [`view`]: reducer-driven view state and search filter
//! - [`app`]: controller dispatching user intents against all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use pantry_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(camera: impl CameraDevice) -> Result<(), PantryError> {
//! let config = PantryConfig::load(None)?;
//! let mut app = PantryApp::from_config(
//!     &config,
//!     Arc::new(MemoryDocumentStore::new()),
//!     Arc::new(MemoryBlobStore::default()),
//!     camera,
//!     CancelToken::never(),
//! );
//!
//! app.dispatch(Intent::OpenAddForm).await?;
//! app.dispatch(Intent::EditForm(FormEdit::Name("Milk".into()))).await?;
//! app.dispatch(Intent::EditForm(FormEdit::Quantity("2".into()))).await?;
//! app.dispatch(Intent::Submit).await?;
//!
//! println!("{} items", app.state().visible_items().len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod app;
pub mod blob;
pub mod capture;
pub mod config;
pub mod error;
pub mod remote;
pub mod store;
pub mod types;
pub mod view;
pub mod workflow;

pub use app::{Intent, PantryApp};
pub use blob::{BlobStore, ImageUploader, MemoryBlobStore};
pub use capture::{CameraDevice, CapturePhase, MediaCapture, MediaStream, CAPTURE_CONTENT_TYPE};
pub use config::{DuplicatePolicy, FirebaseConfig, InventoryConfig, PantryConfig, RemotePolicy};
pub use error::{Notice, NoticeLevel, PantryError, RemoteError};
pub use remote::{Affordance, CancelToken, RemoteGuard};
pub use store::{DocumentStore, Fields, InventoryStore, MemoryDocumentStore, QuantityChange};
pub use types::{
    Category, ImageBlob, ImageSource, InventoryItem, ItemDocument, ItemName, ItemSubmission,
    Quantity, Unit,
};
pub use view::{filter_items, matches_search, AddForm, FormEdit, ViewEvent, ViewState};
pub use workflow::{SubmitOutcome, UpsertWorkflow};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Pantry Core
    pub use crate::{
        CameraDevice, CancelToken, Category, FormEdit, ImageBlob, Intent, InventoryItem,
        ItemName, ItemSubmission, MemoryBlobStore, MemoryDocumentStore, PantryApp, PantryConfig,
        PantryError, Quantity, Unit, UpsertWorkflow, ViewState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
