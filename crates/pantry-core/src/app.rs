//! Inventory controller
//!
//! [`PantryApp`] owns the view state, the upsert workflow and the camera. Each
//! [`Intent`] runs its effects to completion, then folds the outcome into the
//! state as [`ViewEvent`]s. Intents take `&mut self`, so a handler is never
//! re-entered while one is in flight.

use crate::blob::{BlobStore, ImageUploader};
use crate::capture::{CameraDevice, CapturePhase, MediaCapture};
use crate::config::PantryConfig;
use crate::error::PantryError;
use crate::remote::{CancelToken, RemoteGuard};
use crate::store::{DocumentStore, InventoryStore, QuantityChange};
use crate::types::{Category, ImageBlob, ItemName};
use crate::view::{FormEdit, ViewEvent, ViewState};
use crate::workflow::{SubmitOutcome, UpsertWorkflow};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// User action on the inventory screen
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Reload the collection
    Refresh,
    /// Type into the search box
    SetSearch(String),
    /// Click a category chip
    QuickFilter(Category),
    /// Clear the search box
    ClearSearch,
    /// Open the add-item form
    OpenAddForm,
    /// Close the add-item form, discarding any capture
    CloseAddForm,
    /// Change a form field
    EditForm(FormEdit),
    /// Attach an image file
    AttachFile(ImageBlob),
    /// Open the camera preview
    StartCamera,
    /// Take a still from the preview
    CaptureFrame,
    /// Close the camera preview
    StopCamera,
    /// Submit the add-item form
    Submit,
    /// Add one to an item's quantity
    Increment(ItemName),
    /// Remove one from an item's quantity
    Decrement(ItemName),
    /// Ask to delete an item
    RequestDelete(ItemName),
    /// Delete the pending item
    ConfirmDelete,
    /// Keep the pending item
    CancelDelete,
    /// Acknowledge the visible notice
    DismissNotice,
}

/// Controller for the inventory screen
pub struct PantryApp<D: CameraDevice> {
    state: ViewState,
    workflow: UpsertWorkflow,
    camera: MediaCapture<D>,
}

impl<D: CameraDevice> std::fmt::Debug for PantryApp<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PantryApp")
            .field("state", &self.state)
            .field("workflow", &self.workflow)
            .field("camera", &self.camera)
            .finish()
    }
}

impl<D: CameraDevice> PantryApp<D> {
    /// Create controller with empty state
    #[inline]
    #[must_use]
    pub fn new(workflow: UpsertWorkflow, device: D) -> Self {
        Self {
            state: ViewState::new(),
            workflow,
            camera: MediaCapture::new(device),
        }
    }

    /// Wire a controller from configuration and backends
    ///
    /// Every remote call made through the controller is bounded by the
    /// configured deadline and aborted once `cancel` fires.
    #[must_use]
    pub fn from_config(
        config: &PantryConfig,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        device: D,
        cancel: CancelToken,
    ) -> Self {
        let guard = RemoteGuard::new(config.remote.timeout()).with_cancel(cancel);
        let store = InventoryStore::new(docs, config.inventory.collection.clone())
            .with_guard(guard.clone());
        let images =
            ImageUploader::new(blobs, config.inventory.image_prefix.clone()).with_guard(guard);
        let workflow = UpsertWorkflow::new(store, images)
            .with_duplicate_policy(config.inventory.duplicate_policy);
        Self::new(workflow, device)
    }

    /// Current view state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Camera phase
    #[inline]
    #[must_use]
    pub fn camera_phase(&self) -> CapturePhase {
        self.camera.phase()
    }

    /// Camera tracks still held open
    #[inline]
    #[must_use]
    pub fn active_tracks(&self) -> usize {
        self.camera.active_tracks()
    }

    /// Store gateway
    #[inline]
    #[must_use]
    pub fn store(&self) -> &InventoryStore {
        self.workflow.store()
    }

    /// Handle one intent
    ///
    /// Failures the user should see are folded into the state as a notice
    /// and also returned. Capture attempts without a running preview are
    /// logged and ignored.
    ///
    /// # Errors
    /// - whatever the underlying effect returned
    pub async fn dispatch(&mut self, intent: Intent) -> Result<(), PantryError> {
        debug!(?intent, "dispatch");
        match self.run(intent).await {
            Ok(()) => Ok(()),
            Err(PantryError::InvalidState(reason)) => {
                warn!(%reason, "intent ignored");
                Ok(())
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    async fn run(&mut self, intent: Intent) -> Result<(), PantryError> {
        match intent {
            Intent::Refresh => self.refresh().await,
            Intent::SetSearch(term) => {
                self.emit(ViewEvent::SearchChanged(term));
                Ok(())
            }
            Intent::QuickFilter(category) => {
                self.emit(ViewEvent::QuickFilter(category));
                Ok(())
            }
            Intent::ClearSearch => {
                self.emit(ViewEvent::SearchCleared);
                Ok(())
            }
            Intent::OpenAddForm => {
                self.emit(ViewEvent::AddFormOpened);
                Ok(())
            }
            Intent::CloseAddForm => {
                self.camera.discard();
                self.emit(ViewEvent::AddFormClosed);
                Ok(())
            }
            Intent::EditForm(edit) => {
                self.emit(ViewEvent::FormEdited(edit));
                Ok(())
            }
            Intent::AttachFile(blob) => {
                self.require_form("attach file")?;
                self.emit(ViewEvent::FileAttached(blob));
                Ok(())
            }
            Intent::StartCamera => {
                self.require_form("start camera")?;
                self.camera.start().await?;
                self.emit(ViewEvent::CameraStarted);
                Ok(())
            }
            Intent::CaptureFrame => {
                self.camera.capture()?;
                let still = self.camera.take_captured().ok_or_else(|| {
                    PantryError::InvalidState("capture produced no still".to_string())
                })?;
                self.emit(ViewEvent::FrameCaptured(still));
                Ok(())
            }
            Intent::StopCamera => {
                self.camera.stop();
                self.emit(ViewEvent::CameraStopped);
                Ok(())
            }
            Intent::Submit => self.submit_form().await.map(|_| ()),
            Intent::Increment(name) => self.adjust(&name, 1.0).await,
            Intent::Decrement(name) => self.adjust(&name, -1.0).await,
            Intent::RequestDelete(name) => {
                self.emit(ViewEvent::DeleteRequested(name));
                Ok(())
            }
            Intent::ConfirmDelete => {
                let Some(name) = self.state.pending_delete.clone() else {
                    return Err(PantryError::InvalidState(
                        "no delete awaiting confirmation".to_string(),
                    ));
                };
                self.emit(ViewEvent::DeleteResolved);
                self.store().remove(&name).await?;
                self.refresh().await
            }
            Intent::CancelDelete => {
                self.emit(ViewEvent::DeleteResolved);
                Ok(())
            }
            Intent::DismissNotice => {
                self.emit(ViewEvent::NoticeDismissed);
                Ok(())
            }
        }
    }

    /// Submit the open form and report what happened
    ///
    /// Failures are folded into the state the same way [`PantryApp::dispatch`]
    /// folds them.
    ///
    /// # Errors
    /// - `PantryError::InvalidState` if no form is open
    /// - errors from [`UpsertWorkflow::submit`]
    pub async fn submit(&mut self) -> Result<SubmitOutcome, PantryError> {
        match self.submit_form().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    async fn submit_form(&mut self) -> Result<SubmitOutcome, PantryError> {
        let form = self
            .state
            .add_form
            .as_ref()
            .ok_or_else(|| PantryError::InvalidState("submit without an open form".to_string()))?;
        let submission = form.to_submission();
        self.emit(ViewEvent::SubmitStarted {
            uploading: submission.image.is_some(),
        });

        let outcome = self.workflow.submit(submission).await?;
        self.camera.discard();
        self.emit(ViewEvent::SubmitSucceeded);
        self.refresh().await?;
        Ok(outcome)
    }

    async fn adjust(&mut self, name: &ItemName, delta: f64) -> Result<(), PantryError> {
        match self.store().adjust_quantity(name, delta).await? {
            QuantityChange::Missing => info!(item = %name, "adjusted item no longer exists"),
            QuantityChange::Removed | QuantityChange::Updated(_) => {}
        }
        self.refresh().await
    }

    async fn refresh(&mut self) -> Result<(), PantryError> {
        let items = self.store().list().await?;
        self.emit(ViewEvent::InventoryLoaded(items));
        Ok(())
    }

    fn require_form(&self, action: &str) -> Result<(), PantryError> {
        if self.state.add_form.is_some() {
            Ok(())
        } else {
            Err(PantryError::InvalidState(format!("{action} without an open form")))
        }
    }

    fn emit(&mut self, event: ViewEvent) {
        self.state = std::mem::take(&mut self.state).apply(event);
    }

    fn report(&mut self, error: &PantryError) {
        match error.notice() {
            Some(notice) => self.emit(ViewEvent::Failed(notice)),
            None => {
                // logged at the source
                self.emit(ViewEvent::SubmitAbandoned);
                debug!(error = %error, "intent ended without a notice");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{MemoryBlobStore, MockBlobStore};
    use crate::capture::MediaStream;
    use crate::error::{NoticeLevel, RemoteError};
    use crate::store::{MemoryDocumentStore, MockDocumentStore};
    use crate::types::Unit;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct StillStream {
        live: bool,
    }

    impl MediaStream for StillStream {
        fn start_playback(&mut self) -> Result<(), PantryError> {
            Ok(())
        }
        fn frame_size(&self) -> (u32, u32) {
            (4, 3)
        }
        fn grab_still(&mut self, _: u32, _: u32, ct: &str) -> Result<ImageBlob, PantryError> {
            Ok(ImageBlob::new(vec![0xFF, 0xD8], ct))
        }
        fn stop_tracks(&mut self) {
            self.live = false;
        }
        fn active_tracks(&self) -> usize {
            usize::from(self.live)
        }
    }

    struct Camera {
        allow: bool,
    }

    #[async_trait]
    impl CameraDevice for Camera {
        async fn open_stream(&self) -> Result<Box<dyn MediaStream>, PantryError> {
            if self.allow {
                Ok(Box::new(StillStream { live: true }))
            } else {
                Err(PantryError::DeviceAccess("NotAllowedError".to_string()))
            }
        }
    }

    fn app_over(docs: Arc<dyn DocumentStore>, allow_camera: bool) -> PantryApp<Camera> {
        PantryApp::from_config(
            &PantryConfig::default(),
            docs,
            Arc::new(MemoryBlobStore::new("test")),
            Camera { allow: allow_camera },
            CancelToken::never(),
        )
    }

    fn app() -> PantryApp<Camera> {
        app_over(Arc::new(MemoryDocumentStore::new()), true)
    }

    fn name(s: &str) -> ItemName {
        ItemName::parse(s).unwrap()
    }

    async fn fill_form(app: &mut PantryApp<Camera>, item: &str, qty: &str) {
        app.dispatch(Intent::OpenAddForm).await.unwrap();
        app.dispatch(Intent::EditForm(FormEdit::Name(item.to_string())))
            .await
            .unwrap();
        app.dispatch(Intent::EditForm(FormEdit::Quantity(qty.to_string())))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn submit_closes_form_and_refreshes() {
        let mut app = app();
        fill_form(&mut app, "Milk", "2").await;
        app.dispatch(Intent::EditForm(FormEdit::Unit(Unit::Liters)))
            .await
            .unwrap();
        app.dispatch(Intent::Submit).await.unwrap();

        let state = app.state();
        assert!(state.add_form.is_none());
        assert!(!state.uploading);
        assert_eq!(state.inventory.len(), 1);
        assert_eq!(state.inventory[0].unit, Unit::Liters);
    }

    #[tokio::test]
    async fn validation_failure_shows_blocking_notice() {
        let mut app = app();
        fill_form(&mut app, "", "2").await;

        let err = app.dispatch(Intent::Submit).await.unwrap_err();
        assert!(matches!(err, PantryError::Validation(_)));

        let notice = app.state().notice.clone().unwrap();
        assert_eq!(notice.level, NoticeLevel::Blocking);
        assert_eq!(notice.message, "Name and Quantity are required!");
        assert!(app.state().add_form.is_some());
    }

    #[tokio::test]
    async fn capture_then_submit_uploads_still() {
        let mut app = app();
        fill_form(&mut app, "Steak", "1").await;

        app.dispatch(Intent::StartCamera).await.unwrap();
        assert!(app.state().camera_open);
        assert_eq!(app.active_tracks(), 1);

        app.dispatch(Intent::CaptureFrame).await.unwrap();
        assert!(!app.state().camera_open);
        assert_eq!(app.active_tracks(), 0);
        assert!(app.state().add_form.as_ref().unwrap().captured.is_some());

        app.dispatch(Intent::Submit).await.unwrap();
        assert_eq!(
            app.state().inventory[0].image_url.as_deref(),
            Some("memory://test/images/Steak")
        );
    }

    #[tokio::test]
    async fn denied_camera_is_log_only() {
        let mut app = app_over(Arc::new(MemoryDocumentStore::new()), false);
        app.dispatch(Intent::OpenAddForm).await.unwrap();

        let err = app.dispatch(Intent::StartCamera).await.unwrap_err();
        assert!(matches!(err, PantryError::DeviceAccess(_)));
        assert!(app.state().notice.is_none());
        assert!(!app.state().camera_open);
        assert_eq!(app.camera_phase(), CapturePhase::Idle);
    }

    #[tokio::test]
    async fn capture_without_preview_is_ignored() {
        let mut app = app();
        app.dispatch(Intent::OpenAddForm).await.unwrap();
        app.dispatch(Intent::CaptureFrame).await.unwrap();
        assert!(app.state().notice.is_none());
    }

    #[tokio::test]
    async fn closing_form_releases_camera() {
        let mut app = app();
        app.dispatch(Intent::OpenAddForm).await.unwrap();
        app.dispatch(Intent::StartCamera).await.unwrap();

        app.dispatch(Intent::CloseAddForm).await.unwrap();
        assert_eq!(app.active_tracks(), 0);
        assert_eq!(app.camera_phase(), CapturePhase::Idle);
        assert!(!app.state().camera_open);
    }

    #[tokio::test]
    async fn decrement_to_zero_removes_item() {
        let mut app = app();
        fill_form(&mut app, "Lemon", "1").await;
        app.dispatch(Intent::Submit).await.unwrap();

        app.dispatch(Intent::Increment(name("Lemon"))).await.unwrap();
        assert_eq!(app.state().inventory[0].quantity.value(), 2.0);

        app.dispatch(Intent::Decrement(name("Lemon"))).await.unwrap();
        app.dispatch(Intent::Decrement(name("Lemon"))).await.unwrap();
        assert!(app.state().inventory.is_empty());
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let mut app = app();
        fill_form(&mut app, "Salt", "1").await;
        app.dispatch(Intent::Submit).await.unwrap();

        app.dispatch(Intent::RequestDelete(name("Salt"))).await.unwrap();
        app.dispatch(Intent::CancelDelete).await.unwrap();
        assert_eq!(app.state().inventory.len(), 1);

        app.dispatch(Intent::RequestDelete(name("Salt"))).await.unwrap();
        app.dispatch(Intent::ConfirmDelete).await.unwrap();
        assert!(app.state().inventory.is_empty());
        assert!(app.state().pending_delete.is_none());
    }

    #[tokio::test]
    async fn failed_upload_on_direct_submit_shows_notice() {
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_put()
            .returning(|_, _| Err(RemoteError::new("upload images/Milk", "offline").into()));
        blobs.expect_url().never();
        let mut app = PantryApp::from_config(
            &PantryConfig::default(),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(blobs),
            Camera { allow: true },
            CancelToken::never(),
        );
        fill_form(&mut app, "Milk", "1").await;
        app.dispatch(Intent::AttachFile(ImageBlob::new(vec![1], "image/png")))
            .await
            .unwrap();

        let err = app.submit().await.unwrap_err();
        assert!(matches!(err, PantryError::Remote(_)));

        let state = app.state();
        assert!(!state.uploading);
        assert_eq!(state.notice.as_ref().map(|n| n.level), Some(NoticeLevel::Error));
        assert!(state.add_form.is_some());
        assert!(state.inventory.is_empty());
    }

    #[tokio::test]
    async fn denied_camera_clears_uploading_without_notice() {
        let mut app = app_over(Arc::new(MemoryDocumentStore::new()), false);
        app.dispatch(Intent::OpenAddForm).await.unwrap();
        app.emit(ViewEvent::SubmitStarted { uploading: true });

        assert!(app.dispatch(Intent::StartCamera).await.is_err());
        assert!(!app.state().uploading);
        assert!(app.state().notice.is_none());
    }

    #[tokio::test]
    async fn remote_failure_surfaces_error_notice() {
        let mut docs = MockDocumentStore::new();
        docs.expect_list()
            .returning(|_| Err(RemoteError::new("list inventory", "unavailable").with_status(503).into()));
        let mut app = app_over(Arc::new(docs), true);

        let err = app.dispatch(Intent::Refresh).await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            app.state().notice.as_ref().map(|n| n.level),
            Some(NoticeLevel::Error)
        );
    }
}
