//! Testing utilities for the pantry workspace
//!
//! Shared fakes, fixtures and builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use pantry_core::{
    CameraDevice, CancelToken, Category, ImageBlob, InventoryItem, InventoryStore, ItemName,
    MediaStream, MemoryBlobStore, MemoryDocumentStore, PantryApp, PantryConfig, PantryError,
    Quantity, Unit,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters shared between a [`FakeCamera`] and the streams it opens
#[derive(Debug, Default)]
pub struct CameraStats {
    opened: AtomicUsize,
    live_tracks: AtomicUsize,
    stills: AtomicUsize,
}

impl CameraStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    pub fn stills(&self) -> usize {
        self.stills.load(Ordering::SeqCst)
    }
}

const FRAME_SIZE: (u32, u32) = (640, 480);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CameraMode {
    Allow,
    Deny,
    BrokenPlayback,
    BrokenEncoder,
}

/// Scriptable camera device
///
/// Clones share the same counters, so a test can hand one clone to the
/// controller and keep another to inspect track state.
#[derive(Debug, Clone)]
pub struct FakeCamera {
    mode: CameraMode,
    stats: Arc<CameraStats>,
    last_still: Arc<Mutex<Option<ImageBlob>>>,
}

impl FakeCamera {
    fn with_mode(mode: CameraMode) -> Self {
        Self {
            mode,
            stats: Arc::new(CameraStats::default()),
            last_still: Arc::new(Mutex::new(None)),
        }
    }

    /// Camera that grants access
    pub fn allowing() -> Self {
        Self::with_mode(CameraMode::Allow)
    }

    /// Camera whose permission prompt is refused
    pub fn denying() -> Self {
        Self::with_mode(CameraMode::Deny)
    }

    /// Camera whose stream opens but cannot be played
    pub fn broken_playback() -> Self {
        Self::with_mode(CameraMode::BrokenPlayback)
    }

    /// Camera that previews but fails to encode stills
    pub fn broken_encoder() -> Self {
        Self::with_mode(CameraMode::BrokenEncoder)
    }

    pub fn stats(&self) -> &CameraStats {
        &self.stats
    }

    /// Last still handed out by any stream of this camera
    pub fn last_still(&self) -> Option<ImageBlob> {
        self.last_still.lock().clone()
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn open_stream(&self) -> Result<Box<dyn MediaStream>, PantryError> {
        if self.mode == CameraMode::Deny {
            return Err(PantryError::DeviceAccess(
                "NotAllowedError: Permission denied".to_string(),
            ));
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        self.stats.live_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            camera: self.clone(),
            live: true,
        }))
    }
}

struct FakeStream {
    camera: FakeCamera,
    live: bool,
}

impl MediaStream for FakeStream {
    fn start_playback(&mut self) -> Result<(), PantryError> {
        match self.camera.mode {
            CameraMode::BrokenPlayback => Err(PantryError::DeviceAccess(
                "preview surface rejected stream".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn frame_size(&self) -> (u32, u32) {
        FRAME_SIZE
    }

    fn grab_still(
        &mut self,
        width: u32,
        height: u32,
        content_type: &str,
    ) -> Result<ImageBlob, PantryError> {
        if self.camera.mode == CameraMode::BrokenEncoder {
            return Err(PantryError::DeviceAccess("canvas encoder failed".to_string()));
        }
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(format!("{width}x{height}").as_bytes());
        let still = ImageBlob::new(bytes, content_type);
        self.camera.stats.stills.fetch_add(1, Ordering::SeqCst);
        *self.camera.last_still.lock() = Some(still.clone());
        Ok(still)
    }

    fn stop_tracks(&mut self) {
        if std::mem::take(&mut self.live) {
            self.camera.stats.live_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.live)
    }
}

/// Backends and controller wired together for a test
pub struct TestApp {
    pub app: PantryApp<FakeCamera>,
    pub docs: MemoryDocumentStore,
    pub blobs: MemoryBlobStore,
    pub camera: FakeCamera,
    pub config: PantryConfig,
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(PantryConfig::new(), FakeCamera::allowing())
}

pub fn setup_test_app_with(config: PantryConfig, camera: FakeCamera) -> TestApp {
    let docs = MemoryDocumentStore::new();
    let blobs = MemoryBlobStore::new("pantry-test");
    let app = PantryApp::from_config(
        &config,
        Arc::new(docs.clone()),
        Arc::new(blobs.clone()),
        camera.clone(),
        CancelToken::never(),
    );
    TestApp {
        app,
        docs,
        blobs,
        camera,
        config,
    }
}

pub fn name(raw: &str) -> ItemName {
    ItemName::parse(raw).unwrap()
}

pub fn create_test_item(raw_name: &str, quantity: f64) -> InventoryItem {
    InventoryItem::new(name(raw_name), Quantity::new(quantity).unwrap())
}

pub fn create_categorized_item(raw_name: &str, quantity: f64, category: Category) -> InventoryItem {
    create_test_item(raw_name, quantity).with_category(category)
}

/// Milk, Steak, Ketchup and Aspirin, one per category
pub fn sample_pantry() -> Vec<InventoryItem> {
    vec![
        create_categorized_item("Milk", 2.0, Category::Produce).with_unit(Unit::Liters),
        create_categorized_item("Steak", 1.5, Category::MeatAndPoultry),
        create_categorized_item("Ketchup", 1.0, Category::Condiments).with_expiry("2020-01-01"),
        create_categorized_item("Aspirin", 20.0, Category::Pharma).with_unit(Unit::Dozen),
    ]
}

/// Document store already holding `items` in the `inventory` collection
pub async fn seeded_store(items: &[InventoryItem]) -> (MemoryDocumentStore, InventoryStore) {
    let docs = MemoryDocumentStore::new();
    let store = InventoryStore::new(Arc::new(docs.clone()), "inventory");
    for item in items {
        store.put(item).await.unwrap();
    }
    (docs, store)
}
