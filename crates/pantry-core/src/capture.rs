//! Media capture adapter
//!
//! Drives a camera through `Idle -> Previewing -> Captured -> Idle`:
//! - [`MediaCapture::start`] opens a stream and starts the live preview
//! - [`MediaCapture::capture`] snapshots one frame and releases the camera
//! - [`MediaCapture::stop`] releases the camera, keeping any capture
//!
//! At most one stream is open at a time. The stream is a scoped device
//! resource: it is released on capture, stop, discard and drop.

use crate::error::PantryError;
use crate::types::ImageBlob;
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, error, info, warn};

/// MIME type of captured stills
pub const CAPTURE_CONTENT_TYPE: &str = "image/jpeg";

/// Source of camera streams
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Request a live video stream
    ///
    /// Returns `PantryError::DeviceAccess` when permission is denied or no
    /// camera is available.
    async fn open_stream(&self) -> Result<Box<dyn MediaStream>, PantryError>;
}

/// Live video stream bound to a preview surface
pub trait MediaStream: Send {
    /// Bind to the preview surface and begin playback
    fn start_playback(&mut self) -> Result<(), PantryError>;

    /// Current frame size in pixels
    fn frame_size(&self) -> (u32, u32);

    /// Draw the current frame onto a still of the given size and encode it
    fn grab_still(
        &mut self,
        width: u32,
        height: u32,
        content_type: &str,
    ) -> Result<ImageBlob, PantryError>;

    /// Stop every track of the stream
    fn stop_tracks(&mut self);

    /// Tracks still running
    fn active_tracks(&self) -> usize;
}

/// Observable capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// No stream, nothing captured
    Idle,
    /// Live preview running
    Previewing,
    /// Camera released, a still is pending
    Captured,
}

/// Camera lifecycle for the add-item form
pub struct MediaCapture<D: CameraDevice> {
    device: D,
    stream: Option<Box<dyn MediaStream>>,
    captured: Option<ImageBlob>,
}

impl<D: CameraDevice> fmt::Debug for MediaCapture<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCapture")
            .field("phase", &self.phase())
            .field("captured", &self.captured)
            .finish_non_exhaustive()
    }
}

impl<D: CameraDevice> MediaCapture<D> {
    /// Create idle adapter over a device
    #[inline]
    #[must_use]
    pub fn new(device: D) -> Self {
        Self {
            device,
            stream: None,
            captured: None,
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> CapturePhase {
        if self.stream.is_some() {
            CapturePhase::Previewing
        } else if self.captured.is_some() {
            CapturePhase::Captured
        } else {
            CapturePhase::Idle
        }
    }

    /// Tracks held open by this adapter
    #[must_use]
    pub fn active_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.active_tracks())
    }

    /// Pending capture
    #[inline]
    #[must_use]
    pub fn captured(&self) -> Option<&ImageBlob> {
        self.captured.as_ref()
    }

    /// Open the camera and start the preview
    ///
    /// A no-op while already previewing.
    ///
    /// # Errors
    /// - `PantryError::DeviceAccess` if the camera cannot be opened; the
    ///   adapter stays idle
    pub async fn start(&mut self) -> Result<(), PantryError> {
        if self.stream.is_some() {
            debug!("camera already previewing");
            return Ok(());
        }

        let mut stream = match self.device.open_stream().await {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Error accessing camera");
                return Err(e);
            }
        };

        if let Err(e) = stream.start_playback() {
            error!(error = %e, "camera preview failed to start");
            stream.stop_tracks();
            return Err(e);
        }

        let (width, height) = stream.frame_size();
        info!(width, height, "camera preview started");
        self.stream = Some(stream);
        Ok(())
    }

    /// Snapshot the current frame and release the camera
    ///
    /// The still replaces any earlier capture. If encoding fails the preview
    /// keeps running so the user can try again.
    ///
    /// # Errors
    /// - `PantryError::InvalidState` if no preview is running
    /// - errors from the stream while grabbing the still
    pub fn capture(&mut self) -> Result<&ImageBlob, PantryError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(PantryError::InvalidState(
                "capture requested without a running preview".to_string(),
            ));
        };

        let (width, height) = stream.frame_size();
        let still = match stream.grab_still(width, height, CAPTURE_CONTENT_TYPE) {
            Ok(still) => still,
            Err(e) => {
                error!(error = %e, "frame capture failed, preview kept");
                return Err(e);
            }
        };
        info!(width, height, bytes = still.len(), "frame captured");

        self.stop();
        Ok(self.captured.insert(still))
    }

    /// Release the camera; safe to call when idle
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            let left = stream.active_tracks();
            if left > 0 {
                warn!(left, "tracks still active after stop");
            }
            info!("camera stopped");
        }
    }

    /// Hand the pending capture to the caller
    #[inline]
    pub fn take_captured(&mut self) -> Option<ImageBlob> {
        self.captured.take()
    }

    /// Release the camera and drop any pending capture
    pub fn discard(&mut self) {
        self.stop();
        if self.captured.take().is_some() {
            debug!("pending capture discarded");
        }
    }
}

impl<D: CameraDevice> Drop for MediaCapture<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
