//! Capture preview and sharing
//!
//! A [`PreviewSession`] holds one captured artifact while the user decides
//! what to do with it. Uploading posts it to a file sharing service and
//! yields a link plus a QR code for it.

mod qr;
mod upload;

pub use qr::ShareCode;
pub use upload::{encode_jpeg, parse_share_url, Artifact, EncodedArtifact, Uploader, FILE_FIELD};

use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::UploadSettings;
use crate::error::{MirrorError, Result};

/// A completed share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedArtifact {
    /// Link returned by the upload service
    pub url: Url,
    /// QR code for the link
    pub qr: ShareCode,
}

/// Where a preview is in the share flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    /// Showing the artifact, nothing in flight
    Idle,
    /// An upload is outstanding
    Uploading,
    /// Upload finished, QR code on screen
    Shared(SharedArtifact),
}

/// Resets the preview to idle unless the upload completed
struct UploadGuard<'a> {
    state: &'a Mutex<PreviewState>,
    done: bool,
}

impl UploadGuard<'_> {
    fn finish(mut self, shared: SharedArtifact) {
        *self.state.lock() = PreviewState::Shared(shared);
        self.done = true;
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            *self.state.lock() = PreviewState::Idle;
        }
    }
}

/// Preview of one captured artifact
pub struct PreviewSession {
    artifact: Artifact,
    uploader: Uploader,
    jpeg_quality: u8,
    state: Mutex<PreviewState>,
}

impl PreviewSession {
    /// Preview `artifact`, uploading with `settings`
    pub fn new(artifact: Artifact, settings: &UploadSettings) -> Result<Self> {
        Ok(Self::with_uploader(
            artifact,
            Uploader::new(settings)?,
            settings.jpeg_quality,
        ))
    }

    /// Preview `artifact` with an existing uploader
    pub fn with_uploader(artifact: Artifact, uploader: Uploader, jpeg_quality: u8) -> Self {
        debug!("Previewing {}", artifact.kind());
        Self {
            artifact,
            uploader,
            jpeg_quality,
            state: Mutex::new(PreviewState::Idle),
        }
    }

    /// The previewed artifact
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Current state
    pub fn state(&self) -> PreviewState {
        self.state.lock().clone()
    }

    /// Whether an upload is outstanding
    pub fn is_uploading(&self) -> bool {
        matches!(*self.state.lock(), PreviewState::Uploading)
    }

    /// Upload the artifact and return its share link and QR code
    ///
    /// Fails with [`MirrorError::UploadInProgress`] while another upload is
    /// outstanding. On failure the preview returns to idle and the artifact
    /// is kept for a retry.
    pub async fn upload(&self) -> Result<SharedArtifact> {
        let guard = {
            let mut state = self.state.lock();
            if matches!(*state, PreviewState::Uploading) {
                warn!("Upload already in progress");
                return Err(MirrorError::UploadInProgress);
            }
            *state = PreviewState::Uploading;
            UploadGuard {
                state: &self.state,
                done: false,
            }
        };

        let shared = self.encode_and_upload().await;
        match shared {
            Ok(shared) => {
                info!("Shared {} at {}", self.artifact.kind(), shared.url);
                guard.finish(shared.clone());
                Ok(shared)
            }
            Err(e) => {
                warn!("Upload failed, keeping {} for retry: {}", self.artifact.kind(), e);
                drop(guard);
                Err(e)
            }
        }
    }

    async fn encode_and_upload(&self) -> Result<SharedArtifact> {
        let encoded = self.artifact.encode(self.jpeg_quality).await?;
        let url = self.uploader.upload(encoded).await?;
        let qr = ShareCode::new(url.as_str())?;
        Ok(SharedArtifact { url, qr })
    }

    /// Hide the QR code and go back to the preview
    pub fn dismiss_qr(&self) {
        let mut state = self.state.lock();
        if matches!(*state, PreviewState::Shared(_)) {
            debug!("Dismissing QR code");
            *state = PreviewState::Idle;
        }
    }
}
