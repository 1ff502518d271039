//! Configuration types for lensmirror
//!
//! Typed settings for the camera input adapter, the lens remote APIs and
//! the capture upload flow. `ConfigFile` is the on-disk form.

mod file;

pub use file::{sample_config, ConfigFile};

use std::time::Duration;

use crate::types::{FrameSize, Position, VideoOrientation};

/// Horizontal field of view assumed before a camera reports one
pub const DEFAULT_FIELD_OF_VIEW: f64 = 78.0;

/// Remote API spec id for lens-triggered captures
pub const CAPTURE_API_SPEC_ID: &str = "7c661976-0a8a-4a49-839e-c6eedc5b09ec";

/// Remote API spec id for the cat-fact relay
pub const CATFACT_API_SPEC_ID: &str = "03d765c5-20bd-4495-9a27-30629649cf57";

/// Default cat-fact host
pub const CATFACT_BASE_URL: &str = "https://catfact.ninja";

/// Default upload endpoint
pub const UPLOAD_ENDPOINT: &str = "https://temp.sh/upload";

/// Settings for the camera input adapter
#[derive(Debug, Clone, PartialEq)]
pub struct InputSettings {
    /// Camera opened when the adapter starts
    pub position: Position,
    /// Field of view reported until a device format is known
    pub field_of_view: f64,
    /// Orientation applied to the capture connection
    pub video_orientation: VideoOrientation,
    /// Logical orientation of delivered frames
    pub frame_orientation: VideoOrientation,
    /// Frame size reported until a device format is known
    pub display_size: FrameSize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            position: Position::Front,
            field_of_view: DEFAULT_FIELD_OF_VIEW,
            video_orientation: VideoOrientation::LandscapeLeft,
            frame_orientation: VideoOrientation::Portrait,
            display_size: FrameSize::new(1080, 1920),
        }
    }
}

impl InputSettings {
    /// Set the initial camera position
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Set the capture connection orientation
    pub fn with_video_orientation(mut self, orientation: VideoOrientation) -> Self {
        self.video_orientation = orientation;
        self
    }

    /// Set the logical frame orientation
    pub fn with_frame_orientation(mut self, orientation: VideoOrientation) -> Self {
        self.frame_orientation = orientation;
        self
    }

    /// Set the display size used to seed the frame size
    pub fn with_display_size(mut self, size: FrameSize) -> Self {
        self.display_size = size;
        self
    }

    /// Validate and return an error if the settings cannot work
    pub fn validate_strict(&self) -> Result<(), String> {
        if !(self.field_of_view > 0.0 && self.field_of_view < 180.0) {
            return Err(format!(
                "Field of view {} must be between 0 and 180 degrees",
                self.field_of_view
            ));
        }

        if self.display_size.width == 0 || self.display_size.height == 0 {
            return Err("Display size cannot be zero".to_string());
        }

        Ok(())
    }
}

/// Settings for lens remote API services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteApiSettings {
    /// Spec id served by the capture trigger service
    pub capture_spec_id: String,
    /// Spec id served by the cat-fact relay
    pub catfact_spec_id: String,
    /// Base URL the cat-fact relay forwards to
    pub catfact_base_url: String,
    /// Port the lens bridge listens on
    pub bridge_port: u16,
}

impl Default for RemoteApiSettings {
    fn default() -> Self {
        Self {
            capture_spec_id: CAPTURE_API_SPEC_ID.to_string(),
            catfact_spec_id: CATFACT_API_SPEC_ID.to_string(),
            catfact_base_url: CATFACT_BASE_URL.to_string(),
            bridge_port: 8787,
        }
    }
}

/// Largest QR module size accepted, in pixels
pub const MAX_QR_MODULE_SIZE: u32 = 64;

/// Settings for uploading captures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Multipart upload endpoint
    pub endpoint: String,
    /// JPEG quality for photos (1-100)
    pub jpeg_quality: u8,
    /// Pixels per QR module
    pub qr_module_size: u32,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            endpoint: UPLOAD_ENDPOINT.to_string(),
            jpeg_quality: 80,
            qr_module_size: 10,
            timeout: Duration::from_secs(60),
        }
    }
}

impl UploadSettings {
    /// Set the upload endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the JPEG quality
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Validate and return an error if the settings cannot work
    pub fn validate_strict(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("Upload endpoint cannot be empty".to_string());
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "JPEG quality {} must be between 1 and 100",
                self.jpeg_quality
            ));
        }

        if !(1..=MAX_QR_MODULE_SIZE).contains(&self.qr_module_size) {
            return Err(format!(
                "QR module size {} must be between 1 and {}",
                self.qr_module_size, MAX_QR_MODULE_SIZE
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_defaults() {
        let settings = InputSettings::default();
        assert_eq!(settings.position, Position::Front);
        assert_eq!(settings.video_orientation, VideoOrientation::LandscapeLeft);
        assert_eq!(settings.frame_orientation, VideoOrientation::Portrait);
        assert!(settings.validate_strict().is_ok());
    }

    #[test]
    fn test_input_rejects_bad_fov() {
        let mut settings = InputSettings::default();
        settings.field_of_view = 0.0;
        assert!(settings.validate_strict().is_err());
        settings.field_of_view = 200.0;
        assert!(settings.validate_strict().is_err());
    }

    #[test]
    fn test_upload_validation() {
        assert!(UploadSettings::default().validate_strict().is_ok());
        assert!(UploadSettings::default()
            .with_jpeg_quality(0)
            .validate_strict()
            .is_err());
        assert!(UploadSettings::default()
            .with_endpoint("  ")
            .validate_strict()
            .is_err());
    }

    #[test]
    fn test_qr_module_size_bounds() {
        let mut settings = UploadSettings::default();
        settings.qr_module_size = MAX_QR_MODULE_SIZE;
        assert!(settings.validate_strict().is_ok());

        settings.qr_module_size = MAX_QR_MODULE_SIZE + 1;
        assert!(settings.validate_strict().is_err());

        settings.qr_module_size = 0;
        assert!(settings.validate_strict().is_err());
    }
}
