//! Configuration file loading and merging
//!
//! Loads user configuration from `~/.config/lensmirror/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    InputSettings, RemoteApiSettings, UploadSettings, CAPTURE_API_SPEC_ID, CATFACT_API_SPEC_ID,
    CATFACT_BASE_URL, DEFAULT_FIELD_OF_VIEW, UPLOAD_ENDPOINT,
};
use crate::error::{MirrorError, Result};
use crate::types::FrameSize;

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Camera input settings
    #[serde(default)]
    pub camera: CameraSettings,

    /// Lens remote API settings
    #[serde(default)]
    pub remote_api: RemoteApiFileSettings,

    /// Capture upload settings
    #[serde(default)]
    pub upload: UploadFileSettings,
}

/// Camera input settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Initial camera position (front, back)
    #[serde(default = "default_position")]
    pub position: String,

    /// Field of view in degrees until the camera reports one
    #[serde(default = "default_field_of_view")]
    pub field_of_view: f64,

    /// Capture connection orientation
    #[serde(default = "default_video_orientation")]
    pub video_orientation: String,

    /// Logical frame orientation
    #[serde(default = "default_frame_orientation")]
    pub frame_orientation: String,

    /// Display width used before the first frame
    #[serde(default = "default_display_width")]
    pub display_width: u32,

    /// Display height used before the first frame
    #[serde(default = "default_display_height")]
    pub display_height: u32,
}

/// Lens remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteApiFileSettings {
    /// Spec id for the capture trigger service
    #[serde(default = "default_capture_spec_id")]
    pub capture_spec_id: String,

    /// Spec id for the cat-fact relay
    #[serde(default = "default_catfact_spec_id")]
    pub catfact_spec_id: String,

    /// Base URL for the cat-fact relay
    #[serde(default = "default_catfact_base_url")]
    pub catfact_base_url: String,

    /// Port for the lens bridge server
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,
}

/// Capture upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileSettings {
    /// Multipart upload endpoint
    #[serde(default = "default_upload_endpoint")]
    pub endpoint: String,

    /// JPEG quality for photos (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Pixels per QR code module
    #[serde(default = "default_qr_module_size")]
    pub qr_module_size: u32,

    /// Upload timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_position() -> String {
    "front".to_string()
}

fn default_field_of_view() -> f64 {
    DEFAULT_FIELD_OF_VIEW
}

fn default_video_orientation() -> String {
    "landscape-left".to_string()
}

fn default_frame_orientation() -> String {
    "portrait".to_string()
}

fn default_display_width() -> u32 {
    1080
}

fn default_display_height() -> u32 {
    1920
}

fn default_capture_spec_id() -> String {
    CAPTURE_API_SPEC_ID.to_string()
}

fn default_catfact_spec_id() -> String {
    CATFACT_API_SPEC_ID.to_string()
}

fn default_catfact_base_url() -> String {
    CATFACT_BASE_URL.to_string()
}

fn default_bridge_port() -> u16 {
    8787
}

fn default_upload_endpoint() -> String {
    UPLOAD_ENDPOINT.to_string()
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_qr_module_size() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: default_position(),
            field_of_view: default_field_of_view(),
            video_orientation: default_video_orientation(),
            frame_orientation: default_frame_orientation(),
            display_width: default_display_width(),
            display_height: default_display_height(),
        }
    }
}

impl Default for RemoteApiFileSettings {
    fn default() -> Self {
        Self {
            capture_spec_id: default_capture_spec_id(),
            catfact_spec_id: default_catfact_spec_id(),
            catfact_base_url: default_catfact_base_url(),
            bridge_port: default_bridge_port(),
        }
    }
}

impl Default for UploadFileSettings {
    fn default() -> Self {
        Self {
            endpoint: default_upload_endpoint(),
            jpeg_quality: default_jpeg_quality(),
            qr_module_size: default_qr_module_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("lensmirror").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("lensmirror")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/lensmirror/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| MirrorError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MirrorError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| MirrorError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| MirrorError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Typed camera input settings
    pub fn input_settings(&self) -> Result<InputSettings> {
        let camera = &self.camera;
        let settings = InputSettings {
            position: camera.position.parse().map_err(MirrorError::Config)?,
            field_of_view: camera.field_of_view,
            video_orientation: camera.video_orientation.parse().map_err(MirrorError::Config)?,
            frame_orientation: camera.frame_orientation.parse().map_err(MirrorError::Config)?,
            display_size: FrameSize::new(camera.display_width, camera.display_height),
        };
        settings.validate_strict().map_err(MirrorError::Config)?;
        Ok(settings)
    }

    /// Typed remote API settings
    pub fn remote_api_settings(&self) -> RemoteApiSettings {
        RemoteApiSettings {
            capture_spec_id: self.remote_api.capture_spec_id.clone(),
            catfact_spec_id: self.remote_api.catfact_spec_id.clone(),
            catfact_base_url: self.remote_api.catfact_base_url.clone(),
            bridge_port: self.remote_api.bridge_port,
        }
    }

    /// Typed upload settings
    pub fn upload_settings(&self) -> Result<UploadSettings> {
        let settings = UploadSettings {
            endpoint: self.upload.endpoint.clone(),
            jpeg_quality: self.upload.jpeg_quality,
            qr_module_size: self.upload.qr_module_size,
            timeout: Duration::from_secs(self.upload.timeout_secs),
        };
        settings.validate_strict().map_err(MirrorError::Config)?;
        Ok(settings)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# lensmirror configuration

[camera]
# Camera opened at startup: front, back
position = "front"

# Horizontal field of view (degrees) reported until the camera provides one
field_of_view = 78.0

# Capture connection orientation:
#   portrait, portrait-upside-down, landscape-left, landscape-right
video_orientation = "landscape-left"

# Logical orientation of delivered frames
frame_orientation = "portrait"

# Frame size reported before the first frame arrives
display_width = 1080
display_height = 1920

[remote_api]
# Remote API spec ids registered for lenses
capture_spec_id = "7c661976-0a8a-4a49-839e-c6eedc5b09ec"
catfact_spec_id = "03d765c5-20bd-4495-9a27-30629649cf57"

# Host the cat-fact relay forwards to
catfact_base_url = "https://catfact.ninja"

# Port for `lensmirror serve`
bridge_port = 8787

[upload]
# Multipart endpoint that answers with a plain-text URL
endpoint = "https://temp.sh/upload"

# JPEG quality for uploaded photos (1-100)
jpeg_quality = 80

# Pixels per QR code module
qr_module_size = 10

# Upload timeout in seconds
timeout_secs = 60
"#
    .to_string()
}
