//! Error types for lensmirror

use thiserror::Error;

use crate::types::Position;

/// Result type alias using MirrorError
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Main error type for lensmirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    /// No camera exists at the requested position
    #[error("No camera available at position: {0}")]
    DeviceUnavailable(Position),

    /// Camera access was refused
    #[error("Camera access denied for position: {0}")]
    PermissionDenied(Position),

    /// Device could not be locked or reconfigured
    #[error("Device configuration error: {0}")]
    DeviceLock(String),

    /// The capture session rejected a change
    #[error("Capture session error: {0}")]
    Session(String),

    /// The configuration queue has shut down
    #[error("Configuration queue is not running")]
    QueueClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote API request could not be served
    #[error("Remote API error: {0}")]
    RemoteApi(String),

    /// Network failure during upload or relay
    #[error("Network error: {0}")]
    Network(String),

    /// The upload host answered with something that is not a URL
    #[error("Invalid upload response: {0}")]
    InvalidResponse(String),

    /// Another upload is already in flight for this preview
    #[error("An upload is already in progress")]
    UploadInProgress,

    /// Photo or QR code encoding error
    #[error("Encoding error: {0}")]
    Encode(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MirrorError>,
    },
}

impl MirrorError {
    /// Create a device lock error
    pub fn device_lock(msg: impl Into<String>) -> Self {
        Self::DeviceLock(msg.into())
    }

    /// Create a session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a remote API error
    pub fn remote_api(msg: impl Into<String>) -> Self {
        Self::RemoteApi(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an encoding error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &MirrorError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the user can fix this without code changes
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::DeviceUnavailable(_)
                | Self::PermissionDenied(_)
                | Self::Config(_)
                | Self::Network(_)
                | Self::UploadInProgress
        )
    }

    /// A short hint shown by the CLI next to the error
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::DeviceUnavailable(_) => {
                Some("Try switching back to the other camera with `lensmirror simulate --position`")
            }
            Self::PermissionDenied(_) => Some("Grant camera access and try the switch again"),
            Self::Config(_) => Some("Check ~/.config/lensmirror/config.toml (`lensmirror config show`)"),
            Self::Network(_) => Some("Check your connection; the capture is kept so you can retry"),
            Self::UploadInProgress => Some("Wait for the current upload to finish"),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

// Conversions from external error types

impl From<reqwest::Error> for MirrorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<image::ImageError> for MirrorError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<qrcode::types::QrError> for MirrorError {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::Encode(format!("QR code: {}", err))
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        Self::RemoteApi(format!("JSON: {}", err))
    }
}

impl From<toml::de::Error> for MirrorError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config file: {}", err))
    }
}
