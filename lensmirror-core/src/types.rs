//! Core types for lensmirror
//!
//! These types describe cameras, orientations and the frames that flow
//! from a capture session through the input adapter.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for unique input ids
static INPUT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// NV12 (bi-planar 4:2:0, full range) pixel format fourcc
pub const FOURCC_NV12: u32 = 0x3231564E;

/// Opaque identity of a capture input
///
/// Every opened device input gets a fresh id, so reopening the same camera
/// is still observed as an input change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(u64);

impl InputId {
    /// Create a new unique id
    pub fn new() -> Self {
        Self(INPUT_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for InputId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InputId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Input({})", self.0)
    }
}

/// Physical camera position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// User-facing camera
    #[default]
    Front,
    /// World-facing camera
    Back,
}

impl Position {
    /// The camera on the other side of the device
    pub fn opposite(&self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }

    /// Whether frames from this camera are mirrored by default
    pub fn mirrored_by_default(&self) -> bool {
        matches!(self, Self::Front)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Front => write!(f, "front"),
            Self::Back => write!(f, "back"),
        }
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "front" | "user" | "selfie" => Ok(Self::Front),
            "back" | "rear" | "world" => Ok(Self::Back),
            _ => Err(format!("Unknown camera position: {}. Use front or back", s)),
        }
    }
}

/// Device orientation used for both the display and the capture connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VideoOrientation {
    /// Home button / bottom edge down
    #[default]
    Portrait,
    /// Upside down portrait
    PortraitUpsideDown,
    /// Rotated so the bottom edge is on the right
    LandscapeRight,
    /// Rotated so the bottom edge is on the left
    LandscapeLeft,
}

impl VideoOrientation {
    /// All orientations, in clockwise order from portrait
    pub const ALL: [VideoOrientation; 4] = [
        Self::Portrait,
        Self::LandscapeRight,
        Self::PortraitUpsideDown,
        Self::LandscapeLeft,
    ];

    /// Whether the long edge is horizontal
    pub fn is_landscape(&self) -> bool {
        matches!(self, Self::LandscapeLeft | Self::LandscapeRight)
    }
}

impl std::fmt::Display for VideoOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Portrait => "portrait",
            Self::PortraitUpsideDown => "portrait-upside-down",
            Self::LandscapeRight => "landscape-right",
            Self::LandscapeLeft => "landscape-left",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for VideoOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "portrait" => Ok(Self::Portrait),
            "portrait-upside-down" | "upside-down" => Ok(Self::PortraitUpsideDown),
            "landscape-right" => Ok(Self::LandscapeRight),
            "landscape-left" | "landscape" => Ok(Self::LandscapeLeft),
            _ => Err(format!(
                "Unknown orientation: {}. Valid: portrait, portrait-upside-down, landscape-left, landscape-right",
                s
            )),
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FrameSize {
    /// Create a new frame size
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A capture format supported by a camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceFormat {
    /// Frame dimensions
    pub size: FrameSize,
    /// Maximum frame rate
    pub fps: u32,
    /// Horizontal field of view in degrees
    pub field_of_view: f64,
}

impl DeviceFormat {
    /// Create a new device format
    pub fn new(width: u32, height: u32, fps: u32, field_of_view: f64) -> Self {
        Self {
            size: FrameSize::new(width, height),
            fps,
            field_of_view,
        }
    }
}

impl std::fmt::Display for DeviceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {}fps ({:.1}° FOV)",
            self.size, self.fps, self.field_of_view
        )
    }
}

/// Frame format information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format (DRM fourcc)
    pub fourcc: u32,
    /// Stride of the luma plane in bytes
    pub stride: u32,
}

/// Video frame delivered by a capture session
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame format
    pub format: FrameFormat,
    /// Pixel data
    pub data: Vec<u8>,
    /// Presentation timestamp in nanoseconds
    pub pts: u64,
    /// Monotonic frame number within the session
    pub sequence: u64,
}

impl Frame {
    /// Create an NV12 frame filled with a single luma value
    pub fn nv12(size: FrameSize, luma: u8, pts: u64, sequence: u64) -> Self {
        let luma_len = (size.width * size.height) as usize;
        let mut data = vec![luma; luma_len];
        // Neutral chroma plane
        data.resize(luma_len + luma_len / 2, 128);

        Self {
            format: FrameFormat {
                width: size.width,
                height: size.height,
                fourcc: FOURCC_NV12,
                stride: size.width,
            },
            data,
            pts,
            sequence,
        }
    }

    /// Frame dimensions
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.format.width, self.format.height)
    }
}
