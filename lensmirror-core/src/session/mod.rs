//! Capture session abstraction
//!
//! The input adapter never talks to camera hardware directly. It drives a
//! [`CaptureSession`], which owns device inputs and a single video output
//! whose [`VideoConnection`] carries the live orientation and mirroring
//! attributes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │     MirrorInput      │  ← state, observers, configuration queue
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureSession trait │  ← inputs, transactions, frame handler
//! └──────────┬───────────┘
//!            │
//!            ▼
//!     ┌─────────────┐
//!     │  Simulated  │  ← in-process backend
//!     └─────────────┘
//! ```

pub mod simulated;

pub use simulated::{DeviceAvailability, SimulatedDevice, SimulatedSession};

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{DeviceFormat, Frame, InputId, Position, VideoOrientation};

/// Callback invoked by a session for every delivered frame
///
/// The connection is the one the frame arrived on; its bound input tells the
/// handler which device produced the frame.
pub type FrameHandler = Arc<dyn Fn(&Frame, &VideoConnection) + Send + Sync>;

/// A physical camera
pub trait CaptureDevice: Send + Sync {
    /// Human readable device name
    fn name(&self) -> &str;

    /// Which side of the device the camera is on
    fn position(&self) -> Position;

    /// Format the camera is currently capturing with
    fn active_format(&self) -> DeviceFormat;

    /// Take the exclusive configuration lock
    fn lock_for_configuration(&self) -> Result<()>;

    /// Release the configuration lock
    fn unlock_for_configuration(&self);

    /// Change the active format. Requires the configuration lock.
    fn set_active_format(&self, format: DeviceFormat) -> Result<()>;
}

/// A camera bound as a session input
#[derive(Clone)]
pub struct DeviceInput {
    id: InputId,
    device: Arc<dyn CaptureDevice>,
}

impl DeviceInput {
    /// Wrap a device as a new, uniquely identified input
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            id: InputId::new(),
            device,
        }
    }

    /// Identity of this input
    pub fn id(&self) -> InputId {
        self.id
    }

    /// The underlying camera
    pub fn device(&self) -> &Arc<dyn CaptureDevice> {
        &self.device
    }

    /// Position of the underlying camera
    pub fn position(&self) -> Position {
        self.device.position()
    }
}

impl std::fmt::Debug for DeviceInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInput")
            .field("id", &self.id)
            .field("device", &self.device.name())
            .field("position", &self.device.position())
            .finish()
    }
}

/// Scoped device configuration lock
///
/// Unlocks the device when dropped, on success and error paths alike.
pub struct DeviceConfigurationLock<'a> {
    device: &'a dyn CaptureDevice,
}

impl<'a> DeviceConfigurationLock<'a> {
    /// Lock the device for configuration
    pub fn acquire(device: &'a dyn CaptureDevice) -> Result<Self> {
        device.lock_for_configuration()?;
        Ok(Self { device })
    }

    /// Change the device's active format
    pub fn set_active_format(&self, format: DeviceFormat) -> Result<()> {
        self.device.set_active_format(format)
    }
}

impl Drop for DeviceConfigurationLock<'_> {
    fn drop(&mut self) {
        self.device.unlock_for_configuration();
    }
}

/// Begin/commit configuration transaction
///
/// Commits when dropped so early returns never leave the session open.
pub struct SessionTransaction<'a> {
    session: &'a dyn CaptureSession,
}

impl<'a> SessionTransaction<'a> {
    /// Begin a configuration transaction
    pub fn begin(session: &'a dyn CaptureSession) -> Self {
        session.begin_configuration();
        Self { session }
    }
}

impl Drop for SessionTransaction<'_> {
    fn drop(&mut self) {
        self.session.commit_configuration();
    }
}

/// Live attributes of a video connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAttributes {
    /// Capture orientation
    pub orientation: VideoOrientation,
    /// Whether frames are mirrored horizontally
    pub mirrored: bool,
}

/// The link between the video output and the frame consumer
#[derive(Debug)]
pub struct VideoConnection {
    attributes: Mutex<ConnectionAttributes>,
    input: Mutex<Option<InputId>>,
}

impl VideoConnection {
    /// Create an unbound connection
    pub fn new(orientation: VideoOrientation, mirrored: bool) -> Self {
        Self {
            attributes: Mutex::new(ConnectionAttributes {
                orientation,
                mirrored,
            }),
            input: Mutex::new(None),
        }
    }

    /// Snapshot of the live attributes
    pub fn attributes(&self) -> ConnectionAttributes {
        *self.attributes.lock()
    }

    /// Current capture orientation
    pub fn orientation(&self) -> VideoOrientation {
        self.attributes.lock().orientation
    }

    /// Set the capture orientation
    pub fn set_orientation(&self, orientation: VideoOrientation) {
        self.attributes.lock().orientation = orientation;
    }

    /// Whether frames are mirrored
    pub fn is_mirrored(&self) -> bool {
        self.attributes.lock().mirrored
    }

    /// Set mirroring
    pub fn set_mirrored(&self, mirrored: bool) {
        self.attributes.lock().mirrored = mirrored;
    }

    /// Input whose port feeds this connection
    pub fn input_id(&self) -> Option<InputId> {
        *self.input.lock()
    }

    /// Bind the connection to an input port. Sessions call this when
    /// inputs are added or removed.
    pub fn bind_input(&self, input: Option<InputId>) {
        *self.input.lock() = input;
    }
}

/// A capture session coordinating device inputs and the video output
pub trait CaptureSession: Send + Sync {
    /// Open a configuration transaction
    fn begin_configuration(&self);

    /// Commit the innermost configuration transaction
    fn commit_configuration(&self);

    /// The video device input currently attached, if any
    fn device_input(&self) -> Option<DeviceInput>;

    /// Open a new input for the camera at `position`
    ///
    /// Fails with `DeviceUnavailable` when no such camera exists and with
    /// `PermissionDenied` when camera access is refused.
    fn open_device_input(&self, position: Position) -> Result<DeviceInput>;

    /// Whether `input` may be added right now
    fn can_add_input(&self, input: &DeviceInput) -> bool;

    /// Attach an input and bind the video connection to it
    fn add_input(&self, input: DeviceInput) -> Result<()>;

    /// Detach an input, returning it if it was attached
    fn remove_input(&self, id: InputId) -> Option<DeviceInput>;

    /// The video output's connection
    fn connection(&self) -> Arc<VideoConnection>;

    /// Install or clear the per-frame callback
    fn set_frame_handler(&self, handler: Option<FrameHandler>);

    /// Start delivering frames
    fn start_running(&self);

    /// Stop delivering frames
    fn stop_running(&self);

    /// Whether the session is delivering frames
    fn is_running(&self) -> bool;
}
