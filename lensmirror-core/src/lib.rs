//! Lensmirror Core Library
//!
//! Camera plumbing for an AR mirror driven by lens scripts.
//!
//! This library provides:
//! - A mirror input adapter over a capture session (camera switching,
//!   orientation, mirroring, format preservation across stop/start)
//! - Remote API services lenses call into (capture triggers, an HTTP relay)
//!   and a local HTTP bridge for them
//! - Capture preview with upload and QR code sharing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ Capture Session │───▶│ MirrorInput  │───▶│ Lens Renderer   │
//! │ (device thread) │    │ (config q)   │    │ (destination)   │
//! └─────────────────┘    └──────────────┘    └────────┬────────┘
//!                                                     │ remote API
//!                        ┌──────────────┐    ┌────────▼────────┐
//!                        │ Preview/QR   │◀───│ TriggerCapture  │
//!                        │ (upload)     │    │ (trigger bus)   │
//!                        └──────────────┘    └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod remote;
pub mod session;
pub mod share;
pub mod types;

pub use config::{ConfigFile, InputSettings, RemoteApiSettings, UploadSettings};
pub use error::{MirrorError, Result, ResultExt};
pub use input::{AttributeSubscription, InputAttributes, InputDestination, MirrorInput};
pub use remote::{
    CallStatus, RemoteApiRegistry, RemoteApiRequest, RemoteApiResponse, ResponseStatus,
    TriggerBus, TriggerCapture,
};
pub use session::{CaptureSession, SimulatedSession};
pub use share::{Artifact, PreviewSession, PreviewState, ShareCode, Uploader};
pub use types::{Frame, FrameSize, InputId, Position, VideoOrientation};
