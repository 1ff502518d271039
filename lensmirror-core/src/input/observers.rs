//! Input attribute change notifications
//!
//! Downstream consumers either install a single [`InputDestination`]
//! (frames and attribute changes) or hold an [`AttributeSubscription`]
//! (attribute changes only). Dropping a subscription unregisters it.

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::trace;

use crate::types::{Frame, FrameSize, Position, VideoOrientation};

/// Pending notifications per subscriber before the oldest are dropped
const OBSERVER_CAPACITY: usize = 16;

/// Snapshot of the attributes a rendering pipeline needs from its input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InputAttributes {
    /// Active camera
    pub position: Position,
    /// Size of delivered frames
    pub frame_size: FrameSize,
    /// Logical orientation of delivered frames
    pub frame_orientation: VideoOrientation,
    /// Orientation requested for the capture connection
    pub video_orientation: VideoOrientation,
    /// Whether frames are mirrored
    pub mirrored: bool,
    /// Horizontal field of view in degrees
    pub field_of_view: f64,
}

/// The consumer an input feeds
pub trait InputDestination: Send + Sync {
    /// Called whenever any input attribute changes
    fn input_changed_attributes(&self, attributes: &InputAttributes);

    /// Called for every frame, after any attribute change it caused
    fn input_received_frame(&self, frame: &Frame);
}

/// Fan-out of attribute changes to registered observers
pub struct AttributeObservers {
    sender: broadcast::Sender<InputAttributes>,
}

impl AttributeObservers {
    /// Create an observer list with no subscribers
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self { sender }
    }

    /// Register a new observer
    pub fn subscribe(&self) -> AttributeSubscription {
        AttributeSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Deliver a change to every observer, returning how many received it
    pub fn publish(&self, attributes: InputAttributes) -> usize {
        // Sending only fails when nobody is subscribed
        let delivered = self.sender.send(attributes).unwrap_or(0);
        trace!("Published input attributes to {} observers", delivered);
        delivered
    }

    /// Number of live subscriptions
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AttributeObservers {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for receiving attribute changes
///
/// Slow subscribers skip the oldest changes rather than blocking the input.
pub struct AttributeSubscription {
    receiver: broadcast::Receiver<InputAttributes>,
}

impl AttributeSubscription {
    /// Wait for the next change; `None` once the input is gone
    pub async fn recv(&mut self) -> Option<InputAttributes> {
        loop {
            match self.receiver.recv().await {
                Ok(attributes) => return Some(attributes),
                Err(RecvError::Lagged(skipped)) => {
                    trace!("Attribute subscription skipped {} changes", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next pending change, if any
    pub fn try_recv(&mut self) -> Option<InputAttributes> {
        loop {
            match self.receiver.try_recv() {
                Ok(attributes) => return Some(attributes),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain pending changes and return the most recent one
    pub fn latest(&mut self) -> Option<InputAttributes> {
        let mut latest = None;
        while let Some(attributes) = self.try_recv() {
            latest = Some(attributes);
        }
        latest
    }
}
