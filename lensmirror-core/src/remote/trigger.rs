//! In-process capture trigger notifications

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use super::capture::CaptureRequest;

/// Notification name posted when a lens asks for a capture
pub const TRIGGER_CAPTURE: &str = "TriggerCapture";

const TRIGGER_CAPACITY: usize = 32;

/// A capture requested by a lens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerCapture {
    /// Lens that sent the request
    pub lens_id: String,
    /// What to capture
    pub request: CaptureRequest,
}

impl TriggerCapture {
    /// Notification name
    pub fn name(&self) -> &'static str {
        TRIGGER_CAPTURE
    }
}

/// Broadcasts capture triggers to the UI side
///
/// Posting never blocks; listeners receive triggers on their own task.
#[derive(Clone)]
pub struct TriggerBus {
    sender: broadcast::Sender<TriggerCapture>,
}

impl TriggerBus {
    /// Create a bus with no listeners
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(TRIGGER_CAPACITY);
        Self { sender }
    }

    /// Post a trigger, returning how many listeners will see it
    pub fn post(&self, trigger: TriggerCapture) -> usize {
        match self.sender.send(trigger) {
            Ok(listeners) => listeners,
            Err(broadcast::error::SendError(trigger)) => {
                debug!("{} from {} dropped, no listeners", TRIGGER_CAPTURE, trigger.lens_id);
                0
            }
        }
    }

    /// Listen for triggers
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerCapture> {
        self.sender.subscribe()
    }
}

impl Default for TriggerBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_reaches_listener() {
        let bus = TriggerBus::new();
        let mut listener = bus.subscribe();

        let delivered = bus.post(TriggerCapture {
            lens_id: "lens".to_string(),
            request: CaptureRequest::Photo,
        });
        assert_eq!(delivered, 1);

        let trigger = listener.recv().await.unwrap();
        assert_eq!(trigger.name(), TRIGGER_CAPTURE);
        assert_eq!(trigger.request, CaptureRequest::Photo);
    }

    #[test]
    fn test_post_without_listeners() {
        let bus = TriggerBus::new();
        let delivered = bus.post(TriggerCapture {
            lens_id: "lens".to_string(),
            request: CaptureRequest::Photo,
        });
        assert_eq!(delivered, 0);
    }
}
