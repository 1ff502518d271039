//! Lens-side request builders
//!
//! Mirrors what the lens script sends so hosts and tests can stand in for a
//! running lens.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use super::RemoteApiRequest;

/// Endpoint the lens posts capture triggers to
pub const TRIGGER_CAPTURE_ENDPOINT: &str = "trigger_capture";

/// App name the lens reports
pub const DEFAULT_APP: &str = "firagamirror";

#[derive(Serialize)]
struct TriggerPayload<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    app: &'a str,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<&'a str>,
}

/// Builds capture trigger requests the way a lens does
#[derive(Debug, Clone)]
pub struct LensTrigger {
    app: String,
}

impl LensTrigger {
    /// Trigger builder reporting `app`
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    /// Request a photo
    pub fn photo(&self) -> RemoteApiRequest {
        self.request("photo", None)
    }

    /// Request a video, optionally with a duration hint
    pub fn video(&self, duration: Option<&str>) -> RemoteApiRequest {
        self.request("video", duration)
    }

    fn request(&self, kind: &str, duration: Option<&str>) -> RemoteApiRequest {
        let payload = TriggerPayload {
            kind,
            app: &self.app,
            timestamp: timestamp_millis(),
            duration,
        };
        let body = serde_json::to_vec(&payload).unwrap_or_default();
        RemoteApiRequest::new(TRIGGER_CAPTURE_ENDPOINT).with_body(body)
    }
}

impl Default for LensTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_APP)
    }
}

fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
