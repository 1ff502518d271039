//! Capture trigger service
//!
//! Lenses post `{"type":"photo"}` or `{"type":"video","duration":"10"}` and
//! the host turns it into a [`TriggerCapture`] on the [`TriggerBus`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::trigger::{TriggerBus, TriggerCapture};
use super::{
    CallStatus, FixedStatusCall, RemoteApiCall, RemoteApiRequest, RemoteApiResponse,
    RemoteApiService, RemoteApiServiceProvider, ResponseHandler,
};
use crate::config::CAPTURE_API_SPEC_ID;
use crate::error::{MirrorError, Result};

/// What a lens asked the host to capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CaptureRequest {
    /// A still photo
    Photo,
    /// A video recording, optionally with a duration hint
    Video {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<String>,
    },
}

impl CaptureRequest {
    /// Parse a request payload
    ///
    /// The payload must be a JSON object with a known `type`; other keys
    /// are ignored.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(payload)?;
        Self::from_value(value)
    }

    /// Build a request from string parameters
    pub fn from_parameters<'a>(
        parameters: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self> {
        let object: Map<String, Value> = parameters
            .into_iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        Self::from_value(Value::Object(object))
    }

    fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(MirrorError::remote_api("Capture payload is not an object"));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// `photo` or `video`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video { .. } => "video",
        }
    }

    /// Duration hint for video requests
    pub fn duration(&self) -> Option<&str> {
        match self {
            Self::Video { duration } => duration.as_deref(),
            Self::Photo => None,
        }
    }

    /// Notification payload: `type`, plus `duration` when one was given
    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("type".to_string(), Value::String(self.kind().to_string()));
        if let Some(duration) = self.duration() {
            payload.insert("duration".to_string(), Value::String(duration.to_string()));
        }
        payload
    }
}

#[derive(Serialize)]
struct StatusBody<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

fn status_body(status: &str, message: Option<&str>) -> Vec<u8> {
    serde_json::to_vec(&StatusBody { status, message }).unwrap_or_default()
}

/// Serves capture triggers for one lens
pub struct CaptureRemoteApiService {
    lens_id: String,
    bus: TriggerBus,
}

impl CaptureRemoteApiService {
    /// Create a service posting to `bus`
    pub fn new(lens_id: impl Into<String>, bus: TriggerBus) -> Self {
        Self {
            lens_id: lens_id.into(),
            bus,
        }
    }

    fn parse(request: &RemoteApiRequest) -> Result<CaptureRequest> {
        if request.body.is_empty() && !request.parameters.is_empty() {
            CaptureRequest::from_parameters(&request.parameters)
        } else {
            CaptureRequest::from_json(&request.body)
        }
    }
}

impl RemoteApiService for CaptureRemoteApiService {
    fn process_request(
        &self,
        request: RemoteApiRequest,
        on_response: ResponseHandler,
    ) -> Box<dyn RemoteApiCall> {
        let response = match Self::parse(&request) {
            Ok(capture) => {
                info!(
                    "Lens {} requested {} capture via {}",
                    self.lens_id,
                    capture.kind(),
                    request.endpoint_id
                );
                self.bus.post(TriggerCapture {
                    lens_id: self.lens_id.clone(),
                    request: capture,
                });
                RemoteApiResponse::success(status_body("success", None))
            }
            Err(e) => {
                warn!("Rejected capture request from lens {}: {}", self.lens_id, e);
                RemoteApiResponse::bad_request(status_body("error", Some("Invalid JSON format")))
            }
        };

        on_response(CallStatus::Answered, response);
        Box::new(FixedStatusCall::ongoing())
    }
}

/// Provides [`CaptureRemoteApiService`]s sharing one trigger bus
pub struct CaptureRemoteApiServiceProvider {
    spec_id: String,
    bus: TriggerBus,
}

impl CaptureRemoteApiServiceProvider {
    /// Provider under the default capture spec id
    pub fn new(bus: TriggerBus) -> Self {
        Self::with_spec_id(CAPTURE_API_SPEC_ID, bus)
    }

    /// Provider under a custom spec id
    pub fn with_spec_id(spec_id: impl Into<String>, bus: TriggerBus) -> Self {
        Self {
            spec_id: spec_id.into(),
            bus,
        }
    }
}

impl RemoteApiServiceProvider for CaptureRemoteApiServiceProvider {
    fn supported_api_spec_ids(&self) -> Vec<String> {
        vec![self.spec_id.clone()]
    }

    fn service_for_lens(&self, lens_id: &str) -> Arc<dyn RemoteApiService> {
        Arc::new(CaptureRemoteApiService::new(lens_id, self.bus.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_photo_ignores_extra_keys() {
        let request =
            CaptureRequest::from_json(br#"{"type":"photo","app":"lens","timestamp":1}"#).unwrap();
        assert_eq!(request, CaptureRequest::Photo);
        assert!(request.duration().is_none());
    }

    #[test]
    fn test_parse_video_with_duration() {
        let request = CaptureRequest::from_json(br#"{"type":"video","duration":"10"}"#).unwrap();
        assert_eq!(request.kind(), "video");
        assert_eq!(request.duration(), Some("10"));
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        let cases: [&[u8]; 6] = [
            b"not json",
            br#"["photo"]"#,
            br#""photo""#,
            br#"{"app":"lens"}"#,
            br#"{"type":"panorama"}"#,
            br#"{"type":"video","duration":10}"#,
        ];
        for payload in cases {
            assert!(
                CaptureRequest::from_json(payload).is_err(),
                "accepted {}",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_payload_duration_only_for_video() {
        let photo = CaptureRequest::Photo.payload();
        assert_eq!(photo.len(), 1);
        assert_eq!(photo["type"], "photo");

        let video = CaptureRequest::Video { duration: None }.payload();
        assert!(!video.contains_key("duration"));

        let video = CaptureRequest::Video {
            duration: Some("5".into()),
        }
        .payload();
        assert_eq!(video["duration"], "5");
    }

    #[test]
    fn test_parse_from_parameters() {
        let request = RemoteApiRequest::new("trigger_capture")
            .with_parameter("type", "video")
            .with_parameter("duration", "3");
        let parsed = CaptureRemoteApiService::parse(&request).unwrap();
        assert_eq!(parsed.duration(), Some("3"));
    }

    #[test]
    fn test_status_bodies() {
        assert_eq!(status_body("success", None), br#"{"status":"success"}"#.to_vec());
        assert_eq!(
            status_body("error", Some("Invalid JSON format")),
            br#"{"status":"error","message":"Invalid JSON format"}"#.to_vec()
        );
    }
}
