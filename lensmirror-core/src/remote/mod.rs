//! Lens remote APIs
//!
//! Lenses call into the host through remote API services. Each service is
//! registered under one or more API spec ids; a request names an endpoint
//! and carries a body plus string parameters, and is answered through a
//! one-shot response handler.

pub mod bridge;
mod capture;
mod catfact;
pub mod lens;
mod trigger;

pub use capture::{CaptureRemoteApiService, CaptureRemoteApiServiceProvider, CaptureRequest};
pub use catfact::{
    CatFactRemoteApiService, CatFactRemoteApiServiceProvider, HttpRemoteApiCall, HTTP_STATUS_METADATA,
};
pub use trigger::{TriggerBus, TriggerCapture, TRIGGER_CAPTURE};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::RemoteApiSettings;
use crate::error::Result;

/// Outcome reported in a remote API response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    /// The request was served
    Success,
    /// The request could not be interpreted or the upstream call failed
    BadRequest,
}

/// State of a remote API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallStatus {
    /// Still waiting for a response
    Ongoing,
    /// A response has been delivered
    Answered,
    /// The service declined the request; no response will follow
    Ignored,
}

/// A request sent by a lens
#[derive(Debug, Clone, Default)]
pub struct RemoteApiRequest {
    /// Endpoint within the API spec
    pub endpoint_id: String,
    /// String parameters
    pub parameters: HashMap<String, String>,
    /// Raw request body
    pub body: Bytes,
}

impl RemoteApiRequest {
    /// Create a request with no body or parameters
    pub fn new(endpoint_id: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            ..Default::default()
        }
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a string parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// A response delivered back to a lens
#[derive(Debug, Clone)]
pub struct RemoteApiResponse {
    /// Whether the request was served
    pub status: ResponseStatus,
    /// Extra key/value information
    pub metadata: HashMap<String, String>,
    /// Raw response body
    pub body: Bytes,
}

impl RemoteApiResponse {
    /// A successful response
    pub fn success(body: impl Into<Bytes>) -> Self {
        Self {
            status: ResponseStatus::Success,
            metadata: HashMap::new(),
            body: body.into(),
        }
    }

    /// A bad-request response
    pub fn bad_request(body: impl Into<Bytes>) -> Self {
        Self {
            status: ResponseStatus::BadRequest,
            metadata: HashMap::new(),
            body: body.into(),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Body as UTF-8 text, lossily
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Receives the single response to a request
pub type ResponseHandler = Box<dyn FnOnce(CallStatus, RemoteApiResponse) + Send + 'static>;

/// Handle to an in-flight remote API call
pub trait RemoteApiCall: Send + Sync {
    /// Current state of the call
    fn status(&self) -> CallStatus;

    /// Abort the call if it is still running
    fn cancel(&self);
}

/// Call handle with a fixed status and nothing to cancel
#[derive(Debug, Clone, Copy)]
pub struct FixedStatusCall(pub CallStatus);

impl FixedStatusCall {
    /// A call that was handled synchronously
    pub fn ongoing() -> Self {
        Self(CallStatus::Ongoing)
    }

    /// A call the service declined
    pub fn ignored() -> Self {
        Self(CallStatus::Ignored)
    }
}

impl RemoteApiCall for FixedStatusCall {
    fn status(&self) -> CallStatus {
        self.0
    }

    fn cancel(&self) {
        debug!("Cancel requested for {:?} call, nothing to cancel", self.0);
    }
}

/// Serves requests for one lens
pub trait RemoteApiService: Send + Sync {
    /// Handle a request, answering through `on_response`
    fn process_request(
        &self,
        request: RemoteApiRequest,
        on_response: ResponseHandler,
    ) -> Box<dyn RemoteApiCall>;
}

/// Creates services for the API specs it supports
pub trait RemoteApiServiceProvider: Send + Sync {
    /// API spec ids served by this provider
    fn supported_api_spec_ids(&self) -> Vec<String>;

    /// Create the service used for `lens_id`
    fn service_for_lens(&self, lens_id: &str) -> Arc<dyn RemoteApiService>;
}

/// Result of routing a request through the registry
#[derive(Debug)]
pub enum RemoteApiOutcome {
    /// No provider serves the spec id
    UnknownSpec,
    /// The service declined the request
    Ignored,
    /// The service answered
    Answered(RemoteApiResponse),
}

/// Cancels a call if its response is no longer awaited
struct CancelOnDrop {
    call: Box<dyn RemoteApiCall>,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) -> CallStatus {
        self.armed = false;
        self.call.status()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            debug!("Response no longer awaited, cancelling call");
            self.call.cancel();
        }
    }
}

/// Routes requests to providers by API spec id
///
/// Services are created once per (spec id, lens id) pair and reused.
#[derive(Default)]
pub struct RemoteApiRegistry {
    providers: Vec<Arc<dyn RemoteApiServiceProvider>>,
    services: Mutex<HashMap<(String, String), Arc<dyn RemoteApiService>>>,
}

impl RemoteApiRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving capture triggers and the cat fact relay
    pub fn with_default_services(
        settings: &RemoteApiSettings,
        bus: TriggerBus,
        runtime: Handle,
    ) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(CaptureRemoteApiServiceProvider::with_spec_id(
            settings.capture_spec_id.clone(),
            bus,
        )));
        registry.register(Arc::new(CatFactRemoteApiServiceProvider::with_base_url(
            settings.catfact_spec_id.clone(),
            &settings.catfact_base_url,
            runtime,
        )?));
        Ok(registry)
    }

    /// Register a provider
    pub fn register(&mut self, provider: Arc<dyn RemoteApiServiceProvider>) {
        for spec_id in provider.supported_api_spec_ids() {
            if self.provider_for(&spec_id).is_some() {
                warn!("API spec {} is already registered, keeping the first provider", spec_id);
            } else {
                info!("Registered remote API spec {}", spec_id);
            }
        }
        self.providers.push(provider);
    }

    /// All registered spec ids
    pub fn spec_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|provider| provider.supported_api_spec_ids())
            .collect()
    }

    /// First provider serving `spec_id`
    pub fn provider_for(&self, spec_id: &str) -> Option<Arc<dyn RemoteApiServiceProvider>> {
        self.providers
            .iter()
            .find(|provider| {
                provider
                    .supported_api_spec_ids()
                    .iter()
                    .any(|id| id == spec_id)
            })
            .cloned()
    }

    /// The service for `spec_id` used by `lens_id`
    pub fn service(&self, spec_id: &str, lens_id: &str) -> Option<Arc<dyn RemoteApiService>> {
        let key = (spec_id.to_string(), lens_id.to_string());
        if let Some(service) = self.services.lock().get(&key) {
            return Some(Arc::clone(service));
        }

        let provider = self.provider_for(spec_id)?;
        debug!("Creating remote API service {} for lens {}", spec_id, lens_id);
        let service = provider.service_for_lens(lens_id);
        self.services.lock().insert(key, Arc::clone(&service));
        Some(service)
    }

    /// Route a request and wait for its response
    ///
    /// Dropping the returned future cancels the underlying call.
    pub async fn call(
        &self,
        spec_id: &str,
        lens_id: &str,
        request: RemoteApiRequest,
    ) -> RemoteApiOutcome {
        let Some(service) = self.service(spec_id, lens_id) else {
            warn!("No remote API service for spec {}", spec_id);
            return RemoteApiOutcome::UnknownSpec;
        };

        let (response_tx, response_rx) = oneshot::channel();
        let call = service.process_request(
            request,
            Box::new(move |status: CallStatus, response: RemoteApiResponse| {
                let _ = response_tx.send((status, response));
            }),
        );
        let guard = CancelOnDrop { call, armed: true };

        match response_rx.await {
            Ok((_, response)) => {
                guard.disarm();
                RemoteApiOutcome::Answered(response)
            }
            Err(_) => {
                let status = guard.disarm();
                debug!("Call finished without a response ({:?})", status);
                RemoteApiOutcome::Ignored
            }
        }
    }
}
