//! HTTP relay to the cat fact API

use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{
    CallStatus, FixedStatusCall, RemoteApiCall, RemoteApiRequest, RemoteApiResponse,
    RemoteApiService, RemoteApiServiceProvider, ResponseHandler,
};
use crate::config::{CATFACT_API_SPEC_ID, CATFACT_BASE_URL};
use crate::error::{MirrorError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata key carrying the upstream HTTP status code
pub const HTTP_STATUS_METADATA: &str = "http_status";

/// An in-flight relay request
pub struct HttpRemoteApiCall {
    task: AbortHandle,
}

impl HttpRemoteApiCall {
    fn new(task: AbortHandle) -> Self {
        Self { task }
    }
}

impl RemoteApiCall for HttpRemoteApiCall {
    fn status(&self) -> CallStatus {
        if self.task.is_finished() {
            CallStatus::Answered
        } else {
            CallStatus::Ongoing
        }
    }

    fn cancel(&self) {
        debug!("Aborting cat fact request");
        self.task.abort();
    }
}

/// Relays lens requests to `{base_url}/{endpoint_id}`
pub struct CatFactRemoteApiService {
    client: Client,
    base_url: Url,
    runtime: Handle,
}

impl CatFactRemoteApiService {
    /// Create a relay spawning its requests on `runtime`
    pub fn new(client: Client, base_url: Url, runtime: Handle) -> Self {
        Self {
            client,
            base_url,
            runtime,
        }
    }

    /// Upstream URL for an endpoint, or `None` if it cannot be built
    pub fn endpoint_url(&self, endpoint_id: &str) -> Option<Url> {
        let endpoint_id = endpoint_id.trim_matches('/');
        if endpoint_id.is_empty() {
            return None;
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(endpoint_id.split('/'));
        Some(url)
    }
}

impl RemoteApiService for CatFactRemoteApiService {
    fn process_request(
        &self,
        request: RemoteApiRequest,
        on_response: ResponseHandler,
    ) -> Box<dyn RemoteApiCall> {
        let Some(url) = self.endpoint_url(&request.endpoint_id) else {
            warn!("Cannot build cat fact URL for endpoint {:?}", request.endpoint_id);
            return Box::new(FixedStatusCall::ignored());
        };

        let client = self.client.clone();
        let task = self.runtime.spawn(async move {
            debug!("GET {}", url);
            let result = async {
                let response = client.get(url).send().await?;
                let status = response.status();
                let body = response.bytes().await?;
                Ok::<_, reqwest::Error>((status, body))
            }
            .await;

            let response = match result {
                Ok((status, body)) => {
                    info!("Cat fact relay answered {} ({} bytes)", status, body.len());
                    RemoteApiResponse::success(body)
                        .with_metadata(HTTP_STATUS_METADATA, status.as_u16().to_string())
                }
                Err(e) => {
                    warn!("Cat fact relay failed: {}", e);
                    RemoteApiResponse::bad_request(Vec::new())
                }
            };
            on_response(CallStatus::Answered, response);
        });

        Box::new(HttpRemoteApiCall::new(task.abort_handle()))
    }
}

/// Provides [`CatFactRemoteApiService`]s sharing one HTTP client
pub struct CatFactRemoteApiServiceProvider {
    spec_id: String,
    client: Client,
    base_url: Url,
    runtime: Handle,
}

impl CatFactRemoteApiServiceProvider {
    /// Provider for the public cat fact API under the default spec id
    pub fn new(runtime: Handle) -> Result<Self> {
        Self::with_base_url(CATFACT_API_SPEC_ID, CATFACT_BASE_URL, runtime)
    }

    /// Provider for a custom spec id and base URL
    pub fn with_base_url(
        spec_id: impl Into<String>,
        base_url: &str,
        runtime: Handle,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MirrorError::config(format!("Invalid cat fact base URL {}: {}", base_url, e)))?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            spec_id: spec_id.into(),
            client,
            base_url,
            runtime,
        })
    }
}

impl RemoteApiServiceProvider for CatFactRemoteApiServiceProvider {
    fn supported_api_spec_ids(&self) -> Vec<String> {
        vec![self.spec_id.clone()]
    }

    fn service_for_lens(&self, lens_id: &str) -> Arc<dyn RemoteApiService> {
        debug!("Creating cat fact relay for lens {}", lens_id);
        Arc::new(CatFactRemoteApiService::new(
            self.client.clone(),
            self.base_url.clone(),
            self.runtime.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(base: &str) -> CatFactRemoteApiService {
        CatFactRemoteApiService::new(
            Client::new(),
            Url::parse(base).unwrap(),
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_endpoint_url() {
        let relay = service("https://catfact.ninja");
        assert_eq!(
            relay.endpoint_url("fact").unwrap().as_str(),
            "https://catfact.ninja/fact"
        );
        assert_eq!(
            relay.endpoint_url("breeds/list").unwrap().as_str(),
            "https://catfact.ninja/breeds/list"
        );
        assert!(relay.endpoint_url("").is_none());

        let nested = service("http://127.0.0.1:9000/api/");
        assert_eq!(
            nested.endpoint_url("fact").unwrap().as_str(),
            "http://127.0.0.1:9000/api/fact"
        );
    }

    #[tokio::test]
    async fn test_unbuildable_url_is_ignored() {
        let relay = service("mailto:cats@example.com");
        let call = relay.process_request(
            RemoteApiRequest::new("fact"),
            Box::new(|_: CallStatus, _: RemoteApiResponse| {
                panic!("ignored calls must not answer")
            }),
        );
        assert_eq!(call.status(), CallStatus::Ignored);
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let result =
            CatFactRemoteApiServiceProvider::with_base_url("id", "not a url", runtime.handle().clone());
        assert!(result.is_err());
    }
}
