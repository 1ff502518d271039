//! HTTP bridge between lenses and the remote API registry
//!
//! - `POST /remote/:spec_id/:endpoint_id` forwards the body and query
//!   parameters to the service registered for `spec_id`
//! - `GET /health` lists the served spec ids
//!
//! The optional `x-lens-id` header selects the per-lens service instance.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::{RemoteApiOutcome, RemoteApiRegistry, RemoteApiRequest, ResponseStatus};
use crate::error::{MirrorError, Result};

/// Header naming the calling lens
pub const LENS_ID_HEADER: &str = "x-lens-id";

/// Lens id used when the header is absent
pub const DEFAULT_LENS_ID: &str = "bridge";

struct BridgeState {
    registry: Arc<RemoteApiRegistry>,
}

/// Build the bridge router
pub fn router(registry: Arc<RemoteApiRegistry>) -> Router {
    let state = Arc::new(BridgeState { registry });

    Router::new()
        .route("/health", get(health))
        .route("/remote/:spec_id/:endpoint_id", post(remote_call))
        .with_state(state)
}

/// Serve the bridge on localhost until the server fails
pub async fn serve(registry: Arc<RemoteApiRegistry>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| MirrorError::remote_api(format!("Failed to bind bridge on {}: {}", addr, e)))?;
    serve_on(listener, registry).await
}

/// Serve the bridge on an already bound listener
pub async fn serve_on(listener: TcpListener, registry: Arc<RemoteApiRegistry>) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Lens bridge listening on http://{}", addr);
    }

    axum::serve(listener, router(registry))
        .await
        .map_err(|e| MirrorError::remote_api(format!("Bridge server error: {}", e)))
}

/// HTTP status for a remote API response status
pub fn status_code(status: ResponseStatus) -> StatusCode {
    match status {
        ResponseStatus::Success => StatusCode::OK,
        ResponseStatus::BadRequest => StatusCode::BAD_REQUEST,
    }
}

async fn health(State(state): State<Arc<BridgeState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "spec_ids": state.registry.spec_ids(),
    }))
}

async fn remote_call(
    State(state): State<Arc<BridgeState>>,
    Path((spec_id, endpoint_id)): Path<(String, String)>,
    Query(parameters): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let lens_id = headers
        .get(LENS_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_LENS_ID)
        .to_string();
    debug!(
        "Bridge request {}/{} from lens {} ({} bytes)",
        spec_id,
        endpoint_id,
        lens_id,
        body.len()
    );

    let request = RemoteApiRequest {
        endpoint_id,
        parameters,
        body,
    };

    match state.registry.call(&spec_id, &lens_id, request).await {
        RemoteApiOutcome::Answered(response) => {
            (status_code(response.status), response.body).into_response()
        }
        RemoteApiOutcome::UnknownSpec => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("Unknown API spec {}", spec_id) })),
        )
            .into_response(),
        RemoteApiOutcome::Ignored => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Request ignored" })),
        )
            .into_response(),
    }
}
