//! Mock infrastructure for testing
//!
//! Recording input destinations and local HTTP servers standing in for the
//! upload service and the cat fact API.

#![allow(dead_code)]

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use lensmirror_core::input::{InputAttributes, InputDestination};
use lensmirror_core::types::Frame;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// What a destination saw, in order
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationEvent {
    Attributes(InputAttributes),
    Frame(u64),
}

/// Destination that records every callback
#[derive(Default)]
pub struct RecordingDestination {
    events: Mutex<Vec<DestinationEvent>>,
}

impl RecordingDestination {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DestinationEvent> {
        self.events.lock().clone()
    }

    pub fn attributes(&self) -> Vec<InputAttributes> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DestinationEvent::Attributes(attributes) => Some(*attributes),
                DestinationEvent::Frame(_) => None,
            })
            .collect()
    }

    pub fn last_attributes(&self) -> Option<InputAttributes> {
        self.attributes().last().copied()
    }

    pub fn frame_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, DestinationEvent::Frame(_)))
            .count()
    }
}

impl InputDestination for RecordingDestination {
    fn input_changed_attributes(&self, attributes: &InputAttributes) {
        self.events
            .lock()
            .push(DestinationEvent::Attributes(*attributes));
    }

    fn input_received_frame(&self, frame: &Frame) {
        self.events.lock().push(DestinationEvent::Frame(frame.sequence));
    }
}

/// A multipart part received by the mock upload service
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Shared state of the mock upload service
#[derive(Default)]
pub struct UploadServer {
    pub parts: Mutex<Vec<ReceivedPart>>,
    /// Signalled when a request arrives
    pub received: Notify,
    /// When set, replies wait for `release`
    pub hold: Mutex<bool>,
    pub release: Notify,
    /// When set, replies with a server error
    pub fail: Mutex<bool>,
}

pub const SHARE_BASE: &str = "https://share.test/abc123";

async fn handle_upload(
    State(server): State<Arc<UploadServer>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut file_name = String::from("upload");
    while let Ok(Some(field)) = multipart.next_field().await {
        let part = ReceivedPart {
            field: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.map(|b| b.to_vec()).unwrap_or_default(),
        };
        if let Some(name) = &part.file_name {
            file_name = name.clone();
        }
        server.parts.lock().push(part);
    }
    server.received.notify_one();

    let hold = *server.hold.lock();
    if hold {
        server.release.notified().await;
    }

    if *server.fail.lock() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upload failed".to_string());
    }
    (StatusCode::OK, format!("{}/{}\n", SHARE_BASE, file_name))
}

/// Start the mock upload service, returning its `/upload` URL
pub async fn spawn_upload_server() -> (String, Arc<UploadServer>) {
    let server = Arc::new(UploadServer::default());
    let app = Router::new()
        .route("/upload", post(handle_upload))
        .with_state(Arc::clone(&server));

    let addr = spawn_router(app).await;
    (format!("http://{}/upload", addr), server)
}

pub const CAT_FACT: &str = r#"{"fact":"Cats sleep for most of the day.","length":31}"#;

async fn fact() -> impl IntoResponse {
    ([("content-type", "application/json")], CAT_FACT)
}

async fn slow_fact() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(30)).await;
    CAT_FACT
}

async fn teapot() -> impl IntoResponse {
    (StatusCode::IM_A_TEAPOT, "short and stout")
}

/// Start the mock cat fact API, returning its base URL
pub async fn spawn_catfact_server() -> String {
    let app = Router::new()
        .route("/fact", get(fact))
        .route("/slow", get(slow_fact))
        .route("/teapot", get(teapot));

    let addr = spawn_router(app).await;
    format!("http://{}", addr)
}

/// Serve `app` on an ephemeral localhost port
pub async fn spawn_router(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A localhost address nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
