//! Integration tests for lens remote API services and the HTTP bridge

mod mocks;

use lensmirror_core::config::{RemoteApiSettings, CAPTURE_API_SPEC_ID, CATFACT_API_SPEC_ID};
use lensmirror_core::remote::lens::LensTrigger;
use lensmirror_core::remote::{
    bridge, CallStatus, CaptureRemoteApiService, CaptureRequest, CatFactRemoteApiService,
    RemoteApiOutcome, RemoteApiRegistry, RemoteApiRequest, RemoteApiResponse, RemoteApiService,
    ResponseStatus, TriggerBus, HTTP_STATUS_METADATA, TRIGGER_CAPTURE,
};
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Run a request through a service and collect the single response
fn process(
    service: &dyn RemoteApiService,
    request: RemoteApiRequest,
) -> (CallStatus, oneshot::Receiver<(CallStatus, RemoteApiResponse)>) {
    let (tx, rx) = oneshot::channel();
    let call = service.process_request(
        request,
        Box::new(move |status: CallStatus, response: RemoteApiResponse| {
            let _ = tx.send((status, response));
        }),
    );
    (call.status(), rx)
}

fn capture_request(body: &str) -> RemoteApiRequest {
    RemoteApiRequest::new("trigger_capture").with_body(body.to_string())
}

#[tokio::test]
async fn test_video_trigger_with_duration() {
    let bus = TriggerBus::new();
    let mut triggers = bus.subscribe();
    let service = CaptureRemoteApiService::new("lens-1", bus);

    let (status, rx) = process(&service, capture_request(r#"{"type":"video","duration":"10"}"#));
    assert_eq!(status, CallStatus::Ongoing);

    let (answered, response) = rx.await.unwrap();
    assert_eq!(answered, CallStatus::Answered);
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.body_text(), r#"{"status":"success"}"#);

    let trigger = triggers.recv().await.unwrap();
    assert_eq!(trigger.name(), TRIGGER_CAPTURE);
    assert_eq!(trigger.lens_id, "lens-1");
    assert_eq!(
        Value::Object(trigger.request.payload()),
        json!({"type": "video", "duration": "10"})
    );
}

#[tokio::test]
async fn test_malformed_trigger_is_bad_request() {
    let bus = TriggerBus::new();
    let mut triggers = bus.subscribe();
    let service = CaptureRemoteApiService::new("lens-1", bus);

    for body in [
        "not json",
        "[]",
        "42",
        r#"{"app":"mirror"}"#,
        r#"{"type":"hologram"}"#,
        r#"{"type":"video","duration":["10"]}"#,
    ] {
        let (_, rx) = process(&service, capture_request(body));
        let (answered, response) = rx.await.unwrap();
        assert_eq!(answered, CallStatus::Answered);
        assert_eq!(response.status, ResponseStatus::BadRequest, "body {}", body);
        assert_eq!(
            response.body_text(),
            r#"{"status":"error","message":"Invalid JSON format"}"#
        );
    }

    assert!(triggers.try_recv().is_err(), "no trigger should be posted");
}

#[tokio::test]
async fn test_photo_trigger_drops_duration() {
    let bus = TriggerBus::new();
    let mut triggers = bus.subscribe();
    let service = CaptureRemoteApiService::new("lens-1", bus);

    let (_, rx) = process(&service, capture_request(r#"{"type":"photo","duration":"10"}"#));
    let (_, response) = rx.await.unwrap();
    assert_eq!(response.status, ResponseStatus::Success);

    let trigger = triggers.recv().await.unwrap();
    assert_eq!(trigger.request, CaptureRequest::Photo);
    assert_eq!(Value::Object(trigger.request.payload()), json!({"type": "photo"}));
}

#[tokio::test]
async fn test_lens_payload_accepted() {
    let bus = TriggerBus::new();
    let mut triggers = bus.subscribe();
    let service = CaptureRemoteApiService::new("lens-1", bus);
    let lens = LensTrigger::default();

    let (_, rx) = process(&service, lens.video(None));
    let (_, response) = rx.await.unwrap();
    assert_eq!(response.status, ResponseStatus::Success);

    let trigger = triggers.recv().await.unwrap();
    assert_eq!(trigger.request, CaptureRequest::Video { duration: None });
    assert!(!trigger.request.payload().contains_key("duration"));
}

#[tokio::test]
async fn test_registry_routes_by_spec_id() {
    let bus = TriggerBus::new();
    let mut triggers = bus.subscribe();
    let base_url = mocks::spawn_catfact_server().await;
    let settings = RemoteApiSettings {
        catfact_base_url: base_url,
        ..RemoteApiSettings::default()
    };
    let registry =
        RemoteApiRegistry::with_default_services(&settings, bus, Handle::current()).unwrap();

    let mut spec_ids = registry.spec_ids();
    spec_ids.sort();
    let mut expected = vec![CAPTURE_API_SPEC_ID.to_string(), CATFACT_API_SPEC_ID.to_string()];
    expected.sort();
    assert_eq!(spec_ids, expected);

    match registry
        .call(CAPTURE_API_SPEC_ID, "lens", LensTrigger::default().photo())
        .await
    {
        RemoteApiOutcome::Answered(response) => {
            assert_eq!(response.status, ResponseStatus::Success)
        }
        other => panic!("Unexpected outcome {:?}", other),
    }
    assert_eq!(triggers.recv().await.unwrap().request, CaptureRequest::Photo);

    match registry
        .call(CATFACT_API_SPEC_ID, "lens", RemoteApiRequest::new("fact"))
        .await
    {
        RemoteApiOutcome::Answered(response) => {
            assert_eq!(response.body_text(), mocks::CAT_FACT)
        }
        other => panic!("Unexpected outcome {:?}", other),
    }

    let outcome = registry
        .call("00000000-0000-0000-0000-000000000000", "lens", RemoteApiRequest::new("fact"))
        .await;
    assert!(matches!(outcome, RemoteApiOutcome::UnknownSpec));
}

fn catfact_service(base_url: &str) -> CatFactRemoteApiService {
    CatFactRemoteApiService::new(
        reqwest::Client::new(),
        Url::parse(base_url).unwrap(),
        Handle::current(),
    )
}

#[tokio::test]
async fn test_catfact_relays_body_and_status() {
    let service = catfact_service(&mocks::spawn_catfact_server().await);

    let (status, rx) = process(&service, RemoteApiRequest::new("fact"));
    assert_eq!(status, CallStatus::Ongoing);

    let (answered, response) = rx.await.unwrap();
    assert_eq!(answered, CallStatus::Answered);
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.body_text(), mocks::CAT_FACT);
    assert_eq!(response.metadata[HTTP_STATUS_METADATA], "200");

    // Upstream HTTP errors are relayed, not turned into bad requests
    let (_, rx) = process(&service, RemoteApiRequest::new("teapot"));
    let (_, response) = rx.await.unwrap();
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.metadata[HTTP_STATUS_METADATA], "418");
}

#[tokio::test]
async fn test_catfact_transport_failure_is_bad_request() {
    let service = catfact_service(&mocks::closed_port_url().await);

    let (_, rx) = process(&service, RemoteApiRequest::new("fact"));
    let (answered, response) = rx.await.unwrap();
    assert_eq!(answered, CallStatus::Answered);
    assert_eq!(response.status, ResponseStatus::BadRequest);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_catfact_cancel_aborts_request() {
    let service = catfact_service(&mocks::spawn_catfact_server().await);

    let (tx, rx) = oneshot::channel();
    let call = service.process_request(
        RemoteApiRequest::new("slow"),
        Box::new(move |status: CallStatus, response: RemoteApiResponse| {
            let _ = tx.send((status, response));
        }),
    );
    assert_eq!(call.status(), CallStatus::Ongoing);

    call.cancel();

    // The aborted task drops the handler without calling it
    let result = tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_bridge_http_round_trip() {
    let bus = TriggerBus::new();
    let mut triggers = bus.subscribe();
    let settings = RemoteApiSettings {
        catfact_base_url: mocks::spawn_catfact_server().await,
        ..RemoteApiSettings::default()
    };
    let registry = Arc::new(
        RemoteApiRegistry::with_default_services(&settings, bus, Handle::current()).unwrap(),
    );
    let addr = mocks::spawn_router(bridge::router(registry)).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["spec_ids"].as_array().unwrap().len(), 2);

    let response = client
        .post(format!(
            "http://{}/remote/{}/trigger_capture",
            addr, CAPTURE_API_SPEC_ID
        ))
        .header(bridge::LENS_ID_HEADER, "lens-42")
        .body(r#"{"type":"video","duration":"3"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), r#"{"status":"success"}"#);

    let trigger = triggers.recv().await.unwrap();
    assert_eq!(trigger.lens_id, "lens-42");
    assert_eq!(trigger.request.duration(), Some("3"));

    let response = client
        .post(format!(
            "http://{}/remote/{}/trigger_capture",
            addr, CAPTURE_API_SPEC_ID
        ))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    // Query parameters stand in for the body
    let response = client
        .post(format!(
            "http://{}/remote/{}/trigger_capture?type=photo",
            addr, CAPTURE_API_SPEC_ID
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(triggers.recv().await.unwrap().lens_id, bridge::DEFAULT_LENS_ID);

    let response = client
        .post(format!("http://{}/remote/{}/fact", addr, CATFACT_API_SPEC_ID))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), mocks::CAT_FACT);

    let response = client
        .post(format!("http://{}/remote/unknown-spec/fact", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
