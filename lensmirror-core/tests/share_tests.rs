//! Integration tests for capture preview, upload and QR sharing

mod mocks;

use image::{Rgba, RgbaImage};
use lensmirror_core::config::UploadSettings;
use lensmirror_core::error::MirrorError;
use lensmirror_core::share::{Artifact, PreviewSession, PreviewState, ShareCode, FILE_FIELD};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

fn photo() -> Artifact {
    Artifact::Photo(RgbaImage::from_fn(64, 48, |x, y| {
        Rgba([(x * 4) as u8, (y * 5) as u8, 128, 255])
    }))
}

fn decode_qr(code: &ShareCode) -> String {
    let image = code.render(4);
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        image.width() as usize,
        image.height() as usize,
        |x, y| image.get_pixel(x as u32, y as u32)[0],
    );
    let grids = prepared.detect_grids();
    assert_eq!(grids.len(), 1, "Expected exactly one QR code");
    let (_, content) = grids[0].decode().unwrap();
    content
}

#[tokio::test]
async fn test_photo_upload_yields_url_and_qr() {
    let (endpoint, server) = mocks::spawn_upload_server().await;
    let settings = UploadSettings::default().with_endpoint(endpoint);
    let preview = PreviewSession::new(photo(), &settings).unwrap();

    let shared = preview.upload().await.unwrap();
    assert_eq!(shared.url.as_str(), format!("{}/image.jpg", mocks::SHARE_BASE));
    assert_eq!(preview.state(), PreviewState::Shared(shared.clone()));

    let parts = server.parts.lock().clone();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].field, FILE_FIELD);
    assert_eq!(parts[0].file_name.as_deref(), Some("image.jpg"));
    assert_eq!(parts[0].content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(&parts[0].bytes[..2], &[0xFF, 0xD8]);

    assert_eq!(decode_qr(&shared.qr), shared.url.as_str());

    preview.dismiss_qr();
    assert_eq!(preview.state(), PreviewState::Idle);
}

#[tokio::test]
async fn test_video_upload_sends_file_bytes() {
    let (endpoint, server) = mocks::spawn_upload_server().await;
    let settings = UploadSettings::default().with_endpoint(endpoint);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.mp4");
    std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();

    let preview = PreviewSession::new(Artifact::from_path(&path).unwrap(), &settings).unwrap();
    let shared = preview.upload().await.unwrap();
    assert!(shared.url.as_str().ends_with("/video.mp4"));

    let parts = server.parts.lock().clone();
    assert_eq!(parts[0].content_type.as_deref(), Some("video/mp4"));
    assert_eq!(parts[0].bytes, b"\x00\x00\x00\x18ftypmp42");
}

#[tokio::test]
async fn test_second_upload_rejected_while_in_flight() {
    let (endpoint, server) = mocks::spawn_upload_server().await;
    *server.hold.lock() = true;
    let settings = UploadSettings::default().with_endpoint(endpoint);
    let preview = Arc::new(PreviewSession::new(photo(), &settings).unwrap());

    let first = {
        let preview = Arc::clone(&preview);
        tokio::spawn(async move { preview.upload().await })
    };

    tokio::time::timeout(Duration::from_secs(5), server.received.notified())
        .await
        .unwrap();
    assert!(preview.is_uploading());

    let err = preview.upload().await.unwrap_err();
    assert!(matches!(err, MirrorError::UploadInProgress));
    assert_eq!(err.user_hint(), Some("Wait for the current upload to finish"));

    server.release.notify_one();
    let shared = assert_ok!(first.await.unwrap());
    assert_eq!(preview.state(), PreviewState::Shared(shared));
    assert_eq!(server.parts.lock().len(), 1);
}

#[tokio::test]
async fn test_failed_upload_keeps_artifact_for_retry() {
    let (endpoint, server) = mocks::spawn_upload_server().await;
    *server.fail.lock() = true;
    let settings = UploadSettings::default().with_endpoint(endpoint);
    let preview = PreviewSession::new(photo(), &settings).unwrap();

    let err = preview.upload().await.unwrap_err();
    assert!(matches!(err.root(), MirrorError::Network(_)));
    assert_eq!(preview.state(), PreviewState::Idle);

    *server.fail.lock() = false;
    let shared = preview.upload().await.unwrap();
    assert!(shared.url.as_str().starts_with(mocks::SHARE_BASE));
}

#[tokio::test]
async fn test_non_url_reply_is_invalid_response() {
    use axum::routing::post;

    let app = axum::Router::new().route("/upload", post(|| async { "<html>busy</html>" }));
    let addr = mocks::spawn_router(app).await;
    let settings = UploadSettings::default().with_endpoint(format!("http://{}/upload", addr));
    let preview = PreviewSession::new(photo(), &settings).unwrap();

    let err = preview.upload().await.unwrap_err();
    assert!(matches!(err, MirrorError::InvalidResponse(_)));
    assert_eq!(preview.state(), PreviewState::Idle);
}

#[test]
fn test_qr_decodes_to_link() {
    let link = "https://temp.sh/zYxWv/image.jpg";
    let code = ShareCode::new(link).unwrap();
    assert_eq!(decode_qr(&code), link);
    assert!(!code.to_terminal().is_empty());
}
