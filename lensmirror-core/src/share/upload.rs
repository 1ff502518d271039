//! Artifact encoding and multipart upload

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::UploadSettings;
use crate::error::{MirrorError, Result, ResultExt};

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "file";

/// A captured photo or recorded video
#[derive(Debug, Clone)]
pub enum Artifact {
    /// Photo pixels
    Photo(RgbaImage),
    /// Recorded video file
    Video(PathBuf),
}

impl Artifact {
    /// Load an artifact from disk, treating `.mp4`/`.mov` as video
    pub fn from_path(path: &Path) -> Result<Self> {
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "mp4" | "mov" | "m4v"))
            .unwrap_or(false);

        if is_video {
            if !path.is_file() {
                return Err(MirrorError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                )));
            }
            return Ok(Self::Video(path.to_path_buf()));
        }

        let image = image::open(path)
            .map_err(MirrorError::from)
            .context(format!("Failed to load photo {}", path.display()))?;
        Ok(Self::Photo(image.to_rgba8()))
    }

    /// `photo` or `video`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Photo(_) => "photo",
            Self::Video(_) => "video",
        }
    }

    /// Encode for upload: photos as JPEG, videos as their file bytes
    pub async fn encode(&self, jpeg_quality: u8) -> Result<EncodedArtifact> {
        match self {
            Self::Photo(image) => Ok(EncodedArtifact {
                bytes: encode_jpeg(image, jpeg_quality)?,
                file_name: "image.jpg",
                mime: "image/jpeg",
            }),
            Self::Video(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(MirrorError::from)
                    .context(format!("Failed to read video {}", path.display()))?;
                Ok(EncodedArtifact {
                    bytes,
                    file_name: "video.mp4",
                    mime: "video/mp4",
                })
            }
        }
    }
}

/// Upload-ready artifact bytes and their part metadata
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// File name sent with the part
    pub file_name: &'static str,
    /// MIME type sent with the part
    pub mime: &'static str,
}

/// Encode RGBA pixels as JPEG, dropping alpha
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(&rgb)?;
    debug!(
        "Encoded {}x{} photo as {} byte JPEG (quality {})",
        rgb.width(),
        rgb.height(),
        bytes.len(),
        quality
    );
    Ok(bytes)
}

/// Parse an upload service reply into the share URL
pub fn parse_share_url(reply: &str) -> Result<Url> {
    let trimmed = reply.trim();
    let url = Url::parse(trimmed).map_err(|e| {
        MirrorError::InvalidResponse(format!("Upload reply is not a URL ({}): {:?}", e, trimmed))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(MirrorError::InvalidResponse(format!(
            "Upload reply has unsupported scheme {}",
            scheme
        ))),
    }
}

/// Posts artifacts to a file sharing endpoint
#[derive(Debug, Clone)]
pub struct Uploader {
    client: Client,
    endpoint: Url,
}

impl Uploader {
    /// Create an uploader for the configured endpoint
    pub fn new(settings: &UploadSettings) -> Result<Self> {
        settings.validate_strict().map_err(MirrorError::config)?;

        let endpoint = Url::parse(&settings.endpoint).map_err(|e| {
            MirrorError::config(format!("Invalid upload endpoint {}: {}", settings.endpoint, e))
        })?;
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self { client, endpoint })
    }

    /// Upload endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Upload one artifact and return its share URL
    pub async fn upload(&self, artifact: EncodedArtifact) -> Result<Url> {
        info!(
            "Uploading {} ({} bytes) to {}",
            artifact.file_name,
            artifact.bytes.len(),
            self.endpoint
        );

        let part = Part::bytes(artifact.bytes)
            .file_name(artifact.file_name)
            .mime_str(artifact.mime)?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        let reply = response.text().await?;

        let url = parse_share_url(&reply)?;
        info!("Upload complete: {}", url);
        Ok(url)
    }
}
