use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CaptionError, ErrorKind, Result};

/// Numeric identifier of a humor flavor.
pub type FlavorId = i64;

/// Status code and raw body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A locally supplied image file awaiting upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    /// Declared MIME type, e.g. `image/png`.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring its content type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CaptionError::ImageRead(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            content_type: content_type_for_path(path).to_string(),
            bytes,
        })
    }
}

/// Map a file extension to the MIME type the pipeline expects.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// An image already stored on the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub is_common_use: Option<bool>,
}

impl StoredImage {
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            is_common_use: None,
        }
    }
}

/// What one invocation should caption.
#[derive(Debug, Clone, Default)]
pub enum ImageSource {
    #[default]
    None,
    File(ImageFile),
    /// Stored images, in selection order.
    Stored(Vec<StoredImage>),
}

/// Result of the flavor step-count check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlavorReadiness {
    Ready,
    /// The flavor has no steps or could not be validated.
    NotReady(String),
}

impl FlavorReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, FlavorReadiness::Ready)
    }
}

/// Presigned write target plus the public URL it will be readable at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presigned {
    pub presigned_url: String,
    pub cdn_url: String,
}

/// Where the image of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunSource {
    File,
    StoredImage,
}

impl RunSource {
    pub fn as_str(&self) -> &str {
        match self {
            RunSource::File => "file",
            RunSource::StoredImage => "image",
        }
    }
}

/// Run lifecycle: Pending -> Success | Error. Terminal states never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Pending,
    Success,
    Error,
}

/// One end-to-end attempt to caption a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub source: RunSource,
    pub image_url: String,
    pub status: RunStatus,
    /// Populated only when `status` is `Success`.
    pub captions: Vec<String>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub image_id: Option<String>,
    pub flavor_rejected: bool,
    /// Remote exchange that caused the failure, if any.
    pub debug: Option<DebugStep>,
}

impl RunRecord {
    /// Fresh pending record with a unique id.
    pub fn pending(source: RunSource, image_url: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", source.as_str(), uuid::Uuid::new_v4()),
            source,
            image_url: image_url.into(),
            status: RunStatus::Pending,
            captions: Vec::new(),
            error: None,
            error_kind: None,
            image_id: None,
            flavor_rejected: false,
            debug: None,
        }
    }

    /// True when the run ended in a soft poll timeout.
    pub fn is_still_processing(&self) -> bool {
        self.error_kind == Some(ErrorKind::PollTimeout)
    }
}

/// One entry in the diagnostics panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugStep {
    pub step: String,
    pub status: Option<u16>,
    pub detail: String,
    pub image_url: Option<String>,
}

/// Most recent generate-captions exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationDiagnostics {
    pub image_id: String,
    pub status: Option<u16>,
    pub body: Option<String>,
}

/// Progress notifications emitted while an invocation runs.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted { run_id: String, image_url: String },
    FlavorRejected { run_id: String, body: String },
    PollAttempt {
        run_id: String,
        attempt: u32,
        max_attempts: u32,
    },
    RunSettled(RunRecord),
}
