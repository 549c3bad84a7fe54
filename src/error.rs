use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::DebugStep;

/// Errors returned by caption pipeline operations.
///
/// `Display` keeps the diagnostic detail (status code, raw body);
/// [`CaptionError::user_message`] is the stable text shown to operators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptionError {
    /// The file's declared content type is not one the pipeline accepts.
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    /// The presign call failed (`status` set) or omitted a URL (`status` none).
    #[error("Presign failed (HTTP {status:?}): {body}")]
    PresignFailure { status: Option<u16>, body: String },

    /// The byte transfer to the presigned target was rejected.
    #[error("Upload failed with HTTP {status}: {body}")]
    UploadFailure { status: u16, body: String },

    /// The pipeline refused to register the image URL.
    #[error("Image registration failed with HTTP {status}: {body}")]
    RegistrationFailure { status: u16, body: String },

    /// Registration succeeded but no image id came back.
    #[error("Registration response missing imageId: {body}")]
    MissingImageId { body: String },

    /// generate-captions returned a non-success status.
    #[error("Caption generation failed with HTTP {status}: {body}")]
    GenerationFailure { status: u16, body: String },

    /// generate-captions succeeded but the body was not a JSON array.
    #[error("Unexpected captions response (HTTP {status}): {body}")]
    UnexpectedShape { status: u16, body: String },

    /// The poll budget ran out while the job was still pending.
    #[error("Captions still pending after {attempts} poll attempts")]
    PollTimeout { attempts: u32 },

    /// A stored image failed the reachability probe.
    #[error("Image URL is not publicly accessible: {url}")]
    Unreachable { url: String },

    #[error("No active session")]
    NoActiveSession,

    #[error("No flavor selected")]
    NoFlavorSelected,

    /// The flavor step-count check did not confirm any steps.
    #[error("Flavor not ready: {0}")]
    FlavorNotReady(String),

    #[error("No image source chosen")]
    NoImageSource,

    /// Transport-level request failure with context.
    #[error("{context}: {message}")]
    Network { context: String, message: String },

    #[error("Failed to read image: {0}")]
    ImageRead(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for CaptionError {
    fn from(err: serde_json::Error) -> Self {
        CaptionError::Json(err.to_string())
    }
}

/// Serializable discriminant of [`CaptionError`], stored on run records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    UnsupportedType,
    PresignFailure,
    UploadFailure,
    RegistrationFailure,
    MissingImageId,
    GenerationFailure,
    UnexpectedShape,
    PollTimeout,
    Unreachable,
    NoActiveSession,
    NoFlavorSelected,
    FlavorNotReady,
    NoImageSource,
    Network,
    ImageRead,
    Json,
}

impl CaptionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptionError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            CaptionError::PresignFailure { .. } => ErrorKind::PresignFailure,
            CaptionError::UploadFailure { .. } => ErrorKind::UploadFailure,
            CaptionError::RegistrationFailure { .. } => ErrorKind::RegistrationFailure,
            CaptionError::MissingImageId { .. } => ErrorKind::MissingImageId,
            CaptionError::GenerationFailure { .. } => ErrorKind::GenerationFailure,
            CaptionError::UnexpectedShape { .. } => ErrorKind::UnexpectedShape,
            CaptionError::PollTimeout { .. } => ErrorKind::PollTimeout,
            CaptionError::Unreachable { .. } => ErrorKind::Unreachable,
            CaptionError::NoActiveSession => ErrorKind::NoActiveSession,
            CaptionError::NoFlavorSelected => ErrorKind::NoFlavorSelected,
            CaptionError::FlavorNotReady(_) => ErrorKind::FlavorNotReady,
            CaptionError::NoImageSource => ErrorKind::NoImageSource,
            CaptionError::Network { .. } => ErrorKind::Network,
            CaptionError::ImageRead(_) => ErrorKind::ImageRead,
            CaptionError::Json(_) => ErrorKind::Json,
        }
    }

    /// Operator-facing text for banners and run history.
    pub fn user_message(&self) -> String {
        match self {
            CaptionError::UnsupportedType(_) => {
                "Unsupported file type. Use JPG, PNG, WebP, GIF, or HEIC.".into()
            }
            CaptionError::PresignFailure { status: Some(_), .. } => {
                "Failed to generate upload URL.".into()
            }
            CaptionError::PresignFailure { status: None, .. } => {
                "Upload URL not provided by API.".into()
            }
            CaptionError::UploadFailure { .. } => "Failed to upload image bytes.".into(),
            CaptionError::RegistrationFailure { .. } => {
                "Failed to register uploaded image.".into()
            }
            CaptionError::MissingImageId { .. } => "API did not return an image id.".into(),
            CaptionError::GenerationFailure { .. } => "Failed to generate captions.".into(),
            CaptionError::UnexpectedShape { .. } => {
                "Unexpected response from captions API. Check status and raw response below."
                    .into()
            }
            CaptionError::PollTimeout { .. } => {
                "Still processing, try again in a few seconds.".into()
            }
            CaptionError::Unreachable { .. } => {
                "Selected image URL is not publicly accessible. Upload a file instead.".into()
            }
            CaptionError::NoActiveSession => "No active session. Please sign in again.".into(),
            CaptionError::NoFlavorSelected => "Please select a humor flavor.".into(),
            CaptionError::FlavorNotReady(msg) => msg.clone(),
            CaptionError::NoImageSource => {
                "Please select one or more test images, or upload a file.".into()
            }
            CaptionError::Network { .. } | CaptionError::ImageRead(_) | CaptionError::Json(_) => {
                self.to_string()
            }
        }
    }

    /// Soft failures: the remote job may still finish later.
    pub fn is_soft(&self) -> bool {
        matches!(self, CaptionError::PollTimeout { .. })
    }

    /// Diagnostic panel entry for failures of a remote exchange.
    ///
    /// Transport failures have no status and are labelled `network`; callers
    /// that know which stage was talking relabel the step.
    pub fn debug_step(&self, image_url: Option<&str>) -> Option<DebugStep> {
        let network_detail;
        let (step, status, detail) = match self {
            CaptionError::Network { .. } => {
                network_detail = self.to_string();
                ("network", None, &network_detail)
            }
            CaptionError::PresignFailure { status, body } => {
                ("generate-presigned-url", *status, body)
            }
            CaptionError::UploadFailure { status, body } => ("upload bytes", Some(*status), body),
            CaptionError::RegistrationFailure { status, body } => {
                ("upload-image-from-url", Some(*status), body)
            }
            CaptionError::MissingImageId { body } => ("upload-image-from-url", None, body),
            CaptionError::GenerationFailure { status, body }
            | CaptionError::UnexpectedShape { status, body } => {
                ("generate-captions", Some(*status), body)
            }
            _ => return None,
        };
        Some(DebugStep {
            step: step.to_string(),
            status,
            detail: detail.clone(),
            image_url: image_url.map(String::from),
        })
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CaptionError>;
