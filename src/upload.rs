use serde_json::{json, Value};

use crate::client::PipelineClient;
use crate::config::is_supported_content_type;
use crate::error::{CaptionError, Result};
use crate::transport::Transport;
use crate::types::{ImageFile, Presigned};

impl<T: Transport> PipelineClient<T> {
    /// Upload a local file and return its public URL.
    ///
    /// Validates the declared content type, requests a presigned write
    /// target, PUTs the bytes there, then returns the matching CDN URL.
    /// Any failure aborts the stage; nothing is retried.
    pub async fn upload(&self, bearer: &str, file: &ImageFile) -> Result<String> {
        if !is_supported_content_type(&file.content_type) {
            return Err(CaptionError::UnsupportedType(file.content_type.clone()));
        }

        let presigned = self.presign(bearer, &file.content_type).await?;

        let resp = self
            .transport
            .put_bytes(&presigned.presigned_url, &file.content_type, &file.bytes)
            .await?;
        if !resp.is_success() {
            return Err(CaptionError::UploadFailure {
                status: resp.status,
                body: resp.body,
            });
        }

        tracing::info!(
            file = %file.name,
            bytes = file.bytes.len(),
            cdn_url = %presigned.cdn_url,
            "uploaded image"
        );
        Ok(presigned.cdn_url)
    }

    /// Request a presigned write URL and public read URL for `content_type`.
    pub async fn presign(&self, bearer: &str, content_type: &str) -> Result<Presigned> {
        let url = self.config.endpoint("/pipeline/generate-presigned-url");
        let resp = self
            .transport
            .post_json(&url, bearer, &json!({ "contentType": content_type }))
            .await?;

        if !resp.is_success() {
            return Err(CaptionError::PresignFailure {
                status: Some(resp.status),
                body: resp.body,
            });
        }

        let omitted = || CaptionError::PresignFailure {
            status: None,
            body: resp.body.clone(),
        };
        let json: Value = serde_json::from_str(&resp.body).map_err(|_| omitted())?;
        let field = |name: &str| {
            json.get(name)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        match (field("presignedUrl"), field("cdnUrl")) {
            (Some(presigned_url), Some(cdn_url)) => Ok(Presigned {
                presigned_url,
                cdn_url,
            }),
            _ => Err(omitted()),
        }
    }
}
