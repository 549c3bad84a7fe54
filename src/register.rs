use serde_json::{json, Value};

use crate::client::PipelineClient;
use crate::error::{CaptionError, Result};
use crate::transport::Transport;

/// Pull `imageId` out of a registration body. Strings and numbers are both
/// accepted; an empty string counts as missing.
pub(crate) fn extract_image_id(json: &Value) -> Option<String> {
    match json.get("imageId")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl<T: Transport> PipelineClient<T> {
    /// Register a public image URL with the pipeline and return its image id.
    ///
    /// Required for every run, whether the URL came from an upload or from a
    /// stored image.
    pub async fn register(&self, bearer: &str, image_url: &str) -> Result<String> {
        let url = self.config.endpoint("/pipeline/upload-image-from-url");
        let body = json!({
            "imageUrl": image_url,
            "isCommonUse": false,
        });
        let resp = self.transport.post_json(&url, bearer, &body).await?;

        if !resp.is_success() {
            return Err(CaptionError::RegistrationFailure {
                status: resp.status,
                body: resp.body,
            });
        }

        serde_json::from_str::<Value>(&resp.body)
            .ok()
            .as_ref()
            .and_then(extract_image_id)
            .ok_or(CaptionError::MissingImageId { body: resp.body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_string_id() {
        let json = json!({"imageId": "abc-123"});
        assert_eq!(extract_image_id(&json), Some("abc-123".into()));
    }

    #[test]
    fn test_extract_numeric_id() {
        let json = json!({"imageId": 991});
        assert_eq!(extract_image_id(&json), Some("991".into()));
    }

    #[test]
    fn test_extract_missing_or_empty() {
        assert_eq!(extract_image_id(&json!({})), None);
        assert_eq!(extract_image_id(&json!({"imageId": ""})), None);
        assert_eq!(extract_image_id(&json!({"imageId": null})), None);
        assert_eq!(extract_image_id(&json!(["imageId"])), None);
    }
}
