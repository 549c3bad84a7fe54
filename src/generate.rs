use serde_json::json;

use crate::client::PipelineClient;
use crate::error::{CaptionError, Result};
use crate::normalize::{normalize_captions, parse_caption_body};
use crate::transport::Transport;
use crate::types::{FlavorId, RawResponse};

/// Statuses the pipeline uses to reject the flavor parameter.
const PARAMETER_REJECTED: [u16; 2] = [400, 422];

/// Successful generate-captions result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Normalized captions, never empty.
    Results(Vec<String>),
    /// Accepted but not finished; poll for results.
    Pending,
}

/// Which request produced the final generate-captions response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The flavor-qualified request (or the only request, without a flavor).
    Primary,
    /// The flavor-less retry after a parameter rejection.
    Fallback,
}

/// Outcome of the generation stage plus what the diagnostics panel needs.
#[derive(Debug, Clone)]
pub struct Generation {
    pub attempt: Attempt,
    /// Body of the rejected primary response when the fallback was taken.
    pub rejection: Option<String>,
    /// The last response received, if any request got one.
    pub last_response: Option<RawResponse>,
    pub outcome: Result<GenerationOutcome>,
}

impl Generation {
    pub fn flavor_rejected(&self) -> bool {
        self.attempt == Attempt::Fallback
    }
}

/// Interpret one generate-captions response.
pub(crate) fn interpret(resp: &RawResponse) -> Result<GenerationOutcome> {
    if !resp.is_success() {
        return Err(CaptionError::GenerationFailure {
            status: resp.status,
            body: resp.body.clone(),
        });
    }
    let items = parse_caption_body(resp)?;
    if items.is_empty() {
        Ok(GenerationOutcome::Pending)
    } else {
        Ok(GenerationOutcome::Results(normalize_captions(items)))
    }
}

impl<T: Transport> PipelineClient<T> {
    /// Issue a single generate-captions request.
    pub async fn request_captions(
        &self,
        bearer: &str,
        image_id: &str,
        flavor_id: Option<FlavorId>,
    ) -> Result<RawResponse> {
        let url = self.config.endpoint("/pipeline/generate-captions");
        let body = match flavor_id {
            Some(flavor) => json!({ "imageId": image_id, "humorFlavorId": flavor }),
            None => json!({ "imageId": image_id }),
        };
        self.transport.post_json(&url, bearer, &body).await
    }

    /// Request captions for a registered image.
    ///
    /// With a flavor, a 400/422 answer is taken as "flavor parameter not
    /// supported here" and the request is retried exactly once without it.
    /// Every other failure status is terminal. Success bodies that are not
    /// JSON arrays are [`CaptionError::UnexpectedShape`], never retried.
    pub async fn generate(
        &self,
        bearer: &str,
        image_id: &str,
        flavor_id: Option<FlavorId>,
    ) -> Generation {
        let primary = match self.request_captions(bearer, image_id, flavor_id).await {
            Ok(resp) => resp,
            Err(e) => {
                return Generation {
                    attempt: Attempt::Primary,
                    rejection: None,
                    last_response: None,
                    outcome: Err(e),
                }
            }
        };

        let rejected = flavor_id.is_some()
            && !primary.is_success()
            && PARAMETER_REJECTED.contains(&primary.status);
        if !rejected {
            return Generation {
                attempt: Attempt::Primary,
                rejection: None,
                outcome: interpret(&primary),
                last_response: Some(primary),
            };
        }

        tracing::warn!(
            image_id,
            status = primary.status,
            body = %primary.body,
            "flavor parameter rejected, retrying without it"
        );

        match self.request_captions(bearer, image_id, None).await {
            Ok(fallback) => Generation {
                attempt: Attempt::Fallback,
                rejection: Some(primary.body),
                outcome: interpret(&fallback),
                last_response: Some(fallback),
            },
            // The fallback got no response, so there is no last exchange to show.
            Err(e) => Generation {
                attempt: Attempt::Fallback,
                rejection: Some(primary.body),
                last_response: None,
                outcome: Err(e),
            },
        }
    }
}
