use crate::client::PipelineClient;
use crate::error::{CaptionError, Result};
use crate::generate::{interpret, GenerationOutcome};
use crate::transport::Transport;
use crate::types::RawResponse;

/// Outcome of polling for captions after a pending generation.
#[derive(Debug, Clone)]
pub struct PollResult {
    /// Attempts actually issued.
    pub attempts: u32,
    pub last_response: Option<RawResponse>,
    /// Captions, or the terminal failure. Budget exhaustion is
    /// [`CaptionError::PollTimeout`].
    pub outcome: Result<Vec<String>>,
}

impl<T: Transport> PipelineClient<T> {
    /// Re-issue the flavor-less generate-captions request until results
    /// appear or the attempt budget runs out.
    ///
    /// The poll interval elapses in full before every attempt, and attempts
    /// never overlap. `on_attempt` is called with the 1-based attempt number
    /// before each wait.
    pub async fn poll_captions<F>(&self, bearer: &str, image_id: &str, mut on_attempt: F) -> PollResult
    where
        F: FnMut(u32),
    {
        let max_attempts = self.config.max_poll_attempts;
        let mut last_response = None;

        for attempt in 1..=max_attempts {
            on_attempt(attempt);
            tokio::time::sleep(self.config.poll_interval).await;

            let resp = match self.request_captions(bearer, image_id, None).await {
                Ok(resp) => resp,
                Err(e) => {
                    return PollResult {
                        attempts: attempt,
                        last_response,
                        outcome: Err(e),
                    }
                }
            };

            let outcome = interpret(&resp);
            last_response = Some(resp);
            match outcome {
                Ok(GenerationOutcome::Pending) => {
                    tracing::debug!(image_id, attempt, max_attempts, "captions still pending");
                }
                Ok(GenerationOutcome::Results(captions)) => {
                    return PollResult {
                        attempts: attempt,
                        last_response,
                        outcome: Ok(captions),
                    };
                }
                Err(e) => {
                    return PollResult {
                        attempts: attempt,
                        last_response,
                        outcome: Err(e),
                    };
                }
            }
        }

        tracing::warn!(image_id, max_attempts, "poll budget exhausted, captions still processing");
        PollResult {
            attempts: max_attempts,
            last_response,
            outcome: Err(CaptionError::PollTimeout {
                attempts: max_attempts,
            }),
        }
    }
}
