//! Implementations of the local collaborators the orchestrator consults:
//! the flavor step-count validator and the credential provider.

use reqwest::Client;
use serde_json::{json, Value};

use crate::config::VALIDATION_TIMEOUT;
use crate::error::{CaptionError, Result};
use crate::types::{FlavorId, FlavorReadiness};
use crate::{FlavorValidator, SessionProvider};

const NO_STEPS: &str = "This flavor has no steps. Add steps first.";
const VALIDATION_UNAVAILABLE: &str = "Unable to validate flavor steps.";

/// Map a validate-endpoint answer to a readiness verdict.
pub fn readiness_from_response(status: u16, body: &str) -> FlavorReadiness {
    if (200..300).contains(&status) {
        return FlavorReadiness::Ready;
    }
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| NO_STEPS.to_string());
    FlavorReadiness::NotReady(message)
}

/// Validator backed by the console's `/app/api/flavors/validate` route.
#[derive(Debug, Clone)]
pub struct HttpFlavorValidator {
    http: Client,
    console_url: String,
}

impl HttpFlavorValidator {
    pub fn new(console_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            console_url: console_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Use a custom `reqwest::Client` (e.g. one carrying session cookies).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn console_url(&self) -> &str {
        &self.console_url
    }
}

impl FlavorValidator for HttpFlavorValidator {
    async fn check_steps(&self, flavor_id: FlavorId) -> FlavorReadiness {
        let url = format!("{}/app/api/flavors/validate", self.console_url);
        let resp = match self
            .http
            .post(&url)
            .timeout(VALIDATION_TIMEOUT)
            .json(&json!({ "flavorId": flavor_id }))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(flavor_id, error = %e, "flavor validation request failed");
                return FlavorReadiness::NotReady(VALIDATION_UNAVAILABLE.to_string());
            }
        };
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        readiness_from_response(status, &body)
    }
}

/// Session holding a bearer token obtained elsewhere.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    token: Option<String>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// A session with no credential; every invocation fails fast.
    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Result<String> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(CaptionError::NoActiveSession),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_ok() {
        assert_eq!(
            readiness_from_response(200, r#"{"ok": true}"#),
            FlavorReadiness::Ready
        );
    }

    #[test]
    fn test_readiness_uses_error_field() {
        let readiness = readiness_from_response(400, r#"{"ok": false, "error": "relation missing"}"#);
        assert_eq!(
            readiness,
            FlavorReadiness::NotReady("relation missing".into())
        );
    }

    #[test]
    fn test_readiness_defaults_to_no_steps() {
        assert_eq!(
            readiness_from_response(400, r#"{"ok": false}"#),
            FlavorReadiness::NotReady(NO_STEPS.into())
        );
        assert_eq!(
            readiness_from_response(500, "<html>"),
            FlavorReadiness::NotReady(NO_STEPS.into())
        );
    }

    #[test]
    fn test_validator_trims_console_url() {
        let v = HttpFlavorValidator::new("http://localhost:3000/");
        assert_eq!(v.console_url(), "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_static_session() {
        assert_eq!(
            StaticSession::new("tok").access_token().await.unwrap(),
            "tok"
        );
        assert_eq!(
            StaticSession::new("   ").access_token().await.unwrap_err(),
            CaptionError::NoActiveSession
        );
        assert_eq!(
            StaticSession::signed_out().access_token().await.unwrap_err(),
            CaptionError::NoActiveSession
        );
    }
}
