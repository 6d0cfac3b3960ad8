use std::sync::Arc;
use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::config::DEFAULT_SUGGESTION_TIMEOUT_SECS;
use crate::error::{AuthRequiredReason, PipelineError};
use crate::media::LocalImage;

use super::http::{anonymous_cookie, build_service_client, image_part, service_error};

/// A pipeline run always works through exactly this many suggestions; any
/// other count from the service is a malformed response, not a partial
/// success.
pub const SUGGESTION_COUNT: usize = 3;

/// Server-supplied 401 code meaning the anonymous quota ran out. This one
/// must never clear a stored credential; every other 401 means the credential
/// itself is invalid.
const ANONYMOUS_LIMIT_CODE: &str = "ANONYMOUS_USAGE_LIMIT";

/// One redesign suggestion. The title is display-only; the description is
/// what gets sent to the image-generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct SuggestionsResponse {
    suggestions: Vec<Suggestion>,
}

/// Client for the suggestion-generation endpoint: both input images go out
/// as one multipart request, exactly [`SUGGESTION_COUNT`] suggestions come
/// back.
pub struct SuggestionFetcher {
    base_url: String,
    client: Client,
    timeout: Duration,
    store: Arc<CredentialStore>,
}

impl SuggestionFetcher {
    #[must_use]
    pub fn new(base_url: &str, store: Arc<CredentialStore>) -> Self {
        Self::with_timeout(
            base_url,
            store,
            Duration::from_secs(DEFAULT_SUGGESTION_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn with_timeout(base_url: &str, store: Arc<CredentialStore>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_service_client(),
            timeout,
            store,
        }
    }

    /// Fetch the suggestion set for one attempt.
    ///
    /// Carries the bearer credential when one is stored and the anonymous
    /// identity cookie otherwise-or-also; applies the client-side deadline
    /// that distinguishes `TimedOut` from server failure.
    pub async fn fetch(
        &self,
        original: &LocalImage,
        inspiration: &LocalImage,
    ) -> Result<Vec<Suggestion>, PipelineError> {
        let form = Form::new()
            .part(
                "original",
                image_part(original).map_err(|e| PipelineError::Unknown(e.to_string()))?,
            )
            .part(
                "inspiration",
                image_part(inspiration).map_err(|e| PipelineError::Unknown(e.to_string()))?,
            );

        let url = format!("{}/api/claude-suggestions", self.base_url);
        let mut request = self.client.post(&url).multipart(form).timeout(self.timeout);
        if let Some(token) = self.store.token() {
            request = request.bearer_auth(token);
        }
        if let Some(id) = self.store.anonymous_id() {
            request = request.header(COOKIE, anonymous_cookie(&id));
        }

        debug!(url = %url, "requesting redesign suggestions");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::TimedOut(self.timeout.as_secs())
            } else {
                PipelineError::Unknown(format!("suggestion request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.map_unauthorized(response).await);
        }
        if !status.is_success() {
            return Err(service_error(response).await);
        }

        let body: SuggestionsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Unknown(format!("unable to parse server response: {e}")))?;

        if body.suggestions.len() != SUGGESTION_COUNT {
            return Err(PipelineError::MalformedResponse(format!(
                "expected {SUGGESTION_COUNT} suggestions, got {}",
                body.suggestions.len()
            )));
        }

        Ok(body.suggestions)
    }

    async fn map_unauthorized(&self, response: reqwest::Response) -> PipelineError {
        let body = response.text().await.unwrap_or_default();
        let code = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str().map(str::to_string)));

        if code.as_deref() == Some(ANONYMOUS_LIMIT_CODE) {
            return PipelineError::AuthRequired {
                reason: AuthRequiredReason::AnonymousLimit,
                credential_cleared: false,
            };
        }

        // Any other 401 means the stored credential is invalid or expired.
        let had_token = self.store.token().is_some();
        if had_token && let Err(e) = self.store.clear_token() {
            warn!(error = %e, "failed to clear rejected credential");
        }
        PipelineError::AuthRequired {
            reason: AuthRequiredReason::CredentialRejected,
            credential_cleared: had_token,
        }
    }
}
