pub mod types;

use std::sync::Arc;

use arc_swap::ArcSwap;
use reqwest::Client;
use reqwest::header::COOKIE;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{AuthClient, CredentialStore};
use crate::error::AuthError;
use crate::services::{anonymous_cookie, build_service_client};

pub use types::{MAX_ANONYMOUS_RUNS, Remaining, UsageState};

#[derive(Debug, Deserialize)]
struct UsageCountResponse {
    #[serde(rename = "anonymousId")]
    anonymous_id: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    usage_count: u32,
    remaining: Remaining,
    authenticated: bool,
}

/// Gates pipeline entry on authentication or remaining anonymous quota.
///
/// The server is authoritative: the gate never decrements a count locally,
/// it only resynchronizes. A failed status check is fail-soft — the previous
/// state stays in place and the check can be retried later.
pub struct UsageGate {
    base_url: String,
    client: Client,
    auth: AuthClient,
    store: Arc<CredentialStore>,
    state: ArcSwap<UsageState>,
}

impl UsageGate {
    #[must_use]
    pub fn new(base_url: &str, store: Arc<CredentialStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_service_client(),
            auth: AuthClient::new(base_url),
            store,
            state: ArcSwap::from_pointee(UsageState::assumed_anonymous()),
        }
    }

    /// Last confirmed usage state.
    #[must_use]
    pub fn current(&self) -> UsageState {
        **self.state.load()
    }

    #[must_use]
    pub fn can_start(&self) -> bool {
        self.current().can_start()
    }

    /// Resynchronize from the server.
    ///
    /// With a stored token the token is validated first: a live token means
    /// authenticated + unlimited; a clean rejection clears the credential and
    /// falls through to the anonymous quota lookup. Transport faults leave
    /// the previous state untouched.
    pub async fn check_status(&self) -> Result<UsageState, AuthError> {
        if let Some(token) = self.store.token() {
            match self.auth.current_user(&token).await {
                Ok(user) => {
                    debug!(email = %user.email, "token confirmed");
                    let state = UsageState::authenticated_unlimited();
                    self.state.store(Arc::new(state));
                    return Ok(state);
                }
                Err(AuthError::Transport(e)) => {
                    return Err(AuthError::Transport(e));
                }
                Err(_) => {
                    debug!("stored token rejected, falling back to anonymous usage");
                    if let Err(e) = self.store.clear_token() {
                        warn!(error = %e, "failed to clear rejected credential");
                    }
                }
            }
        }

        let anonymous_id = self
            .store
            .ensure_anonymous_id()
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let url = format!("{}/api/usage/count", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(COOKIE, anonymous_cookie(&anonymous_id))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Transport(format!(
                "usage check failed (status {})",
                response.status()
            )));
        }

        let body: UsageCountResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if let Some(server_id) = &body.anonymous_id
            && let Err(e) = self.store.set_anonymous_id(server_id)
        {
            warn!(error = %e, "failed to persist server-issued anonymous id");
        }

        let state = UsageState {
            authenticated: body.authenticated,
            remaining: body.remaining,
        };
        self.state.store(Arc::new(state));
        Ok(state)
    }

    /// Post-fetch resynchronization: the server has recorded one more run, so
    /// refresh the remaining count. Failures only log — the attempt itself is
    /// unaffected.
    pub async fn resync(&self) {
        if let Err(e) = self.check_status().await {
            warn!(error = %e, "usage resync failed, keeping previous state");
        }
    }
}
