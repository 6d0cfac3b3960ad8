use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AuthError;
use crate::services::build_service_client;

/// Client for the account endpoints: login, register, logout, token check.
pub struct AuthClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: Option<String>,
    user: Option<UserProfile>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub email: String,
}

/// An authenticated session as returned by login/register.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub user: UserProfile,
}

/// Mirror of the server's email shape check, applied before the request goes
/// out so obviously bad input never costs a round-trip.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty()
        && !host.is_empty()
        && !tld.is_empty()
        && tld.chars().all(char::is_alphanumeric)
        && !email.contains(char::is_whitespace)
}

/// Password strength rule the server enforces: at least 8 characters, one
/// digit, one uppercase letter.
#[must_use]
pub fn is_strong_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(char::is_uppercase)
}

impl AuthClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_service_client(),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.create_session("/api/auth/login", email, password)
            .await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.create_session("/api/auth/register", email, password)
            .await
    }

    async fn create_session(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        if !is_valid_email(email) {
            return Err(AuthError::Rejected("Invalid email address".into()));
        }
        if !is_strong_password(password) {
            return Err(AuthError::Rejected(
                "Password must be at least 8 characters with a digit and an uppercase letter"
                    .into(),
            ));
        }

        let url = format!("{}{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CredentialsRequest { email, password })
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(AuthError::Rejected(error));
        }
        match (status.is_success(), body.access_token, body.user) {
            (true, Some(access_token), Some(user)) => Ok(AuthSession { access_token, user }),
            _ => Err(AuthError::Rejected(format!(
                "Unexpected response from auth service (status {status})"
            ))),
        }
    }

    /// Validate a stored token. `Ok` means the token is live; `Rejected`
    /// means the server cleanly refused it; `Transport` means the check
    /// itself could not run and nothing can be concluded.
    pub async fn current_user(&self, token: &str) -> Result<UserProfile, AuthError> {
        let url = format!("{}/api/auth/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(format!(
                "Token rejected (status {})",
                response.status()
            )));
        }

        let body: UserResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(body.user)
    }

    /// Best-effort server-side session teardown; failures are logged and
    /// swallowed because the local token is cleared regardless.
    pub async fn logout(&self, token: &str) {
        let url = format!("{}/api/auth/logout", self.base_url);
        match self.client.post(&url).bearer_auth(token).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "logout request rejected");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "logout request failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.co"));
    }

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user @example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn password_strength_requires_length_digit_uppercase() {
        assert!(is_strong_password("Redesign1"));
        assert!(!is_strong_password("short1A"));
        assert!(!is_strong_password("nodigitshere"));
        assert!(!is_strong_password("noupper123"));
    }

    #[tokio::test]
    async fn login_returns_session_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(serde_json::json!({
                "email": "user@example.com",
                "password": "Redesign1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt-123",
                "user": { "email": "user@example.com" },
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri());
        let session = client.login("user@example.com", "Redesign1").await.unwrap();

        assert_eq!(session.access_token, "jwt-123");
        assert_eq!(session.user.email, "user@example.com");
    }

    #[tokio::test]
    async fn login_surfaces_server_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Invalid email or password",
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri());
        let err = client
            .login("user@example.com", "Redesign1")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Rejected(msg) if msg.contains("Invalid email")));
    }

    #[tokio::test]
    async fn login_rejects_weak_password_without_network() {
        let client = AuthClient::new("http://localhost:1");
        let err = client.login("user@example.com", "weak").await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn current_user_distinguishes_rejection_from_transport_fault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/user"))
            .and(header("Authorization", "Bearer stale-token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri());
        let rejected = client.current_user("stale-token").await.unwrap_err();
        assert!(matches!(rejected, AuthError::Rejected(_)));

        let unreachable = AuthClient::new("http://127.0.0.1:1");
        let fault = unreachable.current_user("any").await.unwrap_err();
        assert!(matches!(fault, AuthError::Transport(_)));
    }

    #[tokio::test]
    async fn logout_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        // Must not panic or error on either a 500 or an unreachable host.
        AuthClient::new(&server.uri()).logout("jwt").await;
        AuthClient::new("http://127.0.0.1:1").logout("jwt").await;
    }
}
