use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use survey_core::models::{OAuthRequest, OAuthResponse};
use survey_core::AuthError;

use crate::api::TOKEN_PATH;
use crate::ApiClient;

/// Authenticated context for every call after login. Created only by
/// [`ApiClient::authenticate`]; a value of this type always carries a
/// non-empty bearer token.
#[derive(Clone)]
pub struct Session {
    bearer_token: String,
    token_obtained_at: DateTime<Utc>,
    expires_in: Option<Duration>,
}

impl Session {
    pub(crate) fn new(
        bearer_token: impl Into<String>,
        token_obtained_at: DateTime<Utc>,
        expires_in: Option<Duration>,
    ) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            token_obtained_at,
            expires_in,
        }
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    pub fn token_obtained_at(&self) -> DateTime<Utc> {
        self.token_obtained_at
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    /// True once the token lifetime reported at login has elapsed at `now`.
    /// A token without a reported lifetime never expires locally.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Some(lifetime) = self.expires_in else {
            return false;
        };
        match chrono::Duration::from_std(lifetime) {
            Ok(lifetime) => now >= self.token_obtained_at + lifetime,
            Err(_) => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("bearer_token", &"<redacted>")
            .field("token_obtained_at", &self.token_obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl ApiClient {
    /// Exchanges user credentials for a [`Session`] using the OAuth2
    /// password grant. The whole exchange, response body included, is
    /// bounded by the configured auth timeout.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let request = OAuthRequest::password_grant(
            &self.options.client_id,
            &self.options.client_secret,
            username,
            password,
        );
        let url = self.build_url(TOKEN_PATH);
        let timeout = self.options.auth_timeout;

        tracing::debug!(url = %url, username = %username, "Requesting access token");

        let exchange = async {
            let response = self
                .client
                .post(&url)
                .header(ACCEPT, "application/json")
                .json(&request)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| {
                tracing::error!(timeout_ms = timeout.as_millis() as u64, "Authentication timed out");
                AuthError::Timeout(timeout)
            })?
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Authentication rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        let token: OAuthResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        let access_token = token
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::MissingToken)?;

        tracing::info!(
            username = %username,
            expires_in = token.expires_in,
            "Login successful"
        );

        Ok(Session::new(
            access_token,
            Utc::now(),
            token.expires_in.map(Duration::from_secs),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_without_lifetime_never_expires() {
        let session = Session::new("tok", Utc::now(), None);
        assert!(!session.is_expired());
    }

    #[test]
    fn session_expires_after_lifetime() {
        let obtained = Utc::now();
        let session = Session::new("tok", obtained, Some(Duration::from_secs(60)));
        assert!(!session.is_expired_at(obtained + chrono::Duration::seconds(59)));
        assert!(session.is_expired_at(obtained + chrono::Duration::seconds(60)));
    }

    #[test]
    fn debug_redacts_token() {
        let session = Session::new("secret-token", Utc::now(), None);
        assert!(!format!("{:?}", session).contains("secret-token"));
    }
}
