use serde::{Deserialize, Serialize};

/// Body of `POST /dxauth/oauth2/token`.
#[derive(Clone, Serialize)]
pub struct OAuthRequest {
    pub client_id: String,
    pub grant_type: String,
    pub username: String,
    pub password: String,
    pub client_secret: String,
}

impl OAuthRequest {
    pub fn password_grant(
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            grant_type: "password".to_string(),
            username: username.to_string(),
            password: password.to_string(),
            client_secret: client_secret.to_string(),
        }
    }
}

impl std::fmt::Debug for OAuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthRequest")
            .field("client_id", &self.client_id)
            .field("grant_type", &self.grant_type)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Token endpoint response. Every field is optional on the wire; a missing
/// `access_token` is rejected by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}
