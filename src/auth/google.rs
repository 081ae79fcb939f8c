//! Google OAuth 2.0 authorization-code client

use reqwest::Url;
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::{CatalogError, Result};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Profile fields used to find or create the local user.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuth {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Self { Self { client: reqwest::Client::new(), config } }

    /// Consent screen URL; `state` comes back on the redirect.
    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("access_type", "offline"),
                ("state", state),
            ],
        )
        .map_err(|e| CatalogError::internal(format!("Invalid Google authorize URL: {e}")))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<GoogleProfile> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.client.post(TOKEN_URL).form(&params).send().await?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Google code exchange rejected");
            return Err(CatalogError::unauthorized("Google authorization failed"));
        }
        let token: TokenResponse = response.json().await?;

        let response = self.client.get(USERINFO_URL).bearer_auth(&token.access_token).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::unauthorized("Google profile unavailable"));
        }
        let profile: GoogleProfile = response.json().await?;
        if profile.email_verified == Some(false) {
            return Err(CatalogError::unauthorized("Google email is not verified"));
        }
        Ok(profile)
    }
}
