//! Authentication: password hashing, JWT access/refresh tokens, request
//! extractors and the Google OAuth client.

pub mod extract;
pub mod google;
pub mod password;
pub mod signature;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::aggregates::{Role, User};
use crate::{CatalogError, Result};

pub use extract::{AuthUser, RefreshUser, ACCESS_COOKIE, REFRESH_COOKIE};
pub use google::{GoogleOAuth, GoogleProfile};
pub use password::{hash_password, verify_password};

/// Access token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Refresh token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signing keys for both token kinds. Access and refresh tokens use separate
/// secrets, so neither verifies as the other.
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn new(access_secret: &str, refresh_secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, &config.jwt_refresh_secret, config.jwt_expires_in, config.jwt_refresh_expires_in)
    }

    pub fn access_ttl(&self) -> Duration { self.access_ttl }
    pub fn refresh_ttl(&self) -> Duration { self.refresh_ttl }

    pub fn issue(&self, user: &User) -> Result<TokenPair> {
        let now = Utc::now();
        let access = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: (now + self.access_ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let refresh = RefreshClaims {
            sub: user.id.to_string(),
            exp: (now + self.refresh_ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        Ok(TokenPair {
            access_token: jsonwebtoken::encode(&Header::default(), &access, &self.access_encoding)?,
            refresh_token: jsonwebtoken::encode(&Header::default(), &refresh, &self.refresh_encoding)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims> {
        Ok(jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())?.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims> {
        Ok(jsonwebtoken::decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())?.claims)
    }
}

pub(crate) fn subject_id(sub: &str) -> Result<Uuid> {
    sub.parse().map_err(|_| CatalogError::unauthorized("Invalid token subject"))
}
