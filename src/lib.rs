//! OpenSASE Catalog
//!
//! Self-hosted multi-store catalog backend.
//!
//! ## Features
//! - Store and product catalog management
//! - Product trash (soft delete, restore, permanent delete, retention sweep)
//! - Product images on a remote asset host, variants and attributes
//! - Comments and customer records
//! - Local + Google OAuth authentication with JWT access/refresh tokens

pub mod api;
pub mod assets;
pub mod auth;
pub mod config;
pub mod domain;
pub mod events;
pub mod repository;
pub mod services;
pub mod state;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub use config::Config;
pub use state::AppState;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Asset host error: {0}")]
    AssetHost(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`CatalogError`], kept per item in batch results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Forbidden,
    Unauthorized,
    Conflict,
    Validation,
    Storage,
    AssetHost,
    Internal,
}

impl CatalogError {
    pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }
    pub fn bad_request(msg: impl Into<String>) -> Self { Self::BadRequest(msg.into()) }
    pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }
    pub fn unauthorized(msg: impl Into<String>) -> Self { Self::Unauthorized(msg.into()) }
    pub fn conflict(msg: impl Into<String>) -> Self { Self::Conflict(msg.into()) }
    pub fn internal(msg: impl Into<String>) -> Self { Self::Internal(msg.into()) }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
            Self::AssetHost(_) => ErrorKind::AssetHost,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Uniqueness conflicts surface to clients as 400, like other invalid input.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BadRequest | ErrorKind::Conflict | ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::AssetHost => StatusCode::BAD_GATEWAY,
            ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                Self::Conflict(db.constraint().map(|c| format!("Unique constraint violated: {c}")).unwrap_or_else(|| db.message().to_string()))
            }
            sqlx::Error::RowNotFound => Self::NotFound("Record not found".to_string()),
            _ => Self::Storage(e.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CatalogError {
    fn from(e: sqlx::migrate::MigrateError) -> Self { Self::Storage(e.to_string()) }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self { Self::AssetHost(e.to_string()) }
}

impl From<jsonwebtoken::errors::Error> for CatalogError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!(error = %e, "JWT validation failed");
        Self::Unauthorized("Invalid or expired token".to_string())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "statusCode": status.as_u16(),
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_bad_request() {
        let err = CatalogError::conflict("Product slug must be unique");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_asset_host_maps_to_bad_gateway() {
        assert_eq!(CatalogError::AssetHost("timeout".into()).status(), StatusCode::BAD_GATEWAY);
    }
}
