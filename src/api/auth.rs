use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::ValidatedJson;
use crate::auth::extract::cookie;
use crate::auth::signature::{self, SIGNATURE_HEADER};
use crate::auth::{AuthUser, RefreshUser, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::services::auth::{AuthSession, ChangePasswordInput, GoogleCallbackInput, LoginInput, RegisterInput};
use crate::services::AuthService;
use crate::state::AppState;
use crate::{CatalogError, Result};

const STATE_COOKIE: &str = "oauthState";

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/password", patch(change_password))
        .route("/auth/google/login", get(google_login))
        .route("/auth/google/redirect", get(google_redirect))
        .route("/auth/google/callback", post(google_callback))
}

fn set_cookie(state: &AppState, name: &str, value: &str, max_age: Duration) -> String {
    let secure = if state.config.is_production() { "; Secure" } else { "" };
    format!("{name}={value}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}{secure}", max_age.num_seconds().max(0))
}

/// Session body plus `accessToken`/`refreshToken` cookies.
fn with_cookies(state: &AppState, session: AuthSession) -> impl IntoResponse {
    let access = set_cookie(state, ACCESS_COOKIE, &session.tokens.access_token, state.jwt.access_ttl());
    let refresh = set_cookie(state, REFRESH_COOKIE, &session.tokens.refresh_token, state.jwt.refresh_ttl());
    (AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]), Json(session))
}

async fn register(State(s): State<AppState>, ValidatedJson(input): ValidatedJson<RegisterInput>) -> Result<Response> {
    let session = AuthService::new(&s).register(input).await?;
    Ok((StatusCode::CREATED, with_cookies(&s, session)).into_response())
}

async fn login(State(s): State<AppState>, ValidatedJson(input): ValidatedJson<LoginInput>) -> Result<Response> {
    let session = AuthService::new(&s).login(input).await?;
    Ok(with_cookies(&s, session).into_response())
}

async fn refresh(State(s): State<AppState>, user: RefreshUser) -> Result<Response> {
    let session = AuthService::new(&s).refresh(user.user_id).await?;
    Ok(with_cookies(&s, session).into_response())
}

async fn logout(State(s): State<AppState>) -> impl IntoResponse {
    let clear = |name: &str| set_cookie(&s, name, "", Duration::zero());
    (AppendHeaders([(SET_COOKIE, clear(ACCESS_COOKIE)), (SET_COOKIE, clear(REFRESH_COOKIE))]), StatusCode::NO_CONTENT)
}

async fn change_password(State(s): State<AppState>, user: AuthUser, ValidatedJson(input): ValidatedJson<ChangePasswordInput>) -> Result<StatusCode> {
    AuthService::new(&s).change_password(user.user_id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn google_login(State(s): State<AppState>) -> Result<Response> {
    let google = s.google.as_ref().ok_or_else(|| CatalogError::bad_request("Google sign-in is not configured"))?;
    let state = Uuid::new_v4().simple().to_string();
    let url = google.authorize_url(&state)?;
    let cookie = set_cookie(&s, STATE_COOKIE, &state, Duration::minutes(10));
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(url.as_str())).into_response())
}

#[derive(Debug, Deserialize)]
struct GoogleRedirect {
    code: String,
    state: String,
}

/// Google sends the user back here; on success the browser is forwarded to the
/// frontend with the access token and both cookies set.
async fn google_redirect(State(s): State<AppState>, headers: HeaderMap, Query(q): Query<GoogleRedirect>) -> Result<Response> {
    let google = s.google.as_ref().ok_or_else(|| CatalogError::bad_request("Google sign-in is not configured"))?;
    if cookie(&headers, STATE_COOKIE).as_deref() != Some(q.state.as_str()) {
        return Err(CatalogError::unauthorized("OAuth state mismatch"));
    }
    let profile = google.exchange_code(&q.code).await?;
    let session = AuthService::new(&s).google_login(profile).await?;
    let target = reqwest::Url::parse_with_params(
        &format!("{}/auth/callback", s.config.frontend_url.trim_end_matches('/')),
        &[("token", session.tokens.access_token.as_str())],
    )
    .map_err(|e| CatalogError::internal(format!("Invalid FRONTEND_URL: {e}")))?;
    let access = set_cookie(&s, ACCESS_COOKIE, &session.tokens.access_token, s.jwt.access_ttl());
    let refresh = set_cookie(&s, REFRESH_COOKIE, &session.tokens.refresh_token, s.jwt.refresh_ttl());
    let clear_state = set_cookie(&s, STATE_COOKIE, "", Duration::zero());
    tracing::info!(user_id = %session.user.id, "Google sign-in completed");
    Ok((AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh), (SET_COOKIE, clear_state)]), Redirect::to(target.as_str())).into_response())
}

/// Server-to-server sign-in from the frontend. The raw body must carry a
/// valid `x-catalog-signature` made with `GOOGLE_CALLBACK_SECRET`.
async fn google_callback(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let secret = s
        .config
        .google_callback_secret
        .as_deref()
        .ok_or_else(|| CatalogError::unauthorized("Google callback sign-in is not enabled"))?;
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CatalogError::unauthorized("Missing callback signature"))?;
    if let Err(e) = signature::verify(&body, header, secret, Utc::now().timestamp()) {
        tracing::warn!(error = %e, "rejected unsigned Google callback");
        return Err(e);
    }
    let input: GoogleCallbackInput =
        serde_json::from_slice(&body).map_err(|e| CatalogError::bad_request(format!("Invalid JSON body: {e}")))?;
    let session = AuthService::new(&s).google_callback(input).await?;
    Ok(with_cookies(&s, session).into_response())
}
