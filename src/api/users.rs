use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::ValidatedJson;
use crate::assets::UploadFile;
use crate::auth::AuthUser;
use crate::domain::aggregates::{Role, User, UserLocation};
use crate::services::users::{AdminUpdateUserInput, FullProfile, ProfileChange, UpdateProfileInput, UserRemoval};
use crate::services::{AuthService, UserService};
use crate::state::AppState;
use crate::{CatalogError, Result};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth", get(list))
        .route("/auth/me", get(me))
        .route("/auth/profile", get(profile).put(update_profile))
        .route("/auth/:id", get(find_one).patch(update).delete(remove))
        .route("/auth/:id/locations", get(locations))
        .route("/auth/:id/location/default", get(default_location))
        .route("/auth/:id/location/:location_id/set-default", patch(set_default_location))
        .route("/auth/:id/location/:location_id", delete(delete_location))
}

#[derive(Debug, Default, Deserialize)]
struct RoleQuery {
    role: Option<Role>,
}

/// Profile form: `name`, `username`, `email`, a JSON `locations` array and
/// optional `profile`/`thumbnail` files.
struct ProfileForm {
    input: UpdateProfileInput,
    profile: Option<UploadFile>,
    thumbnail: Option<UploadFile>,
}

async fn read_profile_form(mut multipart: Multipart) -> Result<ProfileForm> {
    let mut form = ProfileForm { input: UpdateProfileInput::default(), profile: None, thumbnail: None };
    while let Some(field) = multipart.next_field().await.map_err(|e| CatalogError::bad_request(e.body_text()))? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
            let bytes = field.bytes().await.map_err(|e| CatalogError::bad_request(e.body_text()))?;
            let file = UploadFile { file_name, content_type, bytes: bytes.to_vec() };
            match name.as_str() {
                "profile" => form.profile = Some(file),
                "thumbnail" => form.thumbnail = Some(file),
                other => return Err(CatalogError::bad_request(format!("Unexpected file field: {other}"))),
            }
            continue;
        }
        let text = field.text().await.map_err(|e| CatalogError::bad_request(e.body_text()))?;
        match name.as_str() {
            "name" => form.input.name = Some(text),
            "username" => form.input.username = Some(text),
            "email" => form.input.email = Some(text),
            "locations" => {
                form.input.locations = serde_json::from_str(&text)
                    .map_err(|e| CatalogError::bad_request(format!("Invalid locations: {e}")))?
            }
            other => tracing::debug!(field = other, "ignoring unknown profile field"),
        }
    }
    Ok(form)
}

async fn me(State(s): State<AppState>, user: AuthUser) -> Result<Json<FullProfile>> {
    Ok(Json(UserService::new(&s).full_profile(user.user_id).await?))
}

async fn profile(State(s): State<AppState>, user: AuthUser) -> Result<Json<User>> {
    Ok(Json(AuthService::new(&s).profile(user.user_id).await?))
}

async fn update_profile(State(s): State<AppState>, user: AuthUser, multipart: Multipart) -> Result<Json<ProfileChange>> {
    let form = read_profile_form(multipart).await?;
    Ok(Json(UserService::new(&s).update_profile(user.user_id, form.input, form.profile, form.thumbnail).await?))
}

async fn list(State(s): State<AppState>, user: AuthUser, Query(q): Query<RoleQuery>) -> Result<Json<Vec<User>>> {
    Ok(Json(UserService::new(&s).list(&user, q.role).await?))
}

async fn find_one(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<User>> {
    Ok(Json(UserService::new(&s).find(&user, id).await?))
}

async fn update(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<AdminUpdateUserInput>) -> Result<Json<User>> {
    Ok(Json(UserService::new(&s).update(&user, id, input).await?))
}

async fn remove(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<UserRemoval>> {
    Ok(Json(UserService::new(&s).remove(&user, id).await?))
}

async fn locations(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Vec<UserLocation>>> {
    Ok(Json(UserService::new(&s).locations(&user, id).await?))
}

async fn default_location(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<UserLocation>> {
    Ok(Json(UserService::new(&s).default_location(&user, id).await?))
}

async fn set_default_location(State(s): State<AppState>, user: AuthUser, Path((id, location_id)): Path<(Uuid, Uuid)>) -> Result<Json<UserLocation>> {
    Ok(Json(UserService::new(&s).set_default_location(&user, id, location_id).await?))
}

async fn delete_location(State(s): State<AppState>, user: AuthUser, Path((id, location_id)): Path<(Uuid, Uuid)>) -> Result<StatusCode> {
    UserService::new(&s).delete_location(&user, id, location_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
