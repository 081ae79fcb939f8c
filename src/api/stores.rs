use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use super::{read_single_file, ValidatedJson};
use crate::auth::AuthUser;
use crate::domain::aggregates::StoreImageType;
use crate::domain::value_objects::Page;
use crate::services::stores::{CreateStoreInput, StoreImageChange, StoreQuery, StoreRemoval, StoreStats, StoreView, UpdateStoreInput};
use crate::services::StoreService;
use crate::state::AppState;
use crate::{CatalogError, Result};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/stores", post(create).get(list))
        .route("/stores/me", get(mine))
        .route("/stores/:id", get(find_one).patch(update).delete(remove))
        .route("/stores/:id/stats", get(stats))
        .route("/stores/:id/images/:image_type", put(set_image))
}

async fn create(State(s): State<AppState>, user: AuthUser, ValidatedJson(input): ValidatedJson<CreateStoreInput>) -> Result<(StatusCode, Json<StoreView>)> {
    Ok((StatusCode::CREATED, Json(StoreService::new(&s).create(&user, input).await?)))
}

async fn list(State(s): State<AppState>, _user: AuthUser, Query(q): Query<StoreQuery>) -> Result<Json<Page<StoreView>>> {
    Ok(Json(StoreService::new(&s).list(&q).await?))
}

async fn mine(State(s): State<AppState>, user: AuthUser) -> Result<Json<StoreView>> {
    Ok(Json(StoreService::new(&s).find_by_user(user.user_id).await?))
}

async fn find_one(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<StoreView>> {
    Ok(Json(StoreService::new(&s).find_one(id).await?))
}

async fn update(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<UpdateStoreInput>) -> Result<Json<StoreView>> {
    Ok(Json(StoreService::new(&s).update(id, &user, input).await?))
}

async fn remove(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<StoreRemoval>> {
    Ok(Json(StoreService::new(&s).remove(id, &user).await?))
}

async fn stats(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<StoreStats>> {
    Ok(Json(StoreService::new(&s).stats(id).await?))
}

/// `PUT /stores/:id/images/logo` or `.../banner` with a multipart file.
async fn set_image(State(s): State<AppState>, user: AuthUser, Path((id, image_type)): Path<(Uuid, String)>, multipart: Multipart) -> Result<Json<StoreImageChange>> {
    let image_type = StoreImageType::parse(&image_type.to_ascii_uppercase())
        .ok_or_else(|| CatalogError::bad_request(format!("Unknown store image type: {image_type}")))?;
    let file = read_single_file(multipart).await?;
    Ok(Json(StoreService::new(&s).set_image(id, &user, image_type, file).await?))
}
