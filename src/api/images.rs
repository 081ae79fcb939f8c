use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{read_files, read_single_file, IdsBody, ValidatedJson};
use crate::auth::AuthUser;
use crate::domain::aggregates::ProductImage;
use crate::domain::value_objects::Page;
use crate::services::images::{CreateImageInput, ImagePosition, ImageQuery, ImageRemoval, ImageStats, UpdateImageInput};
use crate::services::ImageService;
use crate::state::AppState;
use crate::Result;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/products/:id/images", get(find_by_product).post(upload))
        .route("/products/:id/images/reorder", patch(reorder))
        .route("/products/:id/images/:image_id", axum::routing::put(replace).delete(remove))
        .route("/products/:id/images/:image_id/main", patch(set_main))
        .route("/product-images", post(create).get(list))
        .route("/product-images/stats", get(stats))
        .route("/product-images/bulk-delete", post(bulk_remove))
        .route("/product-images/:id", get(find_one).patch(update).delete(remove_one))
}

#[derive(Debug, Deserialize, Validate)]
struct ReorderBody {
    #[validate(length(min = 1))]
    images: Vec<ImagePosition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsParams {
    product_id: Option<Uuid>,
}

async fn find_by_product(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Vec<ProductImage>>> {
    Ok(Json(ImageService::new(&s).find_by_product(id).await?))
}

async fn upload(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, multipart: Multipart) -> Result<(StatusCode, Json<Vec<ProductImage>>)> {
    let files = read_files(multipart).await?;
    Ok((StatusCode::CREATED, Json(ImageService::new(&s).upload(id, files).await?)))
}

async fn reorder(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(body): ValidatedJson<ReorderBody>) -> Result<Json<Vec<ProductImage>>> {
    Ok(Json(ImageService::new(&s).reorder(id, &body.images).await?))
}

async fn replace(State(s): State<AppState>, _user: AuthUser, Path((id, image_id)): Path<(Uuid, Uuid)>, multipart: Multipart) -> Result<Json<ProductImage>> {
    let svc = ImageService::new(&s);
    owned_by(&svc, id, image_id).await?;
    let file = read_single_file(multipart).await?;
    Ok(Json(svc.replace(image_id, file).await?))
}

async fn remove(State(s): State<AppState>, _user: AuthUser, Path((id, image_id)): Path<(Uuid, Uuid)>) -> Result<Json<ImageRemoval>> {
    let svc = ImageService::new(&s);
    owned_by(&svc, id, image_id).await?;
    Ok(Json(svc.remove(image_id).await?))
}

async fn set_main(State(s): State<AppState>, _user: AuthUser, Path((id, image_id)): Path<(Uuid, Uuid)>) -> Result<Json<ProductImage>> {
    Ok(Json(ImageService::new(&s).set_main(id, image_id).await?))
}

async fn owned_by(svc: &ImageService, product_id: Uuid, image_id: Uuid) -> Result<()> {
    if svc.find_one(image_id).await?.product_id != product_id {
        return Err(crate::CatalogError::not_found(format!("Image {image_id} not found on product {product_id}")));
    }
    Ok(())
}

async fn create(State(s): State<AppState>, _user: AuthUser, ValidatedJson(input): ValidatedJson<CreateImageInput>) -> Result<(StatusCode, Json<ProductImage>)> {
    Ok((StatusCode::CREATED, Json(ImageService::new(&s).create(input).await?)))
}

async fn list(State(s): State<AppState>, _user: AuthUser, Query(q): Query<ImageQuery>) -> Result<Json<Page<ProductImage>>> {
    Ok(Json(ImageService::new(&s).list(&q).await?))
}

async fn stats(State(s): State<AppState>, _user: AuthUser, Query(p): Query<StatsParams>) -> Result<Json<ImageStats>> {
    Ok(Json(ImageService::new(&s).stats(p.product_id).await?))
}

async fn bulk_remove(State(s): State<AppState>, _user: AuthUser, ValidatedJson(body): ValidatedJson<IdsBody>) -> Result<Json<ImageRemoval>> {
    Ok(Json(ImageService::new(&s).bulk_remove(&body.ids).await?))
}

async fn find_one(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<ProductImage>> {
    Ok(Json(ImageService::new(&s).find_one(id).await?))
}

async fn update(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<UpdateImageInput>) -> Result<Json<ProductImage>> {
    Ok(Json(ImageService::new(&s).update(id, input).await?))
}

async fn remove_one(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<ImageRemoval>> {
    Ok(Json(ImageService::new(&s).remove(id).await?))
}
