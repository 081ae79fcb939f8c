use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::{DeletedCount, IdsBody, ValidatedJson};
use crate::auth::AuthUser;
use crate::domain::aggregates::ProductAttribute;
use crate::domain::value_objects::Page;
use crate::services::attributes::{AttributeQuery, AttributeStats, CreateAttributeInput, CreateAttributesInput, UpdateAttributeInput};
use crate::services::AttributeService;
use crate::state::AppState;
use crate::Result;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/product-attributes", post(create).get(list))
        .route("/product-attributes/bulk", post(create_many))
        .route("/product-attributes/bulk-delete", post(bulk_remove))
        .route("/product-attributes/stats", get(stats))
        .route("/product-attributes/product/:product_id", get(find_by_product))
        .route("/product-attributes/:id", get(find_one).patch(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsParams {
    product_id: Option<Uuid>,
}

async fn create(State(s): State<AppState>, _user: AuthUser, ValidatedJson(input): ValidatedJson<CreateAttributeInput>) -> Result<(StatusCode, Json<ProductAttribute>)> {
    Ok((StatusCode::CREATED, Json(AttributeService::new(&s).create(input).await?)))
}

async fn create_many(State(s): State<AppState>, _user: AuthUser, ValidatedJson(input): ValidatedJson<CreateAttributesInput>) -> Result<(StatusCode, Json<Vec<ProductAttribute>>)> {
    Ok((StatusCode::CREATED, Json(AttributeService::new(&s).create_many(input).await?)))
}

async fn list(State(s): State<AppState>, _user: AuthUser, Query(q): Query<AttributeQuery>) -> Result<Json<Page<ProductAttribute>>> {
    Ok(Json(AttributeService::new(&s).list(&q).await?))
}

async fn stats(State(s): State<AppState>, _user: AuthUser, Query(p): Query<StatsParams>) -> Result<Json<AttributeStats>> {
    Ok(Json(AttributeService::new(&s).stats(p.product_id).await?))
}

async fn find_by_product(State(s): State<AppState>, _user: AuthUser, Path(product_id): Path<Uuid>) -> Result<Json<Vec<ProductAttribute>>> {
    Ok(Json(AttributeService::new(&s).find_by_product(product_id).await?))
}

async fn find_one(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<ProductAttribute>> {
    Ok(Json(AttributeService::new(&s).find_one(id).await?))
}

async fn update(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<UpdateAttributeInput>) -> Result<Json<ProductAttribute>> {
    Ok(Json(AttributeService::new(&s).update(id, input).await?))
}

async fn remove(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<ProductAttribute>> {
    Ok(Json(AttributeService::new(&s).remove(id).await?))
}

async fn bulk_remove(State(s): State<AppState>, _user: AuthUser, ValidatedJson(body): ValidatedJson<IdsBody>) -> Result<Json<DeletedCount>> {
    Ok(Json(DeletedCount { deleted_count: AttributeService::new(&s).bulk_remove(&body.ids).await? }))
}
