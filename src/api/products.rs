use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{PageParams, ValidatedJson};
use crate::auth::AuthUser;
use crate::domain::aggregates::ProductStatus;
use crate::domain::value_objects::Page;
use crate::services::products::{
    CreateProductInput, ProductDetail, ProductQuery, ProductStats, ProductSummary, SearchQuery, UpdateProductInput,
    VariantInput, VariantPatch, VariantView,
};
use crate::services::{BatchReport, ProductService};
use crate::state::AppState;
use crate::Result;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create).get(list))
        .route("/products/search", get(search))
        .route("/products/popular", get(popular))
        .route("/products/stats", get(stats))
        .route("/products/bulk-status", patch(bulk_status))
        .route("/products/slug/:slug", get(find_by_slug))
        .route("/products/store/:store_id", get(find_by_store))
        .route("/products/status/:status", get(find_by_status))
        .route("/products/category/:category", get(find_by_category))
        .route("/products/brand/:brand", get(find_by_brand))
        .route("/products/variants/:variant_id", patch(update_variant))
        .route("/products/:id", get(find_one).patch(update).delete(super::trash::move_to_trash))
        .route("/products/:id/variants", post(add_variant))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailParams {
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PopularParams {
    store_id: Option<Uuid>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
struct BulkStatusBody {
    #[validate(length(min = 1))]
    ids: Vec<Uuid>,
    status: ProductStatus,
}

async fn create(State(s): State<AppState>, _user: AuthUser, ValidatedJson(input): ValidatedJson<CreateProductInput>) -> Result<(StatusCode, Json<ProductDetail>)> {
    Ok((StatusCode::CREATED, Json(ProductService::new(&s).create(input).await?)))
}

async fn list(State(s): State<AppState>, _user: AuthUser, Query(q): Query<ProductQuery>) -> Result<Json<Page<ProductSummary>>> {
    Ok(Json(ProductService::new(&s).list(&q).await?))
}

async fn search(State(s): State<AppState>, _user: AuthUser, Query(q): Query<SearchQuery>) -> Result<Json<Page<ProductSummary>>> {
    Ok(Json(ProductService::new(&s).search(&q).await?))
}

async fn popular(State(s): State<AppState>, _user: AuthUser, Query(p): Query<PopularParams>) -> Result<Json<Vec<ProductSummary>>> {
    Ok(Json(ProductService::new(&s).popular(p.store_id, p.limit).await?))
}

async fn stats(State(s): State<AppState>, _user: AuthUser, Query(p): Query<super::StoreScope>) -> Result<Json<ProductStats>> {
    Ok(Json(ProductService::new(&s).stats(p.store_id).await?))
}

async fn bulk_status(State(s): State<AppState>, _user: AuthUser, ValidatedJson(body): ValidatedJson<BulkStatusBody>) -> Result<Json<BatchReport>> {
    Ok(Json(ProductService::new(&s).bulk_update_status(&body.ids, body.status).await?))
}

async fn find_by_slug(State(s): State<AppState>, _user: AuthUser, Path(slug): Path<String>) -> Result<Json<ProductDetail>> {
    Ok(Json(ProductService::new(&s).find_by_slug(&slug).await?))
}

async fn find_by_store(State(s): State<AppState>, _user: AuthUser, Path(store_id): Path<Uuid>, Query(q): Query<ProductQuery>) -> Result<Json<Page<ProductSummary>>> {
    Ok(Json(ProductService::new(&s).find_by_store(store_id, &q).await?))
}

async fn find_by_status(State(s): State<AppState>, _user: AuthUser, Path(status): Path<String>, Query(p): Query<PageParams>) -> Result<Json<Page<ProductSummary>>> {
    let status: ProductStatus = status.parse()?;
    Ok(Json(ProductService::new(&s).find_by_status(status, p.request()).await?))
}

async fn find_by_category(State(s): State<AppState>, _user: AuthUser, Path(category): Path<String>, Query(p): Query<PageParams>) -> Result<Json<Page<ProductSummary>>> {
    Ok(Json(ProductService::new(&s).find_by_category(&category, p.request()).await?))
}

async fn find_by_brand(State(s): State<AppState>, _user: AuthUser, Path(brand): Path<String>, Query(p): Query<PageParams>) -> Result<Json<Page<ProductSummary>>> {
    Ok(Json(ProductService::new(&s).find_by_brand(&brand, p.request()).await?))
}

async fn find_one(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, Query(p): Query<DetailParams>) -> Result<Json<ProductDetail>> {
    Ok(Json(ProductService::new(&s).find_one(id, p.include_deleted).await?))
}

async fn update(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<UpdateProductInput>) -> Result<Json<ProductDetail>> {
    Ok(Json(ProductService::new(&s).update(id, input).await?))
}

async fn add_variant(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<VariantInput>) -> Result<(StatusCode, Json<VariantView>)> {
    Ok((StatusCode::CREATED, Json(ProductService::new(&s).add_variant(id, input).await?)))
}

async fn update_variant(State(s): State<AppState>, _user: AuthUser, Path(variant_id): Path<Uuid>, ValidatedJson(patch): ValidatedJson<VariantPatch>) -> Result<Json<VariantView>> {
    Ok(Json(ProductService::new(&s).update_variant(variant_id, patch).await?))
}
