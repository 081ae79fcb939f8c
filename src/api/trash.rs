use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{PageParams, StoreScope, ValidatedJson};
use crate::auth::AuthUser;
use crate::domain::value_objects::Page;
use crate::services::products::ProductDetail;
use crate::services::trash::{BulkDeleteReport, BulkRestoreReport, PurgeReport, TrashStats, TrashedProduct};
use crate::services::TrashService;
use crate::state::AppState;
use crate::Result;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/products/trash/bulk-restore", post(bulk_restore))
        .route("/products/trash/bulk-delete", post(bulk_delete))
        .route("/products/trash/:store_id", get(list))
        .route("/products/trash/:store_id/stats", get(stats))
        .route("/products/trash/:store_id/empty", delete(empty))
        .route("/products/:id/permanent", delete(permanent_delete))
        .route("/products/:id/restore", patch(restore))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct BulkProductsBody {
    #[validate(length(min = 1))]
    product_ids: Vec<Uuid>,
    store_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct EmptyParams {
    days: Option<u32>,
}

/// `DELETE /products/:id` moves the product to the trash.
pub(super) async fn move_to_trash(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>, Query(scope): Query<StoreScope>) -> Result<Json<ProductDetail>> {
    Ok(Json(TrashService::new(&s).move_to_trash(id, user.user_id, scope.store_id).await?))
}

async fn restore(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>, Query(scope): Query<StoreScope>) -> Result<Json<ProductDetail>> {
    Ok(Json(TrashService::new(&s).restore_from_trash(id, user.user_id, scope.store_id).await?))
}

async fn permanent_delete(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>, Query(scope): Query<StoreScope>) -> Result<Json<PurgeReport>> {
    Ok(Json(TrashService::new(&s).permanent_delete(id, user.user_id, scope.store_id).await?))
}

async fn list(State(s): State<AppState>, _user: AuthUser, Path(store_id): Path<Uuid>, Query(p): Query<PageParams>) -> Result<Json<Page<TrashedProduct>>> {
    Ok(Json(TrashService::new(&s).get_trash(store_id, p.request()).await?))
}

async fn stats(State(s): State<AppState>, _user: AuthUser, Path(store_id): Path<Uuid>) -> Result<Json<TrashStats>> {
    Ok(Json(TrashService::new(&s).trash_stats(store_id).await?))
}

async fn empty(State(s): State<AppState>, user: AuthUser, Path(store_id): Path<Uuid>, Query(p): Query<EmptyParams>) -> Result<Json<PurgeReport>> {
    Ok(Json(TrashService::new(&s).empty_trash(store_id, user.user_id, p.days).await?))
}

async fn bulk_restore(State(s): State<AppState>, user: AuthUser, ValidatedJson(body): ValidatedJson<BulkProductsBody>) -> Result<Json<BulkRestoreReport>> {
    Ok(Json(TrashService::new(&s).bulk_restore(&body.product_ids, user.user_id, body.store_id).await?))
}

async fn bulk_delete(State(s): State<AppState>, user: AuthUser, ValidatedJson(body): ValidatedJson<BulkProductsBody>) -> Result<Json<BulkDeleteReport>> {
    Ok(Json(TrashService::new(&s).bulk_permanent_delete(&body.product_ids, user.user_id, body.store_id).await?))
}
