use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::{DeletedCount, IdsBody, ValidatedJson};
use crate::auth::AuthUser;
use crate::domain::aggregates::Comment;
use crate::domain::value_objects::Page;
use crate::services::comments::{CommentQuery, CommentStats, CreateCommentInput, UpdateCommentInput};
use crate::services::CommentService;
use crate::state::AppState;
use crate::Result;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create).get(list))
        .route("/comments/stats", get(stats))
        .route("/comments/bulk-delete", post(bulk_remove))
        .route("/comments/product/:product_id", get(find_by_product))
        .route("/comments/:id", get(find_one).patch(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsParams {
    product_id: Option<Uuid>,
}

async fn create(State(s): State<AppState>, user: AuthUser, ValidatedJson(input): ValidatedJson<CreateCommentInput>) -> Result<(StatusCode, Json<Comment>)> {
    Ok((StatusCode::CREATED, Json(CommentService::new(&s).create(&user, input).await?)))
}

async fn list(State(s): State<AppState>, _user: AuthUser, Query(q): Query<CommentQuery>) -> Result<Json<Page<Comment>>> {
    Ok(Json(CommentService::new(&s).list(&q).await?))
}

async fn stats(State(s): State<AppState>, _user: AuthUser, Query(p): Query<StatsParams>) -> Result<Json<CommentStats>> {
    Ok(Json(CommentService::new(&s).stats(p.product_id).await?))
}

async fn find_by_product(State(s): State<AppState>, _user: AuthUser, Path(product_id): Path<Uuid>, Query(q): Query<CommentQuery>) -> Result<Json<Page<Comment>>> {
    Ok(Json(CommentService::new(&s).find_by_product(product_id, &q).await?))
}

async fn find_one(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Comment>> {
    Ok(Json(CommentService::new(&s).find_one(id).await?))
}

async fn update(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<UpdateCommentInput>) -> Result<Json<Comment>> {
    Ok(Json(CommentService::new(&s).update(id, &user, input).await?))
}

async fn remove(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Comment>> {
    Ok(Json(CommentService::new(&s).remove(id, &user).await?))
}

async fn bulk_remove(State(s): State<AppState>, user: AuthUser, ValidatedJson(body): ValidatedJson<IdsBody>) -> Result<Json<DeletedCount>> {
    Ok(Json(DeletedCount { deleted_count: CommentService::new(&s).bulk_remove(&body.ids, &user).await? }))
}
