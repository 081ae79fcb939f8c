use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use super::{DeletedCount, IdsBody, ValidatedJson};
use crate::auth::AuthUser;
use crate::domain::aggregates::Customer;
use crate::domain::value_objects::Page;
use crate::services::customers::{CreateCustomerInput, CustomerQuery, CustomerStats, UpdateCustomerInput};
use crate::services::CustomerService;
use crate::state::AppState;
use crate::Result;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers", post(create).get(list))
        .route("/customers/stats", get(stats))
        .route("/customers/bulk-delete", post(bulk_remove))
        .route("/customers/user/:user_id", get(find_by_user))
        .route("/customers/:id", get(find_one).patch(update).delete(remove))
}

async fn create(State(s): State<AppState>, _user: AuthUser, ValidatedJson(input): ValidatedJson<CreateCustomerInput>) -> Result<(StatusCode, Json<Customer>)> {
    Ok((StatusCode::CREATED, Json(CustomerService::new(&s).create(input).await?)))
}

async fn list(State(s): State<AppState>, _user: AuthUser, Query(q): Query<CustomerQuery>) -> Result<Json<Page<Customer>>> {
    Ok(Json(CustomerService::new(&s).list(&q).await?))
}

async fn stats(State(s): State<AppState>, _user: AuthUser) -> Result<Json<CustomerStats>> {
    Ok(Json(CustomerService::new(&s).stats().await?))
}

async fn find_by_user(State(s): State<AppState>, _user: AuthUser, Path(user_id): Path<Uuid>) -> Result<Json<Customer>> {
    Ok(Json(CustomerService::new(&s).find_by_user(user_id).await?))
}

async fn find_one(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Customer>> {
    Ok(Json(CustomerService::new(&s).find_one(id).await?))
}

async fn update(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>, ValidatedJson(input): ValidatedJson<UpdateCustomerInput>) -> Result<Json<Customer>> {
    Ok(Json(CustomerService::new(&s).update(id, input).await?))
}

async fn remove(State(s): State<AppState>, _user: AuthUser, Path(id): Path<Uuid>) -> Result<Json<Customer>> {
    Ok(Json(CustomerService::new(&s).remove(id).await?))
}

async fn bulk_remove(State(s): State<AppState>, _user: AuthUser, ValidatedJson(body): ValidatedJson<IdsBody>) -> Result<Json<DeletedCount>> {
    Ok(Json(DeletedCount { deleted_count: CustomerService::new(&s).bulk_remove(&body.ids).await? }))
}
