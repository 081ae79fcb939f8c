//! HTTP surface
//!
//! Every route lives under `/api`; catalog handlers take an [`AuthUser`](crate::auth::AuthUser)
//! so unauthenticated calls are rejected before they reach a service.

mod attributes;
mod auth;
mod comments;
mod customers;
mod images;
mod products;
mod stores;
mod trash;
mod users;

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request};
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::assets::transform::MAX_UPLOAD_BYTES;
use crate::assets::UploadFile;
use crate::domain::value_objects::PageRequest;
use crate::state::AppState;
use crate::{CatalogError, Result};

/// Room for a handful of images at the per-file upload cap.
const MAX_BODY_BYTES: usize = 5 * MAX_UPLOAD_BYTES;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(trash::routes())
        .merge(products::routes())
        .merge(images::routes())
        .merge(attributes::routes())
        .merge(stores::routes())
        .merge(comments::routes())
        .merge(customers::routes());

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-catalog"})) }))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JSON body that has passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CatalogError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| CatalogError::bad_request(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest { PageRequest::new(self.page, self.limit) }
}

#[derive(Debug, Deserialize, Validate)]
pub struct IdsBody {
    #[validate(length(min = 1))]
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCount {
    pub deleted_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreScope {
    pub store_id: Option<Uuid>,
}

/// Collects every file part of a multipart body.
pub(crate) async fn read_files(mut multipart: Multipart) -> Result<Vec<UploadFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| CatalogError::bad_request(e.body_text()))? {
        let Some(file_name) = field.file_name().map(str::to_string) else { continue };
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = field.bytes().await.map_err(|e| CatalogError::bad_request(e.body_text()))?;
        files.push(UploadFile { file_name, content_type, bytes: bytes.to_vec() });
    }
    Ok(files)
}

pub(crate) async fn read_single_file(multipart: Multipart) -> Result<UploadFile> {
    read_files(multipart).await?.into_iter().next().ok_or_else(|| CatalogError::bad_request("No file provided"))
}
