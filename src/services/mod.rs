//! Application services
//!
//! Each service is a cheap handle built from [`AppState`](crate::AppState);
//! all state lives in the catalog.

pub mod attributes;
pub mod auth;
pub mod comments;
pub mod customers;
pub mod images;
pub mod products;
pub mod stores;
pub mod trash;
pub mod users;

use serde::Serialize;
use uuid::Uuid;

use crate::assets::AssetHost;
use crate::repository::Catalog;
use crate::{CatalogError, ErrorKind, Result};

pub use attributes::AttributeService;
pub use auth::AuthService;
pub use comments::CommentService;
pub use customers::CustomerService;
pub use images::ImageService;
pub use products::ProductService;
pub use stores::StoreService;
pub use trash::TrashService;
pub use users::UserService;

#[derive(Clone, Debug, Serialize)]
pub struct BatchFailure {
    pub id: Uuid,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of a per-item batch. Items succeed or fail independently.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn record<T>(&mut self, id: Uuid, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => {
                self.succeeded.push(id);
                Some(v)
            }
            Err(e) => {
                tracing::debug!(%id, error = %e, "batch item failed");
                self.failed.push(BatchFailure { id, kind: e.kind(), message: e.to_string() });
                None
            }
        }
    }

    pub fn failed_ids(&self) -> Vec<Uuid> { self.failed.iter().map(|f| f.id).collect() }

    /// Partial success is success; only a batch where nothing succeeded is an error.
    pub fn ensure_any_succeeded(self, action: &str) -> Result<Self> {
        if !self.succeeded.is_empty() || self.failed.is_empty() { return Ok(self); }
        let details = self.failed.iter().map(|f| format!("{}: {}", f.id, f.message)).collect::<Vec<_>>().join("; ");
        Err(CatalogError::bad_request(format!("No items were {action}: {details}")))
    }
}

/// Rejects an empty id list and drops duplicates, keeping first occurrence order.
pub(crate) fn distinct_ids(ids: &[Uuid]) -> Result<Vec<Uuid>> {
    if ids.is_empty() { return Err(CatalogError::bad_request("ids must not be empty")); }
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) { out.push(*id); }
    }
    Ok(out)
}

/// Deletes queued assets from the host and clears the confirmed ones from the
/// ledger. Returns the ids still pending.
pub(crate) async fn release_assets(catalog: &dyn Catalog, assets: &dyn AssetHost, asset_ids: &[String]) -> Vec<String> {
    if asset_ids.is_empty() { return vec![]; }
    let deletion = assets.delete_many(asset_ids).await;
    if !deletion.deleted.is_empty() {
        if let Err(e) = catalog.clear_asset_deletions(&deletion.deleted).await {
            tracing::warn!(error = %e, "failed to clear released assets from the ledger");
        }
    }
    if !deletion.failed.is_empty() {
        tracing::warn!(count = deletion.failed.len(), "assets left for reconciliation");
    }
    deletion.failed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_report_partial_success_is_ok() {
        let mut report = BatchReport::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        report.record(a, Ok(()));
        report.record::<()>(b, Err(CatalogError::bad_request("Product is not in trash")));
        assert_eq!(report.failed_ids(), vec![b]);
        assert!(report.ensure_any_succeeded("restored").is_ok());
    }

    #[test]
    fn test_batch_report_total_failure_is_error() {
        let mut report = BatchReport::default();
        report.record::<()>(Uuid::new_v4(), Err(CatalogError::not_found("Product not found")));
        let err = report.ensure_any_succeeded("restored").unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
    }

    #[test]
    fn test_distinct_ids() {
        let a = Uuid::new_v4();
        assert_eq!(distinct_ids(&[a, a]).unwrap(), vec![a]);
        assert!(distinct_ids(&[]).is_err());
    }
}
