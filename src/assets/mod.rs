//! Remote asset host
//!
//! Uploads image binaries and deletes them again. Every call is a best-effort
//! remote operation that can fail independently of the database.

pub mod cloudinary;
pub mod memory;
pub mod transform;

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use serde::Serialize;

use crate::{CatalogError, Result};

pub use cloudinary::CloudinaryHost;
pub use memory::InMemoryAssetHost;

/// A file received from a client, before validation.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub url: String,
    pub asset_id: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub format: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AssetDeletion {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

#[async_trait]
pub trait AssetHost: Send + Sync {
    async fn upload_one(&self, file: UploadFile, folder: &str) -> Result<UploadedAsset>;

    async fn delete_one(&self, asset_id: &str) -> Result<()>;

    /// All-or-nothing: one failed upload fails the batch.
    async fn upload_many(&self, files: Vec<UploadFile>, folder: &str) -> Result<Vec<UploadedAsset>> {
        if files.is_empty() { return Err(CatalogError::bad_request("No files provided")); }
        try_join_all(files.into_iter().map(|f| self.upload_one(f, folder))).await
    }

    /// Never fails as a whole; per-asset failures land in `failed`.
    async fn delete_many(&self, asset_ids: &[String]) -> AssetDeletion {
        let results = join_all(asset_ids.iter().map(|id| async move { (id, self.delete_one(id).await) })).await;
        let mut outcome = AssetDeletion::default();
        for (id, result) in results {
            match result {
                Ok(()) => outcome.deleted.push(id.clone()),
                Err(e) => {
                    tracing::warn!(asset_id = %id, error = %e, "asset deletion failed");
                    outcome.failed.push(id.clone());
                }
            }
        }
        outcome
    }

    /// Uploads the replacement first; the old asset is only removed once the
    /// new one exists.
    async fn replace(&self, old_asset_id: Option<&str>, file: UploadFile, folder: &str) -> Result<(UploadedAsset, AssetDeletion)> {
        let uploaded = self.upload_one(file, folder).await?;
        let old: Vec<String> = old_asset_id.map(str::to_string).into_iter().collect();
        let deletion = self.delete_many(&old).await;
        Ok((uploaded, deletion))
    }
}
