//! Asset host kept in process memory

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::transform::{prepare_upload, PreparedImage};
use super::{AssetHost, UploadFile, UploadedAsset};
use crate::{CatalogError, Result};

#[derive(Default)]
pub struct InMemoryAssetHost {
    assets: RwLock<HashMap<String, UploadedAsset>>,
    fail_deletions: AtomicBool,
}

impl InMemoryAssetHost {
    pub fn new() -> Self { Self::default() }

    /// Makes every subsequent `delete_one` fail until switched off again.
    pub fn fail_deletions(&self, fail: bool) { self.fail_deletions.store(fail, Ordering::SeqCst); }

    pub async fn contains(&self, asset_id: &str) -> bool { self.assets.read().await.contains_key(asset_id) }

    pub async fn len(&self) -> usize { self.assets.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.assets.read().await.is_empty() }
}

#[async_trait]
impl AssetHost for InMemoryAssetHost {
    async fn upload_one(&self, file: UploadFile, folder: &str) -> Result<UploadedAsset> {
        let prepared = prepare_upload(&file)?;
        let asset_id = format!("{folder}/{}-{}", &prepared.digest[..12], Uuid::new_v4().simple());
        let asset = UploadedAsset {
            url: format!("memory://{asset_id}.{}", PreparedImage::FORMAT),
            asset_id: asset_id.clone(),
            width: prepared.width,
            height: prepared.height,
            bytes: prepared.bytes.len() as u64,
            format: PreparedImage::FORMAT.to_string(),
        };
        self.assets.write().await.insert(asset_id, asset.clone());
        Ok(asset)
    }

    async fn delete_one(&self, asset_id: &str) -> Result<()> {
        if self.fail_deletions.load(Ordering::SeqCst) {
            return Err(CatalogError::AssetHost(format!("Simulated failure deleting {asset_id}")));
        }
        self.assets.write().await.remove(asset_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::transform::sample_png;

    fn png() -> UploadFile {
        UploadFile { file_name: "a.png".into(), content_type: "image/png".into(), bytes: sample_png(8, 8) }
    }

    #[tokio::test]
    async fn test_delete_many_reports_failures() {
        let host = InMemoryAssetHost::new();
        let a = host.upload_one(png(), "products").await.unwrap();
        host.fail_deletions(true);
        let outcome = host.delete_many(&[a.asset_id.clone()]).await;
        assert_eq!(outcome.failed, vec![a.asset_id.clone()]);
        assert!(host.contains(&a.asset_id).await);
        host.fail_deletions(false);
        assert_eq!(host.delete_many(&[a.asset_id.clone()]).await.deleted, vec![a.asset_id]);
        assert!(host.is_empty().await);
    }

    #[tokio::test]
    async fn test_upload_many_rejects_empty_batch() {
        let host = InMemoryAssetHost::new();
        assert!(matches!(host.upload_many(vec![], "products").await, Err(CatalogError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_replace_removes_old_asset() {
        let host = InMemoryAssetHost::new();
        let old = host.upload_one(png(), "products").await.unwrap();
        let (new, deletion) = host.replace(Some(&old.asset_id), png(), "products").await.unwrap();
        assert_eq!(deletion.deleted, vec![old.asset_id.clone()]);
        assert!(!host.contains(&old.asset_id).await);
        assert!(host.contains(&new.asset_id).await);
    }
}
