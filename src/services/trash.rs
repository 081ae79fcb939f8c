//! Product trash lifecycle
//!
//! Trash, restore and purge. Purges remove the product graph in one storage
//! transaction which also queues the remote image assets; the assets are then
//! deleted from the host after commit. Ids the host refused stay queued and
//! are returned as `orphaned_assets` until [`TrashService::reconcile_orphaned_assets`]
//! clears them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::products::{load_detail, ProductDetail};
use super::{distinct_ids, release_assets, BatchReport};
use crate::assets::AssetHost;
use crate::domain::aggregates::{trash_cutoff, Product, ProductImage};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Page, PageRequest};
use crate::events::EventPublisher;
use crate::repository::{Catalog, ImageFilter, ProductFilter, ProductOrder};
use crate::state::AppState;
use crate::{CatalogError, Result};

const RECONCILE_BATCH: u32 = 100;

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub deleted_count: u64,
    pub product_ids: Vec<Uuid>,
    pub orphaned_assets: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRestoreReport {
    pub restored_count: usize,
    pub failed_ids: Vec<Uuid>,
    pub report: BatchReport,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReport {
    pub deleted_count: usize,
    pub failed_ids: Vec<Uuid>,
    pub orphaned_assets: Vec<String>,
    pub report: BatchReport,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<ProductImage>,
    pub days_in_trash: i64,
    pub days_until_purge: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashStats {
    pub total_items: u64,
    pub eligible_for_purge: u64,
    pub oldest_deleted_at: Option<DateTime<Utc>>,
    pub newest_deleted_at: Option<DateTime<Utc>>,
    pub retention_days: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub released: usize,
    pub still_pending: Vec<String>,
}

#[derive(Clone)]
pub struct TrashService {
    catalog: Arc<dyn Catalog>,
    assets: Arc<dyn AssetHost>,
    events: EventPublisher,
    retention_days: u32,
}

impl TrashService {
    pub fn new(state: &AppState) -> Self {
        Self {
            catalog: state.catalog.clone(),
            assets: state.assets.clone(),
            events: state.events.clone(),
            retention_days: state.config.trash_retention_days,
        }
    }

    /// Loads the product and checks it belongs to `store_id` when one is given.
    async fn owned_product(&self, id: Uuid, store_id: Option<Uuid>) -> Result<Product> {
        let product = self.catalog.find_product(id).await?.ok_or_else(|| CatalogError::not_found(format!("Product {id} not found")))?;
        if let Some(store_id) = store_id {
            if product.store_id() != store_id {
                return Err(CatalogError::forbidden(format!("Product {id} does not belong to store {store_id}")));
            }
        }
        Ok(product)
    }

    async fn require_store(&self, store_id: Uuid) -> Result<()> {
        match self.catalog.find_store(store_id).await? {
            Some(_) => Ok(()),
            None => Err(CatalogError::not_found(format!("Store {store_id} not found"))),
        }
    }

    pub async fn move_to_trash(&self, id: Uuid, user_id: Uuid, store_id: Option<Uuid>) -> Result<ProductDetail> {
        let mut product = self.owned_product(id, store_id).await?;
        product.move_to_trash(Utc::now())?;
        self.catalog.save_product(&product).await?;
        tracing::info!(product_id = %id, %user_id, "product moved to trash");
        self.events.publish_all(product.take_events()).await;
        load_detail(self.catalog.as_ref(), product).await
    }

    pub async fn restore_from_trash(&self, id: Uuid, user_id: Uuid, store_id: Option<Uuid>) -> Result<ProductDetail> {
        let mut product = self.owned_product(id, store_id).await?;
        product.restore()?;
        if let Some(holder) = self.catalog.find_product_by_slug(product.slug()).await? {
            if holder.id() != id && !holder.is_deleted() {
                return Err(CatalogError::bad_request(format!(
                    "Cannot restore: slug {} is now used by product {}",
                    product.slug(),
                    holder.id()
                )));
            }
        }
        self.catalog.save_product(&product).await?;
        tracing::info!(product_id = %id, %user_id, "product restored from trash");
        self.events.publish_all(product.take_events()).await;
        load_detail(self.catalog.as_ref(), product).await
    }

    pub async fn permanent_delete(&self, id: Uuid, user_id: Uuid, store_id: Option<Uuid>) -> Result<PurgeReport> {
        let product = self.owned_product(id, store_id).await?;
        product.ensure_trashed()?;
        let report = self.purge(vec![product]).await?;
        tracing::info!(product_id = %id, %user_id, orphaned = report.orphaned_assets.len(), "product permanently deleted");
        Ok(report)
    }

    pub async fn bulk_restore(&self, ids: &[Uuid], user_id: Uuid, store_id: Option<Uuid>) -> Result<BulkRestoreReport> {
        let ids = distinct_ids(ids)?;
        let mut report = BatchReport::default();
        for id in ids {
            let result = self.restore_from_trash(id, user_id, store_id).await;
            report.record(id, result);
        }
        let report = report.ensure_any_succeeded("restored")?;
        Ok(BulkRestoreReport { restored_count: report.succeeded.len(), failed_ids: report.failed_ids(), report })
    }

    pub async fn bulk_permanent_delete(&self, ids: &[Uuid], user_id: Uuid, store_id: Option<Uuid>) -> Result<BulkDeleteReport> {
        let ids = distinct_ids(ids)?;
        let mut report = BatchReport::default();
        let mut orphaned_assets = Vec::new();
        for id in ids {
            let result = self.permanent_delete(id, user_id, store_id).await;
            if let Some(purged) = report.record(id, result) {
                orphaned_assets.extend(purged.orphaned_assets);
            }
        }
        let report = report.ensure_any_succeeded("deleted")?;
        Ok(BulkDeleteReport { deleted_count: report.succeeded.len(), failed_ids: report.failed_ids(), orphaned_assets, report })
    }

    /// Purges every product of the store trashed at least `days` ago
    /// (default: the configured retention) in a single storage transaction.
    pub async fn empty_trash(&self, store_id: Uuid, user_id: Uuid, days: Option<u32>) -> Result<PurgeReport> {
        self.require_store(store_id).await?;
        let days = days.unwrap_or(self.retention_days);
        let Some(cutoff) = trash_cutoff(Utc::now(), days) else {
            tracing::debug!(%store_id, days, "retention window predates the calendar, nothing to purge");
            return Ok(PurgeReport::default());
        };
        let filter = ProductFilter { deleted_before: Some(cutoff), ..ProductFilter::trashed_in(store_id) };
        let expired = self.catalog.list_products(&filter, ProductOrder::DeletedAsc, None).await?;
        if expired.is_empty() {
            tracing::debug!(%store_id, days, "trash sweep found nothing to purge");
            return Ok(PurgeReport::default());
        }
        let report = self.purge(expired).await?;
        tracing::info!(%store_id, %user_id, days, deleted = report.deleted_count, "trash emptied");
        Ok(report)
    }

    async fn purge(&self, products: Vec<Product>) -> Result<PurgeReport> {
        let ids: Vec<Uuid> = products.iter().map(Product::id).collect();
        let outcome = self.catalog.purge_products(&ids).await?;
        let orphaned_assets = release_assets(self.catalog.as_ref(), self.assets.as_ref(), &outcome.asset_ids).await;
        for product in &products {
            self.events
                .publish(&DomainEvent::Product(ProductEvent::Purged { product_id: product.id(), store_id: product.store_id() }))
                .await;
        }
        Ok(PurgeReport { deleted_count: outcome.products, product_ids: ids, orphaned_assets })
    }

    pub async fn get_trash(&self, store_id: Uuid, req: PageRequest) -> Result<Page<TrashedProduct>> {
        self.require_store(store_id).await?;
        let filter = ProductFilter::trashed_in(store_id);
        let total = self.catalog.count_products(&filter).await?;
        let products = self.catalog.list_products(&filter, ProductOrder::DeletedDesc, Some(req)).await?;
        let now = Utc::now();
        let mut data = Vec::with_capacity(products.len());
        for product in products {
            let images = self
                .catalog
                .list_images(&ImageFilter { product_id: Some(product.id()), ..Default::default() }, None)
                .await?;
            let days_in_trash = product.deleted_at().map_or(0, |at| (now - at).num_days());
            let days_until_purge = (i64::from(self.retention_days) - days_in_trash).max(0);
            data.push(TrashedProduct { product, images, days_in_trash, days_until_purge });
        }
        Ok(Page::new(data, total, req))
    }

    pub async fn trash_stats(&self, store_id: Uuid) -> Result<TrashStats> {
        self.require_store(store_id).await?;
        let filter = ProductFilter::trashed_in(store_id);
        let total_items = self.catalog.count_products(&filter).await?;
        let eligible_for_purge = match trash_cutoff(Utc::now(), self.retention_days) {
            Some(cutoff) => {
                let eligible = ProductFilter { deleted_before: Some(cutoff), ..filter.clone() };
                self.catalog.count_products(&eligible).await?
            }
            None => 0,
        };
        let first = |order| {
            let filter = filter.clone();
            async move {
                let found = self.catalog.list_products(&filter, order, Some(PageRequest::first(1))).await?;
                Ok::<_, CatalogError>(found.first().and_then(Product::deleted_at))
            }
        };
        Ok(TrashStats {
            total_items,
            eligible_for_purge,
            oldest_deleted_at: first(ProductOrder::DeletedAsc).await?,
            newest_deleted_at: first(ProductOrder::DeletedDesc).await?,
            retention_days: self.retention_days,
        })
    }

    /// Retries remote deletion of assets left behind by earlier purges.
    pub async fn reconcile_orphaned_assets(&self, limit: Option<u32>) -> Result<ReconcileReport> {
        let pending = self.catalog.pending_asset_deletions(limit.unwrap_or(RECONCILE_BATCH)).await?;
        if pending.is_empty() { return Ok(ReconcileReport::default()); }
        let still_pending = release_assets(self.catalog.as_ref(), self.assets.as_ref(), &pending).await;
        let released = pending.len() - still_pending.len();
        tracing::info!(released, pending = still_pending.len(), "asset reconciliation finished");
        Ok(ReconcileReport { released, still_pending })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::assets::InMemoryAssetHost;
    use crate::domain::aggregates::{ProductImage, ProductStatus, Store, User};
    use crate::events::EventPublisher;
    use crate::repository::{AssetLedger, ImageRepository, MemoryCatalog, ProductRepository, StoreRepository, UserRepository};
    use crate::services::products::{CreateProductInput, ProductService};
    use crate::Config;

    struct Fixture {
        catalog: MemoryCatalog,
        assets: Arc<InMemoryAssetHost>,
        products: ProductService,
        trash: TrashService,
        store: Uuid,
        user: Uuid,
    }

    async fn fixture() -> Fixture {
        let catalog = MemoryCatalog::new();
        let assets = Arc::new(InMemoryAssetHost::new());
        let state = AppState::new(Config::for_tests(), Arc::new(catalog.clone()), assets.clone(), EventPublisher::disabled());
        let user = User::create("seller@example.com", "Seller", None);
        catalog.insert_user(&user).await.unwrap();
        let store = Store::create(user.id, "Seller Store");
        catalog.insert_store(&store).await.unwrap();
        Fixture { catalog, assets, products: ProductService::new(&state), trash: TrashService::new(&state), store: store.id, user: user.id }
    }

    impl Fixture {
        async fn product(&self, name: &str) -> Uuid {
            let input = CreateProductInput {
                store_id: self.store, name: name.into(), slug: None, description: None, brand: None,
                category: None, status: Some(ProductStatus::Active), variants: vec![],
            };
            self.products.create(input).await.unwrap().product.id()
        }

        async fn trashed_days_ago(&self, name: &str, days: i64) -> Uuid {
            let id = self.product(name).await;
            let mut p = self.catalog.find_product(id).await.unwrap().unwrap();
            p.move_to_trash(Utc::now() - Duration::days(days)).unwrap();
            self.catalog.save_product(&p).await.unwrap();
            id
        }
    }

    #[tokio::test]
    async fn test_trash_and_restore_round_trip() {
        let f = fixture().await;
        let id = f.product("Lamp").await;
        let trashed = f.trash.move_to_trash(id, f.user, Some(f.store)).await.unwrap();
        assert!(trashed.product.is_deleted());
        assert_eq!(trashed.product.status(), ProductStatus::Deleted);
        let restored = f.trash.restore_from_trash(id, f.user, None).await.unwrap();
        assert_eq!(restored.product.status(), ProductStatus::Draft);
        assert!(restored.product.deleted_at().is_none());
    }

    #[tokio::test]
    async fn test_store_mismatch_is_forbidden_and_leaves_product() {
        let f = fixture().await;
        let id = f.product("Lamp").await;
        let err = f.trash.move_to_trash(id, f.user, Some(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden(_)));
        assert!(!f.catalog.find_product(id).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_permanent_delete_requires_trash() {
        let f = fixture().await;
        let id = f.product("Lamp").await;
        let err = f.trash.permanent_delete(id, f.user, None).await.unwrap_err();
        assert!(err.to_string().contains("soft delete first"));
    }

    #[tokio::test]
    async fn test_permanent_delete_releases_assets() {
        let f = fixture().await;
        let id = f.product("Lamp").await;
        let uploaded = f.assets
            .upload_one(crate::assets::UploadFile {
                file_name: "a.png".into(), content_type: "image/png".into(),
                bytes: crate::assets::transform::sample_png(8, 8),
            }, "products")
            .await
            .unwrap();
        let mut image = ProductImage::create(id, uploaded.url.clone(), 0);
        image.asset_id = Some(uploaded.asset_id.clone());
        f.catalog.insert_image(&image).await.unwrap();
        f.trash.move_to_trash(id, f.user, None).await.unwrap();

        let report = f.trash.permanent_delete(id, f.user, None).await.unwrap();
        assert_eq!(report.deleted_count, 1);
        assert!(report.orphaned_assets.is_empty());
        assert!(!f.assets.contains(&uploaded.asset_id).await);
        assert!(f.catalog.pending_asset_deletions(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_asset_deletion_is_reconciled_later() {
        let f = fixture().await;
        let id = f.product("Lamp").await;
        let mut image = ProductImage::create(id, "memory://products/x.jpg", 0);
        image.asset_id = Some("products/x".into());
        f.catalog.insert_image(&image).await.unwrap();
        f.trash.move_to_trash(id, f.user, None).await.unwrap();

        f.assets.fail_deletions(true);
        let report = f.trash.permanent_delete(id, f.user, None).await.unwrap();
        assert_eq!(report.orphaned_assets, vec!["products/x".to_string()]);
        assert!(f.catalog.find_product(id).await.unwrap().is_none());

        let retry = f.trash.reconcile_orphaned_assets(None).await.unwrap();
        assert_eq!(retry.released, 0);
        f.assets.fail_deletions(false);
        let retry = f.trash.reconcile_orphaned_assets(None).await.unwrap();
        assert_eq!(retry, ReconcileReport { released: 1, still_pending: vec![] });
    }

    #[tokio::test]
    async fn test_bulk_delete_reports_partial_failure() {
        let f = fixture().await;
        let a = f.trashed_days_ago("Alpha", 1).await;
        let b = f.product("Beta").await;
        let report = f.trash.bulk_permanent_delete(&[a, b], f.user, None).await.unwrap();
        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.failed_ids, vec![b]);
        assert_eq!(report.report.failed[0].kind, crate::ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_bulk_restore_all_failed_is_bad_request() {
        let f = fixture().await;
        let live = f.product("Live").await;
        let err = f.trash.bulk_restore(&[live, Uuid::new_v4()], f.user, None).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_empty_trash_respects_age() {
        let f = fixture().await;
        let old = f.trashed_days_ago("Old", 45).await;
        let recent = f.trashed_days_ago("Recent", 29).await;
        let report = f.trash.empty_trash(f.store, f.user, None).await.unwrap();
        assert_eq!(report.product_ids, vec![old]);
        assert!(f.catalog.find_product(recent).await.unwrap().is_some());

        let report = f.trash.empty_trash(f.store, f.user, Some(0)).await.unwrap();
        assert_eq!(report.deleted_count, 1);
    }

    #[tokio::test]
    async fn test_empty_trash_with_oversized_window_purges_nothing() {
        let f = fixture().await;
        let old = f.trashed_days_ago("Ancient", 400).await;
        let report = f.trash.empty_trash(f.store, f.user, Some(u32::MAX)).await.unwrap();
        assert_eq!(report.deleted_count, 0);
        assert!(report.product_ids.is_empty());
        assert!(f.catalog.find_product(old).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_trash_listing_and_stats() {
        let f = fixture().await;
        let old = f.trashed_days_ago("Old", 40).await;
        let recent = f.trashed_days_ago("Recent", 2).await;
        f.product("Live").await;

        let page = f.trash.get_trash(f.store, PageRequest::default()).await.unwrap();
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.data[0].product.id(), recent);
        assert_eq!(page.data[0].days_until_purge, 28);
        assert_eq!(page.data[1].product.id(), old);
        assert_eq!(page.data[1].days_until_purge, 0);

        let stats = f.trash.trash_stats(f.store).await.unwrap();
        assert_eq!((stats.total_items, stats.eligible_for_purge, stats.retention_days), (2, 1, 30));
        assert!(stats.oldest_deleted_at < stats.newest_deleted_at);
        assert!(matches!(f.trash.get_trash(Uuid::new_v4(), PageRequest::default()).await, Err(CatalogError::NotFound(_))));
    }
}
