//! Product images

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::products::ProductService;
use super::{distinct_ids, release_assets};
use crate::assets::{AssetHost, UploadFile, UploadedAsset};
use crate::domain::aggregates::{ImageType, ProductImage};
use crate::domain::value_objects::{Page, PageRequest};
use crate::repository::{Catalog, ImageFilter};
use crate::state::AppState;
use crate::{CatalogError, Result};

const FOLDER: &str = "products";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateImageInput {
    pub product_id: Uuid,
    #[validate(url)]
    pub image_url: String,
    #[validate(length(max = 255))]
    pub alt_text: Option<String>,
    #[validate(range(min = 0))]
    pub position: Option<i32>,
    pub image_type: Option<ImageType>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateImageInput {
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(length(max = 255))]
    pub alt_text: Option<String>,
    #[validate(range(min = 0))]
    pub position: Option<i32>,
    pub image_type: Option<ImageType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePosition {
    pub id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub product_id: Option<Uuid>,
    pub image_type: Option<ImageType>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRemoval {
    pub deleted_count: u64,
    pub orphaned_assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStats {
    pub total: u64,
    pub main: u64,
    pub gallery: u64,
}

fn from_upload(product_id: Uuid, asset: &UploadedAsset, position: i32) -> ProductImage {
    let mut image = ProductImage::create(product_id, asset.url.clone(), position);
    image.asset_id = Some(asset.asset_id.clone());
    image.width = i32::try_from(asset.width).ok();
    image.height = i32::try_from(asset.height).ok();
    image.file_size = i64::try_from(asset.bytes).ok();
    image.mimetype = Some(format!("image/{}", if asset.format == "jpg" { "jpeg" } else { asset.format.as_str() }));
    image
}

#[derive(Clone)]
pub struct ImageService {
    catalog: Arc<dyn Catalog>,
    assets: Arc<dyn AssetHost>,
    products: ProductService,
}

impl ImageService {
    pub fn new(state: &AppState) -> Self {
        Self { catalog: state.catalog.clone(), assets: state.assets.clone(), products: ProductService::new(state) }
    }

    pub async fn find_one(&self, id: Uuid) -> Result<ProductImage> {
        self.catalog.find_image(id).await?.ok_or_else(|| CatalogError::not_found(format!("Image {id} not found")))
    }

    async fn next_position(&self, product_id: Uuid) -> Result<i32> {
        Ok(self.catalog.max_image_position(product_id).await?.map_or(0, |p| p + 1))
    }

    async fn store(&self, image: ProductImage) -> Result<ProductImage> {
        self.catalog.insert_image(&image).await?;
        if image.image_type == ImageType::Main {
            self.catalog.set_main_image(image.product_id, image.id).await?;
        }
        Ok(image)
    }

    pub async fn create(&self, input: CreateImageInput) -> Result<ProductImage> {
        input.validate()?;
        self.products.require_live(input.product_id).await?;
        let position = match input.position {
            Some(p) => p,
            None => self.next_position(input.product_id).await?,
        };
        let mut image = ProductImage::create(input.product_id, input.image_url, position);
        image.alt_text = input.alt_text;
        image.image_type = input.image_type.unwrap_or_default();
        self.store(image).await
    }

    /// Uploads all files first; rows are only written once every upload succeeded.
    /// When the rows cannot be saved the uploads are released again.
    pub async fn upload(&self, product_id: Uuid, files: Vec<UploadFile>) -> Result<Vec<ProductImage>> {
        self.products.require_live(product_id).await?;
        let uploaded = self.assets.upload_many(files, FOLDER).await?;
        match self.store_uploads(product_id, &uploaded).await {
            Ok(images) => {
                tracing::info!(%product_id, count = images.len(), "product images uploaded");
                Ok(images)
            }
            Err(e) => {
                let asset_ids: Vec<String> = uploaded.iter().map(|a| a.asset_id.clone()).collect();
                tracing::warn!(%product_id, error = %e, count = asset_ids.len(), "image rows not saved, releasing uploads");
                if let Err(ledger) = self.catalog.queue_asset_deletions(&asset_ids).await {
                    tracing::warn!(error = %ledger, "failed to record uploads for deletion");
                }
                release_assets(self.catalog.as_ref(), self.assets.as_ref(), &asset_ids).await;
                Err(e)
            }
        }
    }

    async fn store_uploads(&self, product_id: Uuid, uploaded: &[UploadedAsset]) -> Result<Vec<ProductImage>> {
        let mut position = self.next_position(product_id).await?;
        let has_main = self.catalog.count_images(&ImageFilter { product_id: Some(product_id), image_type: Some(ImageType::Main), ..Default::default() }).await? > 0;
        let mut images: Vec<ProductImage> = Vec::with_capacity(uploaded.len());
        for asset in uploaded {
            let mut image = from_upload(product_id, asset, position);
            if !has_main && images.is_empty() { image.image_type = ImageType::Main; }
            match self.store(image).await {
                Ok(image) => images.push(image),
                Err(e) => {
                    let written: Vec<Uuid> = images.iter().map(|i| i.id).collect();
                    if !written.is_empty() {
                        if let Err(undo) = self.catalog.delete_images(&written).await {
                            tracing::warn!(%product_id, error = %undo, "failed to remove partially saved images");
                        }
                    }
                    return Err(e);
                }
            }
            position += 1;
        }
        Ok(images)
    }

    pub async fn list(&self, query: &ImageQuery) -> Result<Page<ProductImage>> {
        let req = PageRequest::new(query.page, query.limit);
        let filter = ImageFilter { product_id: query.product_id, image_type: query.image_type, ..Default::default() };
        let total = self.catalog.count_images(&filter).await?;
        let data = self.catalog.list_images(&filter, Some(req)).await?;
        Ok(Page::new(data, total, req))
    }

    /// Every image of the product, by position.
    pub async fn find_by_product(&self, product_id: Uuid) -> Result<Vec<ProductImage>> {
        self.products.require_live(product_id).await?;
        self.catalog.list_images(&ImageFilter { product_id: Some(product_id), ..Default::default() }, None).await
    }

    pub async fn update(&self, id: Uuid, input: UpdateImageInput) -> Result<ProductImage> {
        input.validate()?;
        let mut image = self.find_one(id).await?;
        if let Some(url) = input.image_url { image.image_url = url; }
        if input.alt_text.is_some() { image.alt_text = input.alt_text; }
        if let Some(position) = input.position { image.position = position; }
        if let Some(kind) = input.image_type { image.image_type = kind; }
        image.touch();
        self.catalog.save_image(&image).await?;
        if image.image_type == ImageType::Main {
            self.catalog.set_main_image(image.product_id, image.id).await?;
        }
        Ok(image)
    }

    /// Swaps the stored file; the previous asset is released once the new one is saved.
    pub async fn replace(&self, id: Uuid, file: UploadFile) -> Result<ProductImage> {
        let image = self.find_one(id).await?;
        let uploaded = self.assets.upload_one(file, FOLDER).await?;
        let mut replacement = from_upload(image.product_id, &uploaded, image.position);
        replacement.id = image.id;
        replacement.alt_text = image.alt_text.clone();
        replacement.image_type = image.image_type;
        replacement.created_at = image.created_at;
        self.catalog.save_image(&replacement).await?;
        if let Some(old) = image.asset_id {
            self.catalog.queue_asset_deletions(std::slice::from_ref(&old)).await?;
            release_assets(self.catalog.as_ref(), self.assets.as_ref(), &[old]).await;
        }
        Ok(replacement)
    }

    pub async fn remove(&self, id: Uuid) -> Result<ImageRemoval> {
        self.find_one(id).await?;
        self.delete(&[id]).await
    }

    pub async fn bulk_remove(&self, ids: &[Uuid]) -> Result<ImageRemoval> {
        let ids = distinct_ids(ids)?;
        let removal = self.delete(&ids).await?;
        if removal.deleted_count == 0 { return Err(CatalogError::not_found("No images found for the given ids")); }
        Ok(removal)
    }

    async fn delete(&self, ids: &[Uuid]) -> Result<ImageRemoval> {
        let outcome = self.catalog.delete_images(ids).await?;
        let orphaned_assets = release_assets(self.catalog.as_ref(), self.assets.as_ref(), &outcome.asset_ids).await;
        tracing::info!(deleted = outcome.rows, orphaned = orphaned_assets.len(), "product images deleted");
        Ok(ImageRemoval { deleted_count: outcome.rows, orphaned_assets })
    }

    pub async fn reorder(&self, product_id: Uuid, order: &[ImagePosition]) -> Result<Vec<ProductImage>> {
        self.products.require_live(product_id).await?;
        for item in order {
            let mut image = self.find_one(item.id).await?;
            if image.product_id != product_id {
                return Err(CatalogError::bad_request(format!("Image {} does not belong to product {product_id}", item.id)));
            }
            image.position = item.position;
            image.touch();
            self.catalog.save_image(&image).await?;
        }
        self.catalog.list_images(&ImageFilter { product_id: Some(product_id), ..Default::default() }, None).await
    }

    pub async fn set_main(&self, product_id: Uuid, image_id: Uuid) -> Result<ProductImage> {
        let image = self.find_one(image_id).await?;
        if image.product_id != product_id {
            return Err(CatalogError::bad_request(format!("Image {image_id} does not belong to product {product_id}")));
        }
        self.catalog.set_main_image(product_id, image_id).await?;
        self.find_one(image_id).await
    }

    pub async fn stats(&self, product_id: Option<Uuid>) -> Result<ImageStats> {
        let count = |image_type| ImageFilter { product_id, image_type, ..Default::default() };
        Ok(ImageStats {
            total: self.catalog.count_images(&count(None)).await?,
            main: self.catalog.count_images(&count(Some(ImageType::Main))).await?,
            gallery: self.catalog.count_images(&count(Some(ImageType::Gallery))).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::transform::sample_png;
    use crate::assets::InMemoryAssetHost;
    use crate::domain::aggregates::{Store, User};
    use crate::events::EventPublisher;
    use crate::repository::{AssetLedger, MemoryCatalog};
    use crate::services::products::CreateProductInput;
    use crate::Config;

    async fn setup() -> (ImageService, Uuid) {
        setup_with(&AppState::in_memory(Config::for_tests())).await
    }

    async fn setup_with(state: &AppState) -> (ImageService, Uuid) {
        let user = User::create("img@example.com", "Img", None);
        state.catalog.insert_user(&user).await.unwrap();
        let store = Store::create(user.id, "Images");
        state.catalog.insert_store(&store).await.unwrap();
        let product = ProductService::new(state)
            .create(CreateProductInput {
                store_id: store.id, name: "Poster".into(), slug: None, description: None, brand: None,
                category: None, status: None, variants: vec![],
            })
            .await
            .unwrap();
        (ImageService::new(state), product.product.id())
    }

    fn png() -> UploadFile {
        UploadFile { file_name: "p.png".into(), content_type: "image/png".into(), bytes: sample_png(16, 12) }
    }

    #[tokio::test]
    async fn test_upload_appends_and_first_becomes_main() {
        let (svc, product) = setup().await;
        let images = svc.upload(product, vec![png(), png()]).await.unwrap();
        assert_eq!(images[0].image_type, ImageType::Main);
        assert_eq!(images[1].image_type, ImageType::Gallery);
        assert_eq!((images[0].position, images[1].position), (0, 1));
        assert_eq!(images[0].width, Some(16));
        assert_eq!(images[0].mimetype.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_set_main_keeps_single_main() {
        let (svc, product) = setup().await;
        let images = svc.upload(product, vec![png(), png()]).await.unwrap();
        svc.set_main(product, images[1].id).await.unwrap();
        let stats = svc.stats(Some(product)).await.unwrap();
        assert_eq!(stats, ImageStats { total: 2, main: 1, gallery: 1 });
        assert_eq!(svc.find_one(images[0].id).await.unwrap().image_type, ImageType::Gallery);
    }

    #[tokio::test]
    async fn test_reorder_and_remove() {
        let (svc, product) = setup().await;
        let images = svc.upload(product, vec![png(), png()]).await.unwrap();
        let order = vec![ImagePosition { id: images[0].id, position: 5 }, ImagePosition { id: images[1].id, position: 1 }];
        let listed = svc.reorder(product, &order).await.unwrap();
        assert_eq!(listed[0].id, images[1].id);

        let removal = svc.bulk_remove(&[images[0].id, images[1].id]).await.unwrap();
        assert_eq!(removal.deleted_count, 2);
        assert!(removal.orphaned_assets.is_empty());
        assert!(matches!(svc.remove(images[0].id).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_row_insert_releases_uploads() {
        let catalog = MemoryCatalog::new();
        let assets = Arc::new(InMemoryAssetHost::new());
        let state = AppState::new(Config::for_tests(), Arc::new(catalog.clone()), assets.clone(), EventPublisher::disabled());
        let (svc, product) = setup_with(&state).await;

        catalog.fail_image_inserts(true);
        let err = svc.upload(product, vec![png(), png()]).await.unwrap_err();
        assert!(matches!(err, CatalogError::Internal(_)));
        assert!(assets.is_empty().await);
        assert!(catalog.pending_asset_deletions(10).await.unwrap().is_empty());

        catalog.fail_image_inserts(false);
        assert!(svc.find_by_product(product).await.unwrap().is_empty());
        assert_eq!(svc.upload(product, vec![png()]).await.unwrap().len(), 1);
        assert_eq!(assets.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_from_url_needs_live_product() {
        let (svc, _) = setup().await;
        let input = CreateImageInput {
            product_id: Uuid::new_v4(), image_url: "https://cdn.example.com/a.jpg".into(),
            alt_text: None, position: None, image_type: None,
        };
        assert!(matches!(svc.create(input).await, Err(CatalogError::NotFound(_))));
    }
}
