//! Stores, one per user, with their logo and banner

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::release_assets;
use crate::assets::{AssetHost, UploadFile};
use crate::auth::AuthUser;
use crate::domain::aggregates::{ProductStatus, Store, StoreImage, StoreImageType};
use crate::domain::value_objects::{Page, PageRequest};
use crate::repository::{Catalog, ProductFilter, ProductOrder, StoreFilter, TrashScope};
use crate::state::AppState;
use crate::{CatalogError, Result};

const FOLDER: &str = "stores";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStoreInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreView {
    #[serde(flatten)]
    pub store: Store,
    pub images: Vec<StoreImage>,
    pub product_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreImageChange {
    pub image: StoreImage,
    pub orphaned_assets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRemoval {
    pub store_id: Uuid,
    pub deleted_products: u64,
    pub orphaned_assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_products: u64,
    pub active_products: u64,
    pub draft_products: u64,
    pub trashed_products: u64,
}

#[derive(Clone)]
pub struct StoreService {
    catalog: Arc<dyn Catalog>,
    assets: Arc<dyn AssetHost>,
}

impl StoreService {
    pub fn new(state: &AppState) -> Self { Self { catalog: state.catalog.clone(), assets: state.assets.clone() } }

    async fn view(&self, store: Store) -> Result<StoreView> {
        let images = self.catalog.list_store_images(store.id).await?;
        let product_count = self.catalog.count_products(&ProductFilter::store(store.id)).await?;
        Ok(StoreView { store, images, product_count })
    }

    async fn require(&self, id: Uuid) -> Result<Store> {
        self.catalog.find_store(id).await?.ok_or_else(|| CatalogError::not_found(format!("Store {id} not found")))
    }

    async fn owned(&self, id: Uuid, actor: &AuthUser) -> Result<Store> {
        let store = self.require(id).await?;
        if store.user_id != actor.user_id && !actor.is_admin() {
            return Err(CatalogError::forbidden("Only the store owner can change this store"));
        }
        Ok(store)
    }

    pub async fn create(&self, owner: &AuthUser, input: CreateStoreInput) -> Result<StoreView> {
        input.validate()?;
        if self.catalog.find_store_by_user(owner.user_id).await?.is_some() {
            return Err(CatalogError::bad_request("User already has a store"));
        }
        let mut store = Store::create(owner.user_id, input.name.trim());
        store.description = input.description;
        store.address = input.address;
        store.city = input.city;
        store.state = input.state;
        self.catalog.insert_store(&store).await?;
        tracing::info!(store_id = %store.id, user_id = %owner.user_id, "store created");
        self.view(store).await
    }

    pub async fn list(&self, query: &StoreQuery) -> Result<Page<StoreView>> {
        let req = PageRequest::new(query.page, query.limit);
        let filter = StoreFilter { user_id: None, search: query.search.clone().filter(|s| !s.trim().is_empty()) };
        let total = self.catalog.count_stores(&filter).await?;
        let mut data = Vec::new();
        for store in self.catalog.list_stores(&filter, Some(req)).await? {
            data.push(self.view(store).await?);
        }
        Ok(Page::new(data, total, req))
    }

    pub async fn find_one(&self, id: Uuid) -> Result<StoreView> {
        let store = self.require(id).await?;
        self.view(store).await
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<StoreView> {
        let store = self
            .catalog
            .find_store_by_user(user_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("No store for user {user_id}")))?;
        self.view(store).await
    }

    pub async fn update(&self, id: Uuid, actor: &AuthUser, input: UpdateStoreInput) -> Result<StoreView> {
        input.validate()?;
        let mut store = self.owned(id, actor).await?;
        if let Some(name) = input.name { store.name = name.trim().to_string(); }
        if input.description.is_some() { store.description = input.description; }
        if input.address.is_some() { store.address = input.address; }
        if input.city.is_some() { store.city = input.city; }
        if input.state.is_some() { store.state = input.state; }
        store.touch();
        self.catalog.save_store(&store).await?;
        self.view(store).await
    }

    /// Uploads a new logo or banner and releases the one it replaces.
    pub async fn set_image(&self, id: Uuid, actor: &AuthUser, image_type: StoreImageType, file: UploadFile) -> Result<StoreImageChange> {
        let store = self.owned(id, actor).await?;
        let uploaded = self.assets.upload_one(file, FOLDER).await?;
        let image = StoreImage {
            id: Uuid::now_v7(),
            store_id: store.id,
            image_type,
            image_url: uploaded.url,
            asset_id: Some(uploaded.asset_id),
            updated_at: Utc::now(),
        };
        let previous = self.catalog.upsert_store_image(&image).await?;
        let old_assets: Vec<String> = previous.and_then(|p| p.asset_id).into_iter().collect();
        self.catalog.queue_asset_deletions(&old_assets).await?;
        let orphaned_assets = release_assets(self.catalog.as_ref(), self.assets.as_ref(), &old_assets).await;
        tracing::info!(store_id = %id, image_type = image_type.as_str(), "store image replaced");
        Ok(StoreImageChange { image, orphaned_assets })
    }

    /// Deletes the store after purging every product it owns, trashed or not.
    pub async fn remove(&self, id: Uuid, actor: &AuthUser) -> Result<StoreRemoval> {
        let store = self.owned(id, actor).await?;
        let filter = ProductFilter { trash: TrashScope::Include, ..ProductFilter::store(store.id) };
        let product_ids: Vec<Uuid> = self
            .catalog
            .list_products(&filter, ProductOrder::CreatedDesc, None)
            .await?
            .iter()
            .map(|p| p.id())
            .collect();
        let mut asset_ids = Vec::new();
        let mut deleted_products = 0;
        if !product_ids.is_empty() {
            let purged = self.catalog.purge_products(&product_ids).await?;
            deleted_products = purged.products;
            asset_ids.extend(purged.asset_ids);
        }
        asset_ids.extend(self.catalog.delete_store(store.id).await?.asset_ids);
        let orphaned_assets = release_assets(self.catalog.as_ref(), self.assets.as_ref(), &asset_ids).await;
        tracing::info!(store_id = %id, deleted_products, "store deleted");
        Ok(StoreRemoval { store_id: id, deleted_products, orphaned_assets })
    }

    pub async fn stats(&self, id: Uuid) -> Result<StoreStats> {
        self.require(id).await?;
        let by_status = |status| ProductFilter { status: Some(status), ..ProductFilter::store(id) };
        Ok(StoreStats {
            total_products: self.catalog.count_products(&ProductFilter::store(id)).await?,
            active_products: self.catalog.count_products(&by_status(ProductStatus::Active)).await?,
            draft_products: self.catalog.count_products(&by_status(ProductStatus::Draft)).await?,
            trashed_products: self.catalog.count_products(&ProductFilter::trashed_in(id)).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::transform::sample_png;
    use crate::domain::aggregates::{Role, User};
    use crate::services::products::{CreateProductInput, ProductService};
    use crate::services::TrashService;
    use crate::Config;

    async fn setup() -> (AppState, StoreService, AuthUser) {
        let state = AppState::in_memory(Config::for_tests());
        let user = User::create("shop@example.com", "Shop", None);
        state.catalog.insert_user(&user).await.unwrap();
        let actor = AuthUser { user_id: user.id, email: user.email.clone(), role: Role::User };
        let svc = StoreService::new(&state);
        (state, svc, actor)
    }

    fn input(name: &str) -> CreateStoreInput {
        CreateStoreInput { name: name.into(), description: None, address: None, city: Some("Lagos".into()), state: None }
    }

    fn png() -> UploadFile {
        UploadFile { file_name: "logo.png".into(), content_type: "image/png".into(), bytes: sample_png(4, 4) }
    }

    #[tokio::test]
    async fn test_one_store_per_user() {
        let (_, svc, actor) = setup().await;
        svc.create(&actor, input("First")).await.unwrap();
        assert!(matches!(svc.create(&actor, input("Second")).await, Err(CatalogError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_replacing_logo_keeps_one() {
        let (_, svc, actor) = setup().await;
        let store = svc.create(&actor, input("Logos")).await.unwrap().store;
        svc.set_image(store.id, &actor, StoreImageType::Logo, png()).await.unwrap();
        svc.set_image(store.id, &actor, StoreImageType::Logo, png()).await.unwrap();
        assert_eq!(svc.find_one(store.id).await.unwrap().images.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_purges_products_and_checks_owner() {
        let (state, svc, actor) = setup().await;
        let store = svc.create(&actor, input("Closing")).await.unwrap().store;
        let products = ProductService::new(&state);
        for name in ["One", "Two"] {
            let created = products
                .create(CreateProductInput {
                    store_id: store.id, name: name.into(), slug: None, description: None, brand: None,
                    category: None, status: None, variants: vec![],
                })
                .await
                .unwrap();
            if name == "Two" {
                TrashService::new(&state).move_to_trash(created.product.id(), actor.user_id, None).await.unwrap();
            }
        }
        let stranger = AuthUser { user_id: Uuid::new_v4(), email: "s@example.com".into(), role: Role::User };
        assert!(matches!(svc.remove(store.id, &stranger).await, Err(CatalogError::Forbidden(_))));

        let removal = svc.remove(store.id, &actor).await.unwrap();
        assert_eq!(removal.deleted_products, 2);
        assert!(matches!(svc.find_one(store.id).await, Err(CatalogError::NotFound(_))));
    }
}
