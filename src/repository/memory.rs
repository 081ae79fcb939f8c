//! In-memory catalog used by tests and `DATABASE_URL`-less runs.
//!
//! Every operation takes the single lock once, so multi-row writes such as the
//! purge are all-or-nothing just like their Postgres transactions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::*;
use crate::domain::aggregates::{ImageType, StoreImageType};
use crate::CatalogError;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    locations: HashMap<Uuid, UserLocation>,
    profile_images: HashMap<Uuid, ProfileImage>,
    stores: HashMap<Uuid, Store>,
    store_images: HashMap<Uuid, StoreImage>,
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, ProductVariant>,
    inventory: HashMap<Uuid, Inventory>,
    images: HashMap<Uuid, ProductImage>,
    attributes: HashMap<Uuid, ProductAttribute>,
    comments: HashMap<Uuid, Comment>,
    customers: HashMap<Uuid, Customer>,
    reviews: HashMap<Uuid, Uuid>,
    wishlist: HashMap<Uuid, (Uuid, Uuid)>,
    pending_assets: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    tables: Arc<RwLock<Tables>>,
    fail_image_inserts: Arc<AtomicBool>,
    fail_profile_writes: Arc<AtomicBool>,
}

impl MemoryCatalog {
    pub fn new() -> Self { Self::default() }

    /// Makes every subsequent `insert_image` fail until switched off again.
    pub fn fail_image_inserts(&self, fail: bool) { self.fail_image_inserts.store(fail, Ordering::SeqCst); }

    pub fn fail_profile_writes(&self, fail: bool) { self.fail_profile_writes.store(fail, Ordering::SeqCst); }

    pub async fn add_review(&self, product_id: Uuid) -> Uuid {
        let id = Uuid::now_v7();
        self.tables.write().await.reviews.insert(id, product_id);
        id
    }

    pub async fn add_wishlist_item(&self, user_id: Uuid, product_id: Uuid) -> Uuid {
        let id = Uuid::now_v7();
        self.tables.write().await.wishlist.insert(id, (user_id, product_id));
        id
    }

    /// Rows of every kind that still reference the product.
    pub async fn dependent_rows(&self, product_id: Uuid) -> usize {
        let t = self.tables.read().await;
        let variants: Vec<Uuid> = t.variants.values().filter(|v| v.product_id == product_id).map(|v| v.id).collect();
        variants.len()
            + t.inventory.keys().filter(|v| variants.contains(v)).count()
            + t.images.values().filter(|i| i.product_id == product_id).count()
            + t.attributes.values().filter(|a| a.product_id == product_id).count()
            + t.comments.values().filter(|c| c.product_id == product_id).count()
            + t.reviews.values().filter(|p| **p == product_id).count()
            + t.wishlist.values().filter(|(_, p)| *p == product_id).count()
    }
}

fn window<T>(items: Vec<T>, page: Option<PageRequest>) -> Vec<T> {
    match page {
        Some(p) => items.into_iter().skip(p.skip() as usize).take(p.limit() as usize).collect(),
        None => items,
    }
}

fn unique_violation(constraint: &str) -> CatalogError {
    CatalogError::Conflict(format!("Unique constraint violated: {constraint}"))
}

fn stored(product: &Product) -> Product {
    let mut p = product.clone();
    p.take_events();
    p
}

impl Tables {
    fn product_matches(&self, p: &Product, f: &ProductFilter) -> bool {
        let trash_ok = match f.trash {
            TrashScope::Exclude => !p.is_deleted(),
            TrashScope::Include => true,
            TrashScope::Only => p.is_deleted(),
        };
        trash_ok
            && f.ids.as_ref().map_or(true, |ids| ids.contains(&p.id()))
            && f.store_id.map_or(true, |s| p.store_id() == s)
            && f.status.map_or(true, |s| p.status() == s)
            && f.category.as_deref().map_or(true, |c| contains_ci(p.category(), c))
            && f.brand.as_deref().map_or(true, |b| contains_ci(p.brand(), b))
            && f.deleted_before.map_or(true, |cutoff| p.deleted_at().is_some_and(|at| at <= cutoff))
            && f.has_images.map_or(true, |want| self.images.values().any(|i| i.product_id == p.id()) == want)
            && f.search.as_ref().map_or(true, |s| {
                s.fields.iter().any(|field| {
                    let value = match field {
                        ProductField::Name => Some(p.name()),
                        ProductField::Description => p.description(),
                        ProductField::Brand => p.brand(),
                        ProductField::Category => p.category(),
                        ProductField::Slug => Some(p.slug().as_str()),
                    };
                    contains_ci(value, &s.term)
                })
            })
    }

    fn comment_count(&self, product_id: Uuid) -> usize {
        self.comments.values().filter(|c| c.product_id == product_id).count()
    }

    fn matching_products(&self, f: &ProductFilter) -> Vec<&Product> {
        self.products.values().filter(|p| self.product_matches(p, f)).collect()
    }

    fn image_matches(i: &ProductImage, f: &ImageFilter) -> bool {
        f.product_id.map_or(true, |p| i.product_id == p)
            && f.ids.as_ref().map_or(true, |ids| ids.contains(&i.id))
            && f.image_type.map_or(true, |t| i.image_type == t)
    }

    fn attribute_matches(a: &ProductAttribute, f: &AttributeFilter) -> bool {
        f.product_id.map_or(true, |p| a.product_id == p)
            && f.name.as_deref().map_or(true, |n| a.attribute_name.eq_ignore_ascii_case(n))
            && f.search.as_deref().map_or(true, |s| {
                contains_ci(Some(&a.attribute_name), s) || contains_ci(Some(&a.attribute_value), s)
            })
    }

    fn comment_matches(c: &Comment, f: &CommentFilter) -> bool {
        f.ids.as_ref().map_or(true, |ids| ids.contains(&c.id))
            && f.product_id.map_or(true, |p| c.product_id == p)
            && f.user_id.map_or(true, |u| c.user_id == u)
            && f.min_rating.map_or(true, |m| c.rating >= m)
            && f.max_rating.map_or(true, |m| c.rating <= m)
            && f.search.as_deref().map_or(true, |s| contains_ci(Some(&c.comment), s) || contains_ci(c.title.as_deref(), s))
    }

    fn customer_matches(c: &Customer, f: &CustomerFilter) -> bool {
        f.ids.as_ref().map_or(true, |ids| ids.contains(&c.id))
            && f.search.as_deref().map_or(true, |s| {
                contains_ci(Some(&c.email), s)
                    || contains_ci(c.username.as_deref(), s)
                    || contains_ci(c.phone.as_deref(), s)
                    || contains_ci(c.address.as_deref(), s)
            })
    }

    fn store_matches(s: &Store, f: &StoreFilter) -> bool {
        f.user_id.map_or(true, |u| s.user_id == u)
            && f.search.as_deref().map_or(true, |q| {
                contains_ci(Some(&s.name), q) || contains_ci(s.description.as_deref(), q) || contains_ci(s.city.as_deref(), q)
            })
    }

    fn save_user(&mut self, user: &User) -> Result<()> {
        if self.users.values().any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(unique_violation("users_email_key"));
        }
        match self.users.get_mut(&user.id) {
            Some(slot) => { *slot = user.clone(); Ok(()) }
            None => Err(CatalogError::not_found("User not found")),
        }
    }

    fn make_default(&mut self, user_id: Uuid, location_id: Uuid) {
        let now = chrono::Utc::now();
        for location in self.locations.values_mut().filter(|l| l.user_id == user_id) {
            let is_default = location.id == location_id;
            if location.is_default != is_default {
                location.is_default = is_default;
                location.updated_at = now;
            }
        }
    }

    fn queue_assets(&mut self, ids: &[String]) {
        for id in ids {
            if !self.pending_assets.contains(id) { self.pending_assets.push(id.clone()); }
        }
    }
}

// =============================================================================
// Products
// =============================================================================

#[async_trait]
impl ProductRepository for MemoryCatalog {
    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.products.values().any(|p| p.slug() == product.slug()) { return Err(unique_violation("products_slug_key")); }
        t.products.insert(product.id(), stored(product));
        Ok(())
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.products.contains_key(&product.id()) { return Err(CatalogError::not_found("Product not found")); }
        if t.products.values().any(|p| p.id() != product.id() && p.slug() == product.slug()) {
            return Err(unique_violation("products_slug_key"));
        }
        t.products.insert(product.id(), stored(product));
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn find_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.values().find(|p| p.slug() == slug).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter, order: ProductOrder, page: Option<PageRequest>) -> Result<Vec<Product>> {
        let t = self.tables.read().await;
        let mut items = t.matching_products(filter);
        match order {
            ProductOrder::CreatedDesc => items.sort_by(|a, b| (b.created_at(), b.id()).cmp(&(a.created_at(), a.id()))),
            ProductOrder::DeletedDesc => items.sort_by(|a, b| b.deleted_at().cmp(&a.deleted_at())),
            ProductOrder::DeletedAsc => items.sort_by(|a, b| a.deleted_at().cmp(&b.deleted_at())),
            ProductOrder::CommentsDesc => items.sort_by(|a, b| {
                t.comment_count(b.id()).cmp(&t.comment_count(a.id())).then(b.created_at().cmp(&a.created_at()))
            }),
        }
        Ok(window(items.into_iter().cloned().collect(), page))
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64> {
        Ok(self.tables.read().await.matching_products(filter).len() as u64)
    }

    async fn purge_products(&self, ids: &[Uuid]) -> Result<PurgeOutcome> {
        let mut t = self.tables.write().await;
        let variant_ids: Vec<Uuid> = t.variants.values().filter(|v| ids.contains(&v.product_id)).map(|v| v.id).collect();
        t.inventory.retain(|variant_id, _| !variant_ids.contains(variant_id));
        t.variants.retain(|_, v| !ids.contains(&v.product_id));
        let asset_ids: Vec<String> = t.images.values().filter(|i| ids.contains(&i.product_id)).filter_map(|i| i.asset_id.clone()).collect();
        t.images.retain(|_, i| !ids.contains(&i.product_id));
        t.attributes.retain(|_, a| !ids.contains(&a.product_id));
        t.reviews.retain(|_, product_id| !ids.contains(product_id));
        t.comments.retain(|_, c| !ids.contains(&c.product_id));
        t.wishlist.retain(|_, (_, product_id)| !ids.contains(product_id));
        let before = t.products.len();
        t.products.retain(|id, _| !ids.contains(id));
        let products = (before - t.products.len()) as u64;
        t.queue_assets(&asset_ids);
        Ok(PurgeOutcome { products, asset_ids })
    }
}

// =============================================================================
// Variants
// =============================================================================

#[async_trait]
impl VariantRepository for MemoryCatalog {
    async fn insert_variant(&self, variant: &ProductVariant) -> Result<Inventory> {
        let mut t = self.tables.write().await;
        if variant.sku.is_some() && t.variants.values().any(|v| v.sku == variant.sku) {
            return Err(unique_violation("product_variants_sku_key"));
        }
        let inventory = variant.opening_inventory();
        t.variants.insert(variant.id, variant.clone());
        t.inventory.insert(variant.id, inventory.clone());
        Ok(inventory)
    }

    async fn save_variant(&self, variant: &ProductVariant) -> Result<()> {
        let mut t = self.tables.write().await;
        if variant.sku.is_some() && t.variants.values().any(|v| v.id != variant.id && v.sku == variant.sku) {
            return Err(unique_violation("product_variants_sku_key"));
        }
        match t.variants.get_mut(&variant.id) {
            Some(slot) => { *slot = variant.clone(); Ok(()) }
            None => Err(CatalogError::not_found("Variant not found")),
        }
    }

    async fn find_variant(&self, id: Uuid) -> Result<Option<ProductVariant>> {
        Ok(self.tables.read().await.variants.get(&id).cloned())
    }

    async fn find_variant_by_sku(&self, sku: &Sku) -> Result<Option<ProductVariant>> {
        Ok(self.tables.read().await.variants.values().find(|v| v.sku.as_ref() == Some(sku)).cloned())
    }

    async fn find_inventory(&self, variant_id: Uuid) -> Result<Option<Inventory>> {
        Ok(self.tables.read().await.inventory.get(&variant_id).cloned())
    }

    async fn list_variants(&self, product_id: Uuid, limit: Option<u32>) -> Result<Vec<ProductVariant>> {
        let t = self.tables.read().await;
        let mut items: Vec<ProductVariant> = t.variants.values().filter(|v| v.product_id == product_id).cloned().collect();
        items.sort_by_key(|v| (v.created_at, v.id));
        Ok(window(items, limit.map(PageRequest::first)))
    }
}

// =============================================================================
// Images
// =============================================================================

#[async_trait]
impl ImageRepository for MemoryCatalog {
    async fn insert_image(&self, image: &ProductImage) -> Result<()> {
        if self.fail_image_inserts.load(Ordering::SeqCst) {
            return Err(CatalogError::Internal(format!("Simulated failure inserting image {}", image.id)));
        }
        self.tables.write().await.images.insert(image.id, image.clone());
        Ok(())
    }

    async fn save_image(&self, image: &ProductImage) -> Result<()> {
        match self.tables.write().await.images.get_mut(&image.id) {
            Some(slot) => { *slot = image.clone(); Ok(()) }
            None => Err(CatalogError::not_found("Image not found")),
        }
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<ProductImage>> {
        Ok(self.tables.read().await.images.get(&id).cloned())
    }

    async fn list_images(&self, filter: &ImageFilter, page: Option<PageRequest>) -> Result<Vec<ProductImage>> {
        let t = self.tables.read().await;
        let mut items: Vec<ProductImage> = t.images.values().filter(|i| Tables::image_matches(i, filter)).cloned().collect();
        items.sort_by_key(|i| (i.position, i.created_at, i.id));
        Ok(window(items, page))
    }

    async fn count_images(&self, filter: &ImageFilter) -> Result<u64> {
        Ok(self.tables.read().await.images.values().filter(|i| Tables::image_matches(i, filter)).count() as u64)
    }

    async fn max_image_position(&self, product_id: Uuid) -> Result<Option<i32>> {
        Ok(self.tables.read().await.images.values().filter(|i| i.product_id == product_id).map(|i| i.position).max())
    }

    async fn set_main_image(&self, product_id: Uuid, image_id: Uuid) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.images.get(&image_id).is_some_and(|i| i.product_id == product_id) {
            return Err(CatalogError::not_found("Image not found"));
        }
        let now = chrono::Utc::now();
        for image in t.images.values_mut().filter(|i| i.product_id == product_id) {
            let image_type = if image.id == image_id { ImageType::Main } else { ImageType::Gallery };
            if image.image_type != image_type {
                image.image_type = image_type;
                image.updated_at = now;
            }
        }
        Ok(())
    }

    async fn delete_images(&self, ids: &[Uuid]) -> Result<RowRemoval> {
        let mut t = self.tables.write().await;
        let asset_ids: Vec<String> = ids.iter().filter_map(|id| t.images.get(id)).filter_map(|i| i.asset_id.clone()).collect();
        let before = t.images.len();
        t.images.retain(|id, _| !ids.contains(id));
        let rows = (before - t.images.len()) as u64;
        t.queue_assets(&asset_ids);
        Ok(RowRemoval { rows, asset_ids })
    }
}

// =============================================================================
// Attributes
// =============================================================================

#[async_trait]
impl AttributeRepository for MemoryCatalog {
    async fn insert_attribute(&self, attribute: &ProductAttribute) -> Result<()> {
        self.tables.write().await.attributes.insert(attribute.id, attribute.clone());
        Ok(())
    }

    async fn save_attribute(&self, attribute: &ProductAttribute) -> Result<()> {
        match self.tables.write().await.attributes.get_mut(&attribute.id) {
            Some(slot) => { *slot = attribute.clone(); Ok(()) }
            None => Err(CatalogError::not_found("Attribute not found")),
        }
    }

    async fn find_attribute(&self, id: Uuid) -> Result<Option<ProductAttribute>> {
        Ok(self.tables.read().await.attributes.get(&id).cloned())
    }

    async fn list_attributes(&self, filter: &AttributeFilter, page: Option<PageRequest>) -> Result<Vec<ProductAttribute>> {
        let t = self.tables.read().await;
        let mut items: Vec<ProductAttribute> = t.attributes.values().filter(|a| Tables::attribute_matches(a, filter)).cloned().collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(window(items, page))
    }

    async fn count_attributes(&self, filter: &AttributeFilter) -> Result<u64> {
        Ok(self.tables.read().await.attributes.values().filter(|a| Tables::attribute_matches(a, filter)).count() as u64)
    }

    async fn distinct_attribute_names(&self, product_id: Option<Uuid>) -> Result<Vec<String>> {
        let t = self.tables.read().await;
        let mut names: Vec<String> = t.attributes.values()
            .filter(|a| product_id.map_or(true, |p| a.product_id == p))
            .map(|a| a.attribute_name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn delete_attributes(&self, ids: &[Uuid]) -> Result<u64> {
        let mut t = self.tables.write().await;
        let before = t.attributes.len();
        t.attributes.retain(|id, _| !ids.contains(id));
        Ok((before - t.attributes.len()) as u64)
    }
}

// =============================================================================
// Comments
// =============================================================================

#[async_trait]
impl CommentRepository for MemoryCatalog {
    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.tables.write().await.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn save_comment(&self, comment: &Comment) -> Result<()> {
        match self.tables.write().await.comments.get_mut(&comment.id) {
            Some(slot) => { *slot = comment.clone(); Ok(()) }
            None => Err(CatalogError::not_found("Comment not found")),
        }
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn list_comments(&self, filter: &CommentFilter, page: Option<PageRequest>) -> Result<Vec<Comment>> {
        let t = self.tables.read().await;
        let mut items: Vec<Comment> = t.comments.values().filter(|c| Tables::comment_matches(c, filter)).cloned().collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(window(items, page))
    }

    async fn count_comments(&self, filter: &CommentFilter) -> Result<u64> {
        Ok(self.tables.read().await.comments.values().filter(|c| Tables::comment_matches(c, filter)).count() as u64)
    }

    async fn rating_histogram(&self, product_id: Option<Uuid>) -> Result<Vec<(i16, u64)>> {
        let t = self.tables.read().await;
        let mut counts: HashMap<i16, u64> = HashMap::new();
        for c in t.comments.values().filter(|c| product_id.map_or(true, |p| c.product_id == p)) {
            *counts.entry(c.rating).or_default() += 1;
        }
        let mut histogram: Vec<(i16, u64)> = counts.into_iter().collect();
        histogram.sort_unstable();
        Ok(histogram)
    }

    async fn delete_comments(&self, ids: &[Uuid]) -> Result<u64> {
        let mut t = self.tables.write().await;
        let before = t.comments.len();
        t.comments.retain(|id, _| !ids.contains(id));
        Ok((before - t.comments.len()) as u64)
    }
}

// =============================================================================
// Customers
// =============================================================================

#[async_trait]
impl CustomerRepository for MemoryCatalog {
    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.customers.values().any(|c| c.user_id == customer.user_id) { return Err(unique_violation("customers_user_id_key")); }
        t.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        match self.tables.write().await.customers.get_mut(&customer.id) {
            Some(slot) => { *slot = customer.clone(); Ok(()) }
            None => Err(CatalogError::not_found("Customer not found")),
        }
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(&id).cloned())
    }

    async fn find_customer_by_user(&self, user_id: Uuid) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.customers.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn list_customers(&self, filter: &CustomerFilter, page: Option<PageRequest>) -> Result<Vec<Customer>> {
        let t = self.tables.read().await;
        let mut items: Vec<Customer> = t.customers.values().filter(|c| Tables::customer_matches(c, filter)).cloned().collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(window(items, page))
    }

    async fn count_customers(&self, filter: &CustomerFilter) -> Result<u64> {
        Ok(self.tables.read().await.customers.values().filter(|c| Tables::customer_matches(c, filter)).count() as u64)
    }

    async fn delete_customers(&self, ids: &[Uuid]) -> Result<u64> {
        let mut t = self.tables.write().await;
        let before = t.customers.len();
        t.customers.retain(|id, _| !ids.contains(id));
        Ok((before - t.customers.len()) as u64)
    }
}

// =============================================================================
// Stores
// =============================================================================

#[async_trait]
impl StoreRepository for MemoryCatalog {
    async fn insert_store(&self, store: &Store) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.stores.values().any(|s| s.user_id == store.user_id) { return Err(unique_violation("stores_user_id_key")); }
        t.stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn save_store(&self, store: &Store) -> Result<()> {
        match self.tables.write().await.stores.get_mut(&store.id) {
            Some(slot) => { *slot = store.clone(); Ok(()) }
            None => Err(CatalogError::not_found("Store not found")),
        }
    }

    async fn find_store(&self, id: Uuid) -> Result<Option<Store>> {
        Ok(self.tables.read().await.stores.get(&id).cloned())
    }

    async fn find_store_by_user(&self, user_id: Uuid) -> Result<Option<Store>> {
        Ok(self.tables.read().await.stores.values().find(|s| s.user_id == user_id).cloned())
    }

    async fn list_stores(&self, filter: &StoreFilter, page: Option<PageRequest>) -> Result<Vec<Store>> {
        let t = self.tables.read().await;
        let mut items: Vec<Store> = t.stores.values().filter(|s| Tables::store_matches(s, filter)).cloned().collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(window(items, page))
    }

    async fn count_stores(&self, filter: &StoreFilter) -> Result<u64> {
        Ok(self.tables.read().await.stores.values().filter(|s| Tables::store_matches(s, filter)).count() as u64)
    }

    async fn list_store_images(&self, store_id: Uuid) -> Result<Vec<StoreImage>> {
        let t = self.tables.read().await;
        let mut items: Vec<StoreImage> = t.store_images.values().filter(|i| i.store_id == store_id).cloned().collect();
        items.sort_by_key(|i| i.image_type == StoreImageType::Banner);
        Ok(items)
    }

    async fn upsert_store_image(&self, image: &StoreImage) -> Result<Option<StoreImage>> {
        let mut t = self.tables.write().await;
        let previous = t.store_images.values()
            .find(|i| i.store_id == image.store_id && i.image_type == image.image_type)
            .cloned();
        if let Some(prev) = &previous { t.store_images.remove(&prev.id); }
        t.store_images.insert(image.id, image.clone());
        Ok(previous)
    }

    async fn delete_store(&self, id: Uuid) -> Result<RowRemoval> {
        let mut t = self.tables.write().await;
        if t.products.values().any(|p| p.store_id() == id) {
            return Err(CatalogError::Storage("Store still owns products".into()));
        }
        let asset_ids: Vec<String> = t.store_images.values().filter(|i| i.store_id == id).filter_map(|i| i.asset_id.clone()).collect();
        t.store_images.retain(|_, i| i.store_id != id);
        let rows = t.stores.remove(&id).is_some() as u64;
        t.queue_assets(&asset_ids);
        Ok(RowRemoval { rows, asset_ids })
    }
}

// =============================================================================
// Users and the asset ledger
// =============================================================================

#[async_trait]
impl UserRepository for MemoryCatalog {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) { return Err(unique_violation("users_email_key")); }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let mut t = self.tables.write().await;
        t.save_user(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t.users.values().filter(|u| filter.role.map_or(true, |r| u.role == r)).cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> Result<RowRemoval> {
        let mut t = self.tables.write().await;
        if t.stores.values().any(|s| s.user_id == id) {
            return Err(CatalogError::Storage("User still owns a store".into()));
        }
        let asset_ids = t.profile_images.remove(&id).map(|i| i.asset_ids()).unwrap_or_default();
        t.locations.retain(|_, l| l.user_id != id);
        t.comments.retain(|_, c| c.user_id != id);
        t.wishlist.retain(|_, (user, _)| *user != id);
        t.customers.retain(|_, c| c.user_id != id);
        let rows = t.users.remove(&id).is_some() as u64;
        t.queue_assets(&asset_ids);
        Ok(RowRemoval { rows, asset_ids })
    }

    async fn list_locations(&self, user_id: Uuid) -> Result<Vec<UserLocation>> {
        let t = self.tables.read().await;
        let mut locations: Vec<UserLocation> = t.locations.values().filter(|l| l.user_id == user_id).cloned().collect();
        locations.sort_by_key(|l| (!l.is_default, l.created_at, l.id));
        Ok(locations)
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<UserLocation>> {
        Ok(self.tables.read().await.locations.get(&id).cloned())
    }

    async fn set_default_location(&self, user_id: Uuid, location_id: Uuid) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.locations.get(&location_id).is_some_and(|l| l.user_id == user_id) {
            return Err(CatalogError::not_found("Location not found"));
        }
        t.make_default(user_id, location_id);
        Ok(())
    }

    async fn delete_location(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.locations.remove(&id).is_some())
    }

    async fn find_profile_image(&self, user_id: Uuid) -> Result<Option<ProfileImage>> {
        Ok(self.tables.read().await.profile_images.get(&user_id).cloned())
    }

    async fn save_profile(&self, write: &ProfileWrite) -> Result<Option<ProfileImage>> {
        if self.fail_profile_writes.load(Ordering::SeqCst) {
            return Err(CatalogError::Internal(format!("Simulated failure saving profile {}", write.user.id)));
        }
        let mut t = self.tables.write().await;
        let user_id = write.user.id;
        if write.locations.iter().any(|l| l.user_id != user_id || t.locations.get(&l.id).is_some_and(|old| old.user_id != user_id)) {
            return Err(CatalogError::not_found("Location not found"));
        }
        t.save_user(&write.user)?;
        for location in &write.locations {
            t.locations.insert(location.id, location.clone());
        }
        if let Some(default) = write.locations.iter().rev().find(|l| l.is_default) {
            t.make_default(user_id, default.id);
        }
        Ok(match &write.image {
            Some(image) => t.profile_images.insert(user_id, image.clone()),
            None => None,
        })
    }
}

#[async_trait]
impl AssetLedger for MemoryCatalog {
    async fn queue_asset_deletions(&self, asset_ids: &[String]) -> Result<()> {
        self.tables.write().await.queue_assets(asset_ids);
        Ok(())
    }

    async fn pending_asset_deletions(&self, limit: u32) -> Result<Vec<String>> {
        Ok(self.tables.read().await.pending_assets.iter().take(limit as usize).cloned().collect())
    }

    async fn clear_asset_deletions(&self, asset_ids: &[String]) -> Result<()> {
        self.tables.write().await.pending_assets.retain(|id| !asset_ids.contains(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::NewProduct;

    fn product(store_id: Uuid, slug: &str) -> Product {
        Product::create(NewProduct {
            store_id, name: slug.into(), slug: Slug::parse(slug).unwrap(),
            description: Some("A sturdy widget".into()), brand: Some("Acme".into()), category: Some("Tools".into()), status: None,
        }).unwrap()
    }

    #[tokio::test]
    async fn test_slug_is_unique_across_stores() {
        let db = MemoryCatalog::new();
        db.insert_product(&product(Uuid::new_v4(), "widget-1")).await.unwrap();
        let err = db.insert_product(&product(Uuid::new_v4(), "widget-1")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_or_across_fields() {
        let db = MemoryCatalog::new();
        let store = Uuid::new_v4();
        db.insert_product(&product(store, "widget-1")).await.unwrap();
        let filter = ProductFilter {
            search: Some(TextSearch { term: "ACME".into(), fields: ProductField::LISTING.to_vec() }),
            ..ProductFilter::store(store)
        };
        assert_eq!(db.count_products(&filter).await.unwrap(), 1);
        let miss = ProductFilter { search: Some(TextSearch { term: "acme".into(), fields: vec![ProductField::Name] }), ..filter };
        assert_eq!(db.count_products(&miss).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_removes_dependents_and_queues_assets() {
        let db = MemoryCatalog::new();
        let p = product(Uuid::new_v4(), "widget-2");
        db.insert_product(&p).await.unwrap();
        db.insert_variant(&ProductVariant::create(p.id(), "Default", rust_decimal::Decimal::new(999, 2), 4)).await.unwrap();
        let mut image = ProductImage::create(p.id(), "https://cdn/x.jpg", 0);
        image.asset_id = Some("catalog/x".into());
        db.insert_image(&image).await.unwrap();
        db.add_review(p.id()).await;
        db.add_wishlist_item(Uuid::new_v4(), p.id()).await;
        assert_eq!(db.dependent_rows(p.id()).await, 5);

        let outcome = db.purge_products(&[p.id()]).await.unwrap();
        assert_eq!(outcome, PurgeOutcome { products: 1, asset_ids: vec!["catalog/x".into()] });
        assert_eq!(db.dependent_rows(p.id()).await, 0);
        assert_eq!(db.pending_asset_deletions(10).await.unwrap(), vec!["catalog/x".to_string()]);
    }

    #[tokio::test]
    async fn test_set_main_image_demotes_others() {
        let db = MemoryCatalog::new();
        let product_id = Uuid::new_v4();
        let mut first = ProductImage::create(product_id, "https://cdn/1.jpg", 0);
        first.image_type = ImageType::Main;
        let second = ProductImage::create(product_id, "https://cdn/2.jpg", 1);
        db.insert_image(&first).await.unwrap();
        db.insert_image(&second).await.unwrap();
        db.set_main_image(product_id, second.id).await.unwrap();
        let mains = db.count_images(&ImageFilter { product_id: Some(product_id), image_type: Some(ImageType::Main), ..Default::default() }).await.unwrap();
        assert_eq!(mains, 1);
        assert_eq!(db.find_image(second.id).await.unwrap().unwrap().image_type, ImageType::Main);
    }

    #[tokio::test]
    async fn test_save_profile_keeps_single_default_location() {
        let db = MemoryCatalog::new();
        let user = User::create("loc@example.com", "Loc", None);
        db.insert_user(&user).await.unwrap();
        let mut home = UserLocation::create(user.id, "1 Home Road", "NG");
        home.is_default = true;
        let work = UserLocation::create(user.id, "2 Work Street", "NG");
        db.save_profile(&ProfileWrite { user: user.clone(), locations: vec![home.clone(), work.clone()], image: None }).await.unwrap();
        assert_eq!(db.list_locations(user.id).await.unwrap()[0].id, home.id);

        db.set_default_location(user.id, work.id).await.unwrap();
        let listed = db.list_locations(user.id).await.unwrap();
        assert_eq!(listed.iter().filter(|l| l.is_default).count(), 1);
        assert_eq!(listed[0].id, work.id);

        let stranger = Uuid::new_v4();
        assert!(matches!(db.set_default_location(stranger, home.id).await, Err(CatalogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_save_profile_rejects_duplicate_email_without_writing() {
        let db = MemoryCatalog::new();
        let a = User::create("a@example.com", "A", None);
        let b = User::create("b@example.com", "B", None);
        db.insert_user(&a).await.unwrap();
        db.insert_user(&b).await.unwrap();
        let mut renamed = b.clone();
        renamed.email = "A@example.com".into();
        let location = UserLocation::create(b.id, "3 Side Lane", "GH");
        let err = db.save_profile(&ProfileWrite { user: renamed, locations: vec![location], image: None }).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
        assert!(db.list_locations(b.id).await.unwrap().is_empty());
        assert_eq!(db.find_user(b.id).await.unwrap().unwrap().email, "b@example.com");
    }

    #[tokio::test]
    async fn test_delete_user_queues_profile_assets() {
        let db = MemoryCatalog::new();
        let user = User::create("gone@example.com", "Gone", None);
        db.insert_user(&user).await.unwrap();
        let mut image = ProfileImage::empty(user.id);
        image.profile_asset_id = Some("profiles/p".into());
        db.save_profile(&ProfileWrite { user: user.clone(), locations: vec![], image: Some(image) }).await.unwrap();

        let removal = db.delete_user(user.id).await.unwrap();
        assert_eq!(removal, RowRemoval { rows: 1, asset_ids: vec!["profiles/p".into()] });
        assert!(db.find_user(user.id).await.unwrap().is_none());
        assert!(db.find_profile_image(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_images_counts_image_rows() {
        let db = MemoryCatalog::new();
        let product_id = Uuid::new_v4();
        let mut hosted = ProductImage::create(product_id, "https://cdn/1.jpg", 0);
        hosted.asset_id = Some("catalog/1".into());
        let linked = ProductImage::create(product_id, "https://cdn/2.jpg", 1);
        db.insert_image(&hosted).await.unwrap();
        db.insert_image(&linked).await.unwrap();

        let removal = db.delete_images(&[hosted.id, linked.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(removal, RowRemoval { rows: 2, asset_ids: vec!["catalog/1".into()] });
        assert_eq!(db.pending_asset_deletions(10).await.unwrap(), vec!["catalog/1".to_string()]);
    }
}
