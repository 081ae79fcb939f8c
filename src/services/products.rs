//! Catalog query layer and product editing

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{distinct_ids, BatchReport};
use crate::domain::aggregates::{
    Inventory, NewProduct, Product, ProductAttribute, ProductImage, ProductStatus, ProductVariant, Store,
};
use crate::domain::value_objects::{Page, PageRequest, Sku, Slug};
use crate::events::EventPublisher;
use crate::repository::{
    AttributeFilter, Catalog, CommentFilter, ImageFilter, ProductField, ProductFilter, ProductOrder, TextSearch, TrashScope,
};
use crate::state::AppState;
use crate::{CatalogError, Result};

const PREVIEW_LEN: u32 = 3;
const POPULAR_DEFAULT: u32 = 10;

// =============================================================================
// Views
// =============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct StoreRef {
    pub id: Uuid,
    pub name: String,
}

/// Listing row: the product with a preview of its store, images and variants.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: Product,
    pub store: Option<StoreRef>,
    pub images: Vec<ProductImage>,
    pub variants: Vec<ProductVariant>,
    pub comment_count: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct VariantView {
    #[serde(flatten)]
    pub variant: ProductVariant,
    pub inventory: Option<Inventory>,
}

/// A product with every owned relation loaded.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub store: Option<Store>,
    pub images: Vec<ProductImage>,
    pub variants: Vec<VariantView>,
    pub attributes: Vec<ProductAttribute>,
    pub comment_count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStats {
    pub total: u64,
    pub with_images: u64,
    pub without_images: u64,
    pub draft: u64,
    pub active: u64,
    pub inactive: u64,
    pub out_of_stock: u64,
    pub in_trash: u64,
}

pub(crate) async fn load_summary(catalog: &dyn Catalog, product: Product) -> Result<ProductSummary> {
    let store = catalog.find_store(product.store_id()).await?.map(|s| StoreRef { id: s.id, name: s.name });
    let images = catalog
        .list_images(&ImageFilter { product_id: Some(product.id()), ..Default::default() }, Some(PageRequest::first(PREVIEW_LEN)))
        .await?;
    let variants = catalog.list_variants(product.id(), Some(PREVIEW_LEN)).await?;
    let comment_count = catalog.count_comments(&CommentFilter { product_id: Some(product.id()), ..Default::default() }).await?;
    Ok(ProductSummary { product, store, images, variants, comment_count })
}

pub(crate) async fn load_summaries(catalog: &dyn Catalog, products: Vec<Product>) -> Result<Vec<ProductSummary>> {
    let mut out = Vec::with_capacity(products.len());
    for p in products {
        out.push(load_summary(catalog, p).await?);
    }
    Ok(out)
}

pub(crate) async fn load_variant_view(catalog: &dyn Catalog, variant: ProductVariant) -> Result<VariantView> {
    let inventory = catalog.find_inventory(variant.id).await?;
    Ok(VariantView { variant, inventory })
}

pub(crate) async fn load_detail(catalog: &dyn Catalog, product: Product) -> Result<ProductDetail> {
    let id = product.id();
    let store = catalog.find_store(product.store_id()).await?;
    let images = catalog.list_images(&ImageFilter { product_id: Some(id), ..Default::default() }, None).await?;
    let mut variants = Vec::new();
    for v in catalog.list_variants(id, None).await? {
        variants.push(load_variant_view(catalog, v).await?);
    }
    let attributes = catalog.list_attributes(&AttributeFilter { product_id: Some(id), ..Default::default() }, None).await?;
    let comment_count = catalog.count_comments(&CommentFilter { product_id: Some(id), ..Default::default() }).await?;
    Ok(ProductDetail { product, store, images, variants, attributes, comment_count })
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub sku: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
}

/// Variant edit inside a product update: with `id` it patches that variant,
/// without one it creates a new variant (then `name` and `price` are required).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariantPatch {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    pub store_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Derived from `name` when absent.
    pub slug: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    #[validate]
    pub variants: Vec<VariantInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    pub store_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub slug: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub brand: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    #[validate]
    pub variants: Vec<VariantPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub store_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl ProductQuery {
    pub fn page_request(&self) -> PageRequest { PageRequest::new(self.page, self.limit) }

    fn filter(&self) -> ProductFilter {
        ProductFilter {
            store_id: self.store_id,
            status: self.status,
            category: non_blank(&self.category),
            brand: non_blank(&self.brand),
            search: non_blank(&self.search).map(|term| TextSearch { term, fields: ProductField::LISTING.to_vec() }),
            trash: if self.include_deleted { TrashScope::Include } else { TrashScope::Exclude },
            ..ProductFilter::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub store_id: Option<Uuid>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn parse_sku(raw: Option<&str>) -> Result<Option<Sku>> {
    Ok(raw.map(Sku::new).transpose()?)
}

fn check_prices(price: Decimal, compare_at_price: Option<Decimal>) -> Result<()> {
    if price.is_sign_negative() { return Err(CatalogError::bad_request("price must not be negative")); }
    if compare_at_price.is_some_and(|c| c.is_sign_negative()) {
        return Err(CatalogError::bad_request("compareAtPrice must not be negative"));
    }
    Ok(())
}

/// A checked variant edit waiting to be written.
enum VariantWrite {
    Insert(ProductVariant),
    Update(ProductVariant),
}

// =============================================================================
// Service
// =============================================================================

#[derive(Clone)]
pub struct ProductService {
    catalog: Arc<dyn Catalog>,
    events: EventPublisher,
}

impl ProductService {
    pub fn new(state: &AppState) -> Self { Self { catalog: state.catalog.clone(), events: state.events.clone() } }

    async fn require_store(&self, store_id: Uuid) -> Result<Store> {
        self.catalog.find_store(store_id).await?.ok_or_else(|| CatalogError::not_found(format!("Store {store_id} not found")))
    }

    async fn ensure_slug_free(&self, slug: &Slug, except: Option<Uuid>) -> Result<()> {
        match self.catalog.find_product_by_slug(slug).await? {
            Some(existing) if Some(existing.id()) != except => {
                Err(CatalogError::bad_request(format!("Product slug must be unique: {slug} is taken")))
            }
            _ => Ok(()),
        }
    }

    async fn ensure_sku_free(&self, sku: &Sku, except: Option<Uuid>) -> Result<()> {
        match self.catalog.find_variant_by_sku(sku).await? {
            Some(existing) if Some(existing.id) != except => Err(CatalogError::bad_request(format!("SKU must be unique: {sku} is taken"))),
            _ => Ok(()),
        }
    }

    /// Finds a live product. Trashed products count as absent.
    pub(crate) async fn require_live(&self, id: Uuid) -> Result<Product> {
        match self.catalog.find_product(id).await? {
            Some(p) if !p.is_deleted() => Ok(p),
            _ => Err(CatalogError::not_found(format!("Product {id} not found"))),
        }
    }

    async fn page_of(&self, filter: ProductFilter, order: ProductOrder, req: PageRequest) -> Result<Page<ProductSummary>> {
        let total = self.catalog.count_products(&filter).await?;
        let products = self.catalog.list_products(&filter, order, Some(req)).await?;
        Ok(Page::new(load_summaries(self.catalog.as_ref(), products).await?, total, req))
    }

    pub async fn create(&self, input: CreateProductInput) -> Result<ProductDetail> {
        input.validate()?;
        self.require_store(input.store_id).await?;
        let slug = match non_blank(&input.slug) {
            Some(raw) => Slug::parse(raw)?,
            None => Slug::from_name(&input.name)?,
        };
        self.ensure_slug_free(&slug, None).await?;

        let mut variants = Vec::with_capacity(input.variants.len());
        let mut skus: Vec<Sku> = Vec::new();
        for v in &input.variants {
            check_prices(v.price, v.compare_at_price)?;
            let sku = parse_sku(v.sku.as_deref())?;
            if let Some(sku) = &sku {
                if skus.contains(sku) { return Err(CatalogError::bad_request(format!("Duplicate SKU {sku} in request"))); }
                self.ensure_sku_free(sku, None).await?;
                skus.push(sku.clone());
            }
            variants.push((v, sku));
        }

        let mut product = Product::create(NewProduct {
            store_id: input.store_id,
            name: input.name.trim().to_string(),
            slug,
            description: input.description.clone(),
            brand: input.brand.clone(),
            category: input.category.clone(),
            status: input.status,
        })?;
        self.catalog.insert_product(&product).await?;
        for (v, sku) in variants {
            let mut variant = ProductVariant::create(product.id(), v.name.trim(), v.price, v.stock.unwrap_or(0));
            variant.sku = sku;
            variant.compare_at_price = v.compare_at_price;
            self.catalog.insert_variant(&variant).await?;
        }
        tracing::info!(product_id = %product.id(), store_id = %product.store_id(), slug = %product.slug(), "product created");
        self.events.publish_all(product.take_events()).await;
        load_detail(self.catalog.as_ref(), product).await
    }

    pub async fn list(&self, query: &ProductQuery) -> Result<Page<ProductSummary>> {
        self.page_of(query.filter(), ProductOrder::CreatedDesc, query.page_request()).await
    }

    pub async fn find_one(&self, id: Uuid, include_deleted: bool) -> Result<ProductDetail> {
        let product = match self.catalog.find_product(id).await? {
            Some(p) if include_deleted || !p.is_deleted() => p,
            _ => return Err(CatalogError::not_found(format!("Product {id} not found"))),
        };
        load_detail(self.catalog.as_ref(), product).await
    }

    pub async fn find_by_slug(&self, raw: &str) -> Result<ProductDetail> {
        let slug = Slug::parse(raw)?;
        match self.catalog.find_product_by_slug(&slug).await? {
            Some(p) if !p.is_deleted() => load_detail(self.catalog.as_ref(), p).await,
            _ => Err(CatalogError::not_found(format!("Product with slug {slug} not found"))),
        }
    }

    pub async fn find_by_store(&self, store_id: Uuid, query: &ProductQuery) -> Result<Page<ProductSummary>> {
        self.require_store(store_id).await?;
        let filter = ProductFilter { store_id: Some(store_id), ..query.filter() };
        self.page_of(filter, ProductOrder::CreatedDesc, query.page_request()).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Page<ProductSummary>> {
        let term = query.q.trim();
        if term.is_empty() { return Err(CatalogError::bad_request("Search query is required")); }
        let filter = ProductFilter {
            store_id: query.store_id,
            category: non_blank(&query.category),
            search: Some(TextSearch { term: term.to_string(), fields: ProductField::SEARCH.to_vec() }),
            ..ProductFilter::default()
        };
        self.page_of(filter, ProductOrder::CreatedDesc, PageRequest::new(query.page, query.limit)).await
    }

    pub async fn find_by_status(&self, status: ProductStatus, req: PageRequest) -> Result<Page<ProductSummary>> {
        let trash = if status == ProductStatus::Deleted { TrashScope::Only } else { TrashScope::Exclude };
        self.page_of(ProductFilter { status: Some(status), trash, ..ProductFilter::default() }, ProductOrder::CreatedDesc, req).await
    }

    pub async fn find_by_category(&self, category: &str, req: PageRequest) -> Result<Page<ProductSummary>> {
        let filter = ProductFilter { category: Some(category.trim().to_string()), ..ProductFilter::default() };
        self.page_of(filter, ProductOrder::CreatedDesc, req).await
    }

    pub async fn find_by_brand(&self, brand: &str, req: PageRequest) -> Result<Page<ProductSummary>> {
        let filter = ProductFilter { brand: Some(brand.trim().to_string()), ..ProductFilter::default() };
        self.page_of(filter, ProductOrder::CreatedDesc, req).await
    }

    /// Active products with the most comments first.
    pub async fn popular(&self, store_id: Option<Uuid>, limit: Option<u32>) -> Result<Vec<ProductSummary>> {
        let filter = ProductFilter { store_id, status: Some(ProductStatus::Active), ..ProductFilter::default() };
        let req = PageRequest::first(limit.unwrap_or(POPULAR_DEFAULT));
        let products = self.catalog.list_products(&filter, ProductOrder::CommentsDesc, Some(req)).await?;
        load_summaries(self.catalog.as_ref(), products).await
    }

    pub async fn stats(&self, store_id: Option<Uuid>) -> Result<ProductStats> {
        if let Some(id) = store_id { self.require_store(id).await?; }
        let live = ProductFilter { store_id, ..ProductFilter::default() };
        let count_status = |status| ProductFilter { status: Some(status), ..live.clone() };
        let total = self.catalog.count_products(&live).await?;
        let with_images = self.catalog.count_products(&ProductFilter { has_images: Some(true), ..live.clone() }).await?;
        Ok(ProductStats {
            total,
            with_images,
            without_images: total.saturating_sub(with_images),
            draft: self.catalog.count_products(&count_status(ProductStatus::Draft)).await?,
            active: self.catalog.count_products(&count_status(ProductStatus::Active)).await?,
            inactive: self.catalog.count_products(&count_status(ProductStatus::Inactive)).await?,
            out_of_stock: self.catalog.count_products(&count_status(ProductStatus::OutOfStock)).await?,
            in_trash: self.catalog.count_products(&ProductFilter { store_id, trash: TrashScope::Only, ..ProductFilter::default() }).await?,
        })
    }

    pub async fn update(&self, id: Uuid, input: UpdateProductInput) -> Result<ProductDetail> {
        input.validate()?;
        let mut product = self.catalog.find_product(id).await?.ok_or_else(|| CatalogError::not_found(format!("Product {id} not found")))?;
        if product.is_deleted() { return Err(crate::domain::aggregates::ProductError::Trashed.into()); }

        if let Some(store_id) = input.store_id.filter(|s| *s != product.store_id()) {
            self.require_store(store_id).await?;
            product.move_to_store(store_id);
        }
        if let Some(raw) = non_blank(&input.slug) {
            let slug = Slug::parse(raw)?;
            if &slug != product.slug() {
                self.ensure_slug_free(&slug, Some(id)).await?;
                product.set_slug(slug);
            }
        }
        if let Some(name) = &input.name { product.rename(name.trim()); }
        if input.description.is_some() { product.set_description(input.description.clone()); }
        if input.brand.is_some() { product.set_brand(input.brand.clone()); }
        if input.category.is_some() { product.set_category(input.category.clone()); }
        if let Some(status) = input.status { product.set_status(status)?; }

        let mut claimed = Vec::new();
        let mut writes = Vec::with_capacity(input.variants.len());
        for patch in &input.variants {
            writes.push(self.prepare_variant_patch(id, patch, &mut claimed).await?);
        }
        self.catalog.save_product(&product).await?;
        for write in writes {
            self.write_variant(write).await?;
        }
        tracing::info!(product_id = %id, "product updated");
        self.events.publish_all(product.take_events()).await;
        load_detail(self.catalog.as_ref(), product).await
    }

    /// Checks one nested variant edit without writing anything. SKUs already
    /// claimed by earlier edits of the same request count as taken.
    async fn prepare_variant_patch(&self, product_id: Uuid, patch: &VariantPatch, claimed: &mut Vec<Sku>) -> Result<VariantWrite> {
        match patch.id {
            Some(variant_id) => Ok(VariantWrite::Update(self.prepare_update(Some(product_id), variant_id, patch, claimed).await?)),
            None => {
                let (Some(name), Some(price)) = (&patch.name, patch.price) else {
                    return Err(CatalogError::bad_request("New variants need a name and a price"));
                };
                let input = VariantInput {
                    name: name.clone(), sku: patch.sku.clone(), price,
                    compare_at_price: patch.compare_at_price, stock: patch.stock,
                };
                Ok(VariantWrite::Insert(self.prepare_insert(product_id, &input, claimed).await?))
            }
        }
    }

    async fn claim_sku(&self, sku: &Sku, except: Option<Uuid>, claimed: &mut Vec<Sku>) -> Result<()> {
        if claimed.contains(sku) { return Err(CatalogError::bad_request(format!("Duplicate SKU {sku} in request"))); }
        self.ensure_sku_free(sku, except).await?;
        claimed.push(sku.clone());
        Ok(())
    }

    async fn prepare_insert(&self, product_id: Uuid, input: &VariantInput, claimed: &mut Vec<Sku>) -> Result<ProductVariant> {
        input.validate()?;
        check_prices(input.price, input.compare_at_price)?;
        let sku = parse_sku(input.sku.as_deref())?;
        if let Some(sku) = &sku { self.claim_sku(sku, None, claimed).await?; }
        let mut variant = ProductVariant::create(product_id, input.name.trim(), input.price, input.stock.unwrap_or(0));
        variant.sku = sku;
        variant.compare_at_price = input.compare_at_price;
        Ok(variant)
    }

    async fn prepare_update(&self, product_id: Option<Uuid>, variant_id: Uuid, patch: &VariantPatch, claimed: &mut Vec<Sku>) -> Result<ProductVariant> {
        patch.validate()?;
        let mut variant = match self.catalog.find_variant(variant_id).await? {
            Some(v) if product_id.map_or(true, |p| v.product_id == p) => v,
            _ => return Err(CatalogError::not_found(format!("Variant {variant_id} not found"))),
        };
        if product_id.is_none() { self.require_live(variant.product_id).await?; }
        if let Some(raw) = patch.sku.as_deref() {
            let sku = Sku::new(raw)?;
            self.claim_sku(&sku, Some(variant_id), claimed).await?;
            variant.sku = Some(sku);
        }
        if let Some(name) = &patch.name { variant.name = name.trim().to_string(); }
        if let Some(price) = patch.price { variant.price = price; }
        if patch.compare_at_price.is_some() { variant.compare_at_price = patch.compare_at_price; }
        if let Some(stock) = patch.stock { variant.stock = stock; }
        check_prices(variant.price, variant.compare_at_price)?;
        variant.touch();
        Ok(variant)
    }

    async fn write_variant(&self, write: VariantWrite) -> Result<VariantView> {
        match write {
            VariantWrite::Insert(variant) => {
                let inventory = self.catalog.insert_variant(&variant).await?;
                tracing::info!(product_id = %variant.product_id, variant_id = %variant.id, "variant added");
                Ok(VariantView { variant, inventory: Some(inventory) })
            }
            VariantWrite::Update(variant) => {
                self.catalog.save_variant(&variant).await?;
                load_variant_view(self.catalog.as_ref(), variant).await
            }
        }
    }

    pub async fn add_variant(&self, product_id: Uuid, input: VariantInput) -> Result<VariantView> {
        self.require_live(product_id).await?;
        let variant = self.prepare_insert(product_id, &input, &mut Vec::new()).await?;
        self.write_variant(VariantWrite::Insert(variant)).await
    }

    pub async fn update_variant(&self, variant_id: Uuid, patch: VariantPatch) -> Result<VariantView> {
        let variant = self.prepare_update(None, variant_id, &patch, &mut Vec::new()).await?;
        self.write_variant(VariantWrite::Update(variant)).await
    }

    pub async fn bulk_update_status(&self, ids: &[Uuid], status: ProductStatus) -> Result<BatchReport> {
        let ids = distinct_ids(ids)?;
        let mut report = BatchReport::default();
        for id in ids {
            let result = self.set_status(id, status).await;
            report.record(id, result);
        }
        tracing::info!(%status, updated = report.succeeded.len(), failed = report.failed.len(), "bulk status update");
        report.ensure_any_succeeded("updated")
    }

    async fn set_status(&self, id: Uuid, status: ProductStatus) -> Result<()> {
        let mut product = self.catalog.find_product(id).await?.ok_or_else(|| CatalogError::not_found(format!("Product {id} not found")))?;
        product.set_status(status)?;
        self.catalog.save_product(&product).await?;
        self.events.publish_all(product.take_events()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::User;
    use crate::Config;

    async fn setup() -> (ProductService, Uuid) {
        let state = AppState::in_memory(Config::for_tests());
        let user = User::create("owner@example.com", "Owner", None);
        state.catalog.insert_user(&user).await.unwrap();
        let store = Store::create(user.id, "Main Street");
        state.catalog.insert_store(&store).await.unwrap();
        (ProductService::new(&state), store.id)
    }

    fn input(store_id: Uuid, name: &str) -> CreateProductInput {
        CreateProductInput {
            store_id, name: name.into(), slug: None, description: None, brand: Some("Acme".into()),
            category: Some("Tools".into()), status: None, variants: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_derives_slug_and_defaults_active() {
        let (svc, store) = setup().await;
        let detail = svc.create(input(store, "Blue Widget")).await.unwrap();
        assert_eq!(detail.product.slug().as_str(), "blue-widget");
        assert_eq!(detail.product.status(), ProductStatus::Active);
        assert_eq!(detail.store.unwrap().id, store);
    }

    #[tokio::test]
    async fn test_create_unknown_store_is_not_found() {
        let (svc, _) = setup().await;
        let err = svc.create(input(Uuid::new_v4(), "Widget")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_variant_creates_inventory_from_stock() {
        let (svc, store) = setup().await;
        let mut req = input(store, "Widget");
        req.variants = vec![VariantInput { name: "Large".into(), sku: Some("w-l".into()), price: Decimal::new(1250, 2), compare_at_price: None, stock: Some(7) }];
        let detail = svc.create(req).await.unwrap();
        let view = &detail.variants[0];
        assert_eq!(view.variant.sku.as_ref().unwrap().as_str(), "W-L");
        assert_eq!(view.inventory.as_ref().unwrap().quantity_in_stock, 7);

        let dup = VariantInput { name: "Again".into(), sku: Some("W-L".into()), price: Decimal::ONE, compare_at_price: None, stock: None };
        assert!(matches!(svc.add_variant(detail.product.id(), dup).await, Err(CatalogError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_deleted_status_and_taken_slug() {
        let (svc, store) = setup().await;
        let a = svc.create(input(store, "Alpha")).await.unwrap();
        svc.create(input(store, "Beta")).await.unwrap();
        let err = svc.update(a.product.id(), UpdateProductInput { status: Some(ProductStatus::Deleted), ..Default::default() }).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
        let err = svc.update(a.product.id(), UpdateProductInput { slug: Some("beta".into()), ..Default::default() }).await.unwrap_err();
        assert!(err.to_string().contains("unique"));
    }

    #[tokio::test]
    async fn test_update_with_bad_variant_patch_writes_nothing() {
        let (svc, store) = setup().await;
        let mut req = input(store, "Widget");
        req.variants = vec![
            VariantInput { name: "Small".into(), sku: Some("w-s".into()), price: Decimal::new(500, 2), compare_at_price: None, stock: Some(1) },
            VariantInput { name: "Large".into(), sku: Some("w-l".into()), price: Decimal::new(900, 2), compare_at_price: None, stock: Some(1) },
        ];
        let created = svc.create(req).await.unwrap();
        let small = created.variants.iter().find(|v| v.variant.name == "Small").unwrap().variant.clone();

        let update = UpdateProductInput {
            name: Some("Renamed Widget".into()),
            variants: vec![
                VariantPatch { id: Some(small.id), price: Some(Decimal::new(100, 2)), ..Default::default() },
                VariantPatch { name: Some("Extra".into()), sku: Some("W-L".into()), price: Some(Decimal::ONE), ..Default::default() },
            ],
            ..Default::default()
        };
        let err = svc.update(created.product.id(), update).await.unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));

        let after = svc.find_one(created.product.id(), false).await.unwrap();
        assert_eq!(after.product.name(), "Widget");
        assert_eq!(after.variants.len(), 2);
        let small_after = after.variants.iter().find(|v| v.variant.id == small.id).unwrap();
        assert_eq!(small_after.variant.price, Decimal::new(500, 2));
    }

    #[tokio::test]
    async fn test_update_rejects_sku_repeated_within_request() {
        let (svc, store) = setup().await;
        let created = svc.create(input(store, "Widget")).await.unwrap();
        let update = UpdateProductInput {
            variants: vec![
                VariantPatch { name: Some("A".into()), sku: Some("dup-1".into()), price: Some(Decimal::ONE), ..Default::default() },
                VariantPatch { name: Some("B".into()), sku: Some("DUP-1".into()), price: Some(Decimal::ONE), ..Default::default() },
            ],
            ..Default::default()
        };
        assert!(matches!(svc.update(created.product.id(), update).await, Err(CatalogError::BadRequest(_))));
        assert!(svc.find_one(created.product.id(), false).await.unwrap().variants.is_empty());
    }

    #[tokio::test]
    async fn test_search_requires_term_and_matches_slug() {
        let (svc, store) = setup().await;
        svc.create(input(store, "Gadget Pro")).await.unwrap();
        assert!(svc.search(&SearchQuery::default()).await.is_err());
        let page = svc.search(&SearchQuery { q: "gadget-pro".into(), ..Default::default() }).await.unwrap();
        assert_eq!(page.pagination.total, 1);
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let (svc, store) = setup().await;
        let mut draft = input(store, "Draft One");
        draft.status = Some(ProductStatus::Draft);
        svc.create(draft).await.unwrap();
        svc.create(input(store, "Live One")).await.unwrap();
        let stats = svc.stats(Some(store)).await.unwrap();
        assert_eq!((stats.total, stats.draft, stats.active, stats.without_images), (2, 1, 1, 2));
    }
}
