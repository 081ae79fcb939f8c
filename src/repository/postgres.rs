//! Postgres catalog (sqlx)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::*;
use crate::domain::aggregates::{ImageType, ProductRecord, StoreImageType, UserStatus};
use crate::CatalogError;

const PRODUCT_COLUMNS: &str = "p.id, p.store_id, p.name, p.slug, p.description, p.brand, p.category, p.status, p.is_deleted, p.deleted_at, p.created_at, p.updated_at";
const VARIANT_COLUMNS: &str = "id, product_id, name, sku, price, compare_at_price, stock, created_at, updated_at";
const IMAGE_COLUMNS: &str = "id, product_id, image_url, alt_text, position, image_type, asset_id, width, height, file_size, mimetype, created_at, updated_at";
const ATTRIBUTE_COLUMNS: &str = "id, product_id, attribute_name, attribute_value, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, user_id, product_id, title, comment, rating, created_at, updated_at";
const CUSTOMER_COLUMNS: &str = "id, user_id, email, username, phone, address, created_at, updated_at";
const STORE_COLUMNS: &str = "id, user_id, name, description, address, city, state, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, username, password_hash, role, status, image, created_at, updated_at";
const LOCATION_COLUMNS: &str = "id, user_id, label, address_line, city, state, country, postal_code, latitude, longitude, is_default, created_at, updated_at";
const PROFILE_IMAGE_COLUMNS: &str = "user_id, profile, profile_asset_id, thumbnail, thumbnail_asset_id, updated_at";

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
    pub fn pool(&self) -> &PgPool { &self.pool }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, store_id: Uuid, name: String, slug: String, description: Option<String>,
    brand: Option<String>, category: Option<String>, status: String, is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = CatalogError;
    fn try_from(r: ProductRow) -> Result<Self> {
        let record = ProductRecord {
            id: r.id, store_id: r.store_id, name: r.name, slug: Slug::parse(&r.slug)?,
            description: r.description, brand: r.brand, category: r.category, status: r.status.parse()?,
            is_deleted: r.is_deleted, deleted_at: r.deleted_at, created_at: r.created_at, updated_at: r.updated_at,
        };
        Ok(Product::from_record(record)?)
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: Uuid, product_id: Uuid, name: String, sku: Option<String>, price: Decimal,
    compare_at_price: Option<Decimal>, stock: i32, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<VariantRow> for ProductVariant {
    type Error = CatalogError;
    fn try_from(r: VariantRow) -> Result<Self> {
        Ok(Self {
            id: r.id, product_id: r.product_id, name: r.name, sku: r.sku.map(Sku::new).transpose()?,
            price: r.price, compare_at_price: r.compare_at_price, stock: r.stock,
            created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InventoryRow { id: Uuid, variant_id: Uuid, quantity_in_stock: i32, updated_at: DateTime<Utc> }

impl From<InventoryRow> for Inventory {
    fn from(r: InventoryRow) -> Self {
        Self { id: r.id, variant_id: r.variant_id, quantity_in_stock: r.quantity_in_stock, updated_at: r.updated_at }
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: Uuid, product_id: Uuid, image_url: String, alt_text: Option<String>, position: i32,
    image_type: String, asset_id: Option<String>, width: Option<i32>, height: Option<i32>,
    file_size: Option<i64>, mimetype: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<ImageRow> for ProductImage {
    fn from(r: ImageRow) -> Self {
        Self {
            id: r.id, product_id: r.product_id, image_url: r.image_url, alt_text: r.alt_text, position: r.position,
            image_type: ImageType::parse(&r.image_type).unwrap_or_default(), asset_id: r.asset_id,
            width: r.width, height: r.height, file_size: r.file_size, mimetype: r.mimetype,
            created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttributeRow {
    id: Uuid, product_id: Uuid, attribute_name: String, attribute_value: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<AttributeRow> for ProductAttribute {
    fn from(r: AttributeRow) -> Self {
        Self {
            id: r.id, product_id: r.product_id, attribute_name: r.attribute_name,
            attribute_value: r.attribute_value, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid, user_id: Uuid, product_id: Uuid, title: Option<String>, comment: String, rating: i16,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id, user_id: r.user_id, product_id: r.product_id, title: r.title, comment: r.comment,
            rating: r.rating, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid, user_id: Uuid, email: String, username: Option<String>, phone: Option<String>,
    address: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(r: CustomerRow) -> Self {
        Self {
            id: r.id, user_id: r.user_id, email: r.email, username: r.username, phone: r.phone,
            address: r.address, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: Uuid, user_id: Uuid, name: String, description: Option<String>, address: Option<String>,
    city: Option<String>, state: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(r: StoreRow) -> Self {
        Self {
            id: r.id, user_id: r.user_id, name: r.name, description: r.description, address: r.address,
            city: r.city, state: r.state, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StoreImageRow {
    id: Uuid, store_id: Uuid, image_type: String, image_url: String, asset_id: Option<String>, updated_at: DateTime<Utc>,
}

impl TryFrom<StoreImageRow> for StoreImage {
    type Error = CatalogError;
    fn try_from(r: StoreImageRow) -> Result<Self> {
        let image_type = StoreImageType::parse(&r.image_type)
            .ok_or_else(|| CatalogError::internal(format!("Unknown store image type {}", r.image_type)))?;
        Ok(Self { id: r.id, store_id: r.store_id, image_type, image_url: r.image_url, asset_id: r.asset_id, updated_at: r.updated_at })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid, email: String, name: String, username: Option<String>, password_hash: Option<String>,
    role: String, status: String, image: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id, email: r.email, name: r.name, username: r.username, password_hash: r.password_hash,
            role: Role::parse(&r.role).unwrap_or_default(), status: UserStatus::parse(&r.status).unwrap_or_default(),
            image: r.image, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    id: Uuid, user_id: Uuid, label: Option<String>, address_line: String, city: Option<String>,
    state: Option<String>, country: String, postal_code: Option<String>, latitude: Option<f64>,
    longitude: Option<f64>, is_default: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<LocationRow> for UserLocation {
    fn from(r: LocationRow) -> Self {
        Self {
            id: r.id, user_id: r.user_id, label: r.label, address_line: r.address_line, city: r.city, state: r.state,
            country: r.country, postal_code: r.postal_code, latitude: r.latitude, longitude: r.longitude,
            is_default: r.is_default, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileImageRow {
    user_id: Uuid, profile: Option<String>, profile_asset_id: Option<String>, thumbnail: Option<String>,
    thumbnail_asset_id: Option<String>, updated_at: DateTime<Utc>,
}

impl From<ProfileImageRow> for ProfileImage {
    fn from(r: ProfileImageRow) -> Self {
        Self {
            user_id: r.user_id, profile: r.profile, profile_asset_id: r.profile_asset_id, thumbnail: r.thumbnail,
            thumbnail_asset_id: r.thumbnail_asset_id, updated_at: r.updated_at,
        }
    }
}

// =============================================================================
// Query helpers
// =============================================================================

/// `%term%` with LIKE metacharacters escaped.
fn like(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Option<PageRequest>) {
    if let Some(p) = page {
        qb.push(" LIMIT ").push_bind(i64::from(p.limit())).push(" OFFSET ").push_bind(p.skip() as i64);
    }
}

fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &ProductFilter) {
    qb.push(" WHERE TRUE");
    match f.trash {
        TrashScope::Exclude => { qb.push(" AND p.is_deleted = FALSE"); }
        TrashScope::Only => { qb.push(" AND p.is_deleted = TRUE"); }
        TrashScope::Include => {}
    }
    if let Some(ids) = &f.ids { qb.push(" AND p.id = ANY(").push_bind(ids.clone()).push(")"); }
    if let Some(store_id) = f.store_id { qb.push(" AND p.store_id = ").push_bind(store_id); }
    if let Some(status) = f.status { qb.push(" AND p.status = ").push_bind(status.as_str()); }
    if let Some(category) = &f.category { qb.push(" AND p.category ILIKE ").push_bind(like(category)); }
    if let Some(brand) = &f.brand { qb.push(" AND p.brand ILIKE ").push_bind(like(brand)); }
    if let Some(cutoff) = f.deleted_before { qb.push(" AND p.deleted_at <= ").push_bind(cutoff); }
    match f.has_images {
        Some(true) => { qb.push(" AND EXISTS (SELECT 1 FROM product_images i WHERE i.product_id = p.id)"); }
        Some(false) => { qb.push(" AND NOT EXISTS (SELECT 1 FROM product_images i WHERE i.product_id = p.id)"); }
        None => {}
    }
    if let Some(search) = f.search.as_ref().filter(|s| !s.fields.is_empty()) {
        qb.push(" AND (");
        {
            let mut any = qb.separated(" OR ");
            for field in &search.fields {
                any.push(format!("p.{} ILIKE ", field.column()));
                any.push_bind_unseparated(like(&search.term));
            }
        }
        qb.push(")");
    }
}

fn push_product_order(qb: &mut QueryBuilder<'_, Postgres>, order: ProductOrder) {
    qb.push(match order {
        ProductOrder::CreatedDesc => " ORDER BY p.created_at DESC, p.id DESC",
        ProductOrder::DeletedDesc => " ORDER BY p.deleted_at DESC NULLS LAST",
        ProductOrder::DeletedAsc => " ORDER BY p.deleted_at ASC NULLS LAST",
        ProductOrder::CommentsDesc => " ORDER BY (SELECT COUNT(*) FROM comments c WHERE c.product_id = p.id) DESC, p.created_at DESC",
    });
}

fn push_image_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &ImageFilter) {
    qb.push(" WHERE TRUE");
    if let Some(product_id) = f.product_id { qb.push(" AND product_id = ").push_bind(product_id); }
    if let Some(ids) = &f.ids { qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")"); }
    if let Some(t) = f.image_type { qb.push(" AND image_type = ").push_bind(t.as_str()); }
}

fn push_attribute_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &AttributeFilter) {
    qb.push(" WHERE TRUE");
    if let Some(product_id) = f.product_id { qb.push(" AND product_id = ").push_bind(product_id); }
    if let Some(name) = &f.name { qb.push(" AND LOWER(attribute_name) = LOWER(").push_bind(name.clone()).push(")"); }
    if let Some(s) = &f.search {
        qb.push(" AND (attribute_name ILIKE ").push_bind(like(s)).push(" OR attribute_value ILIKE ").push_bind(like(s)).push(")");
    }
}

fn push_comment_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &CommentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(ids) = &f.ids { qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")"); }
    if let Some(product_id) = f.product_id { qb.push(" AND product_id = ").push_bind(product_id); }
    if let Some(user_id) = f.user_id { qb.push(" AND user_id = ").push_bind(user_id); }
    if let Some(min) = f.min_rating { qb.push(" AND rating >= ").push_bind(min); }
    if let Some(max) = f.max_rating { qb.push(" AND rating <= ").push_bind(max); }
    if let Some(s) = &f.search {
        qb.push(" AND (comment ILIKE ").push_bind(like(s)).push(" OR title ILIKE ").push_bind(like(s)).push(")");
    }
}

fn push_customer_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &CustomerFilter) {
    qb.push(" WHERE TRUE");
    if let Some(ids) = &f.ids { qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")"); }
    if let Some(s) = &f.search {
        qb.push(" AND (email ILIKE ").push_bind(like(s))
            .push(" OR username ILIKE ").push_bind(like(s))
            .push(" OR phone ILIKE ").push_bind(like(s))
            .push(" OR address ILIKE ").push_bind(like(s)).push(")");
    }
}

fn push_store_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &StoreFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = f.user_id { qb.push(" AND user_id = ").push_bind(user_id); }
    if let Some(s) = &f.search {
        qb.push(" AND (name ILIKE ").push_bind(like(s))
            .push(" OR description ILIKE ").push_bind(like(s))
            .push(" OR city ILIKE ").push_bind(like(s)).push(")");
    }
}

async fn queue_assets(conn: &mut PgConnection, asset_ids: &[String]) -> Result<()> {
    if asset_ids.is_empty() { return Ok(()); }
    sqlx::query(
        r#"
        INSERT INTO pending_asset_deletions (asset_id)
        SELECT UNNEST($1::text[])
        ON CONFLICT (asset_id) DO NOTHING
        "#,
    )
    .bind(asset_ids)
    .execute(conn)
    .await?;
    Ok(())
}

fn not_found_unless_updated(rows: u64, what: &str) -> Result<()> {
    if rows == 0 { Err(CatalogError::not_found(format!("{what} not found"))) } else { Ok(()) }
}

// =============================================================================
// Products
// =============================================================================

#[async_trait]
impl ProductRepository for PgCatalog {
    async fn insert_product(&self, p: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, store_id, name, slug, description, brand, category, status, is_deleted, deleted_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(p.id()).bind(p.store_id()).bind(p.name()).bind(p.slug().as_str()).bind(p.description())
        .bind(p.brand()).bind(p.category()).bind(p.status().as_str()).bind(p.is_deleted()).bind(p.deleted_at())
        .bind(p.created_at()).bind(p.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_product(&self, p: &Product) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE products
            SET store_id = $2, name = $3, slug = $4, description = $5, brand = $6, category = $7,
                status = $8, is_deleted = $9, deleted_at = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(p.id()).bind(p.store_id()).bind(p.name()).bind(p.slug().as_str()).bind(p.description())
        .bind(p.brand()).bind(p.category()).bind(p.status().as_str()).bind(p.is_deleted()).bind(p.deleted_at())
        .bind(p.updated_at())
        .execute(&self.pool)
        .await?
        .rows_affected();
        not_found_unless_updated(rows, "Product")
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn find_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1"))
            .bind(slug.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter, order: ProductOrder, page: Option<PageRequest>) -> Result<Vec<Product>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p"));
        push_product_filter(&mut qb, filter);
        push_product_order(&mut qb, order);
        push_page(&mut qb, page);
        let rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_product_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn purge_products(&self, ids: &[Uuid]) -> Result<PurgeOutcome> {
        if ids.is_empty() { return Ok(PurgeOutcome::default()); }
        let mut tx = self.pool.begin().await?;

        let asset_ids: Vec<String> = sqlx::query_scalar(
            "SELECT asset_id FROM product_images WHERE product_id = ANY($1) AND asset_id IS NOT NULL",
        )
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM inventory WHERE variant_id IN (SELECT id FROM product_variants WHERE product_id = ANY($1))")
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        for table in ["product_variants", "product_images", "product_attributes", "reviews", "comments", "wishlist_items"] {
            let sql = format!("DELETE FROM {table} WHERE product_id = ANY($1)");
            sqlx::query(&sql).bind(ids).execute(&mut *tx).await?;
        }
        let products = sqlx::query("DELETE FROM products WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        queue_assets(&mut tx, &asset_ids).await?;
        tx.commit().await?;
        Ok(PurgeOutcome { products, asset_ids })
    }
}

// =============================================================================
// Variants
// =============================================================================

#[async_trait]
impl VariantRepository for PgCatalog {
    async fn insert_variant(&self, v: &ProductVariant) -> Result<Inventory> {
        let inventory = v.opening_inventory();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, name, sku, price, compare_at_price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(v.id).bind(v.product_id).bind(&v.name).bind(v.sku.as_ref().map(Sku::as_str)).bind(v.price)
        .bind(v.compare_at_price).bind(v.stock).bind(v.created_at).bind(v.updated_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO inventory (id, variant_id, quantity_in_stock, updated_at) VALUES ($1, $2, $3, $4)")
            .bind(inventory.id).bind(inventory.variant_id).bind(inventory.quantity_in_stock).bind(inventory.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(inventory)
    }

    async fn save_variant(&self, v: &ProductVariant) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE product_variants SET name = $2, sku = $3, price = $4, compare_at_price = $5, stock = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(v.id).bind(&v.name).bind(v.sku.as_ref().map(Sku::as_str)).bind(v.price)
        .bind(v.compare_at_price).bind(v.stock).bind(v.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        not_found_unless_updated(rows, "Variant")
    }

    async fn find_variant(&self, id: Uuid) -> Result<Option<ProductVariant>> {
        let row: Option<VariantRow> = sqlx::query_as(&format!("SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ProductVariant::try_from).transpose()
    }

    async fn find_variant_by_sku(&self, sku: &Sku) -> Result<Option<ProductVariant>> {
        let row: Option<VariantRow> = sqlx::query_as(&format!("SELECT {VARIANT_COLUMNS} FROM product_variants WHERE sku = $1"))
            .bind(sku.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(ProductVariant::try_from).transpose()
    }

    async fn find_inventory(&self, variant_id: Uuid) -> Result<Option<Inventory>> {
        let row: Option<InventoryRow> =
            sqlx::query_as("SELECT id, variant_id, quantity_in_stock, updated_at FROM inventory WHERE variant_id = $1")
                .bind(variant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Inventory::from))
    }

    async fn list_variants(&self, product_id: Uuid, limit: Option<u32>) -> Result<Vec<ProductVariant>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = "));
        qb.push_bind(product_id).push(" ORDER BY created_at, id");
        push_page(&mut qb, limit.map(PageRequest::first));
        let rows: Vec<VariantRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ProductVariant::try_from).collect()
    }
}

// =============================================================================
// Images
// =============================================================================

#[async_trait]
impl ImageRepository for PgCatalog {
    async fn insert_image(&self, i: &ProductImage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_images (id, product_id, image_url, alt_text, position, image_type, asset_id, width, height, file_size, mimetype, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(i.id).bind(i.product_id).bind(&i.image_url).bind(&i.alt_text).bind(i.position)
        .bind(i.image_type.as_str()).bind(&i.asset_id).bind(i.width).bind(i.height).bind(i.file_size)
        .bind(&i.mimetype).bind(i.created_at).bind(i.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_image(&self, i: &ProductImage) -> Result<()> {
        let rows = sqlx::query(
            r#"
            UPDATE product_images
            SET image_url = $2, alt_text = $3, position = $4, image_type = $5, asset_id = $6,
                width = $7, height = $8, file_size = $9, mimetype = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(i.id).bind(&i.image_url).bind(&i.alt_text).bind(i.position).bind(i.image_type.as_str())
        .bind(&i.asset_id).bind(i.width).bind(i.height).bind(i.file_size).bind(&i.mimetype).bind(i.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        not_found_unless_updated(rows, "Image")
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<ProductImage>> {
        let row: Option<ImageRow> = sqlx::query_as(&format!("SELECT {IMAGE_COLUMNS} FROM product_images WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ProductImage::from))
    }

    async fn list_images(&self, filter: &ImageFilter, page: Option<PageRequest>) -> Result<Vec<ProductImage>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {IMAGE_COLUMNS} FROM product_images"));
        push_image_filter(&mut qb, filter);
        qb.push(" ORDER BY position ASC, created_at ASC, id ASC");
        push_page(&mut qb, page);
        let rows: Vec<ImageRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ProductImage::from).collect())
    }

    async fn count_images(&self, filter: &ImageFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM product_images");
        push_image_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn max_image_position(&self, product_id: Uuid) -> Result<Option<i32>> {
        let max: Option<i32> = sqlx::query_scalar("SELECT MAX(position) FROM product_images WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(max)
    }

    async fn set_main_image(&self, product_id: Uuid, image_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM product_images WHERE id = $1 AND product_id = $2 FOR UPDATE")
            .bind(image_id)
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() { return Err(CatalogError::not_found("Image not found")); }
        sqlx::query(
            r#"
            UPDATE product_images
            SET image_type = CASE WHEN id = $2 THEN 'MAIN' ELSE 'GALLERY' END, updated_at = NOW()
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .bind(image_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_images(&self, ids: &[Uuid]) -> Result<RowRemoval> {
        let mut tx = self.pool.begin().await?;
        let removed: Vec<Option<String>> = sqlx::query_scalar("DELETE FROM product_images WHERE id = ANY($1) RETURNING asset_id")
            .bind(ids)
            .fetch_all(&mut *tx)
            .await?;
        let rows = removed.len() as u64;
        let asset_ids: Vec<String> = removed.into_iter().flatten().collect();
        queue_assets(&mut tx, &asset_ids).await?;
        tx.commit().await?;
        Ok(RowRemoval { rows, asset_ids })
    }
}

// =============================================================================
// Attributes
// =============================================================================

#[async_trait]
impl AttributeRepository for PgCatalog {
    async fn insert_attribute(&self, a: &ProductAttribute) -> Result<()> {
        sqlx::query(
            "INSERT INTO product_attributes (id, product_id, attribute_name, attribute_value, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(a.id).bind(a.product_id).bind(&a.attribute_name).bind(&a.attribute_value).bind(a.created_at).bind(a.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_attribute(&self, a: &ProductAttribute) -> Result<()> {
        let rows = sqlx::query("UPDATE product_attributes SET attribute_name = $2, attribute_value = $3, updated_at = $4 WHERE id = $1")
            .bind(a.id).bind(&a.attribute_name).bind(&a.attribute_value).bind(a.updated_at)
            .execute(&self.pool)
            .await?
            .rows_affected();
        not_found_unless_updated(rows, "Attribute")
    }

    async fn find_attribute(&self, id: Uuid) -> Result<Option<ProductAttribute>> {
        let row: Option<AttributeRow> = sqlx::query_as(&format!("SELECT {ATTRIBUTE_COLUMNS} FROM product_attributes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ProductAttribute::from))
    }

    async fn list_attributes(&self, filter: &AttributeFilter, page: Option<PageRequest>) -> Result<Vec<ProductAttribute>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ATTRIBUTE_COLUMNS} FROM product_attributes"));
        push_attribute_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, page);
        let rows: Vec<AttributeRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ProductAttribute::from).collect())
    }

    async fn count_attributes(&self, filter: &AttributeFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM product_attributes");
        push_attribute_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn distinct_attribute_names(&self, product_id: Option<Uuid>) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT attribute_name FROM product_attributes WHERE ($1::uuid IS NULL OR product_id = $1) ORDER BY attribute_name",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn delete_attributes(&self, ids: &[Uuid]) -> Result<u64> {
        Ok(sqlx::query("DELETE FROM product_attributes WHERE id = ANY($1)").bind(ids).execute(&self.pool).await?.rows_affected())
    }
}

// =============================================================================
// Comments
// =============================================================================

#[async_trait]
impl CommentRepository for PgCatalog {
    async fn insert_comment(&self, c: &Comment) -> Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, user_id, product_id, title, comment, rating, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(c.id).bind(c.user_id).bind(c.product_id).bind(&c.title).bind(&c.comment).bind(c.rating)
        .bind(c.created_at).bind(c.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_comment(&self, c: &Comment) -> Result<()> {
        let rows = sqlx::query("UPDATE comments SET title = $2, comment = $3, rating = $4, updated_at = $5 WHERE id = $1")
            .bind(c.id).bind(&c.title).bind(&c.comment).bind(c.rating).bind(c.updated_at)
            .execute(&self.pool)
            .await?
            .rows_affected();
        not_found_unless_updated(rows, "Comment")
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let row: Option<CommentRow> = sqlx::query_as(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::from))
    }

    async fn list_comments(&self, filter: &CommentFilter, page: Option<PageRequest>) -> Result<Vec<Comment>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COMMENT_COLUMNS} FROM comments"));
        push_comment_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, page);
        let rows: Vec<CommentRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn count_comments(&self, filter: &CommentFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM comments");
        push_comment_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn rating_histogram(&self, product_id: Option<Uuid>) -> Result<Vec<(i16, u64)>> {
        let rows: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT rating, COUNT(*) FROM comments WHERE ($1::uuid IS NULL OR product_id = $1) GROUP BY rating ORDER BY rating",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(rating, n)| (rating, n as u64)).collect())
    }

    async fn delete_comments(&self, ids: &[Uuid]) -> Result<u64> {
        Ok(sqlx::query("DELETE FROM comments WHERE id = ANY($1)").bind(ids).execute(&self.pool).await?.rows_affected())
    }
}

// =============================================================================
// Customers
// =============================================================================

#[async_trait]
impl CustomerRepository for PgCatalog {
    async fn insert_customer(&self, c: &Customer) -> Result<()> {
        sqlx::query(
            "INSERT INTO customers (id, user_id, email, username, phone, address, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(c.id).bind(c.user_id).bind(&c.email).bind(&c.username).bind(&c.phone).bind(&c.address)
        .bind(c.created_at).bind(c.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_customer(&self, c: &Customer) -> Result<()> {
        let rows = sqlx::query("UPDATE customers SET email = $2, username = $3, phone = $4, address = $5, updated_at = $6 WHERE id = $1")
            .bind(c.id).bind(&c.email).bind(&c.username).bind(&c.phone).bind(&c.address).bind(c.updated_at)
            .execute(&self.pool)
            .await?
            .rows_affected();
        not_found_unless_updated(rows, "Customer")
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Customer::from))
    }

    async fn find_customer_by_user(&self, user_id: Uuid) -> Result<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Customer::from))
    }

    async fn list_customers(&self, filter: &CustomerFilter, page: Option<PageRequest>) -> Result<Vec<Customer>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM customers"));
        push_customer_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, page);
        let rows: Vec<CustomerRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    async fn count_customers(&self, filter: &CustomerFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customers");
        push_customer_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn delete_customers(&self, ids: &[Uuid]) -> Result<u64> {
        Ok(sqlx::query("DELETE FROM customers WHERE id = ANY($1)").bind(ids).execute(&self.pool).await?.rows_affected())
    }
}

// =============================================================================
// Stores
// =============================================================================

#[async_trait]
impl StoreRepository for PgCatalog {
    async fn insert_store(&self, s: &Store) -> Result<()> {
        sqlx::query(
            "INSERT INTO stores (id, user_id, name, description, address, city, state, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(s.id).bind(s.user_id).bind(&s.name).bind(&s.description).bind(&s.address).bind(&s.city).bind(&s.state)
        .bind(s.created_at).bind(s.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_store(&self, s: &Store) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE stores SET name = $2, description = $3, address = $4, city = $5, state = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(s.id).bind(&s.name).bind(&s.description).bind(&s.address).bind(&s.city).bind(&s.state).bind(s.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        not_found_unless_updated(rows, "Store")
    }

    async fn find_store(&self, id: Uuid) -> Result<Option<Store>> {
        let row: Option<StoreRow> = sqlx::query_as(&format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Store::from))
    }

    async fn find_store_by_user(&self, user_id: Uuid) -> Result<Option<Store>> {
        let row: Option<StoreRow> = sqlx::query_as(&format!("SELECT {STORE_COLUMNS} FROM stores WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Store::from))
    }

    async fn list_stores(&self, filter: &StoreFilter, page: Option<PageRequest>) -> Result<Vec<Store>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {STORE_COLUMNS} FROM stores"));
        push_store_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_page(&mut qb, page);
        let rows: Vec<StoreRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Store::from).collect())
    }

    async fn count_stores(&self, filter: &StoreFilter) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM stores");
        push_store_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    async fn list_store_images(&self, store_id: Uuid) -> Result<Vec<StoreImage>> {
        let rows: Vec<StoreImageRow> = sqlx::query_as(
            "SELECT id, store_id, image_type, image_url, asset_id, updated_at FROM store_images WHERE store_id = $1 ORDER BY image_type DESC",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(StoreImage::try_from).collect()
    }

    async fn upsert_store_image(&self, image: &StoreImage) -> Result<Option<StoreImage>> {
        let mut tx = self.pool.begin().await?;
        let previous: Option<StoreImageRow> = sqlx::query_as(
            "DELETE FROM store_images WHERE store_id = $1 AND image_type = $2 RETURNING id, store_id, image_type, image_url, asset_id, updated_at",
        )
        .bind(image.store_id)
        .bind(image.image_type.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO store_images (id, store_id, image_type, image_url, asset_id, updated_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(image.id).bind(image.store_id).bind(image.image_type.as_str()).bind(&image.image_url)
            .bind(&image.asset_id).bind(image.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        previous.map(StoreImage::try_from).transpose()
    }

    async fn delete_store(&self, id: Uuid) -> Result<RowRemoval> {
        let mut tx = self.pool.begin().await?;
        let removed: Vec<Option<String>> = sqlx::query_scalar("DELETE FROM store_images WHERE store_id = $1 RETURNING asset_id")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let asset_ids: Vec<String> = removed.into_iter().flatten().collect();
        let rows = sqlx::query("DELETE FROM stores WHERE id = $1").bind(id).execute(&mut *tx).await?.rows_affected();
        queue_assets(&mut tx, &asset_ids).await?;
        tx.commit().await?;
        Ok(RowRemoval { rows, asset_ids })
    }
}

// =============================================================================
// Users and the asset ledger
// =============================================================================

#[async_trait]
impl UserRepository for PgCatalog {
    async fn insert_user(&self, u: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, username, password_hash, role, status, image, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(u.id).bind(&u.email).bind(&u.name).bind(&u.username).bind(&u.password_hash)
        .bind(u.role.as_str()).bind(u.status.as_str()).bind(&u.image).bind(u.created_at).bind(u.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_user(&self, u: &User) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        update_user(&mut conn, u).await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        if let Some(role) = filter.role { qb.push(" AND role = ").push_bind(role.as_str()); }
        qb.push(" ORDER BY created_at, id");
        let rows: Vec<UserRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn delete_user(&self, id: Uuid) -> Result<RowRemoval> {
        let mut tx = self.pool.begin().await?;
        let owns_store: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stores WHERE user_id = $1)")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if owns_store {
            return Err(CatalogError::Storage("User still owns a store".into()));
        }
        let image: Option<ProfileImageRow> = sqlx::query_as(&format!("DELETE FROM profile_images WHERE user_id = $1 RETURNING {PROFILE_IMAGE_COLUMNS}"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let asset_ids = image.map(|r| ProfileImage::from(r).asset_ids()).unwrap_or_default();
        for table in ["user_locations", "comments", "reviews", "wishlist_items", "customers", "orders"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1")).bind(id).execute(&mut *tx).await?;
        }
        let rows = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *tx).await?.rows_affected();
        queue_assets(&mut tx, &asset_ids).await?;
        tx.commit().await?;
        Ok(RowRemoval { rows, asset_ids })
    }

    async fn list_locations(&self, user_id: Uuid) -> Result<Vec<UserLocation>> {
        let rows: Vec<LocationRow> = sqlx::query_as(&format!(
            "SELECT {LOCATION_COLUMNS} FROM user_locations WHERE user_id = $1 ORDER BY is_default DESC, created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserLocation::from).collect())
    }

    async fn find_location(&self, id: Uuid) -> Result<Option<UserLocation>> {
        let row: Option<LocationRow> = sqlx::query_as(&format!("SELECT {LOCATION_COLUMNS} FROM user_locations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserLocation::from))
    }

    async fn set_default_location(&self, user_id: Uuid, location_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        make_default_location(&mut tx, user_id, location_id).await?;
        let rows = sqlx::query("UPDATE user_locations SET is_default = TRUE, updated_at = NOW() WHERE id = $1 AND user_id = $2")
            .bind(location_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        not_found_unless_updated(rows, "Location")?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_location(&self, id: Uuid) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM user_locations WHERE id = $1").bind(id).execute(&self.pool).await?.rows_affected();
        Ok(rows > 0)
    }

    async fn find_profile_image(&self, user_id: Uuid) -> Result<Option<ProfileImage>> {
        let row: Option<ProfileImageRow> = sqlx::query_as(&format!("SELECT {PROFILE_IMAGE_COLUMNS} FROM profile_images WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ProfileImage::from))
    }

    async fn save_profile(&self, write: &ProfileWrite) -> Result<Option<ProfileImage>> {
        let user_id = write.user.id;
        let mut tx = self.pool.begin().await?;
        update_user(&mut tx, &write.user).await?;
        if let Some(default) = write.locations.iter().rev().find(|l| l.is_default) {
            make_default_location(&mut tx, user_id, default.id).await?;
        }
        for l in &write.locations {
            let is_default = l.is_default && write.locations.iter().rev().find(|d| d.is_default).is_some_and(|d| d.id == l.id);
            let rows = sqlx::query(
                r#"
                INSERT INTO user_locations (id, user_id, label, address_line, city, state, country, postal_code, latitude, longitude, is_default, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (id) DO UPDATE SET
                    label = EXCLUDED.label, address_line = EXCLUDED.address_line, city = EXCLUDED.city,
                    state = EXCLUDED.state, country = EXCLUDED.country, postal_code = EXCLUDED.postal_code,
                    latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude, is_default = EXCLUDED.is_default,
                    updated_at = EXCLUDED.updated_at
                WHERE user_locations.user_id = EXCLUDED.user_id
                "#,
            )
            .bind(l.id).bind(user_id).bind(&l.label).bind(&l.address_line).bind(&l.city).bind(&l.state)
            .bind(&l.country).bind(&l.postal_code).bind(l.latitude).bind(l.longitude).bind(is_default)
            .bind(l.created_at).bind(l.updated_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            not_found_unless_updated(rows, "Location")?;
        }
        let previous = match &write.image {
            Some(image) => {
                let previous: Option<ProfileImageRow> = sqlx::query_as(&format!(
                    "SELECT {PROFILE_IMAGE_COLUMNS} FROM profile_images WHERE user_id = $1 FOR UPDATE"
                ))
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
                sqlx::query(
                    r#"
                    INSERT INTO profile_images (user_id, profile, profile_asset_id, thumbnail, thumbnail_asset_id, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (user_id) DO UPDATE SET
                        profile = EXCLUDED.profile, profile_asset_id = EXCLUDED.profile_asset_id,
                        thumbnail = EXCLUDED.thumbnail, thumbnail_asset_id = EXCLUDED.thumbnail_asset_id,
                        updated_at = EXCLUDED.updated_at
                    "#,
                )
                .bind(user_id).bind(&image.profile).bind(&image.profile_asset_id)
                .bind(&image.thumbnail).bind(&image.thumbnail_asset_id).bind(image.updated_at)
                .execute(&mut *tx)
                .await?;
                previous.map(ProfileImage::from)
            }
            None => None,
        };
        tx.commit().await?;
        Ok(previous)
    }
}

async fn update_user(conn: &mut PgConnection, u: &User) -> Result<()> {
    let rows = sqlx::query(
        r#"
        UPDATE users
        SET email = $2, name = $3, username = $4, password_hash = $5, role = $6, status = $7, image = $8, updated_at = $9
        WHERE id = $1
        "#,
    )
    .bind(u.id).bind(&u.email).bind(&u.name).bind(&u.username).bind(&u.password_hash).bind(u.role.as_str())
    .bind(u.status.as_str()).bind(&u.image).bind(u.updated_at)
    .execute(conn)
    .await?
    .rows_affected();
    not_found_unless_updated(rows, "User")
}

/// Clears the default flag on every other location of the user. Runs before
/// the new default is written so the single-default index never sees two.
async fn make_default_location(conn: &mut PgConnection, user_id: Uuid, location_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE user_locations SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND id <> $2 AND is_default")
        .bind(user_id)
        .bind(location_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl AssetLedger for PgCatalog {
    async fn queue_asset_deletions(&self, asset_ids: &[String]) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        queue_assets(&mut conn, asset_ids).await
    }

    async fn pending_asset_deletions(&self, limit: u32) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE pending_asset_deletions SET attempts = attempts + 1
            WHERE asset_id IN (SELECT asset_id FROM pending_asset_deletions ORDER BY queued_at LIMIT $1)
            RETURNING asset_id
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn clear_asset_deletions(&self, asset_ids: &[String]) -> Result<()> {
        sqlx::query("DELETE FROM pending_asset_deletions WHERE asset_id = ANY($1)")
            .bind(asset_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_escapes_metacharacters() {
        assert_eq!(like("50%_off"), "%50\\%\\_off%");
        assert_eq!(like("widget"), "%widget%");
    }

    #[test]
    fn test_product_filter_sql() {
        let filter = ProductFilter {
            search: Some(TextSearch { term: "blue".into(), fields: vec![ProductField::Name, ProductField::Brand] }),
            ..ProductFilter::trashed_in(Uuid::nil())
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_product_filter(&mut qb, &filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM products p WHERE TRUE AND p.is_deleted = TRUE AND p.store_id = $1 AND (p.name ILIKE $2 OR p.brand ILIKE $3)"
        );
    }
}
