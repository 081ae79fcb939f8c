//! Entity store
//!
//! One async trait per aggregate family, combined into [`Catalog`]. Services
//! hold an `Arc<dyn Catalog>` so the Postgres and in-memory backends are
//! interchangeable.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{
    Comment, Customer, ImageType, Inventory, Product, ProductAttribute, ProductImage, ProductStatus,
    ProductVariant, ProfileImage, Role, Store, StoreImage, User, UserLocation,
};
use crate::domain::value_objects::{PageRequest, Sku, Slug};
use crate::Result;

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

// =============================================================================
// Filters
// =============================================================================

/// Which side of the trash a product query sees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrashScope {
    #[default]
    Exclude,
    Include,
    Only,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductField { Name, Description, Brand, Category, Slug }

impl ProductField {
    pub const LISTING: [ProductField; 4] = [Self::Name, Self::Description, Self::Brand, Self::Category];
    pub const SEARCH: [ProductField; 5] = [Self::Name, Self::Description, Self::Brand, Self::Category, Self::Slug];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Brand => "brand",
            Self::Category => "category",
            Self::Slug => "slug",
        }
    }
}

/// Case-insensitive "contains" match, OR-ed across `fields`.
#[derive(Clone, Debug)]
pub struct TextSearch {
    pub term: String,
    pub fields: Vec<ProductField>,
}

#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub ids: Option<Vec<Uuid>>,
    pub store_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub search: Option<TextSearch>,
    pub trash: TrashScope,
    pub deleted_before: Option<DateTime<Utc>>,
    pub has_images: Option<bool>,
}

impl ProductFilter {
    pub fn store(store_id: Uuid) -> Self { Self { store_id: Some(store_id), ..Self::default() } }
    pub fn trashed_in(store_id: Uuid) -> Self { Self { trash: TrashScope::Only, ..Self::store(store_id) } }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProductOrder {
    #[default]
    CreatedDesc,
    DeletedDesc,
    DeletedAsc,
    CommentsDesc,
}

#[derive(Clone, Debug, Default)]
pub struct ImageFilter {
    pub product_id: Option<Uuid>,
    pub ids: Option<Vec<Uuid>>,
    pub image_type: Option<ImageType>,
}

#[derive(Clone, Debug, Default)]
pub struct AttributeFilter {
    pub product_id: Option<Uuid>,
    pub name: Option<String>,
    pub search: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct CommentFilter {
    pub ids: Option<Vec<Uuid>>,
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub min_rating: Option<i16>,
    pub max_rating: Option<i16>,
    pub search: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct CustomerFilter {
    pub ids: Option<Vec<Uuid>>,
    pub search: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct StoreFilter {
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
}

/// One profile edit, written in a single transaction.
#[derive(Clone, Debug)]
pub struct ProfileWrite {
    pub user: User,
    /// Inserted or updated by id. If one is the default, every other location
    /// of the user stops being the default.
    pub locations: Vec<UserLocation>,
    pub image: Option<ProfileImage>,
}

/// Result of the cascading product purge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub products: u64,
    /// Asset-host ids of the removed images, already queued in the asset ledger.
    pub asset_ids: Vec<String>,
}

/// Rows removed by a plain delete that releases hosted assets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowRemoval {
    pub rows: u64,
    /// Asset-host ids of the removed rows, already queued in the asset ledger.
    pub asset_ids: Vec<String>,
}

// =============================================================================
// Repositories
// =============================================================================

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: &Product) -> Result<()>;
    async fn save_product(&self, product: &Product) -> Result<()>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_product_by_slug(&self, slug: &Slug) -> Result<Option<Product>>;
    async fn list_products(&self, filter: &ProductFilter, order: ProductOrder, page: Option<PageRequest>) -> Result<Vec<Product>>;
    async fn count_products(&self, filter: &ProductFilter) -> Result<u64>;
    /// Removes the products and every row that references them in one
    /// transaction: inventory, variants, images, attributes, reviews,
    /// comments, wishlist entries, then the products. The asset ids of the
    /// removed images are queued for remote deletion in the same transaction.
    async fn purge_products(&self, ids: &[Uuid]) -> Result<PurgeOutcome>;
}

#[async_trait]
pub trait VariantRepository: Send + Sync {
    /// Inserts the variant together with its opening inventory row.
    async fn insert_variant(&self, variant: &ProductVariant) -> Result<Inventory>;
    async fn save_variant(&self, variant: &ProductVariant) -> Result<()>;
    async fn find_variant(&self, id: Uuid) -> Result<Option<ProductVariant>>;
    async fn find_variant_by_sku(&self, sku: &Sku) -> Result<Option<ProductVariant>>;
    async fn find_inventory(&self, variant_id: Uuid) -> Result<Option<Inventory>>;
    async fn list_variants(&self, product_id: Uuid, limit: Option<u32>) -> Result<Vec<ProductVariant>>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn insert_image(&self, image: &ProductImage) -> Result<()>;
    async fn save_image(&self, image: &ProductImage) -> Result<()>;
    async fn find_image(&self, id: Uuid) -> Result<Option<ProductImage>>;
    /// Ordered by position, then creation time.
    async fn list_images(&self, filter: &ImageFilter, page: Option<PageRequest>) -> Result<Vec<ProductImage>>;
    async fn count_images(&self, filter: &ImageFilter) -> Result<u64>;
    async fn max_image_position(&self, product_id: Uuid) -> Result<Option<i32>>;
    /// Promotes one image to MAIN and demotes every other image of the product.
    async fn set_main_image(&self, product_id: Uuid, image_id: Uuid) -> Result<()>;
    /// Deletes the rows and queues their asset ids for remote deletion.
    async fn delete_images(&self, ids: &[Uuid]) -> Result<RowRemoval>;
}

#[async_trait]
pub trait AttributeRepository: Send + Sync {
    async fn insert_attribute(&self, attribute: &ProductAttribute) -> Result<()>;
    async fn save_attribute(&self, attribute: &ProductAttribute) -> Result<()>;
    async fn find_attribute(&self, id: Uuid) -> Result<Option<ProductAttribute>>;
    async fn list_attributes(&self, filter: &AttributeFilter, page: Option<PageRequest>) -> Result<Vec<ProductAttribute>>;
    async fn count_attributes(&self, filter: &AttributeFilter) -> Result<u64>;
    async fn distinct_attribute_names(&self, product_id: Option<Uuid>) -> Result<Vec<String>>;
    async fn delete_attributes(&self, ids: &[Uuid]) -> Result<u64>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert_comment(&self, comment: &Comment) -> Result<()>;
    async fn save_comment(&self, comment: &Comment) -> Result<()>;
    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>>;
    async fn list_comments(&self, filter: &CommentFilter, page: Option<PageRequest>) -> Result<Vec<Comment>>;
    async fn count_comments(&self, filter: &CommentFilter) -> Result<u64>;
    /// `(rating, count)` pairs, ascending by rating.
    async fn rating_histogram(&self, product_id: Option<Uuid>) -> Result<Vec<(i16, u64)>>;
    async fn delete_comments(&self, ids: &[Uuid]) -> Result<u64>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;
    async fn save_customer(&self, customer: &Customer) -> Result<()>;
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>>;
    async fn find_customer_by_user(&self, user_id: Uuid) -> Result<Option<Customer>>;
    async fn list_customers(&self, filter: &CustomerFilter, page: Option<PageRequest>) -> Result<Vec<Customer>>;
    async fn count_customers(&self, filter: &CustomerFilter) -> Result<u64>;
    async fn delete_customers(&self, ids: &[Uuid]) -> Result<u64>;
}

#[async_trait]
pub trait StoreRepository: Send + Sync {
    async fn insert_store(&self, store: &Store) -> Result<()>;
    async fn save_store(&self, store: &Store) -> Result<()>;
    async fn find_store(&self, id: Uuid) -> Result<Option<Store>>;
    async fn find_store_by_user(&self, user_id: Uuid) -> Result<Option<Store>>;
    async fn list_stores(&self, filter: &StoreFilter, page: Option<PageRequest>) -> Result<Vec<Store>>;
    async fn count_stores(&self, filter: &StoreFilter) -> Result<u64>;
    async fn list_store_images(&self, store_id: Uuid) -> Result<Vec<StoreImage>>;
    /// Replaces the store's image of the same type, returning the previous one.
    async fn upsert_store_image(&self, image: &StoreImage) -> Result<Option<StoreImage>>;
    /// Deletes the store and its images. Products must already be purged.
    async fn delete_store(&self, id: Uuid) -> Result<RowRemoval>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn save_user(&self, user: &User) -> Result<()>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Oldest first.
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>>;
    /// Deletes the user with their locations, profile image, comments,
    /// wishlist and customer rows. The user must not own a store.
    async fn delete_user(&self, id: Uuid) -> Result<RowRemoval>;
    /// Default first, then oldest first.
    async fn list_locations(&self, user_id: Uuid) -> Result<Vec<UserLocation>>;
    async fn find_location(&self, id: Uuid) -> Result<Option<UserLocation>>;
    /// Makes the location the user's only default.
    async fn set_default_location(&self, user_id: Uuid, location_id: Uuid) -> Result<()>;
    async fn delete_location(&self, id: Uuid) -> Result<bool>;
    async fn find_profile_image(&self, user_id: Uuid) -> Result<Option<ProfileImage>>;
    /// Returns the profile image that was replaced, if any.
    async fn save_profile(&self, write: &ProfileWrite) -> Result<Option<ProfileImage>>;
}

/// Remote assets whose database rows are gone but whose deletion on the asset
/// host has not been confirmed yet.
#[async_trait]
pub trait AssetLedger: Send + Sync {
    async fn queue_asset_deletions(&self, asset_ids: &[String]) -> Result<()>;
    async fn pending_asset_deletions(&self, limit: u32) -> Result<Vec<String>>;
    async fn clear_asset_deletions(&self, asset_ids: &[String]) -> Result<()>;
}

pub trait Catalog:
    ProductRepository
    + VariantRepository
    + ImageRepository
    + AttributeRepository
    + CommentRepository
    + CustomerRepository
    + StoreRepository
    + UserRepository
    + AssetLedger
{
}

impl<T> Catalog for T where
    T: ProductRepository
        + VariantRepository
        + ImageRepository
        + AttributeRepository
        + CommentRepository
        + CustomerRepository
        + StoreRepository
        + UserRepository
        + AssetLedger
{
}

/// Case-insensitive substring test shared by the in-memory backend.
pub(crate) fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}
