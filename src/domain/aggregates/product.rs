//! Product Aggregate
//!
//! `status`, `is_deleted` and `deleted_at` are only ever written together by
//! [`Product::apply_lifecycle`], so a product is either live (any status but
//! `DELETED`, no deletion time) or trashed (`DELETED`, deletion time set).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::Slug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Draft,
    #[default]
    Active,
    #[serde(alias = "ARCHIVED")]
    Inactive,
    OutOfStock,
    Deleted,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "ACTIVE" | "PUBLISHED" => Ok(Self::Active),
            "INACTIVE" | "ARCHIVED" => Ok(Self::Inactive),
            "OUT_OF_STOCK" => Ok(Self::OutOfStock),
            "DELETED" => Ok(Self::Deleted),
            other => Err(ProductError::UnknownStatus(other.to_string())),
        }
    }
}

/// Target of a lifecycle transition.
#[derive(Clone, Copy, Debug)]
enum Lifecycle {
    Live(ProductStatus),
    Trashed(DateTime<Utc>),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: Uuid,
    store_id: Uuid,
    name: String,
    slug: Slug,
    description: Option<String>,
    brand: Option<String>,
    category: Option<String>,
    status: ProductStatus,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Input for [`Product::create`].
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub store_id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
}

/// Persisted columns, as read back from storage.
#[derive(Clone, Debug)]
pub struct ProductRecord {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub status: ProductStatus,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(input: NewProduct) -> Result<Self, ProductError> {
        let status = input.status.unwrap_or_default();
        if status == ProductStatus::Deleted { return Err(ProductError::DeletedStatusReserved); }
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(), store_id: input.store_id, name: input.name, slug: input.slug,
            description: input.description, brand: input.brand, category: input.category,
            status: ProductStatus::Active, is_deleted: false, deleted_at: None,
            created_at: now, updated_at: now, events: vec![],
        };
        product.apply_lifecycle(Lifecycle::Live(status));
        product.raise_event(ProductEvent::Created { product_id: product.id, store_id: product.store_id, slug: product.slug.to_string() });
        Ok(product)
    }

    /// Rebuilds a product from storage, refusing rows whose lifecycle columns disagree.
    pub fn from_record(r: ProductRecord) -> Result<Self, ProductError> {
        let consistent = match (r.is_deleted, r.deleted_at, r.status) {
            (true, Some(_), ProductStatus::Deleted) => true,
            (false, None, status) => status != ProductStatus::Deleted,
            _ => false,
        };
        if !consistent { return Err(ProductError::InconsistentLifecycle(r.id)); }
        Ok(Self {
            id: r.id, store_id: r.store_id, name: r.name, slug: r.slug, description: r.description,
            brand: r.brand, category: r.category, status: r.status, is_deleted: r.is_deleted,
            deleted_at: r.deleted_at, created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn store_id(&self) -> Uuid { self.store_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn slug(&self) -> &Slug { &self.slug }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn brand(&self) -> Option<&str> { self.brand.as_deref() }
    pub fn category(&self) -> Option<&str> { self.category.as_deref() }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn is_deleted(&self) -> bool { self.is_deleted }
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn rename(&mut self, name: impl Into<String>) { self.name = name.into(); self.touch(); }
    pub fn set_slug(&mut self, slug: Slug) { self.slug = slug; self.touch(); }
    pub fn set_description(&mut self, v: Option<String>) { self.description = v; self.touch(); }
    pub fn set_brand(&mut self, v: Option<String>) { self.brand = v; self.touch(); }
    pub fn set_category(&mut self, v: Option<String>) { self.category = v; self.touch(); }
    pub fn move_to_store(&mut self, store_id: Uuid) { self.store_id = store_id; self.touch(); }

    pub fn set_status(&mut self, status: ProductStatus) -> Result<(), ProductError> {
        if self.is_deleted { return Err(ProductError::Trashed); }
        if status == ProductStatus::Deleted { return Err(ProductError::DeletedStatusReserved); }
        if status == self.status { return Ok(()); }
        let from = self.status;
        self.apply_lifecycle(Lifecycle::Live(status));
        self.raise_event(ProductEvent::StatusChanged { product_id: self.id, from, to: status });
        Ok(())
    }

    pub fn move_to_trash(&mut self, now: DateTime<Utc>) -> Result<(), ProductError> {
        if self.is_deleted { return Err(ProductError::AlreadyInTrash); }
        self.apply_lifecycle(Lifecycle::Trashed(now));
        self.raise_event(ProductEvent::Trashed { product_id: self.id, store_id: self.store_id, deleted_at: now });
        Ok(())
    }

    /// Restored products always come back as drafts, whatever they were before.
    pub fn restore(&mut self) -> Result<(), ProductError> {
        if !self.is_deleted { return Err(ProductError::NotInTrash); }
        self.apply_lifecycle(Lifecycle::Live(ProductStatus::Draft));
        self.raise_event(ProductEvent::Restored { product_id: self.id, store_id: self.store_id });
        Ok(())
    }

    /// Trashed at or before `now - days`.
    pub fn is_purge_eligible(&self, now: DateTime<Utc>, days: u32) -> bool {
        match (self.deleted_at, trash_cutoff(now, days)) {
            (Some(at), Some(cutoff)) => at <= cutoff,
            _ => false,
        }
    }

    pub fn ensure_trashed(&self) -> Result<(), ProductError> {
        if self.is_deleted { Ok(()) } else { Err(ProductError::NotInTrashForPurge) }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn apply_lifecycle(&mut self, to: Lifecycle) {
        match to {
            Lifecycle::Live(status) => {
                debug_assert!(status != ProductStatus::Deleted);
                self.status = status;
                self.is_deleted = false;
                self.deleted_at = None;
                self.touch();
            }
            Lifecycle::Trashed(at) => {
                self.status = ProductStatus::Deleted;
                self.is_deleted = true;
                self.deleted_at = Some(at);
                self.updated_at = at;
            }
        }
    }

    fn raise_event(&mut self, e: ProductEvent) { self.events.push(DomainEvent::Product(e)); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Latest deletion time old enough for the retention sweep. `None` when
/// `now - days` predates the representable range, so nothing qualifies.
pub fn trash_cutoff(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(days)).and_then(|d| now.checked_sub_signed(d))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("Product is already in trash")]
    AlreadyInTrash,
    #[error("Product is not in trash")]
    NotInTrash,
    #[error("Product must be in trash before permanent deletion; use soft delete first")]
    NotInTrashForPurge,
    #[error("Product is in trash; restore it before editing")]
    Trashed,
    #[error("Status DELETED is set by moving the product to trash")]
    DeletedStatusReserved,
    #[error("Unknown product status: {0}")]
    UnknownStatus(String),
    #[error("Product {0} has inconsistent trash columns")]
    InconsistentLifecycle(Uuid),
}

impl From<ProductError> for crate::CatalogError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::InconsistentLifecycle(_) => Self::Internal(e.to_string()),
            _ => Self::BadRequest(e.to_string()),
        }
    }
}
