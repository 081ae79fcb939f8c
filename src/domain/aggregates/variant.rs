//! Product variants and their inventory rows

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::Sku;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<Sku>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock counter owned by a variant. Seeded from `stock` at creation only.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub quantity_in_stock: i32,
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    pub fn create(product_id: Uuid, name: impl Into<String>, price: Decimal, stock: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), product_id, name: name.into(), sku: None, price,
            compare_at_price: None, stock, created_at: now, updated_at: now,
        }
    }

    pub fn opening_inventory(&self) -> Inventory {
        Inventory { id: Uuid::now_v7(), variant_id: self.id, quantity_in_stock: self.stock, updated_at: self.created_at }
    }

    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}
